use std::sync::Arc;
use std::time::Duration;

use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::HttpClientBuilder;
use jsonrpsee::rpc_params;

use accord_consensus::broadcast::Broadcaster;
use accord_types::message::OutboundPrepare;
use accord_types::node::ConsensusNode;

use crate::error::NodeError;
use crate::metrics::NodeMetrics;
use crate::rpc::types::{AccountResponse, LedgerResponse};

/// Sends prepares to peers over JSON-RPC, one detached task per peer.
pub struct HttpBroadcaster {
    timeout: Duration,
    metrics: Arc<NodeMetrics>,
}

impl HttpBroadcaster {
    pub fn new(timeout: Duration, metrics: Arc<NodeMetrics>) -> Self {
        Self { timeout, metrics }
    }
}

impl Broadcaster for HttpBroadcaster {
    fn broadcast(&self, message: OutboundPrepare, targets: Vec<ConsensusNode>) {
        if targets.is_empty() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                peers = targets.len(),
                "no async runtime available, dropping prepare broadcast"
            );
            self.metrics.broadcast_failures.inc_by(targets.len() as u64);
            return;
        };

        for target in targets {
            let message = message.clone();
            let metrics = self.metrics.clone();
            let timeout = self.timeout;
            handle.spawn(async move {
                match send_prepare(&target.url, &message, timeout).await {
                    Ok(status) => {
                        metrics.broadcasts_sent.inc();
                        tracing::debug!(peer = %target.url, status, "prepare delivered");
                    }
                    Err(e) => {
                        metrics.broadcast_failures.inc();
                        tracing::warn!(
                            peer = %target.url,
                            origin = %message.sender(),
                            "prepare broadcast failed: {}",
                            e
                        );
                    }
                }
            });
        }
    }
}

/// Deliver one prepare to a peer and return the status it answered with.
pub async fn send_prepare(
    url: &str,
    message: &OutboundPrepare,
    timeout: Duration,
) -> Result<u16, NodeError> {
    let client = HttpClientBuilder::default()
        .request_timeout(timeout)
        .build(url)
        .map_err(|e| NodeError::RpcError {
            reason: format!("failed to build client for {}: {}", url, e),
        })?;
    let status = match message {
        OutboundPrepare::Ledger(m) => client
            .request::<LedgerResponse, _>("accord_prepareLedger", rpc_params![m])
            .await
            .map(|r| r.status),
        OutboundPrepare::Account(m) => client
            .request::<AccountResponse, _>("accord_prepareAccount", rpc_params![m])
            .await
            .map(|r| r.status),
    };
    status.map_err(|e| NodeError::RpcError {
        reason: e.to_string(),
    })
}
