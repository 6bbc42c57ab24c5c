use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::server::{ServerBuilder, ServerHandle};

use super::handlers::{AccordRpcImpl, AccordRpcServer};
use crate::error::NodeError;
use crate::metrics::NodeMetrics;
use crate::node::NodeEngine;

/// Start the JSON-RPC HTTP server, returning its handle and bound address.
pub async fn start_rpc_server(
    addr: &str,
    engine: Arc<NodeEngine>,
    metrics: Arc<NodeMetrics>,
) -> Result<(ServerHandle, SocketAddr), NodeError> {
    let server = ServerBuilder::default()
        .build(addr)
        .await
        .map_err(|e| NodeError::RpcError {
            reason: format!("failed to build RPC server: {}", e),
        })?;
    let local_addr = server.local_addr()?;

    let rpc_impl = AccordRpcImpl { engine, metrics };
    let handle = server.start(rpc_impl.into_rpc());

    tracing::info!(addr = %local_addr, "RPC server started");

    Ok((handle, local_addr))
}
