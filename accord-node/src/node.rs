use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use accord_consensus::engine::ConsensusEngine;
use accord_consensus::identity::LocalIdentity;
use accord_consensus::registry::NodeRegistry;
use accord_crypto::keys::NodeKey;
use accord_storage::ledger_store::LedgerStore;
use accord_storage::memory::MemoryStore;
use accord_storage::sqlite::SqliteStore;
use accord_storage::traits::BatchWriter;

use crate::broadcast::HttpBroadcaster;
use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::metrics::NodeMetrics;

/// Consensus engine as wired up by the node.
pub type NodeEngine = ConsensusEngine<Arc<dyn BatchWriter>, HttpBroadcaster>;

/// The main node that ties together all subsystems.
pub struct Node {
    config: NodeConfig,
    engine: Arc<NodeEngine>,
    metrics: Arc<NodeMetrics>,
    rpc_handle: Option<jsonrpsee::server::ServerHandle>,
    rpc_addr: Option<SocketAddr>,
}

/// Create a storage backend from the node configuration.
fn create_store(config: &NodeConfig) -> Result<Arc<dyn BatchWriter>, NodeError> {
    match config.storage.db_type.as_str() {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "sqlite" => {
            let data_dir = Path::new(&config.storage.data_dir);
            std::fs::create_dir_all(data_dir)?;
            let store = SqliteStore::new(&sqlite_path(data_dir)?)
                .map_err(NodeError::StorageError)?;
            Ok(Arc::new(store))
        }
        other => Err(NodeError::ConfigError {
            reason: format!(
                "unknown storage backend '{}', expected 'memory' or 'sqlite'",
                other
            ),
        }),
    }
}

/// Location of the SQLite database inside the data directory.
fn sqlite_path(data_dir: &Path) -> Result<String, NodeError> {
    let db_path = data_dir.join("accord.db");
    db_path
        .to_str()
        .map(str::to_string)
        .ok_or_else(|| NodeError::ConfigError {
            reason: format!("data_dir {} is not valid UTF-8", data_dir.display()),
        })
}

/// Read the node's private key from a PEM file.
fn load_key(path: &str) -> Result<NodeKey, NodeError> {
    let pem = std::fs::read_to_string(path).map_err(|e| NodeError::ConfigError {
        reason: format!("failed to read private key '{}': {}", path, e),
    })?;
    Ok(NodeKey::from_pem(&pem)?)
}

impl Node {
    /// Create a new node from the given configuration.
    pub async fn new(config: NodeConfig) -> Result<Self, NodeError> {
        let key = load_key(&config.identity.private_key_path)?;
        let registry = NodeRegistry::new(config.consensus_nodes()?, &config.identity.url)?;
        let store = LedgerStore::new(create_store(&config)?)?;

        let metrics = Arc::new(NodeMetrics::new());
        metrics.ledger_count.set(store.ledger_count()? as i64);

        let broadcaster = HttpBroadcaster::new(
            Duration::from_millis(config.broadcast.timeout_ms),
            metrics.clone(),
        );
        let identity = LocalIdentity::new(config.identity.url.clone(), key);
        let engine = Arc::new(
            ConsensusEngine::new(identity, registry, store, broadcaster)
                .with_exclude_sender(config.broadcast.exclude_sender),
        );

        let (rpc_handle, rpc_addr) = if config.rpc.enabled {
            let (handle, addr) = crate::rpc::server::start_rpc_server(
                &config.rpc.listen_addr,
                engine.clone(),
                metrics.clone(),
            )
            .await?;
            (Some(handle), Some(addr))
        } else {
            (None, None)
        };

        tracing::info!(
            node = %config.identity.url,
            peers = engine.registry().len(),
            storage = %config.storage.db_type,
            "Node initialized"
        );

        Ok(Self {
            config,
            engine,
            metrics,
            rpc_handle,
            rpc_addr,
        })
    }

    pub fn engine(&self) -> &Arc<NodeEngine> {
        &self.engine
    }

    pub fn metrics(&self) -> &Arc<NodeMetrics> {
        &self.metrics
    }

    /// Address the RPC server is bound to, if enabled.
    pub fn rpc_addr(&self) -> Option<SocketAddr> {
        self.rpc_addr
    }

    /// Run until Ctrl+C or until the RPC server stops.
    pub async fn run(&mut self) -> Result<(), NodeError> {
        tracing::info!(node = %self.config.identity.url, "Node is running. Press Ctrl+C to stop.");

        match self.rpc_handle.clone() {
            Some(handle) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Received shutdown signal");
                    }
                    _ = handle.stopped() => {
                        tracing::warn!("RPC server stopped unexpectedly");
                    }
                }
            }
            None => {
                tokio::signal::ctrl_c().await?;
                tracing::info!("Received shutdown signal");
            }
        }

        self.shutdown().await
    }

    pub async fn shutdown(&mut self) -> Result<(), NodeError> {
        tracing::info!("Shutting down node...");
        if let Some(handle) = self.rpc_handle.take() {
            if !handle.is_stopped() {
                handle.stop().map_err(|e| NodeError::RpcError {
                    reason: format!("failed to stop RPC server: {}", e),
                })?;
            }
            handle.stopped().await;
        }
        tracing::info!("Node shutdown complete");
        Ok(())
    }
}
