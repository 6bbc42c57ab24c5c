use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use accord_types::node::ConsensusNode;

use crate::error::NodeError;

/// File name written by [`NodeConfig::init`].
pub const CONFIG_FILE: &str = "accord.toml";
/// File name of the node's private key written alongside the config.
pub const KEY_FILE: &str = "node.pem";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub identity: IdentityConfig,
    /// Statically trusted peers. An entry for this node's own url is ignored.
    #[serde(default)]
    pub peers: Vec<PeerConfig>,
    pub storage: StorageConfig,
    pub rpc: RpcConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Identifier of this node; also the url peers reach it on.
    pub url: String,
    /// PEM file holding the node's RSA private key.
    pub private_key_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeerConfig {
    pub url: String,
    /// Inline PEM public key. Takes precedence over `public_key_path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Storage backend: "memory" or "sqlite"
    pub db_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub enabled: bool,
    pub listen_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Per-peer request timeout for outbound prepares.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Skip the peer a prepare came from when forwarding it.
    #[serde(default = "default_exclude_sender")]
    pub exclude_sender: bool,
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_exclude_sender() -> bool {
    true
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            exclude_sender: default_exclude_sender(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            identity: IdentityConfig {
                url: "http://127.0.0.1:7100".to_string(),
                private_key_path: KEY_FILE.to_string(),
            },
            peers: Vec::new(),
            storage: StorageConfig {
                data_dir: dirs::home_dir()
                    .map(|h| h.join(".accord").join("data").to_string_lossy().into_owned())
                    .unwrap_or_else(|| "./accord-data".to_string()),
                db_type: "sqlite".to_string(),
            },
            rpc: RpcConfig {
                enabled: true,
                listen_addr: "127.0.0.1:7100".to_string(),
            },
            broadcast: BroadcastConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl PeerConfig {
    /// Resolve the peer's public key into a registry entry.
    pub fn to_node(&self) -> Result<ConsensusNode, NodeError> {
        let public_key = match (&self.public_key, &self.public_key_path) {
            (Some(pem), _) => pem.clone(),
            (None, Some(path)) => {
                std::fs::read_to_string(path).map_err(|e| NodeError::ConfigError {
                    reason: format!("failed to read key for peer '{}' at '{}': {}", self.url, path, e),
                })?
            }
            (None, None) => {
                return Err(NodeError::ConfigError {
                    reason: format!("peer '{}' has no public_key or public_key_path", self.url),
                })
            }
        };
        Ok(ConsensusNode {
            url: self.url.clone(),
            public_key,
        })
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, NodeError> {
        let contents = std::fs::read_to_string(path).map_err(|e| NodeError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path, e),
        })?;
        let config: NodeConfig = toml::from_str(&contents).map_err(|e| NodeError::ConfigError {
            reason: format!("failed to parse config file '{}': {}", path, e),
        })?;
        Ok(config)
    }

    /// Write a default configuration file into `dir`, pointing at a key file in the same directory.
    pub fn init(dir: &str) -> Result<PathBuf, NodeError> {
        let dir_path = Path::new(dir);
        if !dir_path.exists() {
            std::fs::create_dir_all(dir_path)?;
        }

        let mut config = NodeConfig::default();
        config.identity.private_key_path = dir_path.join(KEY_FILE).to_string_lossy().into_owned();
        let toml_str = toml::to_string_pretty(&config).map_err(|e| NodeError::ConfigError {
            reason: format!("failed to serialize default config: {}", e),
        })?;

        let config_path = dir_path.join(CONFIG_FILE);
        std::fs::write(&config_path, toml_str)?;

        Ok(config_path)
    }

    /// All configured peers as registry entries.
    pub fn consensus_nodes(&self) -> Result<Vec<ConsensusNode>, NodeError> {
        self.peers.iter().map(PeerConfig::to_node).collect()
    }
}
