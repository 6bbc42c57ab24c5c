use std::path::Path;

use clap::{Parser, Subcommand};

use accord_crypto::hash::account_code;
use accord_crypto::keys::{NodeKey, DEFAULT_KEY_BITS};
use accord_types::primitives::ledger_id;

use crate::config::{NodeConfig, KEY_FILE};
use crate::error::NodeError;

#[derive(Parser)]
#[command(
    name = "accord",
    about = "Accord node: signed two-phase agreement on ledger creation",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the node
    Run {
        /// Path to config file
        #[arg(short, long, default_value = "accord.toml")]
        config: String,
        /// Override RPC listen address (e.g., "0.0.0.0:7100" for LAN access)
        #[arg(long)]
        rpc_addr: Option<String>,
        /// Storage backend: "sqlite" or "memory"
        #[arg(long)]
        storage: Option<String>,
        /// Override data directory path
        #[arg(long)]
        data_dir: Option<String>,
    },
    /// Initialize a node configuration and a fresh node key
    Init {
        /// Output directory
        #[arg(short, long, default_value = ".")]
        dir: String,
        /// RSA modulus size
        #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
        bits: usize,
    },
    /// Generate an RSA key pair
    Keygen {
        /// Write the private key here instead of printing it
        #[arg(short, long)]
        out: Option<String>,
        /// RSA modulus size
        #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
        bits: usize,
    },
}

impl Cli {
    /// Log level from the run config, falling back to "info".
    pub fn log_level(&self) -> String {
        match &self.command {
            Command::Run { config, .. } => NodeConfig::load(config)
                .map(|c| c.logging.level)
                .unwrap_or_else(|_| "info".to_string()),
            _ => "info".to_string(),
        }
    }
}

fn write_key(path: &Path, key: &NodeKey) -> Result<(), NodeError> {
    if path.exists() {
        return Err(NodeError::ConfigError {
            reason: format!("refusing to overwrite existing key '{}'", path.display()),
        });
    }
    std::fs::write(path, key.to_pem()?)?;
    Ok(())
}

fn print_public(key: &NodeKey) -> Result<(), NodeError> {
    let public_key = key.public_key_pem()?;
    println!("{}", public_key.trim_end());
    println!("Ledger id:    {}", hex::encode(ledger_id(&public_key)));
    println!("Account code: {}", account_code(&public_key));
    Ok(())
}

pub async fn run(cli: Cli) -> Result<(), NodeError> {
    match cli.command {
        Command::Run {
            config,
            rpc_addr,
            storage,
            data_dir,
        } => {
            let mut config = NodeConfig::load(&config)?;

            // Apply CLI overrides.
            if let Some(addr) = rpc_addr {
                config.rpc.listen_addr = addr;
            }
            if let Some(db) = storage {
                config.storage.db_type = db;
            }
            if let Some(dir) = data_dir {
                config.storage.data_dir = dir;
            }

            let mut node = crate::node::Node::new(config).await?;
            node.run().await
        }
        Command::Init { dir, bits } => {
            let key_path = Path::new(&dir).join(KEY_FILE);
            std::fs::create_dir_all(&dir)?;
            let key = NodeKey::generate(bits)?;
            write_key(&key_path, &key)?;
            let config_path = NodeConfig::init(&dir)?;
            tracing::info!(
                config = %config_path.display(),
                key = %key_path.display(),
                "Node configuration initialized"
            );
            print_public(&key)
        }
        Command::Keygen { out, bits } => {
            let key = NodeKey::generate(bits)?;
            match out {
                Some(path) => {
                    write_key(Path::new(&path), &key)?;
                    tracing::info!("Private key written to {}", path);
                }
                None => println!("{}", key.to_pem()?.trim_end()),
            }
            print_public(&key)
        }
    }
}
