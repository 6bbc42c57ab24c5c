use std::sync::Arc;

use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::ErrorObjectOwned;
use serde::Serialize;

use accord_consensus::error::ConsensusError;
use accord_consensus::quorum::QuorumPolicy;
use accord_types::currency::Currency;
use accord_types::message::{
    AccountPrepareMessage, AccountProposal, CommitMessage, CreateRequest, PrepareMessage,
};

use super::types::{
    AccountInfo, AccountResponse, HealthInfo, LedgerInfo, LedgerResponse, LedgerStatusInfo,
};
use crate::metrics::NodeMetrics;
use crate::node::NodeEngine;

/// Error codes returned by the JSON-RPC binding.
pub const VALIDATION_ERROR: i32 = -32022;
pub const AUTHENTICATION_ERROR: i32 = -32001;
pub const NOT_FOUND_ERROR: i32 = -32004;
pub const INTERNAL_ERROR: i32 = -32603;

/// Attached to every error so HTTP-minded callers get the familiar status.
#[derive(Debug, Serialize)]
struct ErrorData {
    status: u16,
}

/// JSON-RPC trait for the Accord node.
#[rpc(server)]
pub trait AccordRpc {
    /// Originate a ledger on this node and broadcast it to all peers.
    #[method(name = "accord_createLedger")]
    async fn create_ledger(&self, request: CreateRequest)
        -> Result<LedgerResponse, ErrorObjectOwned>;

    /// Receive a peer's signed prepare.
    #[method(name = "accord_prepareLedger")]
    async fn prepare_ledger(
        &self,
        message: PrepareMessage,
    ) -> Result<LedgerResponse, ErrorObjectOwned>;

    /// Receive a signed commit vote.
    #[method(name = "accord_commitLedger")]
    async fn commit_ledger(&self, message: CommitMessage)
        -> Result<LedgerResponse, ErrorObjectOwned>;

    /// Get a ledger by its PEM public key.
    #[method(name = "accord_getLedger")]
    async fn get_ledger(&self, public_key: String)
        -> Result<Option<LedgerInfo>, ErrorObjectOwned>;

    #[method(name = "accord_listLedgers")]
    async fn list_ledgers(&self) -> Result<Vec<LedgerInfo>, ErrorObjectOwned>;

    /// Derived status; the threshold defaults to a majority of the cluster.
    #[method(name = "accord_getLedgerStatus")]
    async fn get_ledger_status(
        &self,
        public_key: String,
        threshold: Option<usize>,
    ) -> Result<LedgerStatusInfo, ErrorObjectOwned>;

    /// Open an additional account under a ledger held by this node.
    #[method(name = "accord_createAccount")]
    async fn create_account(
        &self,
        proposal: AccountProposal,
    ) -> Result<AccountResponse, ErrorObjectOwned>;

    /// Receive a peer's signed account prepare.
    #[method(name = "accord_prepareAccount")]
    async fn prepare_account(
        &self,
        message: AccountPrepareMessage,
    ) -> Result<AccountResponse, ErrorObjectOwned>;

    /// Get an account by its code.
    #[method(name = "accord_getAccount")]
    async fn get_account(&self, code: String) -> Result<Option<AccountInfo>, ErrorObjectOwned>;

    /// Every account of the ledger with this PEM public key.
    #[method(name = "accord_listAccounts")]
    async fn list_accounts(
        &self,
        ledger_public_key: String,
    ) -> Result<Vec<AccountInfo>, ErrorObjectOwned>;

    #[method(name = "accord_createCurrency")]
    async fn create_currency(&self, currency: Currency) -> Result<Currency, ErrorObjectOwned>;

    #[method(name = "accord_getCurrency")]
    async fn get_currency(&self, name: String) -> Result<Option<Currency>, ErrorObjectOwned>;

    #[method(name = "accord_listCurrencies")]
    async fn list_currencies(&self) -> Result<Vec<Currency>, ErrorObjectOwned>;

    /// Health check endpoint.
    #[method(name = "accord_health")]
    async fn health(&self) -> Result<HealthInfo, ErrorObjectOwned>;

    /// Prometheus text exposition of the node metrics.
    #[method(name = "accord_getMetrics")]
    async fn get_metrics(&self) -> Result<String, ErrorObjectOwned>;
}

/// Implementation of the Accord JSON-RPC server.
pub struct AccordRpcImpl {
    pub engine: Arc<NodeEngine>,
    pub metrics: Arc<NodeMetrics>,
}

/// Map an engine error onto a JSON-RPC error object.
pub fn rpc_error(err: &ConsensusError) -> ErrorObjectOwned {
    let (code, status) = match err {
        ConsensusError::Validation { .. } | ConsensusError::Duplicate { .. } => {
            (VALIDATION_ERROR, 422)
        }
        ConsensusError::Authentication { .. } => (AUTHENTICATION_ERROR, 401),
        ConsensusError::NotFound { .. } => (NOT_FOUND_ERROR, 404),
        ConsensusError::Crypto(_) | ConsensusError::Storage(_) => (INTERNAL_ERROR, 500),
    };
    ErrorObjectOwned::owned(code, err.to_string(), Some(ErrorData { status }))
}

impl AccordRpcImpl {
    fn fail(&self, operation: &str, err: ConsensusError) -> ErrorObjectOwned {
        match &err {
            ConsensusError::Authentication { .. } => {
                self.metrics.auth_failures.inc();
            }
            ConsensusError::Duplicate { .. } => tracing::info!(operation, "{}", err),
            _ if !err.is_rejection() => tracing::error!(operation, "{}", err),
            _ => tracing::debug!(operation, "rejected: {}", err),
        }
        rpc_error(&err)
    }

    /// Run an engine call on the blocking pool. Signing, verification and
    /// store writes are synchronous and must not stall the RPC workers.
    async fn blocking<T, F>(&self, operation: &'static str, f: F) -> Result<T, ErrorObjectOwned>
    where
        F: FnOnce(&NodeEngine) -> Result<T, ConsensusError> + Send + 'static,
        T: Send + 'static,
    {
        let engine = self.engine.clone();
        match tokio::task::spawn_blocking(move || f(&engine)).await {
            Ok(result) => result.map_err(|e| self.fail(operation, e)),
            Err(e) => {
                tracing::error!(operation, "engine task failed: {}", e);
                Err(ErrorObjectOwned::owned(
                    INTERNAL_ERROR,
                    format!("{} did not complete: {}", operation, e),
                    Some(ErrorData { status: 500 }),
                ))
            }
        }
    }

    async fn refresh_ledger_count(&self) {
        match self.blocking("ledger_count", |engine| engine.ledger_count()).await {
            Ok(count) => {
                self.metrics.ledger_count.set(count as i64);
            }
            Err(e) => tracing::warn!("Failed to count ledgers: {}", e.message()),
        }
    }
}

#[async_trait]
impl AccordRpcServer for AccordRpcImpl {
    async fn create_ledger(
        &self,
        request: CreateRequest,
    ) -> Result<LedgerResponse, ErrorObjectOwned> {
        let receipt = self
            .blocking("create", move |engine| engine.create(request))
            .await?;
        self.metrics.ledgers_created.inc();
        self.refresh_ledger_count().await;
        Ok(LedgerResponse::from(&receipt))
    }

    async fn prepare_ledger(
        &self,
        message: PrepareMessage,
    ) -> Result<LedgerResponse, ErrorObjectOwned> {
        let receipt = self
            .blocking("prepare", move |engine| engine.prepare(message))
            .await?;
        self.metrics.prepares_accepted.inc();
        if receipt.created {
            self.refresh_ledger_count().await;
        }
        Ok(LedgerResponse::from(&receipt))
    }

    async fn commit_ledger(
        &self,
        message: CommitMessage,
    ) -> Result<LedgerResponse, ErrorObjectOwned> {
        let receipt = self
            .blocking("commit", move |engine| engine.commit(message))
            .await?;
        self.metrics.commits_recorded.inc();
        Ok(LedgerResponse::from(&receipt))
    }

    async fn get_ledger(&self, public_key: String) -> Result<Option<LedgerInfo>, ErrorObjectOwned> {
        let receipt = self
            .blocking("get_ledger", move |engine| engine.ledger(&public_key))
            .await?;
        Ok(receipt.as_ref().map(LedgerInfo::from))
    }

    async fn list_ledgers(&self) -> Result<Vec<LedgerInfo>, ErrorObjectOwned> {
        self.blocking("list_ledgers", |engine| {
            let ledgers = engine.ledgers()?;
            let mut infos = Vec::with_capacity(ledgers.len());
            for ledger in ledgers {
                if let Some(receipt) = engine.ledger(&ledger.public_key)? {
                    infos.push(LedgerInfo::from(&receipt));
                }
            }
            Ok(infos)
        })
        .await
    }

    async fn get_ledger_status(
        &self,
        public_key: String,
        threshold: Option<usize>,
    ) -> Result<LedgerStatusInfo, ErrorObjectOwned> {
        let cluster_size = self.engine.cluster_size();
        let policy = threshold
            .map(QuorumPolicy::new)
            .unwrap_or_else(|| QuorumPolicy::majority(cluster_size));
        let key = public_key.clone();
        let counts = self
            .blocking("get_ledger_status", move |engine| {
                engine.confirmation_counts(&key)
            })
            .await?;
        Ok(LedgerStatusInfo {
            public_key,
            status: policy.status(counts).as_str().to_string(),
            prepared: counts.prepared,
            committed: counts.committed,
            threshold: policy.threshold,
            cluster_size,
        })
    }

    async fn create_account(
        &self,
        proposal: AccountProposal,
    ) -> Result<AccountResponse, ErrorObjectOwned> {
        let receipt = self
            .blocking("create_account", move |engine| {
                engine.create_account(proposal)
            })
            .await?;
        self.metrics.accounts_created.inc();
        Ok(AccountResponse::from(&receipt))
    }

    async fn prepare_account(
        &self,
        message: AccountPrepareMessage,
    ) -> Result<AccountResponse, ErrorObjectOwned> {
        let receipt = self
            .blocking("prepare_account", move |engine| {
                engine.prepare_account(message)
            })
            .await?;
        self.metrics.prepares_accepted.inc();
        Ok(AccountResponse::from(&receipt))
    }

    async fn get_account(&self, code: String) -> Result<Option<AccountInfo>, ErrorObjectOwned> {
        let account = self
            .blocking("get_account", move |engine| engine.account_by_code(&code))
            .await?;
        Ok(account.as_ref().map(AccountInfo::from))
    }

    async fn list_accounts(
        &self,
        ledger_public_key: String,
    ) -> Result<Vec<AccountInfo>, ErrorObjectOwned> {
        let accounts = self
            .blocking("list_accounts", move |engine| {
                engine.accounts(&ledger_public_key)
            })
            .await?;
        Ok(accounts.iter().map(AccountInfo::from).collect())
    }

    async fn create_currency(&self, currency: Currency) -> Result<Currency, ErrorObjectOwned> {
        let currency = self
            .blocking("create_currency", move |engine| {
                engine.create_currency(currency)
            })
            .await?;
        self.metrics.currencies_registered.inc();
        Ok(currency)
    }

    async fn get_currency(&self, name: String) -> Result<Option<Currency>, ErrorObjectOwned> {
        self.blocking("get_currency", move |engine| engine.currency(&name))
            .await
    }

    async fn list_currencies(&self) -> Result<Vec<Currency>, ErrorObjectOwned> {
        self.blocking("list_currencies", |engine| engine.currencies())
            .await
    }

    async fn health(&self) -> Result<HealthInfo, ErrorObjectOwned> {
        let ledgers = self
            .blocking("health", |engine| engine.ledger_count())
            .await?;
        Ok(HealthInfo {
            status: "ok".to_string(),
            node: self.engine.node_id().to_string(),
            peers: self.engine.registry().len(),
            ledgers,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    async fn get_metrics(&self) -> Result<String, ErrorObjectOwned> {
        Ok(self.metrics.encode())
    }
}
