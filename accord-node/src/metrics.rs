use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

/// Node-wide Prometheus metrics.
pub struct NodeMetrics {
    pub ledgers_created: Counter,
    pub accounts_created: Counter,
    pub currencies_registered: Counter,
    pub prepares_accepted: Counter,
    pub commits_recorded: Counter,
    pub auth_failures: Counter,
    pub broadcasts_sent: Counter,
    pub broadcast_failures: Counter,
    pub ledger_count: Gauge,
    pub registry: Registry,
}

impl NodeMetrics {
    /// Create a new metrics registry with all node metrics registered.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let ledgers_created = Counter::default();
        let accounts_created = Counter::default();
        let currencies_registered = Counter::default();
        let prepares_accepted = Counter::default();
        let commits_recorded = Counter::default();
        let auth_failures = Counter::default();
        let broadcasts_sent = Counter::default();
        let broadcast_failures = Counter::default();
        let ledger_count = Gauge::default();

        registry.register(
            "accord_ledgers_created",
            "Ledgers originated on this node",
            ledgers_created.clone(),
        );
        registry.register(
            "accord_accounts_created",
            "Additional accounts opened on this node",
            accounts_created.clone(),
        );
        registry.register(
            "accord_currencies_registered",
            "Currencies registered on this node",
            currencies_registered.clone(),
        );
        registry.register(
            "accord_prepares_accepted",
            "Prepare messages accepted from peers",
            prepares_accepted.clone(),
        );
        registry.register(
            "accord_commits_recorded",
            "Commit confirmations recorded",
            commits_recorded.clone(),
        );
        registry.register(
            "accord_auth_failures",
            "Messages rejected for unknown sender or bad signature",
            auth_failures.clone(),
        );
        registry.register(
            "accord_broadcasts_sent",
            "Prepare broadcasts delivered to a peer",
            broadcasts_sent.clone(),
        );
        registry.register(
            "accord_broadcast_failures",
            "Prepare broadcasts that failed or timed out",
            broadcast_failures.clone(),
        );
        registry.register(
            "accord_ledger_count",
            "Ledgers stored on this node",
            ledger_count.clone(),
        );

        Self {
            ledgers_created,
            accounts_created,
            currencies_registered,
            prepares_accepted,
            commits_recorded,
            auth_failures,
            broadcasts_sent,
            broadcast_failures,
            ledger_count,
            registry,
        }
    }

    /// Encode all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let mut buf = String::new();
        if let Err(e) = prometheus_client::encoding::text::encode(&mut buf, &self.registry) {
            tracing::warn!("Failed to encode metrics: {}", e);
        }
        buf
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}
