use accord_types::confirmation::{ConfirmationCounts, LedgerStatus};

/// Caller-supplied rule for turning confirmation counts into a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuorumPolicy {
    pub threshold: usize,
}

impl QuorumPolicy {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    /// Simple majority of a cluster of `cluster_size` nodes (including self).
    pub fn majority(cluster_size: usize) -> Self {
        Self {
            threshold: cluster_size / 2 + 1,
        }
    }

    pub fn status(&self, counts: ConfirmationCounts) -> LedgerStatus {
        if counts.committed >= self.threshold {
            LedgerStatus::Committed
        } else if counts.prepared >= self.threshold {
            LedgerStatus::Prepared
        } else {
            LedgerStatus::Pending
        }
    }
}
