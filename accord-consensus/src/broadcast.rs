use std::sync::Arc;

use accord_types::message::OutboundPrepare;
use accord_types::node::ConsensusNode;

/// Outbound fan-out of ledger and account prepares.
///
/// Implementations must return without waiting for delivery. Failures are
/// the implementation's to log; they never reach the engine.
pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, message: OutboundPrepare, targets: Vec<ConsensusNode>);
}

/// Discards every broadcast. Useful for single-node setups.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBroadcaster;

impl Broadcaster for NoopBroadcaster {
    fn broadcast(&self, _message: OutboundPrepare, _targets: Vec<ConsensusNode>) {}
}

impl<B: Broadcaster + ?Sized> Broadcaster for Arc<B> {
    fn broadcast(&self, message: OutboundPrepare, targets: Vec<ConsensusNode>) {
        (**self).broadcast(message, targets)
    }
}
