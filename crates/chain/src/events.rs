//! The typed publish/subscribe surface of the blockchain controller.

use cinder_primitives::{BlockLogs, PooledTransaction, SealedBlock};
use tokio::sync::broadcast;

/// Buffered events per subscriber before the oldest are dropped.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// The lifecycle state of the blockchain controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The controller is initializing.
    Starting,
    /// The controller is serving.
    Started,
    /// `stop` was requested; in-flight work is draining.
    Stopping,
    /// The controller has shut down.
    Stopped,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Starting => "starting",
            Self::Started => "started",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// The event hub. Subscribers of one channel see events in FIFO order; for every block,
/// `blockLogs` is published strictly before `block`.
#[derive(Debug)]
pub struct ChainEvents {
    blocks: broadcast::Sender<SealedBlock>,
    block_logs: broadcast::Sender<BlockLogs>,
    pending: broadcast::Sender<PooledTransaction>,
}

impl Default for ChainEvents {
    fn default() -> Self {
        Self {
            blocks: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
            block_logs: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
            pending: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
        }
    }
}

impl ChainEvents {
    /// Subscribes to mined blocks.
    pub fn subscribe_blocks(&self) -> broadcast::Receiver<SealedBlock> {
        self.blocks.subscribe()
    }

    /// Subscribes to per-block log indices. For any block this channel delivers before
    /// the block channel does.
    pub fn subscribe_block_logs(&self) -> broadcast::Receiver<BlockLogs> {
        self.block_logs.subscribe()
    }

    /// Subscribes to pool admissions.
    pub fn subscribe_pending_transactions(&self) -> broadcast::Receiver<PooledTransaction> {
        self.pending.subscribe()
    }

    pub(crate) fn emit_block(&self, block: SealedBlock) {
        let _ = self.blocks.send(block);
    }

    pub(crate) fn emit_block_logs(&self, logs: BlockLogs) {
        let _ = self.block_logs.send(logs);
    }

    pub(crate) fn emit_pending_transaction(&self, tx: PooledTransaction) {
        let _ = self.pending.send(tx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_primitives::Block;

    #[test]
    fn test_events_without_subscribers_are_dropped() {
        let events = ChainEvents::default();
        events.emit_block(Block::new(Default::default(), Vec::new()).seal());
        events.emit_block_logs(BlockLogs::default());
    }

    #[tokio::test]
    async fn test_subscribers_see_fifo_order() {
        let events = ChainEvents::default();
        let mut rx = events.subscribe_block_logs();

        events.emit_block_logs(BlockLogs { block_number: 1, ..Default::default() });
        events.emit_block_logs(BlockLogs { block_number: 2, ..Default::default() });

        assert_eq!(rx.recv().await.unwrap().block_number, 1);
        assert_eq!(rx.recv().await.unwrap().block_number, 2);
    }
}
