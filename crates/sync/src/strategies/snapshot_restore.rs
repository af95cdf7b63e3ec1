//! Snapshot restore strategy
//!
//! Rebuilds the local state from zero out of a peer's full delta history.
//! The previous state cannot be recovered, so a rejected attempt leaves the
//! state empty.

use core::fmt;
use core::time::Duration;
use std::sync::Arc;

use async_trait::async_trait;
use replica_ledger::{Ledger, LedgerError};
use replica_primitives::ReplicaId;
use tracing::info;

use super::{receive, retry, Checkpoint, Received, RetryReason, SyncResult, SyncStrategy};
use crate::client::RemoteLedgers;
use crate::SyncError;

pub struct SnapshotRestore {
    remote: Arc<dyn RemoteLedgers>,
    ledger: Arc<dyn Ledger>,
    checkpoint: Checkpoint,
    chunk_timeout: Duration,
}

impl fmt::Debug for SnapshotRestore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotRestore")
            .field("checkpoint", &self.checkpoint)
            .field("chunk_timeout", &self.chunk_timeout)
            .finish_non_exhaustive()
    }
}

impl SnapshotRestore {
    #[must_use]
    pub fn new(
        remote: Arc<dyn RemoteLedgers>,
        ledger: Arc<dyn Ledger>,
        checkpoint: Checkpoint,
        chunk_timeout: Duration,
    ) -> Self {
        Self {
            remote,
            ledger,
            checkpoint,
            chunk_timeout,
        }
    }

    async fn restore(&self, peer: ReplicaId, count: &mut u64) -> Result<Option<RetryReason>, SyncError> {
        let mut stream = self.remote.get_remote_state_snapshot(peer).await?;

        self.ledger.empty_state()?;

        loop {
            let chunk = match receive(&mut stream, self.chunk_timeout).await {
                Received::Chunk(chunk) => chunk,
                Received::Closed => break,
                Received::Stalled => return Ok(Some(RetryReason::Stalled)),
            };

            if chunk.sequence != *count {
                return Ok(Some(RetryReason::OutOfSequence {
                    index: chunk.sequence,
                }));
            }

            if chunk.block_number != self.checkpoint.block_number {
                return Ok(Some(RetryReason::CheckpointMismatch {
                    block_number: chunk.block_number,
                }));
            }

            match self.ledger.apply_state_delta(&chunk.delta, false) {
                Ok(()) => {}
                Err(LedgerError::MalformedDelta { .. }) => {
                    return Ok(Some(RetryReason::MalformedDelta {
                        index: chunk.sequence,
                    }));
                }
                Err(err) => return Err(err.into()),
            }

            *count = count.saturating_add(1);
        }

        if *count == 0 {
            return Ok(Some(RetryReason::Incomplete { received: 0 }));
        }

        let actual = self.ledger.get_current_state_hash()?;

        if actual != self.checkpoint.state_hash {
            return Ok(Some(RetryReason::StateHashMismatch {
                expected: self.checkpoint.state_hash.clone(),
                actual,
            }));
        }

        Ok(None)
    }
}

#[async_trait]
impl SyncStrategy for SnapshotRestore {
    async fn execute(&self, peer: ReplicaId) -> Result<SyncResult, SyncError> {
        info!(
            %peer,
            block_number = self.checkpoint.block_number,
            "Executing snapshot restore"
        );

        let mut count = 0;

        if let Some(reason) = self.restore(peer, &mut count).await? {
            self.ledger.empty_state()?;
            return Ok(retry(self.name(), peer, reason));
        }

        info!(%peer, deltas = count, "Adopted state snapshot from peer");

        Ok(SyncResult::SnapshotAdopted {
            block_number: self.checkpoint.block_number,
            deltas: count,
        })
    }

    fn name(&self) -> &'static str {
        "snapshot_restore"
    }
}
