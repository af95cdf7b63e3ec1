//! State replay strategy
//!
//! Moves the local state along a range of blocks using only their deltas.
//! An ascending range applies deltas, a descending range unapplies them,
//! rolling the state back. A rejected attempt reverts every delta it applied.

use core::fmt;
use core::time::Duration;
use std::sync::Arc;

use async_trait::async_trait;
use replica_ledger::{Ledger, LedgerError};
use replica_primitives::{Direction, ReplicaId, SyncRange};
use tracing::{debug, info};

use super::{receive, retry, Checkpoint, Received, RetryReason, SyncResult, SyncStrategy};
use crate::client::RemoteLedgers;
use crate::SyncError;

pub struct StateReplay {
    remote: Arc<dyn RemoteLedgers>,
    ledger: Arc<dyn Ledger>,
    range: SyncRange,
    checkpoint: Checkpoint,
    chunk_timeout: Duration,
}

impl fmt::Debug for StateReplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateReplay")
            .field("range", &self.range)
            .field("checkpoint", &self.checkpoint)
            .field("chunk_timeout", &self.chunk_timeout)
            .finish_non_exhaustive()
    }
}

impl StateReplay {
    #[must_use]
    pub fn new(
        remote: Arc<dyn RemoteLedgers>,
        ledger: Arc<dyn Ledger>,
        range: SyncRange,
        checkpoint: Checkpoint,
        chunk_timeout: Duration,
    ) -> Self {
        Self {
            remote,
            ledger,
            range,
            checkpoint,
            chunk_timeout,
        }
    }

    fn unapply(&self) -> bool {
        self.range.direction() == Direction::Descending
    }

    /// Applies streamed deltas, recording each one in `applied`.
    async fn replay(
        &self,
        peer: ReplicaId,
        applied: &mut Vec<Vec<u8>>,
    ) -> Result<Option<RetryReason>, SyncError> {
        let mut stream = self
            .remote
            .get_remote_state_deltas(peer, self.range.start, self.range.finish)
            .await?;

        let mut expected = self.range.iter();
        let mut blocks = 0_u64;

        loop {
            let chunk = match receive(&mut stream, self.chunk_timeout).await {
                Received::Chunk(chunk) => chunk,
                Received::Closed => break,
                Received::Stalled => return Ok(Some(RetryReason::Stalled)),
            };

            for index in chunk.range {
                if expected.next() != Some(index) {
                    return Ok(Some(RetryReason::OutOfSequence { index }));
                }
                blocks = blocks.saturating_add(1);
            }

            for delta in chunk.deltas {
                match self.ledger.apply_state_delta(&delta, self.unapply()) {
                    Ok(()) => applied.push(delta),
                    Err(LedgerError::MalformedDelta { .. }) => {
                        let index = chunk.range.start;
                        return Ok(Some(RetryReason::MalformedDelta { index }));
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }

        if blocks != self.range.len() {
            return Ok(Some(RetryReason::Incomplete { received: blocks }));
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

    fn revert(&self, applied: &[Vec<u8>]) -> Result<(), SyncError> {
        debug!(deltas = applied.len(), "Reverting replayed deltas");

        for delta in applied.iter().rev() {
            self.ledger.apply_state_delta(delta, !self.unapply())?;
        }

        Ok(())
    }
}

#[async_trait]
impl SyncStrategy for StateReplay {
    async fn execute(&self, peer: ReplicaId) -> Result<SyncResult, SyncError> {
        info!(%peer, range = %self.range, "Executing state replay");

        let mut applied = Vec::new();

        match self.replay(peer, &mut applied).await {
            Ok(None) => {}
            Ok(Some(reason)) => {
                self.revert(&applied)?;
                return Ok(retry(self.name(), peer, reason));
            }
            Err(err) => {
                self.revert(&applied)?;
                return Err(err);
            }
        }

        info!(
            %peer,
            range = %self.range,
            deltas = applied.len(),
            "Adopted state deltas from peer"
        );

        Ok(SyncResult::DeltasAdopted {
            range: self.range,
            deltas: applied.len(),
        })
    }

    fn name(&self) -> &'static str {
        "state_replay"
    }
}
