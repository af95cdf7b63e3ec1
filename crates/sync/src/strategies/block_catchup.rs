//! Block catchup strategy
//!
//! Copies a range of blocks from a peer and checks the hash links of the
//! result. Blocks written by a rejected attempt are left in place; a later
//! attempt over the same range overwrites them.
//!
//! A single block has no internal link. It is adopted only when it links to
//! a local neighbour or matches the checkpoint.

use core::fmt;
use core::time::Duration;
use std::sync::Arc;

use async_trait::async_trait;
use replica_ledger::{Ledger, Verification};
use replica_primitives::{ReplicaId, SyncRange};
use tracing::info;

use super::{receive, retry, Checkpoint, Received, RetryReason, SyncResult, SyncStrategy};
use crate::client::RemoteLedgers;
use crate::SyncError;

pub struct BlockCatchup {
    remote: Arc<dyn RemoteLedgers>,
    ledger: Arc<dyn Ledger>,
    range: SyncRange,
    checkpoint: Option<Checkpoint>,
    chunk_timeout: Duration,
}

impl fmt::Debug for BlockCatchup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockCatchup")
            .field("range", &self.range)
            .field("checkpoint", &self.checkpoint)
            .field("chunk_timeout", &self.chunk_timeout)
            .finish_non_exhaustive()
    }
}

impl BlockCatchup {
    #[must_use]
    pub fn new(
        remote: Arc<dyn RemoteLedgers>,
        ledger: Arc<dyn Ledger>,
        range: SyncRange,
        chunk_timeout: Duration,
    ) -> Self {
        Self {
            remote,
            ledger,
            range,
            checkpoint: None,
            chunk_timeout,
        }
    }

    /// Also require the adopted chain to contain the checkpoint block.
    #[must_use]
    pub fn with_checkpoint(mut self, checkpoint: Checkpoint) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    /// Writes streamed blocks in walk order. Returns the number written, or
    /// why the stream was unusable.
    async fn copy_blocks(&self, peer: ReplicaId) -> Result<Result<u64, RetryReason>, SyncError> {
        let mut stream = self
            .remote
            .get_remote_blocks(peer, self.range.start, self.range.finish)
            .await?;

        let mut expected = self.range.iter();
        let mut written = 0_u64;

        loop {
            let chunk = match receive(&mut stream, self.chunk_timeout).await {
                Received::Chunk(chunk) => chunk,
                Received::Closed => return Ok(Ok(written)),
                Received::Stalled => return Ok(Err(RetryReason::Stalled)),
            };

            for (index, block) in chunk.range.iter().zip(chunk.blocks) {
                if expected.next() != Some(index) {
                    return Ok(Err(RetryReason::OutOfSequence { index }));
                }

                self.ledger.put_block(index, block)?;
                written = written.saturating_add(1);
            }
        }
    }

    /// Checks the link from `upper` down to `lower`. `None` when either
    /// block is not held locally.
    fn check_boundary(&self, upper: u64, lower: u64) -> Result<Option<Verification>, SyncError> {
        for index in [upper, lower] {
            match self.ledger.get_block(index) {
                Ok(_) => {}
                Err(err) if err.is_not_found() => return Ok(None),
                Err(err) => return Err(err.into()),
            }
        }

        Ok(Some(self.ledger.verify_blockchain(upper, lower)?))
    }

    fn matches_checkpoint(&self, checkpoint: &Checkpoint) -> Result<bool, SyncError> {
        let block = match self.ledger.get_block(checkpoint.block_number) {
            Ok(block) => block,
            Err(err) if err.is_not_found() => return Ok(false),
            Err(err) => return Err(err.into()),
        };

        let hash_matches = checkpoint
            .block_hash
            .as_ref()
            .map_or(true, |hash| *hash == self.ledger.hash_block(&block));

        Ok(hash_matches && block.state_hash == checkpoint.state_hash)
    }
}

#[async_trait]
impl SyncStrategy for BlockCatchup {
    async fn execute(&self, peer: ReplicaId) -> Result<SyncResult, SyncError> {
        info!(%peer, range = %self.range, "Executing block catchup");

        let written = match self.copy_blocks(peer).await? {
            Ok(written) => written,
            Err(reason) => return Ok(retry(self.name(), peer, reason)),
        };

        if written != self.range.len() {
            return Ok(retry(
                self.name(),
                peer,
                RetryReason::Incomplete { received: written },
            ));
        }

        let (top, bottom) = (self.range.highest(), self.range.lowest());

        if let Verification::BrokenAt(index) = self.ledger.verify_blockchain(top, bottom)? {
            return Ok(retry(self.name(), peer, RetryReason::BrokenLink { index }));
        }

        let neighbours = [
            top.checked_add(1).map(|above| (above, top)),
            bottom.checked_sub(1).map(|below| (bottom, below)),
        ];

        let mut linked = top != bottom;

        for (upper, lower) in neighbours.into_iter().flatten() {
            match self.check_boundary(upper, lower)? {
                Some(Verification::BrokenAt(index)) => {
                    return Ok(retry(self.name(), peer, RetryReason::BrokenLink { index }));
                }
                Some(Verification::Verified) => linked = true,
                None => {}
            }
        }

        if !linked && self.checkpoint.is_none() {
            let reason = RetryReason::Unverified { index: top };
            return Ok(retry(self.name(), peer, reason));
        }

        if let Some(checkpoint) = &self.checkpoint {
            if !self.matches_checkpoint(checkpoint)? {
                let reason = RetryReason::CheckpointMismatch {
                    block_number: checkpoint.block_number,
                };
                return Ok(retry(self.name(), peer, reason));
            }
        }

        info!(%peer, range = %self.range, blocks = written, "Adopted blocks from peer");

        Ok(SyncResult::BlocksAdopted { range: self.range })
    }

    fn name(&self) -> &'static str {
        "block_catchup"
    }
}
