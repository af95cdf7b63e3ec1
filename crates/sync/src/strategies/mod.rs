//! Consumer side of state transfer.
//!
//! A strategy pulls one kind of stream from one peer, writes what arrives
//! into the local ledger, and checks the outcome against the chain itself or
//! against an externally trusted [`Checkpoint`]. Strategies never retry on
//! their own: a [`SyncResult::RetryNeeded`] tells the caller to pick another
//! peer or range.

use core::fmt;
use core::time::Duration;

use async_trait::async_trait;
use replica_primitives::{ReplicaId, SyncRange};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::warn;

use crate::stream::ChunkStream;
use crate::SyncError;

mod block_catchup;
mod snapshot_restore;
mod state_replay;

pub use block_catchup::BlockCatchup;
pub use snapshot_restore::SnapshotRestore;
pub use state_replay::StateReplay;

#[async_trait]
pub trait SyncStrategy: Send + Sync {
    async fn execute(&self, peer: ReplicaId) -> Result<SyncResult, SyncError>;

    fn name(&self) -> &'static str;
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SyncResult {
    /// Every block in the range was written and links correctly.
    BlocksAdopted { range: SyncRange },

    /// Deltas for the range were applied (or unapplied for a descending
    /// range) and the state matches the checkpoint.
    DeltasAdopted { range: SyncRange, deltas: usize },

    /// State was rebuilt from zero and matches the checkpoint.
    SnapshotAdopted { block_number: u64, deltas: u64 },

    /// The peer's answer was unusable. Local state is as described by the
    /// strategy that returned this.
    RetryNeeded { reason: RetryReason },
}

impl SyncResult {
    #[must_use]
    pub const fn is_adopted(&self) -> bool {
        !matches!(self, Self::RetryNeeded { .. })
    }

    #[must_use]
    pub const fn retry_reason(&self) -> Option<&RetryReason> {
        match self {
            Self::RetryNeeded { reason } => Some(reason),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum RetryReason {
    /// The stream closed before the range was covered.
    Incomplete { received: u64 },
    /// The block at `index` does not link with its neighbour.
    BrokenLink { index: u64 },
    /// The adopted data does not reproduce the trusted checkpoint.
    CheckpointMismatch { block_number: u64 },
    /// The delta at `index` could not be decoded.
    MalformedDelta { index: u64 },
    StateHashMismatch { expected: Vec<u8>, actual: Vec<u8> },
    /// A chunk arrived for an index or sequence number other than the next
    /// one expected.
    OutOfSequence { index: u64 },
    /// No chunk arrived within the chunk timeout.
    Stalled,
    /// A lone block with no local neighbour and no checkpoint to check it
    /// against.
    Unverified { index: u64 },
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incomplete { received } => {
                write!(f, "stream ended after {received} chunks")
            }
            Self::BrokenLink { index } => write!(f, "chain broken at block {index}"),
            Self::CheckpointMismatch { block_number } => {
                write!(f, "checkpoint mismatch at block {block_number}")
            }
            Self::MalformedDelta { index } => write!(f, "malformed delta at {index}"),
            Self::StateHashMismatch { expected, actual } => write!(
                f,
                "state hash {} does not match expected {}",
                String::from_utf8_lossy(actual),
                String::from_utf8_lossy(expected)
            ),
            Self::OutOfSequence { index } => write!(f, "unexpected chunk {index}"),
            Self::Stalled => f.write_str("peer stalled"),
            Self::Unverified { index } => write!(f, "nothing to verify block {index} against"),
        }
    }
}

/// Trusted reference point obtained out of band, typically from agreement.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub block_number: u64,
    pub state_hash: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<Vec<u8>>,
}

impl Checkpoint {
    #[must_use]
    pub const fn new(block_number: u64, state_hash: Vec<u8>) -> Self {
        Self {
            block_number,
            state_hash,
            block_hash: None,
        }
    }

    #[must_use]
    pub fn with_block_hash(mut self, block_hash: Vec<u8>) -> Self {
        self.block_hash = Some(block_hash);
        self
    }
}

enum Received<T> {
    Chunk(T),
    Closed,
    Stalled,
}

/// Waits up to `budget` for the next chunk, cancelling the stream if the
/// peer stalls.
async fn receive<T>(stream: &mut ChunkStream<T>, budget: Duration) -> Received<T> {
    let next = timeout(budget, stream.next_chunk()).await;

    match next {
        Ok(Some(chunk)) => Received::Chunk(chunk),
        Ok(None) => Received::Closed,
        Err(_elapsed) => {
            stream.cancel();
            Received::Stalled
        }
    }
}

fn retry(strategy: &'static str, peer: ReplicaId, reason: RetryReason) -> SyncResult {
    warn!(strategy, %peer, %reason, "Sync attempt rejected, retry needed");

    SyncResult::RetryNeeded { reason }
}
