//! State transfer between replicas.
//!
//! A lagging replica reconstructs its chain and state by pulling block
//! ranges, state deltas or full snapshots from peers that may answer with
//! corrupted data or not at all. [`SyncClient`] produces the streams;
//! [`strategies`] consume them, write into the local ledger and decide
//! whether the result can be adopted.
//!
//! # Example
//!
//! ```rust,ignore
//! use replica_sync::strategies::{BlockCatchup, SyncStrategy};
//!
//! let client = Arc::new(SyncClient::with_peers(peers));
//! let strategy = BlockCatchup::new(client, ledger, SyncRange::new(10, 0), timeout);
//! let result = strategy.execute(peer).await?;
//! ```

use replica_ledger::{LedgerError, VerifyError};
use replica_primitives::ReplicaId;
use thiserror::Error;

pub mod chunk;
pub mod client;
pub mod config;
pub mod peers;
pub mod policy;
pub mod strategies;
pub mod stream;

pub use chunk::{BlockChunk, DeltaChunk, SnapshotChunk};
pub use client::{RemoteLedgers, SyncClient};
pub use config::SyncConfig;
pub use peers::{PeerDirectory, PeerMap};
pub use policy::{AlwaysNormal, PolicyRule, RequestKind, Response, ResponsePolicy, RulePolicy};
pub use strategies::{Checkpoint, RetryReason, SyncResult, SyncStrategy};
pub use stream::ChunkStream;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    #[error("unknown peer {peer}")]
    UnknownPeer { peer: ReplicaId },

    #[error(transparent)]
    UnsupportedResponse(#[from] policy::UnsupportedResponse),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Verify(#[from] VerifyError),
}
