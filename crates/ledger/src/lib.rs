//! Local ledger: a hash-linked block store coupled to an integer application
//! state that moves forward or backward through state deltas.
//!
//! Capabilities are split into narrow traits so each collaborator only sees
//! what it needs:
//!
//! - [`ReadOnlyLedger`]: what peers and the agreement layer may read
//! - [`UtilLedger`]: block hashing and chain verification
//! - [`WritableLedger`]: what state transfer may mutate
//! - [`Ledger`]: the union, implemented for anything that has all three
//!
//! [`MemoryLedger`] is the in-process implementation.

use std::sync::Arc;

use replica_primitives::encoding::VarintError;
use replica_primitives::{Block, SyncRange};
use thiserror::Error;

mod memory;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod verify;

pub use memory::MemoryLedger;
pub use verify::{Verification, VerifyError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LedgerError {
    /// No block is stored at the requested index. During state transfer this
    /// is the ordinary end-of-range signal.
    #[error("block {index} not found")]
    NotFound { index: u64 },

    /// The delta bytes are not a varint. State is left untouched.
    #[error("state delta {delta:02x?} is not a valid varint")]
    MalformedDelta {
        delta: Vec<u8>,
        #[source]
        source: VarintError,
    },
}

impl LedgerError {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Read access to a ledger, local or remote.
pub trait ReadOnlyLedger: Send + Sync {
    fn get_block(&self, index: u64) -> Result<Arc<Block>, LedgerError>;

    fn get_current_state_hash(&self) -> Result<Vec<u8>, LedgerError>;

    fn get_blockchain_size(&self) -> Result<u64, LedgerError>;
}

pub trait UtilLedger: ReadOnlyLedger {
    fn hash_block(&self, block: &Block) -> Vec<u8>;

    /// Walks `start` toward `finish` and reports the first broken backward
    /// link. See [`verify::verify_chain`].
    fn verify_blockchain(&self, start: u64, finish: u64) -> Result<Verification, VerifyError> {
        verify::verify_chain(self, SyncRange::new(start, finish))
    }
}

/// Mutations used while transferring state.
pub trait WritableLedger: Send + Sync {
    /// Stores `block` at `index`, replacing whatever was there.
    fn put_block(&self, index: u64, block: Block) -> Result<(), LedgerError>;

    /// Adds (or with `unapply`, subtracts) the decoded delta to the state.
    fn apply_state_delta(&self, delta: &[u8], unapply: bool) -> Result<(), LedgerError>;

    fn empty_state(&self) -> Result<(), LedgerError>;
}

/// Unrestricted union of reads, utilities and updates.
pub trait Ledger: UtilLedger + WritableLedger {}

impl<T: UtilLedger + WritableLedger + ?Sized> Ledger for T {}
