//! Backward-link verification over a block range.

use replica_primitives::SyncRange;
use thiserror::Error;
use tracing::trace;

use crate::{LedgerError, UtilLedger};

/// Outcome of walking a range of blocks.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Verification {
    /// Every adjacent pair in the range is correctly linked.
    Verified,
    /// The block at this index does not link with its neighbour in the walk
    /// direction.
    BrokenAt(u64),
}

impl Verification {
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

#[derive(Debug, Error)]
#[error("verification stopped at block {last_examined}")]
pub struct VerifyError {
    pub last_examined: u64,
    #[source]
    pub source: LedgerError,
}

/// Walks `range` from `start` toward `finish`.
///
/// At each step the next block in walk order is hashed and compared with the
/// current block's `previous_block_hash`. For a descending walk this checks
/// the chain as it was built; for an ascending walk it checks that each block
/// names its successor as predecessor, so an ascending walk over a correctly
/// built chain reports a break at `start`.
pub fn verify_chain<L>(ledger: &L, range: SyncRange) -> Result<Verification, VerifyError>
where
    L: UtilLedger + ?Sized,
{
    let mut current = range.start;

    while let Some(next) = range.step(current) {
        let lookup = |index| {
            ledger.get_block(index).map_err(|source| VerifyError {
                last_examined: current,
                source,
            })
        };

        let current_block = lookup(current)?;
        let next_block = lookup(next)?;

        let next_hash = ledger.hash_block(&next_block);

        if next_hash != current_block.previous_block_hash {
            trace!(current, next, "Backward link broken");
            return Ok(Verification::BrokenAt(current));
        }

        current = next;
    }

    Ok(Verification::Verified)
}
