//! Deterministic fixtures for exercising state transfer without a network.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use replica_primitives::encoding::{encode_state_hash, encode_uvarint};
use replica_primitives::{Block, HashScheme, Transaction};

use crate::{LedgerError, ReadOnlyLedger, UtilLedger};

/// Previous-block hash carried by a simulated block 0.
pub const SIMULATED_GENESIS_HASH: &[u8] = b"GenesisHash";

/// Read-only peer whose block `n` is derived from `n` alone.
///
/// Block `n` carries a single transaction with payload `varint(n)`, so
/// replaying blocks `0..=n` from an empty state yields `n * (n + 1) / 2`.
#[derive(Debug, Default)]
pub struct SimulatedLedger {
    height: AtomicU64,
    scheme: HashScheme,
}

impl SimulatedLedger {
    #[must_use]
    pub const fn new(height: u64) -> Self {
        Self::with_hash_scheme(height, HashScheme::Fold)
    }

    #[must_use]
    pub const fn with_hash_scheme(height: u64, scheme: HashScheme) -> Self {
        Self {
            height: AtomicU64::new(height),
            scheme,
        }
    }

    /// Grows (or shrinks) the simulated chain.
    pub fn advance_to(&self, height: u64) {
        self.height.store(height, Ordering::Release);
    }

    #[must_use]
    pub fn height(&self) -> u64 {
        self.height.load(Ordering::Acquire)
    }

    /// Application state after block `n` has been applied.
    #[must_use]
    pub const fn state(n: u64) -> u64 {
        if n % 2 == 0 {
            (n / 2).wrapping_mul(n.wrapping_add(1))
        } else {
            (n / 2 + 1).wrapping_mul(n)
        }
    }

    #[must_use]
    pub fn state_hash(n: u64) -> Vec<u8> {
        encode_state_hash(Self::state(n))
    }

    #[must_use]
    pub fn state_delta(n: u64) -> Vec<u8> {
        encode_uvarint(n)
    }

    /// Hash of block `n`, or the genesis sentinel when `n` is `None`.
    #[must_use]
    pub fn block_hash(&self, n: Option<u64>) -> Vec<u8> {
        n.map_or_else(
            || SIMULATED_GENESIS_HASH.to_vec(),
            |n| self.scheme.hash_block(&Self::unlinked_block(n)),
        )
    }

    #[must_use]
    pub fn block(&self, n: u64) -> Block {
        let mut block = Self::unlinked_block(n);
        block.previous_block_hash = self.block_hash(n.checked_sub(1));
        block
    }

    fn unlinked_block(n: u64) -> Block {
        Block::new(
            vec![Transaction::new(format!("sim-{n}"), Self::state_delta(n))],
            Vec::new(),
            Self::state_hash(n),
            format!("ConsensusMetaData:{n}").into_bytes(),
        )
    }
}

impl ReadOnlyLedger for SimulatedLedger {
    fn get_block(&self, index: u64) -> Result<Arc<Block>, LedgerError> {
        if index >= self.height() {
            return Err(LedgerError::NotFound { index });
        }

        Ok(Arc::new(self.block(index)))
    }

    fn get_current_state_hash(&self) -> Result<Vec<u8>, LedgerError> {
        Ok(self
            .height()
            .checked_sub(1)
            .map_or_else(|| encode_state_hash(0), Self::state_hash))
    }

    fn get_blockchain_size(&self) -> Result<u64, LedgerError> {
        Ok(self.height())
    }
}

impl UtilLedger for SimulatedLedger {
    fn hash_block(&self, block: &Block) -> Vec<u8> {
        self.scheme.hash_block(block)
    }
}
