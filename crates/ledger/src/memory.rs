use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use replica_primitives::encoding::{decode_uvarint, encode_state_hash};
use replica_primitives::{Block, HashScheme};
use tracing::{debug, trace};

use crate::{LedgerError, ReadOnlyLedger, UtilLedger, WritableLedger};

#[derive(Debug, Default)]
struct Inner {
    blocks: BTreeMap<u64, Arc<Block>>,
    block_height: u64,
    state: u64,
}

/// In-memory ledger.
///
/// Blocks, height and state live behind a single lock that every accessor
/// takes for the duration of the field access only.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    inner: Mutex<Inner>,
    scheme: HashScheme,
}

impl MemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_hash_scheme(scheme: HashScheme) -> Self {
        Self {
            inner: Mutex::default(),
            scheme,
        }
    }

    #[must_use]
    pub const fn hash_scheme(&self) -> HashScheme {
        self.scheme
    }

    /// Indices currently stored, ascending.
    #[must_use]
    pub fn stored_indices(&self) -> Vec<u64> {
        self.inner.lock().blocks.keys().copied().collect()
    }
}

impl ReadOnlyLedger for MemoryLedger {
    fn get_block(&self, index: u64) -> Result<Arc<Block>, LedgerError> {
        self.inner
            .lock()
            .blocks
            .get(&index)
            .cloned()
            .ok_or(LedgerError::NotFound { index })
    }

    fn get_current_state_hash(&self) -> Result<Vec<u8>, LedgerError> {
        let state = self.inner.lock().state;

        Ok(encode_state_hash(state))
    }

    fn get_blockchain_size(&self) -> Result<u64, LedgerError> {
        Ok(self.inner.lock().block_height)
    }
}

impl UtilLedger for MemoryLedger {
    fn hash_block(&self, block: &Block) -> Vec<u8> {
        self.scheme.hash_block(block)
    }
}

impl WritableLedger for MemoryLedger {
    fn put_block(&self, index: u64, block: Block) -> Result<(), LedgerError> {
        trace!(index, hash = ?self.scheme.hash_block(&block), "Inserting block");

        let mut inner = self.inner.lock();

        drop(inner.blocks.insert(index, Arc::new(block)));

        if index >= inner.block_height {
            inner.block_height = index.saturating_add(1);
        }

        Ok(())
    }

    fn apply_state_delta(&self, delta: &[u8], unapply: bool) -> Result<(), LedgerError> {
        let (value, _) = decode_uvarint(delta).map_err(|source| LedgerError::MalformedDelta {
            delta: delta.to_vec(),
            source,
        })?;

        let mut inner = self.inner.lock();

        inner.state = if unapply {
            inner.state.wrapping_sub(value)
        } else {
            inner.state.wrapping_add(value)
        };

        debug!(value, unapply, state = inner.state, "Applied state delta");

        Ok(())
    }

    fn empty_state(&self) -> Result<(), LedgerError> {
        self.inner.lock().state = 0;

        Ok(())
    }
}
