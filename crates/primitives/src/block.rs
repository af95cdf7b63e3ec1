#[cfg(test)]
#[path = "tests/block.rs"]
mod tests;

#[cfg(feature = "borsh")]
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Previous-block hash carried by the block at index 0.
pub const GENESIS_PREVIOUS_HASH: &[u8] = b"Genesis";

/// An ordered transaction. The payload is opaque to the ledger except as
/// hashing input and as a state delta.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "borsh", derive(BorshSerialize, BorshDeserialize))]
pub struct Transaction {
    pub txid: String,
    pub payload: Vec<u8>,
}

impl Transaction {
    #[must_use]
    pub fn new(txid: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            txid: txid.into(),
            payload,
        }
    }

    #[must_use]
    pub fn has_payload(&self) -> bool {
        !self.payload.is_empty()
    }
}

/// A block, immutable once stored.
///
/// Blocks are linked backwards: the hash of the block at index `n` must equal
/// the `previous_block_hash` of the block at index `n + 1`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "borsh", derive(BorshSerialize, BorshDeserialize))]
pub struct Block {
    pub transactions: Vec<Transaction>,
    pub previous_block_hash: Vec<u8>,
    pub state_hash: Vec<u8>,
    pub consensus_metadata: Vec<u8>,
}

impl Block {
    #[must_use]
    pub const fn new(
        transactions: Vec<Transaction>,
        previous_block_hash: Vec<u8>,
        state_hash: Vec<u8>,
        consensus_metadata: Vec<u8>,
    ) -> Self {
        Self {
            transactions,
            previous_block_hash,
            state_hash,
            consensus_metadata,
        }
    }

    /// Transaction payloads in block order, i.e. the state deltas this block
    /// carries.
    pub fn payloads(&self) -> impl Iterator<Item = &[u8]> {
        self.transactions.iter().map(|tx| tx.payload.as_slice())
    }
}
