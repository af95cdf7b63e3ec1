#[cfg(test)]
#[path = "tests/chunk.rs"]
mod tests;

use borsh::{BorshDeserialize, BorshSerialize};
use replica_primitives::{Block, SyncRange, Transaction};
use serde::{Deserialize, Serialize};

/// Previous hash of the block served in place of a real one by a corrupt peer.
pub const CORRUPT_BLOCK_HASH: &[u8] = b"GARBAGE_BLOCK_HASH";
pub const CORRUPT_STATE_HASH: &[u8] = b"GARBAGE_STATE_HASH";
pub const CORRUPT_PAYLOAD: &[u8] = b"GARBAGE_PAYLOAD";
/// Delta served in place of a real one by a corrupt peer.
pub const CORRUPT_DELTA: &[u8] = b"GARBAGE_DELTA";

/// Blocks for `range`, in walk order.
#[derive(
    Clone, Debug, Eq, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct BlockChunk {
    pub range: SyncRange,
    pub blocks: Vec<Block>,
}

/// State deltas of the blocks in `range`.
#[derive(
    Clone, Debug, Eq, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct DeltaChunk {
    pub range: SyncRange,
    pub deltas: Vec<Vec<u8>>,
}

/// One delta of a full-state snapshot.
#[derive(
    Clone, Debug, Eq, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct SnapshotChunk {
    pub delta: Vec<u8>,
    /// Position within the snapshot, starting at zero.
    pub sequence: u64,
    /// Block whose post-state the snapshot reproduces.
    pub block_number: u64,
}

pub(crate) fn corrupt_block() -> Block {
    Block::new(
        vec![Transaction::new("garbage", CORRUPT_PAYLOAD.to_vec())],
        CORRUPT_BLOCK_HASH.to_vec(),
        CORRUPT_STATE_HASH.to_vec(),
        Vec::new(),
    )
}
