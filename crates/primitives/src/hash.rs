#[cfg(test)]
#[path = "tests/hash.rs"]
mod tests;

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::block::Block;
use crate::encoding::fold_transactions;

const FOLD_PREFIX: &[u8] = b"BlockHash:";
const SEPARATOR: &[u8] = b"-";

/// Hash function linking consecutive blocks.
///
/// Every scheme hashes the folded transaction payloads together with the
/// block's state hash and consensus metadata. The previous-block hash is not
/// an input.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashScheme {
    /// `BlockHash:<fold>-<state_hash>-<metadata>`. Fast, not collision
    /// resistant.
    #[default]
    Fold,
    /// SHA-256 over the same preimage as [`HashScheme::Fold`].
    Sha256,
}

impl HashScheme {
    #[must_use]
    pub fn hash_block(self, block: &Block) -> Vec<u8> {
        let preimage = fold_preimage(block);

        match self {
            Self::Fold => preimage,
            Self::Sha256 => Sha256::digest(&preimage).to_vec(),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fold => "fold",
            Self::Sha256 => "sha256",
        }
    }
}

fn fold_preimage(block: &Block) -> Vec<u8> {
    let fold = fold_transactions(&block.transactions);

    let mut out = Vec::with_capacity(
        FOLD_PREFIX.len()
            + fold.len()
            + block.state_hash.len()
            + block.consensus_metadata.len()
            + 2 * SEPARATOR.len(),
    );

    out.extend_from_slice(FOLD_PREFIX);
    out.extend_from_slice(&fold);
    out.extend_from_slice(SEPARATOR);
    out.extend_from_slice(&block.state_hash);
    out.extend_from_slice(SEPARATOR);
    out.extend_from_slice(&block.consensus_metadata);

    out
}

impl fmt::Display for HashScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown hash scheme: {0}")]
pub struct UnknownHashScheme(String);

impl FromStr for HashScheme {
    type Err = UnknownHashScheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fold" => Ok(Self::Fold),
            "sha256" => Ok(Self::Sha256),
            other => Err(UnknownHashScheme(other.to_owned())),
        }
    }
}
