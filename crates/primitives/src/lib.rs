//! Data types and encodings shared by every replica component.
//!
//! - [`block`]: blocks and transactions as stored in the ledger
//! - [`encoding`]: unsigned varint state deltas and the canonical state hash
//! - [`hash`]: block hashing schemes used to link the chain
//! - [`range`]: directional `(start, finish)` index ranges
//! - [`identity`]: replica identities used to key peer requests

pub mod block;
pub mod encoding;
pub mod hash;
pub mod identity;
pub mod range;

pub use block::{Block, Transaction, GENESIS_PREVIOUS_HASH};
pub use hash::HashScheme;
pub use identity::ReplicaId;
pub use range::{Direction, SyncRange};
