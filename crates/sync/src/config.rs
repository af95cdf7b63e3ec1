//! Runtime settings for the synchronization client and strategies.

use core::time::Duration;

/// Default bound of each chunk channel. A capacity of one keeps the producer
/// at most one chunk ahead of the consumer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1;

/// Default wait for the next chunk before a peer is considered stalled.
pub const DEFAULT_CHUNK_TIMEOUT_MS: u64 = 5_000;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SyncConfig {
    /// Chunks buffered between producer and consumer. Zero is treated as one.
    pub channel_capacity: usize,

    /// Longest a strategy waits for a single chunk.
    pub chunk_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            chunk_timeout: Duration::from_millis(DEFAULT_CHUNK_TIMEOUT_MS),
        }
    }
}
