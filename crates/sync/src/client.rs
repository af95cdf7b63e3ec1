//! Client side of state transfer.
//!
//! Every request resolves the peer, asks the response policy how that peer
//! answers, and spawns a producer task that walks the peer's ledger and
//! feeds a [`ChunkStream`]. The producer stops at the first index the peer
//! does not have, at the end of the range, or when the consumer cancels.

use core::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use replica_ledger::ReadOnlyLedger;
use replica_primitives::{ReplicaId, SyncRange};
use tracing::{debug, warn};

use crate::chunk::{corrupt_block, BlockChunk, DeltaChunk, SnapshotChunk, CORRUPT_DELTA};
use crate::config::SyncConfig;
use crate::peers::PeerDirectory;
use crate::policy::{AlwaysNormal, RequestKind, Response, ResponsePolicy};
use crate::stream::{channel, ChunkSender, ChunkStream};
use crate::SyncError;

/// Access to the ledgers of other replicas.
///
/// Ranges are inclusive and may run in either direction. A stream that ends
/// early is not an error: the peer either ran out of blocks or chose not to
/// answer, and the caller decides what to do next.
#[async_trait]
pub trait RemoteLedgers: Send + Sync {
    async fn get_remote_blocks(
        &self,
        peer: ReplicaId,
        start: u64,
        finish: u64,
    ) -> Result<ChunkStream<BlockChunk>, SyncError>;

    /// Every state delta of the peer's chain, from block 0 up to its head.
    async fn get_remote_state_snapshot(
        &self,
        peer: ReplicaId,
    ) -> Result<ChunkStream<SnapshotChunk>, SyncError>;

    async fn get_remote_state_deltas(
        &self,
        peer: ReplicaId,
        start: u64,
        finish: u64,
    ) -> Result<ChunkStream<DeltaChunk>, SyncError>;
}

pub struct SyncClient {
    peers: Arc<dyn PeerDirectory>,
    policy: Arc<dyn ResponsePolicy>,
    config: SyncConfig,
}

impl fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SyncClient {
    #[must_use]
    pub fn new(
        peers: Arc<dyn PeerDirectory>,
        policy: Arc<dyn ResponsePolicy>,
        config: SyncConfig,
    ) -> Self {
        Self {
            peers,
            policy,
            config,
        }
    }

    /// Client whose peers always answer honestly.
    #[must_use]
    pub fn with_peers(peers: Arc<dyn PeerDirectory>) -> Self {
        Self::new(peers, Arc::new(AlwaysNormal), SyncConfig::default())
    }

    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn resolve(&self, peer: ReplicaId) -> Result<Arc<dyn ReadOnlyLedger>, SyncError> {
        self.peers
            .resolve(peer)
            .ok_or(SyncError::UnknownPeer { peer })
    }

    fn respond(&self, kind: RequestKind, peer: ReplicaId) -> Result<Response, SyncError> {
        let response = self.policy.respond(kind, peer)?;

        if response != Response::Normal {
            warn!(%peer, %kind, %response, "Peer serving faulty response");
        }

        Ok(response)
    }

    fn stream_deltas(
        &self,
        peer: ReplicaId,
        ledger: Arc<dyn ReadOnlyLedger>,
        range: SyncRange,
        response: Response,
    ) -> ChunkStream<DeltaChunk> {
        if response == Response::Timeout {
            return ChunkStream::closed();
        }

        let (sender, stream) = channel(self.config.channel_capacity);
        let forged = (response == Response::Corrupt).then(|| range.midpoint());

        drop(tokio::spawn(produce_deltas(
            peer, ledger, range, forged, sender,
        )));

        stream
    }
}

#[async_trait]
impl RemoteLedgers for SyncClient {
    async fn get_remote_blocks(
        &self,
        peer: ReplicaId,
        start: u64,
        finish: u64,
    ) -> Result<ChunkStream<BlockChunk>, SyncError> {
        let ledger = self.resolve(peer)?;
        let response = self.respond(RequestKind::Blocks, peer)?;

        if response == Response::Timeout {
            return Ok(ChunkStream::closed());
        }

        let range = SyncRange::new(start, finish);
        let (sender, stream) = channel(self.config.channel_capacity);
        let forged = (response == Response::Corrupt).then(|| range.midpoint());

        debug!(%peer, %range, "Requesting blocks");

        drop(tokio::spawn(produce_blocks(
            peer, ledger, range, forged, sender,
        )));

        Ok(stream)
    }

    async fn get_remote_state_snapshot(
        &self,
        peer: ReplicaId,
    ) -> Result<ChunkStream<SnapshotChunk>, SyncError> {
        let ledger = self.resolve(peer)?;
        let response = self.respond(RequestKind::Snapshot, peer)?;

        if response == Response::Timeout {
            return Ok(ChunkStream::closed());
        }

        let Some(block_number) = ledger.get_blockchain_size()?.checked_sub(1) else {
            debug!(%peer, "Peer has no blocks to snapshot");
            return Ok(ChunkStream::closed());
        };

        let range = SyncRange::new(0, block_number);
        let delta_response = self.respond(RequestKind::Deltas, peer)?;
        let deltas = self.stream_deltas(peer, ledger, range, delta_response);

        let (sender, stream) = channel(self.config.channel_capacity);
        let forged = (response == Response::Corrupt).then(|| range.midpoint());

        debug!(%peer, block_number, "Requesting state snapshot");

        drop(tokio::spawn(produce_snapshot(
            peer,
            deltas,
            block_number,
            forged,
            sender,
        )));

        Ok(stream)
    }

    async fn get_remote_state_deltas(
        &self,
        peer: ReplicaId,
        start: u64,
        finish: u64,
    ) -> Result<ChunkStream<DeltaChunk>, SyncError> {
        let ledger = self.resolve(peer)?;
        let response = self.respond(RequestKind::Deltas, peer)?;
        let range = SyncRange::new(start, finish);

        debug!(%peer, %range, "Requesting state deltas");

        Ok(self.stream_deltas(peer, ledger, range, response))
    }
}

async fn produce_blocks(
    peer: ReplicaId,
    ledger: Arc<dyn ReadOnlyLedger>,
    range: SyncRange,
    forged: Option<u64>,
    sender: ChunkSender<BlockChunk>,
) {
    for index in range {
        let block = if forged == Some(index) {
            corrupt_block()
        } else {
            match ledger.get_block(index) {
                Ok(block) => Arc::unwrap_or_clone(block),
                Err(err) => {
                    debug!(%peer, index, %err, "Peer has no further blocks");
                    break;
                }
            }
        };

        let chunk = BlockChunk {
            range: SyncRange::single(index),
            blocks: vec![block],
        };

        if !sender.send(chunk).await {
            debug!(%peer, index, "Block stream cancelled");
            return;
        }
    }

    debug!(%peer, %range, "Block stream finished");
}

async fn produce_deltas(
    peer: ReplicaId,
    ledger: Arc<dyn ReadOnlyLedger>,
    range: SyncRange,
    forged: Option<u64>,
    sender: ChunkSender<DeltaChunk>,
) {
    for index in range {
        let deltas = if forged == Some(index) {
            vec![CORRUPT_DELTA.to_vec()]
        } else {
            match ledger.get_block(index) {
                Ok(block) => block.payloads().map(<[u8]>::to_vec).collect(),
                Err(err) => {
                    debug!(%peer, index, %err, "Peer has no further blocks");
                    break;
                }
            }
        };

        let chunk = DeltaChunk {
            range: SyncRange::single(index),
            deltas,
        };

        if !sender.send(chunk).await {
            debug!(%peer, index, "Delta stream cancelled");
            return;
        }
    }

    debug!(%peer, %range, "Delta stream finished");
}

async fn produce_snapshot(
    peer: ReplicaId,
    mut deltas: ChunkStream<DeltaChunk>,
    block_number: u64,
    forged: Option<u64>,
    sender: ChunkSender<SnapshotChunk>,
) {
    let mut sequence = 0_u64;

    while let Some(chunk) = deltas.next_chunk().await {
        let mut deltas = chunk.deltas;

        // An empty midpoint block still yields one forged delta
        if forged == Some(chunk.range.start) {
            match deltas.first_mut() {
                Some(first) => *first = CORRUPT_DELTA.to_vec(),
                None => deltas.push(CORRUPT_DELTA.to_vec()),
            }
        }

        for delta in deltas {
            let chunk = SnapshotChunk {
                delta,
                sequence,
                block_number,
            };

            if !sender.send(chunk).await {
                debug!(%peer, sequence, "Snapshot stream cancelled");
                return;
            }

            sequence = sequence.saturating_add(1);
        }
    }

    debug!(%peer, deltas = sequence, "Snapshot stream finished");
}
