//! Mock remote ledgers for exercising strategies against misbehaving peers

use std::sync::Mutex;

use async_trait::async_trait;
use replica_primitives::ReplicaId;
use replica_sync::stream::{channel, ChunkSender};
use replica_sync::{BlockChunk, ChunkStream, DeltaChunk, RemoteLedgers, SnapshotChunk, SyncError};

/// Serves a fixed script of chunks for every request, whatever the range.
#[derive(Debug, Default)]
pub struct ScriptedRemote {
    pub blocks: Vec<BlockChunk>,
    pub deltas: Vec<DeltaChunk>,
    pub snapshot: Vec<SnapshotChunk>,
}

async fn scripted<T: Clone + Send>(chunks: &[T]) -> ChunkStream<T> {
    let (sender, stream) = channel(chunks.len());

    for chunk in chunks {
        assert!(sender.send(chunk.clone()).await);
    }

    stream
}

#[async_trait]
impl RemoteLedgers for ScriptedRemote {
    async fn get_remote_blocks(
        &self,
        _peer: ReplicaId,
        _start: u64,
        _finish: u64,
    ) -> Result<ChunkStream<BlockChunk>, SyncError> {
        Ok(scripted(&self.blocks).await)
    }

    async fn get_remote_state_snapshot(
        &self,
        _peer: ReplicaId,
    ) -> Result<ChunkStream<SnapshotChunk>, SyncError> {
        Ok(scripted(&self.snapshot).await)
    }

    async fn get_remote_state_deltas(
        &self,
        _peer: ReplicaId,
        _start: u64,
        _finish: u64,
    ) -> Result<ChunkStream<DeltaChunk>, SyncError> {
        Ok(scripted(&self.deltas).await)
    }
}

/// Accepts every request and never sends anything. Producers are kept alive
/// so the streams stay open.
#[derive(Debug, Default)]
pub struct StalledRemote {
    blocks: Mutex<Vec<ChunkSender<BlockChunk>>>,
    deltas: Mutex<Vec<ChunkSender<DeltaChunk>>>,
    snapshot: Mutex<Vec<ChunkSender<SnapshotChunk>>>,
}

impl StalledRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether every stream handed out so far has been cancelled.
    pub fn all_cancelled(&self) -> bool {
        self.blocks.lock().unwrap().iter().all(ChunkSender::is_cancelled)
            && self.deltas.lock().unwrap().iter().all(ChunkSender::is_cancelled)
            && self.snapshot.lock().unwrap().iter().all(ChunkSender::is_cancelled)
    }
}

fn stalled<T>(held: &Mutex<Vec<ChunkSender<T>>>) -> ChunkStream<T> {
    let (sender, stream) = channel(1);
    held.lock().unwrap().push(sender);
    stream
}

#[async_trait]
impl RemoteLedgers for StalledRemote {
    async fn get_remote_blocks(
        &self,
        _peer: ReplicaId,
        _start: u64,
        _finish: u64,
    ) -> Result<ChunkStream<BlockChunk>, SyncError> {
        Ok(stalled(&self.blocks))
    }

    async fn get_remote_state_snapshot(
        &self,
        _peer: ReplicaId,
    ) -> Result<ChunkStream<SnapshotChunk>, SyncError> {
        Ok(stalled(&self.snapshot))
    }

    async fn get_remote_state_deltas(
        &self,
        _peer: ReplicaId,
        _start: u64,
        _finish: u64,
    ) -> Result<ChunkStream<DeltaChunk>, SyncError> {
        Ok(stalled(&self.deltas))
    }
}
