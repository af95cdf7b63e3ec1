//! Tests for the state transfer client against simulated peers

mod common;

use std::sync::Arc;

use common::{client, simulated_peers, PEER};
use futures_util::StreamExt;
use replica_ledger::testing::SimulatedLedger;
use replica_ledger::{MemoryLedger, ReadOnlyLedger, UtilLedger, Verification, WritableLedger};
use replica_primitives::{Block, ReplicaId, SyncRange};
use replica_sync::chunk::{CORRUPT_BLOCK_HASH, CORRUPT_DELTA};
use replica_sync::{
    AlwaysNormal, BlockChunk, PeerMap, PolicyRule, RemoteLedgers, RequestKind, Response,
    RulePolicy, SyncError,
};

fn only(kind: RequestKind, response: Response) -> impl Fn(RequestKind, ReplicaId) -> Response {
    move |request, _peer| {
        if request == kind {
            response
        } else {
            Response::Normal
        }
    }
}

fn write_blocks(ledger: &MemoryLedger, chunks: Vec<BlockChunk>) {
    for chunk in chunks {
        for (index, block) in chunk.range.iter().zip(chunk.blocks) {
            ledger.put_block(index, block).unwrap();
        }
    }
}

#[tokio::test]
async fn test_block_sync_then_verify() {
    let (_, peers) = simulated_peers(11);
    let remote = client(peers, AlwaysNormal);

    for (start, finish) in [(0, 10), (10, 0)] {
        let ledger = MemoryLedger::new();
        let chunks: Vec<BlockChunk> = remote
            .get_remote_blocks(PEER, start, finish)
            .await
            .unwrap()
            .collect()
            .await;

        let indices: Vec<u64> = chunks.iter().map(|chunk| chunk.range.start).collect();
        assert_eq!(indices, SyncRange::new(start, finish).iter().collect::<Vec<_>>());
        assert!(chunks.iter().all(|chunk| chunk.range.start == chunk.range.finish));
        assert!(chunks.iter().all(|chunk| chunk.blocks.len() == 1));

        write_blocks(&ledger, chunks);

        assert_eq!(ledger.get_blockchain_size().unwrap(), 11);
        assert_eq!(
            ledger.verify_blockchain(10, 0).unwrap(),
            Verification::Verified
        );
    }
}

#[tokio::test]
async fn test_forged_block_is_detected() {
    let (_, peers) = simulated_peers(11);
    let remote = client(peers, AlwaysNormal);
    let ledger = MemoryLedger::new();

    let chunks = remote
        .get_remote_blocks(PEER, 0, 10)
        .await
        .unwrap()
        .collect()
        .await;
    write_blocks(&ledger, chunks);

    ledger
        .put_block(
            3,
            Block::new(vec![], b"WRONG".to_vec(), b"WRONG".to_vec(), vec![]),
        )
        .unwrap();

    assert_eq!(
        ledger.verify_blockchain(10, 0).unwrap(),
        Verification::BrokenAt(4)
    );
}

#[tokio::test]
async fn test_blocks_stop_at_peer_height() {
    let (_, peers) = simulated_peers(11);
    let remote = client(peers, AlwaysNormal);

    let chunks: Vec<BlockChunk> = remote
        .get_remote_blocks(PEER, 5, 20)
        .await
        .unwrap()
        .collect()
        .await;

    let indices: Vec<u64> = chunks.iter().map(|chunk| chunk.range.start).collect();
    assert_eq!(indices, (5..=10).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_corrupt_blocks_forge_midpoint() {
    let (peer, peers) = simulated_peers(11);
    let remote = client(peers, only(RequestKind::Blocks, Response::Corrupt));

    let chunks: Vec<BlockChunk> = remote
        .get_remote_blocks(PEER, 0, 9)
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(chunks.len(), 10);

    for chunk in chunks {
        let index = chunk.range.start;
        let block = &chunk.blocks[0];

        if index == 4 {
            assert_eq!(block.previous_block_hash, CORRUPT_BLOCK_HASH.to_vec());
        } else {
            assert_eq!(*block, peer.block(index));
        }
    }
}

#[tokio::test]
async fn test_corrupt_deltas_forge_midpoint() {
    let (_, peers) = simulated_peers(11);
    let remote = client(peers, only(RequestKind::Deltas, Response::Corrupt));

    let chunks: Vec<_> = remote
        .get_remote_state_deltas(PEER, 0, 9)
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(chunks.len(), 10);

    for chunk in chunks {
        let index = chunk.range.start;

        if index == 4 {
            assert_eq!(chunk.deltas, vec![CORRUPT_DELTA.to_vec()]);
        } else {
            assert_eq!(chunk.deltas, vec![SimulatedLedger::state_delta(index)]);
        }
    }
}

#[tokio::test]
async fn test_corrupt_descending_range_midpoint() {
    let (_, peers) = simulated_peers(11);
    let remote = client(peers, only(RequestKind::Deltas, Response::Corrupt));

    let chunks: Vec<_> = remote
        .get_remote_state_deltas(PEER, 9, 0)
        .await
        .unwrap()
        .collect()
        .await;

    let forged: Vec<u64> = chunks
        .iter()
        .filter(|chunk| chunk.deltas == vec![CORRUPT_DELTA.to_vec()])
        .map(|chunk| chunk.range.start)
        .collect();

    assert_eq!(forged, vec![5]);
}

#[tokio::test]
async fn test_timeout_yields_empty_stream() {
    let (_, peers) = simulated_peers(11);
    let timeout = |_kind: RequestKind, _peer: ReplicaId| Response::Timeout;
    let remote = client(peers, timeout);

    let blocks = remote.get_remote_blocks(PEER, 0, 10).await.unwrap();
    let deltas = remote.get_remote_state_deltas(PEER, 0, 10).await.unwrap();
    let snapshot = remote.get_remote_state_snapshot(PEER).await.unwrap();

    assert_eq!(blocks.count().await, 0);
    assert_eq!(deltas.count().await, 0);
    assert_eq!(snapshot.count().await, 0);
}

#[tokio::test]
async fn test_snapshot_replay_matches_head_state() {
    let (peer, peers) = simulated_peers(11);
    let remote = client(peers, AlwaysNormal);
    let ledger = MemoryLedger::new();

    let chunks: Vec<_> = remote
        .get_remote_state_snapshot(PEER)
        .await
        .unwrap()
        .collect()
        .await;

    let sequences: Vec<u64> = chunks.iter().map(|chunk| chunk.sequence).collect();
    assert_eq!(sequences, (0..11).collect::<Vec<_>>());
    assert!(chunks.iter().all(|chunk| chunk.block_number == 10));

    ledger.empty_state().unwrap();
    for chunk in chunks {
        ledger.apply_state_delta(&chunk.delta, false).unwrap();
    }

    let block10 = peer.get_block(10).unwrap();
    assert_eq!(ledger.get_current_state_hash().unwrap(), block10.state_hash);
}

#[tokio::test]
async fn test_corrupt_snapshot_keeps_sequence() {
    let (_, peers) = simulated_peers(11);
    let remote = client(peers, only(RequestKind::Snapshot, Response::Corrupt));

    let chunks: Vec<_> = remote
        .get_remote_state_snapshot(PEER)
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(chunks.len(), 11);

    for (position, chunk) in (0_u64..).zip(&chunks) {
        assert_eq!(chunk.sequence, position);
        if position == 5 {
            assert_eq!(chunk.delta, CORRUPT_DELTA.to_vec());
        } else {
            assert_eq!(chunk.delta, SimulatedLedger::state_delta(position));
        }
    }
}

#[tokio::test]
async fn test_corrupt_snapshot_with_empty_midpoint_block() {
    let peer = Arc::new(MemoryLedger::new());

    for index in 0..5_u64 {
        let mut block = SimulatedLedger::new(5).block(index);
        if index == 2 {
            block.transactions.clear();
        }
        peer.put_block(index, block).unwrap();
    }

    let mut peers = PeerMap::new();
    drop(peers.insert(PEER, peer as Arc<dyn ReadOnlyLedger>));
    let remote = client(Arc::new(peers), only(RequestKind::Snapshot, Response::Corrupt));

    let chunks: Vec<_> = remote
        .get_remote_state_snapshot(PEER)
        .await
        .unwrap()
        .collect()
        .await;

    let forged: Vec<u64> = chunks
        .iter()
        .filter(|chunk| chunk.delta == CORRUPT_DELTA.to_vec())
        .map(|chunk| chunk.sequence)
        .collect();

    assert_eq!(chunks.len(), 5);
    assert_eq!(forged, vec![2]);
    assert!((0_u64..).zip(&chunks).all(|(seq, chunk)| chunk.sequence == seq));
}

#[tokio::test]
async fn test_snapshot_follows_delta_policy() {
    let (_, peers) = simulated_peers(11);
    let remote = client(peers, only(RequestKind::Deltas, Response::Timeout));

    let snapshot = remote.get_remote_state_snapshot(PEER).await.unwrap();

    assert_eq!(snapshot.count().await, 0);
}

#[tokio::test]
async fn test_snapshot_of_empty_peer() {
    let (_, peers) = simulated_peers(0);
    let remote = client(peers, AlwaysNormal);

    let snapshot = remote.get_remote_state_snapshot(PEER).await.unwrap();

    assert_eq!(snapshot.count().await, 0);
}

#[tokio::test]
async fn test_unknown_peer() {
    let (_, peers) = simulated_peers(11);
    let remote = client(peers, AlwaysNormal);

    let err = remote
        .get_remote_blocks(ReplicaId::new(9), 0, 1)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::UnknownPeer { peer } if peer == ReplicaId::new(9)));
}

#[tokio::test]
async fn test_unsupported_response_fails_request() {
    let (_, peers) = simulated_peers(11);
    let policy = RulePolicy::new(vec![PolicyRule {
        request: Some(RequestKind::Blocks),
        peer: None,
        response: "garbled".to_owned(),
    }]);
    let remote = client(peers, policy);

    let err = remote.get_remote_blocks(PEER, 0, 10).await.unwrap_err();
    assert!(matches!(err, SyncError::UnsupportedResponse(_)));

    // Other request kinds still succeed
    let deltas = remote.get_remote_state_deltas(PEER, 0, 10).await.unwrap();
    assert_eq!(deltas.count().await, 11);
}

#[tokio::test]
async fn test_early_cancel_stops_stream() {
    let (_, peers) = simulated_peers(11);
    let remote = client(peers, AlwaysNormal);

    let mut stream = remote.get_remote_blocks(PEER, 0, 10).await.unwrap();

    let first = stream.next_chunk().await.unwrap();
    assert_eq!(first.range, SyncRange::single(0));

    stream.cancel();

    assert!(stream.next_chunk().await.is_none());
}

#[tokio::test]
async fn test_dropping_stream_releases_peer() {
    let (peer, peers) = simulated_peers(1_000);
    let remote = client(peers, AlwaysNormal);

    let mut stream = remote.get_remote_blocks(PEER, 0, 999).await.unwrap();
    assert!(stream.next_chunk().await.is_some());
    drop(stream);

    // The producer exits and drops its handle on the peer ledger
    tokio::time::timeout(core::time::Duration::from_secs(5), async {
        while Arc::strong_count(&peer) > 2 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("producer should release the peer once the stream is dropped");
}
