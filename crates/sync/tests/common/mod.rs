//! Common fixtures for state transfer tests

pub mod mocks;

use std::sync::Arc;

use replica_ledger::testing::SimulatedLedger;
use replica_ledger::{MemoryLedger, ReadOnlyLedger, WritableLedger};
use replica_primitives::ReplicaId;
use replica_sync::{PeerMap, ResponsePolicy, SyncClient, SyncConfig};

pub const PEER: ReplicaId = ReplicaId::new(0);

/// A directory holding a single simulated peer of the given height.
pub fn simulated_peers(height: u64) -> (Arc<SimulatedLedger>, Arc<PeerMap>) {
    let peer = Arc::new(SimulatedLedger::new(height));

    let mut peers = PeerMap::new();
    drop(peers.insert(PEER, Arc::clone(&peer) as Arc<dyn ReadOnlyLedger>));

    (peer, Arc::new(peers))
}

pub fn client(peers: Arc<PeerMap>, policy: impl ResponsePolicy + 'static) -> Arc<SyncClient> {
    Arc::new(SyncClient::new(peers, Arc::new(policy), SyncConfig::default()))
}

/// Local ledger holding blocks `0..height` of `peer` and the matching state.
pub fn local_ledger_at(peer: &SimulatedLedger, height: u64) -> Arc<MemoryLedger> {
    let ledger = Arc::new(MemoryLedger::new());

    for index in 0..height {
        let block = peer.block(index);
        for payload in block.payloads() {
            ledger.apply_state_delta(payload, false).unwrap();
        }
        ledger.put_block(index, block).unwrap();
    }

    ledger
}
