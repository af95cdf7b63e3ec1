use core::hash::BuildHasher;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use replica_ledger::ReadOnlyLedger;
use replica_primitives::ReplicaId;

/// Resolves a replica to the read-only view of its ledger.
pub trait PeerDirectory: Send + Sync {
    fn resolve(&self, peer: ReplicaId) -> Option<Arc<dyn ReadOnlyLedger>>;
}

pub type PeerMap = BTreeMap<ReplicaId, Arc<dyn ReadOnlyLedger>>;

impl PeerDirectory for BTreeMap<ReplicaId, Arc<dyn ReadOnlyLedger>> {
    fn resolve(&self, peer: ReplicaId) -> Option<Arc<dyn ReadOnlyLedger>> {
        self.get(&peer).cloned()
    }
}

impl<S> PeerDirectory for HashMap<ReplicaId, Arc<dyn ReadOnlyLedger>, S>
where
    S: BuildHasher + Send + Sync,
{
    fn resolve(&self, peer: ReplicaId) -> Option<Arc<dyn ReadOnlyLedger>> {
        self.get(&peer).cloned()
    }
}
