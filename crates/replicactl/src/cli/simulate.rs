use std::sync::Arc;

use clap::Parser;
use eyre::{bail, Result as EyreResult};
use replica_executor::{Executor, ExecutorConfig};
use replica_ledger::testing::SimulatedLedger;
use replica_ledger::{Ledger, MemoryLedger, ReadOnlyLedger, UtilLedger};
use replica_primitives::encoding::encode_uvarint;
use replica_primitives::{ReplicaId, SyncRange, Transaction};
use replica_sync::strategies::{BlockCatchup, SnapshotRestore, StateReplay};
use replica_sync::{Checkpoint, PeerMap, RemoteLedgers, SyncClient, SyncStrategy};
use tracing::{info, warn};

use crate::cli::RootArgs;

/// Sync an empty replica from a simulated peer
///
/// Runs block catchup, delta replay and snapshot restore in turn under the
/// configured response policy and prints the outcome of each.
#[derive(Debug, Parser)]
pub struct SimulateCommand {
    /// Number of blocks held by the simulated peer
    #[arg(long, default_value_t = 11)]
    pub height: u64,

    /// Replica id of the simulated peer, matched by `[[policy]]` rules
    #[arg(long, default_value_t = 1)]
    pub peer: u64,

    /// Commit one batch of this many transactions once syncing is done
    #[arg(long, default_value_t = 0)]
    pub commit: u64,
}

impl SimulateCommand {
    pub async fn run(self, args: &RootArgs) -> EyreResult<()> {
        let config = args.config()?;

        let Some(head) = self.height.checked_sub(1) else {
            bail!("the simulated peer needs at least one block");
        };

        let scheme = config.ledger.hash_scheme;
        let sync_config = config.sync_config();
        let timeout = sync_config.chunk_timeout;

        let peer_id = ReplicaId::new(self.peer);
        let peer = Arc::new(SimulatedLedger::with_hash_scheme(self.height, scheme));

        let mut peers = PeerMap::new();
        drop(peers.insert(peer_id, Arc::clone(&peer) as Arc<dyn ReadOnlyLedger>));

        let client: Arc<dyn RemoteLedgers> = Arc::new(SyncClient::new(
            Arc::new(peers),
            Arc::new(config.response_policy()),
            sync_config,
        ));

        let head_block = peer.get_block(head)?;
        let checkpoint = Checkpoint::new(head, head_block.state_hash.clone())
            .with_block_hash(peer.hash_block(&head_block));

        let local = Arc::new(MemoryLedger::with_hash_scheme(scheme));
        let ledger = Arc::clone(&local) as Arc<dyn Ledger>;

        info!(%peer_id, height = self.height, hash_scheme = scheme.as_str(), "Starting simulation");

        let strategies: Vec<Box<dyn SyncStrategy>> = vec![
            Box::new(
                BlockCatchup::new(
                    Arc::clone(&client),
                    Arc::clone(&ledger),
                    SyncRange::new(head, 0),
                    timeout,
                )
                .with_checkpoint(checkpoint.clone()),
            ),
            Box::new(StateReplay::new(
                Arc::clone(&client),
                Arc::clone(&ledger),
                SyncRange::new(0, head),
                checkpoint.clone(),
                timeout,
            )),
            Box::new(SnapshotRestore::new(
                client,
                Arc::clone(&ledger),
                checkpoint,
                timeout,
            )),
        ];

        for strategy in &strategies {
            match strategy.execute(peer_id).await {
                Ok(result) => println!("{:<18} {result:?}", strategy.name()),
                Err(err) => {
                    warn!(strategy = strategy.name(), %err, "Sync attempt failed");
                    println!("{:<18} error: {err}", strategy.name());
                }
            }
        }

        if self.commit > 0 {
            commit_batch(Arc::clone(&ledger), config.executor, self.commit)?;
        }

        let verification = local.verify_blockchain(local.get_blockchain_size()?.saturating_sub(1), 0);

        println!();
        println!("height             {}", local.get_blockchain_size()?);
        println!(
            "state hash         {}",
            String::from_utf8_lossy(&local.get_current_state_hash()?)
        );
        match verification {
            Ok(verification) => println!("chain              {verification:?}"),
            Err(err) => println!("chain              {err}"),
        }

        Ok(())
    }
}

/// Commits `count` transactions on top of the synced chain, the way the
/// agreement layer would once the replica caught up.
fn commit_batch(ledger: Arc<dyn Ledger>, config: ExecutorConfig, count: u64) -> EyreResult<()> {
    let mut executor = Executor::<dyn Ledger, u64>::new(ledger, config);

    let txs: Vec<_> = (1..=count)
        .map(|n| Transaction::new(format!("tx-{n}"), encode_uvarint(n)))
        .collect();

    executor.begin_tx_batch(0)?;
    let outcome = executor.exec_txs(&txs)?;
    let block = executor.commit_tx_batch(&0, &txs, &outcome, b"replicactl")?;

    println!(
        "{:<18} {} transactions, state hash {}",
        "commit",
        txs.len(),
        String::from_utf8_lossy(&block.state_hash)
    );

    Ok(())
}
