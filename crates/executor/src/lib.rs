//! Atomic batch execution against a [`Ledger`].
//!
//! A batch moves through `begin -> exec* -> (commit | rollback)`. Only one
//! batch is active at a time and every lifecycle method takes `&mut self`,
//! so there is exactly one caller driving it.
//!
//! Committing folds every staged payload into a single state delta, applies
//! it, and appends a block linked to the current head. Previewing performs
//! the same computation and then reverts the delta, leaving the ledger as it
//! was.

use core::fmt::{self, Debug};
use std::sync::Arc;

use replica_ledger::{Ledger, LedgerError};
use replica_primitives::encoding::{decode_uvarint, fold_transactions, MAX_VARINT_LEN64};
use replica_primitives::{Block, Transaction, GENESIS_PREVIOUS_HASH};
use thiserror::Error;
use tracing::{debug, info, warn};

mod config;
mod processor;

pub use config::{EmptyPayload, ExecutorConfig};
pub use processor::{ExecOutcome, NoopProcessor, TxProcessor};


#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExecutorError {
    #[error("a transaction batch is already active")]
    BatchAlreadyActive,

    #[error("no transaction batch is active")]
    NoActiveBatch,

    #[error("batch id {given} does not match the active batch")]
    InvalidBatchId { given: String },

    #[error("transaction list does not match the executed batch")]
    BatchMismatch,

    #[error("transaction {txid:?} has an empty payload")]
    EmptyPayload { txid: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[derive(Debug)]
struct BatchContext<I> {
    id: I,
    pending: Vec<Transaction>,
}

/// Single-batch transactional front end of a ledger.
pub struct Executor<L: ?Sized, I, P = NoopProcessor> {
    ledger: Arc<L>,
    processor: P,
    config: ExecutorConfig,
    batch: Option<BatchContext<I>>,
}

impl<L: ?Sized, I: Debug, P> Debug for Executor<L, I, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.config)
            .field("batch", &self.batch)
            .finish_non_exhaustive()
    }
}

impl<L, I> Executor<L, I>
where
    L: Ledger + ?Sized,
    I: PartialEq + Debug,
{
    #[must_use]
    pub const fn new(ledger: Arc<L>, config: ExecutorConfig) -> Self {
        Self::with_processor(ledger, config, NoopProcessor)
    }
}

impl<L, I, P> Executor<L, I, P>
where
    L: Ledger + ?Sized,
    I: PartialEq + Debug,
    P: TxProcessor,
{
    #[must_use]
    pub const fn with_processor(ledger: Arc<L>, config: ExecutorConfig, processor: P) -> Self {
        Self {
            ledger,
            processor,
            config,
            batch: None,
        }
    }

    #[must_use]
    pub const fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    #[must_use]
    pub fn active_batch(&self) -> Option<&I> {
        self.batch.as_ref().map(|batch| &batch.id)
    }

    /// Transactions executed so far in the active batch.
    #[must_use]
    pub fn pending(&self) -> &[Transaction] {
        self.batch
            .as_ref()
            .map(|batch| batch.pending.as_slice())
            .unwrap_or_default()
    }

    pub fn begin_tx_batch(&mut self, id: I) -> Result<(), ExecutorError> {
        if self.batch.is_some() {
            return Err(ExecutorError::BatchAlreadyActive);
        }

        debug!(?id, "Beginning transaction batch");

        self.batch = Some(BatchContext {
            id,
            pending: Vec::new(),
        });

        Ok(())
    }

    /// Stages `txs` in the active batch and hands them to the processor.
    pub fn exec_txs(&mut self, txs: &[Transaction]) -> Result<ExecOutcome, ExecutorError> {
        let Some(batch) = self.batch.as_mut() else {
            return Err(ExecutorError::NoActiveBatch);
        };

        if self.config.empty_payload == EmptyPayload::Reject {
            if let Some(tx) = txs.iter().find(|tx| !tx.has_payload()) {
                return Err(ExecutorError::EmptyPayload {
                    txid: tx.txid.clone(),
                });
            }
        }

        batch.pending.extend_from_slice(txs);

        Ok(self.processor.process(txs))
    }

    /// Appends the batch as a new block and closes it.
    ///
    /// `txs` must equal everything executed in the batch, in order. On a
    /// validation failure the batch stays active.
    pub fn commit_tx_batch(
        &mut self,
        id: &I,
        txs: &[Transaction],
        tx_results: &ExecOutcome,
        metadata: &[u8],
    ) -> Result<Block, ExecutorError> {
        self.validate(id, txs)?;

        let height = self.ledger.get_blockchain_size()?;
        let (block, delta) = self.assemble_block(height, txs, metadata)?;

        if let Err(err) = self.ledger.put_block(height, block.clone()) {
            self.ledger.apply_state_delta(&delta, true)?;
            return Err(err.into());
        }

        info!(
            height,
            txs = txs.len(),
            failed = tx_results.errors.iter().filter(|e| e.is_some()).count(),
            state_hash = %String::from_utf8_lossy(&block.state_hash),
            "Committed transaction batch"
        );

        self.batch = None;

        Ok(block)
    }

    /// Discards the active batch. The ledger is not touched.
    pub fn rollback_tx_batch(&mut self, id: &I) -> Result<(), ExecutorError> {
        self.check_id(id)?;

        debug!(?id, "Rolling back transaction batch");

        self.batch = None;

        Ok(())
    }

    /// Produces the block [`commit_tx_batch`](Self::commit_tx_batch) would
    /// append, without changing the ledger or closing the batch.
    pub fn preview_commit_tx_batch_block(
        &mut self,
        id: &I,
        txs: &[Transaction],
        metadata: &[u8],
    ) -> Result<Block, ExecutorError> {
        self.validate(id, txs)?;

        let height = self.ledger.get_blockchain_size()?;
        let (block, delta) = self.assemble_block(height, txs, metadata)?;

        self.ledger.apply_state_delta(&delta, true)?;

        debug!(height, "Previewed transaction batch");

        Ok(block)
    }

    fn check_id(&self, id: &I) -> Result<&BatchContext<I>, ExecutorError> {
        match &self.batch {
            Some(batch) if batch.id == *id => Ok(batch),
            Some(_) => Err(ExecutorError::InvalidBatchId {
                given: format!("{id:?}"),
            }),
            None => Err(ExecutorError::NoActiveBatch),
        }
    }

    fn validate(&self, id: &I, txs: &[Transaction]) -> Result<(), ExecutorError> {
        let batch = self.check_id(id)?;

        if batch.pending != txs {
            return Err(ExecutorError::BatchMismatch);
        }

        Ok(())
    }

    /// Builds the block for `txs` at `height` with its delta applied to the
    /// ledger state. Returns the block and the applied delta.
    fn assemble_block(
        &self,
        height: u64,
        txs: &[Transaction],
        metadata: &[u8],
    ) -> Result<(Block, [u8; MAX_VARINT_LEN64]), ExecutorError> {
        let previous_block_hash = match height.checked_sub(1) {
            Some(head) => self.ledger.hash_block(&*self.ledger.get_block(head)?),
            None => GENESIS_PREVIOUS_HASH.to_vec(),
        };

        let mut delta = fold_transactions(txs);

        // Payloads are opaque; a fold that is not a varint moves no state.
        if let Err(err) = decode_uvarint(&delta) {
            warn!(height, %err, "Batch payloads fold to no valid delta, state unchanged");
            delta = [0; MAX_VARINT_LEN64];
        }

        self.ledger.apply_state_delta(&delta, false)?;

        let state_hash = match self.ledger.get_current_state_hash() {
            Ok(hash) => hash,
            Err(err) => {
                self.ledger.apply_state_delta(&delta, true)?;
                return Err(err.into());
            }
        };

        let block = Block::new(
            txs.to_vec(),
            previous_block_hash,
            state_hash,
            metadata.to_vec(),
        );

        Ok((block, delta))
    }
}
