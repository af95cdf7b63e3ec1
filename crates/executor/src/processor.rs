use replica_primitives::Transaction;

/// Application result of executing a group of transactions.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExecOutcome {
    /// Opaque application output.
    pub output: Vec<u8>,
    /// One slot per transaction plus a trailing slot for the group as a
    /// whole. `None` means success.
    pub errors: Vec<Option<String>>,
}

impl ExecOutcome {
    /// Outcome with every slot successful.
    #[must_use]
    pub fn success(count: usize) -> Self {
        Self {
            output: Vec::new(),
            errors: vec![None; count.saturating_add(1)],
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.iter().all(Option::is_none)
    }
}

/// Application hook invoked by [`Executor::exec_txs`](crate::Executor::exec_txs).
pub trait TxProcessor: Send + Sync {
    fn process(&self, txs: &[Transaction]) -> ExecOutcome;
}

/// Processor that accepts everything and produces no output.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopProcessor;

impl TxProcessor for NoopProcessor {
    fn process(&self, txs: &[Transaction]) -> ExecOutcome {
        ExecOutcome::success(txs.len())
    }
}

impl<F> TxProcessor for F
where
    F: Fn(&[Transaction]) -> ExecOutcome + Send + Sync,
{
    fn process(&self, txs: &[Transaction]) -> ExecOutcome {
        self(txs)
    }
}
