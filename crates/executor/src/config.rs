use serde::{Deserialize, Serialize};

/// Treatment of transactions that carry no payload.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyPayload {
    /// Accept the transaction; it contributes nothing to the state delta.
    #[default]
    Zero,
    /// Refuse the whole `exec_txs` call without staging anything.
    Reject,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ExecutorConfig {
    #[serde(default)]
    pub empty_payload: EmptyPayload,
}

impl ExecutorConfig {
    #[must_use]
    pub const fn new(empty_payload: EmptyPayload) -> Self {
        Self { empty_payload }
    }
}
