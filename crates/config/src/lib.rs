//! On-disk configuration of a replica.

use core::time::Duration;
use std::fs::{read_to_string, write};

use camino::Utf8Path;
use eyre::{Result as EyreResult, WrapErr};
use replica_executor::ExecutorConfig;
use replica_primitives::HashScheme;
use replica_sync::config::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_CHUNK_TIMEOUT_MS};
use replica_sync::{PolicyRule, RulePolicy};
use serde::{Deserialize, Serialize};


pub const CONFIG_FILE: &str = "config.toml";

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[non_exhaustive]
pub struct ConfigFile {
    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Response overrides for simulated peers, first match wins.
    #[serde(default, rename = "policy", skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<PolicyRule>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub channel_capacity: usize,
    #[serde(rename = "chunk_timeout_ms", with = "serde_duration")]
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

impl From<SyncConfig> for replica_sync::SyncConfig {
    fn from(config: SyncConfig) -> Self {
        Self {
            channel_capacity: config.channel_capacity,
            chunk_timeout: config.chunk_timeout,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct LedgerConfig {
    #[serde(default)]
    pub hash_scheme: HashScheme,
}

impl LedgerConfig {
    #[must_use]
    pub const fn new(hash_scheme: HashScheme) -> Self {
        Self { hash_scheme }
    }
}

impl ConfigFile {
    #[must_use]
    pub const fn new(
        sync: SyncConfig,
        ledger: LedgerConfig,
        executor: ExecutorConfig,
        policies: Vec<PolicyRule>,
    ) -> Self {
        Self {
            sync,
            ledger,
            executor,
            policies,
        }
    }

    #[must_use]
    pub fn exists(dir: &Utf8Path) -> bool {
        dir.join(CONFIG_FILE).is_file()
    }

    pub fn load(dir: &Utf8Path) -> EyreResult<Self> {
        let path = dir.join(CONFIG_FILE);
        let content = read_to_string(&path)
            .wrap_err_with(|| format!("failed to read configuration from {path:?}"))?;

        toml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse configuration at {path:?}"))
    }

    pub fn save(&self, dir: &Utf8Path) -> EyreResult<()> {
        let path = dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)?;

        write(&path, content)
            .wrap_err_with(|| format!("failed to write configuration to {path:?}"))?;

        Ok(())
    }

    /// Runtime settings for the sync client and strategies.
    #[must_use]
    pub fn sync_config(&self) -> replica_sync::SyncConfig {
        self.sync.into()
    }

    #[must_use]
    pub fn response_policy(&self) -> RulePolicy {
        RulePolicy::new(self.policies.clone())
    }
}

mod serde_duration {
    use core::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
