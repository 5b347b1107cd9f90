use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub masters: Vec<MasterConfig>,
    #[serde(default)]
    pub poll: PollConfig,
    pub sink: Option<SinkConfig>,
}

/// One configured instance of the monitored CI service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MasterConfig {
    pub name: String,
    pub base_url: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollConfig {
    /// Seconds between polling cycles for each master.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// How long cached build records are retained.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Offset from the cached build number at which backfill starts.
    #[serde(default = "default_backfill_threshold")]
    pub backfill_threshold: u64,
    /// Resynchronize the master's repository list after each cycle.
    #[serde(default)]
    pub full_resync: bool,
    /// Maximum repositories processed concurrently within a cycle.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            retention_days: default_retention_days(),
            backfill_threshold: default_backfill_threshold(),
            full_resync: false,
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl PollConfig {
    /// TTL applied to freshly written cache records.
    pub fn ttl_secs(&self) -> i64 { self.retention_days as i64 * 86_400 }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SinkConfig {
    pub url: String,
}

fn default_interval_secs() -> u64 { 60 }

fn default_retention_days() -> u32 { 7 }

fn default_backfill_threshold() -> u64 { 1 }

fn default_max_concurrency() -> usize { 10 }
