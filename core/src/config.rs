//! Startup configuration.
//!
//! RULE: the backend variant is chosen here, once, before anything
//! subscribes. Consumers of the record store never learn which variant
//! is running.

use crate::model::SchoolContext;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Process-local store; state lives and dies with the process.
    Memory,
    /// Document store persisted at `db_path` (":memory:" for an
    /// ephemeral database).
    Document { db_path: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterConfig {
    pub seed: u64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub backend: BackendConfig,
    #[serde(default)]
    pub school_context: SchoolContext,
    /// When set, the runner seeds the store with a generated roster.
    #[serde(default)]
    pub seed_roster: Option<RosterConfig>,
}

impl MonitorConfig {
    /// Load from a JSON file.
    /// In tests, use MonitorConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// In-memory backend, medium context, no seeding.
    pub fn default_test() -> Self {
        Self {
            backend: BackendConfig::Memory,
            school_context: SchoolContext::Medium,
            seed_roster: None,
        }
    }
}
