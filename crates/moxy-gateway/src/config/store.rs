//! Store seed data and mock settings.

use crate::mock::MOCK_DELAY_CEILING;
use crate::model::{Environment, Mock, MockGroupId, Service};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoreConfig {
    /// JSON snapshot loaded at startup (replacing the seed) and written on shutdown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,
    #[serde(default)]
    pub environments: Vec<Environment>,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub mock_groups: Vec<MockGroupSeed>,
}

/// Mock group with its mocks, listed in creation order.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MockGroupSeed {
    #[serde(default)]
    pub id: MockGroupId,
    pub name: String,
    #[serde(default)]
    pub mocks: Vec<Mock>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MockConfig {
    /// Cap on a mock's artificial delay; may only lower the built-in 10s ceiling
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_delay_ms() -> u64 {
    MOCK_DELAY_CEILING.as_millis() as u64
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl MockConfig {
    pub fn ceiling(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms).min(MOCK_DELAY_CEILING)
    }
}
