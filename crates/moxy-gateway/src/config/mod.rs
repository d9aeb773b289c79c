//! Configuration types for the Moxy gateway.

mod listen;
mod store;
mod upstream;

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use listen::ListenConfig;
pub use store::{MockConfig, MockGroupSeed, StoreConfig};
pub use upstream::ConnectionPoolConfig;

use crate::mock::{CompiledPredicate, MOCK_DELAY_CEILING};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub listen: ListenConfig,
    #[serde(default)]
    pub connection_pool: ConnectionPoolConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub mock: MockConfig,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.listen.socket_addr()?;

        if self.mock.max_delay_ms > MOCK_DELAY_CEILING.as_millis() as u64 {
            anyhow::bail!(
                "mock.max_delay_ms is {} but may not exceed {}ms",
                self.mock.max_delay_ms,
                MOCK_DELAY_CEILING.as_millis()
            );
        }

        self.validate_store()
    }

    fn validate_store(&self) -> Result<(), anyhow::Error> {
        let store = &self.store;

        let mut env_names = HashSet::new();
        for env in &store.environments {
            if !env_names.insert((env.group.as_str(), env.name.as_str())) {
                anyhow::bail!("Duplicate environment '{}/{}'", env.group, env.name);
            }
        }

        let env_ids: HashSet<i64> = store.environments.iter().map(|env| env.id).collect();
        let group_ids: HashSet<i64> = store.mock_groups.iter().map(|g| g.id.0).collect();

        let mut service_keys = HashSet::new();
        for service in &store.services {
            if !env_ids.contains(&service.environment_id) {
                anyhow::bail!(
                    "Service '{}' references unknown environment id {}",
                    service.local_target,
                    service.environment_id
                );
            }
            if !service_keys.insert((service.environment_id, service.kind, &service.local_target))
            {
                anyhow::bail!(
                    "Duplicate {} service '{}' in environment {}",
                    service.kind,
                    service.local_target,
                    service.environment_id
                );
            }
            if service.use_mock_group && service.mock_group_id.is_none() {
                anyhow::bail!(
                    "Service '{}' uses a mock group but has no mock_group_id",
                    service.local_target
                );
            }
            if !service.mock_group_id.is_none() && !group_ids.contains(&service.mock_group_id.0) {
                anyhow::bail!(
                    "Service '{}' references unknown mock group {}",
                    service.local_target,
                    service.mock_group_id.0
                );
            }
        }

        for group in &store.mock_groups {
            for (index, mock) in group.mocks.iter().enumerate() {
                CompiledPredicate::compile(&mock.predicate).map_err(|e| {
                    anyhow::anyhow!(
                        "Invalid predicate on mock #{index} of group '{}': {e}",
                        group.name
                    )
                })?;
            }
        }

        Ok(())
    }
}
