//! Service resolution and auto-provisioning.
//!
//! The registry answers "which service handles this call" for both SOAP and REST
//! and, on the auto-provisioning routes, creates the service on first use.

mod extract;
mod rest_matcher;

pub use extract::extract_local_target;
pub use rest_matcher::{effective_remote_url, match_call};

use crate::error::GatewayError;
use crate::metrics;
use crate::model::{Environment, HttpMethod, Service, ServiceKind};
use crate::store::PersistenceStore;
use std::sync::Arc;
use tracing::{debug, info};

/// A REST service selected for an inbound call, with the URL to call it on.
#[derive(Debug, Clone, PartialEq)]
pub struct RestMatch {
    pub service: Service,
    pub effective_url: String,
}

pub struct ServiceRegistry {
    store: Arc<dyn PersistenceStore>,
}

impl ServiceRegistry {
    pub fn new(store: Arc<dyn PersistenceStore>) -> Self {
        Self { store }
    }

    /// Pure lookup by composite key, the environment given by name alone.
    /// A name shared by several groups does not identify one environment and
    /// is rejected rather than resolved to an arbitrary one.
    pub fn resolve(
        &self,
        kind: ServiceKind,
        local_target: &str,
        environment: &str,
    ) -> Result<Option<Service>, GatewayError> {
        let Some(env) = self.environment_named(environment)? else {
            return Ok(None);
        };
        Ok(self.store.find_service(env.id, kind, local_target)?)
    }

    fn environment_named(&self, name: &str) -> Result<Option<Environment>, GatewayError> {
        let mut found = self.store.find_environments_named(name)?;
        match found.len() {
            0 | 1 => Ok(found.pop()),
            _ => Err(GatewayError::AmbiguousEnvironment {
                name: name.to_string(),
                groups: found.into_iter().map(|env| env.group).collect(),
            }),
        }
    }

    /// Resolve the service behind `remote_url`, creating it when the environment
    /// exists but no service is registered for the derived local target.
    pub fn resolve_or_auto_create(
        &self,
        group: &str,
        environment: &str,
        remote_url: &str,
        kind: ServiceKind,
    ) -> Result<Service, GatewayError> {
        let local_target = extract_local_target(remote_url)
            .ok_or_else(|| GatewayError::InvalidRemoteTarget(remote_url.to_string()))?;

        let env = self
            .store
            .find_environment(group, environment)?
            .ok_or_else(|| GatewayError::UnknownEnvironment {
                group: group.to_string(),
                name: environment.to_string(),
            })?;

        if let Some(service) = self.store.find_service(env.id, kind, &local_target)? {
            debug!(
                "Resolved {} service {} for '{}' in {}/{}",
                kind, service.id, local_target, group, environment
            );
            return Ok(service);
        }

        let service = self.store.insert_service(Service::auto_generated(
            kind,
            &local_target,
            remote_url,
            env.id,
        ))?;

        info!(
            "Auto-created {} service {} for '{}' in {}/{} -> {}",
            kind, service.id, local_target, group, environment, service.remote_target
        );
        metrics::record_service_auto_created();

        Ok(service)
    }

    /// Match a REST call against the environment's services for `method`.
    /// Longer local targets take precedence over their prefixes.
    pub fn match_rest_call(
        &self,
        environment: &str,
        method: HttpMethod,
        call: &str,
    ) -> Result<Option<RestMatch>, GatewayError> {
        let Some(env) = self.environment_named(environment)? else {
            debug!("No environment named {}", environment);
            return Ok(None);
        };
        let mut candidates = self.store.list_services(env.id, ServiceKind::rest(method))?;
        candidates.sort_by(|a, b| {
            b.local_target
                .len()
                .cmp(&a.local_target.len())
                .then(a.id.cmp(&b.id))
        });

        let matched = match_call(
            candidates
                .iter()
                .map(|service| (service.id, service.local_target.as_str())),
            call,
        );

        let Some(id) = matched else {
            debug!("No {} REST service matched '{}' in {}", method, call, environment);
            return Ok(None);
        };

        Ok(candidates
            .into_iter()
            .find(|service| service.id == id)
            .map(|service| RestMatch {
                effective_url: effective_remote_url(
                    call,
                    &service.local_target,
                    &service.remote_target,
                ),
                service,
            }))
    }
}
