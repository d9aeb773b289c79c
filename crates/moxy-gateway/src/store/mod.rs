//! Persistence collaborator.
//!
//! The core never holds services, mocks or history itself; it reads and writes
//! them through [`PersistenceStore`], passed in explicitly as a dependency.

mod inmemory;

pub use inmemory::InMemoryStore;

use crate::model::{Environment, Mock, MockGroupId, RequestData, Service, ServiceKind};
use anyhow::Result;

/// Backend-agnostic store for gateway records.
///
/// Synchronous on purpose: every operation is a keyed lookup or a single insert,
/// and implementations own their own concurrency control.
pub trait PersistenceStore: Send + Sync {
    /// Service by its composite key.
    fn find_service(
        &self,
        environment_id: i64,
        kind: ServiceKind,
        local_target: &str,
    ) -> Result<Option<Service>>;

    fn find_service_by_id(&self, id: i64) -> Result<Option<Service>>;

    /// All services of one kind in an environment.
    fn list_services(&self, environment_id: i64, kind: ServiceKind) -> Result<Vec<Service>>;

    fn all_services(&self) -> Result<Vec<Service>>;

    /// Persist a new service and return it with its assigned id. When a service
    /// with the same composite key already exists, that one is returned instead.
    fn insert_service(&self, service: Service) -> Result<Service>;

    fn find_environment(&self, group: &str, name: &str) -> Result<Option<Environment>>;

    /// Every environment called `name`, whatever its group.
    fn find_environments_named(&self, name: &str) -> Result<Vec<Environment>>;

    /// Mocks of a group, in creation order.
    fn find_mocks(&self, group: MockGroupId) -> Result<Vec<Mock>>;

    /// Persist an audit record and return it with its assigned id.
    fn insert_request_data(&self, record: RequestData) -> Result<RequestData>;

    fn load_request_data(&self, id: i64) -> Result<Option<RequestData>>;
}
