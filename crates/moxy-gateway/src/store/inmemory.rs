use super::PersistenceStore;
use crate::config::StoreConfig;
use crate::model::{
    Environment, Mock, MockGroup, MockGroupId, RequestData, Service, ServiceKind, UNASSIGNED_ID,
};
use anyhow::{bail, Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Tables {
    environments: Vec<Environment>,
    services: Vec<Service>,
    mock_groups: Vec<MockGroup>,
    /// Kept in insertion order, which is creation order.
    mocks: Vec<Mock>,
    requests: Vec<RequestData>,
    next_id: i64,
}

impl Tables {
    /// Hand out the next id, or honour an explicit one and move the sequence past it.
    fn allocate(&mut self, requested: i64) -> i64 {
        if requested == UNASSIGNED_ID {
            self.next_id = self.next_id.max(1);
            let id = self.next_id;
            self.next_id += 1;
            id
        } else {
            self.next_id = self.next_id.max(requested + 1);
            requested
        }
    }
}

/// In-memory implementation of [`PersistenceStore`].
///
/// All tables sit behind one lock, so the duplicate check in `insert_service`
/// and the insert itself are a single atomic step. Snapshots can be written
/// to and restored from a JSON file.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store holding the seed records of the configuration.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let store = Self::new();
        store.seed(config)?;
        Ok(store)
    }

    pub fn seed(&self, config: &StoreConfig) -> Result<()> {
        for env in &config.environments {
            self.insert_environment_with_id(env.id, &env.group, &env.name)?;
        }
        for group in &config.mock_groups {
            let group_id = self.insert_mock_group_with_id(group.id, &group.name)?;
            for mock in &group.mocks {
                self.insert_mock(group_id, mock.clone())?;
            }
        }
        for service in &config.services {
            self.insert_service(service.clone())?;
        }

        let tables = self.tables.read();
        info!(
            "Store seeded: {} environments, {} services, {} mock groups, {} mocks",
            tables.environments.len(),
            tables.services.len(),
            tables.mock_groups.len(),
            tables.mocks.len()
        );
        Ok(())
    }

    pub fn insert_environment(&self, group: &str, name: &str) -> Result<Environment> {
        self.insert_environment_with_id(UNASSIGNED_ID, group, name)
    }

    fn insert_environment_with_id(&self, id: i64, group: &str, name: &str) -> Result<Environment> {
        let mut tables = self.tables.write();
        if tables
            .environments
            .iter()
            .any(|env| env.group == group && env.name == name)
        {
            bail!("environment '{group}/{name}' already exists");
        }
        if id != UNASSIGNED_ID && tables.environments.iter().any(|env| env.id == id) {
            bail!("environment id {id} already in use");
        }
        let id = tables.allocate(id);
        let env = Environment::new(id, group, name);
        tables.environments.push(env.clone());
        Ok(env)
    }

    pub fn insert_mock_group(&self, name: &str) -> MockGroup {
        let mut tables = self.tables.write();
        let id = MockGroupId(tables.allocate(UNASSIGNED_ID));
        let group = MockGroup {
            id,
            name: name.to_string(),
        };
        tables.mock_groups.push(group.clone());
        group
    }

    fn insert_mock_group_with_id(&self, id: MockGroupId, name: &str) -> Result<MockGroupId> {
        if id.is_none() {
            return Ok(self.insert_mock_group(name).id);
        }
        let mut tables = self.tables.write();
        if tables.mock_groups.iter().any(|group| group.id == id) {
            bail!("mock group id {} already in use", id.0);
        }
        tables.allocate(id.0);
        tables.mock_groups.push(MockGroup {
            id,
            name: name.to_string(),
        });
        Ok(id)
    }

    /// Append a mock to `group`. Later mocks lose ties against earlier ones.
    pub fn insert_mock(&self, group: MockGroupId, mut mock: Mock) -> Result<Mock> {
        let mut tables = self.tables.write();
        if !tables.mock_groups.iter().any(|g| g.id == group) {
            bail!("mock group {} does not exist", group.0);
        }
        mock.id = tables.allocate(mock.id);
        mock.mock_group_id = group;
        tables.mocks.push(mock.clone());
        Ok(mock)
    }

    /// Number of audit records held.
    pub fn request_count(&self) -> usize {
        self.tables.read().requests.len()
    }

    /// Most recently written audit record.
    pub fn latest_request(&self) -> Option<RequestData> {
        self.tables.read().requests.last().cloned()
    }

    /// Save all tables to a JSON snapshot.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let tables = self.tables.read();
        let json = serde_json::to_string_pretty(&*tables).context("serialize store snapshot")?;
        fs::write(path, json).with_context(|| format!("write store snapshot {path:?}"))?;
        info!(
            "Saved {} services and {} request records to {:?}",
            tables.services.len(),
            tables.requests.len(),
            path
        );
        Ok(())
    }

    /// Replace all tables with a JSON snapshot. Returns false when the file does not exist.
    pub fn load_from_file(&self, path: &Path) -> Result<bool> {
        if !path.exists() {
            debug!("Store snapshot {:?} does not exist, starting fresh", path);
            return Ok(false);
        }

        let json = fs::read_to_string(path).with_context(|| format!("read {path:?}"))?;
        let loaded: Tables = serde_json::from_str(&json).context("parse store snapshot")?;
        info!(
            "Loaded {} services and {} request records from {:?}",
            loaded.services.len(),
            loaded.requests.len(),
            path
        );
        *self.tables.write() = loaded;
        Ok(true)
    }
}

impl PersistenceStore for InMemoryStore {
    fn find_service(
        &self,
        environment_id: i64,
        kind: ServiceKind,
        local_target: &str,
    ) -> Result<Option<Service>> {
        let tables = self.tables.read();
        Ok(tables
            .services
            .iter()
            .find(|s| {
                s.environment_id == environment_id
                    && s.kind == kind
                    && s.local_target == local_target
            })
            .cloned())
    }

    fn find_service_by_id(&self, id: i64) -> Result<Option<Service>> {
        let tables = self.tables.read();
        Ok(tables.services.iter().find(|s| s.id == id).cloned())
    }

    fn list_services(&self, environment_id: i64, kind: ServiceKind) -> Result<Vec<Service>> {
        let tables = self.tables.read();
        Ok(tables
            .services
            .iter()
            .filter(|s| s.environment_id == environment_id && s.kind == kind)
            .cloned()
            .collect())
    }

    fn all_services(&self) -> Result<Vec<Service>> {
        Ok(self.tables.read().services.clone())
    }

    fn insert_service(&self, mut service: Service) -> Result<Service> {
        let mut tables = self.tables.write();
        if !tables
            .environments
            .iter()
            .any(|env| env.id == service.environment_id)
        {
            bail!("environment {} does not exist", service.environment_id);
        }

        if let Some(existing) = tables.services.iter().find(|s| {
            s.environment_id == service.environment_id
                && s.kind == service.kind
                && s.local_target == service.local_target
        }) {
            debug!(
                "Service for {} '{}' already exists as id {}",
                existing.kind, existing.local_target, existing.id
            );
            return Ok(existing.clone());
        }

        service.id = tables.allocate(service.id);
        tables.services.push(service.clone());
        Ok(service)
    }

    fn find_environment(&self, group: &str, name: &str) -> Result<Option<Environment>> {
        let tables = self.tables.read();
        Ok(tables
            .environments
            .iter()
            .find(|env| env.group == group && env.name == name)
            .cloned())
    }

    fn find_environments_named(&self, name: &str) -> Result<Vec<Environment>> {
        let tables = self.tables.read();
        Ok(tables
            .environments
            .iter()
            .filter(|env| env.name == name)
            .cloned()
            .collect())
    }

    fn find_mocks(&self, group: MockGroupId) -> Result<Vec<Mock>> {
        let tables = self.tables.read();
        Ok(tables
            .mocks
            .iter()
            .filter(|mock| mock.mock_group_id == group)
            .cloned()
            .collect())
    }

    fn insert_request_data(&self, mut record: RequestData) -> Result<RequestData> {
        let mut tables = self.tables.write();
        record.id = tables.allocate(UNASSIGNED_ID);
        tables.requests.push(record.clone());
        Ok(record)
    }

    fn load_request_data(&self, id: i64) -> Result<Option<RequestData>> {
        let tables = self.tables.read();
        Ok(tables.requests.iter().find(|r| r.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::BodyPredicate;
    use crate::model::HttpMethod;

    fn rest_get(local_target: &str, environment_id: i64) -> Service {
        Service::auto_generated(
            ServiceKind::rest(HttpMethod::Get),
            local_target,
            "http://backend/orders",
            environment_id,
        )
    }

    #[test]
    fn test_insert_and_find_service() {
        let store = InMemoryStore::new();
        let env = store.insert_environment("teamA", "prod").unwrap();
        let inserted = store.insert_service(rest_get("orders", env.id)).unwrap();
        assert!(inserted.is_persisted());

        let found = store
            .find_service(env.id, ServiceKind::rest(HttpMethod::Get), "orders")
            .unwrap();
        assert_eq!(found, Some(inserted.clone()));
        assert_eq!(
            store.find_service_by_id(inserted.id).unwrap(),
            Some(inserted)
        );
    }

    #[test]
    fn test_lookup_distinguishes_method_and_environment() {
        let store = InMemoryStore::new();
        let prod = store.insert_environment("teamA", "prod").unwrap();
        let test = store.insert_environment("teamA", "test").unwrap();
        store.insert_service(rest_get("orders", prod.id)).unwrap();

        let post = store
            .find_service(prod.id, ServiceKind::rest(HttpMethod::Post), "orders")
            .unwrap();
        assert!(post.is_none());

        let other_env = store
            .find_service(test.id, ServiceKind::rest(HttpMethod::Get), "orders")
            .unwrap();
        assert!(other_env.is_none());
    }

    #[test]
    fn test_duplicate_service_insert_returns_existing() {
        let store = InMemoryStore::new();
        let env = store.insert_environment("teamA", "prod").unwrap();
        let first = store.insert_service(rest_get("orders", env.id)).unwrap();
        let second = store.insert_service(rest_get("orders", env.id)).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.all_services().unwrap().len(), 1);
    }

    #[test]
    fn test_service_requires_existing_environment() {
        let store = InMemoryStore::new();
        assert!(store.insert_service(rest_get("orders", 99)).is_err());
        assert!(store.all_services().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_environment_rejected() {
        let store = InMemoryStore::new();
        store.insert_environment("teamA", "prod").unwrap();
        assert!(store.insert_environment("teamA", "prod").is_err());
        assert!(store.insert_environment("teamB", "prod").is_ok());

        let groups: Vec<_> = store
            .find_environments_named("prod")
            .unwrap()
            .into_iter()
            .map(|env| env.group)
            .collect();
        assert_eq!(groups, vec!["teamA", "teamB"]);
    }

    #[test]
    fn test_same_target_in_groups_sharing_an_environment_name() {
        let store = InMemoryStore::new();
        let team_a = store.insert_environment("teamA", "prod").unwrap();
        let team_b = store.insert_environment("teamB", "prod").unwrap();

        let a = store.insert_service(rest_get("orders", team_a.id)).unwrap();
        let b = store.insert_service(rest_get("orders", team_b.id)).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.all_services().unwrap().len(), 2);

        let kind = ServiceKind::rest(HttpMethod::Get);
        assert_eq!(store.find_service(team_b.id, kind, "orders").unwrap(), Some(b));
        assert_eq!(store.list_services(team_a.id, kind).unwrap(), vec![a]);
    }

    #[test]
    fn test_mocks_kept_in_creation_order() {
        let store = InMemoryStore::new();
        let group = store.insert_mock_group("g").id;
        for body in ["first", "second", "third"] {
            store
                .insert_mock(
                    group,
                    Mock {
                        id: UNASSIGNED_ID,
                        mock_group_id: MockGroupId::NONE,
                        predicate: BodyPredicate::Any,
                        http_status: 200,
                        response: body.to_string(),
                        http_headers: String::new(),
                        timeout_ms: 0,
                    },
                )
                .unwrap();
        }

        let mocks = store.find_mocks(group).unwrap();
        let bodies: Vec<_> = mocks.iter().map(|m| m.response.as_str()).collect();
        assert_eq!(bodies, vec!["first", "second", "third"]);
        assert!(mocks.windows(2).all(|w| w[0].id < w[1].id));
        assert!(mocks.iter().all(|m| m.mock_group_id == group));
    }

    #[test]
    fn test_mock_requires_existing_group() {
        let store = InMemoryStore::new();
        let result = store.insert_mock(
            MockGroupId(42),
            Mock {
                id: UNASSIGNED_ID,
                mock_group_id: MockGroupId::NONE,
                predicate: BodyPredicate::Any,
                http_status: 200,
                response: String::new(),
                http_headers: String::new(),
                timeout_ms: 0,
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_ids_advance_sequence() {
        let store = InMemoryStore::new();
        let env = store.insert_environment_with_id(10, "teamA", "prod").unwrap();
        assert_eq!(env.id, 10);
        let next = store.insert_environment("teamA", "test").unwrap();
        assert_eq!(next.id, 11);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = InMemoryStore::new();
        let env = store.insert_environment("teamA", "prod").unwrap();
        let service = store.insert_service(rest_get("orders", env.id)).unwrap();
        store.save_to_file(&path).unwrap();

        let restored = InMemoryStore::new();
        assert!(restored.load_from_file(&path).unwrap());
        assert_eq!(
            restored.find_service_by_id(service.id).unwrap(),
            Some(service)
        );

        // Sequence continues after the restored ids.
        let next = restored.insert_environment("teamA", "test").unwrap();
        assert!(next.id > env.id);
    }

    #[test]
    fn test_load_missing_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryStore::new();
        assert!(!store.load_from_file(&dir.path().join("absent.json")).unwrap());
    }

    #[test]
    fn test_request_records_get_ids() {
        let store = InMemoryStore::new();
        assert!(store.latest_request().is_none());

        let record = RequestData {
            id: UNASSIGNED_ID,
            sender: "10.0.0.1".into(),
            soap_action: Some("urn:Get".into()),
            request_call: None,
            environment_id: 1,
            local_target: "svc".into(),
            remote_target: "http://backend/svc".into(),
            request: "<a/>".into(),
            query: None,
            content_type: Some("text/xml".into()),
            request_headers: vec![("x-trace".into(), "abc".into())],
            start_time: chrono::Utc::now(),
            response: Some("<b/>".into()),
            time_in_millis: 12,
            status: 200,
            service_id: 3,
        };
        let saved = store.insert_request_data(record).unwrap();
        assert!(saved.id > 0);
        assert_eq!(store.request_count(), 1);
        assert_eq!(store.latest_request(), Some(saved.clone()));
        assert_eq!(store.load_request_data(saved.id).unwrap(), Some(saved));
        assert_eq!(store.load_request_data(999).unwrap(), None);
    }
}
