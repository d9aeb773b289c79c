//! Mock resolution.
//!
//! A service with `use_mock_group` set is answered from its mock group instead of
//! the backend. Mocks in a group are evaluated in creation order and the first
//! one whose predicate matches the request content wins.

mod predicate;

pub use predicate::{BodyPredicate, CompiledPredicate, PredicateError};

use crate::error::GatewayError;
use crate::model::{Mock, MockGroupId};
use crate::store::PersistenceStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on the artificial delay of any mock, whatever it stores.
pub const MOCK_DELAY_CEILING: Duration = Duration::from_secs(10);

pub struct MockResolver {
    store: Arc<dyn PersistenceStore>,
}

impl MockResolver {
    pub fn new(store: Arc<dyn PersistenceStore>) -> Self {
        Self { store }
    }

    /// Find the first mock of `group` (in creation order) matching `content`.
    pub fn find_match(&self, group: MockGroupId, content: &str) -> Result<Mock, GatewayError> {
        if group.is_none() {
            return Err(GatewayError::NoMockMatched(group.0));
        }

        let mut mocks = self.store.find_mocks(group)?;
        // Ids are assigned monotonically, so id order is creation order.
        mocks.sort_by_key(|mock| mock.id);

        for mock in mocks {
            match CompiledPredicate::compile(&mock.predicate) {
                Ok(predicate) if predicate.matches(content) => {
                    debug!("Mock {} of group {} matched", mock.id, group.0);
                    return Ok(mock);
                }
                Ok(_) => {}
                Err(e) => warn!("Skipping mock {} of group {}: {}", mock.id, group.0, e),
            }
        }

        Err(GatewayError::NoMockMatched(group.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn mock(predicate: BodyPredicate, response: &str) -> Mock {
        Mock {
            id: crate::model::UNASSIGNED_ID,
            mock_group_id: MockGroupId::NONE,
            predicate,
            http_status: 200,
            response: response.to_string(),
            http_headers: String::new(),
            timeout_ms: 0,
        }
    }

    fn contains(needle: &str) -> BodyPredicate {
        BodyPredicate::Contains {
            contains: needle.to_string(),
        }
    }

    #[test]
    fn test_first_created_mock_wins() {
        let store = Arc::new(InMemoryStore::new());
        let group = store.insert_mock_group("orders").id;
        store.insert_mock(group, mock(contains("X"), "A")).unwrap();
        store.insert_mock(group, mock(contains("X"), "B")).unwrap();

        let resolver = MockResolver::new(store);
        for _ in 0..5 {
            assert_eq!(resolver.find_match(group, "payload X").unwrap().response, "A");
        }
    }

    #[test]
    fn test_later_mock_matches_when_earlier_does_not() {
        let store = Arc::new(InMemoryStore::new());
        let group = store.insert_mock_group("orders").id;
        store.insert_mock(group, mock(contains("cancel"), "A")).unwrap();
        store.insert_mock(group, mock(contains("create"), "B")).unwrap();

        let resolver = MockResolver::new(store);
        assert_eq!(resolver.find_match(group, "create order").unwrap().response, "B");
    }

    #[test]
    fn test_no_match() {
        let store = Arc::new(InMemoryStore::new());
        let group = store.insert_mock_group("orders").id;
        store.insert_mock(group, mock(contains("cancel"), "A")).unwrap();

        let resolver = MockResolver::new(store);
        assert_eq!(
            resolver.find_match(group, "create order"),
            Err(GatewayError::NoMockMatched(group.0))
        );
    }

    #[test]
    fn test_sentinel_group_never_matches() {
        let resolver = MockResolver::new(Arc::new(InMemoryStore::new()));
        assert!(matches!(
            resolver.find_match(MockGroupId::NONE, "anything"),
            Err(GatewayError::NoMockMatched(-1))
        ));
    }

    #[test]
    fn test_broken_predicate_is_skipped() {
        let store = Arc::new(InMemoryStore::new());
        let group = store.insert_mock_group("orders").id;
        store
            .insert_mock(
                group,
                mock(
                    BodyPredicate::Matches {
                        matches: "(".into(),
                    },
                    "broken",
                ),
            )
            .unwrap();
        store.insert_mock(group, mock(BodyPredicate::Any, "fallback")).unwrap();

        let resolver = MockResolver::new(store);
        assert_eq!(resolver.find_match(group, "x").unwrap().response, "fallback");
    }
}
