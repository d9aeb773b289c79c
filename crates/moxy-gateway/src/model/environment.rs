use serde::{Deserialize, Serialize};

/// Deployment environment. `(group, name)` is unique across the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub id: i64,
    pub group: String,
    pub name: String,
}

impl Environment {
    pub fn new(id: i64, group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            group: group.into(),
            name: name.into(),
        }
    }
}
