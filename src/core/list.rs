use serde::{Deserialize, Serialize};

use super::ListId;

/// A named container of tasks owned by the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    pub id: ListId,
    pub name: String,
}

impl TaskList {
    pub fn new(id: ListId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
