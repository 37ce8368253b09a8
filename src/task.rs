use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attribute recording whether the task's repository supports subtasks.
pub const TASK_KEY_SUPPORTS_SUBTASKS: &str = "SupportsSubtasks";

/// Attribute holding the last seen modification date in epoch seconds.
pub const TASK_KEY_UPDATE_DATE: &str = "UpdateDate";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalTask {
    pub repository_url: String,
    pub task_id: String,
    pub task_key: Option<String>,
    pub summary: Option<String>,
    pub owner: Option<String>,
    pub priority: Option<String>,
    pub task_kind: Option<String>,
    pub creation_date: Option<DateTime<Utc>>,
    pub modification_date: Option<DateTime<Utc>>,
    pub completion_date: Option<DateTime<Utc>>,
    pub url: Option<String>,
    attributes: HashMap<String, String>,
}

impl LocalTask {
    pub fn new(repository_url: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            repository_url: repository_url.into(),
            task_id: task_id.into(),
            ..Self::default()
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Stores `value`; `None` removes the attribute.
    pub fn set_attribute(&mut self, key: &str, value: Option<String>) {
        match value {
            Some(value) => {
                self.attributes.insert(key.to_string(), value);
            }
            None => {
                self.attributes.remove(key);
            }
        }
    }
}
