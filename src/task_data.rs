//! Generic task-data model handed to the task framework.
//!
//! A [`TaskData`] is a flat, ordered list of attributes keyed by repository
//! field name, plus typed comment, attachment and operation lists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Framework-level attribute keys. Repository fields are mapped onto these
/// through [`crate::attributes::JiraAttribute`].
pub mod keys {
    pub const SUMMARY: &str = "task.common.summary";
    pub const DESCRIPTION: &str = "task.common.description";
    pub const STATUS: &str = "task.common.status";
    pub const RESOLUTION: &str = "task.common.resolution";
    pub const PRIORITY: &str = "task.common.priority";
    pub const PRODUCT: &str = "task.common.product";
    pub const KEYWORDS: &str = "task.common.keywords";
    pub const TASK_KEY: &str = "task.common.key";
    pub const TASK_KIND: &str = "task.common.kind";
    pub const USER_ASSIGNED: &str = "task.common.user.assigned";
    pub const USER_REPORTER: &str = "task.common.user.reporter";
    pub const USER_CC: &str = "task.common.user.cc";
    pub const DATE_CREATION: &str = "task.common.date.created";
    pub const DATE_MODIFICATION: &str = "task.common.date.modified";
    pub const COMMENT_NEW: &str = "task.common.comment.new";
    pub const ADD_SELF_CC: &str = "task.common.addselfcc";
    pub const NEW_CC: &str = "task.common.newcc";
    pub const REMOVE_CC: &str = "task.common.removecc";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeType {
    ShortText,
    LongText,
    ShortRichText,
    LongRichText,
    SingleSelect,
    Person,
    Date,
    Boolean,
    Operation,
    Comment,
    Attachment,
    TaskDependency,
}

/// Where an attribute is shown: with the regular attributes or with people.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeKind {
    Default,
    People,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMetaData {
    pub attr_type: Option<AttributeType>,
    pub kind: Option<AttributeKind>,
    pub label: Option<String>,
    pub read_only: bool,
    /// Repository field the attribute is sent back as.
    pub jira_key: Option<String>,
    /// Input attribute exposed when an operation is selected.
    pub associated_attribute: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAttribute {
    pub id: String,
    values: Vec<String>,
    options: Vec<(String, String)>,
    pub meta: AttributeMetaData,
}

impl TaskAttribute {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: Vec::new(),
            options: Vec::new(),
            meta: AttributeMetaData::default(),
        }
    }

    /// First value, or the empty string.
    pub fn value(&self) -> &str {
        self.values.first().map(String::as_str).unwrap_or("")
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.values = vec![value.into()];
    }

    pub fn set_values(&mut self, values: Vec<String>) {
        self.values = values;
    }

    pub fn add_value(&mut self, value: impl Into<String>) {
        self.values.push(value.into());
    }

    pub fn clear_values(&mut self) {
        self.values.clear();
    }

    /// Options in insertion order; re-putting a key replaces its label.
    pub fn options(&self) -> &[(String, String)] {
        &self.options
    }

    pub fn has_option(&self, key: &str) -> bool {
        self.options.iter().any(|(k, _)| k == key)
    }

    pub fn put_option(&mut self, key: impl Into<String>, label: impl Into<String>) {
        let key = key.into();
        let label = label.into();
        match self.options.iter_mut().find(|(k, _)| *k == key) {
            Some(option) => option.1 = label,
            None => self.options.push((key, label)),
        }
    }

    pub fn attr_type(&self) -> Option<AttributeType> {
        self.meta.attr_type
    }
}

/// One numbered comment extracted from a ticket's change log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskComment {
    pub number: usize,
    pub author: String,
    pub created: Option<DateTime<Utc>>,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAttachment {
    /// Zero-based position in the ticket's attachment list.
    pub id: String,
    pub filename: String,
    pub description: String,
    pub author: String,
    pub length: i64,
    pub created: Option<DateTime<Utc>>,
    pub url: String,
    pub content_type: String,
}

/// A selectable workflow transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOperation {
    pub id: String,
    pub label: String,
    pub associated_attribute: Option<String>,
}

impl TaskOperation {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            associated_attribute: None,
        }
    }
}

/// Everything the framework knows about one ticket. An empty task id marks a
/// task that has not been submitted yet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskData {
    pub repository_url: String,
    pub task_id: String,
    pub partial: bool,
    pub version: Option<String>,
    attributes: Vec<TaskAttribute>,
    pub comments: Vec<TaskComment>,
    pub attachments: Vec<TaskAttachment>,
    pub operations: Vec<TaskOperation>,
    /// Selected operation; the first available one by default.
    pub operation: Option<TaskOperation>,
}

impl TaskData {
    pub fn new(repository_url: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            repository_url: repository_url.into(),
            task_id: task_id.into(),
            ..Self::default()
        }
    }

    pub fn is_new(&self) -> bool {
        self.task_id.is_empty()
    }

    /// Creates `id`, replacing an existing attribute of the same id in place.
    pub fn create_attribute(&mut self, id: &str) -> &mut TaskAttribute {
        let index = match self.attributes.iter().position(|a| a.id == id) {
            Some(index) => {
                self.attributes[index] = TaskAttribute::new(id);
                index
            }
            None => {
                self.attributes.push(TaskAttribute::new(id));
                self.attributes.len() - 1
            }
        };
        &mut self.attributes[index]
    }

    pub fn attribute(&self, id: &str) -> Option<&TaskAttribute> {
        self.attributes.iter().find(|a| a.id == id)
    }

    pub fn attribute_mut(&mut self, id: &str) -> Option<&mut TaskAttribute> {
        self.attributes.iter_mut().find(|a| a.id == id)
    }

    pub fn remove_attribute(&mut self, id: &str) -> Option<TaskAttribute> {
        let index = self.attributes.iter().position(|a| a.id == id)?;
        Some(self.attributes.remove(index))
    }

    pub fn attributes(&self) -> &[TaskAttribute] {
        &self.attributes
    }

    pub fn retain_attributes(&mut self, keep: impl FnMut(&TaskAttribute) -> bool) {
        self.attributes.retain(keep);
    }

    /// Value of `id`, or the empty string when absent.
    pub fn value(&self, id: &str) -> &str {
        self.attribute(id).map(TaskAttribute::value).unwrap_or("")
    }

    pub fn values(&self, id: &str) -> &[String] {
        self.attribute(id).map(TaskAttribute::values).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_attributes_keep_their_position() {
        let mut data = TaskData::new("http://localhost", "1");
        data.create_attribute("summary").set_value("first");
        data.create_attribute("status").set_value("new");
        data.create_attribute("summary").set_value("second");

        let ids: Vec<&str> = data.attributes().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["summary", "status"]);
        assert_eq!(data.value("summary"), "second");
        assert_eq!(data.value("missing"), "");
        assert!(data.values("missing").is_empty());
    }

    #[test]
    fn options_keep_insertion_order() {
        let mut attribute = TaskAttribute::new("priority");
        attribute.put_option("major", "major");
        attribute.put_option("blocker", "blocker");
        attribute.put_option("major", "Major");
        assert_eq!(
            attribute.options(),
            &[
                ("major".to_string(), "Major".to_string()),
                ("blocker".to_string(), "blocker".to_string())
            ]
        );
        assert!(attribute.has_option("blocker"));
    }

    #[test]
    fn empty_task_id_is_new() {
        assert!(TaskData::new("http://localhost", "").is_new());
        assert!(!TaskData::new("http://localhost", "7").is_new());
    }
}
