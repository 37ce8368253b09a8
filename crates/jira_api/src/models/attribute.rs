//! Repository-wide attribute definitions cached per client.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub owner: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub name: String,
    pub due: Option<DateTime<Utc>>,
    pub completed: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub name: String,
    pub time: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

/// Enumerated ticket attribute ordered by its repository-defined value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketAttribute {
    pub name: String,
    pub value: i32,
}

impl TicketAttribute {
    pub fn new(name: impl Into<String>, value: i32) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl Ord for TicketAttribute {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .cmp(&other.value)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for TicketAttribute {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub type Priority = TicketAttribute;
pub type Severity = TicketAttribute;
pub type TicketResolution = TicketAttribute;
pub type TicketStatus = TicketAttribute;
pub type TicketType = TicketAttribute;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    #[default]
    Text,
    Checkbox,
    Select,
    Radio,
    Textarea,
}

impl FieldType {
    pub fn from_name(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "checkbox" => FieldType::Checkbox,
            "select" => FieldType::Select,
            "radio" => FieldType::Radio,
            "textarea" => FieldType::Textarea,
            _ => FieldType::Text,
        }
    }
}

/// Field definition for built-in and custom fields and action inputs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketField {
    pub name: String,
    pub field_type: FieldType,
    pub label: Option<String>,
    pub default_value: Option<String>,
    pub options: Vec<String>,
    pub custom: bool,
    pub order: i32,
    pub optional: bool,
    pub width: i32,
    pub height: i32,
}

impl TicketField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_attributes_sort_by_value() {
        let mut priorities = vec![
            Priority::new("minor", 4),
            Priority::new("blocker", 1),
            Priority::new("major", 3),
        ];
        priorities.sort();
        let names: Vec<_> = priorities.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["blocker", "major", "minor"]);
    }

    #[test]
    fn unknown_field_types_are_text() {
        assert_eq!(FieldType::from_name("checkbox"), FieldType::Checkbox);
        assert_eq!(FieldType::from_name("TEXTAREA"), FieldType::Textarea);
        assert_eq!(FieldType::from_name("time"), FieldType::Text);
    }
}
