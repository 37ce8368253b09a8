//! Ticket model shared by both protocol variants.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Action, Attachment, Comment};

/// Well-known ticket fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Key {
    Cc,
    ChangeTime,
    Component,
    Description,
    Id,
    Keywords,
    Milestone,
    Owner,
    Priority,
    Reporter,
    Resolution,
    Severity,
    Status,
    Summary,
    Time,
    Type,
    Version,
    Token,
}

impl Key {
    pub const ALL: [Key; 18] = [
        Key::Cc,
        Key::ChangeTime,
        Key::Component,
        Key::Description,
        Key::Id,
        Key::Keywords,
        Key::Milestone,
        Key::Owner,
        Key::Priority,
        Key::Reporter,
        Key::Resolution,
        Key::Severity,
        Key::Status,
        Key::Summary,
        Key::Time,
        Key::Type,
        Key::Version,
        Key::Token,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Key::Cc => "cc",
            Key::ChangeTime => "changetime",
            Key::Component => "component",
            Key::Description => "description",
            Key::Id => "id",
            Key::Keywords => "keywords",
            Key::Milestone => "milestone",
            Key::Owner => "owner",
            Key::Priority => "priority",
            Key::Reporter => "reporter",
            Key::Resolution => "resolution",
            Key::Severity => "severity",
            Key::Status => "status",
            Key::Summary => "summary",
            Key::Time => "time",
            Key::Type => "type",
            Key::Version => "version",
            Key::Token => "_ts",
        }
    }

    pub fn from_key(key: &str) -> Option<Key> {
        Key::ALL.iter().copied().find(|candidate| candidate.as_str() == key)
    }
}

/// A remote ticket. The id stays 0 until the ticket is saved.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    id: i32,
    created: Option<DateTime<Utc>>,
    last_changed: Option<DateTime<Utc>>,
    values: BTreeMap<Key, String>,
    custom_values: BTreeMap<String, String>,
    comments: Vec<Comment>,
    attachments: Vec<Attachment>,
    actions: Vec<Action>,
    resolutions: Vec<String>,
}

impl Ticket {
    /// Creates a new, unsaved ticket.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: i32) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn set_id(&mut self, id: i32) {
        self.id = id;
    }

    pub fn is_valid(&self) -> bool {
        self.id > 0
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    pub fn set_created(&mut self, created: Option<DateTime<Utc>>) {
        self.created = created;
    }

    pub fn last_changed(&self) -> Option<DateTime<Utc>> {
        self.last_changed
    }

    pub fn set_last_changed(&mut self, last_changed: Option<DateTime<Utc>>) {
        self.last_changed = last_changed;
    }

    /// Stores a value received from the server or entered locally.
    ///
    /// Returns `false` for the id, which is only ever set explicitly.
    pub fn put_value(&mut self, key: &str, value: impl Into<String>) -> bool {
        match Key::from_key(key) {
            Some(Key::Id) => false,
            Some(builtin) => {
                self.values.insert(builtin, value.into());
                true
            }
            None => {
                self.custom_values.insert(key.to_string(), value.into());
                true
            }
        }
    }

    pub fn set_value(&mut self, key: Key, value: impl Into<String>) {
        self.values.insert(key, value.into());
    }

    pub fn remove_value(&mut self, key: Key) -> Option<String> {
        self.values.remove(&key)
    }

    pub fn get_value(&self, key: Key) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    pub fn get_custom_value(&self, key: &str) -> Option<&str> {
        self.custom_values.get(key).map(String::as_str)
    }

    pub fn custom_values(&self) -> &BTreeMap<String, String> {
        &self.custom_values
    }

    /// All built-in and custom values keyed by their wire names.
    pub fn values(&self) -> BTreeMap<String, String> {
        let mut values: BTreeMap<String, String> = self
            .values
            .iter()
            .map(|(key, value)| (key.as_str().to_string(), value.clone()))
            .collect();
        for (key, value) in &self.custom_values {
            values.insert(key.clone(), value.clone());
        }
        values
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn add_comment(&mut self, comment: Comment) {
        self.comments.push(comment);
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn add_attachment(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
    }

    /// Available workflow actions; the first one is the default.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn set_actions(&mut self, actions: Vec<Action>) {
        self.actions = actions;
    }

    pub fn resolutions(&self) -> &[String] {
        &self.resolutions
    }

    pub fn set_resolutions(&mut self, resolutions: Vec<String>) {
        self.resolutions = resolutions;
    }
}
