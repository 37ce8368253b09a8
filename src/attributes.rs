//! Mapping between repository ticket fields and framework attribute keys.

use jira_api::{JiraClient, Key};

use crate::task_data::{keys, AttributeKind, AttributeType, TaskAttribute, TaskData};

pub const ATTRIBUTE_BLOCKED_BY: &str = "blockedby";
pub const ATTRIBUTE_BLOCKING: &str = "blocking";

/// Built-in ticket fields with their presentation metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JiraAttribute {
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

#[derive(Clone, Copy)]
enum Flag {
    None,
    ReadOnly,
    Attribute,
    People,
}

impl JiraAttribute {
    pub const ALL: [JiraAttribute; 18] = [
        JiraAttribute::Cc,
        JiraAttribute::ChangeTime,
        JiraAttribute::Component,
        JiraAttribute::Description,
        JiraAttribute::Id,
        JiraAttribute::Keywords,
        JiraAttribute::Milestone,
        JiraAttribute::Owner,
        JiraAttribute::Priority,
        JiraAttribute::Reporter,
        JiraAttribute::Resolution,
        JiraAttribute::Severity,
        JiraAttribute::Status,
        JiraAttribute::Summary,
        JiraAttribute::Time,
        JiraAttribute::Type,
        JiraAttribute::Version,
        JiraAttribute::Token,
    ];

    pub fn key(&self) -> Key {
        match self {
            JiraAttribute::Cc => Key::Cc,
            JiraAttribute::ChangeTime => Key::ChangeTime,
            JiraAttribute::Component => Key::Component,
            JiraAttribute::Description => Key::Description,
            JiraAttribute::Id => Key::Id,
            JiraAttribute::Keywords => Key::Keywords,
            JiraAttribute::Milestone => Key::Milestone,
            JiraAttribute::Owner => Key::Owner,
            JiraAttribute::Priority => Key::Priority,
            JiraAttribute::Reporter => Key::Reporter,
            JiraAttribute::Resolution => Key::Resolution,
            JiraAttribute::Severity => Key::Severity,
            JiraAttribute::Status => Key::Status,
            JiraAttribute::Summary => Key::Summary,
            JiraAttribute::Time => Key::Time,
            JiraAttribute::Type => Key::Type,
            JiraAttribute::Version => Key::Version,
            JiraAttribute::Token => Key::Token,
        }
    }

    pub fn jira_key(&self) -> &'static str {
        self.key().as_str()
    }

    pub fn label(&self) -> &'static str {
        match self {
            JiraAttribute::Cc => "CC:",
            JiraAttribute::ChangeTime => "Last Modification:",
            JiraAttribute::Component => "Component:",
            JiraAttribute::Description => "Description:",
            JiraAttribute::Id => "ID:",
            JiraAttribute::Keywords => "Keywords:",
            JiraAttribute::Milestone => "Milestone:",
            JiraAttribute::Owner => "Assigned to:",
            JiraAttribute::Priority => "Priority:",
            JiraAttribute::Reporter => "Reporter:",
            JiraAttribute::Resolution => "Resolution:",
            JiraAttribute::Severity => "Severity:",
            JiraAttribute::Status => "Status:",
            JiraAttribute::Summary => "Summary:",
            JiraAttribute::Time => "Created:",
            JiraAttribute::Type => "Type:",
            JiraAttribute::Version => "Version:",
            JiraAttribute::Token => "Update Token",
        }
    }

    /// Framework key this field is mapped onto, if any.
    pub fn task_key(&self) -> Option<&'static str> {
        match self {
            JiraAttribute::Cc => Some(keys::USER_CC),
            JiraAttribute::ChangeTime => Some(keys::DATE_MODIFICATION),
            JiraAttribute::Component => Some(keys::PRODUCT),
            JiraAttribute::Description => Some(keys::DESCRIPTION),
            JiraAttribute::Id => Some(keys::TASK_KEY),
            JiraAttribute::Keywords => Some(keys::KEYWORDS),
            JiraAttribute::Owner => Some(keys::USER_ASSIGNED),
            JiraAttribute::Priority => Some(keys::PRIORITY),
            JiraAttribute::Reporter => Some(keys::USER_REPORTER),
            JiraAttribute::Resolution => Some(keys::RESOLUTION),
            JiraAttribute::Status => Some(keys::STATUS),
            JiraAttribute::Summary => Some(keys::SUMMARY),
            JiraAttribute::Time => Some(keys::DATE_CREATION),
            JiraAttribute::Type => Some(keys::TASK_KIND),
            JiraAttribute::Milestone
            | JiraAttribute::Severity
            | JiraAttribute::Version
            | JiraAttribute::Token => None,
        }
    }

    pub fn attr_type(&self) -> AttributeType {
        match self {
            JiraAttribute::ChangeTime | JiraAttribute::Time => AttributeType::Date,
            JiraAttribute::Component
            | JiraAttribute::Milestone
            | JiraAttribute::Priority
            | JiraAttribute::Resolution
            | JiraAttribute::Severity
            | JiraAttribute::Type
            | JiraAttribute::Version => AttributeType::SingleSelect,
            JiraAttribute::Description => AttributeType::LongRichText,
            JiraAttribute::Summary => AttributeType::ShortRichText,
            JiraAttribute::Owner | JiraAttribute::Reporter => AttributeType::Person,
            JiraAttribute::Cc
            | JiraAttribute::Id
            | JiraAttribute::Keywords
            | JiraAttribute::Status
            | JiraAttribute::Token => AttributeType::ShortText,
        }
    }

    fn flag(&self) -> Flag {
        match self {
            JiraAttribute::Cc | JiraAttribute::Id | JiraAttribute::Owner => Flag::People,
            JiraAttribute::ChangeTime
            | JiraAttribute::Reporter
            | JiraAttribute::Time
            | JiraAttribute::Token => Flag::ReadOnly,
            JiraAttribute::Component
            | JiraAttribute::Keywords
            | JiraAttribute::Milestone
            | JiraAttribute::Priority
            | JiraAttribute::Severity
            | JiraAttribute::Type
            | JiraAttribute::Version => Flag::Attribute,
            JiraAttribute::Description
            | JiraAttribute::Resolution
            | JiraAttribute::Status
            | JiraAttribute::Summary => Flag::None,
        }
    }

    pub fn kind(&self) -> Option<AttributeKind> {
        match self.flag() {
            Flag::Attribute => Some(AttributeKind::Default),
            Flag::People => Some(AttributeKind::People),
            Flag::None | Flag::ReadOnly => None,
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self.flag(), Flag::ReadOnly)
    }

    pub fn by_jira_key(jira_key: &str) -> Option<JiraAttribute> {
        Self::ALL.iter().copied().find(|a| a.jira_key() == jira_key)
    }

    pub fn by_task_key(task_key: &str) -> Option<JiraAttribute> {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.task_key() == Some(task_key))
    }
}

/// Repository field name for a framework key; unknown keys map to themselves.
pub fn map_to_repository_key(task_key: &str) -> &str {
    match JiraAttribute::by_task_key(task_key) {
        Some(attribute) => attribute.jira_key(),
        None => task_key,
    }
}

/// Looks an attribute up by framework key or by repository field name.
pub fn mapped_attribute<'a>(data: &'a TaskData, key: &str) -> Option<&'a TaskAttribute> {
    data.attribute(map_to_repository_key(key))
}

pub fn mapped_value<'a>(data: &'a TaskData, key: &str) -> &'a str {
    mapped_attribute(data, key)
        .map(TaskAttribute::value)
        .unwrap_or("")
}

pub fn mapped_values<'a>(data: &'a TaskData, key: &str) -> &'a [String] {
    mapped_attribute(data, key)
        .map(TaskAttribute::values)
        .unwrap_or(&[])
}

/// Attributes that are never sent back to the repository as ticket fields.
pub fn is_internal_attribute(attribute: &TaskAttribute) -> bool {
    if matches!(
        attribute.attr_type(),
        Some(AttributeType::Attachment | AttributeType::Operation | AttributeType::Comment)
    ) {
        return true;
    }
    matches!(
        attribute.id.as_str(),
        keys::COMMENT_NEW | keys::ADD_SELF_CC | keys::REMOVE_CC | keys::NEW_CC
    )
}

/// Options the repository offers for a built-in field, as (key, label)
/// pairs. `None` when attributes were never fetched or the list is empty.
pub fn repository_options(client: &dyn JiraClient, jira_key: &str) -> Option<Vec<(String, String)>> {
    if !client.has_attributes() {
        return None;
    }
    let (names, allow_empty): (Vec<String>, bool) = match JiraAttribute::by_jira_key(jira_key)? {
        JiraAttribute::Status => (attribute_names(client.ticket_status()), false),
        JiraAttribute::Resolution => (attribute_names(client.ticket_resolutions()), false),
        JiraAttribute::Component => (
            client
                .components()
                .unwrap_or_default()
                .into_iter()
                .map(|c| c.name)
                .collect(),
            false,
        ),
        JiraAttribute::Version => (
            client
                .versions()
                .unwrap_or_default()
                .into_iter()
                .map(|v| v.name)
                .collect(),
            true,
        ),
        JiraAttribute::Priority => (attribute_names(client.priorities()), false),
        JiraAttribute::Severity => (attribute_names(client.severities()), false),
        JiraAttribute::Milestone => (
            client
                .milestones()
                .unwrap_or_default()
                .into_iter()
                .map(|m| m.name)
                .collect(),
            true,
        ),
        JiraAttribute::Type => (attribute_names(client.ticket_types()), false),
        _ => return None,
    };
    if names.is_empty() {
        return None;
    }
    let mut options = Vec::with_capacity(names.len() + 1);
    if allow_empty {
        options.push((String::new(), String::new()));
    }
    options.extend(names.into_iter().map(|name| (name.clone(), name)));
    Some(options)
}

fn attribute_names(values: Option<Vec<jira_api::TicketAttribute>>) -> Vec<String> {
    values
        .unwrap_or_default()
        .into_iter()
        .map(|value| value.name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_in_both_directions() {
        for attribute in JiraAttribute::ALL {
            assert_eq!(JiraAttribute::by_jira_key(attribute.jira_key()), Some(attribute));
            if let Some(task_key) = attribute.task_key() {
                assert_eq!(JiraAttribute::by_task_key(task_key), Some(attribute));
            }
        }
        assert_eq!(map_to_repository_key(keys::USER_CC), "cc");
        assert_eq!(map_to_repository_key(keys::DATE_MODIFICATION), "changetime");
        assert_eq!(map_to_repository_key("blockedby"), "blockedby");
        assert_eq!(JiraAttribute::Token.jira_key(), "_ts");
    }

    #[test]
    fn flags_drive_kind_and_read_only() {
        assert!(JiraAttribute::Reporter.is_read_only());
        assert!(JiraAttribute::Token.is_read_only());
        assert!(!JiraAttribute::Summary.is_read_only());
        assert_eq!(JiraAttribute::Owner.kind(), Some(AttributeKind::People));
        assert_eq!(JiraAttribute::Priority.kind(), Some(AttributeKind::Default));
        assert_eq!(JiraAttribute::Status.kind(), None);
    }

    #[test]
    fn internal_attributes_are_recognised() {
        let mut operation = TaskAttribute::new("task.common.operation-accept");
        operation.meta.attr_type = Some(AttributeType::Operation);
        assert!(is_internal_attribute(&operation));
        assert!(is_internal_attribute(&TaskAttribute::new(keys::NEW_CC)));
        assert!(is_internal_attribute(&TaskAttribute::new(keys::COMMENT_NEW)));
        assert!(!is_internal_attribute(&TaskAttribute::new("summary")));
    }

    #[test]
    fn mapped_lookup_uses_repository_keys() {
        let mut data = TaskData::new("http://localhost", "1");
        data.create_attribute("owner").set_value("alice");
        assert_eq!(mapped_value(&data, keys::USER_ASSIGNED), "alice");
        assert_eq!(mapped_value(&data, "owner"), "alice");
        assert!(mapped_values(&data, keys::USER_CC).is_empty());
    }
}
