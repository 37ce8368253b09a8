//! Conversion between repository tickets and task data.

use std::collections::BTreeSet;
use std::sync::Arc;

use jira_api::client::validate_new_ticket;
use jira_api::config::TICKET_ATTACHMENT_URL;
use jira_api::util::{encode_url, parse_date_str, to_epoch_seconds};
use jira_api::{Action, AccessMode, CancelToken, FieldType, JiraClient, Key, Ticket, TicketField};

use crate::attributes::{
    is_internal_attribute, map_to_repository_key, mapped_value, mapped_values, repository_options,
    JiraAttribute, ATTRIBUTE_BLOCKED_BY, ATTRIBUTE_BLOCKING,
};
use crate::client_manager::ClientManager;
use crate::error::{ConnectorError, Result};
use crate::repository::TaskRepository;
use crate::task::{LocalTask, TASK_KEY_SUPPORTS_SUBTASKS};
use crate::task_data::{
    keys, AttributeKind, AttributeType, TaskAttachment, TaskAttribute, TaskComment, TaskData,
    TaskOperation,
};

/// Schema version stamped on every task data built here.
pub const TASK_DATA_VERSION: &str = "2";

const CC_SEPARATORS: [char; 2] = [',', ' '];

/// Values copied from the parent when a subtask is initialised.
const INHERITED_FIELDS: [JiraAttribute; 9] = [
    JiraAttribute::Cc,
    JiraAttribute::Component,
    JiraAttribute::Keywords,
    JiraAttribute::Milestone,
    JiraAttribute::Owner,
    JiraAttribute::Priority,
    JiraAttribute::Severity,
    JiraAttribute::Type,
    JiraAttribute::Version,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseKind {
    TaskCreated,
    TaskUpdated,
}

/// Outcome of submitting task data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryResponse {
    pub kind: ResponseKind,
    pub task_id: String,
}

pub struct TaskDataHandler {
    client_manager: Arc<ClientManager>,
    rich_editor: bool,
}

impl TaskDataHandler {
    pub fn new(client_manager: Arc<ClientManager>, rich_editor: bool) -> Self {
        Self {
            client_manager,
            rich_editor,
        }
    }

    pub fn client_manager(&self) -> &Arc<ClientManager> {
        &self.client_manager
    }

    /// Full task data and id-only queries need the XML-RPC variant.
    pub fn has_rich_editor(&self, repository: &TaskRepository) -> bool {
        self.rich_editor && repository.effective_access_mode() == AccessMode::XmlRpc
    }

    pub async fn get_task_data(
        &self,
        repository: &TaskRepository,
        task_id: &str,
        token: &CancelToken,
    ) -> Result<TaskData> {
        let id = parse_ticket_id(task_id)?;
        self.download_task_data(repository, id, token).await
    }

    async fn download_task_data(
        &self,
        repository: &TaskRepository,
        id: i32,
        token: &CancelToken,
    ) -> Result<TaskData> {
        let client = self.client_manager.get_client(repository);
        let url = repository.url();
        client
            .update_attributes(false, token)
            .await
            .map_err(|err| ConnectorError::from_jira(err, url))?;
        let ticket = client
            .get_ticket(id, token)
            .await
            .map_err(|err| ConnectorError::from_jira(err, url))?;
        Ok(self.create_task_data_from_ticket(client.as_ref(), repository, &ticket))
    }

    /// Builds task data for a downloaded ticket. Without the rich editor only
    /// the fields the ticket carried are kept and the data is partial.
    pub fn create_task_data_from_ticket(
        &self,
        client: &dyn JiraClient,
        repository: &TaskRepository,
        ticket: &Ticket,
    ) -> TaskData {
        let mut data = TaskData::new(repository.url(), ticket.id().to_string());
        create_default_attributes(&mut data, client, true);
        let changed = update_task_data(repository.url(), &mut data, ticket);
        if !self.has_rich_editor(repository) {
            data.retain_attributes(|attribute| {
                changed.contains(&attribute.id) || is_internal_attribute(attribute)
            });
            data.partial = true;
        }
        remove_empty_single_select_attributes(&mut data);
        data
    }

    /// Submits new or edited task data.
    pub async fn post_task_data(
        &self,
        repository: &TaskRepository,
        data: &TaskData,
        token: &CancelToken,
    ) -> Result<RepositoryResponse> {
        let url = repository.url();
        let ticket = get_jira_ticket(repository, data)?;
        if data.is_new() {
            validate_new_ticket(&ticket).map_err(|err| ConnectorError::repository(url, err.to_string()))?;
        }
        let client = self.client_manager.get_client(repository);
        if data.is_new() {
            let id = client
                .create_ticket(&ticket, token)
                .await
                .map_err(|err| ConnectorError::from_jira(err, url))?;
            log::info!("Created ticket #{id} in {url}");
            Ok(RepositoryResponse {
                kind: ResponseKind::TaskCreated,
                task_id: id.to_string(),
            })
        } else {
            let comment = mapped_value(data, keys::COMMENT_NEW);
            client
                .update_ticket(&ticket, comment, token)
                .await
                .map_err(|err| ConnectorError::from_jira(err, url))?;
            log::debug!("Updated ticket #{} in {url}", ticket.id());
            Ok(RepositoryResponse {
                kind: ResponseKind::TaskUpdated,
                task_id: ticket.id().to_string(),
            })
        }
    }

    /// Prepares empty task data for a ticket that is about to be created.
    pub async fn initialize_task_data(
        &self,
        repository: &TaskRepository,
        data: &mut TaskData,
        token: &CancelToken,
    ) -> Result<()> {
        let client = self.client_manager.get_client(repository);
        client
            .update_attributes(false, token)
            .await
            .map_err(|err| ConnectorError::from_jira(err, repository.url()))?;
        create_default_attributes(data, client.as_ref(), false);
        remove_empty_single_select_attributes(data);
        Ok(())
    }

    /// Prepares `data` as a subtask of `parent`: shared fields are inherited,
    /// the new ticket blocks the parent.
    pub async fn initialize_subtask_data(
        &self,
        repository: &TaskRepository,
        data: &mut TaskData,
        parent: &TaskData,
        token: &CancelToken,
    ) -> Result<()> {
        self.initialize_task_data(repository, data, token).await?;
        if data.attribute(ATTRIBUTE_BLOCKING).is_none() {
            return Err(ConnectorError::repository(
                repository.url(),
                "The repository does not support subtasks",
            ));
        }

        for field in INHERITED_FIELDS {
            let Some(source) = parent.attribute(field.jira_key()) else {
                continue;
            };
            let values = source.values().to_vec();
            if let Some(target) = data.attribute_mut(field.jira_key()) {
                let selectable = target.options().is_empty()
                    || values.iter().all(|value| target.has_option(value));
                if selectable {
                    target.set_values(values);
                }
            }
        }
        for key in [keys::SUMMARY, keys::DESCRIPTION] {
            if let Some(attribute) = data.attribute_mut(map_to_repository_key(key)) {
                attribute.set_value("");
            }
        }

        if let Some(blocking) = data.attribute_mut(ATTRIBUTE_BLOCKING) {
            blocking.set_value(parent.task_id.clone());
        }
        if let Some(blocked_by) = data.attribute_mut(ATTRIBUTE_BLOCKED_BY) {
            blocked_by.clear_values();
        }
        if let Some(kind) = data.attribute_mut(JiraAttribute::Type.jira_key()) {
            if kind.value() == "story" && kind.has_option("task") {
                kind.set_value("task");
            }
        }
        Ok(())
    }

    pub fn can_initialize_subtask_data(task: &LocalTask) -> bool {
        task.attribute(TASK_KEY_SUPPORTS_SUBTASKS) == Some("true")
    }
}

/// Parses a ticket id as used in task ids and URLs.
pub fn parse_ticket_id(task_id: &str) -> Result<i32> {
    task_id
        .trim()
        .parse::<i32>()
        .map_err(|_| ConnectorError::InvalidTaskId(task_id.to_string()))
}

/// Creates the attribute schema for a ticket from the client's cached
/// repository attributes. Existing tickets additionally get the dates, the
/// status, the update token and the inputs used for editing.
pub fn create_default_attributes(data: &mut TaskData, client: &dyn JiraClient, existing_task: bool) {
    data.version = Some(TASK_DATA_VERSION.to_string());

    create_attribute(data, Some(client), JiraAttribute::Summary);
    create_attribute(data, Some(client), JiraAttribute::Description);
    if existing_task {
        create_attribute(data, Some(client), JiraAttribute::Time);
        create_attribute(data, Some(client), JiraAttribute::ChangeTime);
        create_attribute(data, Some(client), JiraAttribute::Status);
        create_attribute(data, Some(client), JiraAttribute::Resolution).set_value("");
        create_attribute(data, None, JiraAttribute::Token);
    }
    for field in [
        JiraAttribute::Component,
        JiraAttribute::Version,
        JiraAttribute::Priority,
        JiraAttribute::Severity,
        JiraAttribute::Milestone,
        JiraAttribute::Type,
        JiraAttribute::Keywords,
    ] {
        create_attribute(data, Some(client), field);
    }
    for field in client.ticket_fields().unwrap_or_default() {
        if field.custom {
            create_field_attribute(data, &field);
        }
    }

    create_attribute(data, Some(client), JiraAttribute::Owner);
    if existing_task {
        create_attribute(data, Some(client), JiraAttribute::Reporter);
    }
    create_attribute(data, Some(client), JiraAttribute::Cc);
    if existing_task {
        let new_cc = data.create_attribute(keys::NEW_CC);
        new_cc.meta.attr_type = Some(AttributeType::ShortText);
        new_cc.meta.kind = Some(AttributeKind::People);
        new_cc.meta.label = Some("Add CC:".into());

        let remove_cc = data.create_attribute(keys::REMOVE_CC);
        remove_cc.meta.label = Some("Remove CC:".into());

        let comment = data.create_attribute(keys::COMMENT_NEW);
        comment.meta.attr_type = Some(AttributeType::LongRichText);
    }
}

/// Creates the attribute of a built-in field. With a client, selectable
/// fields get their options and defaults from the repository.
pub fn create_attribute<'a>(
    data: &'a mut TaskData,
    client: Option<&dyn JiraClient>,
    field: JiraAttribute,
) -> &'a mut TaskAttribute {
    let definition = client.and_then(|client| client.ticket_field_by_name(field.jira_key()));
    let options = client.and_then(|client| repository_options(client, field.jira_key()));

    let attribute = data.create_attribute(field.jira_key());
    attribute.meta.attr_type = Some(field.attr_type());
    attribute.meta.kind = field.kind();
    attribute.meta.label = Some(field.label().to_string());
    attribute.meta.read_only = field.is_read_only();
    attribute.meta.jira_key = Some(field.jira_key().to_string());

    if client.is_none() {
        return attribute;
    }
    match options {
        Some(options) => {
            let set_default = definition.as_ref().map_or(true, |field| !field.optional);
            for (index, (key, label)) in options.into_iter().enumerate() {
                if index == 0 && set_default {
                    attribute.set_value(key.clone());
                }
                attribute.put_option(key, label);
            }
        }
        None if field.attr_type() == AttributeType::SingleSelect => {
            attribute.meta.read_only = true;
        }
        None => {}
    }
    if let Some(default) = definition
        .and_then(|field| field.default_value)
        .filter(|value| !value.is_empty())
    {
        attribute.set_value(default);
    }
    attribute
}

/// Creates the attribute of a custom field from its definition.
pub fn create_field_attribute<'a>(data: &'a mut TaskData, field: &TicketField) -> &'a mut TaskAttribute {
    let attribute = data.create_attribute(&field.name);
    attribute.meta.kind = Some(AttributeKind::Default);
    attribute.meta.label = Some(format!("{}:", field.label.as_deref().unwrap_or(&field.name)));
    attribute.meta.jira_key = Some(field.name.clone());

    let default = field.default_value.as_deref().unwrap_or("");
    match field.field_type {
        FieldType::Checkbox => {
            attribute.meta.attr_type = Some(AttributeType::Boolean);
            attribute.put_option("1", "1");
            attribute.put_option("0", "0");
            if !default.is_empty() {
                attribute.set_value(default);
            }
        }
        FieldType::Select | FieldType::Radio => {
            attribute.meta.attr_type = Some(AttributeType::SingleSelect);
            if field.optional {
                attribute.put_option("", "");
            }
            for option in &field.options {
                attribute.put_option(option.clone(), option.clone());
            }
            if !default.is_empty() {
                match default.parse::<usize>() {
                    Ok(index) if index > 0 && index < field.options.len() => {
                        attribute.set_value(field.options[index].clone());
                    }
                    Ok(_) => {}
                    Err(_) => {
                        if field.options.iter().any(|option| option == default) {
                            attribute.set_value(default);
                        }
                    }
                }
            }
        }
        FieldType::Textarea => {
            attribute.meta.attr_type = Some(AttributeType::LongText);
            attribute.set_value(default);
        }
        FieldType::Text => {
            attribute.meta.attr_type = Some(AttributeType::ShortText);
            attribute.set_value(default);
        }
    }

    if field.name == ATTRIBUTE_BLOCKED_BY || field.name == ATTRIBUTE_BLOCKING {
        attribute.meta.attr_type = Some(AttributeType::TaskDependency);
    }
    attribute
}

/// Copies the ticket onto `data` and returns the ids of the attributes that
/// received a value.
pub fn update_task_data(repository_url: &str, data: &mut TaskData, ticket: &Ticket) -> BTreeSet<String> {
    let mut changed = BTreeSet::new();

    if let Some(last_changed) = ticket.last_changed() {
        if let Some(attribute) = data.attribute_mut(Key::ChangeTime.as_str()) {
            attribute.set_value(to_epoch_seconds(&last_changed).to_string());
        }
    }
    if let Some(created) = ticket.created() {
        if let Some(attribute) = data.attribute_mut(Key::Time.as_str()) {
            attribute.set_value(to_epoch_seconds(&created).to_string());
        }
    }

    for (key, value) in ticket.values() {
        let Some(attribute) = data.attribute_mut(&key) else {
            continue;
        };
        if key == Key::Cc.as_str() {
            attribute.clear_values();
            for name in value.split(CC_SEPARATORS).filter(|name| !name.is_empty()) {
                attribute.add_value(name);
            }
        } else {
            attribute.set_value(value);
        }
        changed.insert(key);
    }

    data.comments = ticket
        .comments()
        .iter()
        .filter(|comment| comment.field == "comment" && !comment.new_value.is_empty())
        .enumerate()
        .map(|(index, comment)| TaskComment {
            number: index + 1,
            author: comment.author.clone(),
            created: comment.created,
            text: comment.new_value.clone(),
        })
        .collect();

    data.attachments = ticket
        .attachments()
        .iter()
        .enumerate()
        .map(|(index, attachment)| TaskAttachment {
            id: index.to_string(),
            filename: attachment.filename.clone(),
            description: attachment.description.clone(),
            author: attachment.author.clone(),
            length: attachment.size,
            created: attachment.created,
            url: format!(
                "{repository_url}{TICKET_ATTACHMENT_URL}{}/{}",
                ticket.id(),
                encode_url(&attachment.filename)
            ),
            content_type: mime_guess::from_path(&attachment.filename)
                .first_or_octet_stream()
                .to_string(),
        })
        .collect();

    data.operations.clear();
    data.operation = None;
    for (index, action) in ticket.actions().iter().enumerate() {
        add_operation(data, ticket, action, index == 0);
    }
    changed
}

fn add_operation(data: &mut TaskData, ticket: &Ticket, action: &Action, is_default: bool) {
    let label = match action.label.clone() {
        Some(label) => label,
        None => match default_action_label(ticket, &action.id) {
            Some(label) => label,
            None => return,
        },
    };

    let mut operation = TaskOperation::new(action.id.clone(), label);
    if let Some(field) = action.field() {
        create_field_attribute(data, field).meta.kind = None;
        operation.associated_attribute = Some(field.name.clone());
    } else if action.id == "resolve" {
        operation.associated_attribute = Some(Key::Resolution.as_str().to_string());
    }
    if is_default {
        data.operation = Some(operation.clone());
    }
    data.operations.push(operation);
}

fn default_action_label(ticket: &Ticket, action: &str) -> Option<String> {
    let label = match action {
        "leave" => {
            let status = ticket.get_value(Key::Status).filter(|value| !value.is_empty());
            let resolution = ticket.get_value(Key::Resolution).filter(|value| !value.is_empty());
            match (status, resolution) {
                (Some(status), Some(resolution)) => format!("Leave as {status} {resolution}"),
                (Some(status), None) => format!("Leave as {status}"),
                _ => "Leave".to_string(),
            }
        }
        "accept" => "Accept".to_string(),
        "resolve" => "Resolve as".to_string(),
        "reopen" => "Reopen".to_string(),
        "reassign" => return None,
        other => other.to_string(),
    };
    Some(label)
}

/// Drops single selects that have neither a value nor anything to choose.
pub fn remove_empty_single_select_attributes(data: &mut TaskData) {
    data.retain_attributes(|attribute| {
        !(attribute.attr_type() == Some(AttributeType::SingleSelect)
            && attribute.value().is_empty()
            && attribute.options().is_empty())
    });
}

/// Converts task data back into the ticket sent to the repository.
pub fn get_jira_ticket(repository: &TaskRepository, data: &TaskData) -> Result<Ticket> {
    let mut ticket = if data.is_new() {
        Ticket::new()
    } else {
        Ticket::with_id(parse_ticket_id(&data.task_id)?)
    };

    for attribute in data.attributes() {
        if is_internal_attribute(attribute) || attribute.id == Key::Resolution.as_str() {
            continue;
        }
        if !attribute.meta.read_only || attribute.id == Key::Token.as_str() {
            ticket.put_value(&attribute.id, attribute.value());
        }
    }

    ticket.put_value(Key::Cc.as_str(), merge_cc(repository, data).join(","));
    ticket.put_value(Key::Owner.as_str(), mapped_value(data, keys::USER_ASSIGNED));

    if let Some(operation) = &data.operation {
        match operation.id.as_str() {
            "accept" => ticket.set_value(Key::Status, "assigned"),
            "resolve" => {
                ticket.set_value(Key::Status, "closed");
                ticket.set_value(Key::Resolution, mapped_value(data, keys::RESOLUTION));
            }
            "reopen" => {
                ticket.set_value(Key::Status, "reopened");
                ticket.set_value(Key::Resolution, "");
            }
            "reassign" => ticket.set_value(Key::Status, "new"),
            _ => {}
        }
        ticket.put_value("action", operation.id.clone());
    }

    ticket.set_last_changed(parse_date_str(data.value(Key::ChangeTime.as_str())));
    Ok(ticket)
}

/// Existing CC names, then new ones, then the user when asked to add
/// themself. Names on the removal list never make it into the result.
fn merge_cc(repository: &TaskRepository, data: &TaskData) -> Vec<String> {
    let removed: BTreeSet<&str> = data.values(keys::REMOVE_CC).iter().map(String::as_str).collect();
    let mut merged: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        if !name.is_empty() && !removed.contains(name) && !merged.iter().any(|n| n == name) {
            merged.push(name.to_string());
        }
    };

    for name in mapped_values(data, keys::USER_CC) {
        push(name);
    }
    for name in data.value(keys::NEW_CC).split(CC_SEPARATORS) {
        push(name);
    }
    if data.value(keys::ADD_SELF_CC) == "true" {
        if let Some(user) = repository.user_name() {
            push(user);
        }
    }
    merged
}

/// Subtasks are modelled through the blocked-by relation field.
pub fn supports_subtasks(data: &TaskData) -> bool {
    data.attribute(ATTRIBUTE_BLOCKED_BY).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusKind;
    use crate::test_support::{manager_for, repository, sample_attributes, FakeClient};
    use chrono::TimeZone;
    use jira_api::{Attachment, Comment, JiraError};

    fn client(mode: AccessMode) -> Arc<FakeClient> {
        let client = FakeClient::shared(mode);
        client.set_data(sample_attributes());
        client
    }

    fn sample_ticket() -> Ticket {
        let mut ticket = Ticket::with_id(7);
        ticket.set_created(chrono::Utc.timestamp_opt(1_000, 0).single());
        ticket.set_last_changed(chrono::Utc.timestamp_opt(2_000, 0).single());
        ticket.put_value("summary", "Crash on start");
        ticket.put_value("status", "assigned");
        ticket.put_value("priority", "major");
        ticket.put_value("cc", "alice, bob");
        ticket.put_value("blockedby", "3, 4");
        ticket.add_comment(Comment {
            field: "status".into(),
            new_value: "assigned".into(),
            ..Comment::default()
        });
        ticket.add_comment(Comment {
            author: "alice".into(),
            field: "comment".into(),
            new_value: "Seen it too".into(),
            ..Comment::default()
        });
        ticket.add_comment(Comment {
            field: "comment".into(),
            ..Comment::default()
        });
        ticket.add_attachment(Attachment::new("crash log.txt"));

        let mut resolve = Action::new("resolve");
        let mut resolution = TicketField::new("action_resolve_resolution");
        resolution.field_type = FieldType::Select;
        resolution.options = vec!["fixed".into(), "invalid".into()];
        resolve.fields.push(resolution);
        ticket.set_actions(vec![
            Action::new("leave"),
            Action::new("reassign"),
            resolve,
            Action::new("reopen"),
        ]);
        ticket
    }

    #[test]
    fn ticket_becomes_full_task_data_with_rich_editor() {
        let client = client(AccessMode::XmlRpc);
        let handler = TaskDataHandler::new(manager_for(Arc::clone(&client)), true);
        let repo = repository(AccessMode::XmlRpc);

        let data = handler.create_task_data_from_ticket(client.as_ref(), &repo, &sample_ticket());

        assert!(!data.partial);
        assert_eq!(data.version.as_deref(), Some(TASK_DATA_VERSION));
        assert_eq!(data.value("summary"), "Crash on start");
        assert_eq!(data.value("changetime"), "2000");
        assert_eq!(data.value("time"), "1000");
        assert_eq!(data.values("cc"), ["alice".to_string(), "bob".to_string()]);
        assert_eq!(data.value("component"), "core");
        assert_eq!(data.value("rank"), "mid");
        assert_eq!(data.value("resolution"), "");
        assert!(data.attribute("severity").is_none());
        assert_eq!(
            data.attribute("blockedby").and_then(TaskAttribute::attr_type),
            Some(AttributeType::TaskDependency)
        );
        assert!(data.attribute(keys::COMMENT_NEW).is_some());
        assert!(supports_subtasks(&data));

        assert_eq!(data.comments.len(), 1);
        assert_eq!(data.comments[0].number, 1);
        assert_eq!(data.comments[0].text, "Seen it too");

        assert_eq!(
            data.attachments[0].url,
            "http://localhost/jira/attachment/ticket/7/crash%20log.txt"
        );
        assert_eq!(data.attachments[0].content_type, "text/plain");

        let ids: Vec<&str> = data.operations.iter().map(|op| op.id.as_str()).collect();
        assert_eq!(ids, vec!["leave", "resolve", "reopen"]);
        assert_eq!(data.operations[0].label, "Leave as assigned");
        assert_eq!(data.operation.as_ref().map(|op| op.id.as_str()), Some("leave"));
        assert_eq!(
            data.operations[1].associated_attribute.as_deref(),
            Some("action_resolve_resolution")
        );
        assert!(data.attribute("action_resolve_resolution").is_some());
    }

    #[test]
    fn web_access_yields_partial_data_with_received_fields_only() {
        let client = client(AccessMode::Web);
        let handler = TaskDataHandler::new(manager_for(Arc::clone(&client)), true);
        let repo = repository(AccessMode::Web);

        let data = handler.create_task_data_from_ticket(client.as_ref(), &repo, &sample_ticket());

        assert!(data.partial);
        assert_eq!(data.value("summary"), "Crash on start");
        assert!(data.attribute("component").is_none());
        assert!(data.attribute(keys::NEW_CC).is_some());
    }

    #[test]
    fn cc_merge_never_reintroduces_removed_names() {
        let client = client(AccessMode::XmlRpc);
        let mut data = TaskData::new(crate::test_support::URL, "7");
        create_default_attributes(&mut data, client.as_ref(), true);
        data.attribute_mut("cc")
            .expect("cc")
            .set_values(vec!["a".into(), "b".into()]);
        data.attribute_mut(keys::REMOVE_CC)
            .expect("remove cc")
            .set_values(vec!["b".into(), "c".into()]);
        data.attribute_mut(keys::NEW_CC).expect("new cc").set_value("c, d a");
        data.create_attribute(keys::ADD_SELF_CC).set_value("true");

        let ticket = get_jira_ticket(&repository(AccessMode::XmlRpc), &data).expect("ticket");
        assert_eq!(ticket.get_value(Key::Cc), Some("a,d,me"));
    }

    #[test]
    fn operations_drive_status_and_resolution() {
        let client = client(AccessMode::XmlRpc);
        let mut data = TaskData::new(crate::test_support::URL, "7");
        create_default_attributes(&mut data, client.as_ref(), true);
        data.attribute_mut("resolution").expect("resolution").set_value("fixed");
        data.attribute_mut("owner").expect("owner").set_value("bob");
        data.attribute_mut("changetime").expect("changetime").set_value("2000");
        data.operation = Some(TaskOperation::new("resolve", "Resolve as"));

        let repo = repository(AccessMode::XmlRpc);
        let ticket = get_jira_ticket(&repo, &data).expect("ticket");
        assert_eq!(ticket.id(), 7);
        assert_eq!(ticket.get_value(Key::Status), Some("closed"));
        assert_eq!(ticket.get_value(Key::Resolution), Some("fixed"));
        assert_eq!(ticket.get_value(Key::Owner), Some("bob"));
        assert_eq!(ticket.get_custom_value("action"), Some("resolve"));
        assert_eq!(ticket.last_changed().map(|d| d.timestamp()), Some(2000));

        data.operation = Some(TaskOperation::new("reopen", "Reopen"));
        let ticket = get_jira_ticket(&repo, &data).expect("ticket");
        assert_eq!(ticket.get_value(Key::Status), Some("reopened"));
        assert_eq!(ticket.get_value(Key::Resolution), Some(""));
    }

    #[test]
    fn read_only_fields_are_not_sent_except_the_token() {
        let client = client(AccessMode::XmlRpc);
        let mut data = TaskData::new(crate::test_support::URL, "7");
        create_default_attributes(&mut data, client.as_ref(), true);
        data.attribute_mut("reporter").expect("reporter").set_value("carol");
        data.attribute_mut("_ts").expect("token").set_value("12345");

        let ticket = get_jira_ticket(&repository(AccessMode::XmlRpc), &data).expect("ticket");
        assert_eq!(ticket.get_value(Key::Reporter), None);
        assert_eq!(ticket.get_value(Key::Token), Some("12345"));
    }

    #[test]
    fn malformed_task_id_is_rejected() {
        let data = TaskData::new(crate::test_support::URL, "abc");
        let err = get_jira_ticket(&repository(AccessMode::XmlRpc), &data).unwrap_err();
        assert!(matches!(err, ConnectorError::InvalidTaskId(id) if id == "abc"));
    }

    #[tokio::test]
    async fn posting_creates_or_updates() {
        let client = client(AccessMode::XmlRpc);
        let handler = TaskDataHandler::new(manager_for(Arc::clone(&client)), true);
        let repo = repository(AccessMode::XmlRpc);
        let token = CancelToken::new();

        let mut data = TaskData::new(repo.url(), "");
        handler
            .initialize_task_data(&repo, &mut data, &token)
            .await
            .expect("initialize");
        assert!(data.attribute("status").is_none());
        data.attribute_mut("summary").expect("summary").set_value("New");
        data.attribute_mut("description").expect("description").set_value("Details");
        let created = handler.post_task_data(&repo, &data, &token).await.expect("create");
        assert_eq!(created.kind, ResponseKind::TaskCreated);
        assert_eq!(created.task_id, "100");

        let mut data = handler.create_task_data_from_ticket(client.as_ref(), &repo, &sample_ticket());
        data.attribute_mut(keys::COMMENT_NEW).expect("comment").set_value("done");
        let updated = handler.post_task_data(&repo, &data, &token).await.expect("update");
        assert_eq!(updated.kind, ResponseKind::TaskUpdated);
        assert_eq!(updated.task_id, "7");

        let state = client.state();
        assert_eq!(state.created[0].get_value(Key::Summary), Some("New"));
        assert_eq!(state.updated[0].1, "done");
    }

    #[tokio::test]
    async fn blank_summary_or_description_is_rejected_locally() {
        let client = client(AccessMode::XmlRpc);
        let handler = TaskDataHandler::new(manager_for(Arc::clone(&client)), true);
        let repo = repository(AccessMode::XmlRpc);
        let token = CancelToken::new();

        let mut data = TaskData::new(repo.url(), "");
        handler
            .initialize_task_data(&repo, &mut data, &token)
            .await
            .expect("initialize");
        data.attribute_mut("summary").expect("summary").set_value("New");
        let err = handler.post_task_data(&repo, &data, &token).await.unwrap_err();
        assert_eq!(err.status().map(|s| s.kind), Some(StatusKind::Repository));

        data.attribute_mut("summary").expect("summary").set_value(" ");
        data.attribute_mut("description").expect("description").set_value("Details");
        assert!(handler.post_task_data(&repo, &data, &token).await.is_err());
        assert!(client.state().created.is_empty());
        assert!(!client.calls().contains(&"create_ticket".to_string()));
    }

    #[tokio::test]
    async fn edit_conflict_is_a_collision() {
        let client = client(AccessMode::XmlRpc);
        fn conflict() -> JiraError {
            JiraError::EditConflict("ticket changed".into())
        }
        client.state().fail_update = Some(conflict as fn() -> JiraError);
        let handler = TaskDataHandler::new(manager_for(Arc::clone(&client)), true);
        let repo = repository(AccessMode::XmlRpc);

        let data = handler.create_task_data_from_ticket(client.as_ref(), &repo, &sample_ticket());
        let err = handler
            .post_task_data(&repo, &data, &CancelToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.status().map(|s| s.kind), Some(StatusKind::RepositoryCollision));
    }

    #[tokio::test]
    async fn subtask_inherits_parent_fields_and_blocks_it() {
        let client = client(AccessMode::XmlRpc);
        let handler = TaskDataHandler::new(manager_for(Arc::clone(&client)), true);
        let repo = repository(AccessMode::XmlRpc);

        let mut parent = handler.create_task_data_from_ticket(client.as_ref(), &repo, &sample_ticket());
        parent.attribute_mut("component").expect("component").set_value("ui");
        parent.attribute_mut("type").expect("type").set_value("story");

        let mut child = TaskData::new(repo.url(), "");
        handler
            .initialize_subtask_data(&repo, &mut child, &parent, &CancelToken::new())
            .await
            .expect("subtask");

        assert_eq!(child.value("component"), "ui");
        assert_eq!(child.value("type"), "task");
        assert_eq!(child.value("priority"), "major");
        assert_eq!(child.value("summary"), "");
        assert_eq!(child.value("blocking"), "7");
        assert!(child.values("blockedby").is_empty());
    }

    #[tokio::test]
    async fn subtasks_need_the_blocking_field() {
        let client = FakeClient::shared(AccessMode::XmlRpc);
        let handler = TaskDataHandler::new(manager_for(Arc::clone(&client)), true);
        let repo = repository(AccessMode::XmlRpc);
        let parent = TaskData::new(repo.url(), "7");

        let err = handler
            .initialize_subtask_data(&repo, &mut TaskData::new(repo.url(), ""), &parent, &CancelToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.status().map(|s| s.message.as_str()),
            Some("The repository does not support subtasks")
        );
    }

    #[test]
    fn leave_label_includes_resolution() {
        let mut ticket = Ticket::with_id(1);
        ticket.put_value("status", "closed");
        ticket.put_value("resolution", "fixed");
        assert_eq!(
            default_action_label(&ticket, "leave").as_deref(),
            Some("Leave as closed fixed")
        );
        assert_eq!(default_action_label(&Ticket::new(), "leave").as_deref(), Some("Leave"));
        assert_eq!(default_action_label(&ticket, "reassign"), None);
        assert_eq!(default_action_label(&ticket, "defer").as_deref(), Some("defer"));
    }
}
