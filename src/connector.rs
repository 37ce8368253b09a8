//! Repository connector: the entry point used by the task framework.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use jira_api::config::TICKET_URL;
use jira_api::util::{parse_date_str, to_epoch_seconds};
use jira_api::{AccessMode, CancelToken, JiraClient, RepositoryInfo};

use crate::attachments::AttachmentHandler;
use crate::attributes::{JiraAttribute, ATTRIBUTE_BLOCKED_BY};
use crate::client_manager::ClientManager;
use crate::config::{ConfigManager, ConnectorConfig};
use crate::error::{ConnectorError, Result};
use crate::history::TaskHistory;
use crate::repository::TaskRepository;
use crate::session::{RepositoryQuery, SyncSession, TaskDataCollector};
use crate::task::{LocalTask, TASK_KEY_SUPPORTS_SUBTASKS, TASK_KEY_UPDATE_DATE};
use crate::task_data::TaskData;
use crate::task_data_handler::{create_attribute, parse_ticket_id, supports_subtasks, TaskDataHandler};
use crate::task_mapper::{is_completed, TaskMapper};
use crate::wiki::WikiHandler;

/// Prefix shown in front of ticket ids.
pub const TASK_ID_PREFIX: &str = "#";

/// Relation of a task to another one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskRelation {
    Subtask(String),
}

pub struct JiraConnector {
    config: ConnectorConfig,
    client_manager: Arc<ClientManager>,
    task_data_handler: TaskDataHandler,
    attachment_handler: AttachmentHandler,
    wiki_handler: WikiHandler,
}

impl JiraConnector {
    pub fn new(config: ConnectorConfig, client_manager: Arc<ClientManager>) -> Self {
        Self {
            task_data_handler: TaskDataHandler::new(Arc::clone(&client_manager), config.rich_editor),
            attachment_handler: AttachmentHandler::new(Arc::clone(&client_manager)),
            wiki_handler: WikiHandler::new(Arc::clone(&client_manager)),
            config,
            client_manager,
        }
    }

    /// Loads the stored configuration and restores the attribute cache.
    pub fn from_config(config_manager: &ConfigManager) -> Self {
        let config = config_manager.load();
        let cache_file = config_manager.attribute_cache_file(&config);
        log::debug!("Using attribute cache {}", cache_file.display());
        let client_manager = Arc::new(ClientManager::new(Some(cache_file)));
        Self::new(config, client_manager)
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    pub fn client_manager(&self) -> &Arc<ClientManager> {
        &self.client_manager
    }

    pub fn task_data_handler(&self) -> &TaskDataHandler {
        &self.task_data_handler
    }

    pub fn attachment_handler(&self) -> &AttachmentHandler {
        &self.attachment_handler
    }

    pub fn wiki_handler(&self) -> &WikiHandler {
        &self.wiki_handler
    }

    pub fn has_rich_editor(&self, repository: &TaskRepository) -> bool {
        self.task_data_handler.has_rich_editor(repository)
    }

    /// Whether the repository can list tickets changed since a date.
    pub fn has_changed_since(repository: &TaskRepository) -> bool {
        repository.effective_access_mode() == AccessMode::XmlRpc
    }

    pub fn has_attachment_support(repository: &TaskRepository) -> bool {
        AttachmentHandler::has_attachment_support(repository)
    }

    pub fn has_wiki(&self, repository: &TaskRepository) -> bool {
        self.client_manager.get_client(repository).wiki().is_some()
    }

    pub fn can_create_new_task(&self, _repository: &TaskRepository) -> bool {
        true
    }

    pub fn can_create_task_from_key(&self, _repository: &TaskRepository) -> bool {
        true
    }

    pub fn can_delete_task(&self, repository: &TaskRepository) -> bool {
        self.has_rich_editor(repository)
    }

    pub fn task_url(repository_url: &str, task_id: &str) -> String {
        format!("{repository_url}{TICKET_URL}{task_id}")
    }

    pub fn repository_url_from_task_url(url: &str) -> Option<String> {
        let index = url.rfind(TICKET_URL)?;
        Some(url[..index].to_string())
    }

    pub fn task_id_from_task_url(url: &str) -> Option<String> {
        let index = url.rfind(TICKET_URL)?;
        let id = &url[index + TICKET_URL.len()..];
        (!id.is_empty()).then(|| id.to_string())
    }

    pub async fn validate(&self, repository: &TaskRepository, token: &CancelToken) -> Result<RepositoryInfo> {
        let client = self.client_manager.get_client(repository);
        let info = client
            .validate(token)
            .await
            .map_err(|err| ConnectorError::from_jira(err, repository.url()))?;
        log::info!("Validated {} ({})", repository.url(), client.access_mode());
        Ok(info)
    }

    pub async fn get_task_data(
        &self,
        repository: &TaskRepository,
        task_id: &str,
        token: &CancelToken,
    ) -> Result<TaskData> {
        self.task_data_handler.get_task_data(repository, task_id, token).await
    }

    /// Refetches the repository attributes; `force` ignores the cache.
    pub async fn update_repository_configuration(
        &self,
        repository: &TaskRepository,
        force: bool,
        token: &CancelToken,
    ) -> Result<()> {
        self.client_manager
            .get_client(repository)
            .update_attributes(force, token)
            .await
            .map_err(|err| ConnectorError::from_jira(err, repository.url()))
    }

    /// Runs `query` and hands each result to `collector`. A failure is also
    /// recorded as the session status.
    pub async fn perform_query(
        &self,
        repository: &TaskRepository,
        query: &RepositoryQuery,
        collector: &mut dyn TaskDataCollector,
        mut session: Option<&mut SyncSession>,
        token: &CancelToken,
    ) -> Result<()> {
        let result = self
            .run_query(repository, query, collector, session.as_deref_mut(), token)
            .await;
        if let (Err(err), Some(session)) = (&result, session) {
            if session.status.is_none() {
                session.status = err.status().cloned();
            }
        }
        result
    }

    async fn run_query(
        &self,
        repository: &TaskRepository,
        query: &RepositoryQuery,
        collector: &mut dyn TaskDataCollector,
        mut session: Option<&mut SyncSession>,
        token: &CancelToken,
    ) -> Result<()> {
        let url = repository.url();
        let Some(mut search) = query.search() else {
            return Err(ConnectorError::repository(
                url,
                format!("The query is invalid: \"{}\"", query.url),
            ));
        };
        search.set_max(Some(self.config.max_hits));

        let client = self.client_manager.get_client(repository);
        client
            .update_attributes(false, token)
            .await
            .map_err(|err| ConnectorError::from_jira(err, url))?;

        let ids_only = session.as_deref().is_some_and(|session| {
            session.is_full_synchronization() && !session.tasks.is_empty()
        }) && self.has_rich_editor(repository);

        if ids_only {
            // changed tasks were already marked stale during pre-sync
            let ids = client
                .search_ids(&search, token)
                .await
                .map_err(|err| ConnectorError::from_jira(err, url))?;
            log::debug!("Query {} matched {} tickets", query.title, ids.len());
            for id in ids {
                let mut data = TaskData::new(url, id.to_string());
                data.partial = true;
                create_attribute(&mut data, None, JiraAttribute::Id).set_value(id.to_string());
                collector.accept(data);
            }
            return Ok(());
        }

        let tickets = client
            .search(&search, token)
            .await
            .map_err(|err| ConnectorError::from_jira(err, url))?;
        log::debug!("Query {} returned {} tickets", query.title, tickets.len());
        for ticket in tickets {
            let mut data =
                self.task_data_handler
                    .create_task_data_from_ticket(client.as_ref(), repository, &ticket);
            data.partial = true;
            if let Some(session) = session.as_deref_mut() {
                if !session.is_full_synchronization() && self.has_rich_editor(repository) {
                    let stale = session
                        .tasks
                        .iter()
                        .find(|task| task.task_id == data.task_id)
                        .is_some_and(|task| self.has_task_changed_with(client.as_ref(), task, &data));
                    if stale {
                        session.mark_stale(&data.task_id);
                    }
                }
            }
            collector.accept(data);
        }
        Ok(())
    }

    /// Marks the session's tasks that changed on the server since the last
    /// full synchronization as stale.
    pub async fn pre_synchronization(&self, session: &mut SyncSession, token: &CancelToken) -> Result<()> {
        if !session.is_full_synchronization() || session.tasks.is_empty() {
            return Ok(());
        }
        if !Self::has_changed_since(&session.repository) {
            return Ok(());
        }

        let Some(stamp) = session.repository.synchronization_timestamp().map(str::to_string) else {
            let ids: Vec<String> = session.tasks.iter().map(|task| task.task_id.clone()).collect();
            for id in ids {
                session.mark_stale(&id);
            }
            return Ok(());
        };
        let since = parse_date_str(&stamp).unwrap_or_default();

        let url = session.repository.url().to_string();
        let client = self.client_manager.get_client(&session.repository);
        let ids = client
            .get_changed_tickets(since, token)
            .await
            .map_err(|err| ConnectorError::from_jira(err, &url))?;
        log::debug!("{} tickets changed in {url} since {since}", ids.len());

        if ids.is_empty() {
            session.set_needs_perform_queries(false);
            return Ok(());
        }
        if let (1, Some(&id)) = (ids.len(), ids.iter().next()) {
            // the timestamp is the latest change, so that ticket is always reported
            let last_changed = client
                .get_ticket_last_changed(id, token)
                .await
                .map_err(|err| ConnectorError::from_jira(err, &url))?;
            if last_changed == Some(since) {
                session.set_needs_perform_queries(false);
                return Ok(());
            }
        }

        mark_changed_tasks(session, &ids);
        Ok(())
    }

    /// Stores the newest modification date of the changed tasks as the next
    /// baseline after a successful full synchronization.
    pub fn post_synchronization(&self, session: &mut SyncSession) {
        if !session.is_full_synchronization() || session.status.is_some() {
            return;
        }
        let mut most_recent = DateTime::<Utc>::default();
        let mut stamp = session
            .repository
            .synchronization_timestamp()
            .and_then(parse_date_str);
        for task in &session.changed_tasks {
            if let Some(modified) = task.modification_date {
                if modified > most_recent {
                    most_recent = modified;
                    stamp = Some(modified);
                }
            }
        }
        if let Some(stamp) = stamp {
            session
                .repository
                .set_synchronization_timestamp(Some(to_epoch_seconds(&stamp).to_string()));
        }
    }

    pub fn task_mapper<'a>(&self, repository: &TaskRepository, data: &'a TaskData) -> TaskMapper<'a> {
        TaskMapper::new(data, self.client_manager.get_client(repository).priorities())
    }

    /// Copies the task data onto the local task.
    pub fn update_task_from_task_data(&self, repository: &TaskRepository, task: &mut LocalTask, data: &TaskData) {
        let mapper = self.task_mapper(repository, data);
        mapper.apply_to(task);
        if let Some(status) = mapper.status() {
            task.completion_date = if is_completed(status) {
                Some(mapper.modification_date().unwrap_or_default())
            } else {
                None
            };
        }
        task.url = Some(Self::task_url(repository.url(), &data.task_id));
        if !data.partial {
            task.set_attribute(
                TASK_KEY_SUPPORTS_SUBTASKS,
                Some(supports_subtasks(data).to_string()),
            );
            let update_date = task
                .modification_date
                .map(|date| to_epoch_seconds(&date).to_string());
            task.set_attribute(TASK_KEY_UPDATE_DATE, update_date);
        }
    }

    pub fn has_task_changed(&self, repository: &TaskRepository, task: &LocalTask, data: &TaskData) -> bool {
        let client = self.client_manager.get_client(repository);
        self.has_task_changed_with(client.as_ref(), task, data)
    }

    fn has_task_changed_with(&self, client: &dyn JiraClient, task: &LocalTask, data: &TaskData) -> bool {
        let mapper = TaskMapper::new(data, client.priorities());
        if data.partial {
            return mapper.has_changes(task);
        }
        let local = task.attribute(TASK_KEY_UPDATE_DATE).and_then(parse_date_str);
        match mapper.modification_date() {
            Some(remote) => Some(remote) != local,
            None => true,
        }
    }

    /// Tickets blocking this one, as subtasks.
    pub fn get_task_relations(&self, data: &TaskData) -> Option<Vec<TaskRelation>> {
        let attribute = data.attribute(ATTRIBUTE_BLOCKED_BY)?;
        Some(
            attribute
                .value()
                .split([',', ' '])
                .filter(|id| !id.is_empty())
                .map(|id| TaskRelation::Subtask(id.to_string()))
                .collect(),
        )
    }

    pub async fn get_task_history(
        &self,
        repository: &TaskRepository,
        task_id: &str,
        token: &CancelToken,
    ) -> Result<TaskHistory> {
        let id = parse_ticket_id(task_id)?;
        let comments = self
            .client_manager
            .get_client(repository)
            .get_comments(id, token)
            .await
            .map_err(|err| ConnectorError::from_jira(err, repository.url()))?;
        Ok(TaskHistory::from_comments(repository.url(), task_id, &comments))
    }

    pub async fn delete_task(&self, repository: &TaskRepository, task_id: &str, token: &CancelToken) -> Result<()> {
        let id = parse_ticket_id(task_id)?;
        self.client_manager
            .get_client(repository)
            .delete_ticket(id, token)
            .await
            .map_err(|err| ConnectorError::from_jira(err, repository.url()))?;
        log::info!("Deleted ticket #{id} from {}", repository.url());
        Ok(())
    }

    /// Persists the attribute cache.
    pub fn stop(&self) -> Result<()> {
        self.client_manager.write_cache()?;
        Ok(())
    }
}

fn mark_changed_tasks(session: &mut SyncSession, ids: &BTreeSet<i32>) {
    let changed: Vec<String> = session
        .tasks
        .iter()
        .filter(|task| match parse_ticket_id(&task.task_id) {
            Ok(id) => ids.contains(&id),
            Err(_) => {
                log::warn!("Ignoring task with invalid ticket id {}", task.task_id);
                false
            }
        })
        .map(|task| task.task_id.clone())
        .collect();
    for id in changed {
        session.mark_stale(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusKind;
    use crate::test_support::{manager_for, repository, sample_attributes, FakeClient, URL};
    use chrono::TimeZone;
    use jira_api::{Comment, Ticket};

    fn connector(client: &Arc<FakeClient>) -> JiraConnector {
        JiraConnector::new(ConnectorConfig::default(), manager_for(Arc::clone(client)))
    }

    fn xmlrpc_client() -> Arc<FakeClient> {
        let client = FakeClient::shared(AccessMode::XmlRpc);
        client.set_data(sample_attributes());
        client
    }

    fn local_tasks(ids: &[&str]) -> Vec<LocalTask> {
        ids.iter().map(|id| LocalTask::new(URL, *id)).collect()
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).single().expect("valid timestamp")
    }

    fn ticket(id: i32, summary: &str, changed: i64) -> Ticket {
        let mut ticket = Ticket::with_id(id);
        ticket.put_value("summary", summary);
        ticket.put_value("status", "new");
        ticket.set_last_changed(Some(at(changed)));
        ticket
    }

    fn full_session(stamp: Option<&str>, tasks: &[&str]) -> SyncSession {
        let mut repo = repository(AccessMode::XmlRpc);
        repo.set_synchronization_timestamp(stamp.map(str::to_string));
        SyncSession::new(repo, local_tasks(tasks), true)
    }

    #[tokio::test]
    async fn first_sync_marks_every_task_stale() {
        let client = xmlrpc_client();
        let mut session = full_session(None, &["1", "2"]);
        connector(&client)
            .pre_synchronization(&mut session, &CancelToken::new())
            .await
            .expect("pre-sync");
        assert!(session.is_stale("1") && session.is_stale("2"));
        assert!(session.needs_perform_queries());
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn unchanged_repository_skips_queries() {
        let client = xmlrpc_client();
        let mut session = full_session(Some("1000"), &["1"]);
        connector(&client)
            .pre_synchronization(&mut session, &CancelToken::new())
            .await
            .expect("pre-sync");
        assert!(!session.needs_perform_queries());
        assert!(session.stale_tasks().is_empty());
    }

    #[tokio::test]
    async fn single_change_at_the_baseline_is_ignored() {
        let client = xmlrpc_client();
        {
            let mut state = client.state();
            state.changed.insert(1);
            state.last_changed.insert(1, at(1000));
        }
        let mut session = full_session(Some("1000"), &["1", "2"]);
        connector(&client)
            .pre_synchronization(&mut session, &CancelToken::new())
            .await
            .expect("pre-sync");
        assert!(!session.needs_perform_queries());
        assert!(session.stale_tasks().is_empty());
        assert_eq!(client.calls(), vec!["get_changed_tickets", "get_ticket_last_changed"]);
    }

    #[tokio::test]
    async fn single_real_change_marks_that_task() {
        let client = xmlrpc_client();
        {
            let mut state = client.state();
            state.changed.insert(1);
            state.last_changed.insert(1, at(1500));
        }
        let mut session = full_session(Some("1000"), &["1", "2"]);
        connector(&client)
            .pre_synchronization(&mut session, &CancelToken::new())
            .await
            .expect("pre-sync");
        assert!(session.needs_perform_queries());
        assert!(session.is_stale("1"));
        assert!(!session.is_stale("2"));
    }

    #[tokio::test]
    async fn changed_set_marks_matching_tasks() {
        let client = xmlrpc_client();
        client.state().changed.extend([2, 3, 9]);
        let mut session = full_session(Some("garbage"), &["1", "2", "3", "x"]);
        connector(&client)
            .pre_synchronization(&mut session, &CancelToken::new())
            .await
            .expect("pre-sync");
        let stale: Vec<&str> = session.stale_tasks().iter().map(String::as_str).collect();
        assert_eq!(stale, vec!["2", "3"]);
    }

    #[tokio::test]
    async fn partial_and_web_syncs_skip_pre_sync() {
        let client = xmlrpc_client();
        let mut repo = repository(AccessMode::XmlRpc);
        repo.set_synchronization_timestamp(Some("1000".into()));
        let mut session = SyncSession::new(repo, local_tasks(&["1"]), false);
        let connector = connector(&client);
        connector
            .pre_synchronization(&mut session, &CancelToken::new())
            .await
            .expect("pre-sync");

        let mut session = SyncSession::new(repository(AccessMode::Web), local_tasks(&["1"]), true);
        connector
            .pre_synchronization(&mut session, &CancelToken::new())
            .await
            .expect("pre-sync");
        assert!(session.stale_tasks().is_empty());
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn full_sync_with_rich_editor_fetches_ids_only() {
        let client = xmlrpc_client();
        client.state().tickets.insert(4, ticket(4, "four", 10));
        let connector = connector(&client);
        let mut session = full_session(Some("1000"), &["4"]);
        let repo = session.repository.clone();
        let mut results: Vec<TaskData> = Vec::new();

        connector
            .perform_query(
                &repo,
                &RepositoryQuery::new("all", format!("{URL}/query?format=tab&status=!closed")),
                &mut results,
                Some(&mut session),
                &CancelToken::new(),
            )
            .await
            .expect("query");

        assert_eq!(results.len(), 1);
        assert!(results[0].partial);
        assert_eq!(results[0].value("id"), "4");
        assert!(results[0].attribute("summary").is_none());
        assert!(client.calls().contains(&"search_ids".to_string()));
    }

    #[tokio::test]
    async fn incremental_query_marks_changed_tasks_stale() {
        let client = xmlrpc_client();
        {
            let mut state = client.state();
            state.tickets.insert(1, ticket(1, "renamed", 10));
            state.tickets.insert(2, ticket(2, "same", 10));
        }
        let connector = connector(&client);
        let repo = repository(AccessMode::XmlRpc);
        let mut tasks = local_tasks(&["1", "2"]);
        for task in &mut tasks {
            task.summary = Some("same".into());
            task.modification_date = Some(at(10));
            task.creation_date = None;
            task.priority = None;
        }
        let mut session = SyncSession::new(repo.clone(), tasks, false);
        let mut results: Vec<TaskData> = Vec::new();

        connector
            .perform_query(
                &repo,
                &RepositoryQuery::new("all", format!("{URL}/query?format=tab")),
                &mut results,
                Some(&mut session),
                &CancelToken::new(),
            )
            .await
            .expect("query");

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|data| data.partial));
        assert!(session.is_stale("1"));
        assert_eq!(results[0].value("summary"), "renamed");
    }

    #[tokio::test]
    async fn invalid_query_is_reported_on_the_session() {
        let client = xmlrpc_client();
        let repo = repository(AccessMode::XmlRpc);
        let mut session = SyncSession::new(repo.clone(), Vec::new(), true);
        let mut results: Vec<TaskData> = Vec::new();
        let err = connector(&client)
            .perform_query(
                &repo,
                &RepositoryQuery::new("bad", "http://localhost/jira/report/3"),
                &mut results,
                Some(&mut session),
                &CancelToken::new(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("The query is invalid: \"http://localhost/jira/report/3\""));
        assert_eq!(session.status.map(|s| s.kind), Some(StatusKind::Repository));
    }

    #[test]
    fn post_sync_keeps_newest_modification_date() {
        let client = xmlrpc_client();
        let connector = connector(&client);
        let mut session = full_session(Some("1000"), &[]);
        let mut older = LocalTask::new(URL, "1");
        older.modification_date = Some(at(1200));
        let mut newer = LocalTask::new(URL, "2");
        newer.modification_date = Some(at(1300));
        session.changed_tasks = vec![newer, older, LocalTask::new(URL, "3")];

        connector.post_synchronization(&mut session);
        assert_eq!(session.repository.synchronization_timestamp(), Some("1300"));

        let mut failed = full_session(Some("1000"), &[]);
        failed.changed_tasks = session.changed_tasks.clone();
        failed.status = Some(crate::error::RepositoryStatus::new(URL, StatusKind::Io, "down"));
        connector.post_synchronization(&mut failed);
        assert_eq!(failed.repository.synchronization_timestamp(), Some("1000"));
    }

    #[test]
    fn local_task_follows_full_task_data() {
        let client = xmlrpc_client();
        let connector = connector(&client);
        let repo = repository(AccessMode::XmlRpc);
        let mut closed = ticket(7, "done", 2000);
        closed.put_value("status", "closed");
        closed.put_value("priority", "blocker");
        let data = connector
            .task_data_handler()
            .create_task_data_from_ticket(client.as_ref(), &repo, &closed);

        let mut task = LocalTask::new(URL, "7");
        connector.update_task_from_task_data(&repo, &mut task, &data);

        assert_eq!(task.summary.as_deref(), Some("done"));
        assert_eq!(task.priority.as_deref(), Some("P1"));
        assert_eq!(task.completion_date, Some(at(2000)));
        assert_eq!(task.url.as_deref(), Some("http://localhost/jira/ticket/7"));
        assert_eq!(task.attribute(TASK_KEY_SUPPORTS_SUBTASKS), Some("true"));
        assert_eq!(task.attribute(TASK_KEY_UPDATE_DATE), Some("2000"));
        assert!(!connector.has_task_changed(&repo, &task, &data));

        let newer = connector.task_data_handler().create_task_data_from_ticket(
            client.as_ref(),
            &repo,
            &ticket(7, "done", 2500),
        );
        assert!(connector.has_task_changed(&repo, &task, &newer));
    }

    #[test]
    fn task_urls_split_at_the_ticket_path() {
        let url = JiraConnector::task_url(URL, "12");
        assert_eq!(url, "http://localhost/jira/ticket/12");
        assert_eq!(JiraConnector::repository_url_from_task_url(&url).as_deref(), Some(URL));
        assert_eq!(JiraConnector::task_id_from_task_url(&url).as_deref(), Some("12"));
        assert_eq!(JiraConnector::task_id_from_task_url("http://localhost/jira/wiki/x"), None);
    }

    #[test]
    fn relations_come_from_blocked_by() {
        let client = xmlrpc_client();
        let connector = connector(&client);
        let mut data = TaskData::new(URL, "7");
        assert_eq!(connector.get_task_relations(&data), None);
        data.create_attribute(ATTRIBUTE_BLOCKED_BY).set_value("3, 4");
        assert_eq!(
            connector.get_task_relations(&data),
            Some(vec![TaskRelation::Subtask("3".into()), TaskRelation::Subtask("4".into())])
        );
    }

    #[tokio::test]
    async fn history_groups_change_log() {
        let client = xmlrpc_client();
        client.state().comments.insert(
            7,
            vec![Comment {
                created: Some(at(5)),
                author: "alice".into(),
                field: "status".into(),
                old_value: "new".into(),
                new_value: "closed".into(),
            }],
        );
        let history = connector(&client)
            .get_task_history(&repository(AccessMode::XmlRpc), "7", &CancelToken::new())
            .await
            .expect("history");
        assert_eq!(history.revisions.len(), 1);
        assert_eq!(history.revisions[0].changes[0].field, "Status");
    }

    #[tokio::test]
    async fn delete_needs_xml_rpc() {
        let client = FakeClient::shared(AccessMode::Web);
        let web = connector(&client);
        let repo = repository(AccessMode::Web);
        assert!(!web.can_delete_task(&repo));
        assert!(!web.has_wiki(&repo));

        let err = web
            .delete_task(&repo, "7", &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::Unsupported(_)));

        let client = xmlrpc_client();
        connector(&client)
            .delete_task(&repository(AccessMode::XmlRpc), "7", &CancelToken::new())
            .await
            .expect("delete");
        assert_eq!(client.state().deleted, vec![7]);
    }
}
