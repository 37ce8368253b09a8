//! In-memory repository client used by the connector tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jira_api::client::ClientCore;
use jira_api::{
    AccessMode, CancelToken, ClientData, Comment, Component, FieldType, JiraClient, JiraError,
    Milestone, RepositoryInfo, RepositoryLocation, Result, Search, Ticket, TicketAttribute,
    TicketField, Version, WikiClient, WikiPage, WikiPageInfo,
};

use crate::attributes::{ATTRIBUTE_BLOCKED_BY, ATTRIBUTE_BLOCKING};
use crate::client_manager::ClientManager;
use crate::repository::TaskRepository;

pub const URL: &str = "http://localhost/jira";

#[derive(Default)]
pub struct FakeState {
    pub tickets: BTreeMap<i32, Ticket>,
    pub changed: BTreeSet<i32>,
    pub last_changed: HashMap<i32, DateTime<Utc>>,
    pub attributes: ClientData,
    pub attachments: HashMap<(i32, String), Vec<u8>>,
    pub comments: HashMap<i32, Vec<Comment>>,
    pub pages: BTreeMap<String, WikiPage>,
    pub accept_pages: bool,
    pub calls: Vec<String>,
    pub created: Vec<Ticket>,
    pub updated: Vec<(Ticket, String)>,
    pub deleted: Vec<i32>,
    pub next_id: i32,
    pub fail_update: Option<fn() -> JiraError>,
}

pub struct FakeClient {
    core: ClientCore,
    wiki: bool,
    state: Mutex<FakeState>,
}

impl FakeClient {
    pub fn new(mode: AccessMode) -> Self {
        Self {
            core: ClientCore::new(RepositoryLocation::anonymous(URL), mode),
            wiki: mode == AccessMode::XmlRpc,
            state: Mutex::new(FakeState {
                next_id: 100,
                accept_pages: true,
                ..FakeState::default()
            }),
        }
    }

    pub fn shared(mode: AccessMode) -> Arc<Self> {
        Arc::new(Self::new(mode))
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake state poisoned")
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    fn record(&self, call: &str) {
        self.state().calls.push(call.to_string());
    }
}

/// An anonymous repository at [`URL`] whose user is `me`.
pub fn repository(mode: AccessMode) -> TaskRepository {
    TaskRepository::anonymous(URL)
        .with_access_mode(mode)
        .with_user_name("me")
}

#[async_trait]
impl JiraClient for FakeClient {
    fn access_mode(&self) -> AccessMode {
        self.core.access_mode()
    }

    fn url(&self) -> &str {
        self.core.url()
    }

    fn data(&self) -> Arc<ClientData> {
        self.core.data()
    }

    fn set_data(&self, data: ClientData) {
        self.core.set_data(data);
    }

    async fn validate(&self, token: &CancelToken) -> Result<RepositoryInfo> {
        token.check()?;
        self.record("validate");
        Ok(RepositoryInfo::new(1, 0, 0))
    }

    async fn get_ticket(&self, id: i32, token: &CancelToken) -> Result<Ticket> {
        token.check()?;
        self.record("get_ticket");
        self.state()
            .tickets
            .get(&id)
            .cloned()
            .ok_or_else(|| JiraError::remote(404, format!("ticket {id} does not exist")))
    }

    async fn search(&self, _query: &Search, token: &CancelToken) -> Result<Vec<Ticket>> {
        token.check()?;
        self.record("search");
        Ok(self.state().tickets.values().cloned().collect())
    }

    async fn search_ids(&self, _query: &Search, token: &CancelToken) -> Result<Vec<i32>> {
        token.check()?;
        self.record("search_ids");
        Ok(self.state().tickets.keys().copied().collect())
    }

    async fn create_ticket(&self, ticket: &Ticket, token: &CancelToken) -> Result<i32> {
        token.check()?;
        let mut state = self.state();
        state.calls.push("create_ticket".into());
        let id = state.next_id;
        state.next_id += 1;
        state.created.push(ticket.clone());
        Ok(id)
    }

    async fn update_ticket(&self, ticket: &Ticket, comment: &str, token: &CancelToken) -> Result<()> {
        token.check()?;
        let mut state = self.state();
        state.calls.push("update_ticket".into());
        if let Some(fail) = state.fail_update {
            return Err(fail());
        }
        state.updated.push((ticket.clone(), comment.to_string()));
        Ok(())
    }

    async fn delete_ticket(&self, id: i32, token: &CancelToken) -> Result<()> {
        token.check()?;
        if self.access_mode() == AccessMode::Web {
            return Err(JiraError::unsupported("delete_ticket"));
        }
        let mut state = self.state();
        state.calls.push("delete_ticket".into());
        state.deleted.push(id);
        Ok(())
    }

    async fn get_comments(&self, id: i32, token: &CancelToken) -> Result<Vec<Comment>> {
        token.check()?;
        self.record("get_comments");
        Ok(self.state().comments.get(&id).cloned().unwrap_or_default())
    }

    async fn get_changed_tickets(
        &self,
        _since: DateTime<Utc>,
        token: &CancelToken,
    ) -> Result<BTreeSet<i32>> {
        token.check()?;
        self.record("get_changed_tickets");
        Ok(self.state().changed.clone())
    }

    async fn get_ticket_last_changed(
        &self,
        id: i32,
        token: &CancelToken,
    ) -> Result<Option<DateTime<Utc>>> {
        token.check()?;
        self.record("get_ticket_last_changed");
        Ok(self.state().last_changed.get(&id).copied())
    }

    async fn get_attachment_data(
        &self,
        id: i32,
        filename: &str,
        token: &CancelToken,
    ) -> Result<Vec<u8>> {
        token.check()?;
        self.record("get_attachment_data");
        self.state()
            .attachments
            .get(&(id, filename.to_string()))
            .cloned()
            .ok_or_else(|| JiraError::remote(404, format!("no attachment {filename}")))
    }

    async fn put_attachment_data(
        &self,
        id: i32,
        filename: &str,
        _description: &str,
        data: Vec<u8>,
        _replace: bool,
        token: &CancelToken,
    ) -> Result<()> {
        token.check()?;
        if self.access_mode() == AccessMode::Web {
            return Err(JiraError::unsupported("put_attachment_data"));
        }
        let mut state = self.state();
        state.calls.push("put_attachment_data".into());
        state.attachments.insert((id, filename.to_string()), data);
        Ok(())
    }

    async fn delete_attachment(&self, id: i32, filename: &str, token: &CancelToken) -> Result<()> {
        token.check()?;
        self.state().attachments.remove(&(id, filename.to_string()));
        Ok(())
    }

    async fn fetch_attributes(&self, token: &CancelToken) -> Result<ClientData> {
        token.check()?;
        let mut state = self.state();
        state.calls.push("fetch_attributes".into());
        Ok(state.attributes.clone())
    }

    fn wiki(&self) -> Option<&dyn WikiClient> {
        self.wiki.then_some(self as &dyn WikiClient)
    }
}

#[async_trait]
impl WikiClient for FakeClient {
    async fn validate_wiki_api(&self, token: &CancelToken) -> Result<()> {
        token.check()
    }

    async fn wiki_to_html(&self, source: &str, token: &CancelToken) -> Result<String> {
        token.check()?;
        Ok(format!("<p>{source}</p>"))
    }

    async fn get_all_wiki_page_names(&self, token: &CancelToken) -> Result<Vec<String>> {
        token.check()?;
        Ok(self.state().pages.keys().cloned().collect())
    }

    async fn get_wiki_page_info(
        &self,
        name: &str,
        _version: Option<i32>,
        token: &CancelToken,
    ) -> Result<WikiPageInfo> {
        self.get_wiki_page(name, None, token)
            .await
            .map(|page| page.page_info)
    }

    async fn get_wiki_page_info_all_versions(
        &self,
        name: &str,
        token: &CancelToken,
    ) -> Result<Vec<WikiPageInfo>> {
        self.get_wiki_page(name, None, token)
            .await
            .map(|page| page.page_history)
    }

    async fn get_wiki_page_content(
        &self,
        name: &str,
        version: Option<i32>,
        token: &CancelToken,
    ) -> Result<String> {
        self.get_wiki_page(name, version, token)
            .await
            .map(|page| page.content)
    }

    async fn get_wiki_page_html(
        &self,
        name: &str,
        version: Option<i32>,
        token: &CancelToken,
    ) -> Result<String> {
        self.get_wiki_page(name, version, token)
            .await
            .map(|page| page.page_html)
    }

    async fn get_recent_wiki_changes(
        &self,
        _since: DateTime<Utc>,
        token: &CancelToken,
    ) -> Result<Vec<WikiPageInfo>> {
        token.check()?;
        Ok(Vec::new())
    }

    async fn get_wiki_page(
        &self,
        name: &str,
        _version: Option<i32>,
        token: &CancelToken,
    ) -> Result<WikiPage> {
        token.check()?;
        self.state()
            .pages
            .get(name)
            .cloned()
            .ok_or_else(|| JiraError::InvalidWikiPage(name.to_string()))
    }

    async fn put_wiki_page(&self, page: &WikiPage, token: &CancelToken) -> Result<bool> {
        token.check()?;
        let mut state = self.state();
        if !state.accept_pages {
            return Ok(false);
        }
        state
            .pages
            .insert(page.page_info.page_name.clone(), page.clone());
        Ok(true)
    }

    async fn delete_wiki_page(&self, name: &str, token: &CancelToken) -> Result<bool> {
        token.check()?;
        Ok(self.state().pages.remove(name).is_some())
    }

    async fn list_wiki_page_attachments(&self, _name: &str, token: &CancelToken) -> Result<Vec<String>> {
        token.check()?;
        Ok(Vec::new())
    }

    async fn get_wiki_page_attachment_data(
        &self,
        _name: &str,
        filename: &str,
        token: &CancelToken,
    ) -> Result<Vec<u8>> {
        token.check()?;
        Err(JiraError::remote(404, format!("no attachment {filename}")))
    }

    async fn put_wiki_page_attachment_data(
        &self,
        _name: &str,
        filename: &str,
        _description: &str,
        _data: Vec<u8>,
        _replace: bool,
        token: &CancelToken,
    ) -> Result<String> {
        token.check()?;
        Ok(filename.to_string())
    }
}

/// A manager whose factory always hands out `client`.
pub fn manager_for(client: Arc<FakeClient>) -> Arc<ClientManager> {
    Arc::new(ClientManager::with_factory(
        None,
        Box::new(move |_location, _mode| Arc::clone(&client) as Arc<dyn JiraClient>),
    ))
}

/// Attribute set of a small repository with two custom relation fields.
pub fn sample_attributes() -> ClientData {
    let mut blocking = TicketField::new(ATTRIBUTE_BLOCKING);
    blocking.custom = true;
    blocking.label = Some("Blocking".into());
    let mut blocked_by = TicketField::new(ATTRIBUTE_BLOCKED_BY);
    blocked_by.custom = true;
    blocked_by.label = Some("Blocked by".into());
    let mut rank = TicketField::new("rank");
    rank.custom = true;
    rank.field_type = FieldType::Select;
    rank.label = Some("Rank".into());
    rank.options = vec!["low".into(), "mid".into(), "high".into()];
    rank.default_value = Some("1".into());

    let mut data = ClientData::default();
    data.components = Some(vec![
        Component {
            name: "core".into(),
            ..Component::default()
        },
        Component {
            name: "ui".into(),
            ..Component::default()
        },
    ]);
    data.milestones = Some(vec![Milestone {
        name: "1.0".into(),
        ..Milestone::default()
    }]);
    data.versions = Some(vec![Version {
        name: "0.9".into(),
        ..Version::default()
    }]);
    data.priorities = Some(vec![
        TicketAttribute::new("blocker", 1),
        TicketAttribute::new("major", 3),
        TicketAttribute::new("trivial", 5),
    ]);
    data.severities = Some(Vec::new());
    data.ticket_resolutions = Some(vec![
        TicketAttribute::new("fixed", 1),
        TicketAttribute::new("invalid", 2),
    ]);
    data.ticket_status = Some(vec![
        TicketAttribute::new("new", 1),
        TicketAttribute::new("assigned", 2),
        TicketAttribute::new("closed", 3),
    ]);
    data.ticket_types = Some(vec![
        TicketAttribute::new("defect", 1),
        TicketAttribute::new("story", 2),
        TicketAttribute::new("task", 3),
    ]);
    data.ticket_fields = Some(vec![blocking, blocked_by, rank]);
    data.last_update = 1;
    data
}
