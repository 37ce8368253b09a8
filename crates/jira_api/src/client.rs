//! Protocol independent client interface shared by the XML-RPC and web clients.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::cookie::Jar;
use reqwest::redirect::Policy;
use reqwest::{Client as HttpClient, Identity, Proxy, StatusCode};

use crate::auth::{AuthScheme, AuthenticationType, Credentials};
use crate::cancel::CancelToken;
use crate::config::{AccessMode, RepositoryLocation};
use crate::error::{JiraError, Result};
use crate::models::{
    ClientData, Comment, Component, Key, Milestone, Priority, RepositoryInfo, Severity, Ticket,
    TicketField, TicketResolution, TicketStatus, TicketType, Version, WikiPage, WikiPageInfo,
};
use crate::search::Search;

/// Status code used by some proxies to signal a rejected client certificate.
pub const SC_CERT_AUTH_FAILED: u16 = 499;

const DEFAULT_RESOLUTIONS: [&str; 5] = ["fixed", "invalid", "wontfix", "duplicate", "worksforme"];

/// Operations every repository client supports, regardless of the wire
/// protocol behind it.
///
/// Wiki access is an optional capability: callers check [`JiraClient::wiki`]
/// instead of assuming it.
#[async_trait]
pub trait JiraClient: Send + Sync {
    fn access_mode(&self) -> AccessMode;

    fn url(&self) -> &str;

    /// Snapshot of the cached repository attributes.
    fn data(&self) -> Arc<ClientData>;

    /// Replaces the cached attributes wholesale.
    fn set_data(&self, data: ClientData);

    /// Checks connectivity and credentials and returns the repository version.
    async fn validate(&self, token: &CancelToken) -> Result<RepositoryInfo>;

    async fn get_ticket(&self, id: i32, token: &CancelToken) -> Result<Ticket>;

    async fn search(&self, query: &Search, token: &CancelToken) -> Result<Vec<Ticket>>;

    async fn search_ids(&self, query: &Search, token: &CancelToken) -> Result<Vec<i32>>;

    /// Creates `ticket` and returns the id assigned by the repository.
    async fn create_ticket(&self, ticket: &Ticket, token: &CancelToken) -> Result<i32>;

    async fn update_ticket(&self, ticket: &Ticket, comment: &str, token: &CancelToken) -> Result<()>;

    async fn delete_ticket(&self, id: i32, token: &CancelToken) -> Result<()>;

    async fn get_comments(&self, id: i32, token: &CancelToken) -> Result<Vec<Comment>>;

    async fn get_changed_tickets(
        &self,
        since: DateTime<Utc>,
        token: &CancelToken,
    ) -> Result<BTreeSet<i32>>;

    async fn get_ticket_last_changed(
        &self,
        id: i32,
        token: &CancelToken,
    ) -> Result<Option<DateTime<Utc>>>;

    async fn get_attachment_data(
        &self,
        id: i32,
        filename: &str,
        token: &CancelToken,
    ) -> Result<Vec<u8>>;

    async fn put_attachment_data(
        &self,
        id: i32,
        filename: &str,
        description: &str,
        data: Vec<u8>,
        replace: bool,
        token: &CancelToken,
    ) -> Result<()>;

    async fn delete_attachment(&self, id: i32, filename: &str, token: &CancelToken) -> Result<()>;

    /// Fetches a complete attribute set from the repository.
    async fn fetch_attributes(&self, token: &CancelToken) -> Result<ClientData>;

    /// Refreshes the attribute cache when it is empty or `force` is set.
    ///
    /// The new data set is built completely before it replaces the old one.
    async fn update_attributes(&self, force: bool, token: &CancelToken) -> Result<()> {
        if self.has_attributes() && !force {
            return Ok(());
        }
        let mut data = self.fetch_attributes(token).await?;
        data.last_update = Utc::now().timestamp_millis();
        self.set_data(data);
        Ok(())
    }

    fn has_attributes(&self) -> bool {
        self.data().has_attributes()
    }

    fn wiki(&self) -> Option<&dyn WikiClient> {
        None
    }

    fn components(&self) -> Option<Vec<Component>> {
        self.data().components.clone()
    }

    fn milestones(&self) -> Option<Vec<Milestone>> {
        self.data().milestones.clone()
    }

    fn priorities(&self) -> Option<Vec<Priority>> {
        self.data().priorities.clone()
    }

    fn severities(&self) -> Option<Vec<Severity>> {
        self.data().severities.clone()
    }

    fn ticket_fields(&self) -> Option<Vec<TicketField>> {
        self.data().ticket_fields.clone()
    }

    fn ticket_field_by_name(&self, name: &str) -> Option<TicketField> {
        self.data().ticket_field_by_name(name).cloned()
    }

    fn ticket_resolutions(&self) -> Option<Vec<TicketResolution>> {
        self.data().ticket_resolutions.clone()
    }

    fn ticket_status(&self) -> Option<Vec<TicketStatus>> {
        self.data().ticket_status.clone()
    }

    fn ticket_types(&self) -> Option<Vec<TicketType>> {
        self.data().ticket_types.clone()
    }

    fn versions(&self) -> Option<Vec<Version>> {
        self.data().versions.clone()
    }

    fn default_ticket_resolutions(&self) -> Vec<String> {
        default_ticket_resolutions()
    }

    fn default_ticket_actions(&self, status: &str) -> Option<Vec<String>> {
        default_ticket_actions(status)
    }
}

/// Wiki operations, only offered by clients that talk XML-RPC.
#[async_trait]
pub trait WikiClient: Send + Sync {
    async fn validate_wiki_api(&self, token: &CancelToken) -> Result<()>;

    async fn wiki_to_html(&self, source: &str, token: &CancelToken) -> Result<String>;

    async fn get_all_wiki_page_names(&self, token: &CancelToken) -> Result<Vec<String>>;

    /// Page metadata for `version`, or the latest version when `None`.
    async fn get_wiki_page_info(
        &self,
        name: &str,
        version: Option<i32>,
        token: &CancelToken,
    ) -> Result<WikiPageInfo>;

    /// Every revision of a page, oldest first.
    async fn get_wiki_page_info_all_versions(
        &self,
        name: &str,
        token: &CancelToken,
    ) -> Result<Vec<WikiPageInfo>>;

    async fn get_wiki_page_content(
        &self,
        name: &str,
        version: Option<i32>,
        token: &CancelToken,
    ) -> Result<String>;

    async fn get_wiki_page_html(
        &self,
        name: &str,
        version: Option<i32>,
        token: &CancelToken,
    ) -> Result<String>;

    async fn get_recent_wiki_changes(
        &self,
        since: DateTime<Utc>,
        token: &CancelToken,
    ) -> Result<Vec<WikiPageInfo>>;

    async fn get_wiki_page(
        &self,
        name: &str,
        version: Option<i32>,
        token: &CancelToken,
    ) -> Result<WikiPage>;

    /// Stores a new revision; the comment and author are taken from the
    /// page info.
    async fn put_wiki_page(&self, page: &WikiPage, token: &CancelToken) -> Result<bool>;

    async fn delete_wiki_page(&self, name: &str, token: &CancelToken) -> Result<bool>;

    async fn list_wiki_page_attachments(&self, name: &str, token: &CancelToken) -> Result<Vec<String>>;

    async fn get_wiki_page_attachment_data(
        &self,
        name: &str,
        filename: &str,
        token: &CancelToken,
    ) -> Result<Vec<u8>>;

    /// Returns the stored file name, which differs from `filename` when an
    /// attachment of that name exists and `replace` is false.
    async fn put_wiki_page_attachment_data(
        &self,
        name: &str,
        filename: &str,
        description: &str,
        data: Vec<u8>,
        replace: bool,
        token: &CancelToken,
    ) -> Result<String>;
}

/// State shared by every client implementation.
pub struct ClientCore {
    location: RepositoryLocation,
    access_mode: AccessMode,
    data: RwLock<Arc<ClientData>>,
}

impl ClientCore {
    pub fn new(location: RepositoryLocation, access_mode: AccessMode) -> Self {
        Self {
            location,
            access_mode,
            data: RwLock::new(Arc::new(ClientData::default())),
        }
    }

    pub fn location(&self) -> &RepositoryLocation {
        &self.location
    }

    pub fn url(&self) -> &str {
        self.location.url()
    }

    pub fn access_mode(&self) -> AccessMode {
        self.access_mode
    }

    pub fn data(&self) -> Arc<ClientData> {
        match self.data.read() {
            Ok(data) => Arc::clone(&data),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn set_data(&self, data: ClientData) {
        let data = Arc::new(data);
        match self.data.write() {
            Ok(mut guard) => *guard = data,
            Err(poisoned) => *poisoned.into_inner() = data,
        }
    }
}

/// Builds the HTTP client used for every request against a repository.
///
/// Redirects are not followed: form logins and ticket submissions signal
/// success through the redirect itself.
pub fn build_http_client(location: &RepositoryLocation, jar: Arc<Jar>) -> Result<HttpClient> {
    let config = location.config();
    let mut builder = HttpClient::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .redirect(Policy::none())
        .cookie_provider(jar);

    if let Some(proxy_url) = &config.proxy {
        let mut proxy = Proxy::all(proxy_url.as_str())
            .map_err(|err| JiraError::ConnectionFailure(format!("invalid proxy {proxy_url}: {err}")))?;
        if let Some(credentials) = location
            .credentials(AuthenticationType::Proxy)
            .filter(Credentials::is_valid)
        {
            proxy = proxy.basic_auth(&credentials.username, &credentials.password);
        }
        builder = builder.proxy(proxy);
    }

    if let Some(pem) = location.identity() {
        let identity = Identity::from_pem(&pem)
            .map_err(|err| JiraError::CertificateFailure(err.to_string()))?;
        builder = builder.identity(identity);
    }

    builder
        .build()
        .map_err(|err| JiraError::ConnectionFailure(err.to_string()))
}

/// Maps an unsuccessful HTTP status onto the error taxonomy.
pub fn http_error(status: StatusCode, url: &str, scheme: Option<AuthScheme>) -> JiraError {
    match status {
        StatusCode::UNAUTHORIZED => JiraError::LoginRequired {
            url: url.to_string(),
            ntlm: scheme == Some(AuthScheme::Ntlm),
        },
        StatusCode::FORBIDDEN => JiraError::PermissionDenied(format!("access to {url} is forbidden")),
        StatusCode::PROXY_AUTHENTICATION_REQUIRED => JiraError::ProxyAuthRequired,
        status if status.as_u16() == SC_CERT_AUTH_FAILED => {
            JiraError::CertificateFailure(format!("certificate authentication failed for {url}"))
        }
        status => JiraError::Http {
            status,
            message: format!("unexpected response from {url}"),
        },
    }
}

pub fn default_ticket_resolutions() -> Vec<String> {
    DEFAULT_RESOLUTIONS.iter().map(|r| r.to_string()).collect()
}

/// Actions offered for a status when the repository does not report any.
pub fn default_ticket_actions(status: &str) -> Option<Vec<String>> {
    let actions: &[&str] = match status {
        "new" => &["leave", "resolve", "reassign", "accept"],
        "assigned" | "reopened" => &["leave", "resolve", "reassign"],
        "closed" => &["leave", "reopen"],
        _ => return None,
    };
    Some(actions.iter().map(|a| a.to_string()).collect())
}

/// Rejects a ticket whose summary or description is missing or blank.
pub fn validate_new_ticket(ticket: &Ticket) -> Result<()> {
    let filled = |key| ticket.get_value(key).is_some_and(|value| !value.trim().is_empty());
    if filled(Key::Summary) && filled(Key::Description) {
        Ok(())
    } else {
        Err(JiraError::InvalidTicket(
            "summary and description are required".to_string(),
        ))
    }
}
