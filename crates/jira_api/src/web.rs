//! Client for repositories without the XML-RPC plugin.
//!
//! Tickets are read from the tab separated exports of the query and ticket
//! pages and written through the HTML forms. Deletion, attachment upload and
//! change history are not available through this access mode.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::cookie::Jar;
use reqwest::header::LOCATION;
use reqwest::{Client as HttpClient, RequestBuilder, Response, StatusCode, Url};
use tracing::debug;

use crate::auth::{cookie_value, AuthScheme, Credentials, FORM_TOKEN_COOKIE};
use crate::cancel::CancelToken;
use crate::client::{
    build_http_client, default_ticket_actions, default_ticket_resolutions, http_error,
    validate_new_ticket, ClientCore, JiraClient,
};
use crate::config::{
    AccessMode, RepositoryLocation, LOGIN_URL, NEW_TICKET_URL, QUERY_URL, TICKET_ATTACHMENT_URL,
    TICKET_URL,
};
use crate::error::{JiraError, Result};
use crate::models::{
    Action, ClientData, Comment, Component, Key, Milestone, RepositoryInfo, Ticket,
    TicketAttribute, Version,
};
use crate::search::Search;
use crate::util::encode_url;

const WEB_VERSION: &str = "Web";
const TICKET_STATUSES: [&str; 4] = ["new", "assigned", "reopened", "closed"];

static SELECT_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<select[^>]*\bname="field_(\w+)"[^>]*>(.*?)</select>"#)
        .expect("invalid select regex")
});

static OPTION_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<option[^>]*>([^<]*)</option>").expect("invalid option regex"));

static TICKET_ID_IN_LOCATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/ticket/(\d+)").expect("invalid location regex"));

static MID_AIR_COLLISION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)mid-air collision|has been modified by someone else")
        .expect("invalid collision regex")
});

struct WebSession {
    http: HttpClient,
    jar: Arc<Jar>,
    credentials: Option<Credentials>,
}

impl WebSession {
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(credentials) => {
                request.basic_auth(&credentials.username, Some(&credentials.password))
            }
            None => request,
        }
    }
}

pub struct WebClient {
    core: ClientCore,
    session: tokio::sync::Mutex<Option<Arc<WebSession>>>,
}

impl WebClient {
    pub fn new(location: RepositoryLocation) -> Self {
        Self {
            core: ClientCore::new(location, AccessMode::Web),
            session: tokio::sync::Mutex::new(None),
        }
    }

    /// Returns the logged in session, creating it on first use.
    async fn session(&self, token: &CancelToken) -> Result<Arc<WebSession>> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(Arc::clone(session));
        }

        let location = self.core.location();
        let jar = Arc::new(Jar::default());
        let session = WebSession {
            http: build_http_client(location, Arc::clone(&jar))?,
            jar,
            credentials: location.repository_credentials(),
        };
        if session.credentials.is_some() {
            self.login(&session, token).await?;
        }

        let session = Arc::new(session);
        *guard = Some(Arc::clone(&session));
        Ok(session)
    }

    async fn login(&self, session: &WebSession, token: &CancelToken) -> Result<()> {
        let url = format!("{}{}", self.core.url(), LOGIN_URL);
        debug!(url = self.core.url(), "logging in to web interface");
        let request = session.authorize(session.http.get(&url));
        let response = token.run(request.send()).await??;
        let status = response.status();
        if status.is_success() || status.is_redirection() {
            Ok(())
        } else {
            Err(http_error(status, self.core.url(), AuthScheme::from_response(&response)))
        }
    }

    async fn get_text(&self, path: &str, token: &CancelToken) -> Result<String> {
        let session = self.session(token).await?;
        let url = format!("{}{}", self.core.url(), path);
        debug!(url = %url, "fetching page");
        let request = session.authorize(session.http.get(&url));
        let response = token.run(request.send()).await??;
        let response = self.ensure_success(response)?;
        let text = token.run(response.text()).await??;
        token.check()?;
        Ok(text)
    }

    fn ensure_success(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(http_error(status, self.core.url(), AuthScheme::from_response(&response)))
        }
    }

    /// Posts a form after loading `path` to obtain the form token cookie.
    ///
    /// Successful submissions answer with a redirect, whose target is returned.
    async fn post_form(
        &self,
        path: &str,
        mut fields: Vec<(String, String)>,
        token: &CancelToken,
    ) -> Result<String> {
        let session = self.session(token).await?;
        let url = format!("{}{}", self.core.url(), path);

        let request = session.authorize(session.http.get(&url));
        let response = token.run(request.send()).await??;
        self.ensure_success(response)?;

        let form_token = Url::parse(&url)
            .ok()
            .and_then(|parsed| cookie_value(&session.jar, &parsed, FORM_TOKEN_COOKIE))
            .unwrap_or_default();
        fields.push(("__FORM_TOKEN".to_string(), form_token));

        let request = session.authorize(session.http.post(&url).form(&fields));
        let response = token.run(request.send()).await??;
        let status = response.status();
        if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string();
            return Ok(location);
        }
        if status == StatusCode::OK {
            let body = token.run(response.text()).await??;
            if MID_AIR_COLLISION.is_match(&body) {
                return Err(JiraError::EditConflict(format!(
                    "ticket at {url} has been modified since it was loaded"
                )));
            }
            return Err(JiraError::InvalidTicket(format!(
                "the repository did not accept the submitted form at {url}"
            )));
        }
        Err(http_error(status, self.core.url(), AuthScheme::from_response(&response)))
    }

    async fn query(&self, query: &Search, token: &CancelToken) -> Result<Vec<Ticket>> {
        let path = format!("{QUERY_URL}{}", query.to_url());
        let text = self.get_text(&path, token).await?;
        parse_tab_separated(&text)
    }
}

#[async_trait]
impl JiraClient for WebClient {
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
        self.core.set_data(data)
    }

    async fn validate(&self, token: &CancelToken) -> Result<RepositoryInfo> {
        let text = self
            .get_text(&format!("{QUERY_URL}&max=1&order=id"), token)
            .await?;
        let header = text.lines().next().unwrap_or_default();
        if !header.split('\t').any(|column| column.trim() == "id") {
            return Err(JiraError::unexpected_response(format!(
                "{} does not look like a supported repository",
                self.core.url()
            )));
        }
        Ok(RepositoryInfo::with_version(WEB_VERSION))
    }

    async fn get_ticket(&self, id: i32, token: &CancelToken) -> Result<Ticket> {
        let text = self
            .get_text(&format!("{TICKET_URL}{id}?format=tab"), token)
            .await?;
        let mut ticket = parse_tab_separated(&text)?
            .into_iter()
            .next()
            .ok_or_else(|| JiraError::InvalidTicket(format!("ticket {id} does not exist")))?;
        if !ticket.is_valid() {
            ticket.set_id(id);
        }

        let status = ticket.get_value(Key::Status).unwrap_or("new").to_string();
        let actions = default_ticket_actions(&status)
            .unwrap_or_default()
            .into_iter()
            .map(Action::new)
            .collect();
        ticket.set_actions(actions);

        let resolutions = self
            .data()
            .resolution_names()
            .unwrap_or_else(default_ticket_resolutions);
        ticket.set_resolutions(resolutions);
        Ok(ticket)
    }

    async fn search(&self, query: &Search, token: &CancelToken) -> Result<Vec<Ticket>> {
        self.query(query, token).await
    }

    async fn search_ids(&self, query: &Search, token: &CancelToken) -> Result<Vec<i32>> {
        Ok(self
            .query(query, token)
            .await?
            .iter()
            .map(Ticket::id)
            .collect())
    }

    async fn create_ticket(&self, ticket: &Ticket, token: &CancelToken) -> Result<i32> {
        validate_new_ticket(ticket)?;
        let mut fields = form_fields(ticket.values());
        fields.push(("submit".to_string(), "Create ticket".to_string()));

        let location = self.post_form(NEW_TICKET_URL, fields, token).await?;
        TICKET_ID_IN_LOCATION
            .captures(&location)
            .and_then(|captures| captures[1].parse().ok())
            .ok_or_else(|| {
                JiraError::unexpected_response(format!("no ticket id in redirect to {location}"))
            })
    }

    async fn update_ticket(&self, ticket: &Ticket, comment: &str, token: &CancelToken) -> Result<()> {
        let mut values = ticket.values();
        let timestamp = values.remove(Key::Token.as_str());
        let action = values.remove("action");

        let mut fields = form_fields(values);
        fields.push(("comment".to_string(), comment.to_string()));
        if let Some(timestamp) = timestamp {
            fields.push(("ts".to_string(), timestamp));
        }
        if let Some(action) = action {
            fields.push(("action".to_string(), action));
        }
        fields.push(("submit".to_string(), "Submit changes".to_string()));

        self.post_form(&format!("{TICKET_URL}{}", ticket.id()), fields, token)
            .await?;
        Ok(())
    }

    async fn delete_ticket(&self, _id: i32, _token: &CancelToken) -> Result<()> {
        Err(JiraError::unsupported("ticket deletion"))
    }

    async fn get_comments(&self, _id: i32, _token: &CancelToken) -> Result<Vec<Comment>> {
        Err(JiraError::unsupported("ticket change history"))
    }

    async fn get_changed_tickets(
        &self,
        _since: DateTime<Utc>,
        _token: &CancelToken,
    ) -> Result<BTreeSet<i32>> {
        Err(JiraError::unsupported("changed ticket queries"))
    }

    async fn get_ticket_last_changed(
        &self,
        _id: i32,
        _token: &CancelToken,
    ) -> Result<Option<DateTime<Utc>>> {
        Err(JiraError::unsupported("ticket change times"))
    }

    async fn get_attachment_data(
        &self,
        id: i32,
        filename: &str,
        token: &CancelToken,
    ) -> Result<Vec<u8>> {
        let session = self.session(token).await?;
        let url = format!(
            "{}{TICKET_ATTACHMENT_URL}{id}/{}?format=raw",
            self.core.url(),
            encode_url(filename)
        );
        let request = session.authorize(session.http.get(&url));
        let response = token.run(request.send()).await??;
        let response = self.ensure_success(response)?;
        let bytes = token.run(response.bytes()).await??;
        Ok(bytes.to_vec())
    }

    async fn put_attachment_data(
        &self,
        _id: i32,
        _filename: &str,
        _description: &str,
        _data: Vec<u8>,
        _replace: bool,
        _token: &CancelToken,
    ) -> Result<()> {
        Err(JiraError::unsupported("attachment upload"))
    }

    async fn delete_attachment(&self, _id: i32, _filename: &str, _token: &CancelToken) -> Result<()> {
        Err(JiraError::unsupported("attachment deletion"))
    }

    async fn fetch_attributes(&self, token: &CancelToken) -> Result<ClientData> {
        let html = self.get_text(NEW_TICKET_URL, token).await?;
        let selects = parse_select_options(&html);
        let options = |name: &str| -> Vec<String> {
            selects
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, options)| options.clone())
                .unwrap_or_default()
        };

        let data = ClientData {
            components: Some(
                options("component")
                    .into_iter()
                    .map(|name| Component {
                        name,
                        ..Component::default()
                    })
                    .collect(),
            ),
            milestones: Some(
                options("milestone")
                    .into_iter()
                    .map(|name| Milestone {
                        name,
                        ..Milestone::default()
                    })
                    .collect(),
            ),
            versions: Some(
                options("version")
                    .into_iter()
                    .map(|name| Version {
                        name,
                        ..Version::default()
                    })
                    .collect(),
            ),
            priorities: Some(ordered(options("priority"))),
            severities: Some(ordered(options("severity"))),
            ticket_types: Some(ordered(options("type"))),
            ticket_status: Some(ordered(TICKET_STATUSES.iter().map(|s| s.to_string()).collect())),
            ticket_resolutions: Some(ordered(default_ticket_resolutions())),
            ..ClientData::default()
        };
        debug!(url = self.core.url(), "updated repository attributes from web form");
        Ok(data)
    }
}

fn ordered(names: Vec<String>) -> Vec<TicketAttribute> {
    names
        .into_iter()
        .enumerate()
        .map(|(index, name)| TicketAttribute::new(name, i32::try_from(index + 1).unwrap_or(i32::MAX)))
        .collect()
}

fn form_fields(values: impl IntoIterator<Item = (String, String)>) -> Vec<(String, String)> {
    values
        .into_iter()
        .map(|(key, value)| (format!("field_{key}"), value))
        .collect()
}

/// Extracts the options of every `<select name="field_*">` element.
fn parse_select_options(html: &str) -> Vec<(String, Vec<String>)> {
    SELECT_FIELD
        .captures_iter(html)
        .map(|select| {
            let options = OPTION_VALUE
                .captures_iter(&select[2])
                .map(|option| option[1].trim().to_string())
                .filter(|option| !option.is_empty())
                .collect();
            (select[1].to_string(), options)
        })
        .collect()
}

/// Parses a tab separated ticket export. Columns starting with `__` carry
/// layout hints and are ignored.
fn parse_tab_separated(text: &str) -> Result<Vec<Ticket>> {
    let text = text.trim_start_matches('\u{feff}');
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let Some(header) = lines.next() else {
        return Ok(Vec::new());
    };
    let columns: Vec<&str> = header.split('\t').map(str::trim).collect();

    let mut tickets = Vec::new();
    for line in lines {
        let mut ticket = Ticket::new();
        for (column, value) in columns.iter().zip(line.split('\t')) {
            if column.starts_with("__") {
                continue;
            }
            if *column == Key::Id.as_str() {
                let id = value.trim().parse().map_err(|_| {
                    JiraError::unexpected_response(format!("invalid ticket id {value}"))
                })?;
                ticket.set_id(id);
            } else {
                ticket.put_value(column, unescape(value));
            }
        }
        tickets.push(ticket);
    }
    Ok(tickets)
}

fn unescape(value: &str) -> String {
    value.replace("\\r\\n", "\n").replace("\\n", "\n").replace("\\t", "\t")
}
