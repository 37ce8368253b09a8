//! XML-RPC client: authentication probing, the credential recovery loop,
//! batched calls and the ticket, attribute and wiki operations built on them.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use digest_auth::{AuthContext, WwwAuthenticateHeader};
use reqwest::cookie::Jar;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, SERVER, WWW_AUTHENTICATE};
use reqwest::{Client as HttpClient, Response, StatusCode, Url};
use tracing::{debug, warn};

use super::codec::{decode_response, encode_request, multicall_results, FAULT_GENERAL_ERROR};
use super::value::Value;
use crate::auth::{
    authenticate_account_manager, validate_authentication_state, AuthScheme, Credentials,
};
use crate::cancel::CancelToken;
use crate::client::{
    build_http_client, default_ticket_resolutions, http_error, validate_new_ticket, ClientCore,
    JiraClient, WikiClient,
};
use crate::config::{AccessMode, RepositoryLocation, LOGIN_URL, XMLRPC_URL};
use crate::error::{JiraError, Result};
use crate::models::{
    Action, Attachment, ClientData, Comment, Component, FieldType, Key, Milestone,
    RepositoryInfo, Ticket, TicketAttribute, TicketField, Version, WikiPage, WikiPageInfo,
};
use crate::search::Search;

pub const REQUIRED_REVISION: &str = "1950";
pub const REQUIRED_EPOCH: i32 = 0;
pub const REQUIRED_MAJOR: i32 = 0;
pub const REQUIRED_MINOR: i32 = 1;
pub const REQUIRED_WIKI_RPC_VERSION: i64 = 2;

const MAX_ATTEMPTS: usize = 3;
const STANDALONE_SERVER_PREFIX: &str = "tracd";

/// Lazily created HTTP state for one set of credentials.
struct Transport {
    http: HttpClient,
    jar: Arc<Jar>,
    endpoint: String,
    endpoint_path: String,
    credentials: Option<Credentials>,
}

impl Transport {
    fn connect(location: &RepositoryLocation) -> Result<Self> {
        let credentials = location.repository_credentials();
        let jar = Arc::new(Jar::default());
        let http = build_http_client(location, Arc::clone(&jar))?;

        let mut endpoint = location.url().to_string();
        if credentials.is_some() {
            endpoint.push_str(LOGIN_URL);
        }
        endpoint.push_str(XMLRPC_URL);
        let endpoint_path = Url::parse(&endpoint)
            .map(|url| url.path().to_string())
            .map_err(|err| JiraError::ConnectionFailure(format!("invalid url {endpoint}: {err}")))?;

        Ok(Self {
            http,
            jar,
            endpoint,
            endpoint_path,
            credentials,
        })
    }
}

/// What the client has learned about the server's authentication setup.
/// Survives individual calls; reset whenever the server rejects credentials.
#[derive(Default)]
struct AuthCache {
    probed: bool,
    digest: Option<WwwAuthenticateHeader>,
    standalone_server: bool,
    account_manager_failed: bool,
}

impl AuthCache {
    fn invalidate(&mut self) {
        self.probed = false;
        self.digest = None;
    }
}

/// Progress of one logical call through the recovery loop.
#[derive(Default)]
struct CallState {
    attempts: usize,
    account_manager_tried: bool,
    last_error: Option<JiraError>,
}

pub struct XmlRpcClient {
    core: ClientCore,
    transport: tokio::sync::Mutex<Option<Arc<Transport>>>,
    auth: Mutex<AuthCache>,
    info: RwLock<RepositoryInfo>,
}

impl XmlRpcClient {
    pub fn new(location: RepositoryLocation) -> Self {
        Self {
            core: ClientCore::new(location, AccessMode::XmlRpc),
            transport: tokio::sync::Mutex::new(None),
            auth: Mutex::new(AuthCache::default()),
            info: RwLock::new(RepositoryInfo::default()),
        }
    }

    pub fn repository_info(&self) -> RepositoryInfo {
        match self.info.read() {
            Ok(info) => info.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn auth(&self) -> MutexGuard<'_, AuthCache> {
        self.auth.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn transport(&self) -> Result<Arc<Transport>> {
        let mut guard = self.transport.lock().await;
        if let Some(transport) = guard.as_ref() {
            return Ok(Arc::clone(transport));
        }
        let transport = Arc::new(Transport::connect(self.core.location())?);
        *guard = Some(Arc::clone(&transport));
        Ok(transport)
    }

    async fn reset_transport(&self) {
        *self.transport.lock().await = None;
    }

    /// Performs a single logical call, re-requesting credentials up to
    /// three times when the server rejects the current ones.
    pub async fn call(&self, method: &str, params: Vec<Value>, token: &CancelToken) -> Result<Value> {
        let mut state = CallState::default();
        while state.attempts < MAX_ATTEMPTS {
            state.attempts += 1;
            token.check()?;

            let transport = self.transport().await?;
            let probed = self.auth().probed;
            if !probed {
                self.probe(&transport, token).await?;
            }

            let err = match self.execute(&transport, method, &params, &mut state, token).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            let Some(kind) = err.recovery() else {
                return Err(err);
            };
            if !self
                .core
                .location()
                .request_credentials(kind, &err.to_string())
                .await
            {
                return Err(err);
            }
            debug!(
                url = self.core.url(),
                method,
                attempt = state.attempts,
                credentials = kind.as_str(),
                "retrying with updated credentials"
            );
            self.reset_transport().await;
            state.last_error = Some(err);
        }
        Err(state
            .last_error
            .unwrap_or_else(|| JiraError::login_required(self.core.url())))
    }

    /// First attempt plus the account manager fallback for forbidden calls.
    async fn execute(
        &self,
        transport: &Transport,
        method: &str,
        params: &[Value],
        state: &mut CallState,
        token: &CancelToken,
    ) -> Result<Value> {
        let denied = match self.execute_once(transport, method, params, token).await {
            Err(err @ JiraError::PermissionDenied(_)) => err,
            other => return other,
        };

        let account_manager_failed = self.auth().account_manager_failed;
        if state.account_manager_tried || account_manager_failed {
            return Err(denied);
        }
        let Some(credentials) = transport.credentials.clone() else {
            return Err(denied);
        };
        state.account_manager_tried = true;

        let url = self.core.url();
        match authenticate_account_manager(&transport.http, &transport.jar, url, &credentials, token)
            .await
        {
            Ok(()) => {}
            Err(err @ (JiraError::LoginRequired { .. } | JiraError::Canceled)) => return Err(err),
            Err(err) => {
                debug!(url, error = %err, "account manager login unavailable");
                self.auth().account_manager_failed = true;
                return Err(denied);
            }
        }
        if validate_authentication_state(&transport.jar, url).is_err() {
            debug!(url, "account manager login did not issue an auth cookie");
            self.auth().account_manager_failed = true;
            return Err(denied);
        }

        self.execute_once(transport, method, params, token).await
    }

    async fn execute_once(
        &self,
        transport: &Transport,
        method: &str,
        params: &[Value],
        token: &CancelToken,
    ) -> Result<Value> {
        let reprobe = {
            let auth = self.auth();
            auth.standalone_server && auth.digest.is_some()
        };
        if reprobe {
            self.probe(transport, token).await?;
        }

        debug!(url = self.core.url(), method, "calling");
        let body = encode_request(method, params);
        let mut request = transport
            .http
            .post(&transport.endpoint)
            .header(CONTENT_TYPE, "text/xml; charset=UTF-8");
        if let Some(credentials) = &transport.credentials {
            request = match self.digest_authorization(transport, credentials, &body) {
                Some(header) => request.header(AUTHORIZATION, header),
                None => request.basic_auth(&credentials.username, Some(&credentials.password)),
            };
        }

        let response = token.run(request.body(body).send()).await??;
        let status = response.status();
        if !status.is_success() {
            let scheme = AuthScheme::from_response(&response);
            if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
                self.auth().invalidate();
            }
            return Err(http_error(status, self.core.url(), scheme));
        }

        let text = token.run(response.text()).await??;
        token.check()?;
        let result = decode_response(&text, method);
        if let Err(JiraError::PermissionDenied(_)) = &result {
            self.auth().invalidate();
        }
        result
    }

    fn digest_authorization(
        &self,
        transport: &Transport,
        credentials: &Credentials,
        body: &str,
    ) -> Option<String> {
        let mut auth = self.auth();
        let challenge = auth.digest.as_mut()?;
        let context = AuthContext::new_post(
            credentials.username.as_str(),
            credentials.password.as_str(),
            transport.endpoint_path.as_str(),
            Some(body.as_bytes()),
        );
        match challenge.respond(&context) {
            Ok(answer) => Some(answer.to_header_string()),
            Err(err) => {
                warn!(url = self.core.url(), error = %err, "unable to answer digest challenge");
                None
            }
        }
    }

    /// Sends an unauthenticated HEAD request to learn the server's scheme.
    /// Transport errors are ignored; the real call reports them.
    async fn probe(&self, transport: &Transport, token: &CancelToken) -> Result<()> {
        let result = self.probe_scheme(transport, token).await;
        self.auth().probed = true;
        match result {
            Err(JiraError::Canceled) => Err(JiraError::Canceled),
            Err(err) => {
                debug!(url = self.core.url(), error = %err, "authentication probe failed");
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    async fn probe_scheme(&self, transport: &Transport, token: &CancelToken) -> Result<()> {
        if transport.credentials.is_none() {
            return Ok(());
        }
        debug!(url = self.core.url(), "probing authentication");
        let response = token.run(transport.http.head(&transport.endpoint).send()).await??;
        let status = response.status();
        debug!(url = self.core.url(), %status, "received authentication response");
        if !matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Ok(());
        }

        let scheme = AuthScheme::from_response(&response);
        let standalone = response
            .headers()
            .get(SERVER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|server| server.starts_with(STANDALONE_SERVER_PREFIX));

        let mut auth = self.auth();
        match scheme {
            Some(AuthScheme::Digest) => {
                auth.digest = digest_challenge(&response);
                debug!(url = self.core.url(), "received digest scheme");
            }
            Some(other) => debug!(url = self.core.url(), scheme = ?other, "received scheme"),
            None => debug!(url = self.core.url(), "no authentication scheme received"),
        }
        auth.standalone_server = standalone;
        Ok(())
    }

    /// Dispatches `calls` as one `system.multicall` request; each entry of
    /// the result corresponds to the call at the same index.
    pub async fn multicall(
        &self,
        calls: Vec<(String, Vec<Value>)>,
        token: &CancelToken,
    ) -> Result<Vec<Result<Value>>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }
        let payload: Vec<Value> = calls
            .iter()
            .map(|(method, params)| {
                Value::struct_of([
                    ("methodName", Value::from(method.as_str())),
                    ("params", Value::Array(params.clone())),
                ])
            })
            .collect();
        debug!(url = self.core.url(), count = calls.len(), "sending multicall");

        let items = self
            .call("system.multicall", vec![Value::Array(payload)], token)
            .await?
            .into_array()
            .ok_or_else(|| JiraError::unexpected_response("multicall result is not an array"))?;
        let methods: Vec<&str> = calls.iter().map(|(method, _)| method.as_str()).collect();
        multicall_results(items, &methods, token)
    }

    /// Like [`XmlRpcClient::multicall`] but fails with the first faulted entry.
    async fn multicall_values(
        &self,
        calls: Vec<(String, Vec<Value>)>,
        token: &CancelToken,
    ) -> Result<Vec<Value>> {
        self.multicall(calls, token).await?.into_iter().collect()
    }

    async fn call_array(&self, method: &str, params: Vec<Value>, token: &CancelToken) -> Result<Vec<Value>> {
        self.call(method, params, token)
            .await?
            .into_array()
            .ok_or_else(|| JiraError::unexpected_response(format!("{method} did not return an array")))
    }

    async fn call_string(&self, method: &str, params: Vec<Value>, token: &CancelToken) -> Result<String> {
        match self.call(method, params, token).await? {
            Value::String(text) => Ok(text),
            other => Err(JiraError::unexpected_response(format!(
                "{method} returned {other:?} instead of a string"
            ))),
        }
    }

    async fn call_bool(&self, method: &str, params: Vec<Value>, token: &CancelToken) -> Result<bool> {
        self.call(method, params, token)
            .await?
            .as_bool()
            .ok_or_else(|| JiraError::unexpected_response(format!("{method} did not return a boolean")))
    }

    async fn call_bytes(&self, method: &str, params: Vec<Value>, token: &CancelToken) -> Result<Vec<u8>> {
        self.call(method, params, token)
            .await?
            .into_bytes()
            .ok_or_else(|| JiraError::unexpected_response(format!("{method} did not return data")))
    }

    pub async fn validate(&self, token: &CancelToken) -> Result<RepositoryInfo> {
        let version = match self.call("system.getAPIVersion", Vec::new(), token).await {
            Ok(version) => version,
            Err(JiraError::MethodNotFound { .. }) => {
                return Err(api_unsupported(format!(
                    "required API calls are missing, please update the XML-RPC plugin to revision {REQUIRED_REVISION} or later"
                )))
            }
            Err(err) => return Err(err),
        };

        let parts: Vec<i32> = version
            .as_array()
            .unwrap_or_default()
            .iter()
            .filter_map(Value::as_i32)
            .collect();
        let info = match parts.as_slice() {
            [epoch, major, minor, ..] => RepositoryInfo::new(*epoch, *major, *minor),
            [major, minor] => RepositoryInfo::new(0, *major, *minor),
            _ => {
                return Err(api_unsupported(format!(
                    "unsupported API version, please update the XML-RPC plugin to revision {REQUIRED_REVISION} or later"
                )))
            }
        };

        if let Ok(mut cached) = self.info.write() {
            *cached = info.clone();
        }
        if !info.is_api_version_or_higher(REQUIRED_EPOCH, REQUIRED_MAJOR, REQUIRED_MINOR) {
            return Err(api_unsupported(format!(
                "API version {info} is not supported, please update the XML-RPC plugin to revision {REQUIRED_REVISION} or later"
            )));
        }
        debug!(url = self.core.url(), version = %info, "validated repository");
        Ok(info)
    }

    async fn update_api_version(&self, token: &CancelToken) -> Result<()> {
        if self.repository_info().is_stale() {
            self.validate(token).await?;
        }
        Ok(())
    }

    async fn is_api_version_or_higher(
        &self,
        epoch: i32,
        major: i32,
        minor: i32,
        token: &CancelToken,
    ) -> Result<bool> {
        self.update_api_version(token).await?;
        Ok(self.repository_info().is_api_version_or_higher(epoch, major, minor))
    }

    async fn supports_workflow(&self, token: &CancelToken) -> Result<bool> {
        self.is_api_version_or_higher(1, 0, 1, token).await
    }

    async fn supports_max_search_results(&self, token: &CancelToken) -> Result<bool> {
        self.is_api_version_or_higher(1, 0, 0, token).await
    }

    async fn supports_notifications(&self, token: &CancelToken) -> Result<bool> {
        self.is_api_version_or_higher(0, 0, 2, token).await
    }

    /// Fetches several tickets in one batch; results keep the order of `ids`.
    pub async fn get_tickets(&self, ids: &[i32], token: &CancelToken) -> Result<Vec<Ticket>> {
        let calls = ids
            .iter()
            .map(|id| ("ticket.get".to_string(), vec![Value::from(*id)]))
            .collect();
        let values = self.multicall_values(calls, token).await?;

        let mut tickets = Vec::with_capacity(values.len());
        for (expected, value) in ids.iter().zip(&values) {
            token.check()?;
            let ticket = parse_ticket(value)?;
            if ticket.id() != *expected {
                return Err(JiraError::unexpected_response(format!(
                    "requested ticket {expected} but received ticket {}",
                    ticket.id()
                )));
            }
            tickets.push(ticket);
        }
        Ok(tickets)
    }

    pub async fn get_actions(&self, id: i32, token: &CancelToken) -> Result<Vec<Action>> {
        if self.supports_workflow(token).await? {
            let entries = self.call_array("ticket.getActions", vec![Value::from(id)], token).await?;
            entries.iter().map(parse_action).collect()
        } else {
            let names = self
                .call_array("ticket.getAvailableActions", vec![Value::from(id)], token)
                .await?;
            names
                .iter()
                .map(|name| {
                    name.as_str()
                        .map(Action::new)
                        .ok_or_else(|| JiraError::unexpected_response("action name is not a string"))
                })
                .collect()
        }
    }

    /// Items of an attribute type fetched through `getAll` plus a batched `get`.
    async fn attribute_items(&self, kind: &str, token: &CancelToken) -> Result<Vec<Value>> {
        let ids = self.call_array(&format!("{kind}.getAll"), Vec::new(), token).await?;
        let calls = ids
            .into_iter()
            .map(|id| (format!("{kind}.get"), vec![id]))
            .collect();
        self.multicall_values(calls, token).await
    }

    /// Named attributes whose value defines their order. Entries the server
    /// reports in an unexpected shape are skipped with a warning.
    async fn ticket_attributes(
        &self,
        kind: &str,
        assign_values: bool,
        token: &CancelToken,
    ) -> Result<Vec<TicketAttribute>> {
        let ids = self.call_array(&format!("{kind}.getAll"), Vec::new(), token).await?;
        let calls = ids
            .iter()
            .map(|id| (format!("{kind}.get"), vec![id.clone()]))
            .collect();
        let values = self.multicall_values(calls, token).await?;

        let mut attributes = Vec::with_capacity(values.len());
        for (index, (id, value)) in ids.iter().zip(&values).enumerate() {
            token.check()?;
            let order = if assign_values {
                i32::try_from(index).ok()
            } else {
                match value {
                    Value::Int(number) => i32::try_from(*number).ok(),
                    Value::String(text) => text.trim().parse().ok(),
                    _ => None,
                }
            };
            match (id.as_str(), order) {
                (Some(name), Some(order)) => attributes.push(TicketAttribute::new(name, order)),
                _ => warn!(
                    url = self.core.url(),
                    attribute = kind,
                    "invalid response from repository for attribute type"
                ),
            }
        }
        attributes.sort();
        Ok(attributes)
    }

    async fn wiki_page_info(
        &self,
        name: &str,
        version: Option<i32>,
        token: &CancelToken,
    ) -> Result<WikiPageInfo> {
        let result = match version {
            None => self.call("wiki.getPageInfo", vec![Value::from(name)], token).await?,
            Some(version) => {
                self.call(
                    "wiki.getPageInfoVersion",
                    vec![Value::from(name), Value::from(version)],
                    token,
                )
                .await?
            }
        };
        parse_wiki_page_info(&result)
    }
}

#[async_trait]
impl JiraClient for XmlRpcClient {
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
        XmlRpcClient::validate(self, token).await
    }

    async fn get_ticket(&self, id: i32, token: &CancelToken) -> Result<Ticket> {
        let result = self.call("ticket.get", vec![Value::from(id)], token).await?;
        let mut ticket = parse_ticket(&result)?;

        for comment in self.get_comments(id, token).await? {
            ticket.add_comment(comment);
        }

        let attachments = self
            .call_array("ticket.listAttachments", vec![Value::from(id)], token)
            .await?;
        for entry in &attachments {
            ticket.add_attachment(parse_attachment(entry)?);
        }

        ticket.set_actions(self.get_actions(id, token).await?);

        self.update_attributes(false, token).await?;
        let resolutions = self
            .data()
            .resolution_names()
            .unwrap_or_else(default_ticket_resolutions);
        ticket.set_resolutions(resolutions);
        Ok(ticket)
    }

    async fn search(&self, query: &Search, token: &CancelToken) -> Result<Vec<Ticket>> {
        let ids = self.search_ids(query, token).await?;
        self.get_tickets(&ids, token).await
    }

    async fn search_ids(&self, query: &Search, token: &CancelToken) -> Result<Vec<i32>> {
        let supports_max = self.supports_max_search_results(token).await?;
        let query = query.to_rpc_query(supports_max);
        debug!(url = self.core.url(), query = %query, "searching tickets");
        let ids = self.call_array("ticket.query", vec![Value::from(query)], token).await?;
        ids.iter()
            .map(|id| {
                id.as_i32()
                    .ok_or_else(|| JiraError::unexpected_response("ticket id is not an integer"))
            })
            .collect()
    }

    async fn create_ticket(&self, ticket: &Ticket, token: &CancelToken) -> Result<i32> {
        validate_new_ticket(ticket)?;
        let mut attributes = ticket.values();
        let summary = attributes.remove(Key::Summary.as_str()).unwrap_or_default();
        let description = attributes.remove(Key::Description.as_str()).unwrap_or_default();

        let mut params = vec![
            Value::from(summary),
            Value::from(description),
            Value::from(attributes),
        ];
        if self.supports_notifications(token).await? {
            params.push(Value::from(true));
        }
        self.call("ticket.create", params, token)
            .await?
            .as_i32()
            .ok_or_else(|| JiraError::unexpected_response("ticket.create did not return an id"))
    }

    async fn update_ticket(&self, ticket: &Ticket, comment: &str, token: &CancelToken) -> Result<()> {
        self.update_api_version(token).await?;

        let mut attributes = ticket.values();
        if !self.supports_workflow(token).await? {
            // older plugins derive the action from status and resolution
            attributes.remove("action");
            attributes.remove(Key::Token.as_str());
        }

        let mut params = vec![
            Value::from(ticket.id()),
            Value::from(comment),
            Value::from(attributes),
        ];
        if self.supports_notifications(token).await? {
            params.push(Value::from(true));
        }
        self.call("ticket.update", params, token).await?;
        Ok(())
    }

    async fn delete_ticket(&self, id: i32, token: &CancelToken) -> Result<()> {
        self.call("ticket.delete", vec![Value::from(id)], token).await?;
        Ok(())
    }

    async fn get_comments(&self, id: i32, token: &CancelToken) -> Result<Vec<Comment>> {
        let entries = self
            .call_array("ticket.changeLog", vec![Value::from(id), Value::from(0)], token)
            .await?;
        entries.iter().map(parse_change_log_entry).collect()
    }

    async fn get_changed_tickets(
        &self,
        since: DateTime<Utc>,
        token: &CancelToken,
    ) -> Result<BTreeSet<i32>> {
        let ids = self
            .call_array("ticket.getRecentChanges", vec![Value::from(since)], token)
            .await?;
        ids.iter()
            .map(|id| {
                id.as_i32()
                    .ok_or_else(|| JiraError::unexpected_response("ticket id is not an integer"))
            })
            .collect()
    }

    async fn get_ticket_last_changed(
        &self,
        id: i32,
        token: &CancelToken,
    ) -> Result<Option<DateTime<Utc>>> {
        let result = self.call("ticket.get", vec![Value::from(id)], token).await?;
        Ok(parse_ticket(&result)?.last_changed())
    }

    async fn get_attachment_data(
        &self,
        id: i32,
        filename: &str,
        token: &CancelToken,
    ) -> Result<Vec<u8>> {
        self.call_bytes(
            "ticket.getAttachment",
            vec![Value::from(id), Value::from(filename)],
            token,
        )
        .await
    }

    async fn put_attachment_data(
        &self,
        id: i32,
        filename: &str,
        description: &str,
        data: Vec<u8>,
        replace: bool,
        token: &CancelToken,
    ) -> Result<()> {
        let params = vec![
            Value::from(id),
            Value::from(filename),
            Value::from(description),
            Value::Base64(data),
            Value::from(replace),
        ];
        self.call("ticket.putAttachment", params, token).await?;
        Ok(())
    }

    async fn delete_attachment(&self, id: i32, filename: &str, token: &CancelToken) -> Result<()> {
        self.call(
            "ticket.deleteAttachment",
            vec![Value::from(id), Value::from(filename)],
            token,
        )
        .await?;
        Ok(())
    }

    async fn fetch_attributes(&self, token: &CancelToken) -> Result<ClientData> {
        let mut data = ClientData::default();

        let components = self.attribute_items("ticket.component", token).await?;
        data.components = Some(components.iter().map(parse_component).collect());
        token.check()?;

        let milestones = self.attribute_items("ticket.milestone", token).await?;
        data.milestones = Some(milestones.iter().map(parse_milestone).collect());
        token.check()?;

        data.priorities = Some(self.ticket_attributes("ticket.priority", false, token).await?);
        data.ticket_resolutions =
            Some(self.ticket_attributes("ticket.resolution", false, token).await?);
        data.severities = Some(self.ticket_attributes("ticket.severity", false, token).await?);

        let assign_values = self.is_api_version_or_higher(1, 0, 0, token).await?;
        data.ticket_status = Some(
            self.ticket_attributes("ticket.status", assign_values, token)
                .await?,
        );
        data.ticket_types = Some(self.ticket_attributes("ticket.type", false, token).await?);

        let versions = self.attribute_items("ticket.version", token).await?;
        data.versions = Some(versions.iter().map(parse_version).collect());
        token.check()?;

        let fields = self.call_array("ticket.getTicketFields", Vec::new(), token).await?;
        data.ticket_fields = Some(fields.iter().map(parse_ticket_field).collect());
        token.check()?;

        debug!(url = self.core.url(), "updated repository attributes");
        Ok(data)
    }

    fn wiki(&self) -> Option<&dyn WikiClient> {
        Some(self)
    }
}

#[async_trait]
impl WikiClient for XmlRpcClient {
    async fn validate_wiki_api(&self, token: &CancelToken) -> Result<()> {
        let version = self
            .call("wiki.getRPCVersionSupported", Vec::new(), token)
            .await?
            .as_i64()
            .unwrap_or_default();
        if version < REQUIRED_WIKI_RPC_VERSION {
            return Err(JiraError::RemoteFault {
                code: FAULT_GENERAL_ERROR,
                message: format!(
                    "wiki RPC version {version} is not supported, version {REQUIRED_WIKI_RPC_VERSION} or later is required"
                ),
                method: Some("wiki.getRPCVersionSupported".to_string()),
            });
        }
        Ok(())
    }

    async fn wiki_to_html(&self, source: &str, token: &CancelToken) -> Result<String> {
        self.call_string("wiki.wikiToHtml", vec![Value::from(source)], token)
            .await
    }

    async fn get_all_wiki_page_names(&self, token: &CancelToken) -> Result<Vec<String>> {
        let names = self.call_array("wiki.getAllPages", Vec::new(), token).await?;
        Ok(names.iter().map(Value::to_display_string).collect())
    }

    async fn get_wiki_page_info(
        &self,
        name: &str,
        version: Option<i32>,
        token: &CancelToken,
    ) -> Result<WikiPageInfo> {
        self.wiki_page_info(name, version, token).await
    }

    async fn get_wiki_page_info_all_versions(
        &self,
        name: &str,
        token: &CancelToken,
    ) -> Result<Vec<WikiPageInfo>> {
        let latest = self.wiki_page_info(name, None, token).await?;
        let calls = (1..latest.version)
            .map(|version| {
                (
                    "wiki.getPageInfoVersion".to_string(),
                    vec![Value::from(name), Value::from(version)],
                )
            })
            .collect();
        let results = self.multicall_values(calls, token).await?;

        let mut versions = Vec::with_capacity(results.len() + 1);
        for result in &results {
            versions.push(parse_wiki_page_info(result)?);
        }
        versions.push(latest);
        Ok(versions)
    }

    async fn get_wiki_page_content(
        &self,
        name: &str,
        version: Option<i32>,
        token: &CancelToken,
    ) -> Result<String> {
        match version {
            None => self.call_string("wiki.getPage", vec![Value::from(name)], token).await,
            Some(version) => {
                self.call_string(
                    "wiki.getPageVersion",
                    vec![Value::from(name), Value::from(version)],
                    token,
                )
                .await
            }
        }
    }

    async fn get_wiki_page_html(
        &self,
        name: &str,
        version: Option<i32>,
        token: &CancelToken,
    ) -> Result<String> {
        match version {
            None => {
                self.call_string("wiki.getPageHTML", vec![Value::from(name)], token)
                    .await
            }
            Some(version) => {
                self.call_string(
                    "wiki.getPageHTMLVersion",
                    vec![Value::from(name), Value::from(version)],
                    token,
                )
                .await
            }
        }
    }

    async fn get_recent_wiki_changes(
        &self,
        since: DateTime<Utc>,
        token: &CancelToken,
    ) -> Result<Vec<WikiPageInfo>> {
        let changes = self
            .call_array("wiki.getRecentChanges", vec![Value::from(since)], token)
            .await?;
        changes.iter().map(parse_wiki_page_info).collect()
    }

    async fn get_wiki_page(
        &self,
        name: &str,
        version: Option<i32>,
        token: &CancelToken,
    ) -> Result<WikiPage> {
        let page_info = self.wiki_page_info(name, version, token).await?;
        let content = self.get_wiki_page_content(name, version, token).await?;
        let page_html = self.get_wiki_page_html(name, version, token).await?;
        let page_history = self.get_wiki_page_info_all_versions(name, token).await?;
        Ok(WikiPage {
            page_info,
            content,
            page_html,
            page_history,
        })
    }

    async fn put_wiki_page(&self, page: &WikiPage, token: &CancelToken) -> Result<bool> {
        let mut attributes = Vec::new();
        if let Some(comment) = &page.page_info.comment {
            attributes.push(("comment", Value::from(comment.as_str())));
        }
        if let Some(author) = &page.page_info.author {
            attributes.push(("author", Value::from(author.as_str())));
        }
        let params = vec![
            Value::from(page.page_info.page_name.as_str()),
            Value::from(page.content.as_str()),
            Value::struct_of(attributes),
        ];
        self.call_bool("wiki.putPage", params, token).await
    }

    async fn delete_wiki_page(&self, name: &str, token: &CancelToken) -> Result<bool> {
        self.call_bool("wiki.deletePage", vec![Value::from(name)], token)
            .await
    }

    async fn list_wiki_page_attachments(&self, name: &str, token: &CancelToken) -> Result<Vec<String>> {
        let names = self
            .call_array("wiki.listAttachments", vec![Value::from(name)], token)
            .await?;
        Ok(names.iter().map(Value::to_display_string).collect())
    }

    async fn get_wiki_page_attachment_data(
        &self,
        name: &str,
        filename: &str,
        token: &CancelToken,
    ) -> Result<Vec<u8>> {
        let path = format!("{name}/{filename}");
        self.call_bytes("wiki.getAttachment", vec![Value::from(path)], token)
            .await
    }

    async fn put_wiki_page_attachment_data(
        &self,
        name: &str,
        filename: &str,
        description: &str,
        data: Vec<u8>,
        replace: bool,
        token: &CancelToken,
    ) -> Result<String> {
        let params = vec![
            Value::from(name),
            Value::from(filename),
            Value::from(description),
            Value::Base64(data),
            Value::from(replace),
        ];
        self.call_string("wiki.putAttachmentEx", params, token).await
    }
}

fn api_unsupported(message: String) -> JiraError {
    JiraError::RemoteFault {
        code: FAULT_GENERAL_ERROR,
        message,
        method: Some("system.getAPIVersion".to_string()),
    }
}

fn digest_challenge(response: &Response) -> Option<WwwAuthenticateHeader> {
    response
        .headers()
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter(|value| AuthScheme::from_challenge(value) == AuthScheme::Digest)
        .find_map(|value| digest_auth::parse(value).ok())
}

fn fields<'a>(value: &'a Value, len: usize, what: &str) -> Result<&'a [Value]> {
    value
        .as_array()
        .filter(|fields| fields.len() >= len)
        .ok_or_else(|| JiraError::unexpected_response(format!("malformed {what}")))
}

fn required_date(value: &Value, what: &str) -> Result<DateTime<Utc>> {
    value
        .as_date()
        .ok_or_else(|| JiraError::unexpected_response(format!("{what} is not a date")))
}

/// Parses the `[id, created, changed, attributes]` shape of `ticket.get`.
pub(crate) fn parse_ticket(value: &Value) -> Result<Ticket> {
    let fields = fields(value, 4, "ticket")?;
    let id = fields[0]
        .as_i32()
        .ok_or_else(|| JiraError::unexpected_response("ticket id is not an integer"))?;
    let mut ticket = Ticket::with_id(id);
    ticket.set_created(Some(required_date(&fields[1], "ticket creation time")?));
    ticket.set_last_changed(Some(required_date(&fields[2], "ticket change time")?));

    let attributes = fields[3]
        .as_struct()
        .ok_or_else(|| JiraError::unexpected_response("ticket attributes are not a struct"))?;
    for (key, value) in attributes {
        ticket.put_value(key, value.to_display_string());
    }
    Ok(ticket)
}

fn parse_change_log_entry(value: &Value) -> Result<Comment> {
    let fields = fields(value, 5, "change log entry")?;
    Ok(Comment {
        created: fields[0].as_date(),
        author: fields[1].to_display_string(),
        field: fields[2].to_display_string(),
        old_value: fields[3].to_display_string(),
        new_value: fields[4].to_display_string(),
    })
}

fn parse_attachment(value: &Value) -> Result<Attachment> {
    let fields = fields(value, 5, "attachment")?;
    let mut attachment = Attachment::new(fields[0].to_display_string());
    attachment.description = fields[1].to_display_string();
    attachment.size = fields[2].as_i64().unwrap_or_default();
    attachment.created = fields[3].as_date();
    attachment.author = fields[4].to_display_string();
    Ok(attachment)
}

/// Parses a `[name, label, hint, [[field, default, [options]]]]` workflow entry.
fn parse_action(value: &Value) -> Result<Action> {
    let fields = fields(value, 4, "action")?;
    let mut action = Action::new(fields[0].to_display_string());
    action.label = fields[1].as_str().map(str::to_string);
    action.hint = fields[2].as_str().map(str::to_string);

    for input in fields[3].as_array().unwrap_or_default() {
        let input = self::fields(input, 3, "action input")?;
        let mut field = TicketField::new(input[0].to_display_string());
        field.default_value = input[1].as_str().map(str::to_string);
        let options: Vec<String> = input[2]
            .as_array()
            .unwrap_or_default()
            .iter()
            .map(Value::to_display_string)
            .collect();
        field.field_type = if options.is_empty() {
            FieldType::Text
        } else {
            FieldType::Select
        };
        field.options = options;
        action.fields.push(field);
    }
    Ok(action)
}

fn parse_component(value: &Value) -> Component {
    Component {
        name: value.get_str("name").unwrap_or_default(),
        owner: value.get_str("owner"),
        description: value.get_str("description"),
    }
}

fn parse_milestone(value: &Value) -> Milestone {
    Milestone {
        name: value.get_str("name").unwrap_or_default(),
        due: value.get("due").and_then(Value::as_date),
        completed: value.get("completed").and_then(Value::as_date),
        description: value.get_str("description"),
    }
}

fn parse_version(value: &Value) -> Version {
    Version {
        name: value.get_str("name").unwrap_or_default(),
        time: value.get("time").and_then(Value::as_date),
        description: value.get_str("description"),
    }
}

fn parse_ticket_field(value: &Value) -> TicketField {
    let mut field = TicketField::new(value.get_str("name").unwrap_or_default());
    field.field_type = FieldType::from_name(&value.get_str("type").unwrap_or_default());
    field.label = value.get_str("label");
    field.default_value = value.get_str("value");
    field.options = value
        .get("options")
        .and_then(Value::as_array)
        .unwrap_or_default()
        .iter()
        .map(Value::to_display_string)
        .collect();
    field.custom = value.get("custom").and_then(Value::as_bool).unwrap_or_default();
    field.order = value.get("order").and_then(Value::as_i32).unwrap_or_default();
    field.optional = value.get("optional").and_then(Value::as_bool).unwrap_or_default();
    field.width = value.get("width").and_then(Value::as_i32).unwrap_or_default();
    field.height = value.get("height").and_then(Value::as_i32).unwrap_or_default();
    field
}

/// Missing pages and versions are reported as a plain `0`.
fn parse_wiki_page_info(value: &Value) -> Result<WikiPageInfo> {
    if value.as_struct().is_none() {
        return Err(JiraError::InvalidWikiPage(
            "wiki page name or version does not exist".to_string(),
        ));
    }
    Ok(WikiPageInfo {
        page_name: value.get_str("name").unwrap_or_default(),
        version: value.get("version").and_then(Value::as_i32).unwrap_or_default(),
        last_modified: value.get("lastModified").and_then(Value::as_date),
        author: value.get_str("author"),
        comment: value.get_str("comment"),
    })
}
