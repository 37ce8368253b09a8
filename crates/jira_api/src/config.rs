use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::{AuthenticationType, Credentials, CredentialsProvider, StaticCredentials};

pub const DEFAULT_USER_AGENT: &str = "jira-connector";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

pub const CHARSET: &str = "UTF-8";
pub const TIME_ZONE: &str = "UTC";
pub const DEFAULT_USERNAME: &str = "anonymous";

pub const LOGIN_URL: &str = "/login";
pub const XMLRPC_URL: &str = "/xmlrpc";
pub const QUERY_URL: &str = "/query?format=tab";
pub const CUSTOM_QUERY_URL: &str = "/query";
pub const TICKET_URL: &str = "/ticket/";
pub const NEW_TICKET_URL: &str = "/newticket";
pub const TICKET_ATTACHMENT_URL: &str = "/attachment/ticket/";
pub const WIKI_URL: &str = "/wiki/";

/// Wire protocol used to talk to a repository.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    #[default]
    XmlRpc,
    Web,
}

impl AccessMode {
    /// Stable name used when persisting repository settings.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::XmlRpc => "XML_RPC",
            AccessMode::Web => "JIRA_0_9",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AccessMode::XmlRpc => "XML-RPC",
            AccessMode::Web => "Web",
        }
    }

    pub fn from_name(value: &str) -> Option<Self> {
        match value.trim() {
            "XML_RPC" | "XML-RPC" => Some(AccessMode::XmlRpc),
            "JIRA_0_9" | "Web" => Some(AccessMode::Web),
            _ => None,
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub proxy: Option<String>,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        let url: String = url.into();
        Self {
            url: url.trim_end_matches('/').to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            proxy: None,
        }
    }

    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    pub fn with_timeout(mut self, duration: Duration) -> Self {
        self.timeout = duration;
        self
    }

    pub fn with_connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = duration;
        self
    }

    pub fn with_proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy = Some(proxy_url.into());
        self
    }
}

/// A repository endpoint together with the credentials used to reach it.
#[derive(Clone)]
pub struct RepositoryLocation {
    config: ClientConfig,
    credentials: Arc<dyn CredentialsProvider>,
}

impl RepositoryLocation {
    pub fn new(config: ClientConfig, credentials: Arc<dyn CredentialsProvider>) -> Self {
        Self { config, credentials }
    }

    pub fn anonymous(url: impl Into<String>) -> Self {
        Self::new(ClientConfig::new(url), Arc::new(StaticCredentials::anonymous()))
    }

    pub fn with_credentials(url: impl Into<String>, username: &str, password: &str) -> Self {
        Self::new(
            ClientConfig::new(url),
            Arc::new(StaticCredentials::repository(username, password)),
        )
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credentials(&self, kind: AuthenticationType) -> Option<Credentials> {
        self.credentials.credentials(kind)
    }

    pub fn identity(&self) -> Option<Vec<u8>> {
        self.credentials.identity()
    }

    /// Repository credentials, only when a user name is set.
    pub fn repository_credentials(&self) -> Option<Credentials> {
        self.credentials(AuthenticationType::Repository)
            .filter(Credentials::is_valid)
    }

    pub async fn request_credentials(&self, kind: AuthenticationType, message: &str) -> bool {
        self.credentials.request_credentials(kind, message).await
    }
}

impl fmt::Debug for RepositoryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryLocation")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
