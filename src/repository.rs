//! Repository configuration as seen by the task framework.

use std::fmt;
use std::sync::Arc;

use jira_api::{
    AccessMode, ClientConfig, CredentialsProvider, RepositoryLocation, StaticCredentials,
};

/// A configured repository: its URL, the access mode chosen for it, the
/// credentials used to reach it and the timestamp of its last full sync.
#[derive(Clone)]
pub struct TaskRepository {
    url: String,
    access_mode: Option<AccessMode>,
    user_name: Option<String>,
    synchronization_timestamp: Option<String>,
    proxy: Option<String>,
    credentials: Arc<dyn CredentialsProvider>,
}

impl TaskRepository {
    pub fn new(url: impl Into<String>, credentials: Arc<dyn CredentialsProvider>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            access_mode: None,
            user_name: None,
            synchronization_timestamp: None,
            proxy: None,
            credentials,
        }
    }

    pub fn anonymous(url: impl Into<String>) -> Self {
        Self::new(url, Arc::new(StaticCredentials::anonymous()))
    }

    pub fn with_access_mode(mut self, mode: AccessMode) -> Self {
        self.access_mode = Some(mode);
        self
    }

    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn access_mode(&self) -> Option<AccessMode> {
        self.access_mode
    }

    /// Effective access mode; unset means XML-RPC.
    pub fn effective_access_mode(&self) -> AccessMode {
        self.access_mode.unwrap_or_default()
    }

    pub fn set_access_mode(&mut self, mode: Option<AccessMode>) {
        self.access_mode = mode;
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref().filter(|name| !name.is_empty())
    }

    pub fn synchronization_timestamp(&self) -> Option<&str> {
        self.synchronization_timestamp
            .as_deref()
            .filter(|stamp| !stamp.is_empty())
    }

    pub fn set_synchronization_timestamp(&mut self, stamp: Option<String>) {
        self.synchronization_timestamp = stamp;
    }

    pub fn credentials(&self) -> Arc<dyn CredentialsProvider> {
        Arc::clone(&self.credentials)
    }

    /// Builds the client-side location for this repository.
    pub fn location(&self) -> RepositoryLocation {
        let mut config = ClientConfig::new(self.url.clone());
        if let Some(proxy) = &self.proxy {
            config = config.with_proxy(proxy.clone());
        }
        RepositoryLocation::new(config, Arc::clone(&self.credentials))
    }
}

impl fmt::Debug for TaskRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRepository")
            .field("url", &self.url)
            .field("access_mode", &self.access_mode)
            .field("user_name", &self.user_name)
            .field("synchronization_timestamp", &self.synchronization_timestamp)
            .field("proxy", &self.proxy)
            .finish_non_exhaustive()
    }
}
