use async_trait::async_trait;
use jira_api::{AuthenticationType, Credentials, CredentialsProvider};
use keyring::{Entry, Error as KeyringError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{ConnectorError, Result};

const KEYRING_FALLBACK_SERVICE: &str = "org.jira.connector";

/// Interactive callback: (repository url, credential kind, reason) to new
/// credentials, or `None` when the user declines.
pub type CredentialsPrompt =
    Box<dyn Fn(&str, AuthenticationType, &str) -> Option<Credentials> + Send + Sync>;

/// Credentials for one repository, stored in the OS keyring with an
/// in-memory cache in front of it.
#[derive(Clone)]
pub struct KeyringCredentials {
    inner: Arc<KeyringInner>,
}

struct KeyringInner {
    /// `None` keeps everything in memory.
    keyring_service: Option<String>,
    repository_url: String,
    cache: Mutex<HashMap<AuthenticationType, Option<Credentials>>>,
    prompt: Option<CredentialsPrompt>,
}

impl KeyringCredentials {
    pub fn new(service: &str, repository_url: impl Into<String>) -> Self {
        let service = if service.trim().is_empty() {
            KEYRING_FALLBACK_SERVICE.to_string()
        } else {
            service.to_string()
        };
        Self::build(Some(service), repository_url.into(), None)
    }

    /// A store that never touches the OS keyring.
    pub fn in_memory(repository_url: impl Into<String>) -> Self {
        Self::build(None, repository_url.into(), None)
    }

    pub fn with_prompt(self, prompt: CredentialsPrompt) -> Self {
        let inner = match Arc::try_unwrap(self.inner) {
            Ok(inner) => inner,
            Err(shared) => KeyringInner {
                keyring_service: shared.keyring_service.clone(),
                repository_url: shared.repository_url.clone(),
                cache: Mutex::new(shared.cache.lock().map(|c| c.clone()).unwrap_or_default()),
                prompt: None,
            },
        };
        Self::build(inner.keyring_service, inner.repository_url, Some(prompt))
    }

    fn build(
        keyring_service: Option<String>,
        repository_url: String,
        prompt: Option<CredentialsPrompt>,
    ) -> Self {
        KeyringCredentials {
            inner: Arc::new(KeyringInner {
                keyring_service,
                repository_url,
                cache: Mutex::new(HashMap::new()),
                prompt,
            }),
        }
    }

    pub fn repository_url(&self) -> &str {
        &self.inner.repository_url
    }

    pub fn save(&self, kind: AuthenticationType, credentials: &Credentials) -> Result<()> {
        self.persist(kind, Some(credentials))?;
        if let Ok(mut cache) = self.inner.cache.lock() {
            cache.insert(kind, Some(credentials.clone()));
        }
        Ok(())
    }

    pub fn clear(&self, kind: AuthenticationType) -> Result<()> {
        self.persist(kind, None)?;
        if let Ok(mut cache) = self.inner.cache.lock() {
            cache.insert(kind, None);
        }
        Ok(())
    }

    pub fn get(&self, kind: AuthenticationType) -> Result<Option<Credentials>> {
        {
            let cache = self
                .inner
                .cache
                .lock()
                .map_err(|_| ConnectorError::Credentials("credentials cache poisoned".into()))?;
            if let Some(cached) = cache.get(&kind) {
                return Ok(cached.clone());
            }
        }

        let loaded = self.load_from_store(kind)?;
        if let Ok(mut cache) = self.inner.cache.lock() {
            cache.insert(kind, loaded.clone());
        }
        Ok(loaded)
    }

    fn load_from_store(&self, kind: AuthenticationType) -> Result<Option<Credentials>> {
        let Some(entry) = self.entry(kind)? else {
            return Ok(None);
        };
        match entry.get_password() {
            Ok(secret) => {
                let credentials = serde_json::from_str(&secret).map_err(|err| {
                    ConnectorError::Credentials(format!("Failed to decode stored credentials: {err}"))
                })?;
                Ok(Some(credentials))
            }
            Err(KeyringError::NoEntry) => Ok(None),
            Err(err) => Err(ConnectorError::Credentials(format!(
                "Failed to read credentials from keyring: {err}"
            ))),
        }
    }

    fn persist(&self, kind: AuthenticationType, credentials: Option<&Credentials>) -> Result<()> {
        let Some(entry) = self.entry(kind)? else {
            return Ok(());
        };
        match credentials {
            Some(data) => {
                let payload = serde_json::to_string(data).map_err(|err| {
                    ConnectorError::Credentials(format!("Failed to serialize credentials: {err}"))
                })?;
                entry.set_password(&payload).map_err(|err| {
                    ConnectorError::Credentials(format!("Failed to store credentials in keyring: {err}"))
                })
            }
            None => match entry.delete_credential() {
                Ok(()) | Err(KeyringError::NoEntry) => Ok(()),
                Err(err) => Err(ConnectorError::Credentials(format!(
                    "Failed to delete credentials from keyring: {err}"
                ))),
            },
        }
    }

    fn entry(&self, kind: AuthenticationType) -> Result<Option<Entry>> {
        let Some(service) = &self.inner.keyring_service else {
            return Ok(None);
        };
        let account = format!("{}|{}", self.inner.repository_url, kind.as_str());
        Entry::new(service, &account)
            .map(Some)
            .map_err(|err| ConnectorError::Credentials(format!("Failed to open keyring entry: {err}")))
    }
}

#[async_trait]
impl CredentialsProvider for KeyringCredentials {
    fn credentials(&self, kind: AuthenticationType) -> Option<Credentials> {
        match self.get(kind) {
            Ok(credentials) => credentials,
            Err(err) => {
                log::warn!("{err}");
                None
            }
        }
    }

    async fn request_credentials(&self, kind: AuthenticationType, message: &str) -> bool {
        let Some(prompt) = &self.inner.prompt else {
            return false;
        };
        log::info!(
            "Requesting {} credentials for {}",
            kind.as_str(),
            self.inner.repository_url
        );
        match prompt(&self.inner.repository_url, kind, message) {
            Some(credentials) => match self.save(kind, &credentials) {
                Ok(()) => true,
                Err(err) => {
                    log::warn!("{err}");
                    false
                }
            },
            None => false,
        }
    }
}
