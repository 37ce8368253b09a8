//! One live client per repository plus the on-disk attribute cache.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use jira_api::{create_client, AccessMode, ClientData, JiraClient, RepositoryLocation};

use crate::repository::TaskRepository;

/// Builds a client for a location and access mode.
pub type ClientFactory =
    Box<dyn Fn(RepositoryLocation, Option<AccessMode>) -> Arc<dyn JiraClient> + Send + Sync>;

struct ClientEntry {
    access_mode: Option<AccessMode>,
    client: Arc<dyn JiraClient>,
}

/// Owns the client of every configured repository and persists their
/// cached attributes, keyed by repository URL.
pub struct ClientManager {
    cache_file: Option<PathBuf>,
    factory: ClientFactory,
    clients: Mutex<HashMap<String, ClientEntry>>,
    cached_data: Mutex<HashMap<String, ClientData>>,
}

impl ClientManager {
    /// Creates a manager and restores the attribute cache from `cache_file`.
    pub fn new(cache_file: Option<PathBuf>) -> Self {
        Self::with_factory(cache_file, Box::new(create_client))
    }

    pub fn with_factory(cache_file: Option<PathBuf>, factory: ClientFactory) -> Self {
        let manager = Self {
            cache_file,
            factory,
            clients: Mutex::new(HashMap::new()),
            cached_data: Mutex::new(HashMap::new()),
        };
        manager.read_cache();
        manager
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<String, ClientEntry>> {
        match self.clients.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn cached_data(&self) -> MutexGuard<'_, HashMap<String, ClientData>> {
        match self.cached_data.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Returns the repository's client, creating it on first use or when the
    /// configured access mode changed. A new client starts from the cached
    /// attributes.
    pub fn get_client(&self, repository: &TaskRepository) -> Arc<dyn JiraClient> {
        let mut clients = self.clients();
        if let Some(entry) = clients.get(repository.url()) {
            if entry.access_mode == repository.access_mode() {
                return Arc::clone(&entry.client);
            }
            log::debug!(
                "Access mode of {} changed to {}, recreating client",
                repository.url(),
                repository.effective_access_mode()
            );
        }

        let client = (self.factory)(repository.location(), repository.access_mode());
        if let Some(data) = self.cached_data().get(repository.url()) {
            client.set_data(data.clone());
        }
        clients.insert(
            repository.url().to_string(),
            ClientEntry {
                access_mode: repository.access_mode(),
                client: Arc::clone(&client),
            },
        );
        client
    }

    /// Drops every live client; cached attributes are kept for the next ones.
    pub fn clear_clients(&self) {
        let mut clients = self.clients();
        let mut cached = self.cached_data();
        for (url, entry) in clients.drain() {
            let data = entry.client.data();
            if data.has_attributes() {
                cached.insert(url, (*data).clone());
            }
        }
    }

    pub fn repository_removed(&self, repository_url: &str) {
        self.clients().remove(repository_url);
        self.cached_data().remove(repository_url);
    }

    /// Forgets the client so that the next lookup picks up new settings.
    pub fn repository_changed(&self, repository: &TaskRepository) {
        if let Some(entry) = self.clients().remove(repository.url()) {
            let data = entry.client.data();
            if data.has_attributes() {
                self.cached_data()
                    .insert(repository.url().to_string(), (*data).clone());
            }
        }
    }

    /// Restores the cache. A missing or unreadable file leaves it empty.
    pub fn read_cache(&self) {
        let Some(path) = &self.cache_file else {
            return;
        };
        let restored = match load_cache(path) {
            Ok(restored) => restored,
            Err(err) => {
                log::warn!("Ignoring attribute cache {}: {err}", path.display());
                BTreeMap::new()
            }
        };
        log::debug!("Restored attributes of {} repositories", restored.len());
        self.cached_data().extend(restored);
    }

    /// Writes the attributes of every client that has fetched them.
    pub fn write_cache(&self) -> std::io::Result<()> {
        let Some(path) = &self.cache_file else {
            return Ok(());
        };

        let mut snapshot: BTreeMap<String, ClientData> = self
            .cached_data()
            .iter()
            .map(|(url, data)| (url.clone(), data.clone()))
            .collect();
        for (url, entry) in self.clients().iter() {
            let data = entry.client.data();
            if data.has_attributes() {
                snapshot.insert(url.clone(), (*data).clone());
            }
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&snapshot)?;
        fs::write(path, content)?;
        log::debug!("Wrote attributes of {} repositories", snapshot.len());
        Ok(())
    }
}

fn load_cache(path: &Path) -> std::io::Result<BTreeMap<String, ClientData>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{repository, FakeClient};
    use jira_api::{CancelToken, Milestone};
    use std::env;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        env::temp_dir().join(format!("jira-connector-tests-{name}-{nanos}/attributes.json"))
    }

    fn counting_manager(cache_file: Option<PathBuf>, created: Arc<AtomicUsize>) -> ClientManager {
        ClientManager::with_factory(
            cache_file,
            Box::new(move |_location, mode| {
                created.fetch_add(1, Ordering::SeqCst);
                let client = FakeClient::new(mode.unwrap_or_default());
                client.state().attributes.milestones = Some(vec![Milestone {
                    name: "m1".into(),
                    ..Milestone::default()
                }]);
                Arc::new(client)
            }),
        )
    }

    #[test]
    fn one_client_per_repository() {
        let created = Arc::new(AtomicUsize::new(0));
        let manager = counting_manager(None, Arc::clone(&created));
        let repo = repository(AccessMode::XmlRpc);

        let first = manager.get_client(&repo);
        let second = manager.get_client(&repo);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(created.load(Ordering::SeqCst), 1);

        let web = repository(AccessMode::Web);
        assert_eq!(manager.get_client(&web).access_mode(), AccessMode::Web);
        assert_eq!(created.load(Ordering::SeqCst), 2);

        manager.clear_clients();
        manager.get_client(&web);
        assert_eq!(created.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn without_cache_file_nothing_is_written() {
        let manager = counting_manager(None, Arc::new(AtomicUsize::new(0)));
        let client = manager.get_client(&repository(AccessMode::XmlRpc));
        assert!(client.milestones().is_none());
        manager.write_cache().expect("no-op");
        assert!(client.milestones().is_none());
    }

    #[tokio::test]
    async fn written_cache_is_restored_by_new_manager() {
        let path = unique_path("cache");
        let repo = repository(AccessMode::XmlRpc);

        let manager = counting_manager(Some(path.clone()), Arc::new(AtomicUsize::new(0)));
        let client = manager.get_client(&repo);
        assert!(client.milestones().is_none());
        client
            .update_attributes(false, &CancelToken::new())
            .await
            .expect("attributes");
        let milestones = client.milestones();
        assert!(milestones.is_some());
        manager.write_cache().expect("write cache");

        let restored = counting_manager(Some(path.clone()), Arc::new(AtomicUsize::new(0)));
        let client = restored.get_client(&repo);
        assert!(client.has_attributes());
        assert_eq!(client.milestones(), milestones);

        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn corrupt_cache_falls_back_to_empty() {
        let path = unique_path("corrupt");
        let parent = path.parent().expect("parent must exist").to_path_buf();
        fs::create_dir_all(&parent).expect("create temp directory");
        fs::write(&path, "{ not json").expect("write corrupt cache");

        let manager = counting_manager(Some(path), Arc::new(AtomicUsize::new(0)));
        let client = manager.get_client(&repository(AccessMode::XmlRpc));
        assert!(!client.has_attributes());

        let _ = fs::remove_dir_all(parent);
    }

    #[tokio::test]
    async fn removed_repository_loses_cached_attributes() {
        let manager = counting_manager(None, Arc::new(AtomicUsize::new(0)));
        let repo = repository(AccessMode::XmlRpc);
        manager
            .get_client(&repo)
            .update_attributes(false, &CancelToken::new())
            .await
            .expect("attributes");

        manager.repository_changed(&repo);
        assert!(manager.get_client(&repo).has_attributes());

        manager.repository_removed(repo.url());
        assert!(!manager.get_client(&repo).has_attributes());
    }
}
