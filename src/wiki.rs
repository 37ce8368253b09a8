use std::sync::Arc;

use jira_api::config::WIKI_URL;
use jira_api::{CancelToken, JiraClient, WikiClient, WikiPage, WikiPageInfo};

use crate::client_manager::ClientManager;
use crate::error::{ConnectorError, Result};
use crate::repository::TaskRepository;

/// Wiki page access for repositories whose client has the wiki capability.
pub struct WikiHandler {
    client_manager: Arc<ClientManager>,
}

impl WikiHandler {
    pub fn new(client_manager: Arc<ClientManager>) -> Self {
        Self { client_manager }
    }

    pub fn wiki_url(&self, repository: &TaskRepository) -> String {
        format!("{}{WIKI_URL}", repository.url())
    }

    pub async fn download_all_page_names(
        &self,
        repository: &TaskRepository,
        token: &CancelToken,
    ) -> Result<Vec<String>> {
        let client = self.client_manager.get_client(repository);
        wiki(client.as_ref(), repository)?
            .get_all_wiki_page_names(token)
            .await
            .map_err(|err| ConnectorError::from_jira(err, repository.url()))
    }

    pub async fn get_wiki_page(
        &self,
        repository: &TaskRepository,
        page_name: &str,
        token: &CancelToken,
    ) -> Result<WikiPage> {
        let client = self.client_manager.get_client(repository);
        wiki(client.as_ref(), repository)?
            .get_wiki_page(page_name, None, token)
            .await
            .map_err(|err| ConnectorError::from_jira(err, repository.url()))
    }

    pub async fn post_wiki_page(
        &self,
        repository: &TaskRepository,
        page: &WikiPage,
        token: &CancelToken,
    ) -> Result<()> {
        let client = self.client_manager.get_client(repository);
        let stored = wiki(client.as_ref(), repository)?
            .put_wiki_page(page, token)
            .await
            .map_err(|err| ConnectorError::from_jira(err, repository.url()))?;
        if !stored {
            return Err(ConnectorError::repository(
                repository.url(),
                "Failed to upload wiki page. No further information available.",
            ));
        }
        log::info!("Stored wiki page {}", page.page_info.page_name);
        Ok(())
    }

    pub async fn get_page_history(
        &self,
        repository: &TaskRepository,
        page_name: &str,
        token: &CancelToken,
    ) -> Result<Vec<WikiPageInfo>> {
        let client = self.client_manager.get_client(repository);
        wiki(client.as_ref(), repository)?
            .get_wiki_page_info_all_versions(page_name, token)
            .await
            .map_err(|err| ConnectorError::from_jira(err, repository.url()))
    }
}

fn wiki<'a>(client: &'a dyn JiraClient, repository: &TaskRepository) -> Result<&'a dyn WikiClient> {
    client.wiki().ok_or_else(|| {
        ConnectorError::Unsupported(format!(
            "The access mode of {} does not support Wiki page editing.",
            repository.url()
        ))
    })
}
