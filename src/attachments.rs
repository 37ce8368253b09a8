//! Attachment download and upload.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use jira_api::{AccessMode, CancelToken, Ticket};

use crate::client_manager::ClientManager;
use crate::error::{ConnectorError, Result};
use crate::repository::TaskRepository;
use crate::task_data::TaskAttachment;
use crate::task_data_handler::parse_ticket_id;

/// Content to attach to a ticket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachmentSource {
    pub filename: String,
    pub description: String,
    pub content_type: String,
    pub replace_existing: bool,
    pub data: Vec<u8>,
}

impl AttachmentSource {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        let filename = filename.into();
        let content_type = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .to_string();
        Self {
            filename,
            description: String::new(),
            content_type,
            replace_existing: false,
            data,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Reads a local file; the attachment is named after it.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(filename, data))
    }
}

pub struct AttachmentHandler {
    client_manager: Arc<ClientManager>,
}

impl AttachmentHandler {
    pub fn new(client_manager: Arc<ClientManager>) -> Self {
        Self { client_manager }
    }

    /// Only the XML-RPC variant transfers attachment content.
    pub fn has_attachment_support(repository: &TaskRepository) -> bool {
        repository.effective_access_mode() == AccessMode::XmlRpc
    }

    pub fn can_get_content(&self, repository: &TaskRepository) -> bool {
        Self::has_attachment_support(repository)
    }

    pub fn can_post_content(&self, repository: &TaskRepository) -> bool {
        Self::has_attachment_support(repository)
    }

    pub async fn get_content(
        &self,
        repository: &TaskRepository,
        task_id: &str,
        attachment: &TaskAttachment,
        token: &CancelToken,
    ) -> Result<Vec<u8>> {
        let id = parse_ticket_id(task_id)?;
        if attachment.filename.is_empty() {
            return Err(ConnectorError::repository(
                repository.url(),
                format!(
                    "Attachment download from {} failed, missing attachment filename.",
                    repository.url()
                ),
            ));
        }
        let client = self.client_manager.get_client(repository);
        client
            .get_attachment_data(id, &attachment.filename, token)
            .await
            .map_err(|err| ConnectorError::from_jira(err, repository.url()))
    }

    /// Downloads the attachment into `directory` and returns the file written.
    pub async fn download_to(
        &self,
        repository: &TaskRepository,
        task_id: &str,
        attachment: &TaskAttachment,
        directory: &Path,
        token: &CancelToken,
    ) -> Result<PathBuf> {
        let data = self.get_content(repository, task_id, attachment, token).await?;
        tokio::fs::create_dir_all(directory).await?;
        let path = directory.join(&attachment.filename);
        tokio::fs::write(&path, data).await?;
        log::debug!("Saved attachment {} to {}", attachment.filename, path.display());
        Ok(path)
    }

    /// Uploads `source` and posts `comment` on the ticket when non-empty.
    pub async fn post_content(
        &self,
        repository: &TaskRepository,
        task_id: &str,
        source: AttachmentSource,
        comment: Option<&str>,
        token: &CancelToken,
    ) -> Result<()> {
        if !Self::has_attachment_support(repository) {
            return Err(ConnectorError::Unsupported(
                "Attachments are not supported by this repository access type".into(),
            ));
        }
        let id = parse_ticket_id(task_id)?;
        let url = repository.url();
        let client = self.client_manager.get_client(repository);
        client
            .put_attachment_data(
                id,
                &source.filename,
                &source.description,
                source.data,
                source.replace_existing,
                token,
            )
            .await
            .map_err(|err| ConnectorError::from_jira(err, url))?;
        log::info!("Attached {} to ticket #{id}", source.filename);

        if let Some(comment) = comment.filter(|comment| !comment.is_empty()) {
            client
                .update_ticket(&Ticket::with_id(id), comment, token)
                .await
                .map_err(|err| ConnectorError::from_jira(err, url))?;
        }
        Ok(())
    }
}
