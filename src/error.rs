//! Failures reported to the task framework.

use std::fmt;
use std::io;

use jira_api::{ErrorKind, JiraError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConnectorError>;

/// Category of a repository status, used to choose between "fix credentials"
/// and generic error messaging.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusKind {
    LoginError,
    PermissionDenied,
    RepositoryCollision,
    Io,
    Repository,
    Internal,
}

/// Failure status shown to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryStatus {
    pub repository_url: String,
    pub kind: StatusKind,
    pub message: String,
}

impl RepositoryStatus {
    pub fn new(repository_url: impl Into<String>, kind: StatusKind, message: impl Into<String>) -> Self {
        Self {
            repository_url: repository_url.into(),
            kind,
            message: message.into(),
        }
    }

    /// Maps a client failure onto a status. Cancellation is never passed in
    /// here; callers handle it before classification.
    pub fn from_error(err: &JiraError, repository_url: &str) -> Self {
        let (kind, message) = match err.kind() {
            Some(ErrorKind::LoginRequired) => (
                StatusKind::LoginError,
                format!("Unable to login to {repository_url}, please validate credentials"),
            ),
            Some(ErrorKind::PermissionDenied) => (
                StatusKind::PermissionDenied,
                "Permission denied, please check the repository privileges of this account".to_string(),
            ),
            Some(ErrorKind::InvalidTicket) => (
                StatusKind::Io,
                format!("The server returned an unexpected response: {err}"),
            ),
            Some(ErrorKind::EditConflict) => (
                StatusKind::RepositoryCollision,
                "Mid-air collision occurred while submitting, synchronize the task and merge your changes"
                    .to_string(),
            ),
            Some(_) => (StatusKind::Io, err.to_string()),
            None => (StatusKind::Internal, err.to_string()),
        };
        Self::new(repository_url, kind, message)
    }
}

impl fmt::Display for RepositoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.repository_url)
    }
}

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("operation canceled")]
    Canceled,
    #[error("{0}")]
    Repository(RepositoryStatus),
    #[error("invalid ticket id: {0}")]
    InvalidTaskId(String),
    #[error("{0}")]
    Unsupported(String),
    #[error("credentials store error: {0}")]
    Credentials(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl ConnectorError {
    /// Wraps a client failure for `repository_url`; cancellation and
    /// operations the access mode lacks pass through unclassified.
    pub fn from_jira(err: JiraError, repository_url: &str) -> Self {
        match err {
            JiraError::Canceled => ConnectorError::Canceled,
            unsupported @ JiraError::Unsupported { .. } => {
                ConnectorError::Unsupported(unsupported.to_string())
            }
            other => ConnectorError::Repository(RepositoryStatus::from_error(&other, repository_url)),
        }
    }

    pub fn repository(repository_url: &str, message: impl Into<String>) -> Self {
        ConnectorError::Repository(RepositoryStatus::new(
            repository_url,
            StatusKind::Repository,
            message,
        ))
    }

    pub fn status(&self) -> Option<&RepositoryStatus> {
        match self {
            ConnectorError::Repository(status) => Some(status),
            _ => None,
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, ConnectorError::Canceled)
    }
}
