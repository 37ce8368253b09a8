//! Error model used by Jira client operations.

use std::error::Error as StdError;
use std::io;

use reqwest::StatusCode;
use thiserror::Error;

use crate::auth::AuthenticationType;

pub type Result<T> = std::result::Result<T, JiraError>;

/// Classification of a failed repository operation.
///
/// Cancellation is deliberately absent: a canceled operation is reported as
/// [`JiraError::Canceled`] and never mapped onto one of these kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    LoginRequired,
    PermissionDenied,
    ProxyAuthRequired,
    CertificateFailure,
    MethodNotFound,
    EditConflict,
    InvalidTicket,
    InvalidWikiPage,
    RemoteFault,
    ConnectionFailure,
}

/// Failures a repository client can surface.
#[derive(Debug, Error)]
pub enum JiraError {
    #[error("operation canceled")]
    Canceled,
    #[error("authentication credentials for {url} are missing or invalid")]
    LoginRequired { url: String, ntlm: bool },
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("proxy authentication required")]
    ProxyAuthRequired,
    #[error("certificate failure: {0}")]
    CertificateFailure(String),
    #[error("no such method {}: {message}", method.as_deref().unwrap_or("<unknown>"))]
    MethodNotFound {
        method: Option<String>,
        message: String,
    },
    #[error("mid-air collision: {0}")]
    EditConflict(String),
    #[error("invalid ticket: {0}")]
    InvalidTicket(String),
    #[error("invalid wiki page: {0}")]
    InvalidWikiPage(String),
    #[error("remote fault {code}: {message}")]
    RemoteFault {
        code: i32,
        message: String,
        method: Option<String>,
    },
    #[error("http {status}: {message}")]
    Http { status: StatusCode, message: String },
    #[error("connection failure: {0}")]
    ConnectionFailure(String),
    #[error("{operation} is not supported by this repository access type")]
    Unsupported { operation: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl JiraError {
    pub fn login_required(url: impl Into<String>) -> Self {
        JiraError::LoginRequired {
            url: url.into(),
            ntlm: false,
        }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        JiraError::Unsupported {
            operation: operation.into(),
        }
    }

    pub fn remote(code: i32, message: impl Into<String>) -> Self {
        JiraError::RemoteFault {
            code,
            message: message.into(),
            method: None,
        }
    }

    /// Malformed response shapes are reported the same way as invalid tickets.
    pub fn unexpected_response(detail: impl Into<String>) -> Self {
        JiraError::InvalidTicket(format!("unexpected response: {}", detail.into()))
    }

    /// Returns the error kind, or `None` for cancellation.
    pub fn kind(&self) -> Option<ErrorKind> {
        let kind = match self {
            JiraError::Canceled => return None,
            JiraError::LoginRequired { .. } => ErrorKind::LoginRequired,
            JiraError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            JiraError::ProxyAuthRequired => ErrorKind::ProxyAuthRequired,
            JiraError::CertificateFailure(_) => ErrorKind::CertificateFailure,
            JiraError::MethodNotFound { .. } => ErrorKind::MethodNotFound,
            JiraError::EditConflict(_) => ErrorKind::EditConflict,
            JiraError::InvalidTicket(_) => ErrorKind::InvalidTicket,
            JiraError::InvalidWikiPage(_) => ErrorKind::InvalidWikiPage,
            JiraError::RemoteFault { .. } | JiraError::Unsupported { .. } => ErrorKind::RemoteFault,
            JiraError::Http { .. } | JiraError::ConnectionFailure(_) | JiraError::Io(_) => {
                ErrorKind::ConnectionFailure
            }
        };
        Some(kind)
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, JiraError::Canceled)
    }

    /// The credential type that has to be re-requested to recover from this error.
    pub fn recovery(&self) -> Option<AuthenticationType> {
        match self {
            JiraError::LoginRequired { .. } | JiraError::PermissionDenied(_) => {
                Some(AuthenticationType::Repository)
            }
            JiraError::ProxyAuthRequired => Some(AuthenticationType::Proxy),
            JiraError::CertificateFailure(_) => Some(AuthenticationType::Certificate),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for JiraError {
    /// Classifies transport errors at the point of occurrence.
    fn from(err: reqwest::Error) -> Self {
        if is_certificate_error(&err) {
            JiraError::CertificateFailure(err.to_string())
        } else if err.is_timeout() {
            JiraError::ConnectionFailure(format!("request timed out: {err}"))
        } else if err.is_status() {
            let status = err.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            JiraError::Http {
                status,
                message: err.to_string(),
            }
        } else {
            JiraError::ConnectionFailure(err.to_string())
        }
    }
}

impl From<roxmltree::Error> for JiraError {
    fn from(err: roxmltree::Error) -> Self {
        JiraError::unexpected_response(err.to_string())
    }
}

impl From<base64::DecodeError> for JiraError {
    fn from(err: base64::DecodeError) -> Self {
        JiraError::unexpected_response(format!("invalid base64 payload: {err}"))
    }
}

fn is_certificate_error(err: &reqwest::Error) -> bool {
    let mut source: Option<&dyn StdError> = err.source();
    while let Some(cause) = source {
        let text = cause.to_string().to_ascii_lowercase();
        if text.contains("certificate") || text.contains("unknownissuer") {
            return true;
        }
        source = cause.source();
    }
    false
}
