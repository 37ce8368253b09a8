//! Chooses the client implementation for a repository.

use std::sync::Arc;

use tracing::debug;

use crate::cancel::CancelToken;
use crate::client::JiraClient;
use crate::config::{AccessMode, RepositoryLocation};
use crate::error::{JiraError, Result};
use crate::web::WebClient;
use crate::xmlrpc::XmlRpcClient;

/// Creates a client for `mode`; an unknown mode falls back to XML-RPC.
pub fn create_client(location: RepositoryLocation, mode: Option<AccessMode>) -> Arc<dyn JiraClient> {
    match mode.unwrap_or_default() {
        AccessMode::XmlRpc => Arc::new(XmlRpcClient::new(location)),
        AccessMode::Web => Arc::new(WebClient::new(location)),
    }
}

/// Tries every access mode, XML-RPC first, and returns the first one that
/// validates.
///
/// When no mode works the XML-RPC failure is reported, since it carries the
/// more specific diagnosis.
pub async fn probe_client(location: &RepositoryLocation, token: &CancelToken) -> Result<AccessMode> {
    let xmlrpc_error = match XmlRpcClient::new(location.clone()).validate(token).await {
        Ok(_) => return Ok(AccessMode::XmlRpc),
        Err(JiraError::Canceled) => return Err(JiraError::Canceled),
        Err(err) => err,
    };
    debug!(url = location.url(), error = %xmlrpc_error, "XML-RPC access unavailable, trying web access");

    match JiraClient::validate(&WebClient::new(location.clone()), token).await {
        Ok(_) => Ok(AccessMode::Web),
        Err(JiraError::Canceled) => Err(JiraError::Canceled),
        Err(err) => {
            debug!(url = location.url(), error = %err, "web access unavailable");
            Err(xmlrpc_error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_mode_defaults_to_xmlrpc() {
        let location = RepositoryLocation::anonymous("http://localhost/jira");
        assert_eq!(create_client(location.clone(), None).access_mode(), AccessMode::XmlRpc);
        assert_eq!(
            create_client(location, Some(AccessMode::Web)).access_mode(),
            AccessMode::Web
        );
    }

    #[test]
    fn only_xmlrpc_clients_offer_wiki_access() {
        let location = RepositoryLocation::anonymous("http://localhost/jira");
        assert!(create_client(location.clone(), Some(AccessMode::XmlRpc)).wiki().is_some());
        assert!(create_client(location, Some(AccessMode::Web)).wiki().is_none());
    }

    #[tokio::test]
    async fn canceled_probe_is_not_classified() {
        let token = CancelToken::new();
        token.cancel();
        let location = RepositoryLocation::anonymous("http://127.0.0.1:9/jira");
        let err = probe_client(&location, &token).await.unwrap_err();
        assert!(err.is_canceled());
    }
}
