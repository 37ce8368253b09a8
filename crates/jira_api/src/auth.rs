//! Credentials model, auth-scheme probing state and the form-based account
//! manager login used as a fallback when XML-RPC access is forbidden.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::WWW_AUTHENTICATE;
use reqwest::{Client as HttpClient, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::config::LOGIN_URL;
use crate::error::{JiraError, Result};

pub const FORM_TOKEN_COOKIE: &str = "jira_form_token";
pub const AUTH_COOKIE: &str = "jira_auth";

/// Kind of credentials a repository interaction may require.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthenticationType {
    Repository,
    Proxy,
    Certificate,
}

impl AuthenticationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthenticationType::Repository => "repository",
            AuthenticationType::Proxy => "proxy",
            AuthenticationType::Certificate => "certificate",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Anonymous access is modelled as an empty user name.
    pub fn is_valid(&self) -> bool {
        !self.username.is_empty()
    }
}

/// Source of credentials for a repository location.
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    fn credentials(&self, kind: AuthenticationType) -> Option<Credentials>;

    /// PEM encoded client identity (certificate and private key).
    fn identity(&self) -> Option<Vec<u8>> {
        None
    }

    /// Asks the environment to supply new credentials of the given kind.
    ///
    /// Returns `false` when the request is declined or unsupported, in which
    /// case the caller surfaces the error that triggered the request.
    async fn request_credentials(&self, kind: AuthenticationType, message: &str) -> bool;
}

/// In-memory credentials that never prompt.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    entries: Mutex<HashMap<AuthenticationType, Credentials>>,
    identity: Option<Vec<u8>>,
}

impl StaticCredentials {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn repository(username: impl Into<String>, password: impl Into<String>) -> Self {
        let provider = Self::default();
        provider.set(AuthenticationType::Repository, Credentials::new(username, password));
        provider
    }

    pub fn with_identity(mut self, pem: Vec<u8>) -> Self {
        self.identity = Some(pem);
        self
    }

    pub fn set(&self, kind: AuthenticationType, credentials: Credentials) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(kind, credentials);
        }
    }
}

#[async_trait]
impl CredentialsProvider for StaticCredentials {
    fn credentials(&self, kind: AuthenticationType) -> Option<Credentials> {
        self.entries.lock().ok()?.get(&kind).cloned()
    }

    fn identity(&self) -> Option<Vec<u8>> {
        self.identity.clone()
    }

    async fn request_credentials(&self, _kind: AuthenticationType, _message: &str) -> bool {
        false
    }
}

/// Authentication scheme advertised by the server in response to an
/// unauthenticated probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthScheme {
    Basic,
    Digest,
    Ntlm,
    Other,
}

impl AuthScheme {
    pub fn from_challenge(challenge: &str) -> Self {
        let scheme = challenge
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match scheme.as_str() {
            "basic" => AuthScheme::Basic,
            "digest" => AuthScheme::Digest,
            "ntlm" | "negotiate" => AuthScheme::Ntlm,
            _ => AuthScheme::Other,
        }
    }

    pub fn from_response(response: &reqwest::Response) -> Option<Self> {
        response
            .headers()
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(Self::from_challenge)
            .min_by_key(|scheme| match scheme {
                AuthScheme::Digest => 0,
                AuthScheme::Basic => 1,
                AuthScheme::Ntlm => 2,
                AuthScheme::Other => 3,
            })
    }
}

/// Reads a cookie value for `url` from the shared jar.
pub fn cookie_value(jar: &Jar, url: &Url, name: &str) -> Option<String> {
    let header = jar.cookies(url)?;
    let header = header.to_str().ok()?;
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Logs in through the account manager login form.
///
/// A successful login answers with a redirect; a 200 means the form was
/// displayed again because the credentials were rejected. The form token is
/// bound to a cookie that the login request itself may set, so when no token
/// was known before the post the login is repeated once with the new token.
pub async fn authenticate_account_manager(
    http: &HttpClient,
    jar: &Jar,
    repository_url: &str,
    credentials: &Credentials,
    token: &CancelToken,
) -> Result<()> {
    let base = parse_url(repository_url)?;
    let form_token = cookie_value(jar, &base, FORM_TOKEN_COOKIE).unwrap_or_default();
    post_login_form(http, repository_url, credentials, &form_token, token).await?;

    let new_token = cookie_value(jar, &base, FORM_TOKEN_COOKIE).unwrap_or_default();
    if form_token.is_empty() && form_token != new_token {
        debug!(url = repository_url, "form token changed during login, retrying");
        post_login_form(http, repository_url, credentials, &new_token, token).await?;
    }
    Ok(())
}

/// Fails unless the login cookie has been issued.
pub fn validate_authentication_state(jar: &Jar, repository_url: &str) -> Result<()> {
    let base = parse_url(repository_url)?;
    match cookie_value(jar, &base, AUTH_COOKIE) {
        Some(_) => Ok(()),
        None => Err(JiraError::login_required(repository_url)),
    }
}

async fn post_login_form(
    http: &HttpClient,
    repository_url: &str,
    credentials: &Credentials,
    form_token: &str,
    token: &CancelToken,
) -> Result<()> {
    let url = format!("{}{}", repository_url.trim_end_matches('/'), LOGIN_URL);
    debug!(url = repository_url, "attempting form-based account manager authentication");
    let request = http.post(&url).form(&[
        ("referer", ""),
        ("user", credentials.username.as_str()),
        ("password", credentials.password.as_str()),
        ("__FORM_TOKEN", form_token),
    ]);
    let response = token.run(request.send()).await??;
    let status = response.status();
    debug!(url = repository_url, %status, "received account manager response");
    if status == StatusCode::OK {
        return Err(JiraError::login_required(repository_url));
    }
    if status.is_client_error() || status.is_server_error() {
        return Err(JiraError::Http {
            status,
            message: format!("account manager login failed for {repository_url}"),
        });
    }
    Ok(())
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|err| JiraError::ConnectionFailure(format!("invalid url {url}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_require_user_name() {
        assert!(!Credentials::new("", "secret").is_valid());
        assert!(Credentials::new("alice", "").is_valid());
    }

    #[test]
    fn challenge_schemes_are_detected() {
        assert_eq!(AuthScheme::from_challenge("Basic realm=\"x\""), AuthScheme::Basic);
        assert_eq!(
            AuthScheme::from_challenge("Digest realm=\"x\", nonce=\"y\""),
            AuthScheme::Digest
        );
        assert_eq!(AuthScheme::from_challenge("NTLM"), AuthScheme::Ntlm);
        assert_eq!(AuthScheme::from_challenge("Bearer"), AuthScheme::Other);
    }

    #[test]
    fn cookie_values_are_read_from_jar() {
        let jar = Jar::default();
        let url = Url::parse("http://localhost/jira").expect("url");
        jar.add_cookie_str("jira_form_token=abc123; Path=/", &url);
        jar.add_cookie_str("jira_auth=deadbeef; Path=/", &url);

        assert_eq!(cookie_value(&jar, &url, FORM_TOKEN_COOKIE).as_deref(), Some("abc123"));
        assert!(validate_authentication_state(&jar, "http://localhost/jira").is_ok());
        assert!(cookie_value(&jar, &url, "missing").is_none());
    }

    #[test]
    fn missing_auth_cookie_is_a_login_failure() {
        let jar = Jar::default();
        let err = validate_authentication_state(&jar, "http://localhost/jira").unwrap_err();
        assert!(matches!(err, JiraError::LoginRequired { .. }));
    }

    #[tokio::test]
    async fn static_credentials_never_prompt() {
        let provider = StaticCredentials::repository("bob", "pw");
        assert_eq!(
            provider.credentials(AuthenticationType::Repository),
            Some(Credentials::new("bob", "pw"))
        );
        assert!(provider.credentials(AuthenticationType::Proxy).is_none());
        assert!(!provider.request_credentials(AuthenticationType::Repository, "again").await);
    }
}
