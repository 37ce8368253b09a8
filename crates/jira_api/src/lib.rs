//! Typed client crate for Jira repositories, reached over XML-RPC or the web
//! interface.

pub mod auth;
pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod factory;
pub mod models;
pub mod search;
pub mod util;
pub mod web;
pub mod xmlrpc;

pub use auth::{AuthenticationType, Credentials, CredentialsProvider, StaticCredentials};
pub use cancel::CancelToken;
pub use client::{JiraClient, WikiClient};
pub use config::{AccessMode, ClientConfig, RepositoryLocation};
pub use error::{ErrorKind, JiraError, Result};
pub use factory::{create_client, probe_client};
pub use models::{
    Action, Attachment, ClientData, Comment, Component, FieldType, Key, Milestone, Priority,
    RepositoryInfo, Severity, Ticket, TicketAttribute, TicketField, TicketResolution,
    TicketStatus, TicketType, Version, WikiPage, WikiPageInfo,
};
pub use search::{CompareOperator, Search, SearchFilter};
pub use web::WebClient;
pub use xmlrpc::XmlRpcClient;
