//! Synchronization engine between a local task list and Jira repositories.
//!
//! [`JiraConnector`] is the entry point: it owns the [`ClientManager`] that
//! hands out one protocol client per repository, turns tickets into
//! [`TaskData`] and back, and drives the pre-sync, query and post-sync phases
//! of a [`SyncSession`].

pub mod attachments;
pub mod attributes;
pub mod client_manager;
pub mod config;
pub mod connector;
pub mod error;
pub mod history;
pub mod repository;
pub mod secrets;
pub mod session;
pub mod task;
pub mod task_data;
pub mod task_data_handler;
pub mod task_mapper;
pub mod wiki;

#[cfg(test)]
mod test_support;

pub use attachments::{AttachmentHandler, AttachmentSource};
pub use client_manager::ClientManager;
pub use config::{ConfigManager, ConnectorConfig};
pub use connector::{JiraConnector, TaskRelation, TASK_ID_PREFIX};
pub use error::{ConnectorError, RepositoryStatus, Result, StatusKind};
pub use history::{Change, TaskHistory, TaskRevision};
pub use repository::TaskRepository;
pub use secrets::KeyringCredentials;
pub use session::{RepositoryQuery, SyncSession, TaskDataCollector};
pub use task::LocalTask;
pub use task_data::TaskData;
pub use task_data_handler::{RepositoryResponse, ResponseKind, TaskDataHandler};
pub use task_mapper::{PriorityLevel, TaskKind, TaskMapper, TaskStatus};
pub use wiki::WikiHandler;

/// Installs the `env_logger` backend with an `info` default that `RUST_LOG`
/// overrides. Calling it again is a no-op.
pub fn init_logging() {
    init_logging_with("info");
}

pub fn init_logging_with(default_filter: &str) {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter),
    )
    .format_timestamp_millis()
    .try_init();

    log::debug!("Logging initialised with default filter {default_filter}");
}
