//! State shared by the phases of one synchronization run.

use std::collections::BTreeSet;

use jira_api::config::QUERY_URL;
use jira_api::Search;

use crate::error::RepositoryStatus;
use crate::repository::TaskRepository;
use crate::task::LocalTask;
use crate::task_data::TaskData;

/// Receives the task data produced by a query.
pub trait TaskDataCollector {
    fn accept(&mut self, data: TaskData);
}

impl TaskDataCollector for Vec<TaskData> {
    fn accept(&mut self, data: TaskData) {
        self.push(data);
    }
}

/// A saved query, identified by its repository URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryQuery {
    pub title: String,
    pub url: String,
}

impl RepositoryQuery {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }

    /// The search encoded after the query path, or `None` when the URL is
    /// not a ticket query.
    pub fn search(&self) -> Option<Search> {
        let start = self.url.find(QUERY_URL)? + QUERY_URL.len();
        Some(Search::from_url(&self.url[start..]))
    }
}

/// One synchronization run over a repository.
#[derive(Debug)]
pub struct SyncSession {
    pub repository: TaskRepository,
    pub tasks: Vec<LocalTask>,
    full: bool,
    stale: BTreeSet<String>,
    needs_perform_queries: bool,
    /// Tasks whose data was updated during the run.
    pub changed_tasks: Vec<LocalTask>,
    /// First failure of the run, if any.
    pub status: Option<RepositoryStatus>,
}

impl SyncSession {
    pub fn new(repository: TaskRepository, tasks: Vec<LocalTask>, full: bool) -> Self {
        Self {
            repository,
            tasks,
            full,
            stale: BTreeSet::new(),
            needs_perform_queries: true,
            changed_tasks: Vec::new(),
            status: None,
        }
    }

    pub fn is_full_synchronization(&self) -> bool {
        self.full
    }

    pub fn mark_stale(&mut self, task_id: &str) {
        self.stale.insert(task_id.to_string());
    }

    pub fn is_stale(&self, task_id: &str) -> bool {
        self.stale.contains(task_id)
    }

    pub fn stale_tasks(&self) -> &BTreeSet<String> {
        &self.stale
    }

    pub fn needs_perform_queries(&self) -> bool {
        self.needs_perform_queries
    }

    pub fn set_needs_perform_queries(&mut self, needed: bool) {
        self.needs_perform_queries = needed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_url_yields_search() {
        let query = RepositoryQuery::new(
            "mine",
            "http://localhost/jira/query?format=tab&owner=me&order=priority",
        );
        let search = query.search().expect("valid query");
        assert_eq!(search.order_by(), Some("priority"));
        assert_eq!(search.filters().len(), 1);

        assert!(RepositoryQuery::new("broken", "http://localhost/jira/report/1")
            .search()
            .is_none());
    }

    #[test]
    fn stale_marks_are_per_task() {
        let repo = TaskRepository::anonymous("http://localhost/jira");
        let mut session = SyncSession::new(repo, vec![LocalTask::new("http://localhost/jira", "1")], true);
        assert!(session.needs_perform_queries());
        session.mark_stale("1");
        session.mark_stale("1");
        assert!(session.is_stale("1"));
        assert!(!session.is_stale("2"));
        assert_eq!(session.stale_tasks().len(), 1);
    }
}
