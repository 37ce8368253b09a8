use chrono::{DateTime, Utc};
use jira_api::Comment;

use crate::attributes::JiraAttribute;

/// A single field change within a revision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Change {
    pub attribute_id: String,
    pub field: String,
    pub old_value: String,
    pub new_value: String,
}

/// Changes made by one author at one point in time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskRevision {
    /// Creation time in epoch milliseconds.
    pub id: String,
    pub date: Option<DateTime<Utc>>,
    pub author: String,
    pub changes: Vec<Change>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskHistory {
    pub repository_url: String,
    pub task_id: String,
    pub revisions: Vec<TaskRevision>,
}

impl TaskHistory {
    /// Groups consecutive change-log entries with the same timestamp into
    /// revisions. Entries for fields without a known attribute only open a
    /// revision.
    pub fn from_comments(repository_url: &str, task_id: &str, comments: &[Comment]) -> Self {
        let mut history = TaskHistory {
            repository_url: repository_url.to_string(),
            task_id: task_id.to_string(),
            revisions: Vec::new(),
        };
        for comment in comments {
            let id = comment
                .created
                .map(|created| created.timestamp_millis())
                .unwrap_or(0)
                .to_string();
            let same_revision = history.revisions.last().is_some_and(|revision| revision.id == id);
            if !same_revision {
                history.revisions.push(TaskRevision {
                    id,
                    date: comment.created,
                    author: comment.author.clone(),
                    changes: Vec::new(),
                });
            }

            let Some(attribute) = JiraAttribute::by_jira_key(&comment.field) else {
                continue;
            };
            if let Some(revision) = history.revisions.last_mut() {
                revision.changes.push(Change {
                    attribute_id: attribute.jira_key().to_string(),
                    field: attribute.label().trim_end_matches(':').to_string(),
                    old_value: comment.old_value.clone(),
                    new_value: comment.new_value.clone(),
                });
            }
        }
        history
    }
}
