//! Maps repository task data onto the framework's task fields.

use std::fmt;

use chrono::{DateTime, Utc};
use jira_api::util::parse_date_str;
use jira_api::Priority;

use crate::attributes::{mapped_attribute, mapped_value};
use crate::task::LocalTask;
use crate::task_data::{keys, TaskData};

const TASK_PRIORITY_LEVELS: f64 = 5.0;

/// The framework's fixed five level priority scale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriorityLevel {
    P1,
    P2,
    #[default]
    P3,
    P4,
    P5,
}

impl PriorityLevel {
    /// Levels outside 1..=5 are clamped onto the scale.
    pub fn from_level(level: i32) -> Self {
        match level {
            i32::MIN..=1 => PriorityLevel::P1,
            2 => PriorityLevel::P2,
            3 => PriorityLevel::P3,
            4 => PriorityLevel::P4,
            _ => PriorityLevel::P5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityLevel::P1 => "P1",
            PriorityLevel::P2 => "P2",
            PriorityLevel::P3 => "P3",
            PriorityLevel::P4 => "P4",
            PriorityLevel::P5 => "P5",
        }
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority level for the stock priority names.
pub fn task_priority(priority: &str) -> PriorityLevel {
    match priority {
        "blocker" => PriorityLevel::P1,
        "critical" => PriorityLevel::P2,
        "major" => PriorityLevel::P3,
        "minor" => PriorityLevel::P4,
        "trivial" => PriorityLevel::P5,
        _ => PriorityLevel::default(),
    }
}

/// Rescales `priority`'s position within the repository's priority range
/// onto the five level scale. Names the repository does not define fall back
/// to [`task_priority`].
pub fn task_priority_from(priority: &str, priorities: Option<&[Priority]>) -> PriorityLevel {
    let Some(priorities) = priorities.filter(|p| !p.is_empty()) else {
        return task_priority(priority);
    };
    let mut sorted = priorities.to_vec();
    sorted.sort();
    let min = i64::from(sorted[0].value);
    let range = i64::from(sorted[sorted.len() - 1].value) - min;
    match sorted.iter().find(|p| p.name == priority) {
        Some(_) if range == 0 => PriorityLevel::P1,
        Some(found) => {
            let relative = (i64::from(found.value) - min) as f64 / range as f64;
            PriorityLevel::from_level((relative * TASK_PRIORITY_LEVELS) as i32 + 1)
        }
        None => task_priority(priority),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Defect,
    Enhancement,
    Task,
    Story,
}

impl TaskKind {
    /// Parses a repository ticket type.
    pub fn from_type(value: &str) -> Option<Self> {
        match value {
            "defect" | "error" => Some(TaskKind::Defect),
            "enhancement" => Some(TaskKind::Enhancement),
            "task" => Some(TaskKind::Task),
            "story" => Some(TaskKind::Story),
            _ => None,
        }
    }

    /// Parses the display form produced by `Display`.
    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            "Defect" => Some(TaskKind::Defect),
            "Enhancement" => Some(TaskKind::Enhancement),
            "Task" => Some(TaskKind::Task),
            "Story" => Some(TaskKind::Story),
            _ => None,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskKind::Defect => "Defect",
            TaskKind::Enhancement => "Enhancement",
            TaskKind::Task => "Task",
            TaskKind::Story => "Story",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    New,
    Assigned,
    Reopened,
    Closed,
}

impl TaskStatus {
    pub fn from_status(value: &str) -> Option<Self> {
        match value {
            "new" => Some(TaskStatus::New),
            "assigned" => Some(TaskStatus::Assigned),
            "reopened" => Some(TaskStatus::Reopened),
            "closed" => Some(TaskStatus::Closed),
            _ => None,
        }
    }

    pub fn as_status_str(&self) -> &'static str {
        match self {
            TaskStatus::New => "new",
            TaskStatus::Assigned => "assigned",
            TaskStatus::Reopened => "reopened",
            TaskStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskStatus::New => "New",
            TaskStatus::Assigned => "Assigned",
            TaskStatus::Reopened => "Reopened",
            TaskStatus::Closed => "Closed",
        })
    }
}

pub fn is_completed(status: &str) -> bool {
    TaskStatus::from_status(status) == Some(TaskStatus::Closed)
}

/// Reads framework fields out of task data. Priorities are rescaled against
/// the repository's priority list when one is known.
pub struct TaskMapper<'a> {
    data: &'a TaskData,
    priorities: Option<Vec<Priority>>,
}

impl<'a> TaskMapper<'a> {
    pub fn new(data: &'a TaskData, priorities: Option<Vec<Priority>>) -> Self {
        Self { data, priorities }
    }

    pub fn task_data(&self) -> &TaskData {
        self.data
    }

    fn optional(&self, key: &str) -> Option<&'a str> {
        mapped_attribute(self.data, key).map(|attribute| attribute.value())
    }

    pub fn summary(&self) -> Option<&'a str> {
        self.optional(keys::SUMMARY)
    }

    pub fn description(&self) -> Option<&'a str> {
        self.optional(keys::DESCRIPTION)
    }

    pub fn owner(&self) -> Option<&'a str> {
        self.optional(keys::USER_ASSIGNED)
    }

    pub fn status(&self) -> Option<&'a str> {
        self.optional(keys::STATUS)
    }

    pub fn priority(&self) -> Option<&'a str> {
        self.optional(keys::PRIORITY)
    }

    pub fn task_key(&self) -> Option<&'a str> {
        self.optional(keys::TASK_KEY)
    }

    pub fn priority_level(&self) -> Option<PriorityLevel> {
        let priority = self.priority()?;
        Some(match &self.priorities {
            Some(priorities) => task_priority_from(priority, Some(priorities)),
            None => task_priority(priority),
        })
    }

    /// Display form of the ticket type; unknown types are kept verbatim.
    pub fn task_kind(&self) -> Option<String> {
        let kind = self.optional(keys::TASK_KIND)?;
        Some(match TaskKind::from_type(kind) {
            Some(kind) => kind.to_string(),
            None => kind.to_string(),
        })
    }

    pub fn creation_date(&self) -> Option<DateTime<Utc>> {
        parse_date_str(mapped_value(self.data, keys::DATE_CREATION))
    }

    pub fn modification_date(&self) -> Option<DateTime<Utc>> {
        parse_date_str(mapped_value(self.data, keys::DATE_MODIFICATION))
    }

    fn priority_string(&self) -> Option<String> {
        match self.priority_level() {
            Some(level) => Some(level.to_string()),
            None => self.priority().map(str::to_string),
        }
    }

    /// Copies every field present in the task data onto `task`. Returns
    /// whether anything changed.
    pub fn apply_to(&self, task: &mut LocalTask) -> bool {
        let mut changed = false;
        if let Some(value) = self.changed_date(task.creation_date, keys::DATE_CREATION) {
            task.creation_date = value;
            changed = true;
        }
        if let Some(value) = self.changed_date(task.modification_date, keys::DATE_MODIFICATION) {
            task.modification_date = value;
            changed = true;
        }
        if let Some(value) = self.changed_text(task.owner.as_deref(), self.owner()) {
            task.owner = value;
            changed = true;
        }
        if mapped_attribute(self.data, keys::PRIORITY).is_some() {
            let priority = self
                .priority_string()
                .unwrap_or_else(|| PriorityLevel::default().to_string());
            if task.priority.as_deref() != Some(priority.as_str()) {
                task.priority = Some(priority);
                changed = true;
            }
        }
        if let Some(value) = self.changed_text(task.summary.as_deref(), self.summary()) {
            task.summary = value;
            changed = true;
        }
        if let Some(value) = self.changed_text(task.task_key.as_deref(), self.task_key()) {
            task.task_key = value;
            changed = true;
        }
        if let Some(kind) = self.task_kind() {
            if task.task_kind.as_deref() != Some(kind.as_str()) {
                task.task_kind = Some(kind);
                changed = true;
            }
        }
        changed
    }

    /// Whether [`TaskMapper::apply_to`] would change `task`.
    pub fn has_changes(&self, task: &LocalTask) -> bool {
        let mut copy = task.clone();
        self.apply_to(&mut copy)
    }

    fn changed_text(&self, current: Option<&str>, new: Option<&str>) -> Option<Option<String>> {
        let new = new?;
        (current != Some(new)).then(|| Some(new.to_string()))
    }

    fn changed_date(
        &self,
        current: Option<DateTime<Utc>>,
        key: &str,
    ) -> Option<Option<DateTime<Utc>>> {
        mapped_attribute(self.data, key)?;
        let new = parse_date_str(mapped_value(self.data, key));
        (current != new).then_some(new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jira_api::TicketAttribute;

    fn priorities() -> Vec<Priority> {
        vec![
            TicketAttribute::new("a", 1),
            TicketAttribute::new("b", 2),
            TicketAttribute::new("c", 3),
        ]
    }

    #[test]
    fn repository_priorities_are_rescaled() {
        let priorities = priorities();
        assert_eq!(task_priority_from("a", Some(&priorities)), PriorityLevel::P1);
        assert_eq!(task_priority_from("b", Some(&priorities)), PriorityLevel::P3);
        assert_eq!(task_priority_from("c", Some(&priorities)), PriorityLevel::P5);
        assert_eq!(task_priority_from("unknown", Some(&priorities)), PriorityLevel::P3);
    }

    #[test]
    fn extreme_priority_values_do_not_overflow() {
        let priorities = vec![
            TicketAttribute::new("lowest", i32::MIN),
            TicketAttribute::new("normal", 0),
            TicketAttribute::new("highest", i32::MAX),
        ];
        assert_eq!(task_priority_from("lowest", Some(&priorities)), PriorityLevel::P1);
        assert_eq!(task_priority_from("normal", Some(&priorities)), PriorityLevel::P3);
        assert_eq!(task_priority_from("highest", Some(&priorities)), PriorityLevel::P5);
    }

    #[test]
    fn unsorted_priorities_are_ordered_by_value() {
        let priorities = vec![
            TicketAttribute::new("trivial", 50),
            TicketAttribute::new("blocker", 10),
            TicketAttribute::new("major", 30),
        ];
        assert_eq!(task_priority_from("blocker", Some(&priorities)), PriorityLevel::P1);
        assert_eq!(task_priority_from("trivial", Some(&priorities)), PriorityLevel::P5);
    }

    #[test]
    fn stock_names_are_used_without_repository_list() {
        assert_eq!(task_priority_from("blocker", None), PriorityLevel::P1);
        assert_eq!(task_priority_from("critical", Some(&[])), PriorityLevel::P2);
        assert_eq!(task_priority("minor"), PriorityLevel::P4);
        assert_eq!(task_priority("trivial"), PriorityLevel::P5);
        assert_eq!(task_priority("whatever"), PriorityLevel::P3);
        assert_eq!(
            task_priority_from("only", Some(&[TicketAttribute::new("only", 4)])),
            PriorityLevel::P1
        );
    }

    #[test]
    fn kinds_and_statuses_parse() {
        assert_eq!(TaskKind::from_type("error"), Some(TaskKind::Defect));
        assert_eq!(TaskKind::from_type("story").map(|k| k.to_string()), Some("Story".into()));
        assert_eq!(TaskKind::from_label("Enhancement"), Some(TaskKind::Enhancement));
        assert_eq!(TaskKind::from_type("question"), None);
        assert!(is_completed("closed"));
        assert!(!is_completed("reopened"));
        assert_eq!(TaskStatus::Assigned.as_status_str(), "assigned");
    }

    #[test]
    fn mapper_applies_fields_once() {
        let mut data = TaskData::new("http://localhost", "3");
        data.create_attribute("summary").set_value("crash");
        data.create_attribute("priority").set_value("c");
        data.create_attribute("type").set_value("defect");
        data.create_attribute("changetime").set_value("1200");

        let mapper = TaskMapper::new(&data, Some(priorities()));
        let mut task = LocalTask::new("http://localhost", "3");
        assert!(mapper.has_changes(&task));
        assert!(mapper.apply_to(&mut task));

        assert_eq!(task.summary.as_deref(), Some("crash"));
        assert_eq!(task.priority.as_deref(), Some("P5"));
        assert_eq!(task.task_kind.as_deref(), Some("Defect"));
        assert_eq!(task.modification_date.map(|d| d.timestamp()), Some(1200));
        assert!(!mapper.has_changes(&task));
        assert!(!mapper.apply_to(&mut task));
    }
}
