use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One change-log entry of a ticket.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub created: Option<DateTime<Utc>>,
    pub author: String,
    pub field: String,
    pub old_value: String,
    pub new_value: String,
}
