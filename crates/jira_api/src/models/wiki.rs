use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiPageInfo {
    pub page_name: String,
    pub version: i32,
    pub last_modified: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub comment: Option<String>,
}

/// A wiki page revision with its source, rendered HTML and, when requested, the revision history.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiPage {
    pub page_info: WikiPageInfo,
    pub content: String,
    pub page_html: String,
    pub page_history: Vec<WikiPageInfo>,
}
