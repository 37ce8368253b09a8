use serde::{Deserialize, Serialize};

use super::TicketField;

/// A workflow transition such as `accept` or `resolve`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub label: Option<String>,
    pub hint: Option<String>,
    /// Inputs the action asks for; the first one is the associated input.
    pub fields: Vec<TicketField>,
}

impl Action {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn field(&self) -> Option<&TicketField> {
        self.fields.first()
    }
}
