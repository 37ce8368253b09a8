//! Cached repository metadata owned by a client.

use std::collections::HashMap;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use super::{
    Component, Milestone, Priority, Severity, TicketField, TicketResolution, TicketStatus,
    TicketType, Version,
};

/// Repository attributes cached by a client.
///
/// Lists stay `None` until the first refresh. `last_update` is in epoch
/// millis; 0 means never fetched.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientData {
    pub components: Option<Vec<Component>>,
    pub milestones: Option<Vec<Milestone>>,
    pub priorities: Option<Vec<Priority>>,
    pub severities: Option<Vec<Severity>>,
    pub ticket_fields: Option<Vec<TicketField>>,
    pub ticket_resolutions: Option<Vec<TicketResolution>>,
    pub ticket_status: Option<Vec<TicketStatus>>,
    pub ticket_types: Option<Vec<TicketType>>,
    pub versions: Option<Vec<Version>>,
    pub last_update: i64,
    #[serde(skip)]
    pub(crate) field_index: OnceCell<HashMap<String, usize>>,
}

impl ClientData {
    pub fn has_attributes(&self) -> bool {
        self.last_update != 0
    }

    pub fn ticket_field_by_name(&self, name: &str) -> Option<&TicketField> {
        let fields = self.ticket_fields.as_ref()?;
        let index = self.field_index.get_or_init(|| {
            fields
                .iter()
                .enumerate()
                .map(|(i, field)| (field.name.clone(), i))
                .collect()
        });
        index.get(name).and_then(|&i| fields.get(i))
    }

    pub fn priority_names(&self) -> Option<Vec<String>> {
        names(self.priorities.as_deref())
    }

    pub fn resolution_names(&self) -> Option<Vec<String>> {
        names(self.ticket_resolutions.as_deref())
    }
}

fn names(values: Option<&[super::TicketAttribute]>) -> Option<Vec<String>> {
    values.map(|values| values.iter().map(|value| value.name.clone()).collect())
}
