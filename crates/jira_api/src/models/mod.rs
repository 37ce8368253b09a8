mod action;
mod attachment;
mod attribute;
mod client_data;
mod comment;
mod repository_info;
mod ticket;
mod wiki;

pub use action::Action;
pub use attachment::Attachment;
pub use attribute::{
    Component, FieldType, Milestone, Priority, Severity, TicketAttribute, TicketField,
    TicketResolution, TicketStatus, TicketType, Version,
};
pub use client_data::ClientData;
pub use comment::Comment;
pub use repository_info::RepositoryInfo;
pub use ticket::{Key, Ticket};
pub use wiki::{WikiPage, WikiPageInfo};
