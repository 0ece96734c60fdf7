pub mod admin;
pub mod event;
pub mod ws;

pub use admin::{ApplyResourceResponse, CloseSessionResponse, SessionSummary};
pub use event::{Event, EventType};
