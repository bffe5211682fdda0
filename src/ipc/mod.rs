// src/ipc/mod.rs

//! File-based IPC with the front-end: command and result files, event
//! files, and the polling channel that ties them together.

pub mod channel;
pub mod events;
pub mod identity;
pub mod layout;
pub mod protocol;

pub use channel::{CommandChannel, TickReport};
pub use events::{AgentEvent, EventKind, EventSink, FileEventSink};
pub use identity::extract_identity;
pub use layout::IpcLayout;
pub use protocol::{CommandOptions, CommandRequest, CommandResponse, ParseError, parse_command};
