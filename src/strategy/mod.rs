//! Parsing Strategy Module
//!
//! - StreamingParser: builds the element tree from the event stream, either
//!   in the caller's thread or as a pausable producer thread
//! - ParseSession: owns the producer thread and the shared tree

pub mod session;
pub mod streaming;

pub use session::ParseSession;
pub use streaming::{ElementHandler, NoopHandler, ParserState, StreamingParser, Termination};
