//! Error types for windowed XML access.
//!
//! Consumer-side failures are returned as [`Error`]. Failures inside the
//! producer thread are never returned; they end the session and show up as
//! [`Termination::Failed`](crate::strategy::Termination::Failed).

use std::io;
use std::time::Duration;

/// All failure modes of the crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A byte range was requested with `end < start`, or past the end of the source.
    #[error("invalid byte range {start}..={end}")]
    InvalidRange { start: u64, end: u64 },

    /// A chunk needed for a read was still missing after a window load.
    ///
    /// This is an internal invariant violation (usually a range wider than
    /// the resident window), never a user error.
    #[error("chunk {index} is not resident after loading the window")]
    BlockNotLoaded { index: u64 },

    /// Reading the underlying file failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The tokenizer rejected the input.
    #[error("malformed XML at byte {offset}: {message}")]
    Tokenization { offset: u64, message: String },

    /// A consumer gave up waiting for the producer.
    #[error("timed out after {waited:?} waiting for {what}")]
    WaitTimeout { what: &'static str, waited: Duration },

    /// The writer reached an element whose closing tag has not been parsed yet.
    #[error("element starting at byte {start} is not fully parsed")]
    UnfinishedElement { start: u64 },

    /// The producer thread of a session was already spawned.
    #[error("parse session already started")]
    AlreadyStarted,
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn tokenization(offset: u64, message: impl Into<String>) -> Self {
        Error::Tokenization {
            offset,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = Error::InvalidRange { start: 10, end: 2 };
        assert_eq!(err.to_string(), "invalid byte range 10..=2");

        let err = Error::tokenization(42, "unexpected end tag");
        assert_eq!(err.to_string(), "malformed XML at byte 42: unexpected end tag");
    }

    #[test]
    fn test_io_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
