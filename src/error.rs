//! Error types for the stones crate

use thiserror::Error;

/// Main error type for the stones crate
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid action: cannot take {take} with {stones} stones remaining")]
    InvalidAction { take: u8, stones: u8 },

    #[error("illegal move: {actor} cannot take {take} with {stones} stones remaining")]
    IllegalMove { actor: String, take: u8, stones: u8 },

    #[error("game already over")]
    GameOver,

    #[error("malformed message '{line}'")]
    MalformedMessage { line: String },

    #[error("{kind} expects {expected} fields, got {got}")]
    FieldCountMismatch {
        kind: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("cannot parse {field} from '{value}'")]
    ValueParseError { field: &'static str, value: String },

    #[error("line of {len} bytes exceeds limit of {limit} bytes")]
    OversizedMessage { limit: usize, len: usize },

    #[error("table chunk out of sequence: expected {expected}, got {got}")]
    ChunkSequence { expected: u16, got: u16 },

    #[error("no ACK for table upload within {millis} ms")]
    UploadTimeout { millis: u128 },

    #[error("no response from device within {millis} ms")]
    ResponseTimeout { millis: u128 },

    #[error("device rejected table upload: {reason}")]
    UploadRejected { reason: String },

    #[error("device reported error: {reason}")]
    DeviceError { reason: String },

    #[error("device reports {reported} stones after move, session has {expected}")]
    StateMismatch { expected: u8, reported: u8 },

    #[error("operation '{operation}' not allowed in phase {phase}")]
    OutOfTurn {
        operation: &'static str,
        phase: String,
    },

    #[error("channel closed")]
    ChannelClosed,

    #[error("session closed")]
    SessionClosed,

    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("invalid policy table: {message}")]
    InvalidTable { message: String },

    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to {operation}: {message}")]
    SerializationContext { operation: String, message: String },

    #[error("progress bar template error: {message}")]
    ProgressBarTemplate { message: String },
}

impl Error {
    /// Protocol-level failures that are handled by dropping one line and
    /// resynchronizing on the next terminator.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::MalformedMessage { .. }
                | Error::FieldCountMismatch { .. }
                | Error::ValueParseError { .. }
                | Error::OversizedMessage { .. }
        )
    }

    /// Failures that end the current session.
    pub fn is_fatal_to_session(&self) -> bool {
        matches!(self, Error::ChannelClosed | Error::SessionClosed)
    }
}

/// Convenience type alias for Results using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io {
            operation: "IO operation".to_string(),
            source,
        }
    }
}
