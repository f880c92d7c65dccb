use thiserror::Error;

/// Errors raised by the event channel.
#[derive(Debug, Error)]
pub enum BusError {
    /// The transport refused or lost the message.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An event could not be encoded into or decoded from an envelope.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An envelope carried a different event type than the one expected.
    #[error("Unexpected event type: expected {expected}, got {actual}")]
    UnexpectedEventType {
        expected: &'static str,
        actual: String,
    },
}

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;
