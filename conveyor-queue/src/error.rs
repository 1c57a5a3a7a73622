//! Error types for queue operations.

use thiserror::Error;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Queue-specific errors.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The backing store is unreachable or the connection was lost
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] redis::RedisError),

    /// Payload could not be serialized on write
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A stored record is corrupt
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// A registered handler returned an error
    #[error("Handler failed: {0}")]
    Handler(String),

    /// No handler registered for a task type
    #[error("No handler registered for task type: {0}")]
    UnregisteredType(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("Queue error: {0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QueueError::UnregisteredType("unknown_x".to_string());
        assert!(format!("{}", err).contains("unknown_x"));

        let err = QueueError::Serialization("bad payload".to_string());
        assert!(format!("{}", err).contains("bad payload"));
    }

    #[test]
    fn test_handler_error_display() {
        let err = QueueError::Handler("smtp timeout".to_string());
        assert_eq!(format!("{}", err), "Handler failed: smtp timeout");
    }
}
