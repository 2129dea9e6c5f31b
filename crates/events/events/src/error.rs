//! Event error types.

use thiserror::Error;

/// Result type for event operations.
pub type EventResult<T> = Result<T, EventError>;

/// Error returned by a listener callback.
pub type ListenerError = Box<dyn std::error::Error>;

/// Result type returned by listener callbacks.
pub type ListenerResult = Result<(), ListenerError>;

/// Error type for event handling.
#[derive(Debug, Error)]
pub enum EventError {
    /// A subscription was attempted with a value that cannot be invoked.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A reactive property was declared on a type without an event registry.
    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    /// A listener failed while an event was being dispatched.
    #[error("Listener for '{event}' failed: {message}")]
    ListenerFailed {
        /// Name of the event being dispatched.
        event: String,
        /// Rendered listener error.
        message: String,
    },

    /// A write was attempted through a property that has no setter.
    #[error("Property '{0}' is read-only")]
    ReadOnlyProperty(String),

    /// Registry configuration could not be parsed.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl EventError {
    pub(crate) fn listener_failed(event: &str, err: ListenerError) -> Self {
        EventError::ListenerFailed {
            event: event.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::InvalidConfig(err.to_string())
    }
}
