//! Event validation and decoding errors.

use super::error_code::{self, FixloopErrorCode};

/// Errors raised while decoding or validating inbound events.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Validation failed for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Malformed payload for {event_type}: {message}")]
    MalformedPayload { event_type: String, message: String },
}

impl EventError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl FixloopErrorCode for EventError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownEventType(_) => error_code::UNKNOWN_EVENT_TYPE,
            Self::Validation { .. } | Self::MalformedPayload { .. } => {
                error_code::VALIDATION_ERROR
            }
        }
    }
}
