//! Error types for the chat session core

use std::time::Duration;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, ChatError>;

/// Errors raised by the conversation controller and its collaborators
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Unknown persona: {key}. Available personas are: {available}")]
    UnknownPersona { key: String, available: String },

    #[error("{0} cannot be empty")]
    EmptyMessage(&'static str),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Completion failed: {0}")]
    Completion(String),

    #[error("Rate limit exceeded, retry in {}s", retry_after.as_secs_f64().ceil().max(1.0))]
    RateLimited { retry_after: Duration },

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Storage warning: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ChatError {
    /// Everything except a configuration error leaves the session usable.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ChatError::Configuration(_))
    }

    /// Errors a front end should display verbatim to the end user.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            ChatError::UnknownPersona { .. }
                | ChatError::EmptyMessage(_)
                | ChatError::Authentication(_)
                | ChatError::RateLimited { .. }
                | ChatError::InvalidParameter { .. }
        )
    }
}

impl From<::config::ConfigError> for ChatError {
    fn from(err: ::config::ConfigError) -> Self {
        ChatError::Configuration(err.to_string())
    }
}
