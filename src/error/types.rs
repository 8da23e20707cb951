//! Core error types

use thiserror::Error;

/// Errors produced by the mediaflow SDK
#[derive(Error, Debug)]
pub enum MediaError {
    /// A transformation could not be compiled (bad chaining, unterminated
    /// condition, malformed range value, ...)
    #[error("Invalid transformation: {0}")]
    InvalidTransformation(String),

    /// A layer is missing a required field or carries an unusable style
    #[error("Invalid layer: {0}")]
    InvalidLayer(String),

    /// An expression contains an unknown operator or symbol
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    /// A parameter value failed validation (field name + requirement)
    #[error("Invalid value for {field}: {message}")]
    ValidationError {
        /// Parameter that was rejected
        field: &'static str,
        /// What the parameter requires
        message: String,
    },

    /// Missing or malformed credentials/configuration
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Signing or token generation failed
    #[error("Auth error: {0}")]
    AuthError(String),

    /// The remote API answered with a non-success status
    #[error("API error ({status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message reported by the server, if any
        message: String,
    },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// I/O error while reading an upload source
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl MediaError {
    /// Shorthand for a [`MediaError::ValidationError`]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field,
            message: message.into(),
        }
    }
}

/// Result type for mediaflow operations
pub type Result<T> = std::result::Result<T, MediaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_the_field() {
        let err = MediaError::validation("keyframe_interval", "must be positive");
        assert_eq!(
            err.to_string(),
            "Invalid value for keyframe_interval: must be positive"
        );
    }

    #[test]
    fn api_error_carries_status() {
        let err = MediaError::ApiError {
            status: 420,
            message: "rate limited".into(),
        };
        assert!(err.to_string().contains("420"));
    }
}
