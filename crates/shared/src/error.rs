//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
///
/// Library crates keep their own precise error enums and convert into this
/// one at the edge, where a process exit code or a stable error code is needed.
#[derive(Debug, Error)]
pub enum AppError {
    /// Local input was rejected before any request was sent.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A server answered with a payload that violates the upload contract.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Request to the application server failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Transfer to the storage backend failed.
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// The upload was cancelled by the caller.
    #[error("Upload aborted")]
    Aborted,

    /// Configuration could not be loaded or is incomplete.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Local I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Protocol(_) => 3,
            Self::Transport(_) => 4,
            Self::Transfer(_) => 5,
            Self::Aborted => 130,
            Self::Configuration(_) => 78,
            Self::Io(_) => 74,
            Self::Internal(_) => 1,
        }
    }

    /// Returns the stable error code for machine-readable output.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Protocol(_) => "PROTOCOL_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Transfer(_) => "TRANSFER_ERROR",
            Self::Aborted => "ABORTED",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true if starting a fresh session might succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Transfer(_))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(AppError::Validation(String::new()).exit_code(), 2);
        assert_eq!(AppError::Protocol(String::new()).exit_code(), 3);
        assert_eq!(AppError::Transport(String::new()).exit_code(), 4);
        assert_eq!(AppError::Transfer(String::new()).exit_code(), 5);
        assert_eq!(AppError::Aborted.exit_code(), 130);
        assert_eq!(AppError::Configuration(String::new()).exit_code(), 78);
        assert_eq!(AppError::Internal(String::new()).exit_code(), 1);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::Validation(String::new()).error_code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            AppError::Protocol(String::new()).error_code(),
            "PROTOCOL_ERROR"
        );
        assert_eq!(
            AppError::Transport(String::new()).error_code(),
            "TRANSPORT_ERROR"
        );
        assert_eq!(
            AppError::Transfer(String::new()).error_code(),
            "TRANSFER_ERROR"
        );
        assert_eq!(AppError::Aborted.error_code(), "ABORTED");
        assert_eq!(
            AppError::Internal(String::new()).error_code(),
            "INTERNAL_ERROR"
        );
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            AppError::Validation("msg".into()).to_string(),
            "Validation error: msg"
        );
        assert_eq!(
            AppError::Protocol("msg".into()).to_string(),
            "Protocol error: msg"
        );
        assert_eq!(
            AppError::Transfer("msg".into()).to_string(),
            "Transfer error: msg"
        );
        assert_eq!(AppError::Aborted.to_string(), "Upload aborted");
    }

    #[test]
    fn test_only_network_failures_are_retryable() {
        assert!(AppError::Transport(String::new()).is_retryable());
        assert!(AppError::Transfer(String::new()).is_retryable());
        assert!(!AppError::Validation(String::new()).is_retryable());
        assert!(!AppError::Protocol(String::new()).is_retryable());
        assert!(!AppError::Aborted.is_retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, AppError::Io(_)));
        assert_eq!(err.exit_code(), 74);
    }
}
