//! Upload pipeline error types.

use thiserror::Error;
use uplink_shared::AppError;

use super::session::SessionState;

/// Local input rejected before any request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No payload was selected for the session.
    #[error("no payload selected for upload")]
    NoPayload,

    /// Payload content type is not in the allowed set.
    #[error(
        "content type '{content_type}' is not allowed; allowed types: {}",
        .allowed.join(", ")
    )]
    UnsupportedType {
        /// Declared content type of the payload.
        content_type: String,
        /// Content types the session accepts.
        allowed: Vec<String>,
    },

    /// Payload content type is not a `type/subtype` media type.
    #[error("content type '{content_type}' is not a valid media type")]
    InvalidContentType {
        /// Declared content type of the payload.
        content_type: String,
    },

    /// Session endpoint is not same-origin with the page origin.
    #[error("endpoint {url} is not same-origin with {origin}")]
    CrossOrigin {
        /// Rejected request target.
        url: String,
        /// Origin requests must stay within.
        origin: String,
    },
}

impl ValidationError {
    /// Create an unsupported type error.
    #[must_use]
    pub fn unsupported_type(content_type: impl Into<String>, allowed: &[String]) -> Self {
        Self::UnsupportedType {
            content_type: content_type.into(),
            allowed: allowed.to_vec(),
        }
    }
}

/// The application server answered, but not in the shape the upload contract requires.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A required key is missing from the authorization response.
    #[error("malformed authorization: missing '{key}'")]
    MalformedAuthorization {
        /// Dotted path of the missing key.
        key: &'static str,
    },

    /// Authorization response body could not be decoded.
    #[error("malformed authorization body: {0}")]
    InvalidBody(String),

    /// Storage target is not a usable URL.
    #[error("invalid storage target '{url}': {reason}")]
    InvalidTarget {
        /// Target as sent by the server.
        url: String,
        /// Parse failure.
        reason: String,
    },
}

impl ProtocolError {
    /// Create a missing key error.
    #[must_use]
    pub const fn missing(key: &'static str) -> Self {
        Self::MalformedAuthorization { key }
    }
}

/// Illegal use of an upload session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Attempted a transition the state machine does not allow.
    #[error("invalid session transition from {from} to {to}")]
    InvalidTransition {
        /// Current state.
        from: SessionState,
        /// Attempted target state.
        to: SessionState,
    },

    /// Authorization is set at most once per session.
    #[error("session is already authorized")]
    AlreadyAuthorized,

    /// A phase needing credentials ran before authorization.
    #[error("session has no authorization")]
    NotAuthorized,
}

/// Transport-level failure reported by a [`Transport`](super::Transport).
///
/// A response with any status is not a failure; this covers connection,
/// timeout and body errors only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportFailure {
    /// Status code, when one was received before the failure.
    pub status: Option<u16>,
    /// Failure detail.
    pub message: String,
}

impl TransportFailure {
    /// Create a failure with no status.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

/// Upload pipeline errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// Local input was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Server response violated the upload contract.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Request to the application server failed or returned a non-success status.
    #[error("transport error{}: {message}", status_suffix(.status))]
    Transport {
        /// Response status, when one was received.
        status: Option<u16>,
        /// Failure detail.
        message: String,
    },

    /// Transfer to the storage backend failed or returned a non-success status.
    #[error("transfer error{}: {message}", status_suffix(.status))]
    Transfer {
        /// Response status, when one was received.
        status: Option<u16>,
        /// Failure detail.
        message: String,
    },

    /// Session misuse.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The transfer was aborted by the caller.
    #[error("upload aborted")]
    Aborted,
}

#[allow(clippy::ref_option)]
fn status_suffix(status: &Option<u16>) -> String {
    status.map_or_else(String::new, |s| format!(" (status {s})"))
}

impl UploadError {
    /// Create a transport error.
    #[must_use]
    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transport {
            status,
            message: message.into(),
        }
    }

    /// Create a transfer error.
    #[must_use]
    pub fn transfer(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transfer {
            status,
            message: message.into(),
        }
    }

    /// Response status carried by the error, when known.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } | Self::Transfer { status, .. } => *status,
            _ => None,
        }
    }

    /// Short category name for display and logging.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Protocol(_) => "protocol",
            Self::Transport { .. } => "transport",
            Self::Transfer { .. } => "transfer",
            Self::Session(_) => "session",
            Self::Aborted => "aborted",
        }
    }

    /// Returns true if a fresh session might succeed where this one failed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Transfer { .. })
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        let message = err.to_string();
        match err {
            UploadError::Validation(_) => Self::Validation(message),
            UploadError::Protocol(_) => Self::Protocol(message),
            UploadError::Transport { .. } => Self::Transport(message),
            UploadError::Transfer { .. } => Self::Transfer(message),
            UploadError::Session(_) => Self::Internal(message),
            UploadError::Aborted => Self::Aborted,
        }
    }
}
