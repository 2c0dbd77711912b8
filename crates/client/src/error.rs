//! Client construction errors.

use thiserror::Error;
use uplink_shared::AppError;

/// Errors raised while setting up the HTTP transport.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The underlying HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        Self::Configuration(err.to_string())
    }
}
