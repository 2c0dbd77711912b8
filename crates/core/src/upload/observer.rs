//! Caller hooks for progress and terminal outcomes.

use super::error::UploadError;
use super::types::Progress;

/// Receives progress and terminal notifications for one session.
///
/// Invoked from whatever task drives the transport. The pipeline delivers at
/// most one of `on_complete`/`on_error` per session, and neither after an abort.
pub trait UploadObserver: Send + Sync {
    /// Bytes were handed to the connection. Only called when the total is known.
    fn on_progress(&self, _progress: Progress) {}

    /// Upload stored and finalized.
    fn on_complete(&self) {}

    /// A phase failed.
    fn on_error(&self, _error: &UploadError) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl UploadObserver for NoopObserver {}
