//! Per-session transfer progress tracking.

use std::sync::{Arc, Mutex, PoisonError};

use super::observer::UploadObserver;
use super::types::Progress;

#[derive(Default)]
struct Inner {
    last: Mutex<Option<Progress>>,
    listener: Mutex<Option<Arc<dyn UploadObserver>>>,
}

/// Normalizes raw transport progress and forwards it to the session's observer.
///
/// Reports without a known total are dropped. `bytes_sent` is clamped to the
/// total, and reports that would move backwards or repeat the last one are
/// dropped, so observers see a non-decreasing sequence.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    inner: Arc<Inner>,
}

impl ProgressTracker {
    /// Create a tracker with no listener.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route accepted reports to `listener` until [`detach`](Self::detach).
    pub fn attach(&self, listener: Arc<dyn UploadObserver>) {
        *self
            .inner
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(listener);
    }

    /// Stop forwarding reports.
    pub fn detach(&self) {
        self.inner
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Record raw progress from the transport.
    ///
    /// Returns the accepted progress, or `None` if the report was dropped.
    pub fn report(&self, bytes_sent: u64, bytes_total: Option<u64>) -> Option<Progress> {
        let bytes_total = bytes_total?;
        let progress = Progress {
            bytes_sent: bytes_sent.min(bytes_total),
            bytes_total,
        };

        {
            let mut last = self.inner.last.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(prev) = *last {
                if progress.bytes_sent < prev.bytes_sent || progress == prev {
                    return None;
                }
            }
            *last = Some(progress);
        }

        let listener = self
            .inner
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(listener) = listener {
            listener.on_progress(progress);
        }
        Some(progress)
    }

    /// Last accepted progress.
    #[must_use]
    pub fn snapshot(&self) -> Option<Progress> {
        *self.inner.last.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("last", &self.snapshot())
            .finish_non_exhaustive()
    }
}
