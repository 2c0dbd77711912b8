//! Progress reporting for the terminal.

use std::sync::atomic::{AtomicU8, Ordering};

use tracing::info;
use uplink_core::upload::{Progress, UploadError, UploadObserver};

/// Logs progress at every 10% step.
#[derive(Debug, Default)]
pub struct ProgressLog {
    last_step: AtomicU8,
}

impl UploadObserver for ProgressLog {
    fn on_progress(&self, progress: Progress) {
        let step = progress.percent() / 10;
        if self.last_step.fetch_max(step, Ordering::Relaxed) < step {
            info!(
                percent = progress.percent(),
                sent = progress.bytes_sent,
                total = progress.bytes_total,
                "Upload progress"
            );
        }
    }

    fn on_complete(&self) {
        info!("Upload finalized");
    }

    fn on_error(&self, error: &UploadError) {
        info!(
            category = error.category(),
            retryable = error.is_retryable(),
            "Upload did not finish"
        );
    }
}
