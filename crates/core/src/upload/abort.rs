//! Per-session cancellation of the storage transfer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uplink_shared::types::SessionId;

const PENDING: u8 = 0;
const SETTLED: u8 = 1;
const ABORTED: u8 = 2;

/// Cancels one session's transfer.
///
/// Cloneable and usable from any task. The first of "transfer settled" and
/// "abort requested" wins; the loser is a no-op.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    session_id: SessionId,
    token: CancellationToken,
    latch: Arc<AtomicU8>,
}

impl AbortHandle {
    pub(crate) fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            token: CancellationToken::new(),
            latch: Arc::new(AtomicU8::new(PENDING)),
        }
    }

    /// Request cancellation.
    ///
    /// Returns true if this call won. After the transfer settled (or the
    /// session reached a terminal state) the call only logs.
    pub fn abort(&self) -> bool {
        match self
            .latch
            .compare_exchange(PENDING, ABORTED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                self.token.cancel();
                warn!(session_id = %self.session_id, "Upload aborted");
                true
            }
            Err(SETTLED) => {
                debug!(session_id = %self.session_id, "No upload in progress to abort");
                false
            }
            Err(_) => {
                debug!(session_id = %self.session_id, "Upload already aborted");
                false
            }
        }
    }

    /// Returns true if an abort won.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.latch.load(Ordering::Acquire) == ABORTED
    }

    /// Claim the terminal slot for the transfer.
    ///
    /// Returns false if an abort got there first.
    pub(crate) fn settle(&self) -> bool {
        match self
            .latch
            .compare_exchange(PENDING, SETTLED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) | Err(SETTLED) => true,
            Err(_) => false,
        }
    }

    /// Resolves once an abort wins.
    pub(crate) async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}
