//! Sequential authorize → transfer → complete orchestration.

use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info};
use uplink_shared::types::SessionId;

use super::abort::AbortHandle;
use super::authorize::AuthorizationClient;
use super::complete::CompletionNotifier;
use super::csrf::AntiForgery;
use super::error::{SessionError, UploadError, ValidationError};
use super::form::FormFields;
use super::observer::UploadObserver;
use super::request::UploadRequestBuilder;
use super::session::{SessionState, UploadSession};
use super::transfer::{StorageTransfer, TransferOutcome};
use super::transport::Transport;
use super::types::UploadOutcome;

/// Runs sessions through the four upload phases over one transport.
///
/// The pipeline holds no per-session state; any number of sessions may run
/// through it concurrently.
pub struct UploadPipeline<T: Transport> {
    anti_forgery: Arc<AntiForgery>,
    authorizer: AuthorizationClient<T>,
    transfer: StorageTransfer<T>,
    notifier: CompletionNotifier<T>,
}

impl<T: Transport> UploadPipeline<T> {
    /// Create a pipeline sending application server requests with `anti_forgery`.
    #[must_use]
    pub fn new(transport: Arc<T>, anti_forgery: AntiForgery) -> Self {
        let anti_forgery = Arc::new(anti_forgery);
        Self {
            authorizer: AuthorizationClient::new(Arc::clone(&transport), Arc::clone(&anti_forgery)),
            transfer: StorageTransfer::new(Arc::clone(&transport)),
            notifier: CompletionNotifier::new(transport, Arc::clone(&anti_forgery)),
            anti_forgery,
        }
    }

    /// Name of the binary part in the storage submission.
    #[must_use]
    pub fn with_file_field(mut self, name: impl Into<String>) -> Self {
        self.transfer = self.transfer.with_file_field(name);
        self
    }

    /// Validate `session` and build its authorization request.
    ///
    /// Runs before any network activity.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is cross-origin or the payload type
    /// is not allowed.
    pub fn prepare(&self, session: &UploadSession) -> Result<FormFields, ValidationError> {
        self.validate(session)?;
        UploadRequestBuilder::build(session)
    }

    fn validate(&self, session: &UploadSession) -> Result<(), ValidationError> {
        self.anti_forgery
            .check_same_origin(session.endpoint())
            .and_then(|()| UploadRequestBuilder::validate(session))
            .inspect_err(|e| debug!(session_id = %session.id(), error = %e, "Session rejected"))
    }

    /// Drive a prepared session to a terminal state.
    ///
    /// `observer` receives progress while transferring and at most one
    /// terminal callback. An aborted session gets no terminal callback. A
    /// session that is not idle, or that fails validation, is refused without
    /// any callback and keeps its state.
    pub async fn execute(
        &self,
        session: &mut UploadSession,
        request: FormFields,
        observer: Arc<dyn UploadObserver>,
    ) -> UploadOutcome {
        if session.state() != SessionState::Idle {
            return UploadOutcome::Failed(
                SessionError::InvalidTransition {
                    from: session.state(),
                    to: SessionState::Authorizing,
                }
                .into(),
            );
        }
        if let Err(err) = self.validate(session) {
            return UploadOutcome::Failed(err.into());
        }

        info!(
            session_id = %session.id(),
            filename = %session.payload().filename(),
            content_type = %session.payload().content_type(),
            bytes = session.payload().len(),
            "Starting upload"
        );

        session.tracker().attach(Arc::clone(&observer));
        let result = self.drive(session, request).await;
        session.tracker().detach();

        match result {
            Ok(UploadOutcome::Completed) => {
                observer.on_complete();
                UploadOutcome::Completed
            }
            Ok(outcome) => outcome,
            Err(err) => {
                session.fail(err.clone());
                if session.abort_ref().is_aborted() {
                    // Abort was requested before the transfer began; the caller
                    // asked not to hear from this session again.
                    debug!(session_id = %session.id(), error = %err, "Suppressing error after abort");
                } else {
                    error!(
                        session_id = %session.id(),
                        category = err.category(),
                        status = ?err.status(),
                        error = %err,
                        "Upload failed"
                    );
                    observer.on_error(&err);
                }
                UploadOutcome::Failed(err)
            }
        }
    }

    /// [`prepare`](Self::prepare) then [`execute`](Self::execute).
    ///
    /// # Errors
    ///
    /// Returns the validation error without sending anything.
    pub async fn run(
        &self,
        session: &mut UploadSession,
        observer: Arc<dyn UploadObserver>,
    ) -> Result<UploadOutcome, ValidationError> {
        let request = self.prepare(session)?;
        Ok(self.execute(session, request, observer).await)
    }

    async fn drive(
        &self,
        session: &mut UploadSession,
        request: FormFields,
    ) -> Result<UploadOutcome, UploadError> {
        self.authorizer.authorize(session, request).await?;

        let receipt = match self.transfer.transfer(session).await? {
            TransferOutcome::Stored(receipt) => receipt,
            TransferOutcome::Aborted => return Ok(UploadOutcome::Aborted),
        };

        self.notifier.complete(session, &receipt).await?;
        Ok(UploadOutcome::Completed)
    }
}

impl<T: Transport + 'static> UploadPipeline<T> {
    /// Validate `session` and run it on a new tokio task.
    ///
    /// # Errors
    ///
    /// Returns the validation error without spawning anything.
    pub fn spawn(
        self: &Arc<Self>,
        mut session: UploadSession,
        observer: Arc<dyn UploadObserver>,
    ) -> Result<UploadTask, ValidationError> {
        let request = self.prepare(&session)?;
        let session_id = session.id();
        let abort = session.abort_handle();
        let pipeline = Arc::clone(self);

        let handle = tokio::spawn(async move {
            let outcome = pipeline.execute(&mut session, request, observer).await;
            (session, outcome)
        });

        Ok(UploadTask {
            session_id,
            abort,
            handle,
        })
    }
}

/// A session running on its own task.
#[derive(Debug)]
pub struct UploadTask {
    session_id: SessionId,
    abort: AbortHandle,
    handle: JoinHandle<(UploadSession, UploadOutcome)>,
}

impl UploadTask {
    /// ID of the running session.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Handle that cancels the session's transfer.
    #[must_use]
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Shorthand for `abort_handle().abort()`.
    pub fn abort(&self) -> bool {
        self.abort.abort()
    }

    /// Wait for the session to reach a terminal state.
    ///
    /// # Errors
    ///
    /// Returns an error if the task panicked.
    pub async fn join(self) -> Result<(UploadSession, UploadOutcome), JoinError> {
        self.handle.await
    }
}
