//! Upload session state and lifecycle.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uplink_shared::types::SessionId;
use url::Url;

use super::abort::AbortHandle;
use super::error::{SessionError, UploadError, ValidationError};
use super::form::FormFields;
use super::progress::ProgressTracker;
use super::types::{Authorization, Payload, Progress};

/// Session state in the upload pipeline.
///
/// The valid transitions are:
/// - Idle → Authorizing
/// - Authorizing → Transferring | Failed
/// - Transferring → Completing | Failed | Aborted
/// - Completing → Completed | Failed
///
/// Completed, Failed and Aborted are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Built, nothing sent yet.
    Idle,
    /// Requesting upload credentials from the application server.
    Authorizing,
    /// Sending the payload to the storage backend.
    Transferring,
    /// Telling the application server the object is stored.
    Completing,
    /// Stored and finalized.
    Completed,
    /// A phase failed.
    Failed,
    /// Cancelled during transfer.
    Aborted,
}

impl SessionState {
    /// Returns the string representation of the state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Authorizing => "authorizing",
            Self::Transferring => "transferring",
            Self::Completing => "completing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        }
    }

    /// Parses a state from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "idle" => Some(Self::Idle),
            "authorizing" => Some(Self::Authorizing),
            "transferring" => Some(Self::Transferring),
            "completing" => Some(Self::Completing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "aborted" => Some(Self::Aborted),
            _ => None,
        }
    }

    /// Returns true if no transition leaves this state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Aborted)
    }

    /// Returns true if the transition table allows `self → next`.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Authorizing)
                | (Self::Authorizing, Self::Transferring | Self::Failed)
                | (
                    Self::Transferring,
                    Self::Completing | Self::Failed | Self::Aborted
                )
                | (Self::Completing, Self::Completed | Self::Failed)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One attempt to move one payload through authorize → transfer → complete.
///
/// Owns its credentials, progress tracker and abort handle; nothing is shared
/// with other sessions. Retrying means building a new session.
#[derive(Debug)]
pub struct UploadSession {
    id: SessionId,
    endpoint: Url,
    payload: Payload,
    allowed_types: Vec<String>,
    metadata: FormFields,
    state: SessionState,
    authorization: Option<Authorization>,
    authorized: bool,
    error: Option<UploadError>,
    progress: ProgressTracker,
    abort: AbortHandle,
    created_at: DateTime<Utc>,
}

impl UploadSession {
    /// Start building a session against the application server's `endpoint`.
    #[must_use]
    pub fn builder(endpoint: Url) -> UploadSessionBuilder {
        UploadSessionBuilder::new(endpoint)
    }

    /// Session ID.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Application server endpoint for authorization and completion.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// The selected payload.
    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Accepted content types. Empty means unrestricted.
    #[must_use]
    pub fn allowed_types(&self) -> &[String] {
        &self.allowed_types
    }

    /// Auxiliary form fields sent with the authorization request.
    #[must_use]
    pub fn metadata(&self) -> &FormFields {
        &self.metadata
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Transfer progress; only defined while transferring.
    #[must_use]
    pub fn progress(&self) -> Option<Progress> {
        if self.state == SessionState::Transferring {
            self.progress.snapshot()
        } else {
            None
        }
    }

    /// Credentials, present from successful authorization until the session ends.
    #[must_use]
    pub fn authorization(&self) -> Option<&Authorization> {
        self.authorization.as_ref()
    }

    /// Last failure; present only when failed.
    #[must_use]
    pub fn error(&self) -> Option<&UploadError> {
        self.error.as_ref()
    }

    /// Handle that cancels this session's transfer.
    #[must_use]
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// When the session was built.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn tracker(&self) -> &ProgressTracker {
        &self.progress
    }

    pub(crate) fn abort_ref(&self) -> &AbortHandle {
        &self.abort
    }

    /// Move to `next` if the transition table allows it.
    pub(crate) fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(session_id = %self.id, from = %self.state, to = %next, "Session transition");
        self.state = next;
        if next.is_terminal() {
            self.abort.settle();
            self.authorization = None;
        }
        Ok(())
    }

    pub(crate) fn set_authorization(&mut self, authorization: Authorization) -> Result<(), SessionError> {
        if self.authorized {
            return Err(SessionError::AlreadyAuthorized);
        }
        self.authorized = true;
        self.authorization = Some(authorization);
        Ok(())
    }

    /// Record a failure and move to Failed.
    ///
    /// A no-op unless the current state may move to Failed, so an idle or
    /// terminal session keeps its state and error.
    pub(crate) fn fail(&mut self, error: UploadError) {
        if !self.state.can_transition_to(SessionState::Failed) {
            debug!(session_id = %self.id, state = %self.state, error = %error, "Failure not recorded");
            return;
        }
        self.state = SessionState::Failed;
        self.error = Some(error);
        self.authorization = None;
        self.abort.settle();
        debug!(session_id = %self.id, "Session failed");
    }
}

/// Builder for [`UploadSession`].
#[derive(Debug)]
pub struct UploadSessionBuilder {
    endpoint: Url,
    payload: Option<Payload>,
    allowed_types: Vec<String>,
    metadata: FormFields,
    file_field: String,
}

impl UploadSessionBuilder {
    /// Default name of the payload's form field.
    pub const DEFAULT_FILE_FIELD: &'static str = "file";

    fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            payload: None,
            allowed_types: Vec::new(),
            metadata: FormFields::new(),
            file_field: Self::DEFAULT_FILE_FIELD.to_string(),
        }
    }

    /// Set the payload.
    #[must_use]
    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Set the accepted content types.
    #[must_use]
    pub fn allowed_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Set the source form's fields.
    #[must_use]
    pub fn metadata(mut self, metadata: FormFields) -> Self {
        self.metadata = metadata;
        self
    }

    /// Append one metadata field.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.append(key, value);
        self
    }

    /// Name of the payload's field in the source form; it is never sent as metadata.
    #[must_use]
    pub fn file_field(mut self, name: impl Into<String>) -> Self {
        self.file_field = name.into();
        self
    }

    /// Build the session.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NoPayload`] if no payload was set.
    pub fn build(self) -> Result<UploadSession, ValidationError> {
        let payload = self.payload.ok_or(ValidationError::NoPayload)?;
        let mut metadata = self.metadata;
        metadata.remove(&self.file_field);

        let id = SessionId::new();
        Ok(UploadSession {
            id,
            endpoint: self.endpoint,
            payload,
            allowed_types: self.allowed_types,
            metadata,
            state: SessionState::Idle,
            authorization: None,
            authorized: false,
            error: None,
            progress: ProgressTracker::new(),
            abort: AbortHandle::new(id),
            created_at: Utc::now(),
        })
    }
}
