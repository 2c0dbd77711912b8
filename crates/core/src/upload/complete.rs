//! Completion phase: tell the application server the object is stored.

use std::sync::Arc;

use tracing::{debug, error, info};

use super::csrf::AntiForgery;
use super::error::{SessionError, UploadError};
use super::form::FormFields;
use super::session::{SessionState, UploadSession};
use super::transport::{FormRequest, HttpMethod, Transport};
use super::types::{FileDescription, TransferReceipt};

/// Field carrying the stored object's byte length.
pub const FILESIZE_FIELD: &str = "filesize";
/// Field carrying the stored object's content type.
pub const MEDIA_TYPE_FIELD: &str = "media_type";

/// Completion body: the server's file description, then `filesize` and
/// `media_type` taken from what was actually transferred.
///
/// `filesize` and `media_type` replace any same-named entries in the
/// description.
#[must_use]
pub fn completion_body(description: &FileDescription, receipt: &TransferReceipt) -> FormFields {
    let mut fields = description.as_fields().clone();
    fields.set(FILESIZE_FIELD, receipt.filesize.to_string());
    fields.set(MEDIA_TYPE_FIELD, receipt.media_type.as_str());
    fields
}

/// Finalizes a stored upload with the application server.
pub struct CompletionNotifier<T: Transport> {
    transport: Arc<T>,
    anti_forgery: Arc<AntiForgery>,
}

impl<T: Transport> CompletionNotifier<T> {
    /// Create a new completion notifier.
    #[must_use]
    pub fn new(transport: Arc<T>, anti_forgery: Arc<AntiForgery>) -> Self {
        Self {
            transport,
            anti_forgery,
        }
    }

    /// Send the completion request and move the session to `Completed`.
    ///
    /// Single attempt; a failure leaves the stored object unconfirmed.
    ///
    /// # Errors
    ///
    /// Returns an error if the session has no authorization, the request
    /// fails, or the server answers with a non-2xx status.
    pub async fn complete(
        &self,
        session: &mut UploadSession,
        receipt: &TransferReceipt,
    ) -> Result<(), UploadError> {
        let body = {
            let authorization = session
                .authorization()
                .ok_or(SessionError::NotAuthorized)?;
            completion_body(&authorization.file_description, receipt)
        };
        session.transition(SessionState::Completing)?;

        debug!(
            session_id = %session.id(),
            endpoint = %session.endpoint(),
            filesize = receipt.filesize,
            media_type = %receipt.media_type,
            "Sending upload completion"
        );

        let response = self
            .transport
            .send_form(FormRequest {
                method: HttpMethod::Patch,
                url: session.endpoint().clone(),
                headers: vec![self.anti_forgery.header()],
                fields: body,
            })
            .await
            .map_err(|e| UploadError::transport(e.status, e.message))?;

        if !response.is_success() {
            error!(
                session_id = %session.id(),
                status = response.status,
                "Completion request rejected"
            );
            return Err(UploadError::transport(
                Some(response.status),
                format!("HTTP error! status: {}", response.status),
            ));
        }

        session.transition(SessionState::Completed)?;
        info!(session_id = %session.id(), "Upload completed");
        Ok(())
    }
}
