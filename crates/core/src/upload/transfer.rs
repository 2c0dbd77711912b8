//! Storage transfer phase: send the payload straight to the object store.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::error::{SessionError, UploadError};
use super::session::{SessionState, UploadSession};
use super::transport::{FilePart, MultipartRequest, Transport};
use super::types::{Authorization, Payload, TransferReceipt, base_filename};

/// How the transfer phase ended, short of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The store accepted the payload.
    Stored(TransferReceipt),
    /// An abort won before the store answered.
    Aborted,
}

/// Sends the payload to the storage backend using the session's credentials.
pub struct StorageTransfer<T: Transport> {
    transport: Arc<T>,
    file_field: String,
}

impl<T: Transport> StorageTransfer<T> {
    /// Default multipart field name for the binary part.
    pub const DEFAULT_FILE_FIELD: &'static str = "file";

    /// Create a new storage transfer.
    #[must_use]
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            file_field: Self::DEFAULT_FILE_FIELD.to_string(),
        }
    }

    /// Set the multipart field name for the binary part.
    #[must_use]
    pub fn with_file_field(mut self, name: impl Into<String>) -> Self {
        self.file_field = name.into();
        self
    }

    /// Build the multipart submission: every signed field, then the payload.
    #[must_use]
    pub fn build_submission(
        &self,
        authorization: &Authorization,
        payload: &Payload,
    ) -> MultipartRequest {
        MultipartRequest {
            url: authorization.target_url.clone(),
            fields: authorization.required_fields.clone(),
            file: FilePart {
                field_name: self.file_field.clone(),
                filename: storage_filename(authorization, payload),
                content_type: payload.content_type().to_string(),
                data: payload.data().clone(),
            },
        }
    }

    /// Send the payload.
    ///
    /// Moves the session to `Transferring`. If the session's abort handle
    /// fires first, the in-flight request is dropped, the session moves to
    /// `Aborted`, and `Ok(TransferOutcome::Aborted)` is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not authorized, the request fails,
    /// or the store answers with a non-2xx status.
    pub async fn transfer(&self, session: &mut UploadSession) -> Result<TransferOutcome, UploadError> {
        let submission = {
            let authorization = session
                .authorization()
                .ok_or(SessionError::NotAuthorized)?;
            self.build_submission(authorization, session.payload())
        };
        session.transition(SessionState::Transferring)?;

        let abort = session.abort_handle();
        if abort.is_aborted() {
            debug!(session_id = %session.id(), "Abort requested before transfer started");
            session.transition(SessionState::Aborted)?;
            return Ok(TransferOutcome::Aborted);
        }

        // Measured from the part actually sent, not from the authorization request.
        let receipt = TransferReceipt {
            filesize: submission.file.data.len() as u64,
            media_type: submission.file.content_type.clone(),
        };

        debug!(
            session_id = %session.id(),
            target = %submission.url,
            fields = submission.fields.len(),
            filename = %submission.file.filename,
            bytes = receipt.filesize,
            "Starting storage transfer"
        );

        let send = self
            .transport
            .send_multipart(submission, session.tracker().clone());

        let result = tokio::select! {
            biased;
            () = abort.cancelled() => None,
            result = send => Some(result),
        };

        // An abort that raced a just-finished transfer loses only if settle wins.
        let result = match result {
            Some(result) if session.abort_ref().settle() => result,
            _ => {
                warn!(session_id = %session.id(), "Storage transfer aborted");
                session.transition(SessionState::Aborted)?;
                return Ok(TransferOutcome::Aborted);
            }
        };

        let response = result.map_err(|e| {
            error!(session_id = %session.id(), error = %e, "Upload failed");
            UploadError::transfer(e.status, format!("Upload failed: {}", e.message))
        })?;

        if !response.is_success() {
            error!(
                session_id = %session.id(),
                status = response.status,
                "Storage backend rejected upload"
            );
            return Err(UploadError::transfer(
                Some(response.status),
                format!("Upload failed with status {}", response.status),
            ));
        }

        info!(
            session_id = %session.id(),
            status = response.status,
            bytes = receipt.filesize,
            "Payload stored"
        );
        Ok(TransferOutcome::Stored(receipt))
    }
}

/// Filename for the stored object.
///
/// The server-assigned `filename` wins; otherwise the payload's own name.
fn storage_filename(authorization: &Authorization, payload: &Payload) -> String {
    let name = authorization
        .file_description
        .filename()
        .map_or(payload.filename(), base_filename);
    sanitize_filename(name)
}

/// Sanitize a filename for a multipart `Content-Disposition`.
///
/// Replaces control characters, quotes and path separators; everything else
/// (including non-ASCII) is kept.
fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, '"' | '/' | '\\') {
                '_'
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::error::TransportFailure;
    use crate::upload::progress::ProgressTracker;
    use crate::upload::transport::{FormRequest, TransportResponse};
    use crate::upload::types::FileDescription;
    use proptest::prelude::*;
    use url::Url;

    struct NoTransport;

    impl Transport for NoTransport {
        async fn send_form(&self, _: FormRequest) -> Result<TransportResponse, TransportFailure> {
            unreachable!("not used")
        }

        async fn send_multipart(
            &self,
            _: MultipartRequest,
            _: ProgressTracker,
        ) -> Result<TransportResponse, TransportFailure> {
            unreachable!("not used")
        }
    }

    fn authorization(file: &[(&str, &str)]) -> Authorization {
        Authorization {
            target_url: Url::parse("https://store/x").unwrap(),
            required_fields: [("key", "u/7"), ("policy", "p"), ("signature", "s")]
                .into_iter()
                .collect(),
            file_description: file.iter().copied().collect::<FileDescription>(),
        }
    }

    #[test]
    fn test_submission_keeps_fields_in_order_and_file_last() {
        let transfer = StorageTransfer::new(Arc::new(NoTransport));
        let payload = Payload::new("report.pdf", "application/pdf", vec![7u8; 2048]);
        let submission = transfer.build_submission(&authorization(&[("id", "7")]), &payload);

        assert_eq!(submission.url.as_str(), "https://store/x");
        let keys: Vec<&str> = submission.fields.keys().collect();
        assert_eq!(keys, vec!["key", "policy", "signature"]);
        assert_eq!(submission.file.field_name, "file");
        assert_eq!(submission.file.filename, "report.pdf");
        assert_eq!(submission.file.content_type, "application/pdf");
        assert_eq!(submission.file.data.len(), 2048);
    }

    #[test]
    fn test_server_filename_wins() {
        let transfer = StorageTransfer::new(Arc::new(NoTransport)).with_file_field("upload");
        let payload = Payload::new("local-name.pdf", "application/pdf", vec![0u8; 4]);
        let submission = transfer.build_submission(
            &authorization(&[("filename", "dir\\server-name.pdf")]),
            &payload,
        );
        assert_eq!(submission.file.filename, "server-name.pdf");
        assert_eq!(submission.file.field_name, "upload");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("invoice.pdf"), "invoice.pdf");
        assert_eq!(sanitize_filename("my \"file\".pdf"), "my _file_.pdf");
        assert_eq!(sanitize_filename("line\nbreak.txt"), "line_break.txt");
        assert_eq!(sanitize_filename("日本語.pdf"), "日本語.pdf");
    }

    proptest! {
        /// Sanitized filenames never break out of a quoted header parameter.
        #[test]
        fn prop_sanitized_filename_safe_chars(filename in ".*") {
            let sanitized = sanitize_filename(&filename);
            for c in sanitized.chars() {
                let is_safe = !c.is_control() && c != '"' && c != '/' && c != '\\';
                prop_assert!(is_safe, "Unexpected character in sanitized filename: {:?}", c);
            }
            prop_assert_eq!(sanitized.chars().count(), filename.chars().count());
        }
    }
}
