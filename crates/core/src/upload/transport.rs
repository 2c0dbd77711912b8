//! Transport seam between the pipeline and an HTTP client.

use std::future::Future;

use bytes::Bytes;
use url::Url;

use super::error::TransportFailure;
use super::form::FormFields;
use super::progress::ProgressTracker;

/// Method for form requests to the application server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// Authorization request.
    Post,
    /// Completion notification.
    Patch,
}

impl HttpMethod {
    /// Method name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Patch => "PATCH",
        }
    }
}

/// URL-encoded form request to the application server.
#[derive(Debug, Clone)]
pub struct FormRequest {
    /// Method.
    pub method: HttpMethod,
    /// Target.
    pub url: Url,
    /// Extra headers, e.g. the anti-forgery token.
    pub headers: Vec<(String, String)>,
    /// Body fields.
    pub fields: FormFields,
}

/// Binary part of a multipart submission.
#[derive(Debug, Clone)]
pub struct FilePart {
    /// Form field name.
    pub field_name: String,
    /// Filename reported to the storage backend.
    pub filename: String,
    /// Content type of the part. Empty when unknown.
    pub content_type: String,
    /// Part bytes.
    pub data: Bytes,
}

/// Multipart submission to the storage backend.
///
/// Implementations must write every entry of `fields`, in order, before the
/// binary `file` part.
#[derive(Debug, Clone)]
pub struct MultipartRequest {
    /// Target.
    pub url: Url,
    /// Signed credential/policy fields.
    pub fields: FormFields,
    /// Binary part, always last.
    pub file: FilePart,
}

/// Response with any status.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// Status code.
    pub status: u16,
    /// Body bytes.
    pub body: Bytes,
}

impl TransportResponse {
    /// Returns true for a 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client used by the pipeline.
///
/// This trait is implemented by the client crate to provide actual network
/// operations. A response with a non-success status is returned as `Ok`; only
/// failures to obtain a response are `Err`.
pub trait Transport: Send + Sync {
    /// Send a URL-encoded form request.
    fn send_form(
        &self,
        request: FormRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportFailure>> + Send;

    /// Send a multipart submission, reporting upload progress to `progress`.
    ///
    /// The returned future may be dropped mid-flight to cancel the transfer.
    fn send_multipart(
        &self,
        request: MultipartRequest,
        progress: ProgressTracker,
    ) -> impl Future<Output = Result<TransportResponse, TransportFailure>> + Send;
}
