//! Authorization phase: exchange request metadata for upload credentials.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info};
use url::Url;

use super::csrf::AntiForgery;
use super::error::{ProtocolError, UploadError};
use super::form::FormFields;
use super::session::{SessionState, UploadSession};
use super::transport::{FormRequest, HttpMethod, Transport};
use super::types::{Authorization, FileDescription, json_object_to_fields};

#[derive(Debug, Deserialize)]
struct AuthorizationBody {
    #[serde(default)]
    post: Option<PostBody>,
    #[serde(default)]
    file: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct PostBody {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    fields: Option<Map<String, Value>>,
}

/// Parse and validate the application server's authorization response.
///
/// Expected shape:
///
/// ```text
/// { "post": { "url": string, "fields": { ... } }, "file": { ... } }
/// ```
pub fn parse_authorization(body: &[u8]) -> Result<Authorization, ProtocolError> {
    let body: AuthorizationBody =
        serde_json::from_slice(body).map_err(|e| ProtocolError::InvalidBody(e.to_string()))?;

    let post = body.post.ok_or(ProtocolError::missing("post"))?;
    let raw_url = post.url.ok_or(ProtocolError::missing("post.url"))?;
    let fields = post.fields.ok_or(ProtocolError::missing("post.fields"))?;
    let file = body.file.ok_or(ProtocolError::missing("file"))?;

    let target_url = Url::parse(&raw_url).map_err(|e| ProtocolError::InvalidTarget {
        url: raw_url.clone(),
        reason: e.to_string(),
    })?;

    Ok(Authorization {
        target_url,
        required_fields: json_object_to_fields(&fields),
        file_description: FileDescription::from_json(&file),
    })
}

/// Obtains upload credentials from the application server.
pub struct AuthorizationClient<T: Transport> {
    transport: Arc<T>,
    anti_forgery: Arc<AntiForgery>,
}

impl<T: Transport> AuthorizationClient<T> {
    /// Create a new authorization client.
    #[must_use]
    pub fn new(transport: Arc<T>, anti_forgery: Arc<AntiForgery>) -> Self {
        Self {
            transport,
            anti_forgery,
        }
    }

    /// Request credentials for `session`, storing them on success.
    ///
    /// Moves the session to `Authorizing`. Single attempt; never retried.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The endpoint is cross-origin
    /// - The request fails or the server answers with a non-2xx status
    /// - The response is missing `post.url`, `post.fields` or `file`
    pub async fn authorize(
        &self,
        session: &mut UploadSession,
        request: FormFields,
    ) -> Result<(), UploadError> {
        self.anti_forgery.check_same_origin(session.endpoint())?;
        session.transition(SessionState::Authorizing)?;

        debug!(
            session_id = %session.id(),
            endpoint = %session.endpoint(),
            fields = request.len(),
            "Requesting upload authorization"
        );

        let response = self
            .transport
            .send_form(FormRequest {
                method: HttpMethod::Post,
                url: session.endpoint().clone(),
                headers: vec![self.anti_forgery.header()],
                fields: request,
            })
            .await
            .map_err(|e| UploadError::transport(e.status, e.message))?;

        if !response.is_success() {
            error!(
                session_id = %session.id(),
                status = response.status,
                "Authorization request rejected"
            );
            return Err(UploadError::transport(
                Some(response.status),
                format!("HTTP error! status: {}", response.status),
            ));
        }

        let authorization = parse_authorization(&response.body).inspect_err(|e| {
            error!(session_id = %session.id(), error = %e, "Invalid authorization response");
        })?;

        info!(
            session_id = %session.id(),
            target = %authorization.target_url,
            "Upload authorized"
        );
        session.set_authorization(authorization)?;
        Ok(())
    }
}
