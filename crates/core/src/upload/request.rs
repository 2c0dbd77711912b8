//! Authorization request assembly.

use mime::Mime;

use super::error::ValidationError;
use super::form::FormFields;
use super::session::UploadSession;

/// Turns a session into the validated body of the authorization request.
///
/// Pure: no I/O, same output for the same session.
pub struct UploadRequestBuilder;

impl UploadRequestBuilder {
    /// Field carrying the payload's content type.
    pub const CONTENT_TYPE_FIELD: &'static str = "content_type";

    /// Check the payload's content type.
    ///
    /// An empty type is accepted unless the session restricts types; anything
    /// else must parse as a media type. A session can't exist without a
    /// payload, so `NoPayload` is raised by the session builder.
    pub fn validate(session: &UploadSession) -> Result<(), ValidationError> {
        let allowed = session.allowed_types();
        let content_type = session.payload().content_type();
        if !content_type.is_empty() && content_type.parse::<Mime>().is_err() {
            return Err(ValidationError::InvalidContentType {
                content_type: content_type.to_string(),
            });
        }
        if !allowed.is_empty() && !allowed.iter().any(|t| t == content_type) {
            return Err(ValidationError::unsupported_type(content_type, allowed));
        }
        Ok(())
    }

    /// Build the authorization request body.
    ///
    /// All metadata fields in order, then `content_type` from the payload.
    pub fn build(session: &UploadSession) -> Result<FormFields, ValidationError> {
        Self::validate(session)?;

        let mut fields = session.metadata().clone();
        fields.set(Self::CONTENT_TYPE_FIELD, session.payload().content_type());
        Ok(fields)
    }
}
