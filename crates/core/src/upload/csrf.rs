//! Anti-forgery token and same-origin guard for application server requests.

use url::{Origin, Url};

use super::error::ValidationError;

/// Anti-forgery token plus the origin it is valid for.
///
/// Attached to every state-changing request to the application server.
/// Requests to any other origin are refused before dispatch so the token
/// never leaves its origin.
#[derive(Clone)]
pub struct AntiForgery {
    token: String,
    origin: Origin,
    header: String,
}

impl AntiForgery {
    /// Default header name.
    pub const DEFAULT_HEADER: &'static str = "X-CSRF-Token";
    /// Default cookie name.
    pub const DEFAULT_COOKIE: &'static str = "csrftoken";

    /// Create from an explicit token, bound to the origin of `page`.
    #[must_use]
    pub fn new(token: impl Into<String>, page: &Url) -> Self {
        Self {
            token: token.into(),
            origin: page.origin(),
            header: Self::DEFAULT_HEADER.to_string(),
        }
    }

    /// Extract the token from a `Cookie` header value.
    ///
    /// Returns `None` if `cookie_name` is absent or empty.
    #[must_use]
    pub fn from_cookie_header(cookie_header: &str, cookie_name: &str, page: &Url) -> Option<Self> {
        cookie_value(cookie_header, cookie_name).map(|token| Self::new(token, page))
    }

    /// Override the header name.
    #[must_use]
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    /// Token value.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Header name the token is sent in.
    #[must_use]
    pub fn header_name(&self) -> &str {
        &self.header
    }

    /// `(name, value)` pair to attach to a request.
    #[must_use]
    pub fn header(&self) -> (String, String) {
        (self.header.clone(), self.token.clone())
    }

    /// Serialized origin, e.g. `https://portal.example.org`.
    #[must_use]
    pub fn origin(&self) -> String {
        self.origin.ascii_serialization()
    }

    /// Refuse `url` unless it shares scheme, host and port with the origin.
    ///
    /// Default ports compare equal to an explicit default port. Opaque origins
    /// (`file:`, `data:`) never match.
    pub fn check_same_origin(&self, url: &Url) -> Result<(), ValidationError> {
        let target = url.origin();
        if self.origin.is_tuple() && target == self.origin {
            Ok(())
        } else {
            Err(ValidationError::CrossOrigin {
                url: url.to_string(),
                origin: self.origin(),
            })
        }
    }
}

impl std::fmt::Debug for AntiForgery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AntiForgery")
            .field("token", &"<redacted>")
            .field("origin", &self.origin())
            .field("header", &self.header)
            .finish()
    }
}

fn cookie_value(cookie_header: &str, name: &str) -> Option<String> {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}
