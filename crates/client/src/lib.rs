//! HTTP transport for the Uplink upload pipeline.
//!
//! Implements [`uplink_core::upload::Transport`] on top of `reqwest`:
//! URL-encoded form requests to the application server and streamed
//! multipart submissions to the storage backend.

mod error;
mod http;

pub use error::ClientError;
pub use http::HttpTransport;
