//! reqwest-backed [`Transport`].

use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Method, Response};
use tracing::debug;
use uplink_core::upload::{
    FormRequest, HttpMethod, MultipartRequest, ProgressTracker, Transport, TransportFailure,
    TransportResponse,
};
use uplink_shared::TransferConfig;

use crate::error::ClientError;

/// Default size of the chunks a payload is streamed in.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// HTTP transport over a shared `reqwest::Client`.
///
/// Cheap to clone; every session may use the same instance since progress
/// and cancellation live on the session, not here.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    chunk_size: usize,
}

impl HttpTransport {
    /// Wrap an existing client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Build a client from transfer settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn from_config(config: &TransferConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self::new(client).with_chunk_size(config.chunk_size))
    }

    /// Set the streaming chunk size. Zero is treated as one byte.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

impl Transport for HttpTransport {
    async fn send_form(&self, request: FormRequest) -> Result<TransportResponse, TransportFailure> {
        let method = match request.method {
            HttpMethod::Post => Method::POST,
            HttpMethod::Patch => Method::PATCH,
        };

        let mut builder = self
            .client
            .request(method, request.url.clone())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(request.fields.to_urlencoded());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(failure)?;
        debug!(
            method = request.method.as_str(),
            url = %request.url,
            status = response.status().as_u16(),
            "Form request finished"
        );
        read_response(response).await
    }

    async fn send_multipart(
        &self,
        request: MultipartRequest,
        progress: ProgressTracker,
    ) -> Result<TransportResponse, TransportFailure> {
        let MultipartRequest { url, fields, file } = request;
        let total = file.data.len() as u64;

        let mut sent = 0u64;
        let stream = futures::stream::iter(chunks(&file.data, self.chunk_size)).map(move |chunk| {
            sent += chunk.len() as u64;
            progress.report(sent, Some(total));
            Ok::<Bytes, std::io::Error>(chunk)
        });

        let mut part =
            Part::stream_with_length(Body::wrap_stream(stream), total).file_name(file.filename);
        if !file.content_type.is_empty() {
            part = part.mime_str(&file.content_type).map_err(failure)?;
        }

        // Signed fields first; some stores ignore anything after the file.
        let form = fields
            .iter()
            .fold(Form::new(), |form, (key, value)| {
                form.text(key.to_string(), value.to_string())
            })
            .part(file.field_name, part);

        let response = self
            .client
            .post(url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(failure)?;
        debug!(
            url = %url,
            bytes = total,
            status = response.status().as_u16(),
            "Multipart submission finished"
        );
        read_response(response).await
    }
}

/// Split `data` into zero-copy chunks of at most `size` bytes.
fn chunks(data: &Bytes, size: usize) -> Vec<Bytes> {
    (0..data.len())
        .step_by(size)
        .map(|start| data.slice(start..data.len().min(start + size)))
        .collect()
}

async fn read_response(response: Response) -> Result<TransportResponse, TransportFailure> {
    let status = response.status().as_u16();
    let body = response.bytes().await.map_err(|e| TransportFailure {
        status: Some(status),
        message: e.to_string(),
    })?;
    Ok(TransportResponse { status, body })
}

fn failure(err: reqwest::Error) -> TransportFailure {
    TransportFailure {
        status: err.status().map(|s| s.as_u16()),
        message: err.to_string(),
    }
}
