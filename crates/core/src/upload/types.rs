//! Upload types and data structures.

use std::path::Path;

use bytes::Bytes;
use serde_json::{Map, Value};
use url::Url;

use super::error::UploadError;
use super::form::FormFields;

/// The binary content selected for upload.
///
/// Immutable once built; selecting another file means building a new payload
/// and a new session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    filename: String,
    content_type: String,
    data: Bytes,
}

impl Payload {
    /// Create a payload from in-memory bytes.
    ///
    /// Any directory components in `filename` are dropped.
    #[must_use]
    pub fn new(
        filename: impl AsRef<str>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            filename: base_filename(filename.as_ref()).to_string(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// Read a payload from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub async fn from_path(
        path: impl AsRef<Path>,
        content_type: impl Into<String>,
    ) -> std::io::Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(filename, content_type, data))
    }

    /// Filename without directory components.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Declared content type. May be empty when unknown.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Payload bytes.
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Exact byte length.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    /// Returns true for a zero-byte payload.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Final path component, treating both `/` and `\` as separators.
#[must_use]
pub fn base_filename(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Server-assigned identity of the stored object, in server key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDescription(FormFields);

impl FileDescription {
    /// Key whose value names the stored object.
    pub const FILENAME_KEY: &'static str = "filename";

    /// Build from a JSON object, keeping key order.
    ///
    /// Strings are taken as-is, `null` becomes empty, and any other value is
    /// rendered as its JSON text.
    #[must_use]
    pub fn from_json(object: &Map<String, Value>) -> Self {
        Self(json_object_to_fields(object))
    }

    /// Value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key)
    }

    /// Server-assigned filename, if any.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.get(Self::FILENAME_KEY).filter(|name| !name.is_empty())
    }

    /// Entries as form fields.
    #[must_use]
    pub fn as_fields(&self) -> &FormFields {
        &self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FileDescription {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

pub(crate) fn json_object_to_fields(object: &Map<String, Value>) -> FormFields {
    object
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (key.clone(), rendered)
        })
        .collect()
}

/// Server-issued credentials for one direct write to the storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    /// Storage endpoint the multipart submission is posted to.
    pub target_url: Url,
    /// Signed fields that must precede the binary part.
    pub required_fields: FormFields,
    /// Identity of the object to be stored.
    pub file_description: FileDescription,
}

/// Transfer progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Bytes handed to the connection so far.
    pub bytes_sent: u64,
    /// Total bytes to send.
    pub bytes_total: u64,
}

impl Progress {
    /// Whole percentage complete, 0..=100.
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.bytes_total == 0 {
            return 100;
        }
        let pct = u128::from(self.bytes_sent.min(self.bytes_total)) * 100
            / u128::from(self.bytes_total);
        u8::try_from(pct).unwrap_or(100)
    }

    /// Returns true once every byte was sent.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.bytes_sent >= self.bytes_total
    }
}

/// What the storage transfer actually sent, measured at transfer time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    /// Exact byte length of the binary part.
    pub filesize: u64,
    /// Content type of the binary part.
    pub media_type: String,
}

/// Terminal result of running a session through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Stored and finalized.
    Completed,
    /// A phase failed; the error was reported once.
    Failed(UploadError),
    /// Cancelled during transfer; nothing was reported.
    Aborted,
}

impl UploadOutcome {
    /// Returns true on the success path.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Collapse into a `Result`, mapping an abort to [`UploadError::Aborted`].
    ///
    /// # Errors
    ///
    /// Returns the failure, or `Aborted`.
    pub fn into_result(self) -> Result<(), UploadError> {
        match self {
            Self::Completed => Ok(()),
            Self::Failed(err) => Err(err),
            Self::Aborted => Err(UploadError::Aborted),
        }
    }
}
