//! Direct-to-storage upload pipeline.
//!
//! A payload travels to the object store without passing through the
//! application server, which still authorizes and finalizes the upload:
//!
//! 1. [`UploadRequestBuilder`] validates the payload and builds the
//!    authorization request
//! 2. [`AuthorizationClient`] exchanges it for a storage target and signed fields
//! 3. [`StorageTransfer`] sends the payload to the store, with progress and abort
//! 4. [`CompletionNotifier`] reports the stored object back to the server
//!
//! [`UploadPipeline`] runs the phases in order over a [`Transport`].

mod abort;
mod authorize;
mod complete;
mod csrf;
mod error;
mod form;
mod observer;
mod pipeline;
mod progress;
mod request;
mod session;
mod transfer;
mod transport;
mod types;


pub use abort::AbortHandle;
pub use authorize::{AuthorizationClient, parse_authorization};
pub use complete::{CompletionNotifier, FILESIZE_FIELD, MEDIA_TYPE_FIELD, completion_body};
pub use csrf::AntiForgery;
pub use error::{ProtocolError, SessionError, TransportFailure, UploadError, ValidationError};
pub use form::FormFields;
pub use observer::{NoopObserver, UploadObserver};
pub use pipeline::{UploadPipeline, UploadTask};
pub use progress::ProgressTracker;
pub use request::UploadRequestBuilder;
pub use session::{SessionState, UploadSession, UploadSessionBuilder};
pub use transfer::{StorageTransfer, TransferOutcome};
pub use transport::{
    FilePart, FormRequest, HttpMethod, MultipartRequest, Transport, TransportResponse,
};
pub use types::{
    Authorization, FileDescription, Payload, Progress, TransferReceipt, UploadOutcome,
    base_filename,
};
