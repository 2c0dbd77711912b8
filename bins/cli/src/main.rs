//! Uplink command-line uploader
//!
//! Usage:
//!     uplink ./report.pdf application/pdf step=3 title=Quarterly

mod report;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use uplink_client::HttpTransport;
use tokio::task::JoinError;
use uplink_core::upload::{
    AbortHandle, AntiForgery, FormFields, Payload, UploadObserver, UploadOutcome, UploadPipeline,
    UploadSession,
};
use uplink_shared::{AppConfig, AppError, ServerConfig};

use report::ProgressLog;

#[derive(Parser, Debug)]
#[command(name = "uplink", about = "Upload a file straight to object storage")]
struct Args {
    /// File to upload
    file: PathBuf,

    /// Content type of the file
    content_type: String,

    /// Extra form fields sent with the authorization request
    #[arg(value_parser = parse_field)]
    fields: Vec<(String, String)>,
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "uplink=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    match upload(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err.downcast_ref::<AppError>().map_or(1, AppError::exit_code);
            error!("Upload failed: {err:#}");
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

async fn upload(args: Args) -> anyhow::Result<()> {
    let config = AppConfig::load().map_err(AppError::from)?;
    let endpoint = Url::parse(&config.server.endpoint)
        .map_err(|e| AppError::Configuration(format!("invalid server.endpoint: {e}")))?;
    let anti_forgery = anti_forgery(&config.server, &endpoint)?;

    let payload = Payload::from_path(&args.file, args.content_type)
        .await
        .map_err(AppError::from)
        .with_context(|| format!("reading {}", args.file.display()))?;
    info!(
        filename = %payload.filename(),
        bytes = payload.len(),
        endpoint = %endpoint,
        "Payload loaded"
    );

    let session = UploadSession::builder(endpoint)
        .payload(payload)
        .allowed_types(config.upload.allowed_types.iter().cloned())
        .metadata(args.fields.into_iter().collect::<FormFields>())
        .file_field(config.transfer.file_field.as_str())
        .build()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let transport = HttpTransport::from_config(&config.transfer).map_err(AppError::from)?;
    let pipeline = Arc::new(
        UploadPipeline::new(Arc::new(transport), anti_forgery)
            .with_file_field(config.transfer.file_field.as_str()),
    );

    let observer: Arc<dyn UploadObserver> = Arc::new(ProgressLog::default());
    let task = pipeline
        .spawn(session, observer)
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let abort = task.abort_handle();
    let (session, outcome) = supervise(task.join(), &abort, tokio::signal::ctrl_c).await?;

    outcome.into_result().map_err(AppError::from)?;
    info!(
        session_id = %session.id(),
        filename = %session.payload().filename(),
        bytes = session.payload().len(),
        "Upload complete"
    );
    Ok(())
}

/// Wait for the upload, aborting it on the first interrupt.
///
/// A second interrupt exits without waiting for the upload to settle.
async fn supervise<J, I, F>(
    join: J,
    abort: &AbortHandle,
    mut interrupted: I,
) -> anyhow::Result<(UploadSession, UploadOutcome)>
where
    J: Future<Output = Result<(UploadSession, UploadOutcome), JoinError>>,
    I: FnMut() -> F,
    F: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(join);

    tokio::select! {
        joined = &mut join => return Ok(joined.map_err(|e| AppError::Internal(e.to_string()))?),
        Ok(()) = interrupted() => {}
    }
    warn!("Interrupted, aborting upload");
    abort.abort();

    tokio::select! {
        joined = &mut join => Ok(joined.map_err(|e| AppError::Internal(e.to_string()))?),
        Ok(()) = interrupted() => {
            warn!("Interrupted again, exiting");
            Err(AppError::Aborted.into())
        }
    }
}

/// Token from config, or from the configured cookie.
fn anti_forgery(server: &ServerConfig, endpoint: &Url) -> Result<AntiForgery, AppError> {
    let page = match &server.origin {
        Some(origin) => Url::parse(origin)
            .map_err(|e| AppError::Configuration(format!("invalid server.origin: {e}")))?,
        None => endpoint.clone(),
    };

    let token = if let Some(token) = &server.csrf_token {
        AntiForgery::new(token.as_str(), &page)
    } else {
        server
            .cookie
            .as_deref()
            .and_then(|cookie| AntiForgery::from_cookie_header(cookie, &server.csrf_cookie, &page))
            .ok_or_else(|| {
                AppError::Configuration(format!(
                    "no anti-forgery token: set server.csrf_token or a server.cookie with '{}'",
                    server.csrf_cookie
                ))
            })?
    };

    Ok(token.with_header(server.csrf_header.as_str()))
}
