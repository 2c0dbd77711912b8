//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Application server configuration.
    pub server: ServerConfig,
    /// Storage transfer configuration.
    #[serde(default)]
    pub transfer: TransferConfig,
    /// Upload validation configuration.
    #[serde(default)]
    pub upload: UploadConfig,
}

/// Application server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Session endpoint used for both authorization (POST) and completion (PATCH).
    pub endpoint: String,
    /// Origin of the page driving uploads. Defaults to the endpoint's own origin.
    #[serde(default)]
    pub origin: Option<String>,
    /// Anti-forgery token, when supplied directly.
    #[serde(default)]
    pub csrf_token: Option<String>,
    /// Raw `Cookie` header to extract the anti-forgery token from.
    #[serde(default)]
    pub cookie: Option<String>,
    /// Name of the cookie carrying the anti-forgery token.
    #[serde(default = "default_csrf_cookie")]
    pub csrf_cookie: String,
    /// Header the anti-forgery token is sent in.
    #[serde(default = "default_csrf_header")]
    pub csrf_header: String,
}

fn default_csrf_cookie() -> String {
    "csrftoken".to_string()
}

fn default_csrf_header() -> String {
    "X-CSRF-Token".to_string()
}

/// Storage transfer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferConfig {
    /// Multipart field name for the binary part.
    #[serde(default = "default_file_field")]
    pub file_field: String,
    /// Whole-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Size of the chunks the payload is streamed in.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_file_field() -> String {
    "file".to_string()
}

fn default_timeout() -> u64 {
    600 // 10 minutes
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_chunk_size() -> usize {
    64 * 1024
}

fn default_user_agent() -> String {
    concat!("uplink/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            file_field: default_file_field(),
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            chunk_size: default_chunk_size(),
            user_agent: default_user_agent(),
        }
    }
}

/// Upload validation configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadConfig {
    /// Accepted content types. Empty means unrestricted.
    #[serde(default)]
    pub allowed_types: Vec<String>,
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("UPLINK")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("upload.allowed_types")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_env_with_defaults() {
        temp_env::with_vars(
            [
                ("UPLINK__SERVER__ENDPOINT", Some("https://portal.test/uploads/1")),
                ("UPLINK__SERVER__CSRF_TOKEN", Some("tok")),
                ("UPLINK__UPLOAD__ALLOWED_TYPES", None),
                ("RUN_MODE", Some("test-nonexistent")),
            ],
            || {
                let config = AppConfig::load().expect("config should load");
                assert_eq!(config.server.endpoint, "https://portal.test/uploads/1");
                assert_eq!(config.server.csrf_token.as_deref(), Some("tok"));
                assert_eq!(config.server.csrf_header, "X-CSRF-Token");
                assert_eq!(config.server.csrf_cookie, "csrftoken");
                assert_eq!(config.transfer.file_field, "file");
                assert_eq!(config.transfer.chunk_size, 64 * 1024);
                assert!(config.upload.allowed_types.is_empty());
            },
        );
    }

    #[test]
    fn test_load_allowed_types_list() {
        temp_env::with_vars(
            [
                ("UPLINK__SERVER__ENDPOINT", Some("https://portal.test/uploads/1")),
                (
                    "UPLINK__UPLOAD__ALLOWED_TYPES",
                    Some("image/png,application/pdf"),
                ),
                ("RUN_MODE", Some("test-nonexistent")),
            ],
            || {
                let config = AppConfig::load().expect("config should load");
                assert_eq!(
                    config.upload.allowed_types,
                    vec!["image/png".to_string(), "application/pdf".to_string()]
                );
            },
        );
    }

    #[test]
    fn test_missing_endpoint_fails() {
        temp_env::with_vars(
            [
                ("UPLINK__SERVER__ENDPOINT", None::<&str>),
                ("RUN_MODE", Some("test-nonexistent")),
            ],
            || {
                assert!(AppConfig::load().is_err());
            },
        );
    }

    #[test]
    fn test_transfer_config_defaults() {
        let config = TransferConfig::default();
        assert_eq!(config.timeout_secs, 600);
        assert_eq!(config.connect_timeout_secs, 10);
        assert!(config.user_agent.starts_with("uplink/"));
    }
}
