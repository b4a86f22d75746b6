//! Application configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Object storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Slip verification service configuration.
    pub slip: SlipConfig,
    /// Receiving bank account configuration.
    pub payment: PaymentConfig,
    /// OAuth identity provider configuration.
    pub oauth: OAuthConfig,
    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,
    /// Outgoing e-mail configuration (optional).
    #[serde(default)]
    pub email: Option<EmailConfig>,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this backend.
    pub url: String,
    /// Frontend URL users are redirected to after login.
    pub frontend_url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Object storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Base path for stored objects.
    #[serde(default = "default_storage_path")]
    pub base_path: PathBuf,
    /// Base URL under which objects are served.
    #[serde(default = "default_storage_url")]
    pub base_url: String,
    /// Bucket uploaded files are written to.
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Secret used to sign object URLs.
    #[serde(default)]
    pub signing_secret: String,
    /// Lifetime of signed URLs in seconds.
    #[serde(default = "default_signed_url_ttl")]
    pub signed_url_ttl_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: default_storage_path(),
            base_url: default_storage_url(),
            bucket: default_bucket(),
            signing_secret: String::new(),
            signed_url_ttl_secs: default_signed_url_ttl(),
        }
    }
}

/// Slip verification (`EasySlip`) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SlipConfig {
    /// Verification endpoint.
    #[serde(default = "default_slip_api_url")]
    pub api_url: String,
    /// Bearer API key.
    pub api_key: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Receiving bank account configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Platform account number, separators allowed (e.g. `123-4-56789-0`).
    pub account_number: String,
}

/// OAuth configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    /// Google client ID.
    pub google_client_id: String,
    /// Google client secret.
    pub google_client_secret: String,
    /// Redirect URI registered with Google.
    pub google_redirect_uri: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Session lifetime in seconds.
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: i64,
    /// Mark the session cookie `Secure`.
    #[serde(default)]
    pub cookie_secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl(),
            cookie_secure: false,
        }
    }
}

/// Outgoing e-mail configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Delivery provider.
    pub provider: EmailProviderConfig,
    /// From address.
    pub from_address: String,
    /// IANA timezone used when rendering dates in e-mails.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

/// E-mail delivery provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EmailProviderConfig {
    /// Resend HTTP API.
    Resend {
        /// API key.
        api_key: String,
    },
    /// SMTP relay.
    Smtp {
        /// SMTP host.
        host: String,
        /// SMTP port.
        #[serde(default = "default_smtp_port")]
        port: u16,
        /// Username.
        #[serde(default)]
        username: Option<String>,
        /// Password.
        #[serde(default)]
        password: Option<String>,
    },
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./files")
}

fn default_storage_url() -> String {
    "/files".to_string()
}

fn default_bucket() -> String {
    "enrollo".to_string()
}

const fn default_signed_url_ttl() -> u64 {
    24 * 60 * 60
}

fn default_slip_api_url() -> String {
    "https://developer.easyslip.com/api/v1/verify".to_string()
}

const fn default_timeout_secs() -> u64 {
    10
}

const fn default_session_ttl() -> i64 {
    3 * 24 * 60 * 60
}

fn default_timezone() -> String {
    "Asia/Bangkok".to_string()
}

const fn default_smtp_port() -> u16 {
    587
}

/// Mask a secret for logging, keeping a short prefix and suffix.
#[must_use]
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `ENROLLO_ENV`)
    /// 4. Environment variables with `ENROLLO_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("ENROLLO_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("ENROLLO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("ENROLLO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Log the effective configuration with secrets masked.
    pub fn log_summary(&self) {
        tracing::info!(
            server_url = %self.server.url,
            frontend_url = %self.server.frontend_url,
            database_url = %mask_secret(&self.database.url),
            storage_path = %self.storage.base_path.display(),
            bucket = %self.storage.bucket,
            slip_api_url = %self.slip.api_url,
            slip_api_key = %mask_secret(&self.slip.api_key),
            account_number = %mask_secret(&self.payment.account_number),
            google_client_id = %mask_secret(&self.oauth.google_client_id),
            email_enabled = self.email.is_some(),
            "Configuration loaded"
        );
    }
}
