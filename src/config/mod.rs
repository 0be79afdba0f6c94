//! Configuration management
//!
//! This module provides YAML-based configuration management with support for:
//! - Environment variable overrides (including the variable names used by the
//!   existing dashboard deployment, such as `NEXT_PUBLIC_APP_URL`)
//! - Multiple configuration file locations
//! - Default values for all settings
//! - Selection of the data backend (Hasura GraphQL or local SQLite)
//! - Selection of the reset email provider

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub app: AppSettings,
    pub auth: AuthConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default = "default_database_config")]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path to static files directory (dashboard build output)
    #[serde(default = "default_static_dir")]
    pub static_dir: Option<PathBuf>,
    /// Whether to serve the dashboard SPA (enables fallback to index.html)
    #[serde(default = "default_serve_frontend")]
    pub serve_frontend: bool,
    /// Allowed CORS origins; empty means any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5051
}

fn default_static_dir() -> Option<PathBuf> {
    let path = PathBuf::from("frontend/out");
    if path.exists() {
        Some(path)
    } else {
        None
    }
}

fn default_serve_frontend() -> bool {
    true
}

/// Public-facing application settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppSettings {
    /// Base URL the browser uses to reach the dashboard; reset links are built from it
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Product name used in outgoing emails
    #[serde(default = "default_app_name")]
    pub name: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            name: default_app_name(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_app_name() -> String {
    "FutureKonnect".to_string()
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Shared HMAC secret for access tokens and reset tokens
    pub jwt_secret: String,
    #[serde(default = "default_token_expiry")]
    pub token_expiry_hours: u64,
    #[serde(default = "default_reset_token_expiry")]
    pub reset_token_expiry_hours: u64,
    #[serde(default = "default_password_min_length")]
    pub password_min_length: usize,
    /// Serve `POST /api/send-reset` and `POST /api/verify-token` for the existing browser client.
    /// Off unless set; `send-reset` then requires a bearer token and only signs links for the caller.
    #[serde(default = "default_legacy_token_endpoints")]
    pub legacy_token_endpoints: bool,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

fn default_token_expiry() -> u64 {
    12
}

fn default_reset_token_expiry() -> u64 {
    24
}

fn default_password_min_length() -> usize {
    8
}

fn default_legacy_token_endpoints() -> bool {
    false
}

/// Per-IP limits applied to the unauthenticated auth endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    #[serde(default = "default_requests_per_period")]
    pub requests_per_period: u32,
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            requests_per_period: default_requests_per_period(),
            period_secs: default_period_secs(),
            burst_size: default_burst_size(),
        }
    }
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_requests_per_period() -> u32 {
    5
}

fn default_period_secs() -> u64 {
    60
}

fn default_burst_size() -> u32 {
    3
}

/// Which data layer the service talks to
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Hasura GraphQL engine (production)
    #[default]
    Hasura,
    /// Local SQLite database (development, demos, tests)
    Sqlite,
}

/// Data backend configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
    #[serde(default)]
    pub hasura: Option<HasuraConfig>,
}

/// Hasura GraphQL endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HasuraConfig {
    /// GraphQL endpoint, e.g. `https://hasura.example.com/v1/graphql`
    pub url: String,
    #[serde(default)]
    pub admin_secret: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// GraphQL scalar used for `Users.id`
    #[serde(default = "default_id_type")]
    pub user_id_type: String,
    /// GraphQL scalar used for `tenants.id`
    #[serde(default = "default_id_type")]
    pub tenant_id_type: String,
}

fn default_timeout() -> u64 {
    30
}

fn default_id_type() -> String {
    "Int".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_database_config() -> DatabaseConfig {
    DatabaseConfig {
        url: "sqlite://./data/futurekonnect.db".to_string(),
        max_connections: default_max_connections(),
        min_connections: default_min_connections(),
        connect_timeout_secs: default_connect_timeout(),
        idle_timeout_secs: default_idle_timeout(),
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

/// Email provider used for reset links
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmailProvider {
    /// EmailJS REST API (the provider the dashboard has always used)
    #[default]
    EmailJs,
    /// Direct SMTP delivery
    Smtp,
    /// Log the recipient only; nothing is delivered
    Log,
}

/// Email configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub provider: EmailProvider,
    #[serde(default = "default_email_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub emailjs: Option<EmailJsConfig>,
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            provider: EmailProvider::default(),
            timeout_secs: default_email_timeout(),
            emailjs: None,
            smtp: None,
        }
    }
}

fn default_email_timeout() -> u64 {
    15
}

/// EmailJS credentials
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailJsConfig {
    #[serde(default = "default_emailjs_url")]
    pub api_url: String,
    pub service_id: String,
    pub template_id: String,
    pub public_key: String,
    /// Optional private key for server-side calls when "strict mode" is enabled
    #[serde(default)]
    pub private_key: Option<String>,
}

fn default_emailjs_url() -> String {
    "https://api.emailjs.com/api/v1.0/email/send".to_string()
}

/// SMTP relay settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Use STARTTLS on a plain connection instead of implicit TLS
    #[serde(default)]
    pub starttls: bool,
    pub from: String,
}

fn default_smtp_port() -> u16 {
    587
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Log output target (console, file or both)
    #[serde(default = "default_log_target")]
    pub target: LogTarget,
    /// Directory for log files (used when target is "file" or "both")
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Log file name prefix
    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,
    /// Rotate log files daily
    #[serde(default = "default_log_rotation")]
    pub daily_rotation: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            target: default_log_target(),
            log_dir: default_log_dir(),
            log_prefix: default_log_prefix(),
            daily_rotation: default_log_rotation(),
        }
    }
}

/// Log output target
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    #[default]
    Console,
    File,
    Both,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_log_target() -> LogTarget {
    LogTarget::Console
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/futurekonnect")
}

fn default_log_prefix() -> String {
    "futurekonnect-console".to_string()
}

fn default_log_rotation() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                static_dir: default_static_dir(),
                serve_frontend: default_serve_frontend(),
                cors_origins: Vec::new(),
            },
            app: AppSettings::default(),
            auth: AuthConfig {
                jwt_secret: "change-me-in-production-minimum-32-characters-long".to_string(),
                token_expiry_hours: default_token_expiry(),
                reset_token_expiry_hours: default_reset_token_expiry(),
                password_min_length: default_password_min_length(),
                legacy_token_endpoints: default_legacy_token_endpoints(),
                rate_limit: RateLimitSettings::default(),
            },
            backend: BackendConfig {
                kind: BackendKind::Sqlite,
                hasura: None,
            },
            database: default_database_config(),
            email: EmailConfig {
                provider: EmailProvider::Log,
                ..EmailConfig::default()
            },
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values
    /// 2. Configuration file (YAML)
    /// 3. Environment variables
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let config_path = std::env::var("FUTUREKONNECT_CONFIG")
            .map(PathBuf::from)
            .ok()
            .or_else(Self::find_config_file);

        let mut config = match config_path {
            Some(ref path) if path.exists() => {
                eprintln!("[CONFIG] Loading configuration from: {:?}", path);
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {:?}", path))?;
                serde_norway::from_str::<AppConfig>(&contents)
                    .with_context(|| format!("Failed to parse config file: {:?}", path))?
            }
            Some(ref path) => {
                eprintln!("[CONFIG] Config file not found: {:?}, using defaults", path);
                AppConfig::default()
            }
            None => {
                eprintln!("[CONFIG] No config file found, using defaults");
                AppConfig::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            PathBuf::from("config.yaml"),
            PathBuf::from("config/config.yaml"),
            PathBuf::from("/etc/futurekonnect/config.yaml"),
            dirs::config_dir()
                .map(|p| p.join("futurekonnect/config.yaml"))
                .unwrap_or_default(),
        ];

        paths.into_iter().find(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Server overrides
        if let Some(host) = var("FUTUREKONNECT_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("FUTUREKONNECT_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }

        // The dashboard has always published its origin as NEXT_PUBLIC_APP_URL
        if let Some(url) = var("APP_BASE_URL").or_else(|| var("NEXT_PUBLIC_APP_URL")) {
            self.app.base_url = url;
        }

        if let Some(secret) = var("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }

        if let Some(url) = var("DATABASE_URL") {
            self.database.url = url;
        }

        // Hasura overrides
        if let Some(url) = var("HASURA_GRAPHQL_URL") {
            let hasura = self.backend.hasura.get_or_insert_with(|| HasuraConfig {
                url: url.clone(),
                admin_secret: None,
                timeout_secs: default_timeout(),
                user_id_type: default_id_type(),
                tenant_id_type: default_id_type(),
            });
            hasura.url = url;
            self.backend.kind = BackendKind::Hasura;
        }
        if let Some(secret) = var("HASURA_ADMIN_SECRET") {
            if let Some(hasura) = self.backend.hasura.as_mut() {
                hasura.admin_secret = Some(secret);
            }
        }

        // EmailJS overrides
        let service_id = var("EMAILJS_SERVICE_ID");
        let template_id = var("EMAILJS_TEMPLATE_ID");
        let public_key = var("EMAILJS_PUBLIC_KEY");
        if let (Some(service_id), Some(template_id), Some(public_key)) =
            (service_id, template_id, public_key)
        {
            let emailjs = self.email.emailjs.get_or_insert_with(|| EmailJsConfig {
                api_url: default_emailjs_url(),
                service_id: String::new(),
                template_id: String::new(),
                public_key: String::new(),
                private_key: None,
            });
            emailjs.service_id = service_id;
            emailjs.template_id = template_id;
            emailjs.public_key = public_key;
            self.email.provider = EmailProvider::EmailJs;
        }

        // Logging overrides
        if let Some(level) = var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Some(format) = var("FUTUREKONNECT_LOG_FORMAT") {
            self.logging.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "compact" => LogFormat::Compact,
                _ => LogFormat::Pretty,
            };
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.len() < 32 {
            anyhow::bail!("JWT secret must be at least 32 characters long");
        }

        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        if self.app.base_url.trim().is_empty() {
            anyhow::bail!("Application base URL cannot be empty");
        }

        if self.auth.reset_token_expiry_hours == 0 {
            anyhow::bail!("Reset token expiry must be at least one hour");
        }

        match self.backend.kind {
            BackendKind::Hasura => match self.backend.hasura {
                Some(ref hasura) if !hasura.url.trim().is_empty() => {}
                _ => anyhow::bail!("Hasura backend selected but no GraphQL URL configured"),
            },
            BackendKind::Sqlite => {
                if self.database.url.is_empty() {
                    anyhow::bail!("Database URL cannot be empty");
                }
            }
        }

        match self.email.provider {
            EmailProvider::EmailJs => match self.email.emailjs {
                Some(ref emailjs)
                    if !emailjs.service_id.is_empty()
                        && !emailjs.template_id.is_empty()
                        && !emailjs.public_key.is_empty() => {}
                _ => anyhow::bail!(
                    "EmailJS provider selected but service id, template id or public key is missing"
                ),
            },
            EmailProvider::Smtp => match self.email.smtp {
                Some(ref smtp) if !smtp.host.is_empty() => {}
                _ => anyhow::bail!("SMTP provider selected but no SMTP host configured"),
            },
            EmailProvider::Log => {
                tracing::warn!("Email provider is 'log': reset emails will not be delivered");
            }
        }

        if let Some(ref static_dir) = self.server.static_dir {
            if !static_dir.exists() {
                tracing::warn!(
                    "Static directory does not exist: {:?}. Dashboard will not be served.",
                    static_dir
                );
            }
        }

        Ok(())
    }

    /// Create a default configuration file
    pub fn create_default_config(path: &PathBuf) -> Result<()> {
        let config = AppConfig::default();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = serde_norway::to_string(&config)?;
        std::fs::write(path, yaml)?;

        Ok(())
    }
}
