use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

/// Embedded defaults mirroring `config/default.toml`.
const DEFAULTS_TOML: &str = r#"
    [server]
    host = "0.0.0.0"
    port = 8080
    request_timeout_secs = 30
    shutdown_timeout_secs = 30

    [database]
    url = ""
    max_connections = 20
    min_connections = 2
    connect_timeout_secs = 10
    idle_timeout_secs = 600

    [logging]
    level = "info"
    format = "json"

    [security]
    cors_origins = []

    [webhooks]
    user_agent = "WebhookEngine/1.0"
    retry_enabled = true
    retry_poll_interval_secs = 30
    retry_batch_size = 100
    retry_concurrency = 10
    stuck_pending_after_secs = 300
    cleanup_enabled = true
    delivery_retention_days = 30
"#;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub webhooks: WebhookConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// How long background jobs get to finish after a shutdown signal.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
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

impl From<&DatabaseConfig> for persistence::db::DatabaseConfig {
    fn from(c: &DatabaseConfig) -> Self {
        Self {
            url: c.url.clone(),
            max_connections: c.max_connections,
            min_connections: c.min_connections,
            connect_timeout_secs: c.connect_timeout_secs,
            idle_timeout_secs: c.idle_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `json` or `pretty`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityConfig {
    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Delivery engine settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// `User-Agent` sent with every delivery.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_true")]
    pub retry_enabled: bool,

    #[serde(default = "default_retry_poll_interval")]
    pub retry_poll_interval_secs: u64,

    /// Maximum deliveries picked up per retry run.
    #[serde(default = "default_retry_batch_size")]
    pub retry_batch_size: i64,

    /// Maximum attempts in flight during a retry run.
    #[serde(default = "default_retry_concurrency")]
    pub retry_concurrency: usize,

    /// Pending deliveries older than this are treated as abandoned and retried.
    #[serde(default = "default_stuck_pending_after")]
    pub stuck_pending_after_secs: u64,

    #[serde(default = "default_true")]
    pub cleanup_enabled: bool,

    #[serde(default = "default_delivery_retention_days")]
    pub delivery_retention_days: u32,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            retry_enabled: true,
            retry_poll_interval_secs: default_retry_poll_interval(),
            retry_batch_size: default_retry_batch_size(),
            retry_concurrency: default_retry_concurrency(),
            stuck_pending_after_secs: default_stuck_pending_after(),
            cleanup_enabled: true,
            delivery_retention_days: default_delivery_retention_days(),
        }
    }
}

impl WebhookConfig {
    pub fn stuck_pending_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stuck_pending_after_secs as i64)
    }

    pub fn retry_poll_interval(&self) -> Duration {
        Duration::from_secs(self.retry_poll_interval_secs)
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_shutdown_timeout() -> u64 {
    30
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    2
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_user_agent() -> String {
    "WebhookEngine/1.0".to_string()
}
fn default_true() -> bool {
    true
}
fn default_retry_poll_interval() -> u64 {
    30
}
fn default_retry_batch_size() -> i64 {
    100
}
fn default_retry_concurrency() -> usize {
    10
}
fn default_stuck_pending_after() -> u64 {
    300
}
fn default_delivery_retention_days() -> u32 {
    30
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Sources, later ones winning:
    /// 1. `config/default.toml`
    /// 2. `config/local.toml` (optional)
    /// 3. Environment variables with the WH__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("WH").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Build configuration from embedded defaults plus overrides, without
    /// touching the file system. Validation is skipped.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(DEFAULTS_TOML, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "WH__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.webhooks.user_agent.trim().is_empty() {
            return Err(ConfigValidationError::InvalidValue(
                "webhooks.user_agent cannot be empty".to_string(),
            ));
        }

        if self.webhooks.retry_batch_size < 1 {
            return Err(ConfigValidationError::InvalidValue(
                "webhooks.retry_batch_size must be at least 1".to_string(),
            ));
        }

        if self.webhooks.retry_concurrency < 1 {
            return Err(ConfigValidationError::InvalidValue(
                "webhooks.retry_concurrency must be at least 1".to_string(),
            ));
        }

        if self.webhooks.retry_poll_interval_secs < 1 {
            return Err(ConfigValidationError::InvalidValue(
                "webhooks.retry_poll_interval_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigValidationError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| {
                ConfigValidationError::InvalidValue(format!("Invalid server address: {}", e))
            })
    }
}
