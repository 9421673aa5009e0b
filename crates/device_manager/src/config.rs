use anyhow::bail;
use common::postgres::PostgresConfig;
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[serde(default = "default_log_json")]
    pub log_json: bool,

    /// Service name attached to logs
    #[serde(default = "default_service_name")]
    pub service_name: String,

    // HTTP configuration
    /// HTTP server host
    #[serde(default = "default_http_host")]
    pub http_host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Per request deadline in seconds
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// HTTP paths to ignore in request logging (comma-separated)
    #[serde(default)]
    pub http_ignored_paths: String,

    // PostgreSQL configuration
    /// PostgreSQL host
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    /// PostgreSQL port
    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    /// PostgreSQL database name
    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    /// PostgreSQL username
    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    /// PostgreSQL password, required
    #[serde(default)]
    pub postgres_password: String,

    /// Maximum number of pooled connections
    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    /// Server side statement timeout in milliseconds
    #[serde(default = "default_postgres_statement_timeout_ms")]
    pub postgres_statement_timeout_ms: u64,

    /// Path to PostgreSQL migrations directory
    #[serde(default = "default_postgres_migrations_dir")]
    pub postgres_migrations_dir: String,

    /// Path to goose binary
    #[serde(default = "default_postgres_goose_binary_path")]
    pub postgres_goose_binary_path: String,

    /// Apply pending migrations at startup
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,

    /// Time allowed for closers once shutdown starts, in seconds
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_json() -> bool {
    true
}

fn default_service_name() -> String {
    "device-manager".to_string()
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "device_manager".to_string()
}

fn default_postgres_username() -> String {
    "postgres".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    10
}

fn default_postgres_statement_timeout_ms() -> u64 {
    5_000
}

fn default_postgres_migrations_dir() -> String {
    "crates/common/migrations/postgres".to_string()
}

fn default_postgres_goose_binary_path() -> String {
    "goose".to_string()
}

fn default_run_migrations() -> bool {
    true
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("DEVICE_MANAGER"))
            .build()?
            .try_deserialize()
    }

    /// Rejects settings the service cannot start with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.postgres_password.is_empty() {
            bail!("DEVICE_MANAGER_POSTGRES_PASSWORD must be set");
        }
        if self.http_timeout_secs == 0 {
            bail!("DEVICE_MANAGER_HTTP_TIMEOUT_SECS must be greater than zero");
        }
        if self.postgres_max_pool_size == 0 {
            bail!("DEVICE_MANAGER_POSTGRES_MAX_POOL_SIZE must be greater than zero");
        }
        Ok(())
    }

    pub fn postgres(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_database.clone(),
            username: self.postgres_username.clone(),
            password: self.postgres_password.clone(),
            max_pool_size: self.postgres_max_pool_size,
            statement_timeout_ms: self.postgres_statement_timeout_ms,
        }
    }

    pub fn ignored_paths(&self) -> Vec<String> {
        self.http_ignored_paths
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}
