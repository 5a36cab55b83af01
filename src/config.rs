//! Service configuration loaded from environment variables.
//!
//! A `.env` file is honoured (loaded by `main` through `dotenvy`).
//!
//! # Environment Variables
//!
//! ## Required (unless `DATABASE_URL` is set)
//! - `PG_USER`, `PG_PASSWORD`, `PG_DATABASE`
//!
//! ## Optional
//! - `HTTP_ADDR` - Query service bind address (default: 0.0.0.0:8080)
//! - `DATABASE_URL` - Full Postgres connection string, overrides the `PG_*` values
//! - `PG_HOST` (default: localhost), `PG_PORT` (default: 5432)
//! - `BUS_SERVER` - Kafka bootstrap servers (default: localhost:9092)
//! - `BUS_CLUSTER_ID` (default: order-cache), `BUS_CLIENT_ID` (default: order-cache-1)
//! - `BUS_SUBJECT` - Topic carrying orders (default: orders)
//! - `BUS_DURABLE_NAME` - Consumer group that remembers our position (default: order-cache-durable)
//! - `BUS_MAX_IN_FLIGHT` - Concurrent ingest workers (default: 16)
//! - `BUS_RETRY_BACKOFF_MS` - First retry delay after a store failure (default: 500)
//! - `STORE_TIMEOUT_MS` - Store connect and statement timeout (default: 5000)
//! - `SHUTDOWN_GRACE_SECS` - Time allowed for draining (default: 30)

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(String),
    #[error("Invalid environment variable {0}: {1}")]
    Invalid(String, String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub store: StoreConfig,
    pub bus: BusConfig,
    pub shutdown_grace: Duration,
}

/// Postgres connection parameters.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub url_override: Option<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("database", &self.database)
            .field("url_override", &self.url_override.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl StoreConfig {
    /// libpq connection string. Values are quoted so passwords may contain
    /// spaces or quotes.
    pub fn database_url(&self) -> String {
        if let Some(url) = &self.url_override {
            return url.clone();
        }
        format!(
            "host={} port={} user={} password={} dbname={}",
            quote(&self.host),
            self.port,
            quote(&self.user),
            quote(&self.password),
            quote(&self.database),
        )
    }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

#[derive(Debug, Clone)]
pub struct BusConfig {
    pub server: String,
    pub cluster_id: String,
    pub client_id: String,
    pub subject: String,
    pub durable_name: String,
    pub max_in_flight: u32,
    pub retry_backoff: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let url_override = env.optional("DATABASE_URL");
        let credential = |key: &str| match &url_override {
            Some(_) => Ok(env.optional(key).unwrap_or_default()),
            None => env.required(key),
        };

        let timeout_ms: u64 = env.parsed("STORE_TIMEOUT_MS", 5000)?;
        if timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "STORE_TIMEOUT_MS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let store = StoreConfig {
            host: env.or("PG_HOST", "localhost"),
            port: env.parsed("PG_PORT", 5432)?,
            user: credential("PG_USER")?,
            password: credential("PG_PASSWORD")?,
            database: credential("PG_DATABASE")?,
            url_override: url_override.clone(),
            timeout: Duration::from_millis(timeout_ms),
        };

        let max_in_flight: u32 = env.parsed("BUS_MAX_IN_FLIGHT", 16)?;
        if max_in_flight == 0 || max_in_flight as usize > Semaphore::MAX_PERMITS {
            return Err(ConfigError::Invalid(
                "BUS_MAX_IN_FLIGHT".to_string(),
                format!("must be between 1 and {}", Semaphore::MAX_PERMITS),
            ));
        }

        let bus = BusConfig {
            server: env.or("BUS_SERVER", "localhost:9092"),
            cluster_id: env.or("BUS_CLUSTER_ID", "order-cache"),
            client_id: env.or("BUS_CLIENT_ID", "order-cache-1"),
            subject: env.or("BUS_SUBJECT", "orders"),
            durable_name: env.or("BUS_DURABLE_NAME", "order-cache-durable"),
            max_in_flight,
            retry_backoff: Duration::from_millis(env.parsed("BUS_RETRY_BACKOFF_MS", 500)?),
        };

        Ok(AppConfig {
            http_addr: env.or("HTTP_ADDR", "0.0.0.0:8080"),
            store,
            bus,
            shutdown_grace: Duration::from_secs(env.parsed("SHUTDOWN_GRACE_SECS", 30)?),
        })
    }
}

struct Env<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw
                .parse()
                .map_err(|e: T::Err| ConfigError::Invalid(key.to_string(), e.to_string())),
            None => Ok(default),
        }
    }
}
