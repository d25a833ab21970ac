//! # Application State
//!
//! Shared state for the Axum application: the lifecycle engine, event log
//! and analytics service, all wired to the same catalog, store and clock.
//! In-memory by default; `bootstrap` swaps in the Postgres implementations
//! when a database is configured.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use grievance_analytics::AnalyticsService;
use grievance_catalog::{InMemoryCatalog, TemplateCatalog};
use grievance_core::{Clock, SystemClock};
use grievance_lifecycle::{EventLog, GrievanceStore, InMemoryStore, RetryPolicy, StepProgressionEngine};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use thiserror::Error;

// -- Configuration ------------------------------------------------------------

/// Log output format for the server binary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// A configuration value that could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {key}={value:?}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Application configuration.
///
/// Custom `Debug` redacts the auth token and database URL.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Shared secret for bearer tokens. `None` disables token checks.
    pub auth_token: Option<String>,
    /// Postgres connection string. `None` runs in memory.
    pub database_url: Option<String>,
    /// YAML file of bargaining units, agreements and templates loaded at startup.
    pub reference_data: Option<PathBuf>,
    /// Retry policy for every mutating operation.
    pub retry: RetryPolicy,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("reference_data", &self.reference_data)
            .field("retry", &self.retry)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            database_url: None,
            reference_data: None,
            retry: RetryPolicy::default(),
            log_format: LogFormat::Text,
        }
    }
}

impl AppConfig {
    /// Build configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Unset and blank
    /// values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let port = match get("PORT") {
            Some(v) => parse_number("PORT", &v)?,
            None => defaults.port,
        };

        let mut retry = defaults.retry;
        if let Some(v) = get("RETRY_MAX_ATTEMPTS") {
            retry.max_attempts = parse_number("RETRY_MAX_ATTEMPTS", &v)?;
            if retry.max_attempts == 0 {
                return Err(ConfigError {
                    key: "RETRY_MAX_ATTEMPTS",
                    value: v,
                    reason: "must be at least 1".into(),
                });
            }
        }
        if let Some(v) = get("RETRY_BASE_DELAY_MS") {
            let ms: u64 = parse_number("RETRY_BASE_DELAY_MS", &v)?;
            retry.base_delay = Duration::from_millis(ms);
            retry.max_delay = retry.max_delay.max(retry.base_delay);
        }

        let log_format = match get("LOG_FORMAT").as_deref().map(str::to_ascii_lowercase) {
            None => LogFormat::Text,
            Some(f) if f == "text" => LogFormat::Text,
            Some(f) if f == "json" => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError {
                    key: "LOG_FORMAT",
                    value: other,
                    reason: "expected 'text' or 'json'".into(),
                })
            }
        };

        Ok(Self {
            port,
            auth_token: get("AUTH_TOKEN"),
            database_url: get("DATABASE_URL"),
            reference_data: get("REFERENCE_DATA").map(PathBuf::from),
            retry,
            log_format,
        })
    }
}

fn parse_number<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

// -- State --------------------------------------------------------------------

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: StepProgressionEngine,
    pub events: EventLog,
    pub analytics: AnalyticsService,
    pub catalog: Arc<dyn TemplateCatalog>,
    pub store: Arc<dyn GrievanceStore>,
    pub clock: Arc<dyn Clock>,
    /// Present when running against Postgres.
    pub db_pool: Option<PgPool>,
    /// Present when the Prometheus recorder was installed.
    pub prometheus: Option<PrometheusHandle>,
    pub config: AppConfig,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("engine", &self.engine)
            .field("db_pool", &self.db_pool.is_some())
            .field("prometheus", &self.prometheus.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// In-memory state with default configuration.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// In-memory state with the given configuration and the system clock.
    pub fn with_config(config: AppConfig) -> Self {
        Self::from_parts(
            config,
            Arc::new(InMemoryCatalog::new()),
            Arc::new(InMemoryStore::new()),
            Arc::new(SystemClock),
            None,
        )
    }

    /// Wire the services over explicit backends.
    pub fn from_parts(
        config: AppConfig,
        catalog: Arc<dyn TemplateCatalog>,
        store: Arc<dyn GrievanceStore>,
        clock: Arc<dyn Clock>,
        db_pool: Option<PgPool>,
    ) -> Self {
        let engine = StepProgressionEngine::new(
            catalog.clone(),
            store.clone(),
            clock.clone(),
            config.retry,
        );
        let events = EventLog::new(store.clone(), clock.clone(), config.retry);
        let analytics = AnalyticsService::new(catalog.clone(), store.clone(), clock.clone());
        Self {
            engine,
            events,
            analytics,
            catalog,
            store,
            clock,
            db_pool,
            prometheus: None,
            config,
        }
    }

    /// Attach the Prometheus handle rendered at `/metrics`.
    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.auth_token.is_none());
        assert!(config.database_url.is_none());
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn reads_every_key() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PORT", "9090"),
            ("AUTH_TOKEN", "s3cret"),
            ("DATABASE_URL", "postgres://localhost/grievances"),
            ("REFERENCE_DATA", "/etc/grievance/reference.yaml"),
            ("RETRY_MAX_ATTEMPTS", "6"),
            ("RETRY_BASE_DELAY_MS", "10"),
            ("LOG_FORMAT", "JSON"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.auth_token.as_deref(), Some("s3cret"));
        assert_eq!(config.retry.max_attempts, 6);
        assert_eq!(config.retry.base_delay, Duration::from_millis(10));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.reference_data,
            Some(PathBuf::from("/etc/grievance/reference.yaml"))
        );
    }

    #[test]
    fn blank_values_are_unset() {
        let config = AppConfig::from_lookup(lookup(&[("AUTH_TOKEN", "  ")])).unwrap();
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn bad_numbers_name_the_key() {
        let err = AppConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert_eq!(err.key, "PORT");
        let err = AppConfig::from_lookup(lookup(&[("RETRY_MAX_ATTEMPTS", "0")])).unwrap_err();
        assert_eq!(err.key, "RETRY_MAX_ATTEMPTS");
        let err = AppConfig::from_lookup(lookup(&[("LOG_FORMAT", "xml")])).unwrap_err();
        assert_eq!(err.key, "LOG_FORMAT");
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = AppConfig {
            auth_token: Some("super-secret".into()),
            database_url: Some("postgres://user:pw@db/grievances".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("pw@db"));
        assert!(debug.contains("[REDACTED]"));
    }
}
