//! Typed configuration from environment variables.
//!
//! In local dev, call `dotenvy::dotenv().ok()` before loading.

use crate::error::{Error, Result};
use crate::telemetry::TelemetryConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub otel_endpoint: Option<String>,
    pub service_name: String,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// - `OTEL_ENDPOINT`: OTLP collector; stdout only when unset
    /// - `OTEL_SERVICE_NAME`: defaults to `task-logger`
    /// - `LOG_LEVEL`: `EnvFilter` directive, defaults to `info`
    pub fn from_env() -> Result<Self> {
        let log_level = optional_var("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        tracing_subscriber::EnvFilter::try_new(&log_level)
            .map_err(|e| Error::Config(format!("LOG_LEVEL {log_level:?} is not a valid filter: {e}")))?;

        Ok(Self {
            otel_endpoint: optional_var("OTEL_ENDPOINT"),
            service_name: optional_var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|| "task-logger".to_string()),
            log_level,
        })
    }

    pub fn telemetry(&self) -> TelemetryConfig {
        TelemetryConfig {
            endpoint: self.otel_endpoint.clone(),
            service_name: self.service_name.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

/// Unset and blank are treated the same.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
