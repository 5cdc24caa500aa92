//! Error types for task-logger.
//!
//! Failures raised by spawned work never show up here: they are contained
//! by the completion observer and reported through a log sink.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no active tokio runtime: {0}")]
    NoActiveRuntime(#[from] tokio::runtime::TryCurrentError),

    #[error("runtime is shut down; task was not scheduled")]
    RuntimeShutdown,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("telemetry error: {0}")]
    Telemetry(String),
}

pub type Result<T> = std::result::Result<T, Error>;
