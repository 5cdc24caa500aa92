//! # task-logger
//!
//! Spawn tokio tasks whose failures are never silently dropped.
//!
//! [`spawn`] schedules a unit of work and attaches a completion observer.
//! When the work returns an error or panics, the observer logs it once
//! through a [`LogSink`] with caller-supplied context. Success and
//! cancellation are not logged.
//!
//! ```no_run
//! use task_logger::{CompletionContext, TracingSink};
//!
//! # async fn sync_user(_: &str) -> Result<(), std::io::Error> { Ok(()) }
//! # async fn run() -> task_logger::error::Result<()> {
//! let user = "user123";
//! let context = CompletionContext::new(TracingSink, "background sync for user %s failed").arg(user);
//! let handle = task_logger::spawn(sync_user(user), context, "sync", None)?;
//! # let _ = handle;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod handle;
pub mod outcome;
pub mod runtime;
pub mod sink;
pub mod spawner;
pub mod telemetry;

pub use context::{CompletionContext, MessageArg};
pub use handle::{TaskHandle, TaskId};
pub use outcome::{Failure, FailureKind, Outcome, TaskState};
pub use runtime::Runtime;
pub use sink::{FailureRecord, LogSink, RecordingSink, TracingSink};
pub use spawner::{Spawner, spawn, spawn_local};
