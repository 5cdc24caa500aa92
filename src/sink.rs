//! Log sinks: where task failures are reported.
//!
//! A sink may be shared by any number of tasks and is called from whichever
//! runtime thread finishes a task, so implementations must be `Send + Sync`.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};

use crate::context::MessageArg;
use crate::handle::TaskId;
use crate::outcome::FailureKind;

/// Anything that is both displayable and debuggable can be reported.
pub trait TaskError: fmt::Display + fmt::Debug {}

impl<T: fmt::Display + fmt::Debug + ?Sized> TaskError for T {}

/// Everything a sink learns about one failed task.
#[derive(Debug)]
pub struct FailureRecord<'a> {
    pub task_id: TaskId,
    pub task_name: &'a str,
    /// Template with arguments substituted.
    pub message: &'a str,
    pub template: &'a str,
    pub args: &'a [MessageArg],
    pub kind: FailureKind,
    pub failure: &'a dyn TaskError,
    /// Where a panic was raised. Returned errors carry their own context
    /// (an `anyhow::Error` prints its backtrace in `Debug`).
    pub backtrace: Option<&'a Backtrace>,
    pub spawned_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl FailureRecord<'_> {
    pub fn elapsed(&self) -> Duration {
        self.finished_at - self.spawned_at
    }

    /// The backtrace, if one was actually captured.
    pub fn captured_backtrace(&self) -> Option<&Backtrace> {
        self.backtrace
            .filter(|bt| bt.status() == BacktraceStatus::Captured)
    }
}

/// A destination for exception-level log records.
pub trait LogSink: Send + Sync {
    /// Record a task failure together with its error.
    fn exception(&self, record: &FailureRecord<'_>);
}

impl<S: LogSink + ?Sized> LogSink for Arc<S> {
    fn exception(&self, record: &FailureRecord<'_>) {
        (**self).exception(record)
    }
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Emits each failure as a `tracing` error event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn exception(&self, record: &FailureRecord<'_>) {
        tracing::error!(
            task.id = %record.task_id,
            task.name = record.task_name,
            task.elapsed_ms = record.elapsed().num_milliseconds(),
            failure.kind = record.kind.as_str(),
            error = %record.failure,
            error.detail = ?record.failure,
            backtrace = record.captured_backtrace().map(tracing::field::display),
            "{}",
            record.message,
        );
    }
}

// ---------------------------------------------------------------------------
// Closures
// ---------------------------------------------------------------------------

/// Adapts a closure into a sink.
#[derive(Clone)]
pub struct FnSink<F>(F);

pub fn from_fn<F>(f: F) -> FnSink<F>
where
    F: Fn(&FailureRecord<'_>) + Send + Sync,
{
    FnSink(f)
}

impl<F> LogSink for FnSink<F>
where
    F: Fn(&FailureRecord<'_>) + Send + Sync,
{
    fn exception(&self, record: &FailureRecord<'_>) {
        (self.0)(record)
    }
}

// ---------------------------------------------------------------------------
// Recording
// ---------------------------------------------------------------------------

/// Owned copy of a [`FailureRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedFailure {
    pub task_id: TaskId,
    pub task_name: String,
    pub message: String,
    pub template: String,
    pub args: Vec<String>,
    pub kind: FailureKind,
    pub error: String,
    pub error_detail: String,
    pub backtrace: Option<String>,
}

impl From<&FailureRecord<'_>> for RecordedFailure {
    fn from(record: &FailureRecord<'_>) -> Self {
        Self {
            task_id: record.task_id,
            task_name: record.task_name.to_string(),
            message: record.message.to_string(),
            template: record.template.to_string(),
            args: record.args.iter().map(|a| a.display().to_string()).collect(),
            kind: record.kind,
            error: record.failure.to_string(),
            error_detail: format!("{:?}", record.failure),
            backtrace: record.captured_backtrace().map(|bt| bt.to_string()),
        }
    }
}

/// Keeps every record in memory. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    records: Arc<Mutex<Vec<RecordedFailure>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn records(&self) -> Vec<RecordedFailure> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for RecordingSink {
    fn exception(&self, record: &FailureRecord<'_>) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedFailure::from(record));
    }
}
