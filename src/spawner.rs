//! Supervised spawning: schedule work and make sure its failures get logged.
//!
//! The completion observer travels inside the scheduled future, so it is in
//! place before the task can possibly run and fires on the thread that
//! finishes the task. It fires exactly once, for whichever terminal state
//! comes first:
//!
//! - succeeded: nothing is logged
//! - failed (error or panic): one exception-level call on the sink
//! - cancelled (future dropped unfinished): nothing is logged

use std::backtrace::Backtrace;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt as _;
use tokio::task::{JoinHandle, LocalSet};
use tracing::{Instrument, Span};

use crate::context::CompletionContext;
use crate::error::{Error, Result};
use crate::handle::{TaskHandle, TaskMeta};
use crate::outcome::{
    Failure, TaskState, install_backtrace_hook, panic_message, take_panic_backtrace,
};
use crate::runtime::Runtime;
use crate::sink::{FailureRecord, LogSink};
use crate::telemetry::metrics;
use crate::telemetry::task::{record_terminal_state, start_task_span};

/// Schedule `work` on `runtime` (or the ambient runtime when `None`).
///
/// Returns immediately. If `work` fails, `context`'s sink receives one
/// exception-level record; its error never reaches the caller except through
/// the handle.
///
/// # Errors
///
/// [`Error::NoActiveRuntime`] when no runtime is given and none is active.
/// Nothing is scheduled in that case.
///
/// [`Error::RuntimeShutdown`] when the runtime has shut down and dropped
/// the work without running it.
pub fn spawn<F, T, E>(
    work: F,
    context: CompletionContext,
    name: &str,
    runtime: Option<&Runtime>,
) -> Result<TaskHandle<T, E>>
where
    F: Future<Output = std::result::Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: fmt::Display + fmt::Debug + Send + 'static,
{
    let runtime = Runtime::resolve(runtime)?;
    let (meta, task) = supervise(work, context, name);
    let join = runtime.handle().spawn(task);
    scheduled(meta, join)
}

/// A shut-down runtime drops the task inside `spawn`, so it is already
/// cancelled by the time `spawn` returns.
fn scheduled<T, E>(
    meta: TaskMeta,
    join: JoinHandle<std::result::Result<T, Failure<E>>>,
) -> Result<TaskHandle<T, E>> {
    if meta.state.get() == TaskState::Cancelled {
        tracing::warn!(
            task.id = %meta.id,
            task.name = %meta.name,
            "runtime is shut down, task not scheduled"
        );
        return Err(Error::RuntimeShutdown);
    }
    Ok(TaskHandle::new(meta, join))
}

/// Schedule `!Send` work on a `LocalSet`.
///
/// The task makes progress once the set is driven, e.g. with
/// [`LocalSet::run_until`].
pub fn spawn_local<F, T, E>(
    work: F,
    context: CompletionContext,
    name: &str,
    local: &LocalSet,
) -> TaskHandle<T, E>
where
    F: Future<Output = std::result::Result<T, E>> + 'static,
    T: 'static,
    E: fmt::Display + fmt::Debug + 'static,
{
    let (meta, task) = supervise(work, context, name);
    let join = local.spawn_local(task);
    TaskHandle::new(meta, join)
}

/// Wrap `work` with its completion observer and span.
fn supervise<F, T, E>(
    work: F,
    context: CompletionContext,
    name: &str,
) -> (
    TaskMeta,
    impl Future<Output = std::result::Result<T, Failure<E>>> + use<F, T, E>,
)
where
    F: Future<Output = std::result::Result<T, E>>,
    E: fmt::Display + fmt::Debug,
{
    install_backtrace_hook();
    let meta = TaskMeta::new(name);
    let span = start_task_span(name, &meta.id);
    metrics::tasks_spawned().add(1, &[]);
    span.in_scope(|| tracing::debug!("task spawned"));

    // Built outside the async block: an unpolled future still owns it, so
    // cancelling before the first poll is observed too.
    let observer = Observer {
        meta: meta.clone(),
        context,
        span: span.clone(),
        armed: true,
    };

    let task = async move {
        let mut backtrace = None;
        let result = match AssertUnwindSafe(work).catch_unwind().await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(Failure::Error(error)),
            Err(payload) => {
                backtrace = take_panic_backtrace();
                Err(Failure::Panic(panic_message(&*payload)))
            }
        };
        match &result {
            Ok(_) => observer.succeeded(),
            Err(failure) => observer.failed(failure, backtrace.as_ref()),
        }
        result
    }
    .instrument(span);

    (meta, task)
}

/// Fires once, either explicitly on completion or from `Drop` on
/// cancellation.
struct Observer {
    meta: TaskMeta,
    context: CompletionContext,
    span: Span,
    armed: bool,
}

impl Observer {
    fn succeeded(mut self) {
        self.finish(TaskState::Succeeded);
    }

    fn failed<E>(mut self, failure: &Failure<E>, backtrace: Option<&Backtrace>)
    where
        E: fmt::Display + fmt::Debug,
    {
        if self.finish(TaskState::Failed) {
            self.report(failure, backtrace);
        }
    }

    /// Disarm and move the shared state. `false` if it was already terminal.
    fn finish(&mut self, state: TaskState) -> bool {
        self.armed = false;
        if !self.meta.state.finish(state) {
            return false;
        }
        let elapsed_ms = (Utc::now() - self.meta.spawned_at)
            .num_microseconds()
            .map_or(f64::MAX, |us| us as f64 / 1000.0);
        metrics::record_finished(state, elapsed_ms);
        record_terminal_state(&self.span, state);
        true
    }

    fn report<E>(&self, failure: &Failure<E>, backtrace: Option<&Backtrace>)
    where
        E: fmt::Display + fmt::Debug,
    {
        let message = self.context.render();
        let record = FailureRecord {
            task_id: self.meta.id,
            task_name: &self.meta.name,
            message: &message,
            template: self.context.message(),
            args: self.context.message_args(),
            kind: failure.kind(),
            failure,
            backtrace,
            spawned_at: self.meta.spawned_at,
            finished_at: Utc::now(),
        };

        // The observer is the last stop: a misbehaving sink must not take
        // the task down with it.
        let sink = self.context.sink();
        let delivered = std::panic::catch_unwind(AssertUnwindSafe(|| sink.exception(&record)));
        if let Err(payload) = delivered {
            tracing::warn!(
                task.id = %self.meta.id,
                panic = %panic_message(&*payload),
                "log sink panicked while reporting task failure"
            );
        }
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        if self.armed {
            self.finish(TaskState::Cancelled);
        }
    }
}

/// A runtime and a shared sink, threaded through call sites as one value.
#[derive(Clone)]
pub struct Spawner {
    runtime: Runtime,
    sink: Arc<dyn LogSink>,
}

impl Spawner {
    pub fn new<S>(runtime: Runtime, sink: S) -> Self
    where
        S: LogSink + 'static,
    {
        Self {
            runtime,
            sink: Arc::new(sink),
        }
    }

    /// Bind to the runtime the caller is executing under.
    pub fn current<S>(sink: S) -> Result<Self>
    where
        S: LogSink + 'static,
    {
        Ok(Self::new(Runtime::current()?, sink))
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// A completion context that reports to this spawner's sink.
    pub fn context(&self, message: impl Into<String>) -> CompletionContext {
        CompletionContext::with_shared_sink(Arc::clone(&self.sink), message)
    }

    /// Like [`spawn`], on this spawner's runtime.
    ///
    /// # Errors
    ///
    /// [`Error::RuntimeShutdown`] when the bound runtime has shut down.
    pub fn spawn<F, T, E>(
        &self,
        work: F,
        context: CompletionContext,
        name: &str,
    ) -> Result<TaskHandle<T, E>>
    where
        F: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: fmt::Display + fmt::Debug + Send + 'static,
    {
        let (meta, task) = supervise(work, context, name);
        let join = self.runtime.handle().spawn(task);
        scheduled(meta, join)
    }
}

impl fmt::Debug for Spawner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spawner")
            .field("runtime", &self.runtime)
            .finish_non_exhaustive()
    }
}
