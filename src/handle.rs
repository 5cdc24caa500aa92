//! The handle returned to whoever spawned a task.
//!
//! Holding the handle is optional. Dropping it detaches the task, which
//! keeps running and is still observed.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::{AbortHandle, JoinHandle};
use uuid::Uuid;

use crate::outcome::{Failure, Outcome, StateCell, TaskState, panic_message};

/// Newtype for spawned task IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity and shared state of a task, known before it is scheduled.
#[derive(Debug, Clone)]
pub(crate) struct TaskMeta {
    pub(crate) id: TaskId,
    pub(crate) name: Arc<str>,
    pub(crate) spawned_at: DateTime<Utc>,
    pub(crate) state: Arc<StateCell>,
}

impl TaskMeta {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            id: TaskId::new(),
            name: Arc::from(name),
            spawned_at: Utc::now(),
            state: Arc::new(StateCell::new()),
        }
    }
}

/// A scheduled task.
///
/// Await it to get the task's [`Outcome`]. Failures have already been
/// logged by the time the outcome is available.
#[derive(Debug)]
pub struct TaskHandle<T, E> {
    meta: TaskMeta,
    join: JoinHandle<Result<T, Failure<E>>>,
}

impl<T, E> TaskHandle<T, E> {
    pub(crate) fn new(meta: TaskMeta, join: JoinHandle<Result<T, Failure<E>>>) -> Self {
        Self { meta, join }
    }

    pub fn id(&self) -> TaskId {
        self.meta.id
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn spawned_at(&self) -> DateTime<Utc> {
        self.meta.spawned_at
    }

    /// Current state. Reading it has no effect on the task.
    pub fn state(&self) -> TaskState {
        self.meta.state.get()
    }

    /// Whether the task has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Request cancellation. A task that already finished is unaffected.
    pub fn cancel(&self) {
        self.join.abort();
    }

    /// A handle that can cancel the task from elsewhere.
    pub fn abort_handle(&self) -> AbortHandle {
        self.join.abort_handle()
    }
}

impl<T, E> Future for TaskHandle<T, E> {
    type Output = Outcome<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let outcome = match ready!(Pin::new(&mut this.join).poll(cx)) {
            Ok(Ok(value)) => Outcome::Succeeded(value),
            Ok(Err(failure)) => Outcome::Failed(failure),
            Err(e) if e.is_cancelled() => Outcome::Cancelled,
            // Work panics are caught inside the task; this only covers a
            // panic escaping the observer itself.
            Err(e) => Outcome::Failed(Failure::Panic(panic_message(&*e.into_panic()))),
        };
        Poll::Ready(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_displays_short_form() {
        let id = TaskId::new();
        let shown = id.to_string();
        assert_eq!(shown.len(), 8);
        assert!(id.0.to_string().starts_with(&shown));
    }

    #[test]
    fn task_meta_starts_pending() {
        let meta = TaskMeta::new("sync");
        assert_eq!(&*meta.name, "sync");
        assert_eq!(meta.state.get(), TaskState::Pending);
    }
}
