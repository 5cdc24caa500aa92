//! Task outcomes and the per-task state machine.
//!
//! ```text
//! pending -> succeeded | failed | cancelled
//! ```
//!
//! All three right-hand states are terminal.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::fmt;
use std::sync::Once;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Failure
// ---------------------------------------------------------------------------

/// Why a task failed: an error it returned, or a panic.
pub enum Failure<E> {
    Error(E),
    Panic(String),
}

impl<E> Failure<E> {
    pub fn kind(&self) -> FailureKind {
        match self {
            Failure::Error(_) => FailureKind::Error,
            Failure::Panic(_) => FailureKind::Panic,
        }
    }

    /// The returned error, if the task did not panic.
    pub fn into_error(self) -> Option<E> {
        match self {
            Failure::Error(e) => Some(e),
            Failure::Panic(_) => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for Failure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Error(e) => e.fmt(f),
            Failure::Panic(msg) => write!(f, "task panicked: {msg}"),
        }
    }
}

impl<E: fmt::Debug> fmt::Debug for Failure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Forward untouched so error reports (anyhow backtraces) survive.
            Failure::Error(e) => e.fmt(f),
            Failure::Panic(msg) => write!(f, "panic: {msg:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Error,
    Panic,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Error => "error",
            FailureKind::Panic => "panic",
        }
    }
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

thread_local! {
    static PANIC_BACKTRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

/// Chain a panic hook that keeps a backtrace of the latest panic on each
/// thread. The previous hook still runs, so panics print as before.
pub(crate) fn install_backtrace_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let _ = PANIC_BACKTRACE.try_with(|slot| {
                if let Ok(mut slot) = slot.try_borrow_mut() {
                    *slot = Some(Backtrace::force_capture());
                }
            });
            previous(info);
        }));
    });
}

/// Take the backtrace of the panic that just unwound on this thread.
pub(crate) fn take_panic_backtrace() -> Option<Backtrace> {
    PANIC_BACKTRACE
        .try_with(|slot| slot.try_borrow_mut().ok().and_then(|mut slot| slot.take()))
        .ok()
        .flatten()
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Terminal result of a spawned task.
#[derive(Debug)]
pub enum Outcome<T, E> {
    Succeeded(T),
    Failed(Failure<E>),
    Cancelled,
}

impl<T, E> Outcome<T, E> {
    pub fn state(&self) -> TaskState {
        match self {
            Outcome::Succeeded(_) => TaskState::Succeeded,
            Outcome::Failed(_) => TaskState::Failed,
            Outcome::Cancelled => TaskState::Cancelled,
        }
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, Outcome::Succeeded(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    /// The success value, discarding failures and cancellation.
    pub fn succeeded(self) -> Option<T> {
        match self {
            Outcome::Succeeded(v) => Some(v),
            _ => None,
        }
    }

    /// The failure, if the task failed.
    pub fn failure(self) -> Option<Failure<E>> {
        match self {
            Outcome::Failed(f) => Some(f),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle state of a spawned task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Scheduled or running.
    Pending,
    /// Work returned `Ok`. Terminal.
    Succeeded,
    /// Work returned `Err` or panicked. Terminal.
    Failed,
    /// Work was dropped before finishing. Terminal.
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskState::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => TaskState::Succeeded,
            2 => TaskState::Failed,
            3 => TaskState::Cancelled,
            _ => TaskState::Pending,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared state cell between a task's observer and its handle.
///
/// Only one transition out of `Pending` is ever accepted.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(TaskState::Pending as u8))
    }

    pub(crate) fn get(&self) -> TaskState {
        TaskState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to a terminal state. Returns `false` if already terminal.
    pub(crate) fn finish(&self, to: TaskState) -> bool {
        debug_assert!(to.is_terminal());
        self.0
            .compare_exchange(
                TaskState::Pending as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_cell_accepts_one_terminal_transition() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), TaskState::Pending);

        assert!(cell.finish(TaskState::Failed));
        assert_eq!(cell.get(), TaskState::Failed);

        assert!(!cell.finish(TaskState::Cancelled));
        assert!(!cell.finish(TaskState::Succeeded));
        assert_eq!(cell.get(), TaskState::Failed);
    }

    #[test]
    fn outcome_reports_its_state() {
        let ok: Outcome<u32, String> = Outcome::Succeeded(42);
        assert_eq!(ok.state(), TaskState::Succeeded);
        assert_eq!(ok.succeeded(), Some(42));

        let failed: Outcome<u32, String> = Outcome::Failed(Failure::Error("bad".into()));
        assert_eq!(failed.state(), TaskState::Failed);
        assert_eq!(failed.failure().and_then(Failure::into_error).as_deref(), Some("bad"));

        let cancelled: Outcome<u32, String> = Outcome::Cancelled;
        assert!(cancelled.is_cancelled());
        assert!(cancelled.state().is_terminal());
    }

    #[test]
    fn failure_display_distinguishes_panics() {
        let err: Failure<&str> = Failure::Error("bad input");
        assert_eq!(err.to_string(), "bad input");
        assert_eq!(err.kind(), FailureKind::Error);

        let panic: Failure<&str> = Failure::Panic("boom".into());
        assert_eq!(panic.to_string(), "task panicked: boom");
        assert_eq!(panic.kind(), FailureKind::Panic);
    }

    #[test]
    fn panic_message_handles_common_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(&*payload), "static str");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*payload), "owned");

        let payload: Box<dyn Any + Send> = Box::new(17_u32);
        assert_eq!(panic_message(&*payload), "Box<dyn Any>");
    }

    #[test]
    fn backtrace_hook_keeps_latest_panic() {
        install_backtrace_hook();
        let _ = take_panic_backtrace();

        let caught = std::panic::catch_unwind(|| panic!("captured"));
        assert!(caught.is_err());

        assert!(take_panic_backtrace().is_some());
        assert!(take_panic_backtrace().is_none());
    }
}
