//! Spans for spawned tasks.

use tracing::Span;

use crate::handle::TaskId;
use crate::outcome::TaskState;

/// Start the span a spawned task runs in.
///
/// `task.state` is declared empty and filled by [`record_terminal_state`].
pub fn start_task_span(name: &str, id: &TaskId) -> Span {
    tracing::info_span!(
        "task.run",
        "task.name" = name,
        "task.id" = %id,
        "task.state" = tracing::field::Empty,
    )
}

/// Record the terminal state on the span and emit a `debug` event in it.
pub fn record_terminal_state(span: &Span, state: TaskState) {
    span.record("task.state", state.as_str());
    span.in_scope(|| {
        tracing::debug!(state = state.as_str(), "task finished");
    });
}
