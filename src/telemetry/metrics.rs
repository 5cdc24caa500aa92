//! Metric instrument factories for task-logger.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without one installed the instruments are no-ops.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};

use crate::outcome::TaskState;

fn meter() -> Meter {
    opentelemetry::global::meter("task-logger")
}

/// Counter: tasks handed to a runtime.
pub fn tasks_spawned() -> Counter<u64> {
    meter()
        .u64_counter("task_logger.tasks.spawned")
        .with_description("Number of supervised tasks spawned")
        .build()
}

/// Counter: tasks reaching a terminal state.
/// Labels: `state` ("succeeded" | "failed" | "cancelled").
pub fn tasks_finished() -> Counter<u64> {
    meter()
        .u64_counter("task_logger.tasks.finished")
        .with_description("Number of supervised tasks finished, by terminal state")
        .build()
}

/// Histogram: time from spawn to terminal state, in milliseconds.
/// Labels: `state`.
pub fn task_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("task_logger.task.duration_ms")
        .with_description("Supervised task duration in milliseconds")
        .with_unit("ms")
        .build()
}

/// Record one task reaching `state` after `duration_ms`.
pub fn record_finished(state: TaskState, duration_ms: f64) {
    let labels = [KeyValue::new("state", state.as_str())];
    tasks_finished().add(1, &labels);
    task_duration_ms().record(duration_ms, &labels);
}
