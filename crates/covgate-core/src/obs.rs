//! Structured observability hooks for build lifecycle events.
//!
//! This module provides:
//! - Task-scoped tracing spans via `TaskSpan` RAII guard
//! - Emission functions for task, suite, report, gate and dependency events
//!
//! Events are emitted at `info!` level; advisories at `warn!`.

use std::path::Path;

use tracing::{info, warn};

/// RAII guard that enters a task-scoped tracing span.
///
/// ```ignore
/// let _span = TaskSpan::enter("mergedReport");
/// // every event below carries task = "mergedReport"
/// ```
pub struct TaskSpan {
    _span: tracing::span::EnteredSpan,
}

impl TaskSpan {
    pub fn enter(task: &str) -> Self {
        Self {
            _span: task_span(task).entered(),
        }
    }
}

/// Span for instrumenting a task's future; use [`TaskSpan`] in sync code.
pub fn task_span(task: &str) -> tracing::Span {
    tracing::info_span!("covgate.task", task = %task)
}

pub fn emit_task_started(task: &str) {
    info!(event = "task.started", task = %task);
}

/// Emit event: task reached a terminal status.
pub fn emit_task_finished(task: &str, status: &str, duration_ms: u64) {
    info!(
        event = "task.finished",
        task = %task,
        status = %status,
        duration_ms = duration_ms,
    );
}

/// Emit event: a suite's test command exited.
pub fn emit_suite_finished(suite: &str, exit_code: i32, passed: bool, log_dir: &Path) {
    info!(
        event = "suite.finished",
        suite = %suite,
        exit_code = exit_code,
        passed = passed,
        log_dir = %log_dir.display(),
    );
}

pub fn emit_report_written(path: &Path, classes: usize) {
    info!(event = "report.written", path = %path.display(), classes = classes);
}

/// Emit event: threshold rules evaluated.
pub fn emit_gate_evaluated(rules: usize, violations: usize, passed: bool) {
    info!(
        event = "gate.evaluated",
        rules = rules,
        violations = violations,
        passed = passed,
    );
}

/// Emit event: an upgrade is available for a dependency. Never fatal.
pub fn emit_dependency_advisory(dependency: &str, current: &str, proposed: &str) {
    warn!(
        event = "dependency.advisory",
        dependency = %dependency,
        current = %current,
        proposed = %proposed,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_span_create() {
        let _span = TaskSpan::enter("primarySuite");
        emit_task_started("primarySuite");
        emit_task_finished("primarySuite", "succeeded", 12);
    }
}
