//! Build gate evaluation for pass/fail criteria.

use covgate_core::{ExecutionReport, TaskStatus};
use serde::{Deserialize, Serialize};

/// Gate evaluation verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateVerdict {
    /// Whether the gate passed.
    pub passed: bool,

    /// Violations that caused failure (empty if passed).
    pub violations: Vec<String>,

    /// Summary message.
    pub message: String,
}

/// Build gate evaluation rules.
pub struct BuildGate;

impl BuildGate {
    /// Evaluate whether every scheduled task succeeded.
    ///
    /// Gate rule:
    /// - A failed task is a violation carrying its error
    /// - A skipped task is a violation naming the dependency that blocked it
    pub fn evaluate(report: &ExecutionReport) -> GateVerdict {
        let mut violations = Vec::new();

        for result in &report.results {
            let reason = result.error.as_deref().unwrap_or("no details");
            match result.status {
                TaskStatus::Succeeded => {}
                TaskStatus::Failed => {
                    violations.push(format!("Task '{}' failed: {}", result.name, reason))
                }
                TaskStatus::Skipped => {
                    violations.push(format!("Task '{}' skipped: {}", result.name, reason))
                }
            }
        }

        let passed = violations.is_empty();
        let message = if passed {
            format!("All {} tasks passed", report.results.len())
        } else {
            format!("Gate failed with {} violation(s)", violations.len())
        };

        GateVerdict {
            passed,
            violations,
            message,
        }
    }
}
