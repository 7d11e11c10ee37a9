//! Error taxonomy for covgate.

use std::path::PathBuf;

use crate::task_graph::GraphError;
use crate::verify::Violation;

/// Errors produced by suite registration, coverage merging and gating.
#[derive(Debug, thiserror::Error)]
pub enum CovgateError {
    #[error("suite '{0}' is already declared")]
    DuplicateSuite(String),

    #[error("suite '{0}' is not declared")]
    UnknownSuite(String),

    #[error(
        "tests of suite '{suite}' failed (exit code {exit_code}); see logs in {}",
        log_dir.display()
    )]
    TestExecutionFailure {
        suite: String,
        exit_code: i32,
        log_dir: PathBuf,
    },

    #[error("coverage data missing at {}: {reason}", path.display())]
    CoverageDataMissing { path: PathBuf, reason: String },

    #[error("coverage thresholds violated: {}", summarize(violations))]
    ThresholdViolation { violations: Vec<Violation> },

    #[error("invalid class descriptor {}: {reason}", path.display())]
    InvalidClassDescriptor { path: PathBuf, reason: String },

    #[error("invalid exclusion pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for covgate operations.
pub type Result<T> = std::result::Result<T, CovgateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_execution_failure_names_suite_and_logs() {
        let err = CovgateError::TestExecutionFailure {
            suite: "functionalTest".to_string(),
            exit_code: 1,
            log_dir: PathBuf::from("build/test-results/functionalTest"),
        };
        let msg = err.to_string();
        assert!(msg.contains("functionalTest"));
        assert!(msg.contains("build/test-results/functionalTest"));
        assert!(msg.contains("exit code 1"));
    }

    #[test]
    fn test_coverage_data_missing_display() {
        let err = CovgateError::CoverageDataMissing {
            path: PathBuf::from("build/coverage/test.exec"),
            reason: "file not found".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("test.exec"));
        assert!(msg.contains("file not found"));
    }

    #[test]
    fn test_duplicate_suite_display() {
        let err = CovgateError::DuplicateSuite("test".to_string());
        assert!(err.to_string().contains("already declared"));
    }
}
