//! covgate core library
//!
//! Build verification primitives:
//! - Suite registry with isolated classpaths and execution data artifacts
//! - Execution data collection, OR-merging and report rendering
//! - Threshold verification of merged coverage
//! - Version stability classification for dependency scans
//! - A typed task graph with deterministic planning and parallel execution

pub mod config;
pub mod coverage;
pub mod deps;
pub mod error;
pub mod obs;
pub mod stability;
pub mod suite;
pub mod task_graph;
pub mod telemetry;
pub mod verify;

pub use config::{load_config, BuildConfig, DependencyScanConfig, ReportConfig};
pub use coverage::{
    CoverageAggregator, CoverageCollector, CoverageReport, CounterKind, ExclusionPatterns,
    ExecFormat, ExecutionData, ExecutionDataCodec, ReportFormats, ReportLocations,
};
pub use deps::{CandidateSource, DependencyCandidate, ScanReport};
pub use error::{CovgateError, Result};
pub use obs::{
    emit_dependency_advisory, emit_gate_evaluated, emit_report_written, emit_suite_finished,
    emit_task_finished, emit_task_started, TaskSpan,
};
pub use stability::{is_non_stable, is_stable};
pub use suite::{Suite, SuiteDeclaration, SuiteInput, SuiteRegistry};
pub use task_graph::{
    ExecutionPlan, ExecutionReport, Executor, GraphError, NoopAction, TaskAction, TaskGraph,
    TaskNode, TaskStatus,
};
pub use telemetry::init_tracing;
pub use verify::{verify, CounterValue, RuleElement, ThresholdRule, VerificationResult, Violation};

/// Crate version, printed by `covgate --version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
