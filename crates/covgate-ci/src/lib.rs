//! covgate CI - build verification runs
//!
//! Provides the build pipeline that:
//! - Runs the primary and extended suites under coverage instrumentation
//! - Merges their execution data into one report
//! - Gates the build on coverage thresholds

pub mod gate;
pub mod pipeline;
pub mod runner;
pub mod spec;
pub mod target;
pub mod tasks;

// Re-export key types
pub use gate::{BuildGate, GateVerdict};
pub use pipeline::{BuildPipeline, PipelineResult};
pub use runner::{SuiteResult, SuiteRunner};
pub use spec::RunSpec;
pub use target::BuiltinTarget;
pub use tasks::{Notices, ReportSlot};
