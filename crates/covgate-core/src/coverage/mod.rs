//! Coverage collection, merging and reporting.
//!
//! - [`collector::CoverageCollector`]: prepares each suite's isolated artifact
//! - [`codec`]: execution data file formats
//! - [`aggregator::CoverageAggregator`]: OR-merges artifacts into a report
//! - [`report::CoverageReport`]: merged per-class counters
//! - [`formatters`]: XML / HTML / CSV renditions

pub mod aggregator;
pub mod codec;
pub mod collector;
pub mod formatters;
pub mod model;
pub mod report;

pub use aggregator::{CoverageAggregator, ExclusionPatterns};
pub use codec::{BinaryCodec, CodecError, ExecFormat, ExecutionDataCodec, JsonCodec};
pub use collector::{CoverageCollector, Instrumentation};
pub use formatters::{write_reports, ReportFormats, ReportLocations};
pub use model::{ClassDescriptor, ExecutionData, ProbeInfo, ProbeSet};
pub use report::{ClassCoverage, Counter, CounterKind, Counters, CoverageReport, PackageCoverage};
