//! Per-suite instrumentation sink.
//!
//! Before a suite runs, the collector clears the suite's previous artifact
//! and hands the test command an environment pointing the instrumentation
//! agent at the suite's own artifact path. Nothing is merged here.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::coverage::codec::ExecFormat;
use crate::coverage::model::ExecutionData;
use crate::error::{CovgateError, Result};
use crate::suite::Suite;

/// Suite name.
pub const ENV_SUITE: &str = "COVGATE_SUITE";
/// Artifact the instrumentation agent must write.
pub const ENV_EXEC_FILE: &str = "COVGATE_EXEC_FILE";
/// `binary` or `json`.
pub const ENV_EXEC_FORMAT: &str = "COVGATE_EXEC_FORMAT";
/// Runtime classpath, platform path-list separated.
pub const ENV_CLASSPATH: &str = "COVGATE_CLASSPATH";
/// Source roots, platform path-list separated.
pub const ENV_SOURCE_ROOTS: &str = "COVGATE_SOURCE_ROOTS";

/// Environment handed to an instrumented suite run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrumentation {
    pub suite: String,
    pub exec_path: PathBuf,
    pub env: BTreeMap<String, OsString>,
}

/// Prepares and inspects per-suite execution data artifacts.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoverageCollector {
    format: ExecFormat,
}

impl CoverageCollector {
    pub fn new(format: ExecFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> ExecFormat {
        self.format
    }

    /// Reset the suite's artifact and build its instrumentation environment.
    pub fn prepare(&self, suite: &Suite) -> Result<Instrumentation> {
        match fs::remove_file(&suite.exec_path) {
            Ok(()) => debug!(suite = %suite.name, "Discarded previous execution data"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if let Some(parent) = suite.exec_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(&suite.log_dir)?;

        let mut env = BTreeMap::new();
        env.insert(ENV_SUITE.to_string(), OsString::from(&suite.name));
        env.insert(
            ENV_EXEC_FILE.to_string(),
            suite.exec_path.clone().into_os_string(),
        );
        env.insert(
            ENV_EXEC_FORMAT.to_string(),
            OsString::from(self.format.name()),
        );
        env.insert(
            ENV_CLASSPATH.to_string(),
            join_paths(&suite.runtime_classpath)?,
        );
        env.insert(
            ENV_SOURCE_ROOTS.to_string(),
            join_paths(&suite.source_roots)?,
        );
        for (key, value) in &suite.env {
            env.insert(key.clone(), OsString::from(value));
        }

        Ok(Instrumentation {
            suite: suite.name.clone(),
            exec_path: suite.exec_path.clone(),
            env,
        })
    }

    /// Whether the run left an artifact behind. Absence is only logged here;
    /// aggregation turns it into an error.
    pub fn finish(&self, suite: &Suite) -> bool {
        let present = suite.exec_path.is_file();
        if !present {
            warn!(
                suite = %suite.name,
                path = %suite.exec_path.display(),
                "Suite finished without writing execution data"
            );
        }
        present
    }

    /// Write execution data for `suite` directly, for in-process agents.
    pub fn write(&self, suite: &Suite, data: &ExecutionData) -> Result<()> {
        self.format
            .codec()
            .write_file(&suite.exec_path, data)
            .map_err(|e| CovgateError::CoverageDataMissing {
                path: suite.exec_path.clone(),
                reason: e.to_string(),
            })
    }
}

fn join_paths(paths: &[PathBuf]) -> Result<OsString> {
    std::env::join_paths(paths)
        .map_err(|e| CovgateError::InvalidConfig(format!("unjoinable path list: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::model::ProbeSet;
    use crate::suite::{SuiteDeclaration, SuiteRegistry};

    fn suite(build: &std::path::Path) -> Suite {
        let mut registry = SuiteRegistry::new(build, ExecFormat::Binary);
        registry
            .declare(SuiteDeclaration {
                name: "test".to_string(),
                output_roots: vec![PathBuf::from("classes/main")],
                command: vec!["true".to_string()],
                ..Default::default()
            })
            .unwrap()
            .clone()
    }

    #[test]
    fn test_prepare_discards_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let suite = suite(dir.path());
        let collector = CoverageCollector::new(ExecFormat::Binary);

        collector.write(&suite, &ExecutionData::new("test")).unwrap();
        assert!(suite.exec_path.is_file());

        collector.prepare(&suite).unwrap();
        assert!(!suite.exec_path.exists());
        assert!(suite.log_dir.is_dir());
        assert!(!collector.finish(&suite));
    }

    #[test]
    fn test_instrumentation_env_points_at_suite_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let suite = suite(dir.path());
        let inst = CoverageCollector::new(ExecFormat::Binary)
            .prepare(&suite)
            .unwrap();

        assert_eq!(inst.env[ENV_SUITE], OsString::from("test"));
        assert_eq!(inst.env[ENV_EXEC_FILE], suite.exec_path.clone().into_os_string());
        assert_eq!(inst.env[ENV_EXEC_FORMAT], OsString::from("binary"));
        assert_eq!(inst.env[ENV_CLASSPATH], OsString::from("classes/main"));
    }

    #[test]
    fn test_finish_reports_written_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let suite = suite(dir.path());
        let collector = CoverageCollector::default();
        collector.prepare(&suite).unwrap();

        let mut data = ExecutionData::new("test");
        data.record("a/B", ProbeSet::from_bits(vec![true]));
        collector.write(&suite, &data).unwrap();
        assert!(collector.finish(&suite));
    }
}
