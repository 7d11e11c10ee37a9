//! Merges execution data from several suites into one [`CoverageReport`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob::{MatchOptions, Pattern};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::coverage::codec::ExecutionDataCodec;
use crate::coverage::model::{ClassDescriptor, ExecutionData, ProbeSet};
use crate::coverage::report::{ClassCoverage, CoverageReport};
use crate::error::{CovgateError, Result};

const CLASS_EXTENSION: &str = "class";

/// Glob patterns removing classes from scoring.
///
/// Patterns are matched against the descriptor path relative to its class
/// root, `/`-separated, e.g. `uk/tw/energy/Application.class`.
#[derive(Debug, Clone, Default)]
pub struct ExclusionPatterns {
    patterns: Vec<Pattern>,
}

impl ExclusionPatterns {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Pattern::new(p.as_ref()).map_err(|e| CovgateError::InvalidPattern {
                    pattern: p.as_ref().to_string(),
                    reason: e.msg.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_excluded(&self, relative_path: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        self.patterns
            .iter()
            .any(|p| p.matches_with(relative_path, options))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Analysis inputs shared by every aggregation of one report.
pub struct CoverageAggregator {
    name: String,
    class_roots: Vec<PathBuf>,
    source_roots: Vec<PathBuf>,
    excludes: ExclusionPatterns,
    codec: Box<dyn ExecutionDataCodec>,
}

impl CoverageAggregator {
    pub fn new(
        name: impl Into<String>,
        class_roots: Vec<PathBuf>,
        source_roots: Vec<PathBuf>,
        excludes: ExclusionPatterns,
        codec: Box<dyn ExecutionDataCodec>,
    ) -> Self {
        Self {
            name: name.into(),
            class_roots,
            source_roots,
            excludes,
            codec,
        }
    }

    /// Read every artifact and merge it against the current class set.
    ///
    /// A missing or undecodable artifact fails the whole aggregation with
    /// [`CovgateError::CoverageDataMissing`].
    pub fn aggregate(&self, artifacts: &[PathBuf]) -> Result<CoverageReport> {
        let data = artifacts
            .iter()
            .map(|path| self.read_artifact(path))
            .collect::<Result<Vec<_>>>()?;
        self.aggregate_data(&data)
    }

    /// Merge already decoded execution data against the current class set.
    pub fn aggregate_data(&self, data: &[ExecutionData]) -> Result<CoverageReport> {
        let descriptors = self.load_descriptors()?;
        let mut report = CoverageReport::new(self.name.clone());
        report
            .sessions
            .extend(data.iter().map(|d| d.session.clone()));

        for descriptor in descriptors.into_values() {
            let mut probes = ProbeSet::empty(descriptor.probes.len());
            for run in data {
                let Some(hits) = run.classes.get(&descriptor.name) else {
                    continue;
                };
                if hits.len() != probes.len() {
                    warn!(
                        class = %descriptor.name,
                        session = %run.session,
                        expected = probes.len(),
                        found = hits.len(),
                        "Ignoring execution data recorded against a different class version"
                    );
                    continue;
                }
                probes.merge(hits);
            }
            let source_path = self.resolve_source(&descriptor);
            report.insert(ClassCoverage::new(descriptor, probes, source_path));
        }

        info!(
            report = %self.name,
            classes = report.classes.len(),
            sessions = report.sessions.len(),
            "Coverage aggregated"
        );
        Ok(report)
    }

    fn read_artifact(&self, path: &Path) -> Result<ExecutionData> {
        if !path.is_file() {
            return Err(CovgateError::CoverageDataMissing {
                path: path.to_path_buf(),
                reason: "file not found".to_string(),
            });
        }
        let data = self
            .codec
            .read_file(path)
            .map_err(|e| CovgateError::CoverageDataMissing {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        debug!(path = %path.display(), session = %data.session, classes = data.classes.len(), "Loaded execution data");
        Ok(data)
    }

    /// Descriptors keyed by class name; the first root defining a class wins.
    fn load_descriptors(&self) -> Result<BTreeMap<String, Arc<ClassDescriptor>>> {
        let mut descriptors = BTreeMap::new();
        for root in &self.class_roots {
            if !root.is_dir() {
                debug!(root = %root.display(), "Class root does not exist, skipping");
                continue;
            }
            for entry in WalkDir::new(root).sort_by_file_name() {
                let entry = entry.map_err(std::io::Error::from)?;
                let path = entry.path();
                if !entry.file_type().is_file()
                    || path.extension().and_then(|e| e.to_str()) != Some(CLASS_EXTENSION)
                {
                    continue;
                }
                let relative = relative_slash_path(root, path);
                if self.excludes.is_excluded(&relative) {
                    debug!(class = %relative, "Excluded from coverage");
                    continue;
                }
                let descriptor = read_descriptor(path)?;
                if descriptors.contains_key(&descriptor.name) {
                    warn!(class = %descriptor.name, path = %path.display(), "Duplicate class descriptor ignored");
                    continue;
                }
                descriptors.insert(descriptor.name.clone(), Arc::new(descriptor));
            }
        }
        Ok(descriptors)
    }

    fn resolve_source(&self, descriptor: &ClassDescriptor) -> Option<PathBuf> {
        let file = descriptor.source_file.as_deref()?;
        let package = descriptor.package();
        self.source_roots
            .iter()
            .map(|root| root.join(package).join(file))
            .find(|candidate| candidate.is_file())
    }
}

fn read_descriptor(path: &Path) -> Result<ClassDescriptor> {
    let raw = fs::read(path)?;
    serde_json::from_slice(&raw).map_err(|e| CovgateError::InvalidClassDescriptor {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn relative_slash_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::codec::{BinaryCodec, JsonCodec};
    use crate::coverage::model::ProbeInfo;
    use crate::coverage::report::Counter;

    fn write_class(root: &Path, name: &str, probes: usize) {
        let descriptor = ClassDescriptor {
            name: name.to_string(),
            source_file: Some(format!("{}.java", name.rsplit('/').next().unwrap_or(name))),
            probes: (0..probes)
                .map(|i| ProbeInfo {
                    instructions: 1,
                    lines: vec![i as u32 + 1],
                    branch: false,
                    method: Some("run".to_string()),
                })
                .collect(),
        };
        let path = root.join(format!("{name}.class"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, serde_json::to_vec(&descriptor).unwrap()).unwrap();
    }

    fn aggregator(root: &Path, excludes: &[&str]) -> CoverageAggregator {
        CoverageAggregator::new(
            "test",
            vec![root.to_path_buf()],
            vec![],
            ExclusionPatterns::new(excludes).unwrap(),
            Box::new(BinaryCodec),
        )
    }

    #[test]
    fn test_exclusion_patterns_match_nested_paths() {
        let excludes =
            ExclusionPatterns::new(&["**/Application.class", "**/config/**"]).unwrap();
        assert!(excludes.is_excluded("uk/tw/energy/Application.class"));
        assert!(excludes.is_excluded("uk/tw/energy/config/SeedingConfig.class"));
        assert!(!excludes.is_excluded("uk/tw/energy/service/AccountService.class"));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let err = ExclusionPatterns::new(&["[unclosed"]).unwrap_err();
        assert!(matches!(err, CovgateError::InvalidPattern { .. }));
    }

    #[test]
    fn test_excluded_classes_are_not_scored() {
        let dir = tempfile::tempdir().unwrap();
        write_class(dir.path(), "app/Application", 2);
        write_class(dir.path(), "app/config/WebConfig", 2);
        write_class(dir.path(), "app/service/Billing", 2);

        let report = aggregator(dir.path(), &["**/Application.class", "**/config/**"])
            .aggregate_data(&[])
            .unwrap();
        let names: Vec<&str> = report.classes.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["app/service/Billing"]);
    }

    #[test]
    fn test_missing_artifact_is_an_error_not_zero_coverage() {
        let dir = tempfile::tempdir().unwrap();
        write_class(dir.path(), "app/Billing", 2);
        let missing = dir.path().join("coverage/functionalTest.exec");

        let err = aggregator(dir.path(), &[]).aggregate(&[missing.clone()]).unwrap_err();
        match err {
            CovgateError::CoverageDataMissing { path, .. } => assert_eq!(path, missing),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_corrupt_artifact_is_reported_as_missing_data() {
        let dir = tempfile::tempdir().unwrap();
        write_class(dir.path(), "app/Billing", 2);
        let corrupt = dir.path().join("test.exec");
        std::fs::write(&corrupt, b"garbage").unwrap();

        let err = aggregator(dir.path(), &[]).aggregate(&[corrupt]).unwrap_err();
        assert!(matches!(err, CovgateError::CoverageDataMissing { .. }));
    }

    #[test]
    fn test_artifacts_are_or_merged() {
        let dir = tempfile::tempdir().unwrap();
        write_class(dir.path(), "app/Billing", 4);

        let mut unit = ExecutionData::new("test");
        unit.record("app/Billing", ProbeSet::from_bits(vec![true, true, false, false]));
        let mut functional = ExecutionData::new("functionalTest");
        functional.record("app/Billing", ProbeSet::from_bits(vec![false, true, true, false]));

        let unit_path = dir.path().join("test.exec");
        let functional_path = dir.path().join("functionalTest.exec");
        BinaryCodec.write_file(&unit_path, &unit).unwrap();
        BinaryCodec.write_file(&functional_path, &functional).unwrap();

        let report = aggregator(dir.path(), &[])
            .aggregate(&[unit_path, functional_path])
            .unwrap();
        assert_eq!(report.totals().line, Counter::new(3, 1));
        assert_eq!(report.sessions.len(), 2);
    }

    #[test]
    fn test_mismatched_probe_count_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_class(dir.path(), "app/Billing", 3);
        let mut stale = ExecutionData::new("test");
        stale.record("app/Billing", ProbeSet::from_bits(vec![true]));

        let report = aggregator(dir.path(), &[]).aggregate_data(&[stale]).unwrap();
        assert_eq!(report.totals().line.covered, 0);
    }

    #[test]
    fn test_json_codec_artifacts_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        write_class(dir.path(), "app/Billing", 2);
        let mut data = ExecutionData::new("test");
        data.record("app/Billing", ProbeSet::from_bits(vec![true, false]));
        let path = dir.path().join("test.exec.json");
        JsonCodec.write_file(&path, &data).unwrap();

        let report = CoverageAggregator::new(
            "json",
            vec![dir.path().to_path_buf()],
            vec![],
            ExclusionPatterns::default(),
            Box::new(JsonCodec),
        )
        .aggregate(&[path])
        .unwrap();
        assert_eq!(report.totals().line, Counter::new(1, 1));
    }

    #[test]
    fn test_source_files_resolve_against_source_roots() {
        let classes = tempfile::tempdir().unwrap();
        let sources = tempfile::tempdir().unwrap();
        write_class(classes.path(), "app/Billing", 1);
        std::fs::create_dir_all(sources.path().join("app")).unwrap();
        std::fs::write(sources.path().join("app/Billing.java"), "class Billing {}").unwrap();

        let report = CoverageAggregator::new(
            "src",
            vec![classes.path().to_path_buf()],
            vec![sources.path().to_path_buf()],
            ExclusionPatterns::default(),
            Box::new(BinaryCodec),
        )
        .aggregate_data(&[])
        .unwrap();
        assert_eq!(
            report.classes["app/Billing"].source_path.as_deref(),
            Some(sources.path().join("app/Billing.java").as_path())
        );
    }
}
