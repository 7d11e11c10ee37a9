//! Build configuration stored in `covgate.toml`.
//!
//! Every field is optional. A missing file, or a file with missing sections,
//! falls back to a two-suite build (`test` and `functionalTest`) with the
//! default exclusions and coverage rules.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::coverage::aggregator::{CoverageAggregator, ExclusionPatterns};
use crate::coverage::codec::ExecFormat;
use crate::coverage::formatters::{ReportFormats, ReportLocations};
use crate::coverage::report::CounterKind;
use crate::deps::{CandidateSource, CommandSource, FileSource};
use crate::error::{CovgateError, Result};
use crate::suite::{SuiteDeclaration, SuiteInput, SuiteRegistry};
use crate::verify::{CounterValue, ThresholdRule};

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "covgate.toml";

/// Resolved build configuration. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Root of every generated artifact.
    pub build_dir: PathBuf,

    /// Execution data codec used by every suite.
    pub exec_format: ExecFormat,

    pub primary_suite: SuiteDeclaration,

    /// Runs after the primary suite when both are scheduled and reuses its
    /// compiled outputs.
    pub extended_suite: SuiteDeclaration,

    pub report: ReportConfig,

    pub rules: Vec<ThresholdRule>,

    pub dependency_scan: DependencyScanConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Title shown in every rendition.
    pub name: String,

    /// Output directory; `<build_dir>/reports/coverage` when unset.
    pub dir: Option<PathBuf>,

    pub formats: ReportFormats,

    /// Roots searched for class descriptors.
    pub class_roots: Vec<PathBuf>,

    pub source_roots: Vec<PathBuf>,

    /// Glob patterns relative to a class root.
    pub excludes: Vec<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            name: "covgate".to_string(),
            dir: None,
            formats: ReportFormats::default(),
            class_roots: vec![PathBuf::from("build/classes/java/main")],
            source_roots: vec![PathBuf::from("src/main/java")],
            excludes: vec![
                "**/Application.class".to_string(),
                "**/config/**".to_string(),
            ],
        }
    }
}

/// Where the advisory dependency scan gets its candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyScanConfig {
    /// JSON file holding an array of candidates.
    pub candidates_file: Option<PathBuf>,

    /// Command printing the same JSON on stdout.
    pub candidates_command: Vec<String>,
}

impl DependencyScanConfig {
    /// Configured source, if any.
    pub fn source(&self) -> Option<Box<dyn CandidateSource>> {
        if let Some(path) = &self.candidates_file {
            return Some(Box::new(FileSource::new(path)));
        }
        if !self.candidates_command.is_empty() {
            return Some(Box::new(CommandSource::new(self.candidates_command.clone())));
        }
        None
    }
}

fn default_primary_suite() -> SuiteDeclaration {
    SuiteDeclaration {
        name: "test".to_string(),
        source_roots: vec![PathBuf::from("src/test/java")],
        output_roots: vec![
            PathBuf::from("build/classes/java/main"),
            PathBuf::from("build/classes/java/test"),
        ],
        command: vec!["./gradlew".to_string(), "test".to_string()],
        ..Default::default()
    }
}

fn default_extended_suite() -> SuiteDeclaration {
    SuiteDeclaration {
        name: "functionalTest".to_string(),
        source_roots: vec![PathBuf::from("src/functional-test/java")],
        output_roots: vec![PathBuf::from("build/classes/java/functionalTest")],
        extra_compile_inputs: vec![SuiteInput::Suite("test".to_string())],
        extra_runtime_inputs: vec![SuiteInput::Suite("test".to_string())],
        command: vec!["./gradlew".to_string(), "functionalTest".to_string()],
        ..Default::default()
    }
}

/// LINE and BRANCH covered ratio at least 0.60, at most 5 missed classes.
pub fn default_rules() -> Vec<ThresholdRule> {
    vec![
        ThresholdRule::minimum(CounterKind::Line, CounterValue::CoveredRatio, 0.60),
        ThresholdRule::minimum(CounterKind::Branch, CounterValue::CoveredRatio, 0.60),
        ThresholdRule::maximum(CounterKind::Class, CounterValue::MissedCount, 5.0),
    ]
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            build_dir: PathBuf::from("build"),
            exec_format: ExecFormat::default(),
            primary_suite: default_primary_suite(),
            extended_suite: default_extended_suite(),
            report: ReportConfig::default(),
            rules: default_rules(),
            dependency_scan: DependencyScanConfig::default(),
        }
    }
}

impl BuildConfig {
    pub fn validate(&self) -> Result<()> {
        if self.build_dir.as_os_str().is_empty() {
            return Err(CovgateError::InvalidConfig(
                "build_dir must not be empty".to_string(),
            ));
        }
        for (section, suite) in [
            ("primary_suite", &self.primary_suite),
            ("extended_suite", &self.extended_suite),
        ] {
            if suite.command.is_empty() || suite.command[0].trim().is_empty() {
                return Err(CovgateError::InvalidConfig(format!(
                    "{section}.command must be a non-empty array"
                )));
            }
        }
        if self.report.class_roots.is_empty() {
            return Err(CovgateError::InvalidConfig(
                "report.class_roots must list at least one directory".to_string(),
            ));
        }
        if self.dependency_scan.candidates_file.is_some()
            && !self.dependency_scan.candidates_command.is_empty()
        {
            return Err(CovgateError::InvalidConfig(
                "dependency_scan takes either candidates_file or candidates_command".to_string(),
            ));
        }
        for rule in &self.rules {
            rule.validate()?;
        }
        // Surfaces bad names, duplicates and bad patterns before anything runs.
        self.registry()?;
        self.exclusions()?;
        Ok(())
    }

    /// Declare both suites, primary first.
    pub fn registry(&self) -> Result<SuiteRegistry> {
        let mut registry = SuiteRegistry::new(&self.build_dir, self.exec_format);
        registry.declare(self.primary_suite.clone())?;
        registry.declare(self.extended_suite.clone())?;
        Ok(registry)
    }

    pub fn exclusions(&self) -> Result<ExclusionPatterns> {
        ExclusionPatterns::new(&self.report.excludes)
    }

    pub fn aggregator(&self) -> Result<CoverageAggregator> {
        Ok(CoverageAggregator::new(
            self.report.name.clone(),
            self.report.class_roots.clone(),
            self.report.source_roots.clone(),
            self.exclusions()?,
            self.exec_format.codec(),
        ))
    }

    pub fn report_dir(&self) -> PathBuf {
        self.report
            .dir
            .clone()
            .unwrap_or_else(|| self.build_dir.join("reports").join("coverage"))
    }

    pub fn report_locations(&self) -> ReportLocations {
        ReportLocations::new(self.report_dir(), self.report.formats)
    }

    /// Stable SHA-256 of the resolved configuration, identifying a run's
    /// inputs.
    pub fn digest(&self) -> Result<String> {
        let canonical = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        Ok(hex::encode(hasher.finalize()))
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("serialize config toml")
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `BuildConfig::default()`.
pub fn load_config(path: &Path) -> anyhow::Result<BuildConfig> {
    if !path.exists() {
        let cfg = BuildConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: BuildConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}
