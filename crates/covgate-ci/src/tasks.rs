//! Actions behind the built-in targets.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use covgate_core::coverage::{write_reports, CoverageCollector};
use covgate_core::deps::{self, CandidateSource};
use covgate_core::{
    obs, verify, CoverageAggregator, CoverageReport, CovgateError, ReportLocations, Suite,
    TaskAction, ThresholdRule,
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::runner::SuiteRunner;

/// Merged report handed from `mergedReport` to `thresholdVerification`.
pub type ReportSlot = Arc<RwLock<Option<Arc<CoverageReport>>>>;

/// Lines meant for the console, collected while tasks run.
#[derive(Debug, Clone, Default)]
pub struct Notices {
    lines: Arc<Mutex<Vec<String>>>,
}

impl Notices {
    pub fn push(&self, line: impl Into<String>) {
        let line = line.into();
        info!("{}", line);
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }

    /// Lines pushed so far, in push order.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    /// Remove and return every line pushed so far.
    pub fn drain(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|mut lines| std::mem::take(&mut *lines))
            .unwrap_or_default()
    }
}

/// Runs one suite; a non-zero exit fails the task.
pub struct RunSuite {
    pub suite: Suite,
    pub collector: CoverageCollector,
}

#[async_trait]
impl TaskAction for RunSuite {
    async fn run(&self) -> anyhow::Result<()> {
        let result = SuiteRunner::run(&self.suite, &self.collector).await?;
        if !result.passed() {
            return Err(CovgateError::TestExecutionFailure {
                suite: self.suite.name.clone(),
                exit_code: result.exit_code,
                log_dir: self.suite.log_dir.clone(),
            }
            .into());
        }
        info!(
            suite = %self.suite.name,
            duration_ms = result.duration_ms,
            "Suite passed"
        );
        Ok(())
    }
}

/// Merges every suite artifact and writes the enabled report formats.
pub struct MergeReport {
    pub aggregator: Arc<CoverageAggregator>,
    pub artifacts: Vec<PathBuf>,
    pub locations: ReportLocations,
    pub slot: ReportSlot,
}

#[async_trait]
impl TaskAction for MergeReport {
    async fn run(&self) -> anyhow::Result<()> {
        self.slot.write().await.take();

        let aggregator = Arc::clone(&self.aggregator);
        let artifacts = self.artifacts.clone();
        let locations = self.locations.clone();
        let report = tokio::task::spawn_blocking(move || -> anyhow::Result<CoverageReport> {
            let _span = obs::TaskSpan::enter("mergedReport");
            let report = aggregator.aggregate(&artifacts)?;
            write_reports(&report, &locations)?;
            Ok(report)
        })
        .await
        .context("coverage aggregation aborted")??;

        for path in self.locations.all() {
            obs::emit_report_written(path, report.classes.len());
        }
        *self.slot.write().await = Some(Arc::new(report));
        Ok(())
    }
}

/// Evaluates the threshold rules against the merged report.
pub struct VerifyThresholds {
    pub rules: Vec<ThresholdRule>,
    pub slot: ReportSlot,
}

#[async_trait]
impl TaskAction for VerifyThresholds {
    async fn run(&self) -> anyhow::Result<()> {
        let report = self
            .slot
            .read()
            .await
            .clone()
            .ok_or_else(|| anyhow!("merged coverage report is not available"))?;

        let result = verify(&report, &self.rules);
        obs::emit_gate_evaluated(self.rules.len(), result.violations.len(), result.passed);
        for violation in &result.violations {
            warn!(%violation, "Coverage rule violated");
        }
        result.into_result()?;
        Ok(())
    }
}

/// Prints where the HTML report lives.
pub struct PrintHtmlLocation {
    pub html: Option<PathBuf>,
    pub notices: Notices,
}

#[async_trait]
impl TaskAction for PrintHtmlLocation {
    async fn run(&self) -> anyhow::Result<()> {
        match &self.html {
            Some(html) => self
                .notices
                .push(format!("Coverage report generated at: {}", html.display())),
            None => debug!("HTML report disabled, nothing to print"),
        }
        Ok(())
    }
}

/// Prints report locations when the XML report exists.
pub struct PrintSummary {
    pub locations: ReportLocations,
    pub notices: Notices,
}

#[async_trait]
impl TaskAction for PrintSummary {
    async fn run(&self) -> anyhow::Result<()> {
        let Some(xml) = self.locations.xml.as_ref().filter(|p| p.is_file()) else {
            debug!("No XML report on disk, skipping summary");
            return Ok(());
        };
        self.notices.push("Coverage Summary:");
        if let Some(html) = &self.locations.html {
            self.notices.push(format!("HTML Report: {}", html.display()));
        }
        let xml = std::fs::canonicalize(xml).unwrap_or_else(|_| xml.clone());
        self.notices.push(format!("XML Report: {}", xml.display()));
        Ok(())
    }
}

/// Lists stable upgrade candidates. Never fails.
pub struct ScanDependencies {
    pub source: Option<Arc<dyn CandidateSource>>,
    pub notices: Notices,
}

#[async_trait]
impl TaskAction for ScanDependencies {
    async fn run(&self) -> anyhow::Result<()> {
        let Some(source) = &self.source else {
            info!("No dependency candidate source configured");
            return Ok(());
        };

        match deps::scan(source.as_ref()).await {
            Ok(report) => {
                if report.upgrades.is_empty() {
                    self.notices
                        .push("All dependencies are using the latest stable versions.");
                } else {
                    self.notices
                        .push("The following dependencies have later stable versions:");
                    for c in &report.upgrades {
                        self.notices.push(format!(
                            " - {} [{} -> {}]",
                            c.coordinates(),
                            c.current,
                            c.proposed
                        ));
                    }
                }
                for c in &report.rejected {
                    debug!(dependency = %c.coordinates(), proposed = %c.proposed, "Rejected unstable proposal");
                }
            }
            Err(e) => warn!(
                source = %source.describe(),
                error = %format!("{e:#}"),
                "Dependency scan unavailable"
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covgate_core::{CounterKind, CounterValue, ReportFormats};

    #[tokio::test]
    async fn test_verify_without_report_fails() {
        let action = VerifyThresholds {
            rules: vec![ThresholdRule::minimum(
                CounterKind::Line,
                CounterValue::CoveredRatio,
                0.6,
            )],
            slot: ReportSlot::default(),
        };
        assert!(action.run().await.is_err());
    }

    #[tokio::test]
    async fn test_verify_empty_report_against_ratio_passes() {
        let slot = ReportSlot::default();
        *slot.write().await = Some(Arc::new(CoverageReport::new("empty")));
        let action = VerifyThresholds {
            rules: vec![ThresholdRule::minimum(
                CounterKind::Line,
                CounterValue::CoveredRatio,
                0.6,
            )],
            slot,
        };
        action.run().await.expect("empty report passes");
    }

    #[tokio::test]
    async fn test_summary_is_silent_without_xml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let notices = Notices::default();
        let action = PrintSummary {
            locations: ReportLocations::new(dir.path(), ReportFormats::default()),
            notices: notices.clone(),
        };
        action.run().await.expect("summary");
        assert!(notices.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_dependency_scan_never_fails() {
        let notices = Notices::default();
        let action = ScanDependencies {
            source: Some(Arc::new(deps::FileSource::new("/nonexistent/candidates.json"))),
            notices: notices.clone(),
        };
        action.run().await.expect("advisory only");
        assert!(notices.snapshot().is_empty());
    }
}
