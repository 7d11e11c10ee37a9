//! Canonical build graph and run orchestration.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use chrono::{DateTime, Utc};
use covgate_core::coverage::CoverageCollector;
use covgate_core::deps::CandidateSource;
use covgate_core::{
    BuildConfig, ExecutionPlan, ExecutionReport, Executor, NoopAction, SuiteRegistry, TaskAction,
    TaskGraph, TaskNode,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::spec::RunSpec;
use crate::target::BuiltinTarget;
use crate::tasks::{
    MergeReport, Notices, PrintHtmlLocation, PrintSummary, ReportSlot, RunSuite, ScanDependencies,
    VerifyThresholds,
};

/// Result of a complete build run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    /// Unique id of this run.
    pub run_id: String,

    /// Whether every scheduled task succeeded.
    pub success: bool,

    pub started_at: DateTime<Utc>,

    /// Per-task outcomes, in plan order.
    pub report: ExecutionReport,

    /// Total duration in milliseconds.
    pub duration_ms: u64,

    /// Targets, expanded tasks and configuration this run executed.
    pub spec: RunSpec,

    /// Console lines produced by tasks.
    pub notices: Vec<String>,
}

impl PipelineResult {
    /// Number of tasks that passed.
    pub fn passed_count(&self) -> usize {
        self.report.passed_count()
    }

    /// Number of tasks that failed or were skipped.
    pub fn failed_count(&self) -> usize {
        self.report.results.len() - self.passed_count()
    }
}

/// The canonical build graph bound to one configuration.
pub struct BuildPipeline {
    config: BuildConfig,
    registry: SuiteRegistry,
    graph: TaskGraph,
    notices: Notices,
}

impl BuildPipeline {
    /// Validate `config` and wire every built-in target.
    pub fn new(config: BuildConfig) -> anyhow::Result<Self> {
        config.validate().context("invalid build configuration")?;
        let registry = config.registry()?;
        let notices = Notices::default();
        let graph = build_graph(&config, &registry, &notices)?;
        Ok(Self {
            config,
            registry,
            graph,
            notices,
        })
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn registry(&self) -> &SuiteRegistry {
        &self.registry
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Ordered tasks `targets` would run, without running them.
    pub fn plan<S: AsRef<str>>(&self, targets: &[S]) -> anyhow::Result<ExecutionPlan> {
        Ok(self.graph.plan(targets)?)
    }

    /// Plan and execute `targets`.
    pub async fn run(
        &self,
        targets: &[String],
        executor: Executor,
    ) -> anyhow::Result<PipelineResult> {
        let start = Instant::now();
        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();
        let plan = self.plan(targets)?;
        let spec = RunSpec::new(&self.config, targets, &plan)?;

        info!(
            run_id = %run_id,
            spec = %spec.short_digest(),
            targets = ?targets,
            tasks = ?plan.names(),
            max_parallel = executor.max_parallel(),
            "Starting build run"
        );

        let report = executor.execute(&self.graph, &plan).await?;
        let duration_ms = start.elapsed().as_millis() as u64;

        if report.success {
            info!(run_id = %run_id, duration_ms, "Build run completed successfully");
        } else {
            info!(run_id = %run_id, duration_ms, "Build run failed");
        }

        Ok(PipelineResult {
            run_id,
            success: report.success,
            started_at,
            report,
            duration_ms,
            spec,
            notices: self.notices.drain(),
        })
    }
}

fn node(target: BuiltinTarget, action: Arc<dyn TaskAction>) -> TaskNode {
    TaskNode::new(target.name(), action)
        .with_description(target.description())
        .in_group(target.group())
}

fn build_graph(
    config: &BuildConfig,
    registry: &SuiteRegistry,
    notices: &Notices,
) -> anyhow::Result<TaskGraph> {
    use BuiltinTarget::*;

    let collector = CoverageCollector::new(config.exec_format);
    let primary = registry.require(&config.primary_suite.name)?.clone();
    let extended = registry.require(&config.extended_suite.name)?.clone();
    let artifacts = vec![primary.exec_path.clone(), extended.exec_path.clone()];
    let locations = config.report_locations();
    let slot = ReportSlot::default();
    let source: Option<Arc<dyn CandidateSource>> =
        config.dependency_scan.source().map(Arc::from);

    let mut graph = TaskGraph::new();
    graph.add_task(node(
        PrimarySuite,
        Arc::new(RunSuite {
            suite: primary,
            collector,
        }),
    ))?;
    graph.add_task(node(
        ExtendedSuite,
        Arc::new(RunSuite {
            suite: extended,
            collector,
        }),
    ))?;
    graph.add_task(node(
        MergedReport,
        Arc::new(MergeReport {
            aggregator: Arc::new(config.aggregator()?),
            artifacts,
            locations: locations.clone(),
            slot: Arc::clone(&slot),
        }),
    ))?;
    graph.add_task(node(
        ThresholdVerification,
        Arc::new(VerifyThresholds {
            rules: config.rules.clone(),
            slot,
        }),
    ))?;
    graph.add_task(node(Check, Arc::new(NoopAction)))?;
    graph.add_task(node(
        FullRun,
        Arc::new(PrintHtmlLocation {
            html: locations.html.clone(),
            notices: notices.clone(),
        }),
    ))?;
    graph.add_task(node(
        Summary,
        Arc::new(PrintSummary {
            locations,
            notices: notices.clone(),
        }),
    ))?;
    graph.add_task(node(
        DependencyScan,
        Arc::new(ScanDependencies {
            source,
            notices: notices.clone(),
        }),
    ))?;

    graph.should_run_after(ExtendedSuite.name(), PrimarySuite.name())?;
    graph.depends_on(MergedReport.name(), PrimarySuite.name())?;
    graph.depends_on(MergedReport.name(), ExtendedSuite.name())?;
    graph.depends_on(ThresholdVerification.name(), MergedReport.name())?;
    graph.finalized_by(MergedReport.name(), ThresholdVerification.name())?;
    graph.depends_on(Check.name(), ExtendedSuite.name())?;
    graph.depends_on(Check.name(), MergedReport.name())?;
    graph.depends_on(FullRun.name(), PrimarySuite.name())?;
    graph.depends_on(FullRun.name(), ExtendedSuite.name())?;
    graph.depends_on(FullRun.name(), MergedReport.name())?;
    graph.depends_on(Summary.name(), MergedReport.name())?;

    Ok(graph)
}
