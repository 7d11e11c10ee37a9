//! Plan execution with bounded concurrency.
//!
//! A task starts only once every scheduled predecessor is terminal. A task
//! whose hard dependency did not succeed is skipped, which in turn skips its
//! own hard dependents; unrelated branches keep running. There are no
//! timeouts here: cancelling a run is up to the host process.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tracing::{warn, Instrument};

use crate::obs;
use crate::task_graph::error::{GraphError, GraphResult};
use crate::task_graph::graph::{ExecutionPlan, TaskGraph};

/// Work performed by a task.
#[async_trait]
pub trait TaskAction: Send + Sync {
    async fn run(&self) -> anyhow::Result<()>;
}

/// Action for umbrella tasks that only aggregate dependencies.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAction;

#[async_trait]
impl TaskAction for NoopAction {
    async fn run(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Terminal status of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Succeeded,
    Failed,
    /// Not run because a hard dependency did not succeed.
    Skipped,
}

impl TaskStatus {
    pub fn name(&self) -> &'static str {
        match self {
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub name: String,
    pub status: TaskStatus,
    /// Failure or skip reason.
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
}

impl TaskResult {
    pub fn passed(&self) -> bool {
        self.status == TaskStatus::Succeeded
    }

    fn skipped(name: &str, reason: String) -> Self {
        Self {
            name: name.to_string(),
            status: TaskStatus::Skipped,
            error: Some(reason),
            started_at: None,
            finished_at: None,
            duration_ms: 0,
        }
    }
}

/// Results of executing a plan, in plan order.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub success: bool,
    pub results: Vec<TaskResult>,
}

impl ExecutionReport {
    pub fn get(&self, task: &str) -> Option<&TaskResult> {
        self.results.iter().find(|r| r.name == task)
    }

    pub fn status(&self, task: &str) -> Option<TaskStatus> {
        self.get(task).map(|r| r.status)
    }

    pub fn failed(&self) -> impl Iterator<Item = &TaskResult> {
        self.results
            .iter()
            .filter(|r| r.status == TaskStatus::Failed)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &TaskResult> {
        self.results
            .iter()
            .filter(|r| r.status == TaskStatus::Skipped)
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }
}

/// Runs an [`ExecutionPlan`] against the actions registered in a graph.
#[derive(Debug, Clone, Copy)]
pub struct Executor {
    max_parallel: usize,
}

impl Default for Executor {
    fn default() -> Self {
        Self::sequential()
    }
}

impl Executor {
    /// At most `max_parallel` tasks in flight; zero is treated as one.
    pub fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
        }
    }

    pub fn sequential() -> Self {
        Self::new(1)
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    pub async fn execute(
        &self,
        graph: &TaskGraph,
        plan: &ExecutionPlan,
    ) -> GraphResult<ExecutionReport> {
        let n = plan.steps.len();
        let position: HashMap<&str, usize> = plan
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.as_str(), i))
            .collect();
        let lookup = |name: &str| {
            position
                .get(name)
                .copied()
                .ok_or_else(|| GraphError::TaskNotFound {
                    task: name.to_string(),
                })
        };

        let mut after = Vec::with_capacity(n);
        let mut hard = Vec::with_capacity(n);
        let mut actions = Vec::with_capacity(n);
        for step in &plan.steps {
            after.push(
                step.after
                    .iter()
                    .map(|p| lookup(p))
                    .collect::<GraphResult<Vec<_>>>()?,
            );
            hard.push(
                step.hard_deps
                    .iter()
                    .map(|p| lookup(p))
                    .collect::<GraphResult<Vec<_>>>()?,
            );
            let node = graph.get(&step.name).ok_or_else(|| GraphError::TaskNotFound {
                task: step.name.clone(),
            })?;
            actions.push(node.action());
        }

        let mut results: Vec<Option<TaskResult>> = vec![None; n];
        let mut running = vec![false; n];
        let mut in_flight = FuturesUnordered::new();

        loop {
            let mut progressed = true;
            while progressed {
                progressed = false;
                for i in 0..n {
                    if results[i].is_some() || running[i] {
                        continue;
                    }
                    if !after[i].iter().all(|&p| results[p].is_some()) {
                        continue;
                    }
                    let blocker = hard[i].iter().copied().find(|&d| {
                        results[d].as_ref().map(|r| r.status) != Some(TaskStatus::Succeeded)
                    });
                    if let Some(blocker) = blocker {
                        let name = &plan.steps[i].name;
                        let reason = format!(
                            "dependency '{}' did not succeed",
                            plan.steps[blocker].name
                        );
                        warn!(task = %name, reason = %reason, "Skipping task");
                        obs::emit_task_finished(name, TaskStatus::Skipped.name(), 0);
                        results[i] = Some(TaskResult::skipped(name, reason));
                        progressed = true;
                        continue;
                    }
                    if in_flight.len() >= self.max_parallel {
                        continue;
                    }

                    running[i] = true;
                    let name = plan.steps[i].name.clone();
                    let handle = tokio::spawn(run_task(name, Arc::clone(&actions[i])));
                    in_flight.push(async move { (i, handle.await) });
                }
            }

            let Some((i, joined)) = in_flight.next().await else {
                break;
            };
            running[i] = false;
            let result = joined.unwrap_or_else(|e| {
                let now = Utc::now();
                TaskResult {
                    name: plan.steps[i].name.clone(),
                    status: TaskStatus::Failed,
                    error: Some(format!("task aborted: {e}")),
                    started_at: None,
                    finished_at: Some(now),
                    duration_ms: 0,
                }
            });
            results[i] = Some(result);
        }

        let results: Vec<TaskResult> = results
            .into_iter()
            .zip(&plan.steps)
            .map(|(r, step)| {
                r.unwrap_or_else(|| {
                    TaskResult::skipped(&step.name, "never became ready".to_string())
                })
            })
            .collect();

        Ok(ExecutionReport {
            success: results.iter().all(TaskResult::passed),
            results,
        })
    }
}

async fn run_task(name: String, action: Arc<dyn TaskAction>) -> TaskResult {
    let span = obs::task_span(&name);
    async move {
        obs::emit_task_started(&name);
        let started_at = Utc::now();
        let start = Instant::now();

        let outcome = action.run().await;

        let duration_ms = start.elapsed().as_millis() as u64;
        let (status, error) = match outcome {
            Ok(()) => (TaskStatus::Succeeded, None),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Task failed");
                (TaskStatus::Failed, Some(format!("{e:#}")))
            }
        };
        obs::emit_task_finished(&name, status.name(), duration_ms);

        TaskResult {
            name,
            status,
            error,
            started_at: Some(started_at),
            finished_at: Some(Utc::now()),
            duration_ms,
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task_graph::graph::TaskNode;
    use std::sync::Mutex;

    struct Record {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    #[async_trait]
    impl TaskAction for Record {
        async fn run(&self) -> anyhow::Result<()> {
            self.log.lock().unwrap().push(self.name);
            if self.fail {
                anyhow::bail!("{} broke", self.name);
            }
            Ok(())
        }
    }

    fn graph(
        tasks: &[(&'static str, bool)],
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) -> TaskGraph {
        let mut g = TaskGraph::new();
        for (name, fail) in tasks {
            g.add_task(TaskNode::new(
                *name,
                Arc::new(Record {
                    name: *name,
                    log: Arc::clone(log),
                    fail: *fail,
                }),
            ))
            .unwrap();
        }
        g
    }

    #[tokio::test]
    async fn test_sequential_execution_follows_plan_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut g = graph(&[("a", false), ("b", false), ("c", false)], &log);
        g.depends_on("c", "b").unwrap();
        g.depends_on("b", "a").unwrap();

        let plan = g.plan(&["c"]).unwrap();
        let report = Executor::sequential().execute(&g, &plan).await.unwrap();

        assert!(report.success);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
        assert!(report.get("a").unwrap().started_at.is_some());
    }

    #[tokio::test]
    async fn test_failure_skips_hard_downstream_only() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut g = graph(
            &[("broken", true), ("downstream", false), ("leaf", false), ("independent", false)],
            &log,
        );
        g.depends_on("downstream", "broken").unwrap();
        g.depends_on("leaf", "downstream").unwrap();

        let plan = g.plan(&["leaf", "independent"]).unwrap();
        let report = Executor::new(2).execute(&g, &plan).await.unwrap();

        assert!(!report.success);
        assert_eq!(report.status("broken"), Some(TaskStatus::Failed));
        assert_eq!(report.status("downstream"), Some(TaskStatus::Skipped));
        assert_eq!(report.status("leaf"), Some(TaskStatus::Skipped));
        assert_eq!(report.status("independent"), Some(TaskStatus::Succeeded));
        assert!(report.get("broken").unwrap().error.as_deref().unwrap().contains("broke"));
        assert!(!log.lock().unwrap().contains(&"downstream"));
    }

    #[tokio::test]
    async fn test_soft_predecessor_failure_does_not_block() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut g = graph(&[("primary", true), ("extended", false)], &log);
        g.should_run_after("extended", "primary").unwrap();

        let plan = g.plan(&["primary", "extended"]).unwrap();
        let report = Executor::sequential().execute(&g, &plan).await.unwrap();

        assert_eq!(report.status("extended"), Some(TaskStatus::Succeeded));
        assert_eq!(*log.lock().unwrap(), vec!["primary", "extended"]);
    }

    #[tokio::test]
    async fn test_finalizer_skipped_when_its_dependency_fails() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut g = graph(&[("report", true), ("verify", false)], &log);
        g.depends_on("verify", "report").unwrap();
        g.finalized_by("report", "verify").unwrap();

        let plan = g.plan(&["report"]).unwrap();
        let report = Executor::sequential().execute(&g, &plan).await.unwrap();
        assert_eq!(report.status("verify"), Some(TaskStatus::Skipped));
        assert_eq!(report.skipped().count(), 1);
        assert_eq!(report.failed().count(), 1);
    }

    struct Sleep(u64);

    #[async_trait]
    impl TaskAction for Sleep {
        async fn run(&self) -> anyhow::Result<()> {
            tokio::time::sleep(std::time::Duration::from_millis(self.0)).await;
            Ok(())
        }
    }

    async fn run_two_sleepers(executor: Executor) -> ExecutionReport {
        let mut g = TaskGraph::new();
        g.add_task(TaskNode::new("a", Arc::new(Sleep(200)))).unwrap();
        g.add_task(TaskNode::new("b", Arc::new(Sleep(200)))).unwrap();
        let plan = g.plan(&["a", "b"]).unwrap();
        executor.execute(&g, &plan).await.unwrap()
    }

    #[tokio::test]
    async fn test_independent_tasks_overlap_up_to_max_parallel() {
        let report = run_two_sleepers(Executor::new(2)).await;
        let a = report.get("a").unwrap();
        let b = report.get("b").unwrap();
        assert!(b.started_at.unwrap() < a.finished_at.unwrap());
    }

    #[tokio::test]
    async fn test_single_slot_runs_independent_tasks_one_at_a_time() {
        let report = run_two_sleepers(Executor::new(1)).await;
        let a = report.get("a").unwrap();
        let b = report.get("b").unwrap();
        assert!(b.started_at.unwrap() >= a.finished_at.unwrap());
    }

    #[test]
    fn test_zero_parallelism_is_clamped() {
        assert_eq!(Executor::new(0).max_parallel(), 1);
    }
}
