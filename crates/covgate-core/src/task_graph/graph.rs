//! Task graph and execution planning.
//!
//! Tasks are nodes of a directed acyclic graph with three kinds of edge:
//!
//! - **hard** (`depends_on`): the dependency is scheduled with the task and
//!   must succeed before the task may run.
//! - **soft** (`should_run_after`): ordering only, honoured when both tasks
//!   happen to be scheduled.
//! - **finalizer** (`finalized_by`): scheduling the task also schedules the
//!   finalizer, which runs once the task is terminal.
//!
//! Every edge orders its two endpoints, and cycles over the union of all
//! edge kinds are rejected when the edge is inserted.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::task_graph::error::{GraphError, GraphResult};
use crate::task_graph::executor::TaskAction;

/// Kind of edge between two tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Hard,
    Soft,
    Finalizer,
}

/// A named build step.
pub struct TaskNode {
    pub name: String,
    pub description: String,
    pub group: Option<String>,
    depends_on: Vec<String>,
    should_run_after: Vec<String>,
    finalized_by: Vec<String>,
    action: Arc<dyn TaskAction>,
}

impl TaskNode {
    pub fn new(name: impl Into<String>, action: Arc<dyn TaskAction>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            group: None,
            depends_on: Vec::new(),
            should_run_after: Vec::new(),
            finalized_by: Vec::new(),
            action,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Hard dependencies, in insertion order.
    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    pub fn should_run_after(&self) -> &[String] {
        &self.should_run_after
    }

    pub fn finalized_by(&self) -> &[String] {
        &self.finalized_by
    }

    pub fn action(&self) -> Arc<dyn TaskAction> {
        Arc::clone(&self.action)
    }
}

impl fmt::Debug for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskNode")
            .field("name", &self.name)
            .field("group", &self.group)
            .field("depends_on", &self.depends_on)
            .field("should_run_after", &self.should_run_after)
            .field("finalized_by", &self.finalized_by)
            .finish_non_exhaustive()
    }
}

/// One scheduled task of an [`ExecutionPlan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    pub name: String,
    /// Hard dependencies; all of them are part of the plan.
    pub hard_deps: Vec<String>,
    /// Every scheduled task that must be terminal before this one starts.
    pub after: Vec<String>,
}

/// A validated, topologically ordered set of tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    /// Requested targets, as given.
    pub targets: Vec<String>,
    pub steps: Vec<PlanStep>,
}

impl ExecutionPlan {
    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn position(&self, task: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.name == task)
    }

    pub fn contains(&self, task: &str) -> bool {
        self.position(task).is_some()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Directed task graph. Nodes keep their insertion order, which breaks ties
/// between otherwise unordered tasks.
#[derive(Debug, Default)]
pub struct TaskGraph {
    nodes: Vec<TaskNode>,
    index: HashMap<String, usize>,
    /// `predecessor → {successor, ...}` over all edge kinds.
    successors: Vec<BTreeSet<usize>>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task. Names are unique.
    pub fn add_task(&mut self, node: TaskNode) -> GraphResult<()> {
        if self.index.contains_key(&node.name) {
            return Err(GraphError::DuplicateTask { task: node.name });
        }
        self.index.insert(node.name.clone(), self.nodes.len());
        self.nodes.push(TaskNode {
            depends_on: Vec::new(),
            should_run_after: Vec::new(),
            finalized_by: Vec::new(),
            ..node
        });
        self.successors.push(BTreeSet::new());
        Ok(())
    }

    /// `task` requires `dependency` to succeed first.
    pub fn depends_on(&mut self, task: &str, dependency: &str) -> GraphResult<()> {
        self.add_edge(EdgeKind::Hard, task, dependency)
    }

    /// `task` runs after `predecessor` when both are scheduled.
    pub fn should_run_after(&mut self, task: &str, predecessor: &str) -> GraphResult<()> {
        self.add_edge(EdgeKind::Soft, task, predecessor)
    }

    /// Scheduling `task` also schedules `finalizer` to run after it.
    pub fn finalized_by(&mut self, task: &str, finalizer: &str) -> GraphResult<()> {
        self.add_edge(EdgeKind::Finalizer, task, finalizer)
    }

    pub fn get(&self, task: &str) -> Option<&TaskNode> {
        self.index.get(task).map(|&i| &self.nodes[i])
    }

    /// Tasks in insertion order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Closure of `targets` over hard dependencies and finalizers, in a
    /// deterministic topological order.
    ///
    /// Kahn's algorithm over the scheduled subgraph; among ready tasks the
    /// earliest registered runs first.
    pub fn plan<S: AsRef<str>>(&self, targets: &[S]) -> GraphResult<ExecutionPlan> {
        let mut scheduled = vec![false; self.nodes.len()];
        let mut stack = Vec::new();
        for target in targets {
            stack.push(self.require(target.as_ref())?);
        }
        while let Some(idx) = stack.pop() {
            if scheduled[idx] {
                continue;
            }
            scheduled[idx] = true;
            let node = &self.nodes[idx];
            for name in node.depends_on.iter().chain(&node.finalized_by) {
                stack.push(self.require(name)?);
            }
        }

        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for (from, succs) in self.successors.iter().enumerate() {
            if !scheduled[from] {
                continue;
            }
            for &to in succs {
                if scheduled[to] {
                    predecessors[to].push(from);
                }
            }
        }

        let mut in_degree: Vec<usize> = predecessors.iter().map(Vec::len).collect();
        let mut ready: BTreeSet<usize> = (0..self.nodes.len())
            .filter(|&i| scheduled[i] && in_degree[i] == 0)
            .collect();
        let mut order = Vec::new();

        while let Some(idx) = ready.pop_first() {
            order.push(idx);
            for &succ in &self.successors[idx] {
                if !scheduled[succ] {
                    continue;
                }
                in_degree[succ] -= 1;
                if in_degree[succ] == 0 {
                    ready.insert(succ);
                }
            }
        }

        let scheduled_count = scheduled.iter().filter(|s| **s).count();
        if order.len() != scheduled_count {
            return Err(GraphError::DependencyCycle {
                tasks: (0..self.nodes.len())
                    .filter(|&i| scheduled[i] && !order.contains(&i))
                    .map(|i| self.nodes[i].name.clone())
                    .collect(),
            });
        }

        let steps = order
            .into_iter()
            .map(|idx| {
                let node = &self.nodes[idx];
                let mut after: Vec<usize> = predecessors[idx].clone();
                after.sort_unstable();
                PlanStep {
                    name: node.name.clone(),
                    hard_deps: node.depends_on.clone(),
                    after: after
                        .into_iter()
                        .map(|i| self.nodes[i].name.clone())
                        .collect(),
                }
            })
            .collect();

        Ok(ExecutionPlan {
            targets: targets.iter().map(|t| t.as_ref().to_string()).collect(),
            steps,
        })
    }

    fn require(&self, task: &str) -> GraphResult<usize> {
        self.index
            .get(task)
            .copied()
            .ok_or_else(|| GraphError::TaskNotFound {
                task: task.to_string(),
            })
    }

    /// Insert an edge, rolling back if it would close a cycle.
    fn add_edge(&mut self, kind: EdgeKind, task: &str, other: &str) -> GraphResult<()> {
        let task_idx = self.require(task)?;
        let other_idx = self.require(other)?;

        // Ordering direction: predecessor → successor.
        let (from, to) = match kind {
            EdgeKind::Hard | EdgeKind::Soft => (other_idx, task_idx),
            EdgeKind::Finalizer => (task_idx, other_idx),
        };

        let inserted = self.successors[from].insert(to);
        if let Some(cycle) = self.find_path(to, from) {
            if inserted {
                self.successors[from].remove(&to);
            }
            let mut tasks: Vec<String> = cycle
                .into_iter()
                .map(|i| self.nodes[i].name.clone())
                .collect();
            tasks.push(self.nodes[to].name.clone());
            return Err(GraphError::DependencyCycle { tasks });
        }

        let other_name = other.to_string();
        let node = &mut self.nodes[task_idx];
        let list = match kind {
            EdgeKind::Hard => &mut node.depends_on,
            EdgeKind::Soft => &mut node.should_run_after,
            EdgeKind::Finalizer => &mut node.finalized_by,
        };
        if !list.contains(&other_name) {
            list.push(other_name);
        }
        Ok(())
    }

    /// DFS path from `start` to `target` along successor edges.
    fn find_path(&self, start: usize, target: usize) -> Option<Vec<usize>> {
        let mut visited = vec![false; self.nodes.len()];
        let mut path = Vec::new();
        if self.dfs(start, target, &mut visited, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    fn dfs(&self, node: usize, target: usize, visited: &mut [bool], path: &mut Vec<usize>) -> bool {
        if visited[node] {
            return false;
        }
        visited[node] = true;
        path.push(node);
        if node == target {
            return true;
        }
        for &succ in &self.successors[node] {
            if self.dfs(succ, target, visited, path) {
                return true;
            }
        }
        path.pop();
        false
    }
}
