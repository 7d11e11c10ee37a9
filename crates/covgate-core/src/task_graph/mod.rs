//! Task graph: typed edges, deterministic planning and bounded-parallel
//! execution of build steps.

pub mod error;
pub mod executor;
pub mod graph;

pub use error::{GraphError, GraphResult};
pub use executor::{ExecutionReport, Executor, NoopAction, TaskAction, TaskResult, TaskStatus};
pub use graph::{EdgeKind, ExecutionPlan, PlanStep, TaskGraph, TaskNode};
