//! Error types for task graph construction and planning.

use thiserror::Error;

/// Errors produced while building or planning a task graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// An edge would close a cycle. `tasks` is the offending path.
    #[error("dependency cycle detected involving tasks: {tasks:?}")]
    DependencyCycle { tasks: Vec<String> },

    #[error("task not found in graph: {task}")]
    TaskNotFound { task: String },

    #[error("task already registered: {task}")]
    DuplicateTask { task: String },
}

/// Convenience result alias.
pub type GraphResult<T> = std::result::Result<T, GraphError>;
