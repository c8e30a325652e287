//! Error types for task graph loading.

use thiserror::Error;

/// Errors produced while validating a set of task definitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Two definitions share one task id.
    #[error("duplicate task id: {task}")]
    DuplicateTask { task: String },

    /// A task declares no output fields.
    #[error("task {task} declares no output fields")]
    EmptyOutputs { task: String },

    /// Two tasks declare the same output field.
    #[error("field {field} is produced by both {first} and {second}")]
    DuplicateProducer {
        field: String,
        first: String,
        second: String,
    },

    /// An input field is neither produced by a task nor declared external.
    #[error("task {task} reads {field}, which no task produces")]
    UnproducibleInput { task: String, field: String },

    /// An input field is produced by a task in a later phase.
    #[error(
        "task {task} (phase {phase}) reads {field}, produced by {producer} in later phase {producer_phase}"
    )]
    LateProducer {
        task: String,
        phase: u32,
        field: String,
        producer: String,
        producer_phase: u32,
    },

    /// A predicate reads a field that is not committed by an earlier phase.
    #[error("predicate of task {task} reads {field}, which is not committed before phase {phase}")]
    PredicateReadsUncommitted {
        task: String,
        phase: u32,
        field: String,
    },

    /// The input/output dependency edges contain a cycle.
    #[error("dependency cycle detected involving tasks: {tasks:?}")]
    DependencyCycle { tasks: Vec<String> },

    /// A task has no stage implementation registered.
    #[error("no stage registered for task {task}")]
    MissingStage { task: String },

    /// A stage was registered for an id that is not in the graph.
    #[error("stage registered for unknown task {task}")]
    UnknownTask { task: String },
}

/// Convenience result alias.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display_lists_tasks() {
        let err = GraphError::DependencyCycle {
            tasks: vec!["a".to_string(), "b".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("cycle"));
        assert!(msg.contains("\"a\""));
    }

    #[test]
    fn test_late_producer_display() {
        let err = GraphError::LateProducer {
            task: "evidence_level".to_string(),
            phase: 1,
            field: "evidence_type".to_string(),
            producer: "evidence_type".to_string(),
            producer_phase: 2,
        };
        assert!(err.to_string().contains("later phase 2"));
    }
}
