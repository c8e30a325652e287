//! Task graph: definitions, activation predicates and phase planning.

pub mod dag;
pub mod error;
pub mod task;

pub use dag::{GraphBuilder, Phase, TaskGraph, TaskId};
pub use error::{GraphError, GraphResult};
pub use task::{CapabilityKind, FieldView, Predicate, TaskDefinition};
