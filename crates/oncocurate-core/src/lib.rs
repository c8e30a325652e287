//! Oncocurate Core Library
//!
//! Staged curation of clinical-genomic evidence items: a phased task graph
//! of extraction stages runs over a shared write-once record, after which
//! the record is validated, automatically repaired where possible, scored
//! for confidence and either finalized or queued for human review.

pub mod artifact;
pub mod audit;
pub mod confidence;
pub mod config;
pub mod connector;
pub mod domain;
pub mod fakes;
pub mod graph;
pub mod obs;
pub mod orchestrator;
pub mod pipeline;
pub mod rating;
pub mod resolver;
pub mod retry;
pub mod stage;
pub mod telemetry;
pub mod validator;

pub use artifact::{read_result_artifact, write_result_artifact};
pub use audit::{AuditEntry, AuditEvent, AuditTrace};
pub use confidence::{ConfidenceAggregator, ConfidenceConfig, ConfidenceReport};
pub use config::{ConfigError, PipelineConfig};
pub use connector::{
    Connector, ConnectorError, LookupHit, LookupOutcome, LookupQuery, OntologyNamespace,
};
pub use domain::{
    CommittedFields, CurationError, Document, DocumentError, EvidenceItem, EvidenceRecord,
    EvidenceType, FieldSlot, FieldStatus, Provenance, RecordError, Result, SectionSpan,
};
pub use graph::{
    CapabilityKind, FieldView, GraphError, Phase, Predicate, TaskDefinition, TaskGraph, TaskId,
};
pub use orchestrator::{
    FailureReason, IncompletePhase, Orchestrator, OrchestratorConfig, RunContext, SkipReason,
    TaskState,
};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineResult};
pub use rating::{Rating, RatingScorer, StudyQuality, WeightedRubric};
pub use resolver::{
    ConflictResolver, Fix, FixRegistry, RecordPatch, RecordState, Resolution, ResolutionPolicy,
    ReviewItem, ReviewKind,
};
pub use retry::RetryPolicy;
pub use stage::{Stage, StageError, StageOutput, StageRegistry};
pub use validator::{
    RuleId, RuleSet, Severity, ValidationError, ValidationReport, ValidationRule, Validator,
};
