//! End-to-end curation pipeline: orchestrate, validate, resolve, finalize.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{warn, Instrument};
use uuid::Uuid;

use crate::audit::AuditTrace;
use crate::config::PipelineConfig;
use crate::confidence::{ConfidenceAggregator, ConfidenceReport};
use crate::domain::document::Document;
use crate::domain::error::Result;
use crate::domain::item::EvidenceItem;
use crate::domain::record::{CommittedFields, EvidenceRecord, Provenance};
use crate::graph::{GraphBuilder, GraphError, TaskDefinition, TaskGraph};
use crate::obs::{self, RunSpan};
use crate::orchestrator::{IncompletePhase, Orchestrator, RunContext, TaskState};
use crate::resolver::{AppliedFix, ConflictResolver, FixRegistry, RecordState, ReviewItem};
use crate::stage::{Stage, StageRegistry};
use crate::validator::{RuleSet, ValidationReport, Validator};

/// Assembles a [`Pipeline`] from task definitions and their stages.
#[derive(Default)]
pub struct PipelineBuilder {
    graph: GraphBuilder,
    stages: StageRegistry,
    config: PipelineConfig,
    rules: Option<RuleSet>,
    fixes: Option<FixRegistry>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task and the stage that executes it.
    pub fn task(self, definition: TaskDefinition, stage: impl Stage + 'static) -> Self {
        self.task_arc(definition, Arc::new(stage))
    }

    pub fn task_arc(mut self, definition: TaskDefinition, stage: Arc<dyn Stage>) -> Self {
        self.stages.register(definition.id.clone(), stage);
        self.graph = self.graph.task(definition);
        self
    }

    /// Register a task definition without a stage; `build` fails unless a
    /// stage is registered for it with [`PipelineBuilder::stage`].
    pub fn definition(mut self, definition: TaskDefinition) -> Self {
        self.graph = self.graph.task(definition);
        self
    }

    pub fn stage(mut self, task_id: impl Into<String>, stage: Arc<dyn Stage>) -> Self {
        self.stages.register(task_id, stage);
        self
    }

    /// Fields supplied as seeds rather than produced by a task.
    pub fn external_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.graph = self.graph.external_fields(fields);
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn rules(mut self, rules: RuleSet) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn fixes(mut self, fixes: FixRegistry) -> Self {
        self.fixes = Some(fixes);
        self
    }

    /// Validate the configuration and the graph, and check every task has a
    /// stage and every stage a task.
    pub fn build(self) -> Result<Pipeline> {
        self.config.validate()?;
        let graph = self.graph.build()?;

        for def in graph.tasks() {
            if !self.stages.contains(&def.id) {
                return Err(GraphError::MissingStage {
                    task: def.id.clone(),
                }
                .into());
            }
        }
        let mut registered: Vec<&str> = self.stages.task_ids().collect();
        registered.sort_unstable();
        if let Some(orphan) = registered.into_iter().find(|id| graph.get(id).is_none()) {
            return Err(GraphError::UnknownTask {
                task: orphan.to_string(),
            }
            .into());
        }

        let validator = Validator::new(self.rules.unwrap_or_default(), self.config.completeness);
        let resolver = ConflictResolver::new(
            validator,
            ConfidenceAggregator::new(self.config.confidence.clone()),
            self.fixes.unwrap_or_else(FixRegistry::standard),
            self.config.resolution.clone(),
        );

        Ok(Pipeline {
            graph,
            stages: self.stages,
            config: self.config,
            resolver,
        })
    }
}

/// A validated, ready-to-run curation pipeline.
#[derive(Debug)]
pub struct Pipeline {
    graph: TaskGraph,
    stages: StageRegistry,
    config: PipelineConfig,
    resolver: ConflictResolver,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Curate one document. Never fails: stage errors, timeouts and invalid
    /// seeds are recorded in the result.
    pub async fn run(&self, document: Document, seeds: CommittedFields) -> PipelineResult {
        self.run_with_cancel(document, seeds, CancellationToken::new())
            .await
    }

    /// As [`Pipeline::run`], stopping early when `cancel` fires. A cancelled
    /// run always ends in [`RecordState::PendingReview`].
    pub async fn run_with_cancel(
        &self,
        document: Document,
        seeds: CommittedFields,
        cancel: CancellationToken,
    ) -> PipelineResult {
        let run_id = Uuid::new_v4().to_string();
        let span = RunSpan::new(&run_id);
        self.run_inner(run_id, document, seeds, cancel)
            .instrument(span.span())
            .await
    }

    async fn run_inner(
        &self,
        run_id: String,
        document: Document,
        seeds: CommittedFields,
        cancel: CancellationToken,
    ) -> PipelineResult {
        let started_at = Utc::now();
        let clock = Instant::now();
        obs::emit_run_started(&run_id, self.graph.len(), self.graph.phases().len());

        let mut record = EvidenceRecord::new();
        for (field, value) in seeds {
            if let Err(e) = record.commit(
                field.clone(),
                value,
                1.0,
                Provenance::Seed,
                "seeded by caller",
            ) {
                warn!(run_id = %run_id, field = %field, error = %e, "ignoring invalid seed field");
            }
        }

        let mut ctx = RunContext::new(run_id, document, record, cancel);
        Orchestrator::new(&self.graph, &self.stages, &self.config.orchestrator)
            .execute(&mut ctx)
            .await;

        let resolution =
            self.resolver
                .resolve(&ctx.run_id, &mut ctx.record, &mut ctx.audit, &ctx.incomplete);

        let finished_at = Utc::now();
        obs::emit_run_finished(
            &ctx.run_id,
            &resolution.state,
            clock.elapsed().as_millis() as u64,
            resolution.review_queue.len(),
            resolution.confidence.overall,
        );

        PipelineResult {
            evidence_item: EvidenceItem::from_record(&ctx.record),
            run_id: ctx.run_id,
            state: resolution.state,
            record: ctx.record,
            confidence_report: resolution.confidence,
            validation: resolution.validation,
            review_queue: resolution.review_queue,
            fixes: resolution.fixes,
            audit_trace: ctx.audit,
            incomplete_phases: ctx.incomplete,
            started_at,
            finished_at,
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub run_id: String,
    pub state: RecordState,
    pub evidence_item: EvidenceItem,
    pub record: EvidenceRecord,
    pub confidence_report: ConfidenceReport,
    pub validation: ValidationReport,
    pub review_queue: Vec<ReviewItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fixes: Vec<AppliedFix>,
    pub audit_trace: AuditTrace,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub incomplete_phases: Vec<IncompletePhase>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineResult {
    pub fn is_finalized(&self) -> bool {
        self.state == RecordState::Finalized
    }

    /// Final state of a task, from the audit trace.
    pub fn task_state(&self, task_id: &str) -> Option<TaskState> {
        self.audit_trace.terminal_state(task_id)
    }

    pub fn review_items_for(&self, field: &str) -> Vec<&ReviewItem> {
        self.review_queue
            .iter()
            .filter(|item| item.field.as_deref() == Some(field))
            .collect()
    }

    pub fn overall_confidence(&self) -> f64 {
        self.confidence_report.overall
    }

    pub fn completeness(&self) -> f64 {
        self.validation.completeness.score
    }
}
