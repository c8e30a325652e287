//! Orchestrator execution tests: gating, isolation, timeouts, retries and
//! concurrency bounds.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use oncocurate_core::fakes::{FailingStage, PanickingStage, RecordingStage, StaticStage};
use oncocurate_core::{
    CapabilityKind, CommittedFields, ConnectorError, Document, EvidenceRecord, EvidenceType,
    Orchestrator, OrchestratorConfig, Predicate, RetryPolicy, RunContext, Stage, StageError,
    StageOutput, StageRegistry, TaskDefinition, TaskGraph, TaskState,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn def(id: &str, phase: u32) -> TaskDefinition {
    TaskDefinition::new(id, phase, CapabilityKind::Extraction)
}

fn context() -> RunContext {
    RunContext::new(
        "test-run",
        Document::new("BRAF V600E melanoma responds to vemurafenib."),
        EvidenceRecord::new(),
        CancellationToken::new(),
    )
}

async fn execute(graph: &TaskGraph, stages: &StageRegistry, config: &OrchestratorConfig) -> RunContext {
    let mut ctx = context();
    Orchestrator::new(graph, stages, config).execute(&mut ctx).await;
    ctx
}

/// Fails with a transient connector error until `failures` calls have been made.
struct TransientThenOk {
    failures: u32,
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl Stage for TransientThenOk {
    async fn execute(
        &self,
        _document: &Document,
        _committed: &CommittedFields,
    ) -> Result<StageOutput, StageError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(ConnectorError::Unavailable("503".into()).into());
        }
        Ok(StageOutput::new("resolved").field("disease_doid", json!("DOID:1909"), 0.9))
    }
}

#[tokio::test]
async fn test_missing_input_skips_task() {
    let graph = TaskGraph::builder()
        .task(def("type", 1).outputs(["evidence_type"]))
        .task(def("level", 2).inputs(["evidence_type"]).outputs(["evidence_level"]))
        .build()
        .unwrap();
    let mut stages = StageRegistry::new();
    stages.register("type", Arc::new(FailingStage::extraction("no classification")));
    stages.register("level", Arc::new(StaticStage::field("evidence_level", json!("B"), 0.9)));

    let ctx = execute(&graph, &stages, &OrchestratorConfig::default()).await;

    assert_eq!(ctx.audit.states_of("type"), vec![
        TaskState::Pending,
        TaskState::Ready,
        TaskState::Running,
        TaskState::Failed,
    ]);
    assert_eq!(ctx.audit.states_of("level"), vec![TaskState::Pending, TaskState::Skipped]);
    assert!(!ctx.record.is_committed("evidence_level"));
    let skipped = ctx.audit.for_stage("level").last().unwrap();
    assert!(skipped.rationale.contains("evidence_type"));
}

#[tokio::test]
async fn test_predicate_gates_task_on_evidence_type() {
    let graph = TaskGraph::builder()
        .task(def("type", 1).outputs(["evidence_type"]))
        .task(
            def("therapy", 2)
                .outputs(["therapy_names"])
                .when(Predicate::evidence_type_is(EvidenceType::Predictive)),
        )
        .build()
        .unwrap();
    let therapy = FailingStage::extraction("must not run");
    let calls = therapy.counter();
    let mut stages = StageRegistry::new();
    stages.register("type", Arc::new(StaticStage::field("evidence_type", json!("Prognostic"), 0.95)));
    stages.register("therapy", Arc::new(therapy));

    let ctx = execute(&graph, &stages, &OrchestratorConfig::default()).await;

    assert_eq!(ctx.audit.terminal_state("therapy"), Some(TaskState::Skipped));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let entry = ctx.audit.for_stage("therapy").last().unwrap();
    assert!(entry.rationale.contains("evidence_type == Predictive"));
}

#[tokio::test]
async fn test_same_phase_outputs_invisible_until_merge() {
    let recorder = RecordingStage::new(
        StageOutput::new("recorded").field("citation", json!("x"), 0.9),
        Duration::ZERO,
    );
    let late_recorder = recorder
        .sibling(StageOutput::new("recorded").field("publication_year", json!(2020), 0.9));
    let graph = TaskGraph::builder()
        .task(def("source", 1).outputs(["source_id"]))
        .task(def("citation", 1).outputs(["citation"]))
        .task(def("year", 2).outputs(["publication_year"]))
        .build()
        .unwrap();
    let mut stages = StageRegistry::new();
    stages.register("source", Arc::new(StaticStage::field("source_id", json!("PMID:1"), 1.0)));
    stages.register("citation", Arc::new(recorder.clone()));
    stages.register("year", Arc::new(late_recorder));

    let ctx = execute(&graph, &stages, &OrchestratorConfig::default()).await;

    let log = recorder.log();
    assert_eq!(log.invocations, 2);
    assert!(log.seen[0].is_empty(), "phase 1 must see the phase-entry snapshot");
    assert!(log.seen[1].contains("source_id"));
    assert!(log.seen[1].contains("citation"));
    assert_eq!(ctx.record.confidence("publication_year"), 0.9);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_fails_task_without_delaying_siblings() {
    let graph = TaskGraph::builder()
        .task(def("slow", 1).outputs(["citation"]))
        .task(def("fast", 1).outputs(["source_id"]))
        .build()
        .unwrap();
    let mut stages = StageRegistry::new();
    stages.register(
        "slow",
        Arc::new(StaticStage::field("citation", json!("late"), 0.9).with_delay(Duration::from_secs(60))),
    );
    stages.register(
        "fast",
        Arc::new(StaticStage::field("source_id", json!("PMID:1"), 0.9).with_delay(Duration::from_millis(100))),
    );
    let config = OrchestratorConfig {
        task_timeout_ms: 1_000,
        ..OrchestratorConfig::default()
    };

    let started = tokio::time::Instant::now();
    let ctx = execute(&graph, &stages, &config).await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(ctx.audit.terminal_state("slow"), Some(TaskState::Failed));
    assert_eq!(ctx.audit.terminal_state("fast"), Some(TaskState::Completed));
    let failed = ctx.audit.for_stage("slow").last().unwrap();
    assert!(failed.error.as_deref().unwrap().contains("timed out"));
    assert!(ctx.record.is_committed("source_id"));
}

#[tokio::test(start_paused = true)]
async fn test_idempotent_task_retries_transient_errors() {
    let calls = Arc::new(AtomicU32::new(0));
    let graph = TaskGraph::builder()
        .task(def("normalize", 1).outputs(["disease_doid"]).idempotent())
        .build()
        .unwrap();
    let mut stages = StageRegistry::new();
    stages.register(
        "normalize",
        Arc::new(TransientThenOk {
            failures: 2,
            calls: calls.clone(),
        }),
    );

    let started = tokio::time::Instant::now();
    let ctx = execute(&graph, &stages, &OrchestratorConfig::default()).await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // 200ms then 400ms of backoff.
    assert!(started.elapsed() >= Duration::from_millis(600));
    assert_eq!(ctx.audit.terminal_state("normalize"), Some(TaskState::Completed));
    assert_eq!(ctx.audit.for_stage("normalize").last().unwrap().attempts, 3);
    assert_eq!(ctx.record.str_value("disease_doid"), Some("DOID:1909"));
}

#[tokio::test(start_paused = true)]
async fn test_retries_stop_at_limit() {
    let calls = Arc::new(AtomicU32::new(0));
    let graph = TaskGraph::builder()
        .task(def("normalize", 1).outputs(["disease_doid"]).idempotent())
        .build()
        .unwrap();
    let mut stages = StageRegistry::new();
    stages.register(
        "normalize",
        Arc::new(TransientThenOk {
            failures: 10,
            calls: calls.clone(),
        }),
    );
    let config = OrchestratorConfig {
        retry: RetryPolicy {
            max_attempts: 2,
            ..RetryPolicy::default()
        },
        ..OrchestratorConfig::default()
    };

    let ctx = execute(&graph, &stages, &config).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(ctx.audit.terminal_state("normalize"), Some(TaskState::Failed));
}

#[tokio::test]
async fn test_non_idempotent_task_is_not_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let graph = TaskGraph::builder()
        .task(def("normalize", 1).outputs(["disease_doid"]))
        .build()
        .unwrap();
    let mut stages = StageRegistry::new();
    stages.register(
        "normalize",
        Arc::new(TransientThenOk {
            failures: 1,
            calls: calls.clone(),
        }),
    );

    let ctx = execute(&graph, &stages, &OrchestratorConfig::default()).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.audit.terminal_state("normalize"), Some(TaskState::Failed));
}

#[tokio::test]
async fn test_panicking_stage_is_isolated() {
    let graph = TaskGraph::builder()
        .task(def("boom", 1).outputs(["citation"]))
        .task(def("ok", 1).outputs(["source_id"]))
        .build()
        .unwrap();
    let mut stages = StageRegistry::new();
    stages.register("boom", Arc::new(PanickingStage));
    stages.register("ok", Arc::new(StaticStage::field("source_id", json!("PMID:1"), 0.9)));

    let ctx = execute(&graph, &stages, &OrchestratorConfig::default()).await;

    assert_eq!(ctx.audit.terminal_state("boom"), Some(TaskState::Failed));
    assert_eq!(ctx.audit.terminal_state("ok"), Some(TaskState::Completed));
    let entry = ctx.audit.for_stage("boom").last().unwrap();
    assert!(entry.error.as_deref().unwrap().contains("stage exploded"));
}

#[tokio::test]
async fn test_undeclared_output_dropped() {
    let graph = TaskGraph::builder()
        .task(def("type", 1).outputs(["evidence_type"]))
        .build()
        .unwrap();
    let output = StageOutput::new("classified")
        .field("evidence_type", json!("Predictive"), 0.9)
        .field("evidence_level", json!("A"), 0.9);
    let mut stages = StageRegistry::new();
    stages.register("type", Arc::new(StaticStage::new(output)));

    let ctx = execute(&graph, &stages, &OrchestratorConfig::default()).await;

    assert!(ctx.record.is_committed("evidence_type"));
    assert!(!ctx.record.is_committed("evidence_level"));
    let entry = ctx.audit.for_stage("type").last().unwrap();
    assert_eq!(entry.output_fields, vec!["evidence_type"]);
    assert!(entry.rationale.contains("dropped undeclared field evidence_level"));
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_bounded_by_semaphore() {
    let recorder = RecordingStage::new(StageOutput::new("p"), Duration::from_millis(100));
    let mut builder = TaskGraph::builder();
    let mut stages = StageRegistry::new();
    for i in 0..6 {
        let field = format!("field_{i}");
        let id = format!("task_{i}");
        builder = builder.task(def(&id, 1).outputs([field.clone()]));
        stages.register(
            id,
            Arc::new(recorder.sibling(StageOutput::new("p").field(field, json!(i), 0.9))),
        );
    }
    let graph = builder.build().unwrap();
    let config = OrchestratorConfig {
        max_concurrent: 2,
        ..OrchestratorConfig::default()
    };

    let started = tokio::time::Instant::now();
    let ctx = execute(&graph, &stages, &config).await;

    let log = recorder.log();
    assert_eq!(log.invocations, 6);
    assert!(log.max_in_flight <= 2);
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(ctx.record.committed_count(), 6);
}

#[tokio::test]
async fn test_merge_order_is_deterministic() {
    let graph = TaskGraph::builder()
        .task(def("b_task", 1).outputs(["citation"]))
        .task(def("a_task", 1).outputs(["source_id"]))
        .build()
        .unwrap();
    let mut stages = StageRegistry::new();
    stages.register("a_task", Arc::new(StaticStage::field("source_id", json!("PMID:1"), 0.9)));
    stages.register("b_task", Arc::new(StaticStage::field("citation", json!("c"), 0.9)));

    let ctx = execute(&graph, &stages, &OrchestratorConfig::default()).await;

    let order: Vec<&str> = ctx
        .audit
        .entries()
        .iter()
        .map(|e| e.stage_id.as_str())
        .collect();
    let first_b = order.iter().position(|s| *s == "b_task").unwrap();
    assert!(order[..first_b].iter().all(|s| *s == "a_task"));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_marks_phases_incomplete() {
    let graph = TaskGraph::builder()
        .task(def("slow", 1).outputs(["citation"]))
        .task(def("later", 2).outputs(["source_id"]))
        .build()
        .unwrap();
    let mut stages = StageRegistry::new();
    stages.register(
        "slow",
        Arc::new(StaticStage::field("citation", json!("c"), 0.9).with_delay(Duration::from_secs(10))),
    );
    stages.register("later", Arc::new(StaticStage::field("source_id", json!("PMID:1"), 0.9)));

    let mut ctx = context();
    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
    });
    let config = OrchestratorConfig::default();
    Orchestrator::new(&graph, &stages, &config).execute(&mut ctx).await;

    assert_eq!(ctx.audit.terminal_state("slow"), Some(TaskState::Failed));
    assert_eq!(ctx.audit.terminal_state("later"), Some(TaskState::Skipped));
    let phases: Vec<u32> = ctx.incomplete.iter().map(|p| p.phase).collect();
    assert_eq!(phases, vec![1, 2]);
    assert!(!ctx.record.is_committed("citation"));
}
