//! Observability tests for curation run lifecycle tracing.

use std::sync::Arc;

use oncocurate_core::fakes::{FailingStage, StaticStage};
use oncocurate_core::obs::{
    emit_auto_fix, emit_run_finished, emit_run_started, emit_task_failed, RunSpan,
};
use oncocurate_core::{
    CapabilityKind, CommittedFields, Document, Pipeline, RecordState, TaskDefinition,
};
use serde_json::json;
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_run_started_logs_run_id() {
    emit_run_started("run-123", 18, 7);
    assert!(logs_contain("run.started"));
    assert!(logs_contain("run-123"));
}

#[traced_test]
#[test]
fn test_emit_run_finished_logs_state() {
    emit_run_finished("run-456", &RecordState::PendingReview, 5000, 2, 0.6);
    assert!(logs_contain("run.finished"));
    assert!(logs_contain("pending_review"));
}

#[traced_test]
#[test]
fn test_failures_and_fixes_are_logged() {
    emit_task_failed("run-789", "disease_normalization", &"connector unavailable");
    emit_auto_fix(
        "run-789",
        "swap_reversed_coordinates",
        &"coordinate_order",
        &["start_position".to_string(), "stop_position".to_string()],
    );
    assert!(logs_contain("task.failed"));
    assert!(logs_contain("disease_normalization"));
    assert!(logs_contain("auto_fix"));
}

#[traced_test]
#[test]
fn test_run_span_carries_run_id() {
    let span = RunSpan::new("span-run");
    let _entered = span.span().entered();
    emit_run_started("span-run", 1, 1);
    assert!(logs_contain("oncocurate.run"));
}

#[traced_test]
#[tokio::test]
async fn test_pipeline_run_emits_lifecycle_events() {
    let pipeline = Pipeline::builder()
        .task(
            TaskDefinition::new("evidence_type", 1, CapabilityKind::Classification)
                .outputs(["evidence_type"]),
            StaticStage::field("evidence_type", json!("Predictive"), 0.95),
        )
        .task_arc(
            TaskDefinition::new("evidence_level", 2, CapabilityKind::Interpretation)
                .outputs(["evidence_level"]),
            Arc::new(FailingStage::extraction("no study design")),
        )
        .build()
        .unwrap();

    let result = pipeline
        .run(Document::new("abstract"), CommittedFields::new())
        .await;

    assert_eq!(result.state, RecordState::PendingReview);
    assert!(logs_contain("run.started"));
    assert!(logs_contain("phase.finished"));
    assert!(logs_contain("task.failed"));
    assert!(logs_contain("no study design"));
    assert!(logs_contain("validation"));
    assert!(logs_contain("run.finished"));
}
