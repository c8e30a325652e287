//! Structured observability hooks for curation run lifecycle events.
//!
//! Every event carries an `event = "..."` key so log pipelines can filter on
//! it, plus the run id. Task-level events are emitted at `debug!`, run and
//! phase events at `info!`, failures and retries at `warn!`.

use std::fmt::Display;

use tracing::{debug, info, warn};

use crate::orchestrator::TaskState;

/// Run-scoped tracing span. Attach it to the run future with
/// [`tracing::Instrument::instrument`].
pub struct RunSpan {
    span: tracing::Span,
}

impl RunSpan {
    pub fn new(run_id: &str) -> Self {
        Self {
            span: tracing::info_span!("oncocurate.run", run_id = %run_id),
        }
    }

    pub fn span(&self) -> tracing::Span {
        self.span.clone()
    }
}

pub fn emit_run_started(run_id: &str, tasks: usize, phases: usize) {
    info!(event = "run.started", run_id = %run_id, tasks = tasks, phases = phases);
}

pub fn emit_phase_started(run_id: &str, phase: u32, tasks: usize) {
    info!(event = "phase.started", run_id = %run_id, phase = phase, tasks = tasks);
}

pub fn emit_phase_finished(
    run_id: &str,
    phase: u32,
    completed: usize,
    failed: usize,
    skipped: usize,
) {
    info!(
        event = "phase.finished",
        run_id = %run_id,
        phase = phase,
        completed = completed,
        failed = failed,
        skipped = skipped,
    );
}

pub fn emit_task_transition(run_id: &str, task_id: &str, state: TaskState) {
    debug!(event = "task.transition", run_id = %run_id, task = %task_id, state = %state);
}

pub fn emit_task_retry(run_id: &str, task_id: &str, attempt: u32, delay_ms: u64, error: &dyn Display) {
    warn!(
        event = "task.retry",
        run_id = %run_id,
        task = %task_id,
        attempt = attempt,
        delay_ms = delay_ms,
        error = %error,
    );
}

pub fn emit_task_failed(run_id: &str, task_id: &str, reason: &dyn Display) {
    warn!(event = "task.failed", run_id = %run_id, task = %task_id, reason = %reason);
}

pub fn emit_run_cancelled(run_id: &str, next_phase: u32) {
    warn!(event = "run.cancelled", run_id = %run_id, next_phase = next_phase);
}

pub fn emit_validation(run_id: &str, passed: bool, errors: usize, completeness: f64) {
    info!(
        event = "validation.evaluated",
        run_id = %run_id,
        passed = passed,
        errors = errors,
        completeness = completeness,
    );
}

pub fn emit_auto_fix(run_id: &str, fix_id: &str, rule: &dyn Display, fields: &[String]) {
    info!(
        event = "resolver.auto_fix",
        run_id = %run_id,
        fix = %fix_id,
        rule = %rule,
        fields = %fields.join(","),
    );
}

pub fn emit_run_finished(
    run_id: &str,
    state: &dyn Display,
    duration_ms: u64,
    review_items: usize,
    overall_confidence: f64,
) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        state = %state,
        duration_ms = duration_ms,
        review_items = review_items,
        overall_confidence = overall_confidence,
    );
}
