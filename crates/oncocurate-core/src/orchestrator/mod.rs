//! Phase-by-phase task execution over the shared evidence record.
//!
//! Each phase sees one immutable snapshot of the record taken at phase
//! entry. Ready tasks in a phase run concurrently (bounded by a semaphore),
//! write their outputs into a per-phase buffer, and the buffer is merged
//! into the record in task-id order once every task has settled. A failing,
//! timing-out or panicking task never aborts its siblings.

pub mod state;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::audit::{AuditEntry, AuditTrace};
use crate::domain::digest::digest_fields;
use crate::domain::document::Document;
use crate::domain::record::{CommittedFields, EvidenceRecord, Provenance};
use crate::graph::{Phase, TaskDefinition, TaskGraph, TaskId};
use crate::obs;
use crate::retry::RetryPolicy;
use crate::stage::{Stage, StageOutput, StageRegistry};

pub use state::{FailureReason, SkipReason, TaskRun, TaskState, Transition};

/// Concurrency, timeout and retry settings for task execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Maximum tasks running at once within a phase.
    pub max_concurrent: usize,
    /// Time bound for a single stage invocation.
    pub task_timeout_ms: u64,
    /// Retry policy for idempotent tasks hitting transient connector errors.
    pub retry: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            task_timeout_ms: 30_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }
}

/// A phase that did not run to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompletePhase {
    pub phase: u32,
    pub tasks: Vec<String>,
    pub reason: String,
}

/// Mutable state threaded through one run.
#[derive(Debug)]
pub struct RunContext {
    pub run_id: String,
    pub document: Document,
    pub record: EvidenceRecord,
    pub audit: AuditTrace,
    pub incomplete: Vec<IncompletePhase>,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new(
        run_id: impl Into<String>,
        document: Document,
        record: EvidenceRecord,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            document,
            record,
            audit: AuditTrace::new(),
            incomplete: Vec::new(),
            cancel,
        }
    }
}

enum OutcomeResult {
    Completed(StageOutput),
    Skipped(SkipReason),
    Failed(FailureReason),
}

struct TaskOutcome {
    task: TaskId,
    run: TaskRun,
    result: OutcomeResult,
}

struct Invocation {
    attempts: u32,
    result: Result<StageOutput, FailureReason>,
}

#[derive(Debug, Clone)]
struct InvocationPolicy {
    timeout: Duration,
    retry: RetryPolicy,
}

/// Drives a [`TaskGraph`] phase by phase against a [`StageRegistry`].
pub struct Orchestrator<'a> {
    graph: &'a TaskGraph,
    stages: &'a StageRegistry,
    config: &'a OrchestratorConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        graph: &'a TaskGraph,
        stages: &'a StageRegistry,
        config: &'a OrchestratorConfig,
    ) -> Self {
        Self {
            graph,
            stages,
            config,
        }
    }

    /// Run every phase in ascending order. Once the run is cancelled the
    /// remaining phases are skipped and recorded as incomplete.
    pub async fn execute(&self, ctx: &mut RunContext) {
        let phases = self.graph.phases();
        for (i, phase) in phases.iter().enumerate() {
            if ctx.cancel.is_cancelled() {
                obs::emit_run_cancelled(&ctx.run_id, phase.ordinal);
                for rest in &phases[i..] {
                    self.skip_phase(rest, ctx);
                }
                return;
            }
            self.run_phase(phase, ctx).await;
        }
    }

    async fn run_phase(&self, phase: &Phase, ctx: &mut RunContext) {
        obs::emit_phase_started(&ctx.run_id, phase.ordinal, phase.tasks.len());

        let snapshot = ctx.record.clone();
        let committed = Arc::new(snapshot.committed_fields());
        let buffer: Arc<Mutex<Vec<TaskOutcome>>> =
            Arc::new(Mutex::new(Vec::with_capacity(phase.tasks.len())));
        let sem = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));

        let mut settled = Vec::new();
        let mut handles = Vec::new();

        for &task_id in &phase.tasks {
            let def = self.graph.task(task_id);
            let digest = inputs_digest(def, &committed);
            let mut run = TaskRun::new(&def.id, phase.ordinal, digest.clone());

            let missing: Vec<String> = def
                .input_fields
                .iter()
                .filter(|f| !snapshot.is_committed(f))
                .cloned()
                .collect();
            if !missing.is_empty() {
                run.advance(TaskState::Skipped);
                settled.push(TaskOutcome {
                    task: task_id,
                    run,
                    result: OutcomeResult::Skipped(SkipReason::MissingInputs(missing)),
                });
                continue;
            }
            if !def.predicate.evaluate(&snapshot) {
                run.advance(TaskState::Skipped);
                settled.push(TaskOutcome {
                    task: task_id,
                    run,
                    result: OutcomeResult::Skipped(SkipReason::PredicateFalse(
                        def.predicate.description().to_string(),
                    )),
                });
                continue;
            }

            run.advance(TaskState::Ready);
            let Some(stage) = self.stages.get(&def.id) else {
                run.advance(TaskState::Failed);
                settled.push(TaskOutcome {
                    task: task_id,
                    run,
                    result: OutcomeResult::Failed(FailureReason::Unregistered),
                });
                continue;
            };

            let policy = InvocationPolicy {
                timeout: self.config.task_timeout(),
                retry: if def.idempotent {
                    self.config.retry.clone()
                } else {
                    RetryPolicy::none()
                },
            };
            let document = ctx.document.clone();
            let committed = Arc::clone(&committed);
            let cancel = ctx.cancel.clone();
            let sem = Arc::clone(&sem);
            let buffer = Arc::clone(&buffer);
            let run_id = ctx.run_id.clone();
            let task_name = def.id.clone();

            let handle = tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.ok();

                if cancel.is_cancelled() {
                    run.advance(TaskState::Failed);
                    buffer.lock().await.push(TaskOutcome {
                        task: task_id,
                        run,
                        result: OutcomeResult::Failed(FailureReason::Cancelled),
                    });
                    return;
                }

                run.advance(TaskState::Running);
                obs::emit_task_transition(&run_id, &task_name, TaskState::Running);

                let invocation = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    inv = invoke(&*stage, &document, &committed, &policy, &run_id, &task_name) => Some(inv),
                };

                let result = match invocation {
                    Some(inv) => {
                        run.attempts = inv.attempts;
                        inv.result
                    }
                    None => Err(FailureReason::Cancelled),
                };
                let result = match result {
                    Ok(output) => {
                        run.advance(TaskState::Completed);
                        OutcomeResult::Completed(output)
                    }
                    Err(reason) => {
                        run.advance(TaskState::Failed);
                        OutcomeResult::Failed(reason)
                    }
                };
                buffer.lock().await.push(TaskOutcome {
                    task: task_id,
                    run,
                    result,
                });
            });
            handles.push((task_id, digest, handle));
        }

        let (spawned, joins): (Vec<_>, Vec<_>) = handles
            .into_iter()
            .map(|(task_id, digest, handle)| ((task_id, digest), handle))
            .unzip();
        for ((task_id, digest), joined) in spawned.into_iter().zip(join_all(joins).await) {
            if let Err(join_err) = joined {
                let message = if join_err.is_panic() {
                    panic_message(join_err.into_panic())
                } else {
                    join_err.to_string()
                };
                let def = self.graph.task(task_id);
                let mut run = TaskRun::new(&def.id, phase.ordinal, digest);
                run.advance(TaskState::Ready);
                run.advance(TaskState::Running);
                run.advance(TaskState::Failed);
                settled.push(TaskOutcome {
                    task: task_id,
                    run,
                    result: OutcomeResult::Failed(FailureReason::Panicked(message)),
                });
            }
        }

        let mut outcomes = std::mem::take(&mut *buffer.lock().await);
        outcomes.extend(settled);
        outcomes.sort_by(|a, b| self.graph.task(a.task).id.cmp(&self.graph.task(b.task).id));

        let (mut completed, mut failed, mut skipped) = (0usize, 0usize, 0usize);
        let mut cancelled = Vec::new();
        for outcome in outcomes {
            match &outcome.result {
                OutcomeResult::Completed(_) => completed += 1,
                OutcomeResult::Skipped(_) => skipped += 1,
                OutcomeResult::Failed(FailureReason::Cancelled) => {
                    failed += 1;
                    cancelled.push(self.graph.task(outcome.task).id.clone());
                }
                OutcomeResult::Failed(_) => failed += 1,
            }
            self.merge(outcome, ctx);
        }

        if !cancelled.is_empty() {
            ctx.incomplete.push(IncompletePhase {
                phase: phase.ordinal,
                tasks: cancelled,
                reason: SkipReason::RunCancelled.to_string(),
            });
        }
        obs::emit_phase_finished(&ctx.run_id, phase.ordinal, completed, failed, skipped);
    }

    /// Record every task in a phase that never started as skipped.
    fn skip_phase(&self, phase: &Phase, ctx: &mut RunContext) {
        let committed = ctx.record.committed_fields();
        let mut tasks = Vec::with_capacity(phase.tasks.len());
        for &task_id in &phase.tasks {
            let def = self.graph.task(task_id);
            let mut run = TaskRun::new(&def.id, phase.ordinal, inputs_digest(def, &committed));
            run.advance(TaskState::Skipped);
            tasks.push(def.id.clone());
            self.merge(
                TaskOutcome {
                    task: task_id,
                    run,
                    result: OutcomeResult::Skipped(SkipReason::RunCancelled),
                },
                ctx,
            );
        }
        ctx.incomplete.push(IncompletePhase {
            phase: phase.ordinal,
            tasks,
            reason: SkipReason::RunCancelled.to_string(),
        });
    }

    /// Apply one settled task to the record and the audit trace.
    fn merge(&self, outcome: TaskOutcome, ctx: &mut RunContext) {
        let def = self.graph.task(outcome.task);
        let run = outcome.run;

        let mut written = Vec::new();
        let mut confidences = BTreeMap::new();
        let mut rationale = String::new();
        let mut error = None;

        match outcome.result {
            OutcomeResult::Completed(output) => {
                rationale = output.rationale.clone();
                let notes =
                    commit_outputs(def, output, &mut ctx.record, &mut written, &mut confidences);
                for note in notes {
                    if !rationale.is_empty() {
                        rationale.push_str("; ");
                    }
                    rationale.push_str(&note);
                }
            }
            OutcomeResult::Skipped(reason) => rationale = reason.to_string(),
            OutcomeResult::Failed(reason) => {
                obs::emit_task_failed(&ctx.run_id, &def.id, &reason);
                error = Some(reason.to_string());
            }
        }

        let transitions = run.transitions();
        let last = transitions.len().saturating_sub(1);
        for (i, transition) in transitions.iter().enumerate() {
            let mut entry = AuditEntry::transition(
                &def.id,
                run.phase,
                transition.state,
                run.inputs_digest.clone(),
                transition.at,
            );
            if i == last {
                entry = entry
                    .with_outputs(written.clone(), confidences.clone())
                    .with_rationale(rationale.clone())
                    .with_attempts(run.attempts);
                if let Some(e) = &error {
                    entry = entry.with_error(e.clone());
                }
            }
            ctx.audit.append(entry);
        }
        obs::emit_task_transition(&ctx.run_id, &def.id, run.state());
    }
}

/// Commit a stage's declared outputs; returns notes on anything dropped or adjusted.
fn commit_outputs(
    def: &TaskDefinition,
    output: StageOutput,
    record: &mut EvidenceRecord,
    written: &mut Vec<String>,
    confidences: &mut BTreeMap<String, f64>,
) -> Vec<String> {
    let mut notes = Vec::new();
    for (field, value) in output.fields {
        if !def.produces(&field) {
            warn!(task = %def.id, field = %field, "dropping undeclared output field");
            notes.push(format!("dropped undeclared field {field}"));
            continue;
        }
        if value.is_null() {
            continue;
        }
        let confidence = match output.confidence.get(&field) {
            Some(c) if c.is_finite() => {
                let clamped = c.clamp(0.0, 1.0);
                if clamped != *c {
                    notes.push(format!("confidence {c} for {field} clamped to {clamped}"));
                }
                clamped
            }
            Some(c) => {
                notes.push(format!("non-finite confidence {c} for {field} treated as 0"));
                0.0
            }
            None => {
                notes.push(format!("no confidence reported for {field}; committed at 0"));
                0.0
            }
        };
        match record.commit(
            field.clone(),
            value,
            confidence,
            Provenance::stage(&def.id),
            output.rationale.clone(),
        ) {
            Ok(()) => {
                written.push(field.clone());
                confidences.insert(field, confidence);
            }
            Err(e) => {
                warn!(task = %def.id, error = %e, "output not committed");
                notes.push(e.to_string());
            }
        }
    }
    notes
}

async fn invoke(
    stage: &dyn Stage,
    document: &Document,
    committed: &CommittedFields,
    policy: &InvocationPolicy,
    run_id: &str,
    task_id: &str,
) -> Invocation {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match tokio::time::timeout(policy.timeout, stage.execute(document, committed)).await {
            Err(_) => {
                return Invocation {
                    attempts,
                    result: Err(FailureReason::Timeout(policy.timeout)),
                }
            }
            Ok(Ok(output)) => {
                return Invocation {
                    attempts,
                    result: Ok(output),
                }
            }
            Ok(Err(e)) if e.is_transient() && policy.retry.allows_retry_after(attempts) => {
                let delay = policy.retry.delay_for(attempts);
                obs::emit_task_retry(run_id, task_id, attempts, delay.as_millis() as u64, &e);
                tokio::time::sleep(delay).await;
            }
            Ok(Err(e)) => {
                return Invocation {
                    attempts,
                    result: Err(FailureReason::Stage(e)),
                }
            }
        }
    }
}

/// Digest of the committed values a task reads (inputs and predicate fields).
fn inputs_digest(def: &TaskDefinition, committed: &CommittedFields) -> String {
    let read: CommittedFields = def
        .input_fields
        .iter()
        .chain(def.predicate.reads())
        .filter_map(|f| committed.get(f).map(|v| (f.clone(), v.clone())))
        .collect();
    digest_fields(&read)
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
