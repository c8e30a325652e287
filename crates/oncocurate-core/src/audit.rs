//! Append-only audit trace of task transitions and automated fixes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::orchestrator::state::TaskState;
use crate::validator::RuleId;

/// What an audit entry records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A task entered `state`.
    Transition { state: TaskState },
    /// The resolver applied a fix for a validation error.
    AutoFix { fix_id: String, rule: RuleId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the trace, assigned on append.
    pub seq: u64,
    pub stage_id: String,
    pub phase: Option<u32>,
    pub event: AuditEvent,
    /// Digest of the committed input fields the task (or fix) read.
    pub inputs_digest: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub confidence: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn transition(
        stage_id: impl Into<String>,
        phase: u32,
        state: TaskState,
        inputs_digest: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            seq: 0,
            stage_id: stage_id.into(),
            phase: Some(phase),
            event: AuditEvent::Transition { state },
            inputs_digest: inputs_digest.into(),
            output_fields: Vec::new(),
            confidence: BTreeMap::new(),
            rationale: String::new(),
            error: None,
            attempts: 0,
            timestamp,
        }
    }

    pub fn auto_fix(
        fix_id: impl Into<String>,
        rule: RuleId,
        inputs_digest: impl Into<String>,
        output_fields: Vec<String>,
        rationale: impl Into<String>,
    ) -> Self {
        let fix_id = fix_id.into();
        Self {
            seq: 0,
            stage_id: format!("resolver/{fix_id}"),
            phase: None,
            event: AuditEvent::AutoFix { fix_id, rule },
            inputs_digest: inputs_digest.into(),
            output_fields,
            confidence: BTreeMap::new(),
            rationale: rationale.into(),
            error: None,
            attempts: 1,
            timestamp: Utc::now(),
        }
    }

    pub fn with_outputs(mut self, fields: Vec<String>, confidence: BTreeMap<String, f64>) -> Self {
        self.output_fields = fields;
        self.confidence = confidence;
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn state(&self) -> Option<TaskState> {
        match &self.event {
            AuditEvent::Transition { state } => Some(*state),
            AuditEvent::AutoFix { .. } => None,
        }
    }
}

/// Ordered audit log for one run. Entries can only be appended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditTrace {
    entries: Vec<AuditEntry>,
}

impl AuditTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, assigning its sequence number.
    pub fn append(&mut self, mut entry: AuditEntry) -> u64 {
        let seq = self.entries.len() as u64;
        entry.seq = seq;
        self.entries.push(entry);
        seq
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn for_stage<'a>(&'a self, stage_id: &'a str) -> impl Iterator<Item = &'a AuditEntry> {
        self.entries.iter().filter(move |e| e.stage_id == stage_id)
    }

    /// States a task passed through, in order.
    pub fn states_of(&self, stage_id: &str) -> Vec<TaskState> {
        self.for_stage(stage_id).filter_map(AuditEntry::state).collect()
    }

    /// Last recorded state of a task.
    pub fn terminal_state(&self, stage_id: &str) -> Option<TaskState> {
        self.states_of(stage_id).last().copied()
    }

    pub fn auto_fixes(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.event, AuditEvent::AutoFix { .. }))
    }
}
