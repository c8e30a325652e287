//! Conflict resolution and finalization.
//!
//! After the orchestrator settles, the resolver validates the record, applies
//! automated fixes in bounded rounds, re-scores confidence and decides
//! whether the record is finalized or needs human review.

pub mod fixes;
pub mod review;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::audit::{AuditEntry, AuditTrace};
use crate::confidence::{ConfidenceAggregator, ConfidenceReport};
use crate::domain::digest::digest_fields;
use crate::domain::record::{EvidenceRecord, FieldStatus};
use crate::obs;
use crate::orchestrator::IncompletePhase;
use crate::validator::{ValidationReport, Validator};

pub use fixes::{
    CanonicalizeVocabulary, Fix, FixRegistry, NormalizeChromosome, RecordPatch,
    SwapReversedCoordinates,
};
pub use review::{build_review_queue, ReviewItem, ReviewKind};

/// Lifecycle of the record as a whole.
///
/// `Draft → Validated → {Finalized, PendingReview}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Draft,
    Validated,
    Finalized,
    PendingReview,
}

impl RecordState {
    pub fn can_transition_to(&self, next: RecordState) -> bool {
        use RecordState::*;
        matches!(
            (self, next),
            (Draft, Validated) | (Validated, Finalized) | (Validated, PendingReview)
        )
    }

    pub fn is_final(&self) -> bool {
        matches!(self, RecordState::Finalized | RecordState::PendingReview)
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordState::Draft => "draft",
            RecordState::Validated => "validated",
            RecordState::Finalized => "finalized",
            RecordState::PendingReview => "pending_review",
        };
        f.write_str(s)
    }
}

/// Bounds on automated resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionPolicy {
    /// Fix-and-revalidate rounds before giving up.
    pub max_rounds: u32,
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        Self { max_rounds: 3 }
    }
}

/// A fix that was applied to the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedFix {
    pub round: u32,
    pub fix_id: String,
    pub rule_id: crate::validator::RuleId,
    pub fields: Vec<String>,
    pub rationale: String,
}

/// Everything the resolver decided about a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub state: RecordState,
    pub validation: ValidationReport,
    pub confidence: ConfidenceReport,
    pub review_queue: Vec<ReviewItem>,
    pub fixes: Vec<AppliedFix>,
    pub rounds: u32,
}

#[derive(Debug, Clone)]
pub struct ConflictResolver {
    validator: Validator,
    aggregator: ConfidenceAggregator,
    fixes: FixRegistry,
    policy: ResolutionPolicy,
}

impl ConflictResolver {
    pub fn new(
        validator: Validator,
        aggregator: ConfidenceAggregator,
        fixes: FixRegistry,
        policy: ResolutionPolicy,
    ) -> Self {
        Self {
            validator,
            aggregator,
            fixes,
            policy,
        }
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn aggregator(&self) -> &ConfidenceAggregator {
        &self.aggregator
    }

    /// Validate, fix, re-score and finalize the record.
    pub fn resolve(
        &self,
        run_id: &str,
        record: &mut EvidenceRecord,
        audit: &mut AuditTrace,
        incomplete: &[IncompletePhase],
    ) -> Resolution {
        let mut state = RecordState::Draft;
        let mut applied = Vec::new();
        let mut rounds = 0;

        let mut report = self.validator.validate(record);
        while rounds < self.policy.max_rounds {
            if report.passed {
                break;
            }
            rounds += 1;
            let round_fixes = self.apply_round(run_id, rounds, record, audit, &report);
            if round_fixes.is_empty() {
                break;
            }
            applied.extend(round_fixes);
            report = self.validator.validate(record);
        }
        advance(&mut state, RecordState::Validated);
        obs::emit_validation(
            run_id,
            report.passed,
            report.errors.len(),
            report.completeness.score,
        );

        let confidence = self.aggregator.aggregate(record);
        let review_queue = build_review_queue(record, &report.errors, &confidence, incomplete);

        let needs_review =
            report.has_critical() || confidence.requires_review() || !incomplete.is_empty();
        let outcome = if needs_review {
            RecordState::PendingReview
        } else {
            RecordState::Finalized
        };
        advance(&mut state, outcome);

        Resolution {
            state,
            validation: report,
            confidence,
            review_queue,
            fixes: applied,
            rounds,
        }
    }

    /// One pass over the blocking errors. Each field is patched at most once
    /// per round; later errors touching it wait for re-validation.
    fn apply_round(
        &self,
        run_id: &str,
        round: u32,
        record: &mut EvidenceRecord,
        audit: &mut AuditTrace,
        report: &ValidationReport,
    ) -> Vec<AppliedFix> {
        let threshold = self.aggregator.config().review_threshold;
        let mut touched: BTreeSet<String> = BTreeSet::new();
        let mut applied = Vec::new();

        for error in report.blocking() {
            if error.fields.iter().any(|f| touched.contains(f)) {
                continue;
            }
            let Some((fix, patch)) = self.fixes.propose(error) else {
                continue;
            };
            let is_noop = patch
                .changes
                .iter()
                .all(|(field, value)| record.value(field) == Some(value));
            if is_noop {
                continue;
            }

            let read_values: BTreeMap<String, serde_json::Value> = patch
                .reads
                .iter()
                .filter_map(|f| record.value(f).map(|v| (f.clone(), v.clone())))
                .collect();
            let confidence = patch
                .reads
                .iter()
                .map(|f| record.confidence(f))
                .fold(1.0_f64, f64::min);
            let status = if confidence < threshold {
                FieldStatus::Flagged
            } else {
                FieldStatus::Set
            };

            for (field, value) in &patch.changes {
                record.resolve(field, value.clone(), confidence, status, fix.id(), &patch.rationale);
                touched.insert(field.clone());
            }

            let fields = patch.fields();
            let entry = AuditEntry::auto_fix(
                fix.id(),
                error.rule_id,
                digest_fields(&read_values),
                fields.clone(),
                patch.rationale.clone(),
            )
            .with_outputs(
                fields.clone(),
                fields.iter().map(|f| (f.clone(), confidence)).collect(),
            );
            audit.append(entry);
            obs::emit_auto_fix(run_id, fix.id(), &error.rule_id, &fields);

            applied.push(AppliedFix {
                round,
                fix_id: fix.id().to_string(),
                rule_id: error.rule_id,
                fields,
                rationale: patch.rationale,
            });
        }
        applied
    }
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new(
            Validator::standard(),
            ConfidenceAggregator::default(),
            FixRegistry::standard(),
            ResolutionPolicy::default(),
        )
    }
}

fn advance(state: &mut RecordState, next: RecordState) {
    if state.can_transition_to(next) {
        *state = next;
    } else {
        tracing::warn!(from = %state, to = %next, "ignored illegal record state transition");
    }
}
