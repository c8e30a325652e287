//! Review queue items for human adjudication.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::confidence::ConfidenceReport;
use crate::domain::record::EvidenceRecord;
use crate::orchestrator::IncompletePhase;
use crate::validator::tables::allowed_labels;
use crate::validator::{RuleId, Severity, ValidationError, ValidationRule};

/// Why an item needs review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReviewKind {
    /// A committed field below the review threshold.
    LowConfidence,
    /// An unresolved validation error.
    Validation { severity: Severity },
    /// An unresolved cross-field logical inconsistency.
    Conflict { severity: Severity },
    /// A phase that did not finish because the run was cancelled.
    IncompletePhase { phase: u32 },
}

impl ReviewKind {
    /// Blocking items force the record into review on their own.
    pub fn is_blocking(&self) -> bool {
        match self {
            ReviewKind::Validation { severity } | ReviewKind::Conflict { severity } => {
                *severity == Severity::Critical
            }
            ReviewKind::IncompletePhase { .. } => true,
            ReviewKind::LowConfidence => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub kind: ReviewKind,
    /// Primary field under review, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_fields: Vec<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<RuleId>,
    /// Allowed alternatives for enumerated fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    /// Stage rationale recorded with the current value.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub context: String,
}

impl ReviewItem {
    fn for_field(kind: ReviewKind, field: &str, record: &EvidenceRecord, message: String) -> Self {
        let slot = record.slot(field).filter(|s| s.is_committed());
        Self {
            kind,
            field: Some(field.to_string()),
            related_fields: Vec::new(),
            message,
            current_value: slot.and_then(|s| s.value.clone()),
            confidence: slot.map(|s| s.confidence),
            rule_id: None,
            suggestions: allowed_labels(field, record.evidence_type()),
            context: slot.map(|s| s.rationale.clone()).unwrap_or_default(),
        }
    }

    pub fn from_error(error: &ValidationError, record: &EvidenceRecord) -> Self {
        let kind = if error.rule == ValidationRule::LogicalConsistency {
            ReviewKind::Conflict {
                severity: error.severity,
            }
        } else {
            ReviewKind::Validation {
                severity: error.severity,
            }
        };
        match error.primary_field() {
            Some(field) => Self {
                related_fields: error.fields.iter().skip(1).cloned().collect(),
                rule_id: Some(error.rule_id),
                ..Self::for_field(kind, field, record, error.message.clone())
            },
            None => Self {
                kind,
                field: None,
                related_fields: Vec::new(),
                message: error.message.clone(),
                current_value: None,
                confidence: None,
                rule_id: Some(error.rule_id),
                suggestions: Vec::new(),
                context: String::new(),
            },
        }
    }

    pub fn low_confidence(field: &str, record: &EvidenceRecord, threshold: f64) -> Self {
        let confidence = record.confidence(field);
        Self::for_field(
            ReviewKind::LowConfidence,
            field,
            record,
            format!("{field} confidence {confidence:.2} is below the review threshold {threshold:.2}"),
        )
    }

    pub fn incomplete_phase(phase: &IncompletePhase) -> Self {
        Self {
            kind: ReviewKind::IncompletePhase { phase: phase.phase },
            field: None,
            related_fields: Vec::new(),
            message: format!(
                "phase {} did not complete ({}): {}",
                phase.phase,
                phase.reason,
                phase.tasks.join(", ")
            ),
            current_value: None,
            confidence: None,
            rule_id: None,
            suggestions: Vec::new(),
            context: String::new(),
        }
    }
}

/// Review queue in a stable order: incomplete phases, then unresolved errors
/// in validator order, then low-confidence fields by name.
pub fn build_review_queue(
    record: &EvidenceRecord,
    errors: &[ValidationError],
    confidence: &ConfidenceReport,
    incomplete: &[IncompletePhase],
) -> Vec<ReviewItem> {
    let mut queue: Vec<ReviewItem> = incomplete.iter().map(ReviewItem::incomplete_phase).collect();
    queue.extend(errors.iter().map(|e| ReviewItem::from_error(e, record)));
    queue.extend(
        confidence
            .low_confidence
            .iter()
            .map(|f| ReviewItem::low_confidence(f, record, confidence.review_threshold)),
    );
    queue
}
