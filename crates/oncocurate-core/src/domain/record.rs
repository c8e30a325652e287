//! The shared evidence record: one slot per field, write-once per run.
//!
//! A slot moves `Unset → Set` when a stage (or a seed) commits a value and
//! `Set → Flagged` when the confidence aggregator marks it for review. A
//! committed value is never overwritten by another stage; only the conflict
//! resolver may replace it, and it records itself as the new provenance.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error::RecordError;
use crate::domain::vocab::EvidenceType;
use crate::domain::fields;

/// Read-only map of committed field values handed to stages.
pub type CommittedFields = BTreeMap<String, Value>;

/// Lifecycle of a single field slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    #[default]
    Unset,
    Set,
    Flagged,
}

impl FieldStatus {
    /// `Set` and `Flagged` both hold a committed value.
    pub fn is_committed(self) -> bool {
        matches!(self, FieldStatus::Set | FieldStatus::Flagged)
    }
}

/// Who wrote a field's current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    /// Supplied by the caller before the run started.
    Seed,
    /// Produced by a pipeline stage.
    Stage { stage_id: String },
    /// Replaced by an automated fix during conflict resolution.
    Resolved { fix_id: String },
}

impl Provenance {
    pub fn stage(stage_id: impl Into<String>) -> Self {
        Provenance::Stage {
            stage_id: stage_id.into(),
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Seed => write!(f, "seed"),
            Provenance::Stage { stage_id } => write!(f, "stage {stage_id}"),
            Provenance::Resolved { fix_id } => write!(f, "fix {fix_id}"),
        }
    }
}

/// One field of the evidence record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldSlot {
    pub value: Option<Value>,
    pub confidence: f64,
    pub status: FieldStatus,
    pub provenance: Option<Provenance>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rationale: String,
}

impl FieldSlot {
    pub fn is_committed(&self) -> bool {
        self.status.is_committed() && self.value.is_some()
    }
}

/// Shared field map for one curation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceRecord {
    slots: BTreeMap<String, FieldSlot>,
}

impl EvidenceRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record pre-populated with caller-supplied values at confidence 1.0.
    pub fn from_seeds<I, K>(seeds: I) -> Result<Self, RecordError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut record = Self::new();
        for (field, value) in seeds {
            record.commit(field, value, 1.0, Provenance::Seed, "seeded by caller")?;
        }
        Ok(record)
    }

    /// Commit a value into an unset slot.
    ///
    /// Fails if the slot already holds a committed value, if the value is
    /// null, or if `confidence` is outside `0.0..=1.0`.
    pub fn commit(
        &mut self,
        field: impl Into<String>,
        value: Value,
        confidence: f64,
        provenance: Provenance,
        rationale: impl Into<String>,
    ) -> Result<(), RecordError> {
        let field = field.into();
        if field.is_empty() {
            return Err(RecordError::EmptyFieldName);
        }
        if value.is_null() {
            return Err(RecordError::NullValue { field });
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(RecordError::InvalidConfidence {
                field,
                value: confidence,
            });
        }
        if let Some(existing) = self.slots.get(&field).filter(|s| s.is_committed()) {
            return Err(RecordError::AlreadyCommitted {
                provenance: existing
                    .provenance
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "unknown".to_string()),
                field,
            });
        }
        self.slots.insert(
            field,
            FieldSlot {
                value: Some(value),
                confidence,
                status: FieldStatus::Set,
                provenance: Some(provenance),
                rationale: rationale.into(),
            },
        );
        Ok(())
    }

    /// Replace a field's value on behalf of an automated fix.
    pub(crate) fn resolve(
        &mut self,
        field: &str,
        value: Value,
        confidence: f64,
        status: FieldStatus,
        fix_id: &str,
        rationale: impl Into<String>,
    ) {
        self.slots.insert(
            field.to_string(),
            FieldSlot {
                value: Some(value),
                confidence: confidence.clamp(0.0, 1.0),
                status,
                provenance: Some(Provenance::Resolved {
                    fix_id: fix_id.to_string(),
                }),
                rationale: rationale.into(),
            },
        );
    }

    /// Mark a committed field for review. Returns `true` if the status changed.
    pub(crate) fn flag(&mut self, field: &str) -> bool {
        match self.slots.get_mut(field) {
            Some(slot) if slot.status == FieldStatus::Set => {
                slot.status = FieldStatus::Flagged;
                true
            }
            _ => false,
        }
    }

    pub fn slot(&self, field: &str) -> Option<&FieldSlot> {
        self.slots.get(field)
    }

    pub fn status(&self, field: &str) -> FieldStatus {
        self.slots
            .get(field)
            .map(|s| s.status)
            .unwrap_or_default()
    }

    pub fn is_committed(&self, field: &str) -> bool {
        self.slots.get(field).is_some_and(FieldSlot::is_committed)
    }

    /// Committed value of a field; `None` when unset.
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.slots
            .get(field)
            .filter(|s| s.is_committed())
            .and_then(|s| s.value.as_ref())
    }

    pub fn str_value(&self, field: &str) -> Option<&str> {
        self.value(field).and_then(Value::as_str)
    }

    pub fn bool_value(&self, field: &str) -> Option<bool> {
        self.value(field).and_then(Value::as_bool)
    }

    /// Confidence of a committed field, `0.0` when unset.
    pub fn confidence(&self, field: &str) -> f64 {
        self.slots
            .get(field)
            .filter(|s| s.is_committed())
            .map(|s| s.confidence)
            .unwrap_or(0.0)
    }

    /// Number of entries in a list-valued field; a bare string counts as one.
    pub fn list_len(&self, field: &str) -> usize {
        match self.value(field) {
            Some(Value::Array(items)) => items.len(),
            Some(Value::String(s)) if !s.trim().is_empty() => 1,
            _ => 0,
        }
    }

    /// String entries of a list-valued field.
    pub fn string_list(&self, field: &str) -> Vec<String> {
        match self.value(field) {
            Some(Value::Array(items)) => items.iter().filter_map(value_text).collect(),
            Some(other) => value_text(other).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Text rendering of a scalar field (numbers are stringified).
    pub fn text(&self, field: &str) -> Option<String> {
        self.value(field).and_then(value_text)
    }

    /// The committed evidence type, matched loosely.
    pub fn evidence_type(&self) -> Option<EvidenceType> {
        self.str_value(fields::EVIDENCE_TYPE)
            .and_then(EvidenceType::parse_loose)
    }

    /// Snapshot of every committed field's value.
    pub fn committed_fields(&self) -> CommittedFields {
        self.slots
            .iter()
            .filter(|(_, s)| s.is_committed())
            .filter_map(|(k, s)| s.value.clone().map(|v| (k.clone(), v)))
            .collect()
    }

    pub fn committed_count(&self) -> usize {
        self.slots.values().filter(|s| s.is_committed()).count()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSlot)> {
        self.slots.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Render a scalar JSON value as text; arrays and objects yield `None`.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_commit_then_read() {
        let mut record = EvidenceRecord::new();
        record
            .commit(
                "evidence_type",
                json!("Predictive"),
                0.92,
                Provenance::stage("evidence_type"),
                "drug response language",
            )
            .unwrap();

        assert_eq!(record.status("evidence_type"), FieldStatus::Set);
        assert_eq!(record.str_value("evidence_type"), Some("Predictive"));
        assert_eq!(record.confidence("evidence_type"), 0.92);
        assert_eq!(record.evidence_type(), Some(EvidenceType::Predictive));
    }

    #[test]
    fn test_second_commit_rejected() {
        let mut record = EvidenceRecord::new();
        record
            .commit("disease_name", json!("Melanoma"), 0.9, Provenance::stage("disease"), "")
            .unwrap();
        let err = record
            .commit("disease_name", json!("NSCLC"), 0.99, Provenance::stage("other"), "")
            .unwrap_err();
        assert!(matches!(err, RecordError::AlreadyCommitted { .. }));
        assert_eq!(record.str_value("disease_name"), Some("Melanoma"));
    }

    #[test]
    fn test_confidence_bounds_enforced() {
        let mut record = EvidenceRecord::new();
        let err = record
            .commit("x", json!(1), 1.2, Provenance::Seed, "")
            .unwrap_err();
        assert!(matches!(err, RecordError::InvalidConfidence { .. }));
        let err = record
            .commit("x", json!(1), f64::NAN, Provenance::Seed, "")
            .unwrap_err();
        assert!(matches!(err, RecordError::InvalidConfidence { .. }));
    }

    #[test]
    fn test_null_value_rejected() {
        let mut record = EvidenceRecord::new();
        let err = record
            .commit("chromosome", Value::Null, 0.5, Provenance::Seed, "")
            .unwrap_err();
        assert!(matches!(err, RecordError::NullValue { .. }));
        assert_eq!(record.status("chromosome"), FieldStatus::Unset);
    }

    #[test]
    fn test_flag_only_moves_set_slots() {
        let mut record = EvidenceRecord::from_seeds([("source_id", json!("PMID:1"))]).unwrap();
        assert!(record.flag("source_id"));
        assert!(!record.flag("source_id"));
        assert!(!record.flag("missing"));
        assert_eq!(record.status("source_id"), FieldStatus::Flagged);
        assert!(record.is_committed("source_id"));
    }

    #[test]
    fn test_resolve_overwrites_with_fix_provenance() {
        let mut record = EvidenceRecord::new();
        record
            .commit("start_position", json!(200), 0.9, Provenance::stage("coords"), "")
            .unwrap();
        record.resolve("start_position", json!(100), 0.8, FieldStatus::Set, "swap", "swapped");
        let slot = record.slot("start_position").unwrap();
        assert_eq!(slot.value, Some(json!(100)));
        assert_eq!(
            slot.provenance,
            Some(Provenance::Resolved {
                fix_id: "swap".to_string()
            })
        );
    }

    #[test]
    fn test_list_helpers() {
        let record = EvidenceRecord::from_seeds([
            ("therapy_names", json!(["Dabrafenib", "Trametinib"])),
            ("variant_names", json!("V600E")),
            ("source_id", json!(12345)),
        ])
        .unwrap();
        assert_eq!(record.list_len("therapy_names"), 2);
        assert_eq!(record.list_len("variant_names"), 1);
        assert_eq!(record.list_len("phenotype_names"), 0);
        assert_eq!(record.string_list("therapy_names"), vec!["Dabrafenib", "Trametinib"]);
        assert_eq!(record.text("source_id"), Some("12345".to_string()));
    }

    #[test]
    fn test_committed_fields_snapshot_excludes_unset() {
        let mut record = EvidenceRecord::from_seeds([("source_id", json!("PMID:1"))]).unwrap();
        record
            .commit("study_design", json!("Cohort Study"), 0.8, Provenance::stage("design"), "")
            .unwrap();
        let committed = record.committed_fields();
        assert_eq!(committed.len(), 2);
        assert!(committed.contains_key("study_design"));
    }
}
