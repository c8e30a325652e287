//! Automated fixes for validation errors.
//!
//! A fix is a pure function of a [`ValidationError`]: it reads the values the
//! error observed and proposes a [`RecordPatch`], or declines.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::domain::fields::{CHROMOSOME, EVIDENCE_SIGNIFICANCE, EVIDENCE_TYPE, START_POSITION, STOP_POSITION};
use crate::domain::vocab::{EvidenceType, Significance};
use crate::validator::tables;
use crate::validator::{RuleId, ValidationError};

/// Replacement values proposed by a fix.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordPatch {
    pub changes: BTreeMap<String, Value>,
    /// Fields whose values the fix relied on.
    pub reads: Vec<String>,
    pub rationale: String,
}

impl RecordPatch {
    pub fn new(rationale: impl Into<String>) -> Self {
        Self {
            rationale: rationale.into(),
            ..Self::default()
        }
    }

    pub fn set(mut self, field: impl Into<String>, value: Value) -> Self {
        self.changes.insert(field.into(), value);
        self
    }

    pub fn reading<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reads.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn fields(&self) -> Vec<String> {
        self.changes.keys().cloned().collect()
    }
}

/// An automated fix for one kind of validation error.
pub trait Fix: Send + Sync {
    fn id(&self) -> &str;

    /// Rule ids this fix knows how to handle.
    fn handles(&self, rule_id: RuleId) -> bool;

    fn propose(&self, error: &ValidationError) -> Option<RecordPatch>;
}

/// Swap start and stop when they are reversed.
pub struct SwapReversedCoordinates;

impl Fix for SwapReversedCoordinates {
    fn id(&self) -> &str {
        "swap_reversed_coordinates"
    }

    fn handles(&self, rule_id: RuleId) -> bool {
        rule_id == RuleId::CoordinateOrder
    }

    fn propose(&self, error: &ValidationError) -> Option<RecordPatch> {
        let start = error.observed.get(START_POSITION)?;
        let stop = error.observed.get(STOP_POSITION)?;
        if start.as_i64()? <= stop.as_i64()? {
            return None;
        }
        Some(
            RecordPatch::new(format!("swapped reversed coordinates {start}..{stop}"))
                .set(START_POSITION, stop.clone())
                .set(STOP_POSITION, start.clone())
                .reading([START_POSITION, STOP_POSITION]),
        )
    }
}

/// Rewrite an enumerated value to its canonical label when it matches one
/// case-insensitively or through a known alias.
pub struct CanonicalizeVocabulary;

impl Fix for CanonicalizeVocabulary {
    fn id(&self) -> &str {
        "canonicalize_vocabulary"
    }

    fn handles(&self, rule_id: RuleId) -> bool {
        matches!(
            rule_id,
            RuleId::UnrecognizedValue | RuleId::SignificanceNotAllowed
        )
    }

    fn propose(&self, error: &ValidationError) -> Option<RecordPatch> {
        let field = error.primary_field()?;
        let raw = error.observed.get(field)?.as_str()?;
        let canonical = tables::canonical_label(field, raw)?;
        if canonical == raw {
            return None;
        }

        let mut reads = vec![field.to_string()];
        if field == EVIDENCE_SIGNIFICANCE {
            // Only canonicalise into a significance the type allows.
            let evidence_type = error
                .observed
                .get(EVIDENCE_TYPE)
                .and_then(Value::as_str)
                .and_then(EvidenceType::parse_loose)?;
            let significance = Significance::parse_loose(canonical)?;
            if !evidence_type.allows(significance) {
                return None;
            }
            reads.push(EVIDENCE_TYPE.to_string());
        }

        Some(
            RecordPatch::new(format!("canonicalized {field} {raw:?} to {canonical:?}"))
                .set(field, Value::String(canonical.to_string()))
                .reading(reads),
        )
    }
}

/// Strip a `chr` prefix and map mitochondrial spellings to `MT`.
pub struct NormalizeChromosome;

impl NormalizeChromosome {
    fn normalize(raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        let bare = match (trimmed.get(..3), trimmed.get(3..)) {
            (Some(prefix), Some(rest)) if prefix.eq_ignore_ascii_case("chr") && !rest.is_empty() => {
                rest
            }
            _ => trimmed,
        };
        let upper = bare.to_ascii_uppercase();
        let candidate = match upper.as_str() {
            "M" => "MT".to_string(),
            _ => upper,
        };
        tables::is_valid_chromosome(&candidate).then_some(candidate)
    }
}

impl Fix for NormalizeChromosome {
    fn id(&self) -> &str {
        "normalize_chromosome"
    }

    fn handles(&self, rule_id: RuleId) -> bool {
        rule_id == RuleId::InvalidChromosome
    }

    fn propose(&self, error: &ValidationError) -> Option<RecordPatch> {
        let raw = error.observed.get(CHROMOSOME)?.as_str()?;
        let normalized = Self::normalize(raw)?;
        if normalized == raw {
            return None;
        }
        Some(
            RecordPatch::new(format!("normalized chromosome {raw:?} to {normalized:?}"))
                .set(CHROMOSOME, Value::String(normalized))
                .reading([CHROMOSOME]),
        )
    }
}

/// Ordered set of fixes; the first fix that proposes a patch wins.
#[derive(Clone, Default)]
pub struct FixRegistry {
    fixes: Vec<Arc<dyn Fix>>,
}

impl FixRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in fixes.
    pub fn standard() -> Self {
        Self::new()
            .with(SwapReversedCoordinates)
            .with(CanonicalizeVocabulary)
            .with(NormalizeChromosome)
    }

    pub fn with(self, fix: impl Fix + 'static) -> Self {
        self.with_arc(Arc::new(fix))
    }

    pub fn with_arc(mut self, fix: Arc<dyn Fix>) -> Self {
        self.fixes.push(fix);
        self
    }

    /// First applicable fix and its patch.
    pub fn propose(&self, error: &ValidationError) -> Option<(&dyn Fix, RecordPatch)> {
        self.fixes
            .iter()
            .filter(|f| f.handles(error.rule_id))
            .find_map(|f| f.propose(error).map(|patch| (f.as_ref(), patch)))
    }

    pub fn ids(&self) -> Vec<&str> {
        self.fixes.iter().map(|f| f.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }
}

impl fmt::Debug for FixRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixRegistry")
            .field("fixes", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn error(rule_id: RuleId, fields: &[&str], observed: &[(&str, Value)]) -> ValidationError {
        let mut e = ValidationError::new(rule_id, fields, "test");
        for (k, v) in observed {
            e.observed.insert(k.to_string(), v.clone());
        }
        e
    }

    #[test]
    fn test_swap_reversed_coordinates() {
        let e = error(
            RuleId::CoordinateOrder,
            &["start_position", "stop_position"],
            &[("start_position", json!(200)), ("stop_position", json!(100))],
        );
        let patch = SwapReversedCoordinates.propose(&e).unwrap();
        assert_eq!(patch.changes["start_position"], json!(100));
        assert_eq!(patch.changes["stop_position"], json!(200));
    }

    #[test]
    fn test_swap_declines_ordered_coordinates() {
        let e = error(
            RuleId::CoordinateOrder,
            &["start_position", "stop_position"],
            &[("start_position", json!(100)), ("stop_position", json!(200))],
        );
        assert!(SwapReversedCoordinates.propose(&e).is_none());
    }

    #[test]
    fn test_canonicalize_alias() {
        let e = error(
            RuleId::UnrecognizedValue,
            &["variant_origin"],
            &[("variant_origin", json!("germline"))],
        );
        let patch = CanonicalizeVocabulary.propose(&e).unwrap();
        assert_eq!(patch.changes["variant_origin"], json!("Rare Germline"));
    }

    #[test]
    fn test_canonicalize_significance_respects_type() {
        let allowed = error(
            RuleId::SignificanceNotAllowed,
            &["evidence_significance", "evidence_type"],
            &[
                ("evidence_significance", json!("Sensitivity")),
                ("evidence_type", json!("Predictive")),
            ],
        );
        let patch = CanonicalizeVocabulary.propose(&allowed).unwrap();
        assert_eq!(patch.changes["evidence_significance"], json!("Sensitivity/Response"));
        assert_eq!(patch.reads, vec!["evidence_significance", "evidence_type"]);

        let disallowed = error(
            RuleId::SignificanceNotAllowed,
            &["evidence_significance", "evidence_type"],
            &[
                ("evidence_significance", json!("sensitivity")),
                ("evidence_type", json!("Prognostic")),
            ],
        );
        assert!(CanonicalizeVocabulary.propose(&disallowed).is_none());
    }

    #[test]
    fn test_canonicalize_declines_unknown_value() {
        let e = error(
            RuleId::UnrecognizedValue,
            &["evidence_type"],
            &[("evidence_type", json!("Therapeutic"))],
        );
        assert!(CanonicalizeVocabulary.propose(&e).is_none());
    }

    #[test]
    fn test_normalize_chromosome() {
        assert_eq!(NormalizeChromosome::normalize("chr7").as_deref(), Some("7"));
        assert_eq!(NormalizeChromosome::normalize("chrM").as_deref(), Some("MT"));
        assert_eq!(NormalizeChromosome::normalize("x").as_deref(), Some("X"));
        assert_eq!(NormalizeChromosome::normalize("chr99"), None);
    }

    #[test]
    fn test_registry_first_applicable_wins() {
        let registry = FixRegistry::standard();
        assert_eq!(registry.len(), 3);
        let e = error(
            RuleId::InvalidChromosome,
            &["chromosome"],
            &[("chromosome", json!("chrX"))],
        );
        let (fix, patch) = registry.propose(&e).unwrap();
        assert_eq!(fix.id(), "normalize_chromosome");
        assert_eq!(patch.changes["chromosome"], json!("X"));

        let unfixable = error(RuleId::MissingRequiredField, &["disease_name"], &[]);
        assert!(registry.propose(&unfixable).is_none());
    }
}
