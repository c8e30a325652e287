//! Cross-field validation of an evidence record.
//!
//! The validator runs an ordered [`RuleSet`] over a record and returns every
//! failing check in a deterministic order, plus a completeness score.

pub mod rules;
pub mod tables;

use serde::{Deserialize, Serialize};

use crate::domain::record::EvidenceRecord;

pub use rules::{check_rule, RuleId, RuleSet, Severity, ValidationError, ValidationRule};

/// Weights for combining required and optional field ratios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletenessWeights {
    pub required_weight: f64,
    pub optional_weight: f64,
}

impl Default for CompletenessWeights {
    fn default() -> Self {
        Self {
            required_weight: 0.7,
            optional_weight: 0.3,
        }
    }
}

/// Required and optional fill ratios and their weighted combination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Completeness {
    pub required_ratio: f64,
    pub optional_ratio: f64,
    pub score: f64,
}

impl Completeness {
    pub fn compute(record: &EvidenceRecord, weights: CompletenessWeights) -> Self {
        let required = tables::required_fields(record.evidence_type());
        let required_ratio = fill_ratio(record, &required);
        let optional_ratio = fill_ratio(record, tables::OPTIONAL_FIELDS);
        Self {
            required_ratio,
            optional_ratio,
            score: weights.required_weight * required_ratio
                + weights.optional_weight * optional_ratio,
        }
    }
}

fn fill_ratio(record: &EvidenceRecord, fields: &[&str]) -> f64 {
    if fields.is_empty() {
        return 1.0;
    }
    let filled = fields.iter().filter(|f| record.is_committed(f)).count();
    filled as f64 / fields.len() as f64
}

/// Result of one validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// No Critical or Major errors.
    pub passed: bool,
    pub errors: Vec<ValidationError>,
    pub completeness: Completeness,
}

impl ValidationReport {
    pub fn blocking(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().filter(|e| e.severity.is_blocking())
    }

    pub fn critical(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors
            .iter()
            .filter(|e| e.severity == Severity::Critical)
    }

    pub fn has_critical(&self) -> bool {
        self.critical().next().is_some()
    }

    pub fn by_rule(&self, rule_id: RuleId) -> Vec<&ValidationError> {
        self.errors.iter().filter(|e| e.rule_id == rule_id).collect()
    }
}

/// Runs a rule set against records.
#[derive(Debug, Clone, PartialEq)]
pub struct Validator {
    rules: RuleSet,
    weights: CompletenessWeights,
}

impl Default for Validator {
    fn default() -> Self {
        Self::standard()
    }
}

impl Validator {
    pub fn standard() -> Self {
        Self::new(RuleSet::standard(), CompletenessWeights::default())
    }

    pub fn new(rules: RuleSet, weights: CompletenessWeights) -> Self {
        Self { rules, weights }
    }

    pub fn with_weights(mut self, weights: CompletenessWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Pure: the same record always yields the same ordered error list.
    pub fn validate(&self, record: &EvidenceRecord) -> ValidationReport {
        let mut errors = Vec::new();
        for rule in &self.rules.rules {
            check_rule(*rule, record, &mut errors);
        }
        let passed = !errors.iter().any(|e| e.severity.is_blocking());
        ValidationReport {
            passed,
            errors,
            completeness: Completeness::compute(record, self.weights),
        }
    }
}
