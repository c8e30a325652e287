//! Confidence aggregation and low-confidence flagging.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::fields;
use crate::domain::record::EvidenceRecord;
use crate::validator::tables::required_fields;

/// Threshold and critical-field settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Committed fields strictly below this value are flagged for review.
    pub review_threshold: f64,
    /// Fields whose confidence bounds the overall score.
    pub critical_fields: Vec<String>,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            review_threshold: 0.7,
            critical_fields: vec![
                fields::EVIDENCE_TYPE.to_string(),
                fields::EVIDENCE_LEVEL.to_string(),
                fields::DISEASE_NAME.to_string(),
                fields::MOLECULAR_PROFILE_NAME.to_string(),
            ],
        }
    }
}

/// Per-field and overall confidence for one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceReport {
    /// Every committed field, plus every applicable critical field (unset
    /// ones at 0.0).
    pub per_field: BTreeMap<String, f64>,
    /// The lower of the critical-field minimum and the mean; just the mean
    /// when no critical fields apply.
    pub overall: f64,
    /// Mean over committed fields.
    pub mean: f64,
    pub review_threshold: f64,
    /// Committed fields below the threshold.
    pub low_confidence: Vec<String>,
    /// Critical fields that are unset or below the threshold.
    pub critical_below_threshold: Vec<String>,
}

impl ConfidenceReport {
    /// Whether confidence alone requires human review.
    pub fn requires_review(&self) -> bool {
        !self.critical_below_threshold.is_empty() || self.overall < self.review_threshold
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfidenceAggregator {
    config: ConfidenceConfig,
}

impl ConfidenceAggregator {
    pub fn new(config: ConfidenceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConfidenceConfig {
        &self.config
    }

    /// Compute the report without touching the record.
    pub fn assess(&self, record: &EvidenceRecord) -> ConfidenceReport {
        let threshold = self.config.review_threshold;
        let mut per_field = BTreeMap::new();
        let mut low_confidence = Vec::new();

        for (field, slot) in record.fields() {
            if !slot.is_committed() {
                continue;
            }
            per_field.insert(field.to_string(), slot.confidence);
            if slot.confidence < threshold {
                low_confidence.push(field.to_string());
            }
        }

        let mean = if per_field.is_empty() {
            0.0
        } else {
            per_field.values().sum::<f64>() / per_field.len() as f64
        };

        // An unset critical field the evidence type does not require (the
        // disease of a Functional item) does not bound the score.
        let required = required_fields(record.evidence_type());
        let mut critical_below_threshold = Vec::new();
        let mut critical_min: Option<f64> = None;
        for field in &self.config.critical_fields {
            if !record.is_committed(field) && !required.contains(&field.as_str()) {
                continue;
            }
            let c = record.confidence(field);
            per_field.entry(field.clone()).or_insert(c);
            if c < threshold {
                critical_below_threshold.push(field.clone());
            }
            critical_min = Some(critical_min.map_or(c, |m: f64| m.min(c)));
        }

        ConfidenceReport {
            per_field,
            overall: critical_min.map_or(mean, |c| c.min(mean)),
            mean,
            review_threshold: threshold,
            low_confidence,
            critical_below_threshold,
        }
    }

    /// Compute the report and flag every low-confidence committed field.
    pub fn aggregate(&self, record: &mut EvidenceRecord) -> ConfidenceReport {
        let report = self.assess(record);
        for field in &report.low_confidence {
            record.flag(field);
        }
        report
    }
}
