//! Deterministic evidence level assignment from study design.

use async_trait::async_trait;
use oncocurate_core::domain::fields::{EVIDENCE_LEVEL, STUDY_DESIGN, STUDY_QUALITY};
use oncocurate_core::domain::vocab::{EvidenceLevel, StudyDesign};
use oncocurate_core::{CommittedFields, Document, Stage, StageError, StageOutput, StudyQuality};
use serde_json::json;

/// Confidence for a level matched by an explicit rule.
const RULE_CONFIDENCE: f64 = 0.9;
/// Confidence for level E reached because no rule matched a clinical design.
const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Assigns `evidence_level` from `study_design` and `study_quality`:
///
/// | design | condition | level |
/// |---|---|---|
/// | Phase III trial | approved therapy | A |
/// | Phase II trial | | B |
/// | cohort | n > 50 | B |
/// | case study | n <= 5 | C |
/// | preclinical | | D |
/// | anything else | | E |
#[derive(Debug, Clone, Copy, Default)]
pub struct EvidenceLevelStage;

/// Level, confidence and the rule that fired.
pub fn assign_level(design: StudyDesign, quality: &StudyQuality) -> (EvidenceLevel, f64, String) {
    let n = quality.sample_size;
    match design {
        StudyDesign::Phase3Trial if quality.fda_approved => (
            EvidenceLevel::A,
            RULE_CONFIDENCE,
            "phase III trial of an approved therapy".to_string(),
        ),
        StudyDesign::Phase2Trial => (
            EvidenceLevel::B,
            RULE_CONFIDENCE,
            "phase II trial".to_string(),
        ),
        StudyDesign::Cohort if n.is_some_and(|n| n > 50) => (
            EvidenceLevel::B,
            RULE_CONFIDENCE,
            format!("cohort study with n = {}", n.unwrap_or_default()),
        ),
        StudyDesign::CaseStudy if n.map_or(true, |n| n <= 5) => (
            EvidenceLevel::C,
            RULE_CONFIDENCE,
            "case report of at most five patients".to_string(),
        ),
        StudyDesign::Preclinical => (
            EvidenceLevel::D,
            RULE_CONFIDENCE,
            "preclinical model".to_string(),
        ),
        StudyDesign::Inferential => (
            EvidenceLevel::E,
            RULE_CONFIDENCE,
            "inferential association".to_string(),
        ),
        other => (
            EvidenceLevel::E,
            FALLBACK_CONFIDENCE,
            format!("no level rule matched {other}; defaulted to E"),
        ),
    }
}

#[async_trait]
impl Stage for EvidenceLevelStage {
    async fn execute(
        &self,
        _document: &Document,
        committed: &CommittedFields,
    ) -> Result<StageOutput, StageError> {
        let raw = committed
            .get(STUDY_DESIGN)
            .and_then(|v| v.as_str())
            .ok_or_else(|| StageError::InvalidInput(format!("{STUDY_DESIGN} is not text")))?;
        let design = StudyDesign::parse_loose(raw)
            .ok_or_else(|| StageError::InvalidInput(format!("unrecognized study design {raw:?}")))?;
        let quality = committed
            .get(STUDY_QUALITY)
            .and_then(StudyQuality::from_value)
            .unwrap_or_default();

        let (level, confidence, rule) = assign_level(design, &quality);
        Ok(StageOutput::new(format!("{rule} => level {level}")).field(
            EVIDENCE_LEVEL,
            json!(level.label()),
            confidence,
        ))
    }
}
