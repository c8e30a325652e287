//! Required-field and value tables per evidence type.

use crate::domain::fields::*;
use crate::domain::vocab::{
    EvidenceDirection, EvidenceLevel, EvidenceType, Significance, TherapyInteraction,
    VariantKind, VariantOrigin,
};

/// Required for every evidence type.
pub const COMMON_REQUIRED: &[&str] = &[
    EVIDENCE_DESCRIPTION,
    EVIDENCE_TYPE,
    EVIDENCE_DIRECTION,
    EVIDENCE_SIGNIFICANCE,
    EVIDENCE_LEVEL,
    EVIDENCE_RATING,
    VARIANT_ORIGIN,
    MOLECULAR_PROFILE_NAME,
    SOURCE_ID,
];

pub const DISEASE_REQUIRED: &[&str] = &[DISEASE_NAME, DISEASE_DOID];

pub const PREDICTIVE_REQUIRED: &[&str] = &[THERAPY_NAMES, THERAPY_NCIT_IDS];

/// Optional fields counted by the completeness score.
pub const OPTIONAL_FIELDS: &[&str] = &[
    PHENOTYPE_NAMES,
    PHENOTYPE_HPO_IDS,
    CLINICAL_TRIAL_IDS,
    VARIANT_HGVS_DESCRIPTIONS,
    VARIANT_ALIASES,
    CHROMOSOME,
    START_POSITION,
    STOP_POSITION,
    REFERENCE_BUILD,
];

pub const VALID_CHROMOSOMES: &[&str] = &[
    "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15", "16", "17",
    "18", "19", "20", "21", "22", "X", "Y", "MT",
];

pub const REFERENCE_BUILDS: &[&str] = &["GRCh37", "GRCh38", "NCBI36"];

/// Required fields for an evidence type; only the common set when unknown.
///
/// Functional evidence describes molecular effect and carries no disease.
pub fn required_fields(evidence_type: Option<EvidenceType>) -> Vec<&'static str> {
    let mut required = COMMON_REQUIRED.to_vec();
    match evidence_type {
        Some(EvidenceType::Functional) => {}
        Some(EvidenceType::Predictive) => {
            required.extend_from_slice(DISEASE_REQUIRED);
            required.extend_from_slice(PREDICTIVE_REQUIRED);
        }
        Some(_) => required.extend_from_slice(DISEASE_REQUIRED),
        None => {}
    }
    required
}

pub fn is_valid_chromosome(raw: &str) -> bool {
    VALID_CHROMOSOMES.contains(&raw)
}

pub fn is_valid_reference_build(raw: &str) -> bool {
    REFERENCE_BUILDS.contains(&raw)
}

/// Canonical label for an enumerated field value, if the field is
/// enumerated and the value matches a label or alias.
pub fn canonical_label(field: &str, raw: &str) -> Option<&'static str> {
    match field {
        EVIDENCE_TYPE => EvidenceType::parse_loose(raw).map(|v| v.label()),
        EVIDENCE_LEVEL => EvidenceLevel::parse_loose(raw).map(|v| v.label()),
        EVIDENCE_DIRECTION => EvidenceDirection::parse_loose(raw).map(|v| v.label()),
        EVIDENCE_SIGNIFICANCE => Significance::parse_loose(raw).map(|v| v.label()),
        VARIANT_ORIGIN => VariantOrigin::parse_loose(raw).map(|v| v.label()),
        THERAPY_INTERACTION_TYPE => TherapyInteraction::parse_loose(raw).map(|v| v.label()),
        VARIANT_KIND => VariantKind::parse_loose(raw).map(|v| v.label()),
        _ => None,
    }
}

/// Allowed labels for an enumerated field, used as review suggestions.
pub fn allowed_labels(field: &str, evidence_type: Option<EvidenceType>) -> Vec<String> {
    let labels: Vec<&str> = match field {
        EVIDENCE_TYPE => EvidenceType::labels(),
        EVIDENCE_LEVEL => EvidenceLevel::labels(),
        EVIDENCE_DIRECTION => EvidenceDirection::labels(),
        EVIDENCE_SIGNIFICANCE => match evidence_type {
            Some(t) => t.allowed_significance().iter().map(|s| s.label()).collect(),
            None => Significance::labels(),
        },
        VARIANT_ORIGIN => VariantOrigin::labels(),
        THERAPY_INTERACTION_TYPE => TherapyInteraction::labels(),
        VARIANT_KIND => VariantKind::labels(),
        CHROMOSOME => VALID_CHROMOSOMES.to_vec(),
        REFERENCE_BUILD => REFERENCE_BUILDS.to_vec(),
        _ => Vec::new(),
    };
    labels.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predictive_requires_therapies() {
        let required = required_fields(Some(EvidenceType::Predictive));
        assert!(required.contains(&THERAPY_NAMES));
        assert!(required.contains(&DISEASE_DOID));
    }

    #[test]
    fn test_prognostic_does_not_require_therapies() {
        let required = required_fields(Some(EvidenceType::Prognostic));
        assert!(!required.contains(&THERAPY_NAMES));
        assert!(required.contains(&DISEASE_NAME));
    }

    #[test]
    fn test_functional_exempt_from_disease() {
        let required = required_fields(Some(EvidenceType::Functional));
        assert!(!required.contains(&DISEASE_NAME));
        assert_eq!(required.len(), COMMON_REQUIRED.len());
    }

    #[test]
    fn test_chromosome_and_build_tables() {
        assert!(is_valid_chromosome("7"));
        assert!(is_valid_chromosome("MT"));
        assert!(!is_valid_chromosome("chr7"));
        assert!(!is_valid_chromosome("23"));
        assert!(is_valid_reference_build("GRCh38"));
        assert!(!is_valid_reference_build("hg19"));
    }

    #[test]
    fn test_canonical_label_lookup() {
        assert_eq!(canonical_label(EVIDENCE_TYPE, "predictive"), Some("Predictive"));
        assert_eq!(
            canonical_label(EVIDENCE_SIGNIFICANCE, "Sensitivity"),
            Some("Sensitivity/Response")
        );
        assert_eq!(canonical_label(DISEASE_NAME, "Melanoma"), None);
    }

    #[test]
    fn test_allowed_labels_follow_type() {
        let labels = allowed_labels(EVIDENCE_SIGNIFICANCE, Some(EvidenceType::Diagnostic));
        assert_eq!(labels, vec!["Positive", "Negative"]);
    }
}
