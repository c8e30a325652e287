//! Validation rule catalogue.
//!
//! Each [`ValidationRule`] is one category of checks; a failing check emits
//! a [`ValidationError`] tagged with a specific [`RuleId`], whose severity is
//! fixed per id. Errors carry the values they observed so downstream fixes
//! can work from the error alone.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::fields::*;
use crate::domain::record::EvidenceRecord;
use crate::domain::vocab::{
    EvidenceDirection, EvidenceLevel, EvidenceType, Significance, StudyDesign,
    TherapyInteraction, VariantKind, VariantOrigin,
};
use crate::validator::tables::{self, required_fields};

/// Error severity. `Critical` and `Major` fail validation; `Minor` does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Major,
    Critical,
}

impl Severity {
    pub fn is_blocking(&self) -> bool {
        matches!(self, Severity::Major | Severity::Critical)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Minor => "minor",
            Severity::Major => "major",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// A category of checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationRule {
    RequiredFields,
    AllowedValues,
    Coordinates,
    LogicalConsistency,
    Structural,
    IdentifierFormat,
}

impl fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValidationRule::RequiredFields => "required_fields",
            ValidationRule::AllowedValues => "allowed_values",
            ValidationRule::Coordinates => "coordinates",
            ValidationRule::LogicalConsistency => "logical_consistency",
            ValidationRule::Structural => "structural",
            ValidationRule::IdentifierFormat => "identifier_format",
        };
        f.write_str(s)
    }
}

/// Specific check that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    MissingRequiredField,
    UnrecognizedValue,
    SignificanceNotAllowed,
    RatingOutOfRange,
    IncompleteCoordinates,
    CoordinateNotInteger,
    CoordinateOrder,
    InvalidChromosome,
    InvalidReferenceBuild,
    BaseShapeMismatch,
    SomaticPredisposing,
    LevelARequiresClinical,
    GermlineOncogenic,
    TherapyOnNonPredictive,
    ComplexProfileComponents,
    InteractionTypeRequiresTherapies,
    MultipleTherapiesRequireInteraction,
    TherapyIdCountMismatch,
    MalformedIdentifier,
}

impl RuleId {
    pub fn rule(&self) -> ValidationRule {
        use RuleId::*;
        match self {
            MissingRequiredField => ValidationRule::RequiredFields,
            UnrecognizedValue | SignificanceNotAllowed | RatingOutOfRange => {
                ValidationRule::AllowedValues
            }
            IncompleteCoordinates | CoordinateNotInteger | CoordinateOrder | InvalidChromosome
            | InvalidReferenceBuild | BaseShapeMismatch => ValidationRule::Coordinates,
            SomaticPredisposing | LevelARequiresClinical | GermlineOncogenic
            | TherapyOnNonPredictive => ValidationRule::LogicalConsistency,
            ComplexProfileComponents
            | InteractionTypeRequiresTherapies
            | MultipleTherapiesRequireInteraction
            | TherapyIdCountMismatch => ValidationRule::Structural,
            MalformedIdentifier => ValidationRule::IdentifierFormat,
        }
    }

    pub fn severity(&self) -> Severity {
        use RuleId::*;
        match self {
            MissingRequiredField
            | ComplexProfileComponents
            | InteractionTypeRequiresTherapies
            | MultipleTherapiesRequireInteraction => Severity::Critical,
            SomaticPredisposing | GermlineOncogenic | TherapyOnNonPredictive => Severity::Minor,
            _ => Severity::Major,
        }
    }

    pub fn as_str(&self) -> &'static str {
        use RuleId::*;
        match self {
            MissingRequiredField => "missing_required_field",
            UnrecognizedValue => "unrecognized_value",
            SignificanceNotAllowed => "significance_not_allowed",
            RatingOutOfRange => "rating_out_of_range",
            IncompleteCoordinates => "incomplete_coordinates",
            CoordinateNotInteger => "coordinate_not_integer",
            CoordinateOrder => "coordinate_order",
            InvalidChromosome => "invalid_chromosome",
            InvalidReferenceBuild => "invalid_reference_build",
            BaseShapeMismatch => "base_shape_mismatch",
            SomaticPredisposing => "somatic_predisposing",
            LevelARequiresClinical => "level_a_requires_clinical",
            GermlineOncogenic => "germline_oncogenic",
            TherapyOnNonPredictive => "therapy_on_non_predictive",
            ComplexProfileComponents => "complex_profile_components",
            InteractionTypeRequiresTherapies => "interaction_type_requires_therapies",
            MultipleTherapiesRequireInteraction => "multiple_therapies_require_interaction",
            TherapyIdCountMismatch => "therapy_id_count_mismatch",
            MalformedIdentifier => "malformed_identifier",
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("[{severity}] {rule_id}: {message}")]
pub struct ValidationError {
    pub rule_id: RuleId,
    pub rule: ValidationRule,
    pub severity: Severity,
    /// Fields involved; the first is the primary field for review.
    pub fields: Vec<String>,
    pub message: String,
    /// Values observed when the check ran, keyed by field.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub observed: BTreeMap<String, Value>,
}

impl ValidationError {
    pub fn new(rule_id: RuleId, fields: &[&str], message: impl Into<String>) -> Self {
        Self {
            rule_id,
            rule: rule_id.rule(),
            severity: rule_id.severity(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            message: message.into(),
            observed: BTreeMap::new(),
        }
    }

    /// Record the current value of each listed field that is committed.
    fn observe(mut self, record: &EvidenceRecord, fields: &[&str]) -> Self {
        for field in fields {
            if let Some(v) = record.value(field) {
                self.observed.insert(field.to_string(), v.clone());
            }
        }
        self
    }

    pub fn primary_field(&self) -> Option<&str> {
        self.fields.first().map(String::as_str)
    }
}

/// Ordered set of rule categories to evaluate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub rules: Vec<ValidationRule>,
}

impl RuleSet {
    /// All six categories.
    pub fn standard() -> Self {
        Self {
            rules: vec![
                ValidationRule::RequiredFields,
                ValidationRule::AllowedValues,
                ValidationRule::Coordinates,
                ValidationRule::LogicalConsistency,
                ValidationRule::Structural,
                ValidationRule::IdentifierFormat,
            ],
        }
    }

    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        if !self.rules.contains(&rule) {
            self.rules.push(rule);
        }
        self
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::standard()
    }
}

/// Evaluate one rule category against the record, appending any errors.
pub fn check_rule(rule: ValidationRule, record: &EvidenceRecord, out: &mut Vec<ValidationError>) {
    match rule {
        ValidationRule::RequiredFields => check_required(record, out),
        ValidationRule::AllowedValues => check_allowed_values(record, out),
        ValidationRule::Coordinates => {
            if COORDINATE_FIELDS.iter().any(|f| record.is_committed(f)) {
                check_coordinates(record, out);
            }
        }
        ValidationRule::LogicalConsistency => check_logical(record, out),
        ValidationRule::Structural => check_structural(record, out),
        ValidationRule::IdentifierFormat => check_identifiers(record, out),
    }
}

// ---------------------------------------------------------------------------
// Required fields
// ---------------------------------------------------------------------------

fn check_required(record: &EvidenceRecord, out: &mut Vec<ValidationError>) {
    let evidence_type = record.evidence_type();
    let label = evidence_type
        .map(|t| format!("{t} evidence"))
        .unwrap_or_else(|| "evidence of unknown type".to_string());
    for field in required_fields(evidence_type) {
        if !record.is_committed(field) {
            out.push(
                ValidationError::new(
                    RuleId::MissingRequiredField,
                    &[field],
                    format!("required field {field} is missing for {label}"),
                )
                .observe(record, &[EVIDENCE_TYPE]),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Allowed values
// ---------------------------------------------------------------------------

fn check_enumerated(
    record: &EvidenceRecord,
    field: &str,
    labels: Vec<&'static str>,
    parse: fn(&str) -> bool,
    out: &mut Vec<ValidationError>,
) {
    let Some(value) = record.value(field) else {
        return;
    };
    let raw = value.as_str().unwrap_or_default();
    if labels.contains(&raw) {
        return;
    }
    let message = if parse(raw) {
        format!("{field} value {value} is not in canonical form")
    } else {
        format!("{field} value {value} is not one of {}", labels.join(", "))
    };
    out.push(ValidationError::new(RuleId::UnrecognizedValue, &[field], message).observe(record, &[field]));
}

fn check_allowed_values(record: &EvidenceRecord, out: &mut Vec<ValidationError>) {
    check_enumerated(
        record,
        EVIDENCE_TYPE,
        EvidenceType::labels(),
        |s| EvidenceType::parse_loose(s).is_some(),
        out,
    );
    check_enumerated(
        record,
        EVIDENCE_LEVEL,
        EvidenceLevel::labels(),
        |s| EvidenceLevel::parse_loose(s).is_some(),
        out,
    );
    check_enumerated(
        record,
        EVIDENCE_DIRECTION,
        EvidenceDirection::labels(),
        |s| EvidenceDirection::parse_loose(s).is_some(),
        out,
    );

    if let (Some(evidence_type), Some(value)) =
        (record.evidence_type(), record.value(EVIDENCE_SIGNIFICANCE))
    {
        let allowed: Vec<&str> = evidence_type
            .allowed_significance()
            .iter()
            .map(Significance::label)
            .collect();
        let raw = value.as_str().unwrap_or_default();
        if !allowed.contains(&raw) {
            out.push(
                ValidationError::new(
                    RuleId::SignificanceNotAllowed,
                    &[EVIDENCE_SIGNIFICANCE, EVIDENCE_TYPE],
                    format!(
                        "significance {value} is not allowed for {evidence_type} evidence (allowed: {})",
                        allowed.join(", ")
                    ),
                )
                .observe(record, &[EVIDENCE_SIGNIFICANCE, EVIDENCE_TYPE]),
            );
        }
    }

    check_enumerated(
        record,
        VARIANT_ORIGIN,
        VariantOrigin::labels(),
        |s| VariantOrigin::parse_loose(s).is_some(),
        out,
    );
    check_enumerated(
        record,
        THERAPY_INTERACTION_TYPE,
        TherapyInteraction::labels(),
        |s| TherapyInteraction::parse_loose(s).is_some(),
        out,
    );

    if let Some(value) = record.value(EVIDENCE_RATING) {
        let in_range = as_integer(value).is_some_and(|n| (1..=5).contains(&n));
        if !in_range {
            out.push(
                ValidationError::new(
                    RuleId::RatingOutOfRange,
                    &[EVIDENCE_RATING],
                    format!("evidence rating {value} must be an integer from 1 to 5"),
                )
                .observe(record, &[EVIDENCE_RATING]),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// Integer value of a JSON number, or of an integral float.
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        _ => None,
    }
}

/// Base string with `-` read as empty; absent reads as empty.
fn bases(record: &EvidenceRecord, field: &str) -> String {
    match record.str_value(field).map(str::trim) {
        Some("-") | None => String::new(),
        Some(s) => s.to_uppercase(),
    }
}

fn is_nucleotides(s: &str) -> bool {
    s.chars().all(|c| matches!(c, 'A' | 'C' | 'G' | 'T' | 'N'))
}

fn check_coordinates(record: &EvidenceRecord, out: &mut Vec<ValidationError>) {
    let core = [CHROMOSOME, START_POSITION, STOP_POSITION];
    let missing: Vec<&str> = core
        .iter()
        .copied()
        .filter(|f| !record.is_committed(f))
        .collect();
    if !missing.is_empty() && missing.len() < core.len() {
        out.push(
            ValidationError::new(
                RuleId::IncompleteCoordinates,
                &missing,
                format!("coordinates are incomplete: missing {}", missing.join(", ")),
            )
            .observe(record, &core),
        );
    }

    let mut positions = [None, None];
    for (slot, field) in positions.iter_mut().zip([START_POSITION, STOP_POSITION]) {
        let Some(value) = record.value(field) else {
            continue;
        };
        match as_integer(value).filter(|n| *n >= 1) {
            Some(n) => *slot = Some(n),
            None => out.push(
                ValidationError::new(
                    RuleId::CoordinateNotInteger,
                    &[field],
                    format!("{field} value {value} must be a positive integer"),
                )
                .observe(record, &[field]),
            ),
        }
    }
    if let [Some(start), Some(stop)] = positions {
        if start > stop {
            out.push(
                ValidationError::new(
                    RuleId::CoordinateOrder,
                    &[START_POSITION, STOP_POSITION],
                    format!("start position {start} is greater than stop position {stop}"),
                )
                .observe(record, &[START_POSITION, STOP_POSITION]),
            );
        }
    }

    if let Some(value) = record.value(CHROMOSOME) {
        let valid = value.as_str().is_some_and(tables::is_valid_chromosome);
        if !valid {
            out.push(
                ValidationError::new(
                    RuleId::InvalidChromosome,
                    &[CHROMOSOME],
                    format!("chromosome {value} must be one of 1-22, X, Y, MT"),
                )
                .observe(record, &[CHROMOSOME]),
            );
        }
    }

    if let Some(value) = record.value(REFERENCE_BUILD) {
        let valid = value.as_str().is_some_and(tables::is_valid_reference_build);
        if !valid {
            out.push(
                ValidationError::new(
                    RuleId::InvalidReferenceBuild,
                    &[REFERENCE_BUILD],
                    format!(
                        "reference build {value} must be one of {}",
                        tables::REFERENCE_BUILDS.join(", ")
                    ),
                )
                .observe(record, &[REFERENCE_BUILD]),
            );
        }
    }

    let kind = record
        .str_value(VARIANT_KIND)
        .and_then(VariantKind::parse_loose);
    let has_bases = record.is_committed(REFERENCE_BASES) || record.is_committed(VARIANT_BASES);
    if let (Some(kind), true) = (kind, has_bases) {
        let reference = bases(record, REFERENCE_BASES);
        let variant = bases(record, VARIANT_BASES);
        let problem = if !is_nucleotides(&reference) || !is_nucleotides(&variant) {
            Some("bases may only contain A, C, G, T or N".to_string())
        } else {
            match kind {
                VariantKind::Point if reference.len() != 1 || variant.len() != 1 => {
                    Some("point variants need exactly one reference and one variant base".into())
                }
                VariantKind::Insertion if !reference.is_empty() || variant.is_empty() => {
                    Some("insertions need empty reference bases and non-empty variant bases".into())
                }
                VariantKind::Deletion if reference.is_empty() || !variant.is_empty() => {
                    Some("deletions need non-empty reference bases and empty variant bases".into())
                }
                _ => None,
            }
        };
        if let Some(problem) = problem {
            out.push(
                ValidationError::new(
                    RuleId::BaseShapeMismatch,
                    &[REFERENCE_BASES, VARIANT_BASES],
                    format!("{kind} variant: {problem}"),
                )
                .observe(record, &[REFERENCE_BASES, VARIANT_BASES, VARIANT_KIND]),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Logical consistency
// ---------------------------------------------------------------------------

fn check_logical(record: &EvidenceRecord, out: &mut Vec<ValidationError>) {
    let evidence_type = record.evidence_type();
    let origin = record
        .str_value(VARIANT_ORIGIN)
        .and_then(VariantOrigin::parse_loose);

    if origin == Some(VariantOrigin::Somatic) && evidence_type == Some(EvidenceType::Predisposing) {
        out.push(
            ValidationError::new(
                RuleId::SomaticPredisposing,
                &[VARIANT_ORIGIN, EVIDENCE_TYPE],
                "somatic origin with predisposing evidence is unusual; verify origin",
            )
            .observe(record, &[VARIANT_ORIGIN, EVIDENCE_TYPE]),
        );
    }

    let level = record
        .str_value(EVIDENCE_LEVEL)
        .and_then(EvidenceLevel::parse_loose);
    let design = record
        .str_value(STUDY_DESIGN)
        .and_then(StudyDesign::parse_loose);
    if level == Some(EvidenceLevel::A) && design.is_some_and(|d| !d.is_clinical()) {
        out.push(
            ValidationError::new(
                RuleId::LevelARequiresClinical,
                &[EVIDENCE_LEVEL, STUDY_DESIGN],
                "level A requires clinical validation but the study design is non-clinical",
            )
            .observe(record, &[EVIDENCE_LEVEL, STUDY_DESIGN]),
        );
    }

    if origin.is_some_and(|o| o.is_germline()) && evidence_type == Some(EvidenceType::Oncogenic) {
        out.push(
            ValidationError::new(
                RuleId::GermlineOncogenic,
                &[VARIANT_ORIGIN, EVIDENCE_TYPE],
                "germline origin with oncogenic evidence is unusual; verify origin",
            )
            .observe(record, &[VARIANT_ORIGIN, EVIDENCE_TYPE]),
        );
    }

    if let Some(t) = evidence_type.filter(|t| *t != EvidenceType::Predictive) {
        let present: Vec<&str> = THERAPY_FIELDS
            .iter()
            .copied()
            .filter(|f| record.is_committed(f))
            .collect();
        if !present.is_empty() {
            out.push(
                ValidationError::new(
                    RuleId::TherapyOnNonPredictive,
                    &present,
                    format!("therapy fields are set on {t} evidence"),
                )
                .observe(record, &present),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Structural
// ---------------------------------------------------------------------------

fn check_structural(record: &EvidenceRecord, out: &mut Vec<ValidationError>) {
    if record.bool_value(MOLECULAR_PROFILE_IS_COMPLEX) == Some(true)
        && record.list_len(VARIANT_NAMES) < 2
    {
        out.push(
            ValidationError::new(
                RuleId::ComplexProfileComponents,
                &[VARIANT_NAMES, MOLECULAR_PROFILE_IS_COMPLEX],
                format!(
                    "complex molecular profile needs at least two variants, found {}",
                    record.list_len(VARIANT_NAMES)
                ),
            )
            .observe(record, &[VARIANT_NAMES, MOLECULAR_PROFILE_IS_COMPLEX]),
        );
    }

    let therapies = record.list_len(THERAPY_NAMES);
    let has_interaction = record.is_committed(THERAPY_INTERACTION_TYPE);
    if has_interaction && therapies < 2 {
        out.push(
            ValidationError::new(
                RuleId::InteractionTypeRequiresTherapies,
                &[THERAPY_INTERACTION_TYPE, THERAPY_NAMES],
                format!("therapy interaction type needs at least two therapies, found {therapies}"),
            )
            .observe(record, &[THERAPY_INTERACTION_TYPE, THERAPY_NAMES]),
        );
    }
    if therapies >= 2 && !has_interaction {
        out.push(
            ValidationError::new(
                RuleId::MultipleTherapiesRequireInteraction,
                &[THERAPY_INTERACTION_TYPE, THERAPY_NAMES],
                format!("{therapies} therapies require a therapy interaction type"),
            )
            .observe(record, &[THERAPY_NAMES]),
        );
    }

    if record.is_committed(THERAPY_NAMES) && record.is_committed(THERAPY_NCIT_IDS) {
        let ids = record.list_len(THERAPY_NCIT_IDS);
        if ids != therapies {
            out.push(
                ValidationError::new(
                    RuleId::TherapyIdCountMismatch,
                    &[THERAPY_NCIT_IDS, THERAPY_NAMES],
                    format!("{ids} NCIt ids for {therapies} therapies"),
                )
                .observe(record, &[THERAPY_NCIT_IDS, THERAPY_NAMES]),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Identifier formats
// ---------------------------------------------------------------------------

fn identifier_patterns() -> &'static [(&'static str, &'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, &'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (DISEASE_DOID, "DOID:<digits>", r"^DOID:\d+$"),
            (THERAPY_NCIT_IDS, "C<digits>", r"^C\d+$"),
            (PHENOTYPE_HPO_IDS, "HP:<7 digits>", r"^HP:\d{7}$"),
            (
                VARIANT_HGVS_DESCRIPTIONS,
                "<accession>:<c|g|p|n|r|m>.<change>",
                r"^[A-Z]{2,4}_?\d+(\.\d+)?:[cgpnrm]\.\S+$",
            ),
        ]
        .into_iter()
        .filter_map(|(field, shape, pattern)| {
            Regex::new(pattern).ok().map(|re| (field, shape, re))
        })
        .collect()
    })
}

fn check_identifiers(record: &EvidenceRecord, out: &mut Vec<ValidationError>) {
    for (field, shape, pattern) in identifier_patterns() {
        if !record.is_committed(field) {
            continue;
        }
        let malformed: Vec<String> = record
            .string_list(field)
            .into_iter()
            .filter(|id| !pattern.is_match(id.trim()))
            .collect();
        let non_text = matches!(record.value(field), Some(Value::Array(items)) if items.iter().any(|v| !v.is_string()));
        if !malformed.is_empty() || non_text {
            out.push(
                ValidationError::new(
                    RuleId::MalformedIdentifier,
                    &[field],
                    format!("{field} has identifiers not matching {shape}: {}", malformed.join(", ")),
                )
                .observe(record, &[field]),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::Provenance;
    use serde_json::json;

    fn record(entries: &[(&str, Value)]) -> EvidenceRecord {
        let mut r = EvidenceRecord::new();
        for (field, value) in entries {
            r.commit(*field, value.clone(), 0.9, Provenance::stage("test"), "")
                .unwrap();
        }
        r
    }

    fn run(rule: ValidationRule, r: &EvidenceRecord) -> Vec<ValidationError> {
        let mut out = Vec::new();
        check_rule(rule, r, &mut out);
        out
    }

    #[test]
    fn test_severity_table() {
        assert_eq!(RuleId::MissingRequiredField.severity(), Severity::Critical);
        assert_eq!(RuleId::CoordinateOrder.severity(), Severity::Major);
        assert_eq!(RuleId::GermlineOncogenic.severity(), Severity::Minor);
        assert_eq!(RuleId::TherapyIdCountMismatch.rule(), ValidationRule::Structural);
        assert!(Severity::Critical > Severity::Major);
    }

    #[test]
    fn test_missing_fields_reported_per_field() {
        let r = record(&[("evidence_type", json!("Prognostic"))]);
        let errors = run(ValidationRule::RequiredFields, &r);
        let missing: Vec<_> = errors.iter().map(|e| e.fields[0].as_str()).collect();
        assert!(missing.contains(&"disease_name"));
        assert!(!missing.contains(&"therapy_names"));
        assert!(errors.iter().all(|e| e.severity == Severity::Critical));
    }

    #[test]
    fn test_non_canonical_enum_spelling_flagged() {
        let r = record(&[("evidence_type", json!("PREDICTIVE"))]);
        let errors = run(ValidationRule::AllowedValues, &r);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule_id, RuleId::UnrecognizedValue);
        assert!(errors[0].message.contains("canonical"));
        assert_eq!(errors[0].observed["evidence_type"], json!("PREDICTIVE"));
    }

    #[test]
    fn test_significance_must_match_type() {
        let r = record(&[
            ("evidence_type", json!("Prognostic")),
            ("evidence_significance", json!("Resistance")),
        ]);
        let errors = run(ValidationRule::AllowedValues, &r);
        assert_eq!(errors[0].rule_id, RuleId::SignificanceNotAllowed);
        assert!(errors[0].message.contains("Better Outcome"));
    }

    #[test]
    fn test_rating_range() {
        let ok = record(&[("evidence_rating", json!(4))]);
        assert!(run(ValidationRule::AllowedValues, &ok).is_empty());
        let bad = record(&[("evidence_rating", json!(7))]);
        assert_eq!(
            run(ValidationRule::AllowedValues, &bad)[0].rule_id,
            RuleId::RatingOutOfRange
        );
    }

    #[test]
    fn test_reversed_coordinates_observed() {
        let r = record(&[
            ("chromosome", json!("7")),
            ("start_position", json!(200)),
            ("stop_position", json!(100)),
        ]);
        let errors = run(ValidationRule::Coordinates, &r);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule_id, RuleId::CoordinateOrder);
        assert_eq!(errors[0].observed["start_position"], json!(200));
        assert_eq!(errors[0].observed["stop_position"], json!(100));
    }

    #[test]
    fn test_coordinate_rule_skipped_without_coordinates() {
        let r = record(&[("evidence_type", json!("Predictive"))]);
        assert!(run(ValidationRule::Coordinates, &r).is_empty());
    }

    #[test]
    fn test_chromosome_prefix_rejected() {
        let r = record(&[
            ("chromosome", json!("chr7")),
            ("start_position", json!(1)),
            ("stop_position", json!(1)),
        ]);
        let errors = run(ValidationRule::Coordinates, &r);
        assert_eq!(errors[0].rule_id, RuleId::InvalidChromosome);
    }

    #[test]
    fn test_base_shapes_by_variant_kind() {
        let point = record(&[
            ("variant_kind", json!("Point")),
            ("reference_bases", json!("T")),
            ("variant_bases", json!("A")),
        ]);
        assert!(run(ValidationRule::Coordinates, &point)
            .iter()
            .all(|e| e.rule_id != RuleId::BaseShapeMismatch));

        let insertion = record(&[
            ("variant_kind", json!("Insertion")),
            ("reference_bases", json!("-")),
            ("variant_bases", json!("")),
        ]);
        assert!(run(ValidationRule::Coordinates, &insertion)
            .iter()
            .any(|e| e.rule_id == RuleId::BaseShapeMismatch));
    }

    #[test]
    fn test_logical_rules_are_minor_or_major() {
        let r = record(&[
            ("evidence_type", json!("Predisposing")),
            ("variant_origin", json!("Somatic")),
        ]);
        let errors = run(ValidationRule::LogicalConsistency, &r);
        assert_eq!(errors[0].rule_id, RuleId::SomaticPredisposing);
        assert_eq!(errors[0].severity, Severity::Minor);

        let r = record(&[
            ("evidence_level", json!("A")),
            ("study_design", json!("Preclinical")),
        ]);
        let errors = run(ValidationRule::LogicalConsistency, &r);
        assert_eq!(errors[0].rule_id, RuleId::LevelARequiresClinical);
        assert_eq!(errors[0].severity, Severity::Major);
    }

    #[test]
    fn test_two_therapies_without_interaction_is_critical() {
        let r = record(&[("therapy_names", json!(["Dabrafenib", "Trametinib"]))]);
        let errors = run(ValidationRule::Structural, &r);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule_id, RuleId::MultipleTherapiesRequireInteraction);
        assert_eq!(errors[0].primary_field(), Some("therapy_interaction_type"));
        assert_eq!(errors[0].severity, Severity::Critical);
    }

    #[test]
    fn test_interaction_with_single_therapy_is_critical() {
        let r = record(&[
            ("therapy_names", json!(["Vemurafenib"])),
            ("therapy_interaction_type", json!("Combination")),
        ]);
        let errors = run(ValidationRule::Structural, &r);
        assert_eq!(errors[0].rule_id, RuleId::InteractionTypeRequiresTherapies);
    }

    #[test]
    fn test_complex_profile_needs_two_variants() {
        let r = record(&[
            ("molecular_profile_is_complex", json!(true)),
            ("variant_names", json!(["V600E"])),
        ]);
        let errors = run(ValidationRule::Structural, &r);
        assert_eq!(errors[0].rule_id, RuleId::ComplexProfileComponents);
    }

    #[test]
    fn test_identifier_formats() {
        let good = record(&[
            ("disease_doid", json!("DOID:1909")),
            ("therapy_ncit_ids", json!(["C64768", "C77908"])),
            ("phenotype_hpo_ids", json!(["HP:0002861"])),
            ("variant_hgvs_descriptions", json!(["NM_004333.4:c.1799T>A"])),
        ]);
        assert!(run(ValidationRule::IdentifierFormat, &good).is_empty());

        let bad = record(&[
            ("disease_doid", json!("1909")),
            ("phenotype_hpo_ids", json!(["HP:123"])),
        ]);
        let errors = run(ValidationRule::IdentifierFormat, &bad);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.rule_id == RuleId::MalformedIdentifier));
    }
}
