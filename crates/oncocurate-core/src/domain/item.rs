//! Nested evidence item produced from a finished record.

use serde::{Deserialize, Serialize};

use crate::domain::fields;
use crate::domain::record::EvidenceRecord;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBlock {
    pub evidence_type: Option<String>,
    pub direction: Option<String>,
    pub significance: Option<String>,
    pub level: Option<String>,
    pub rating: Option<i64>,
    pub description: Option<String>,
    pub variant_origin: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiseaseBlock {
    pub name: Option<String>,
    pub doid: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MolecularProfileBlock {
    pub name: Option<String>,
    pub is_complex: bool,
    pub variants: Vec<String>,
    pub aliases: Vec<String>,
    pub hgvs_descriptions: Vec<String>,
    pub variant_kind: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TherapyBlock {
    pub names: Vec<String>,
    pub ncit_ids: Vec<String>,
    pub interaction_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhenotypeBlock {
    pub names: Vec<String>,
    pub hpo_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceBlock {
    pub id: Option<String>,
    pub source_type: Option<String>,
    pub citation: Option<String>,
    pub publication_year: Option<i64>,
    pub clinical_trial_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinateBlock {
    pub chromosome: Option<String>,
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub reference_bases: Option<String>,
    pub variant_bases: Option<String>,
    pub reference_build: Option<String>,
    pub representative_transcript: Option<String>,
}

/// Structured output shape grouping the flat record fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub evidence: EvidenceBlock,
    pub disease: DiseaseBlock,
    pub molecular_profile: MolecularProfileBlock,
    pub therapies: TherapyBlock,
    pub phenotypes: PhenotypeBlock,
    pub source: SourceBlock,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<CoordinateBlock>,
}

impl EvidenceItem {
    pub fn from_record(record: &EvidenceRecord) -> Self {
        let int = |field: &str| record.value(field).and_then(serde_json::Value::as_i64);

        let has_coordinates = fields::COORDINATE_FIELDS
            .iter()
            .any(|f| record.is_committed(f));

        Self {
            evidence: EvidenceBlock {
                evidence_type: record.text(fields::EVIDENCE_TYPE),
                direction: record.text(fields::EVIDENCE_DIRECTION),
                significance: record.text(fields::EVIDENCE_SIGNIFICANCE),
                level: record.text(fields::EVIDENCE_LEVEL),
                rating: int(fields::EVIDENCE_RATING),
                description: record.text(fields::EVIDENCE_DESCRIPTION),
                variant_origin: record.text(fields::VARIANT_ORIGIN),
            },
            disease: DiseaseBlock {
                name: record.text(fields::DISEASE_NAME),
                doid: record.text(fields::DISEASE_DOID),
                display_name: record.text(fields::DISEASE_DISPLAY_NAME),
            },
            molecular_profile: MolecularProfileBlock {
                name: record.text(fields::MOLECULAR_PROFILE_NAME),
                is_complex: record
                    .bool_value(fields::MOLECULAR_PROFILE_IS_COMPLEX)
                    .unwrap_or(false),
                variants: record.string_list(fields::VARIANT_NAMES),
                aliases: record.string_list(fields::VARIANT_ALIASES),
                hgvs_descriptions: record.string_list(fields::VARIANT_HGVS_DESCRIPTIONS),
                variant_kind: record.text(fields::VARIANT_KIND),
            },
            therapies: TherapyBlock {
                names: record.string_list(fields::THERAPY_NAMES),
                ncit_ids: record.string_list(fields::THERAPY_NCIT_IDS),
                interaction_type: record.text(fields::THERAPY_INTERACTION_TYPE),
            },
            phenotypes: PhenotypeBlock {
                names: record.string_list(fields::PHENOTYPE_NAMES),
                hpo_ids: record.string_list(fields::PHENOTYPE_HPO_IDS),
            },
            source: SourceBlock {
                id: record.text(fields::SOURCE_ID),
                source_type: record.text(fields::SOURCE_TYPE),
                citation: record.text(fields::CITATION),
                publication_year: int(fields::PUBLICATION_YEAR),
                clinical_trial_ids: record.string_list(fields::CLINICAL_TRIAL_IDS),
            },
            coordinates: has_coordinates.then(|| CoordinateBlock {
                chromosome: record.text(fields::CHROMOSOME),
                start: int(fields::START_POSITION),
                stop: int(fields::STOP_POSITION),
                reference_bases: record.text(fields::REFERENCE_BASES),
                variant_bases: record.text(fields::VARIANT_BASES),
                reference_build: record.text(fields::REFERENCE_BUILD),
                representative_transcript: record.text(fields::REPRESENTATIVE_TRANSCRIPT),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_groups_fields() {
        let record = EvidenceRecord::from_seeds([
            ("evidence_type", json!("Predictive")),
            ("disease_name", json!("Melanoma")),
            ("disease_doid", json!("DOID:1909")),
            ("therapy_names", json!(["Dabrafenib", "Trametinib"])),
            ("therapy_interaction_type", json!("Combination")),
            ("source_id", json!(22663011)),
        ])
        .unwrap();

        let item = EvidenceItem::from_record(&record);
        assert_eq!(item.evidence.evidence_type.as_deref(), Some("Predictive"));
        assert_eq!(item.disease.doid.as_deref(), Some("DOID:1909"));
        assert_eq!(item.therapies.names.len(), 2);
        assert_eq!(item.source.id.as_deref(), Some("22663011"));
        assert!(item.coordinates.is_none());
    }

    #[test]
    fn test_coordinates_present_when_any_committed() {
        let record = EvidenceRecord::from_seeds([
            ("chromosome", json!("7")),
            ("start_position", json!(140453136)),
        ])
        .unwrap();
        let coords = EvidenceItem::from_record(&record).coordinates.unwrap();
        assert_eq!(coords.chromosome.as_deref(), Some("7"));
        assert_eq!(coords.start, Some(140453136));
        assert_eq!(coords.stop, None);
    }
}
