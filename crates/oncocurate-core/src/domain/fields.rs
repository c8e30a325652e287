//! Canonical evidence field names.

pub const EVIDENCE_TYPE: &str = "evidence_type";
pub const EVIDENCE_LEVEL: &str = "evidence_level";
pub const EVIDENCE_DIRECTION: &str = "evidence_direction";
pub const EVIDENCE_SIGNIFICANCE: &str = "evidence_significance";
pub const EVIDENCE_RATING: &str = "evidence_rating";
pub const EVIDENCE_DESCRIPTION: &str = "evidence_description";
pub const VARIANT_ORIGIN: &str = "variant_origin";

pub const DISEASE_NAME: &str = "disease_name";
pub const DISEASE_DOID: &str = "disease_doid";
pub const DISEASE_DISPLAY_NAME: &str = "disease_display_name";

pub const MOLECULAR_PROFILE_NAME: &str = "molecular_profile_name";
pub const MOLECULAR_PROFILE_IS_COMPLEX: &str = "molecular_profile_is_complex";
pub const VARIANT_NAMES: &str = "variant_names";
pub const VARIANT_ALIASES: &str = "variant_aliases";
pub const VARIANT_HGVS_DESCRIPTIONS: &str = "variant_hgvs_descriptions";
pub const VARIANT_KIND: &str = "variant_kind";
pub const VARIANT_TYPE_NAMES: &str = "variant_type_names";

pub const CHROMOSOME: &str = "chromosome";
pub const START_POSITION: &str = "start_position";
pub const STOP_POSITION: &str = "stop_position";
pub const REFERENCE_BASES: &str = "reference_bases";
pub const VARIANT_BASES: &str = "variant_bases";
pub const REFERENCE_BUILD: &str = "reference_build";
pub const REPRESENTATIVE_TRANSCRIPT: &str = "representative_transcript";

pub const THERAPY_NAMES: &str = "therapy_names";
pub const THERAPY_NCIT_IDS: &str = "therapy_ncit_ids";
pub const THERAPY_INTERACTION_TYPE: &str = "therapy_interaction_type";

pub const PHENOTYPE_NAMES: &str = "phenotype_names";
pub const PHENOTYPE_HPO_IDS: &str = "phenotype_hpo_ids";

pub const SOURCE_ID: &str = "source_id";
pub const SOURCE_TYPE: &str = "source_type";
pub const CITATION: &str = "citation";
pub const CLINICAL_TRIAL_IDS: &str = "clinical_trial_ids";
pub const PUBLICATION_YEAR: &str = "publication_year";

pub const ENTITY_MENTIONS: &str = "entity_mentions";
pub const STUDY_DESIGN: &str = "study_design";
pub const STUDY_QUALITY: &str = "study_quality";

/// Genomic coordinate fields; any one committed triggers the coordinate rule.
pub const COORDINATE_FIELDS: &[&str] = &[
    CHROMOSOME,
    START_POSITION,
    STOP_POSITION,
    REFERENCE_BASES,
    VARIANT_BASES,
    REFERENCE_BUILD,
];

pub const THERAPY_FIELDS: &[&str] = &[THERAPY_NAMES, THERAPY_NCIT_IDS, THERAPY_INTERACTION_TYPE];
