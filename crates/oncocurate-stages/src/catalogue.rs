//! The standard seven-phase curation graph and a builder wiring stages to it.

use std::sync::Arc;

use oncocurate_core::domain::fields::*;
use oncocurate_core::{
    CapabilityKind, Connector, EvidenceType, OntologyNamespace, Pipeline, PipelineConfig,
    Predicate, RatingScorer, Result, Stage, TaskDefinition, TaskGraph, WeightedRubric,
};
use serde::Serialize;

use crate::evidence_level::EvidenceLevelStage;
use crate::ontology::OntologyNormalizationStage;
use crate::rating::EvidenceRatingStage;
use crate::scripted::FixtureSet;

pub const SOURCE_METADATA: &str = "source_metadata";
pub const ENTITY_RECOGNITION: &str = "entity_recognition";
pub const STUDY_DESIGN_TASK: &str = "study_design";
pub const EVIDENCE_TYPE_TASK: &str = "evidence_type";
pub const EVIDENCE_LEVEL_TASK: &str = "evidence_level";
pub const DISEASE_MAPPING: &str = "disease_mapping";
pub const VARIANT_ORIGIN_TASK: &str = "variant_origin";
pub const SIGNIFICANCE: &str = "significance";
pub const VARIANT_STANDARDIZATION: &str = "variant_standardization";
pub const DISEASE_NORMALIZATION: &str = "disease_normalization";
pub const MOLECULAR_PROFILE: &str = "molecular_profile";
pub const VARIANT_TYPE: &str = "variant_type";
pub const COORDINATES: &str = "coordinates";
pub const THERAPY_EXTRACTION: &str = "therapy_extraction";
pub const PHENOTYPE_EXTRACTION: &str = "phenotype_extraction";
pub const THERAPY_NORMALIZATION: &str = "therapy_normalization";
pub const PHENOTYPE_NORMALIZATION: &str = "phenotype_normalization";
pub const EVIDENCE_RATING_TASK: &str = "evidence_rating";
pub const STATEMENT_GENERATION: &str = "statement_generation";

/// Display names of the standard phases, by ordinal.
pub const PHASE_NAMES: &[(u32, &str)] = &[
    (1, "foundation"),
    (2, "evidence_structure"),
    (3, "clinical_interpretation"),
    (4, "normalization"),
    (5, "molecular_profile"),
    (6, "conditional_normalization"),
    (7, "quality"),
];

pub fn phase_name(ordinal: u32) -> &'static str {
    PHASE_NAMES
        .iter()
        .find(|(n, _)| *n == ordinal)
        .map_or("custom", |(_, name)| name)
}

fn not_functional() -> Predicate {
    Predicate::new("evidence_type != Functional", [EVIDENCE_TYPE], |view| {
        view.evidence_type()
            .is_some_and(|t| t != EvidenceType::Functional)
    })
}

/// Task definitions of the standard curation graph.
pub fn standard_catalogue() -> Vec<TaskDefinition> {
    use CapabilityKind::*;

    vec![
        // Phase 1: foundation
        TaskDefinition::new(SOURCE_METADATA, 1, Extraction).outputs([
            SOURCE_ID,
            SOURCE_TYPE,
            CITATION,
            PUBLICATION_YEAR,
            CLINICAL_TRIAL_IDS,
        ]),
        TaskDefinition::new(ENTITY_RECOGNITION, 1, Extraction).outputs([ENTITY_MENTIONS]),
        TaskDefinition::new(STUDY_DESIGN_TASK, 1, Extraction).outputs([STUDY_DESIGN, STUDY_QUALITY]),
        // Phase 2: evidence structure
        TaskDefinition::new(EVIDENCE_TYPE_TASK, 2, Classification).outputs([EVIDENCE_TYPE]),
        // Phase 3: clinical interpretation
        TaskDefinition::new(EVIDENCE_LEVEL_TASK, 3, Classification)
            .inputs([STUDY_DESIGN])
            .outputs([EVIDENCE_LEVEL]),
        TaskDefinition::new(DISEASE_MAPPING, 3, Interpretation)
            .inputs([EVIDENCE_TYPE])
            .outputs([DISEASE_NAME])
            .when(not_functional()),
        TaskDefinition::new(VARIANT_ORIGIN_TASK, 3, Classification)
            .inputs([EVIDENCE_TYPE])
            .outputs([VARIANT_ORIGIN]),
        TaskDefinition::new(SIGNIFICANCE, 3, Interpretation)
            .inputs([EVIDENCE_TYPE])
            .outputs([EVIDENCE_DIRECTION, EVIDENCE_SIGNIFICANCE]),
        // Phase 4: normalization
        TaskDefinition::new(VARIANT_STANDARDIZATION, 4, Normalization)
            .inputs([ENTITY_MENTIONS])
            .outputs([VARIANT_NAMES, VARIANT_ALIASES, VARIANT_HGVS_DESCRIPTIONS])
            .idempotent(),
        TaskDefinition::new(DISEASE_NORMALIZATION, 4, Normalization)
            .inputs([DISEASE_NAME])
            .outputs([DISEASE_DOID, DISEASE_DISPLAY_NAME])
            .idempotent(),
        // Phase 5: molecular profile and type-specific extraction
        TaskDefinition::new(MOLECULAR_PROFILE, 5, Interpretation)
            .inputs([VARIANT_NAMES])
            .outputs([MOLECULAR_PROFILE_NAME, MOLECULAR_PROFILE_IS_COMPLEX]),
        TaskDefinition::new(VARIANT_TYPE, 5, Classification)
            .inputs([VARIANT_NAMES])
            .outputs([VARIANT_KIND, VARIANT_TYPE_NAMES]),
        TaskDefinition::new(COORDINATES, 5, Extraction)
            .inputs([VARIANT_NAMES])
            .outputs([
                CHROMOSOME,
                START_POSITION,
                STOP_POSITION,
                REFERENCE_BASES,
                VARIANT_BASES,
                REFERENCE_BUILD,
                REPRESENTATIVE_TRANSCRIPT,
            ])
            .idempotent(),
        TaskDefinition::new(THERAPY_EXTRACTION, 5, Extraction)
            .outputs([THERAPY_NAMES, THERAPY_INTERACTION_TYPE])
            .when(Predicate::evidence_type_is(EvidenceType::Predictive)),
        TaskDefinition::new(PHENOTYPE_EXTRACTION, 5, Extraction)
            .outputs([PHENOTYPE_NAMES])
            .when(Predicate::evidence_type_is(EvidenceType::Predisposing)),
        // Phase 6: conditional normalization
        TaskDefinition::new(THERAPY_NORMALIZATION, 6, Normalization)
            .inputs([THERAPY_NAMES])
            .outputs([THERAPY_NCIT_IDS])
            .when(Predicate::evidence_type_is(EvidenceType::Predictive))
            .idempotent(),
        TaskDefinition::new(PHENOTYPE_NORMALIZATION, 6, Normalization)
            .inputs([PHENOTYPE_NAMES])
            .outputs([PHENOTYPE_HPO_IDS])
            .idempotent(),
        // Phase 7: quality
        TaskDefinition::new(EVIDENCE_RATING_TASK, 7, Scoring)
            .inputs([STUDY_QUALITY])
            .outputs([EVIDENCE_RATING]),
        TaskDefinition::new(STATEMENT_GENERATION, 7, Generation)
            .inputs([EVIDENCE_TYPE])
            .outputs([EVIDENCE_DESCRIPTION]),
    ]
}

/// The validated standard graph.
pub fn standard_graph() -> Result<TaskGraph> {
    Ok(TaskGraph::load(standard_catalogue())?)
}

/// One task in a printable phase plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedTask {
    pub id: String,
    pub kind: CapabilityKind,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    pub idempotent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedPhase {
    pub ordinal: u32,
    pub name: &'static str,
    pub tasks: Vec<PlannedTask>,
}

/// Phases and tasks of `graph` in execution order.
pub fn phase_plan(graph: &TaskGraph) -> Vec<PlannedPhase> {
    graph
        .phases()
        .iter()
        .map(|phase| PlannedPhase {
            ordinal: phase.ordinal,
            name: phase_name(phase.ordinal),
            tasks: phase
                .tasks
                .iter()
                .map(|&id| {
                    let def = graph.task(id);
                    PlannedTask {
                        id: def.id.clone(),
                        kind: def.kind,
                        inputs: def.input_fields.iter().cloned().collect(),
                        outputs: def.output_fields.iter().cloned().collect(),
                        condition: (!def.predicate.reads().is_empty())
                            .then(|| def.predicate.description().to_string()),
                        idempotent: def.idempotent,
                    }
                })
                .collect(),
        })
        .collect()
}

/// Connector-backed normalization wiring: task, namespace, source, id and
/// optional display field.
const NORMALIZERS: &[(&str, OntologyNamespace, &str, &str, Option<&str>)] = &[
    (
        DISEASE_NORMALIZATION,
        OntologyNamespace::Doid,
        DISEASE_NAME,
        DISEASE_DOID,
        Some(DISEASE_DISPLAY_NAME),
    ),
    (
        THERAPY_NORMALIZATION,
        OntologyNamespace::Ncit,
        THERAPY_NAMES,
        THERAPY_NCIT_IDS,
        None,
    ),
    (
        PHENOTYPE_NORMALIZATION,
        OntologyNamespace::Hpo,
        PHENOTYPE_NAMES,
        PHENOTYPE_HPO_IDS,
        None,
    ),
];

/// Builds a [`Pipeline`] over the standard catalogue.
///
/// Stage selection per task, first match wins: a fixture for the task id;
/// the built-in deterministic stage (`evidence_level`, `evidence_rating`);
/// an ontology normalization stage when a connector is configured; otherwise
/// a scripted stage that fails with "no fixture for task".
pub struct CatalogueBuilder {
    fixtures: FixtureSet,
    connector: Option<Arc<dyn Connector>>,
    scorer: Arc<dyn RatingScorer>,
    config: PipelineConfig,
}

impl Default for CatalogueBuilder {
    fn default() -> Self {
        Self {
            fixtures: FixtureSet::new(),
            connector: None,
            scorer: Arc::new(WeightedRubric::default()),
            config: PipelineConfig::default(),
        }
    }
}

impl CatalogueBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fixtures(mut self, fixtures: FixtureSet) -> Self {
        self.fixtures = fixtures;
        self
    }

    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn scorer(mut self, scorer: Arc<dyn RatingScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    fn stage_for(&self, task_id: &str) -> Arc<dyn Stage> {
        if self.fixtures.contains(task_id) {
            return Arc::new(self.fixtures.stage_for(task_id));
        }
        match task_id {
            EVIDENCE_LEVEL_TASK => return Arc::new(EvidenceLevelStage),
            EVIDENCE_RATING_TASK => return Arc::new(EvidenceRatingStage::new(self.scorer.clone())),
            _ => {}
        }
        if let Some(connector) = &self.connector {
            let wiring = NORMALIZERS.iter().find(|(task, ..)| *task == task_id);
            if let Some((_, namespace, source, id, display)) = wiring {
                let mut stage =
                    OntologyNormalizationStage::new(connector.clone(), *namespace, *source, *id)
                        .with_retry(self.config.orchestrator.retry.clone());
                if let Some(display) = display {
                    stage = stage.with_display_field(*display);
                }
                return Arc::new(stage);
            }
        }
        Arc::new(self.fixtures.stage_for(task_id))
    }

    pub fn build(self) -> Result<Pipeline> {
        let mut builder = Pipeline::builder().config(self.config.clone());
        for def in standard_catalogue() {
            let stage = self.stage_for(&def.id);
            builder = builder.task_arc(def, stage);
        }
        builder.build()
    }
}

impl std::fmt::Debug for CatalogueBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogueBuilder")
            .field("fixtures", &self.fixtures.task_ids().collect::<Vec<_>>())
            .field("connector", &self.connector.as_ref().map(|c| c.name().to_string()))
            .field("scorer", &self.scorer.name())
            .finish()
    }
}
