//! Runs of the standard catalogue over scripted fixtures and fake connectors.

use std::sync::Arc;

use oncocurate_core::fakes::{FlakyConnector, StaticConnector};
use oncocurate_core::{
    CommittedFields, ConnectorError, Document, OntologyNamespace, PipelineConfig, PipelineResult,
    RecordState, ReviewKind, RuleId, TaskState,
};
use oncocurate_stages::catalogue::*;
use oncocurate_stages::{CatalogueBuilder, Fixture, FixtureSet};
use serde_json::json;

const ABSTRACT: &str = "In a phase III trial of 675 patients with BRAF V600E metastatic \
    melanoma, vemurafenib improved overall survival (p < 0.0001).";

fn predictive_fixtures() -> FixtureSet {
    FixtureSet::new()
        .with(
            SOURCE_METADATA,
            Fixture::default()
                .field("source_id", json!("PMID:21639808"), 0.99)
                .field("source_type", json!("PubMed"), 0.99)
                .field("publication_year", json!(2011), 0.99),
        )
        .with(
            ENTITY_RECOGNITION,
            Fixture::default().field(
                "entity_mentions",
                json!(["BRAF", "V600E", "vemurafenib", "melanoma"]),
                0.9,
            ),
        )
        .with(
            STUDY_DESIGN_TASK,
            Fixture::default()
                .field("study_design", json!("Phase III Trial"), 0.9)
                .field(
                    "study_quality",
                    json!({
                        "sample_size": 675,
                        "p_value": 0.0001,
                        "confidence_interval_reported": true,
                        "venue_tier": "high",
                        "controlled": true,
                        "blinded": false,
                        "replicated": true,
                        "independently_validated": true,
                        "fda_approved": true
                    }),
                    0.9,
                ),
        )
        .with(
            EVIDENCE_TYPE_TASK,
            Fixture::default().field("evidence_type", json!("Predictive"), 0.95),
        )
        .with(
            DISEASE_MAPPING,
            Fixture::default().field("disease_name", json!("Melanoma"), 0.94),
        )
        .with(
            VARIANT_ORIGIN_TASK,
            Fixture::default().field("variant_origin", json!("Somatic"), 0.95),
        )
        .with(
            SIGNIFICANCE,
            Fixture::default()
                .field("evidence_direction", json!("Supports"), 0.92)
                .field("evidence_significance", json!("Sensitivity/Response"), 0.93),
        )
        .with(
            VARIANT_STANDARDIZATION,
            Fixture::default()
                .field("variant_names", json!(["V600E"]), 0.9)
                .field("variant_hgvs_descriptions", json!(["NM_004333.4:c.1799T>A"]), 0.9),
        )
        .with(
            MOLECULAR_PROFILE,
            Fixture::default()
                .field("molecular_profile_name", json!("BRAF V600E"), 0.95)
                .field("molecular_profile_is_complex", json!(false), 0.95),
        )
        .with(
            VARIANT_TYPE,
            Fixture::default().field("variant_kind", json!("Point"), 0.9),
        )
        .with(
            COORDINATES,
            Fixture::default()
                .field("chromosome", json!("7"), 0.9)
                .field("start_position", json!(140453136), 0.9)
                .field("stop_position", json!(140453136), 0.9)
                .field("reference_bases", json!("A"), 0.9)
                .field("variant_bases", json!("T"), 0.9)
                .field("reference_build", json!("GRCh37"), 0.9),
        )
        .with(
            THERAPY_EXTRACTION,
            Fixture::default().field("therapy_names", json!(["Vemurafenib"]), 0.93),
        )
        .with(
            STATEMENT_GENERATION,
            Fixture::default().field(
                "evidence_description",
                json!("BRAF V600E melanoma is sensitive to vemurafenib."),
                0.88,
            ),
        )
}

fn ontology() -> StaticConnector {
    StaticConnector::new()
        .with(OntologyNamespace::Doid, "Melanoma", "DOID:1909", "melanoma", 0.97)
        .with(OntologyNamespace::Ncit, "Vemurafenib", "C64768", "Vemurafenib", 0.95)
}

async fn run(builder: CatalogueBuilder) -> PipelineResult {
    builder
        .build()
        .unwrap()
        .run(Document::new(ABSTRACT), CommittedFields::new())
        .await
}

#[tokio::test]
async fn test_predictive_item_curated_end_to_end() {
    let result = run(CatalogueBuilder::new()
        .fixtures(predictive_fixtures())
        .connector(Arc::new(ontology())))
    .await;

    assert_eq!(result.state, RecordState::Finalized, "{:#?}", result.review_queue);
    assert!(result.review_queue.is_empty());

    let item = &result.evidence_item;
    assert_eq!(item.evidence.level.as_deref(), Some("A"));
    assert_eq!(item.evidence.rating, Some(5));
    assert_eq!(item.disease.doid.as_deref(), Some("DOID:1909"));
    assert_eq!(item.disease.display_name.as_deref(), Some("melanoma"));
    assert_eq!(item.therapies.ncit_ids, vec!["C64768"]);

    assert_eq!(result.task_state(PHENOTYPE_EXTRACTION), Some(TaskState::Skipped));
    assert_eq!(result.task_state(PHENOTYPE_NORMALIZATION), Some(TaskState::Skipped));
}

#[tokio::test]
async fn test_prognostic_item_skips_therapy_tasks() {
    let fixtures = predictive_fixtures()
        .with(
            EVIDENCE_TYPE_TASK,
            Fixture::default().field("evidence_type", json!("Prognostic"), 0.95),
        )
        .with(
            SIGNIFICANCE,
            Fixture::default()
                .field("evidence_direction", json!("Supports"), 0.92)
                .field("evidence_significance", json!("Poor Outcome"), 0.9),
        );
    let result = run(CatalogueBuilder::new()
        .fixtures(fixtures)
        .connector(Arc::new(ontology())))
    .await;

    assert_eq!(result.task_state(THERAPY_EXTRACTION), Some(TaskState::Skipped));
    assert_eq!(result.task_state(THERAPY_NORMALIZATION), Some(TaskState::Skipped));
    assert!(result
        .review_queue
        .iter()
        .all(|item| !item.field.as_deref().unwrap_or_default().starts_with("therapy")));
    assert_eq!(result.state, RecordState::Finalized);
}

#[tokio::test]
async fn test_missing_classification_cascades_to_review() {
    let fixtures = predictive_fixtures().with(
        EVIDENCE_TYPE_TASK,
        Fixture::failing("classifier returned no label"),
    );
    let result = run(CatalogueBuilder::new()
        .fixtures(fixtures)
        .connector(Arc::new(ontology())))
    .await;

    assert_eq!(result.task_state(EVIDENCE_TYPE_TASK), Some(TaskState::Failed));
    for task in [DISEASE_MAPPING, VARIANT_ORIGIN_TASK, SIGNIFICANCE, THERAPY_EXTRACTION] {
        assert_eq!(result.task_state(task), Some(TaskState::Skipped), "{task}");
    }
    assert_eq!(result.state, RecordState::PendingReview);
    assert!(result
        .review_queue
        .iter()
        .any(|item| item.rule_id == Some(RuleId::MissingRequiredField)
            && item.field.as_deref() == Some("evidence_type")));
}

#[tokio::test(start_paused = true)]
async fn test_ontology_outage_degrades_to_review() {
    let down = FlakyConnector::always(ontology(), ConnectorError::Unavailable("503".into()));
    let mut config = PipelineConfig::default();
    config.orchestrator.retry.max_attempts = 2;
    let result = run(CatalogueBuilder::new()
        .fixtures(predictive_fixtures())
        .connector(Arc::new(down))
        .config(config))
    .await;

    assert_eq!(result.task_state(DISEASE_NORMALIZATION), Some(TaskState::Completed));
    assert!(!result.record.is_committed("disease_doid"));
    assert_eq!(result.record.str_value("disease_display_name"), Some("Melanoma"));
    assert_eq!(result.state, RecordState::PendingReview);

    let doid = result.review_items_for("disease_doid");
    assert_eq!(doid.len(), 1);
    assert!(doid[0].kind.is_blocking());
    let display = result.review_items_for("disease_display_name");
    assert_eq!(display[0].kind, ReviewKind::LowConfidence);
}

#[tokio::test]
async fn test_fixture_file_round_trip_through_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixtures.json");
    std::fs::write(&path, serde_json::to_string_pretty(&predictive_fixtures()).unwrap()).unwrap();

    let fixtures = FixtureSet::load(&path).unwrap();
    let result = run(CatalogueBuilder::new()
        .fixtures(fixtures)
        .connector(Arc::new(ontology())))
    .await;
    assert!(result.is_finalized());
}

#[tokio::test]
async fn test_no_connector_leaves_ids_unresolved() {
    let result = run(CatalogueBuilder::new().fixtures(predictive_fixtures())).await;

    assert_eq!(result.task_state(DISEASE_NORMALIZATION), Some(TaskState::Failed));
    assert_eq!(result.task_state(THERAPY_NORMALIZATION), Some(TaskState::Failed));
    assert_eq!(result.state, RecordState::PendingReview);
    let missing: Vec<_> = result
        .review_queue
        .iter()
        .filter(|i| i.rule_id == Some(RuleId::MissingRequiredField))
        .filter_map(|i| i.field.as_deref())
        .collect();
    assert!(missing.contains(&"disease_doid"));
    assert!(missing.contains(&"therapy_ncit_ids"));
}
