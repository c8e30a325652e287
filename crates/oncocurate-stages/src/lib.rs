//! Oncocurate Stages - built-in curation stages and the standard catalogue
//!
//! Provides:
//! - Scripted stages replaying fixture files
//! - Deterministic evidence level and rating stages
//! - Ontology normalization over a [`oncocurate_core::Connector`], with an
//!   HTTP connector implementation
//! - The standard seven-phase curation graph

pub mod catalogue;
pub mod evidence_level;
pub mod http;
pub mod ontology;
pub mod rating;
pub mod scripted;

// Re-export key types
pub use catalogue::{phase_plan, standard_catalogue, standard_graph, CatalogueBuilder, PlannedPhase};
pub use evidence_level::EvidenceLevelStage;
pub use http::HttpOntologyConnector;
pub use ontology::OntologyNormalizationStage;
pub use rating::EvidenceRatingStage;
pub use scripted::{Fixture, FixtureError, FixtureField, FixtureSet, ScriptedStage};
