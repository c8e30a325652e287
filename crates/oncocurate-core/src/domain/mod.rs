//! Domain models for oncocurate.
//!
//! - `Document`: immutable source text with optional section spans
//! - `EvidenceRecord`: write-once field slots shared by all stages
//! - `EvidenceItem`: nested output shape built from a finished record
//! - Controlled vocabularies for the enumerated evidence fields

pub mod digest;
pub mod document;
pub mod error;
pub mod fields;
pub mod item;
pub mod record;
pub mod vocab;

pub use document::{Document, SectionSpan};
pub use error::{CurationError, DocumentError, RecordError, Result};
pub use item::EvidenceItem;
pub use record::{CommittedFields, EvidenceRecord, FieldSlot, FieldStatus, Provenance};
pub use vocab::{
    EvidenceDirection, EvidenceLevel, EvidenceType, Significance, StudyDesign,
    TherapyInteraction, UnknownTerm, VariantKind, VariantOrigin,
};
