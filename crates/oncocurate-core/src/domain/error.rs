//! Domain-level error taxonomy for oncocurate.

use crate::config::ConfigError;
use crate::graph::GraphError;

/// Errors raised while mutating an [`EvidenceRecord`](crate::domain::EvidenceRecord).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("field {field} is already committed by {provenance}")]
    AlreadyCommitted { field: String, provenance: String },

    #[error("confidence {value} for field {field} is outside 0.0..=1.0")]
    InvalidConfidence { field: String, value: f64 },

    #[error("field {field} cannot be committed with a null value")]
    NullValue { field: String },

    #[error("field name must not be empty")]
    EmptyFieldName,
}

/// Errors raised while assembling a [`Document`](crate::domain::Document).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("section {section} span {start}..{end} is out of bounds for text of length {len}")]
    SectionOutOfBounds {
        section: String,
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("section {section} span {start}..{end} does not fall on character boundaries")]
    NotCharBoundary {
        section: String,
        start: usize,
        end: usize,
    },
}

/// Top-level errors for pipeline construction and artifact handling.
///
/// A pipeline run itself never returns an error: stage failures, timeouts
/// and cancellation are folded into the returned result.
#[derive(Debug, thiserror::Error)]
pub enum CurationError {
    #[error("invalid task graph: {0}")]
    Graph(#[from] GraphError),

    #[error("record error: {0}")]
    Record(#[from] RecordError),

    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("canonical json error: {0}")]
    Canonical(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for oncocurate domain operations.
pub type Result<T> = std::result::Result<T, CurationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_error_display() {
        let err = RecordError::AlreadyCommitted {
            field: "evidence_type".to_string(),
            provenance: "stage evidence_type".to_string(),
        };
        assert!(err.to_string().contains("already committed"));

        let err = RecordError::InvalidConfidence {
            field: "disease_name".to_string(),
            value: 1.5,
        };
        assert!(err.to_string().contains("1.5"));
    }

    #[test]
    fn test_curation_error_wraps_record_error() {
        let err: CurationError = RecordError::EmptyFieldName.into();
        assert!(matches!(err, CurationError::Record(_)));
        assert!(err.to_string().contains("record error"));
    }

    #[test]
    fn test_digest_mismatch_error() {
        let err = CurationError::DigestMismatch {
            expected: "abc123".to_string(),
            actual: "def456".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc123"));
        assert!(msg.contains("def456"));
    }
}
