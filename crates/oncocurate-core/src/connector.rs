//! External lookup boundary (ontologies, variant databases, registries).
//!
//! Stages that need ontology normalization depend on [`Connector`] rather
//! than a concrete client, so tests can inject fakes and production can wire
//! an HTTP implementation.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Ontology or database a lookup targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OntologyNamespace {
    /// Disease Ontology.
    Doid,
    /// NCI Thesaurus (therapies).
    Ncit,
    /// Human Phenotype Ontology.
    Hpo,
    /// Sequence Ontology (variant types).
    So,
    /// Variant coordinate databases.
    Variant,
    /// Clinical trial registries.
    ClinicalTrials,
}

impl OntologyNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            OntologyNamespace::Doid => "doid",
            OntologyNamespace::Ncit => "ncit",
            OntologyNamespace::Hpo => "hpo",
            OntologyNamespace::So => "so",
            OntologyNamespace::Variant => "variant",
            OntologyNamespace::ClinicalTrials => "clinical_trials",
        }
    }
}

impl fmt::Display for OntologyNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LookupQuery {
    pub namespace: OntologyNamespace,
    pub term: String,
}

impl LookupQuery {
    pub fn new(namespace: OntologyNamespace, term: impl Into<String>) -> Self {
        Self {
            namespace,
            term: term.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupHit {
    pub id: String,
    pub canonical_name: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LookupOutcome {
    Found(LookupHit),
    NotFound,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectorError {
    #[error("connector unavailable: {0}")]
    Unavailable(String),

    #[error("connector timed out after {0:?}")]
    Timeout(Duration),

    #[error("connector rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("malformed connector response: {0}")]
    Malformed(String),

    #[error("connector rejected query: {0}")]
    Rejected(String),
}

impl ConnectorError {
    /// Failures worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectorError::Unavailable(_)
                | ConnectorError::Timeout(_)
                | ConnectorError::RateLimited { .. }
        )
    }
}

#[async_trait]
pub trait Connector: Send + Sync {
    fn name(&self) -> &str;

    async fn lookup(&self, query: &LookupQuery) -> Result<LookupOutcome, ConnectorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ConnectorError::Unavailable("503".into()).is_transient());
        assert!(ConnectorError::RateLimited { retry_after: None }.is_transient());
        assert!(ConnectorError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!ConnectorError::Malformed("bad json".into()).is_transient());
        assert!(!ConnectorError::Rejected("empty term".into()).is_transient());
    }

    #[test]
    fn test_outcome_serde_tagging() {
        let found = LookupOutcome::Found(LookupHit {
            id: "DOID:1909".to_string(),
            canonical_name: "melanoma".to_string(),
            confidence: 0.97,
        });
        let json = serde_json::to_value(&found).unwrap();
        assert_eq!(json["outcome"], "found");
        assert_eq!(json["id"], "DOID:1909");
    }
}
