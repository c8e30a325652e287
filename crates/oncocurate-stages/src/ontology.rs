//! Connector-bound normalization of free-text names to ontology ids.

use std::sync::Arc;

use async_trait::async_trait;
use oncocurate_core::domain::record::value_text;
use oncocurate_core::retry::{retry_transient, RetryPolicy};
use oncocurate_core::{
    CommittedFields, Connector, ConnectorError, Document, LookupOutcome, LookupQuery,
    OntologyNamespace, Stage, StageError, StageOutput,
};
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Confidence of a display name kept without an ontology id.
pub const DEGRADED_CONFIDENCE: f64 = 0.3;

/// Looks up the value(s) of `source_field` in one namespace and commits the
/// ontology id(s) to `id_field`, plus the canonical name to `display_field`
/// when one is configured.
///
/// A scalar source yields scalar outputs; a list yields lists in source
/// order. Transient connector errors are retried per term under `retry`.
/// A term that still cannot be resolved degrades: no id is committed for a
/// scalar source, and the display name falls back to the original text at
/// [`DEGRADED_CONFIDENCE`]. For list sources any unresolved term leaves the
/// id list uncommitted so that counts never drift from the names.
pub struct OntologyNormalizationStage {
    connector: Arc<dyn Connector>,
    namespace: OntologyNamespace,
    source_field: String,
    id_field: String,
    display_field: Option<String>,
    retry: RetryPolicy,
}

impl OntologyNormalizationStage {
    pub fn new(
        connector: Arc<dyn Connector>,
        namespace: OntologyNamespace,
        source_field: impl Into<String>,
        id_field: impl Into<String>,
    ) -> Self {
        Self {
            connector,
            namespace,
            source_field: source_field.into(),
            id_field: id_field.into(),
            display_field: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_display_field(mut self, field: impl Into<String>) -> Self {
        self.display_field = Some(field.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn resolve(&self, term: &str) -> Resolved {
        let query = LookupQuery::new(self.namespace, term);
        let operation = format!("{} lookup", self.namespace);
        let (result, attempts) =
            retry_transient(&self.retry, &operation, || self.connector.lookup(&query)).await;
        match result {
            Ok(LookupOutcome::Found(hit)) => {
                debug!(namespace = %self.namespace, term = %term, id = %hit.id, attempts, "term resolved");
                Resolved::Hit {
                    id: hit.id,
                    name: hit.canonical_name,
                    confidence: hit.confidence.clamp(0.0, 1.0),
                }
            }
            Ok(LookupOutcome::NotFound) => Resolved::Miss(format!("{term:?} not found")),
            Err(e) => {
                warn!(
                    connector = %self.connector.name(),
                    namespace = %self.namespace,
                    term = %term,
                    attempts,
                    error = %e,
                    "lookup failed; degrading to display name"
                );
                Resolved::Miss(describe(term, &e))
            }
        }
    }
}

impl std::fmt::Debug for OntologyNormalizationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OntologyNormalizationStage")
            .field("connector", &self.connector.name())
            .field("namespace", &self.namespace)
            .field("source_field", &self.source_field)
            .field("id_field", &self.id_field)
            .field("display_field", &self.display_field)
            .finish()
    }
}

enum Resolved {
    Hit {
        id: String,
        name: String,
        confidence: f64,
    },
    Miss(String),
}

fn describe(term: &str, error: &ConnectorError) -> String {
    format!("{term:?} unresolved: {error}")
}

#[async_trait]
impl Stage for OntologyNormalizationStage {
    async fn execute(
        &self,
        _document: &Document,
        committed: &CommittedFields,
    ) -> Result<StageOutput, StageError> {
        let source = committed.get(&self.source_field).ok_or_else(|| {
            StageError::InvalidInput(format!("{} not committed", self.source_field))
        })?;

        match source {
            Value::Array(items) => {
                let mut terms = Vec::with_capacity(items.len());
                for item in items {
                    let term = value_text(item).ok_or_else(|| {
                        StageError::InvalidInput(format!("{} has a non-text entry", self.source_field))
                    })?;
                    terms.push(term);
                }
                self.normalize_list(&terms).await
            }
            other => {
                let term = value_text(other).ok_or_else(|| {
                    StageError::InvalidInput(format!("{} is not text", self.source_field))
                })?;
                self.normalize_one(&term).await
            }
        }
    }
}

impl OntologyNormalizationStage {
    async fn normalize_one(&self, term: &str) -> Result<StageOutput, StageError> {
        match self.resolve(term).await {
            Resolved::Hit {
                id,
                name,
                confidence,
            } => {
                let mut output = StageOutput::new(format!("{term:?} => {id} ({name})"))
                    .field(self.id_field.clone(), json!(id), confidence);
                if let Some(display) = &self.display_field {
                    output = output.field(display.clone(), json!(name), confidence);
                }
                Ok(output)
            }
            Resolved::Miss(reason) => {
                let mut output = StageOutput::new(format!("{reason}; no {} committed", self.id_field));
                if let Some(display) = &self.display_field {
                    output = output.field(display.clone(), json!(term), DEGRADED_CONFIDENCE);
                }
                Ok(output)
            }
        }
    }

    async fn normalize_list(&self, terms: &[String]) -> Result<StageOutput, StageError> {
        let mut ids = Vec::with_capacity(terms.len());
        let mut names = Vec::with_capacity(terms.len());
        let mut misses = Vec::new();
        let mut confidence = 1.0_f64;

        for term in terms {
            match self.resolve(term).await {
                Resolved::Hit {
                    id,
                    name,
                    confidence: c,
                } => {
                    ids.push(id);
                    names.push(name);
                    confidence = confidence.min(c);
                }
                Resolved::Miss(reason) => {
                    names.push(term.clone());
                    misses.push(reason);
                }
            }
        }

        if misses.is_empty() {
            let mut output = StageOutput::new(format!("resolved {} of {} terms", ids.len(), terms.len()))
                .field(self.id_field.clone(), json!(ids), confidence);
            if let Some(display) = &self.display_field {
                output = output.field(display.clone(), json!(names), confidence);
            }
            return Ok(output);
        }

        let mut output = StageOutput::new(format!(
            "{}; no {} committed",
            misses.join("; "),
            self.id_field
        ));
        if let Some(display) = &self.display_field {
            output = output.field(display.clone(), json!(names), DEGRADED_CONFIDENCE);
        }
        Ok(output)
    }
}
