//! Stage contract and registry.
//!
//! A stage reads the source document plus the committed fields it was given
//! and returns values for its declared output fields. Stages never touch the
//! shared record; the orchestrator merges their outputs after the phase.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::connector::ConnectorError;
use crate::domain::document::Document;
use crate::domain::record::CommittedFields;

/// Values and confidences produced by one stage invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageOutput {
    pub fields: BTreeMap<String, Value>,
    /// Per-field confidence; a field without an entry is committed at `0.0`.
    #[serde(default)]
    pub confidence: BTreeMap<String, f64>,
    #[serde(default)]
    pub rationale: String,
}

impl StageOutput {
    pub fn new(rationale: impl Into<String>) -> Self {
        Self {
            rationale: rationale.into(),
            ..Self::default()
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: Value, confidence: f64) -> Self {
        let name = name.into();
        self.confidence.insert(name.clone(), confidence);
        self.fields.insert(name, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StageError {
    /// The stage could not extract its fields from the document.
    #[error("extraction failure: {0}")]
    Extraction(String),

    /// An external lookup failed.
    #[error("connector error: {0}")]
    Connector(#[from] ConnectorError),

    /// The stage received inputs it cannot work with.
    #[error("invalid stage input: {0}")]
    InvalidInput(String),
}

impl StageError {
    /// Only transient connector failures are retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, StageError::Connector(e) if e.is_transient())
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    async fn execute(
        &self,
        document: &Document,
        committed: &CommittedFields,
    ) -> Result<StageOutput, StageError>;
}

/// Stage implementations keyed by task id.
#[derive(Clone, Default)]
pub struct StageRegistry {
    stages: HashMap<String, Arc<dyn Stage>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stage, replacing any previous registration for `task_id`.
    pub fn register(&mut self, task_id: impl Into<String>, stage: Arc<dyn Stage>) {
        self.stages.insert(task_id.into(), stage);
    }

    pub fn get(&self, task_id: &str) -> Option<Arc<dyn Stage>> {
        self.stages.get(task_id).cloned()
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.stages.contains_key(task_id)
    }

    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.stages.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.stages.keys().collect();
        ids.sort();
        f.debug_struct("StageRegistry").field("stages", &ids).finish()
    }
}
