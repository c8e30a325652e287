//! Scripted stages replaying canned outputs from a fixture file.
//!
//! A fixture file is a JSON object keyed by task id:
//!
//! ```json
//! {
//!   "evidence_type": {
//!     "fields": { "evidence_type": { "value": "Predictive", "confidence": 0.95 } },
//!     "rationale": "abstract states response to vemurafenib"
//!   },
//!   "coordinates": { "error": "no genomic coordinates reported" },
//!   "disease_normalization": { "transient_failures": 1, "delay_ms": 50, "fields": {} }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use oncocurate_core::{
    CommittedFields, ConnectorError, Document, Stage, StageError, StageOutput,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("failed to read fixtures {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid fixture json: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One scripted field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureField {
    pub value: Value,
    /// Omitted confidence is reported as missing and committed at 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Scripted behaviour for one task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub fields: BTreeMap<String, FixtureField>,
    pub rationale: String,
    /// Sleep before answering.
    pub delay_ms: u64,
    /// Fail with an extraction error instead of answering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Fail this many calls with a transient connector error first.
    pub transient_failures: u32,
}

impl Fixture {
    pub fn field(mut self, name: impl Into<String>, value: Value, confidence: f64) -> Self {
        self.fields.insert(
            name.into(),
            FixtureField {
                value,
                confidence: Some(confidence),
            },
        );
        self
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    fn output(&self) -> StageOutput {
        let mut output = StageOutput::new(self.rationale.clone());
        for (name, field) in &self.fields {
            output.fields.insert(name.clone(), field.value.clone());
            if let Some(c) = field.confidence {
                output.confidence.insert(name.clone(), c);
            }
        }
        output
    }
}

/// Fixtures for a whole run, keyed by task id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixtureSet {
    tasks: BTreeMap<String, Fixture>,
}

impl FixtureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(raw: &str) -> Result<Self, FixtureError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let raw = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn with(mut self, task_id: impl Into<String>, fixture: Fixture) -> Self {
        self.tasks.insert(task_id.into(), fixture);
        self
    }

    pub fn get(&self, task_id: &str) -> Option<&Fixture> {
        self.tasks.get(task_id)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.tasks.contains_key(task_id)
    }

    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    /// A stage replaying the fixture for `task_id`; tasks without a fixture
    /// fail with an extraction error.
    pub fn stage_for(&self, task_id: &str) -> ScriptedStage {
        match self.tasks.get(task_id) {
            Some(fixture) => ScriptedStage::new(fixture.clone()),
            None => ScriptedStage::new(Fixture::failing(format!("no fixture for task {task_id}"))),
        }
    }
}

/// Replays a [`Fixture`].
#[derive(Debug)]
pub struct ScriptedStage {
    fixture: Fixture,
    calls: AtomicU32,
}

impl ScriptedStage {
    pub fn new(fixture: Fixture) -> Self {
        Self {
            fixture,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for ScriptedStage {
    async fn execute(
        &self,
        _document: &Document,
        _committed: &CommittedFields,
    ) -> Result<StageOutput, StageError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fixture.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.fixture.delay_ms)).await;
        }
        if call < self.fixture.transient_failures {
            return Err(ConnectorError::Unavailable(format!("scripted failure {}", call + 1)).into());
        }
        if let Some(message) = &self.fixture.error {
            return Err(StageError::Extraction(message.clone()));
        }
        Ok(self.fixture.output())
    }
}
