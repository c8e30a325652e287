//! In-memory fakes for the stage and connector traits (testing only)
//!
//! Provides canned connectors, fixed-output stages and recording stages that capture
//! how they were invoked, without any network or model dependencies.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::connector::{
    Connector, ConnectorError, LookupHit, LookupOutcome, LookupQuery, OntologyNamespace,
};
use crate::domain::document::Document;
use crate::domain::record::CommittedFields;
use crate::domain::vocab::normalize_label;
use crate::stage::{Stage, StageError, StageOutput};

// ---------------------------------------------------------------------------
// StaticConnector
// ---------------------------------------------------------------------------

/// Connector answering from a fixed table keyed by namespace and
/// normalized term.
#[derive(Debug, Default)]
pub struct StaticConnector {
    entries: HashMap<(OntologyNamespace, String), LookupHit>,
    calls: AtomicUsize,
}

impl StaticConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        namespace: OntologyNamespace,
        term: &str,
        id: &str,
        canonical_name: &str,
        confidence: f64,
    ) -> Self {
        self.entries.insert(
            (namespace, normalize_label(term)),
            LookupHit {
                id: id.to_string(),
                canonical_name: canonical_name.to_string(),
                confidence,
            },
        );
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for StaticConnector {
    fn name(&self) -> &str {
        "static"
    }

    async fn lookup(&self, query: &LookupQuery) -> Result<LookupOutcome, ConnectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if query.term.trim().is_empty() {
            return Err(ConnectorError::Rejected("empty term".into()));
        }
        Ok(self
            .entries
            .get(&(query.namespace, normalize_label(&query.term)))
            .cloned()
            .map_or(LookupOutcome::NotFound, LookupOutcome::Found))
    }
}

// ---------------------------------------------------------------------------
// FlakyConnector
// ---------------------------------------------------------------------------

/// Fails the first `failures` lookups with `error`, then delegates.
pub struct FlakyConnector<C> {
    inner: C,
    failures: usize,
    error: ConnectorError,
    calls: AtomicUsize,
}

impl<C: Connector> FlakyConnector<C> {
    pub fn new(inner: C, failures: usize, error: ConnectorError) -> Self {
        Self {
            inner,
            failures,
            error,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fails with `error`.
    pub fn always(inner: C, error: ConnectorError) -> Self {
        Self::new(inner, usize::MAX, error)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<C: Connector> Connector for FlakyConnector<C> {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn lookup(&self, query: &LookupQuery) -> Result<LookupOutcome, ConnectorError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(self.error.clone());
        }
        self.inner.lookup(query).await
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Returns a fixed output, optionally after a delay.
#[derive(Debug, Clone)]
pub struct StaticStage {
    output: StageOutput,
    delay: Option<Duration>,
}

impl StaticStage {
    pub fn new(output: StageOutput) -> Self {
        Self {
            output,
            delay: None,
        }
    }

    /// Single-field output.
    pub fn field(name: &str, value: serde_json::Value, confidence: f64) -> Self {
        Self::new(StageOutput::new(format!("static {name}")).field(name, value, confidence))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Stage for StaticStage {
    async fn execute(
        &self,
        _document: &Document,
        _committed: &CommittedFields,
    ) -> Result<StageOutput, StageError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.output.clone())
    }
}

/// Always fails with the given error.
#[derive(Debug, Clone)]
pub struct FailingStage {
    error: StageError,
    calls: std::sync::Arc<AtomicUsize>,
}

impl FailingStage {
    pub fn new(error: StageError) -> Self {
        Self {
            error,
            calls: std::sync::Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn extraction(message: &str) -> Self {
        Self::new(StageError::Extraction(message.to_string()))
    }

    /// Shared invocation counter, readable after the stage is moved into a
    /// pipeline.
    pub fn counter(&self) -> std::sync::Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl Stage for FailingStage {
    async fn execute(
        &self,
        _document: &Document,
        _committed: &CommittedFields,
    ) -> Result<StageOutput, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// Panics when executed.
#[derive(Debug, Clone, Default)]
pub struct PanickingStage;

#[async_trait]
impl Stage for PanickingStage {
    async fn execute(
        &self,
        _document: &Document,
        _committed: &CommittedFields,
    ) -> Result<StageOutput, StageError> {
        panic!("stage exploded");
    }
}

/// What a [`RecordingStage`] observed.
#[derive(Debug, Clone, Default)]
pub struct RecordingLog {
    /// Committed field names visible at each invocation.
    pub seen: Vec<BTreeSet<String>>,
    pub invocations: usize,
    pub max_in_flight: usize,
}

/// Records the committed fields it was given and how many recorders were
/// running concurrently, then returns `output` after `delay`.
#[derive(Debug, Clone)]
pub struct RecordingStage {
    output: StageOutput,
    delay: Duration,
    log: std::sync::Arc<Mutex<RecordingLog>>,
    in_flight: std::sync::Arc<AtomicUsize>,
}

impl RecordingStage {
    pub fn new(output: StageOutput, delay: Duration) -> Self {
        Self {
            output,
            delay,
            log: Default::default(),
            in_flight: Default::default(),
        }
    }

    /// A recorder sharing this recorder's log and in-flight counter.
    pub fn sibling(&self, output: StageOutput) -> Self {
        Self {
            output,
            delay: self.delay,
            log: self.log.clone(),
            in_flight: self.in_flight.clone(),
        }
    }

    pub fn log(&self) -> RecordingLog {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Stage for RecordingStage {
    async fn execute(
        &self,
        _document: &Document,
        committed: &CommittedFields,
    ) -> Result<StageOutput, StageError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
            log.invocations += 1;
            log.max_in_flight = log.max_in_flight.max(now);
            log.seen.push(committed.keys().cloned().collect());
        }
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.output.clone())
    }
}
