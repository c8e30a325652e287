//! Task definitions and activation predicates.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::record::EvidenceRecord;
use crate::domain::vocab::{normalize_label, EvidenceType};
use crate::domain::fields;

/// Broad capability class of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Extraction,
    Classification,
    Interpretation,
    Normalization,
    Generation,
    Scoring,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CapabilityKind::Extraction => "extraction",
            CapabilityKind::Classification => "classification",
            CapabilityKind::Interpretation => "interpretation",
            CapabilityKind::Normalization => "normalization",
            CapabilityKind::Generation => "generation",
            CapabilityKind::Scoring => "scoring",
        };
        f.write_str(s)
    }
}

/// Read access to the record restricted to a predicate's declared fields.
///
/// Undeclared fields read as absent, so a predicate cannot depend on state
/// the graph loader did not check.
pub struct FieldView<'a> {
    record: &'a EvidenceRecord,
    visible: &'a BTreeSet<String>,
}

impl<'a> FieldView<'a> {
    pub fn value(&self, field: &str) -> Option<&'a Value> {
        if self.visible.contains(field) {
            self.record.value(field)
        } else {
            None
        }
    }

    pub fn str_value(&self, field: &str) -> Option<&'a str> {
        self.value(field).and_then(Value::as_str)
    }

    pub fn evidence_type(&self) -> Option<EvidenceType> {
        self.str_value(fields::EVIDENCE_TYPE)
            .and_then(EvidenceType::parse_loose)
    }
}

type CheckFn = dyn Fn(&FieldView<'_>) -> bool + Send + Sync;

/// Activation condition for a task, evaluated on the phase-entry snapshot.
///
/// A predicate whose declared fields are not all committed evaluates to
/// `false`.
#[derive(Clone)]
pub struct Predicate {
    description: String,
    reads: BTreeSet<String>,
    check: Arc<CheckFn>,
}

impl Predicate {
    /// A predicate that is always satisfied and reads nothing.
    pub fn always() -> Self {
        Self {
            description: "always".to_string(),
            reads: BTreeSet::new(),
            check: Arc::new(|_: &FieldView<'_>| true),
        }
    }

    pub fn new<I, S, F>(description: impl Into<String>, reads: I, check: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&FieldView<'_>) -> bool + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            reads: reads.into_iter().map(Into::into).collect(),
            check: Arc::new(check),
        }
    }

    /// True when `field` holds a string equal to `expected`, ignoring case
    /// and separators.
    pub fn field_equals(field: impl Into<String>, expected: impl Into<String>) -> Self {
        let field = field.into();
        let expected = expected.into();
        let key = normalize_label(&expected);
        let read = field.clone();
        Self::new(format!("{field} == {expected}"), [field], move |view| {
            view.str_value(&read)
                .is_some_and(|v| normalize_label(v) == key)
        })
    }

    /// True when the committed evidence type matches.
    pub fn evidence_type_is(expected: EvidenceType) -> Self {
        Self::new(
            format!("evidence_type == {expected}"),
            [fields::EVIDENCE_TYPE],
            move |view| view.evidence_type() == Some(expected),
        )
    }

    pub fn reads(&self) -> &BTreeSet<String> {
        &self.reads
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn evaluate(&self, snapshot: &EvidenceRecord) -> bool {
        if self.reads.iter().any(|f| !snapshot.is_committed(f)) {
            return false;
        }
        (self.check)(&FieldView {
            record: snapshot,
            visible: &self.reads,
        })
    }
}

impl Default for Predicate {
    fn default() -> Self {
        Self::always()
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("description", &self.description)
            .field("reads", &self.reads)
            .finish()
    }
}

/// Static description of one pipeline task.
#[derive(Debug, Clone)]
pub struct TaskDefinition {
    pub id: String,
    pub phase: u32,
    pub kind: CapabilityKind,
    pub input_fields: BTreeSet<String>,
    pub output_fields: BTreeSet<String>,
    pub predicate: Predicate,
    /// Safe to re-invoke after a transient connector failure.
    pub idempotent: bool,
}

impl TaskDefinition {
    pub fn new(id: impl Into<String>, phase: u32, kind: CapabilityKind) -> Self {
        Self {
            id: id.into(),
            phase,
            kind,
            input_fields: BTreeSet::new(),
            output_fields: BTreeSet::new(),
            predicate: Predicate::always(),
            idempotent: false,
        }
    }

    pub fn inputs<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn outputs<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn when(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn idempotent(mut self) -> Self {
        self.idempotent = true;
        self
    }

    pub fn produces(&self, field: &str) -> bool {
        self.output_fields.contains(field)
    }
}
