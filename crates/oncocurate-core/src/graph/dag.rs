//! Validated task graph and phase plan.
//!
//! An edge `A → B` means "B reads a field A produces". Loading checks the
//! definitions as a whole and rejects the set before any run starts:
//! duplicate ids or producers, unproducible inputs, inputs produced by a
//! later phase, predicates reading fields not committed by an earlier phase,
//! and dependency cycles. Topological order is computed with Kahn's
//! algorithm using sorted tie-breaking, so the plan is deterministic.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::graph::error::{GraphError, GraphResult};
use crate::graph::task::TaskDefinition;

/// Index of a task inside a [`TaskGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(usize);

impl TaskId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Tasks sharing one phase ordinal, sorted by task id.
#[derive(Debug, Clone)]
pub struct Phase {
    pub ordinal: u32,
    pub tasks: Vec<TaskId>,
}

/// Collects task definitions and external field declarations.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    definitions: Vec<TaskDefinition>,
    external: BTreeSet<String>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(mut self, definition: TaskDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn tasks(mut self, definitions: impl IntoIterator<Item = TaskDefinition>) -> Self {
        self.definitions.extend(definitions);
        self
    }

    /// Fields supplied as seeds rather than produced by a task.
    pub fn external_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.external.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> GraphResult<TaskGraph> {
        TaskGraph::from_parts(self.definitions, self.external)
    }
}

/// Immutable, validated DAG of tasks grouped into phases.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    tasks: Vec<TaskDefinition>,
    index: HashMap<String, TaskId>,
    producers: BTreeMap<String, TaskId>,
    /// `producer → {consumer, ...}`
    downstream: Vec<BTreeSet<TaskId>>,
    /// `consumer → {producer, ...}`
    upstream: Vec<BTreeSet<TaskId>>,
    external: BTreeSet<String>,
    phases: Vec<Phase>,
    topo: Vec<TaskId>,
}

impl TaskGraph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    /// Validate a definition set with no external fields.
    pub fn load(definitions: Vec<TaskDefinition>) -> GraphResult<Self> {
        Self::from_parts(definitions, BTreeSet::new())
    }

    fn from_parts(tasks: Vec<TaskDefinition>, external: BTreeSet<String>) -> GraphResult<Self> {
        let mut index = HashMap::with_capacity(tasks.len());
        for (i, def) in tasks.iter().enumerate() {
            if index.insert(def.id.clone(), TaskId(i)).is_some() {
                return Err(GraphError::DuplicateTask {
                    task: def.id.clone(),
                });
            }
            if def.output_fields.is_empty() {
                return Err(GraphError::EmptyOutputs {
                    task: def.id.clone(),
                });
            }
        }

        let mut producers: BTreeMap<String, TaskId> = BTreeMap::new();
        for (i, def) in tasks.iter().enumerate() {
            for field in &def.output_fields {
                if let Some(first) = producers.insert(field.clone(), TaskId(i)) {
                    return Err(GraphError::DuplicateProducer {
                        field: field.clone(),
                        first: tasks[first.0].id.clone(),
                        second: def.id.clone(),
                    });
                }
            }
        }

        let mut downstream = vec![BTreeSet::new(); tasks.len()];
        let mut upstream = vec![BTreeSet::new(); tasks.len()];
        for (i, def) in tasks.iter().enumerate() {
            for field in &def.input_fields {
                if let Some(&producer) = producers.get(field) {
                    downstream[producer.0].insert(TaskId(i));
                    upstream[i].insert(producer);
                }
            }
        }

        let topo = kahn_order(&tasks, &downstream, &upstream)?;

        for def in &tasks {
            for field in &def.input_fields {
                match producers.get(field) {
                    Some(&producer) => {
                        let producer_def = &tasks[producer.0];
                        if producer_def.phase > def.phase {
                            return Err(GraphError::LateProducer {
                                task: def.id.clone(),
                                phase: def.phase,
                                field: field.clone(),
                                producer: producer_def.id.clone(),
                                producer_phase: producer_def.phase,
                            });
                        }
                        if producer_def.phase == def.phase {
                            // Allowed, but the consumer will always see the field
                            // unset at phase entry and be skipped.
                            tracing::warn!(
                                task = %def.id,
                                field = %field,
                                producer = %producer_def.id,
                                phase = def.phase,
                                "task reads a field produced in its own phase"
                            );
                        }
                    }
                    None if external.contains(field) => {}
                    None => {
                        return Err(GraphError::UnproducibleInput {
                            task: def.id.clone(),
                            field: field.clone(),
                        });
                    }
                }
            }

            for field in def.predicate.reads() {
                let committed_earlier = external.contains(field)
                    || producers
                        .get(field)
                        .is_some_and(|p| tasks[p.0].phase < def.phase);
                if !committed_earlier {
                    return Err(GraphError::PredicateReadsUncommitted {
                        task: def.id.clone(),
                        phase: def.phase,
                        field: field.clone(),
                    });
                }
            }
        }

        let mut by_phase: BTreeMap<u32, Vec<TaskId>> = BTreeMap::new();
        for (i, def) in tasks.iter().enumerate() {
            by_phase.entry(def.phase).or_default().push(TaskId(i));
        }
        let phases = by_phase
            .into_iter()
            .map(|(ordinal, mut ids)| {
                ids.sort_by(|a, b| tasks[a.0].id.cmp(&tasks[b.0].id));
                Phase {
                    ordinal,
                    tasks: ids,
                }
            })
            .collect();

        Ok(Self {
            tasks,
            index,
            producers,
            downstream,
            upstream,
            external,
            phases,
            topo,
        })
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn task(&self, id: TaskId) -> &TaskDefinition {
        &self.tasks[id.0]
    }

    pub fn find(&self, task_id: &str) -> Option<TaskId> {
        self.index.get(task_id).copied()
    }

    pub fn get(&self, task_id: &str) -> Option<&TaskDefinition> {
        self.find(task_id).map(|id| self.task(id))
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskDefinition> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn external_fields(&self) -> &BTreeSet<String> {
        &self.external
    }

    /// Task that declares `field` as an output.
    pub fn producer_of(&self, field: &str) -> Option<&TaskDefinition> {
        self.producers.get(field).map(|id| self.task(*id))
    }

    /// Tasks whose outputs `task_id` reads.
    pub fn dependencies_of(&self, task_id: &str) -> GraphResult<Vec<&TaskDefinition>> {
        let id = self.require(task_id)?;
        Ok(self.upstream[id.0].iter().map(|d| self.task(*d)).collect())
    }

    /// Tasks that read an output of `task_id`.
    pub fn dependents_of(&self, task_id: &str) -> GraphResult<Vec<&TaskDefinition>> {
        let id = self.require(task_id)?;
        Ok(self.downstream[id.0].iter().map(|d| self.task(*d)).collect())
    }

    /// All tasks, dependencies before dependents.
    pub fn topological_order(&self) -> Vec<&TaskDefinition> {
        self.topo.iter().map(|id| self.task(*id)).collect()
    }

    fn require(&self, task_id: &str) -> GraphResult<TaskId> {
        self.find(task_id).ok_or_else(|| GraphError::UnknownTask {
            task: task_id.to_string(),
        })
    }
}

fn kahn_order(
    tasks: &[TaskDefinition],
    downstream: &[BTreeSet<TaskId>],
    upstream: &[BTreeSet<TaskId>],
) -> GraphResult<Vec<TaskId>> {
    let sort_key = |id: &TaskId| (tasks[id.0].phase, tasks[id.0].id.clone());

    let mut in_degree: Vec<usize> = upstream.iter().map(BTreeSet::len).collect();
    let mut initial: Vec<TaskId> = (0..tasks.len())
        .map(TaskId)
        .filter(|id| in_degree[id.0] == 0)
        .collect();
    initial.sort_by_key(sort_key);
    let mut queue: VecDeque<TaskId> = initial.into();

    let mut sorted = Vec::with_capacity(tasks.len());
    while let Some(id) = queue.pop_front() {
        sorted.push(id);
        let mut next = Vec::new();
        for dependent in &downstream[id.0] {
            in_degree[dependent.0] -= 1;
            if in_degree[dependent.0] == 0 {
                next.push(*dependent);
            }
        }
        next.sort_by_key(sort_key);
        queue.extend(next);
    }

    if sorted.len() != tasks.len() {
        let mut remaining: Vec<String> = (0..tasks.len())
            .filter(|i| in_degree[*i] > 0)
            .map(|i| tasks[i].id.clone())
            .collect();
        remaining.sort();
        return Err(GraphError::DependencyCycle { tasks: remaining });
    }
    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vocab::EvidenceType;
    use crate::graph::task::{CapabilityKind, Predicate};

    fn task(id: &str, phase: u32, inputs: &[&str], outputs: &[&str]) -> TaskDefinition {
        TaskDefinition::new(id, phase, CapabilityKind::Extraction)
            .inputs(inputs.iter().copied())
            .outputs(outputs.iter().copied())
    }

    #[test]
    fn test_phases_sorted_by_ordinal_then_id() {
        let graph = TaskGraph::load(vec![
            task("level", 2, &["evidence_type"], &["evidence_level"]),
            task("type", 1, &[], &["evidence_type"]),
            task("design", 1, &[], &["study_design"]),
        ])
        .unwrap();

        let phases = graph.phases();
        assert_eq!(phases.len(), 2);
        let first: Vec<_> = phases[0].tasks.iter().map(|t| graph.task(*t).id.as_str()).collect();
        assert_eq!(first, vec!["design", "type"]);
        assert_eq!(phases[1].ordinal, 2);
    }

    #[test]
    fn test_duplicate_producer_rejected() {
        let err = TaskGraph::load(vec![
            task("a", 1, &[], &["disease_name"]),
            task("b", 1, &[], &["disease_name"]),
        ])
        .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateProducer { .. }));
    }

    #[test]
    fn test_duplicate_task_rejected() {
        let err = TaskGraph::load(vec![task("a", 1, &[], &["x"]), task("a", 2, &[], &["y"])])
            .unwrap_err();
        assert_eq!(err, GraphError::DuplicateTask { task: "a".to_string() });
    }

    #[test]
    fn test_empty_outputs_rejected() {
        let err = TaskGraph::load(vec![task("a", 1, &[], &[])]).unwrap_err();
        assert!(matches!(err, GraphError::EmptyOutputs { .. }));
    }

    #[test]
    fn test_unproducible_input_rejected_unless_external() {
        let defs = vec![task("a", 1, &["source_id"], &["citation"])];
        let err = TaskGraph::load(defs.clone()).unwrap_err();
        assert!(matches!(err, GraphError::UnproducibleInput { .. }));

        let graph = TaskGraph::builder()
            .tasks(defs)
            .external_fields(["source_id"])
            .build()
            .unwrap();
        assert!(graph.external_fields().contains("source_id"));
    }

    #[test]
    fn test_late_producer_rejected() {
        let err = TaskGraph::load(vec![
            task("early", 1, &["evidence_type"], &["evidence_level"]),
            task("late", 2, &[], &["evidence_type"]),
        ])
        .unwrap_err();
        assert!(matches!(err, GraphError::LateProducer { .. }));
    }

    #[test]
    fn test_cycle_rejected() {
        let err = TaskGraph::load(vec![
            task("a", 1, &["y"], &["x"]),
            task("b", 1, &["x"], &["y"]),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            GraphError::DependencyCycle {
                tasks: vec!["a".to_string(), "b".to_string()]
            }
        );
    }

    #[test]
    fn test_predicate_must_read_earlier_phase() {
        let gated = task("therapy", 1, &[], &["therapy_names"])
            .when(Predicate::evidence_type_is(EvidenceType::Predictive));
        let err = TaskGraph::load(vec![task("type", 1, &[], &["evidence_type"]), gated.clone()])
            .unwrap_err();
        assert!(matches!(err, GraphError::PredicateReadsUncommitted { .. }));

        let mut later = gated;
        later.phase = 2;
        assert!(TaskGraph::load(vec![task("type", 1, &[], &["evidence_type"]), later]).is_ok());
    }

    #[test]
    fn test_dependency_queries_and_topo_order() {
        let graph = TaskGraph::load(vec![
            task("mp", 3, &["variant_names"], &["molecular_profile_name"]),
            task("variants", 2, &["entity_mentions"], &["variant_names"]),
            task("ner", 1, &[], &["entity_mentions"]),
        ])
        .unwrap();

        let deps = graph.dependencies_of("mp").unwrap();
        assert_eq!(deps[0].id, "variants");
        let dependents = graph.dependents_of("ner").unwrap();
        assert_eq!(dependents[0].id, "variants");
        assert!(graph.dependents_of("nope").is_err());

        let order: Vec<_> = graph.topological_order().iter().map(|t| t.id.clone()).collect();
        assert_eq!(order, vec!["ner", "variants", "mp"]);
        assert_eq!(graph.producer_of("variant_names").unwrap().id, "variants");
    }
}
