// src/dag/graph.rs

use std::collections::HashMap;

use crate::store::JobRecord;
use crate::types::JobId;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Position of the record in file order.
    index: usize,
    /// Direct dependencies: jobs that must be DONE before this one can run.
    deps: Vec<JobId>,
    /// Direct dependents: jobs that list this one as a dependency.
    dependents: Vec<JobId>,
}

/// Adjacency view of the dependency lists in a loaded store.
///
/// Built fresh from each load; it holds no job state, only structure.
/// Nothing here checks for cycles: a cycle simply never becomes ready.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: HashMap<JobId, DagNode>,
}

impl DependencyGraph {
    pub fn from_records(records: &[JobRecord]) -> Self {
        let mut nodes: HashMap<JobId, DagNode> = records
            .iter()
            .enumerate()
            .map(|(index, r)| {
                (
                    r.id,
                    DagNode {
                        index,
                        deps: r.dependencies.clone(),
                        dependents: Vec::new(),
                    },
                )
            })
            .collect();

        for record in records {
            for dep in &record.dependencies {
                if let Some(dep_node) = nodes.get_mut(dep) {
                    dep_node.dependents.push(record.id);
                }
            }
        }

        Self { nodes }
    }

    /// File-order position of `id`, if present.
    pub fn index_of(&self, id: JobId) -> Option<usize> {
        self.nodes.get(&id).map(|n| n.index)
    }

    pub fn dependents_of(&self, id: JobId) -> &[JobId] {
        self.nodes
            .get(&id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// `(job, missing dependency)` pairs for references to unknown ids.
    pub fn dangling(&self) -> Vec<(JobId, JobId)> {
        let mut out: Vec<(JobId, JobId)> = self
            .nodes
            .iter()
            .flat_map(|(id, node)| {
                node.deps
                    .iter()
                    .filter(|dep| !self.nodes.contains_key(dep))
                    .map(move |dep| (*id, *dep))
            })
            .collect();
        out.sort_unstable();
        out
    }
}
