// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Dependency-graph normalization: group expansion and acyclicity.
//!
//! Before a workflow reaches the engine, every dependency endpoint that
//! names a group is rewritten into a pair of barrier hubs
//! (`<group>_input`, `<group>_output`): members gain an edge from the
//! input hub and an edge to the output hub, `X → group` becomes
//! `X → group_input`, and `group → Y` becomes `group_output → Y`.
//! Sub-groups expand recursively; the rewrite is idempotent. A Kahn pass
//! then verifies the expanded graph is a DAG.

use crate::job::JobSpec;
use crate::workflow::{WorkflowElement, WorkflowSpec, WorkflowSpecError};
use std::collections::HashMap;

/// A workflow spec after group expansion: all dependency endpoints are job
/// indices, and barrier hubs are appended to the job list.
#[derive(Debug, Clone)]
pub struct ExpandedWorkflow {
    pub jobs: Vec<JobSpec>,
    /// (predecessor, successor) index pairs into `jobs`
    pub dependencies: Vec<(usize, usize)>,
    /// group index → (input hub, output hub) job indices, for groups that
    /// appeared as dependency endpoints
    pub hubs: HashMap<usize, (usize, usize)>,
}

/// Normalization failures.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("workflow dependency graph has a cycle")]
    Cyclic,

    #[error(transparent)]
    Spec(#[from] WorkflowSpecError),
}

/// Expand group endpoints into barrier hubs and verify acyclicity.
pub fn normalize(spec: &WorkflowSpec) -> Result<ExpandedWorkflow, GraphError> {
    spec.validate_endpoints()?;
    let expanded = expand_groups(spec);
    verify_acyclic(expanded.jobs.len(), &expanded.dependencies)?;
    Ok(expanded)
}

/// Rewrite group dependency endpoints into barrier-hub job pairs.
///
/// Hubs are created lazily, only for groups that appear as dependency
/// endpoints (and, recursively, their sub-groups). Running the expansion on
/// an already-expanded spec changes nothing.
pub fn expand_groups(spec: &WorkflowSpec) -> ExpandedWorkflow {
    let mut jobs = spec.jobs.clone();
    let mut hubs: HashMap<usize, (usize, usize)> = HashMap::new();
    let mut deps: Vec<(usize, usize)> = Vec::new();

    for (from, to) in &spec.dependencies {
        let pred = match *from {
            WorkflowElement::Job(i) => i,
            WorkflowElement::Group(g) => {
                // A predecessor group contributes its output hub.
                ensure_hubs_recursive(spec, g, &mut jobs, &mut hubs).1
            }
        };
        let succ = match *to {
            WorkflowElement::Job(i) => i,
            WorkflowElement::Group(g) => {
                // A successor group contributes its input hub.
                ensure_hubs_recursive(spec, g, &mut jobs, &mut hubs).0
            }
        };
        deps.push((pred, succ));
    }

    // Intra-group links: every member hangs between its group's hubs.
    let group_indices: Vec<usize> = {
        let mut gs: Vec<usize> = hubs.keys().copied().collect();
        gs.sort_unstable();
        gs
    };
    for g in group_indices {
        let (in_hub, out_hub) = hubs[&g];
        for el in &spec.groups[g].elements {
            match *el {
                WorkflowElement::Job(j) => {
                    deps.push((in_hub, j));
                    deps.push((j, out_hub));
                }
                WorkflowElement::Group(sub) => {
                    let (sub_in, sub_out) = hubs[&sub];
                    deps.push((in_hub, sub_in));
                    deps.push((sub_out, out_hub));
                }
            }
        }
    }

    deps.sort_unstable();
    deps.dedup();

    ExpandedWorkflow { jobs, dependencies: deps, hubs }
}

/// Create barrier hubs for `group` and all its sub-groups; returns the
/// hub pair of `group` itself.
fn ensure_hubs_recursive(
    spec: &WorkflowSpec,
    group: usize,
    jobs: &mut Vec<JobSpec>,
    hubs: &mut HashMap<usize, (usize, usize)>,
) -> (usize, usize) {
    let pair = ensure_hubs(spec, group, jobs, hubs);
    let mut pending = vec![group];
    while let Some(g) = pending.pop() {
        for el in &spec.groups[g].elements {
            if let WorkflowElement::Group(sub) = *el {
                if !hubs.contains_key(&sub) {
                    ensure_hubs(spec, sub, jobs, hubs);
                    pending.push(sub);
                }
            }
        }
    }
    pair
}

fn ensure_hubs(
    spec: &WorkflowSpec,
    group: usize,
    jobs: &mut Vec<JobSpec>,
    hubs: &mut HashMap<usize, (usize, usize)>,
) -> (usize, usize) {
    if let Some(pair) = hubs.get(&group) {
        return *pair;
    }
    let name = &spec.groups[group].name;
    let in_hub = jobs.len();
    jobs.push(JobSpec::barrier(format!("{name}_input")));
    let out_hub = jobs.len();
    jobs.push(JobSpec::barrier(format!("{name}_output")));
    hubs.insert(group, (in_hub, out_hub));
    (in_hub, out_hub)
}

/// Kahn-style topological pass over `n` nodes; fails on a cycle.
pub fn verify_acyclic(n: usize, deps: &[(usize, usize)]) -> Result<(), GraphError> {
    let mut indegree = vec![0usize; n];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
    for &(pred, succ) in deps {
        indegree[succ] += 1;
        successors[pred].push(succ);
    }

    let mut queue: Vec<usize> =
        (0..n).filter(|&i| indegree[i] == 0).collect();
    let mut visited = 0usize;
    while let Some(node) = queue.pop() {
        visited += 1;
        for &succ in &successors[node] {
            indegree[succ] -= 1;
            if indegree[succ] == 0 {
                queue.push(succ);
            }
        }
    }

    if visited == n {
        Ok(())
    } else {
        Err(GraphError::Cyclic)
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
