//! Dependency graph checks and generation ordering.
//!
//! `depends_on` edges are validated (unique ids, no self edges, known
//! targets, acyclic) and turned into a topological order using Kahn's
//! algorithm over an id -> index table. Among tasks that are ready at the
//! same time, the one earliest in plan order goes first, so a plan whose
//! dependencies already point backwards is generated in plan order.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use super::model::{Plan, Task};
use super::parser::MalformedPlanError;

/// Check the plan's task graph. Does not compute an order for the caller.
pub fn validate_plan(plan: &Plan) -> Result<(), MalformedPlanError> {
    topological_order(&plan.tasks).map(|_| ())
}

/// Tasks in the order their files should be generated.
pub fn generation_order(plan: &Plan) -> Result<Vec<&Task>, MalformedPlanError> {
    let order = topological_order(&plan.tasks)?;
    Ok(order.into_iter().map(|i| &plan.tasks[i]).collect())
}

/// Stable topological sort of `tasks`, returning indices into the slice.
fn topological_order(tasks: &[Task]) -> Result<Vec<usize>, MalformedPlanError> {
    if tasks.is_empty() {
        return Err(MalformedPlanError::NoTasks);
    }

    let mut id_to_idx: HashMap<i64, usize> = HashMap::with_capacity(tasks.len());
    for (i, task) in tasks.iter().enumerate() {
        if id_to_idx.insert(task.id, i).is_some() {
            return Err(MalformedPlanError::DuplicateTaskId(task.id));
        }
    }

    let n = tasks.len();
    let mut in_degree = vec![0usize; n];
    let mut adj: Vec<Vec<usize>> = vec![vec![]; n];

    for (task_idx, task) in tasks.iter().enumerate() {
        for &dep in &task.depends_on {
            if dep == task.id {
                return Err(MalformedPlanError::SelfDependency(task.id));
            }
            let dep_idx = *id_to_idx
                .get(&dep)
                .ok_or(MalformedPlanError::UnknownDependency {
                    task: task.id,
                    dependency: dep,
                })?;
            // Edge: dep -> task (dep must be generated first).
            adj[dep_idx].push(task_idx);
            in_degree[task_idx] += 1;
        }
    }

    // Kahn's algorithm with a min-heap on plan position.
    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, deg)| **deg == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for &next in &adj[node] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    if order.len() != n {
        let sorted: HashSet<usize> = order.iter().copied().collect();
        let cycle_tasks: Vec<String> = (0..n)
            .filter(|i| !sorted.contains(i))
            .map(|i| tasks[i].id.to_string())
            .collect();
        return Err(MalformedPlanError::CycleDetected(cycle_tasks.join(", ")));
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::plan::model::{Architecture, DEFAULT_FRAMEWORK, DEFAULT_LANGUAGE};

    fn task(id: i64, deps: &[i64]) -> Task {
        Task {
            id,
            name: format!("t{id}"),
            description: String::new(),
            files: vec![format!("f{id}.py")],
            depends_on: deps.iter().copied().collect::<BTreeSet<_>>(),
        }
    }

    fn plan(tasks: Vec<Task>) -> Plan {
        Plan {
            architecture: Architecture {
                language: DEFAULT_LANGUAGE.to_owned(),
                framework: DEFAULT_FRAMEWORK.to_owned(),
                project_root: "p".to_owned(),
                modules: vec![],
                extra: serde_json::Map::new(),
            },
            tasks,
        }
    }

    fn ids(order: &[&Task]) -> Vec<i64> {
        order.iter().map(|t| t.id).collect()
    }

    #[test]
    fn backward_edges_keep_plan_order() {
        let p = plan(vec![task(1, &[]), task(2, &[1]), task(3, &[1]), task(4, &[1, 2, 3])]);
        assert_eq!(ids(&generation_order(&p).unwrap()), vec![1, 2, 3, 4]);
    }

    #[test]
    fn forward_edges_are_reordered() {
        let p = plan(vec![task(1, &[3]), task(2, &[]), task(3, &[])]);
        assert_eq!(ids(&generation_order(&p).unwrap()), vec![2, 3, 1]);
    }

    #[test]
    fn independent_tasks_stay_in_plan_order() {
        let p = plan(vec![task(9, &[]), task(4, &[]), task(7, &[])]);
        assert_eq!(ids(&generation_order(&p).unwrap()), vec![9, 4, 7]);
    }

    #[test]
    fn diamond_is_valid() {
        let p = plan(vec![task(1, &[]), task(2, &[1]), task(3, &[1]), task(4, &[2, 3])]);
        assert!(validate_plan(&p).is_ok());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let p = plan(vec![task(1, &[]), task(1, &[])]);
        assert!(matches!(validate_plan(&p), Err(MalformedPlanError::DuplicateTaskId(1))));
    }

    #[test]
    fn rejects_self_dependency() {
        let p = plan(vec![task(1, &[1])]);
        assert!(matches!(validate_plan(&p), Err(MalformedPlanError::SelfDependency(1))));
    }

    #[test]
    fn rejects_unknown_dependency() {
        let p = plan(vec![task(1, &[]), task(2, &[5])]);
        assert!(matches!(
            validate_plan(&p),
            Err(MalformedPlanError::UnknownDependency { task: 2, dependency: 5 })
        ));
    }

    #[test]
    fn reports_every_task_on_a_cycle() {
        let p = plan(vec![task(1, &[]), task(2, &[3]), task(3, &[4]), task(4, &[2])]);
        match validate_plan(&p) {
            Err(MalformedPlanError::CycleDetected(msg)) => {
                assert_eq!(msg, "2, 3, 4");
            }
            other => panic!("expected CycleDetected, got: {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_plan() {
        let p = plan(vec![]);
        assert!(matches!(validate_plan(&p), Err(MalformedPlanError::NoTasks)));
    }
}
