//! DAG Model for workflow orchestration (spec.md §4.8).
//!
//! Nodes are keyed by `step_name`. The graph owns a copy of each step's
//! runtime state so the Executor can mutate node attributes (status,
//! `step_id`, `task_id`) in between store writes without re-reading the
//! document, per spec.md §4.10's "mutate the DAG node attributes... so the
//! same tick's further `ready()` does not re-pick `s`".

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::{debug, instrument};
use wf_core::{Step, StepStatus};

/// DAG-related errors.
#[derive(Debug, Error)]
pub enum DagError {
    #[error("Circular dependency detected: {0}")]
    CycleDetected(String),

    #[error("step '{step}' depends on '{dependency}' which does not exist")]
    MissingDependency { step: String, dependency: String },

    #[error("workflow must contain at least one step")]
    Empty,

    #[error("duplicate step_name '{0}'")]
    DuplicateStepName(String),
}

/// Terminal step statuses (spec.md §4.8): `succeeded`, `failed`, `skipped`,
/// `upstream_failed`.
fn is_terminal(status: StepStatus) -> bool {
    status.is_terminal()
}

/// The workflow dependency graph, keyed by `step_name`.
#[derive(Debug, Clone)]
pub struct Dag {
    nodes: HashMap<String, Step>,
    /// Insertion order, preserved for deterministic iteration (`ready()`
    /// returns steps in the order they were declared when there is a tie).
    order: Vec<String>,
    /// step_name -> names of steps that depend on it.
    children: HashMap<String, Vec<String>>,
    /// step_name -> resolved dependency step_names.
    parents: HashMap<String, Vec<String>>,
}

impl Dag {
    /// Build a DAG from a workflow's steps. `depends_on` entries are
    /// resolved against `step_name` first and `step_id` second (spec.md
    /// §4.8: "tolerate either `step_name` or `step_id` as the value").
    #[instrument(skip(steps))]
    pub fn build(steps: Vec<Step>) -> Result<Self, DagError> {
        if steps.is_empty() {
            return Err(DagError::Empty);
        }

        let mut by_step_id: HashMap<String, String> = HashMap::new();
        let mut order = Vec::with_capacity(steps.len());
        let mut nodes = HashMap::with_capacity(steps.len());

        for step in &steps {
            if nodes.contains_key(&step.step_name) {
                return Err(DagError::DuplicateStepName(step.step_name.clone()));
            }
            if let Some(id) = &step.step_id {
                by_step_id.insert(id.clone(), step.step_name.clone());
            }
            order.push(step.step_name.clone());
        }
        for step in steps {
            nodes.insert(step.step_name.clone(), step);
        }

        let mut children: HashMap<String, Vec<String>> =
            order.iter().map(|n| (n.clone(), Vec::new())).collect();
        let mut parents: HashMap<String, Vec<String>> =
            order.iter().map(|n| (n.clone(), Vec::new())).collect();

        for name in &order {
            let step = &nodes[name];
            for dep in step.depends_on_iter() {
                let resolved = if nodes.contains_key(dep) {
                    dep.clone()
                } else if let Some(by_id) = by_step_id.get(dep) {
                    by_id.clone()
                } else {
                    return Err(DagError::MissingDependency {
                        step: name.clone(),
                        dependency: dep.clone(),
                    });
                };
                parents.get_mut(name).unwrap().push(resolved.clone());
                children.get_mut(&resolved).unwrap().push(name.clone());
            }
        }

        let dag = Self {
            nodes,
            order,
            children,
            parents,
        };
        dag.validate()?;
        debug!(steps = dag.nodes.len(), "built workflow DAG");
        Ok(dag)
    }

    /// Reject on cycle, reporting the cycle as `A -> B -> A` (spec.md §8
    /// scenario 4).
    pub fn validate(&self) -> Result<(), DagError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let mut mark: HashMap<&str, Mark> = self
            .order
            .iter()
            .map(|n| (n.as_str(), Mark::Unvisited))
            .collect();
        let mut path: Vec<&str> = Vec::new();

        fn visit<'a>(
            node: &'a str,
            dag: &'a Dag,
            mark: &mut HashMap<&'a str, Mark>,
            path: &mut Vec<&'a str>,
        ) -> Result<(), DagError> {
            match mark.get(node).copied().unwrap_or(Mark::Unvisited) {
                Mark::Done => return Ok(()),
                Mark::InProgress => {
                    let start = path.iter().position(|n| *n == node).unwrap_or(0);
                    let mut cycle: Vec<&str> = path[start..].to_vec();
                    cycle.push(node);
                    return Err(DagError::CycleDetected(cycle.join(" -> ")));
                }
                Mark::Unvisited => {}
            }
            mark.insert(node, Mark::InProgress);
            path.push(node);
            for child in dag.children.get(node).map(|v| v.as_slice()).unwrap_or(&[]) {
                visit(child, dag, mark, path)?;
            }
            path.pop();
            mark.insert(node, Mark::Done);
            Ok(())
        }

        for name in &self.order {
            visit(name.as_str(), self, &mut mark, &mut path)?;
        }
        Ok(())
    }

    /// All nodes whose `status == pending` and whose predecessors are all
    /// in `completed` (spec.md §4.8).
    pub fn ready(&self, completed: &HashSet<String>) -> Vec<&Step> {
        self.order
            .iter()
            .filter_map(|name| {
                let step = &self.nodes[name];
                if step.status != StepStatus::Pending {
                    return None;
                }
                let deps_satisfied = self
                    .parents
                    .get(name)
                    .map(|ps| ps.iter().all(|p| completed.contains(p)))
                    .unwrap_or(true);
                deps_satisfied.then_some(step)
            })
            .collect()
    }

    pub fn running(&self) -> Vec<&Step> {
        self.order
            .iter()
            .map(|n| &self.nodes[n])
            .filter(|s| s.status == StepStatus::Running)
            .collect()
    }

    /// True iff every step is in a terminal state.
    pub fn complete(&self) -> bool {
        self.order.iter().all(|n| is_terminal(self.nodes[n].status))
    }

    /// True iff every step succeeded (or was skipped).
    pub fn succeeded(&self) -> bool {
        self.order.iter().all(|n| {
            matches!(
                self.nodes[n].status,
                StepStatus::Succeeded | StepStatus::Skipped
            )
        })
    }

    /// True iff any step failed or was marked upstream-failed.
    pub fn failed(&self) -> bool {
        self.order.iter().any(|n| {
            matches!(
                self.nodes[n].status,
                StepStatus::Failed | StepStatus::UpstreamFailed
            )
        })
    }

    pub fn descendants(&self, name: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut stack = vec![name.to_string()];
        let mut out = Vec::new();
        while let Some(n) = stack.pop() {
            if let Some(kids) = self.children.get(&n) {
                for k in kids {
                    if seen.insert(k.clone()) {
                        out.push(k.clone());
                        stack.push(k.clone());
                    }
                }
            }
        }
        out
    }

    /// Kahn's-algorithm topological order of `step_name`s.
    pub fn topological_order(&self) -> Result<Vec<String>, DagError> {
        let mut in_degree: HashMap<&str, usize> = self
            .order
            .iter()
            .map(|n| (n.as_str(), self.parents.get(n).map(|p| p.len()).unwrap_or(0)))
            .collect();
        let mut queue: std::collections::VecDeque<&str> = self
            .order
            .iter()
            .filter(|n| in_degree[n.as_str()] == 0)
            .map(|n| n.as_str())
            .collect();
        let mut out = Vec::with_capacity(self.order.len());
        while let Some(n) = queue.pop_front() {
            out.push(n.to_string());
            for child in self.children.get(n).map(|v| v.as_slice()).unwrap_or(&[]) {
                let deg = in_degree.get_mut(child.as_str()).unwrap();
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(child.as_str());
                }
            }
        }
        if out.len() != self.order.len() {
            return Err(DagError::CycleDetected("unresolved cycle".to_string()));
        }
        Ok(out)
    }

    pub fn get(&self, name: &str) -> Option<&Step> {
        self.nodes.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Step> {
        self.nodes.get_mut(name)
    }

    pub fn step_names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn parents_of(&self, name: &str) -> &[String] {
        self.parents.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_step(name: &str, depends_on: &[&str]) -> Step {
        Step {
            step_name: name.to_string(),
            app: "Homology".to_string(),
            params: json!({}),
            outputs: None,
            depends_on: if depends_on.is_empty() {
                None
            } else {
                Some(depends_on.iter().map(|s| s.to_string()).collect())
            },
            step_id: None,
            task_id: None,
            status: StepStatus::Pending,
            submitted_at: None,
            started_at: None,
            completed_at: None,
            elapsed_time: None,
            error_message: None,
        }
    }

    #[test]
    fn linear_dag_ready_progression() {
        let dag = Dag::build(vec![
            make_step("a", &[]),
            make_step("b", &["a"]),
            make_step("c", &["b"]),
        ])
        .unwrap();

        let mut completed = HashSet::new();
        let ready: Vec<_> = dag.ready(&completed).iter().map(|s| s.step_name.clone()).collect();
        assert_eq!(ready, vec!["a"]);

        completed.insert("a".to_string());
        let ready: Vec<_> = dag.ready(&completed).iter().map(|s| s.step_name.clone()).collect();
        assert_eq!(ready, vec!["b"]);

        completed.insert("b".to_string());
        let ready: Vec<_> = dag.ready(&completed).iter().map(|s| s.step_name.clone()).collect();
        assert_eq!(ready, vec!["c"]);
    }

    #[test]
    fn fan_out_all_children_ready_together() {
        let dag = Dag::build(vec![
            make_step("root", &[]),
            make_step("c1", &["root"]),
            make_step("c2", &["root"]),
            make_step("c3", &["root"]),
            make_step("c4", &["root"]),
        ])
        .unwrap();
        let completed: HashSet<String> = ["root".to_string()].into_iter().collect();
        let ready: Vec<_> = dag.ready(&completed).iter().map(|s| s.step_name.clone()).collect();
        assert_eq!(ready, vec!["c1", "c2", "c3", "c4"]);
    }

    #[test]
    fn cycle_is_rejected_with_readable_message() {
        let err = Dag::build(vec![make_step("a", &["b"]), make_step("b", &["a"])]).unwrap_err();
        match err {
            DagError::CycleDetected(msg) => {
                assert!(msg.contains('a') && msg.contains('b'));
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn missing_dependency_is_rejected() {
        let err = Dag::build(vec![make_step("a", &["ghost"])]).unwrap_err();
        assert!(matches!(err, DagError::MissingDependency { .. }));
    }

    #[test]
    fn empty_dag_is_rejected() {
        assert!(matches!(Dag::build(vec![]).unwrap_err(), DagError::Empty));
    }

    #[test]
    fn depends_on_resolves_by_step_id() {
        let mut a = make_step("a", &[]);
        a.step_id = Some("task-123".to_string());
        let b = make_step("b", &["task-123"]);
        let dag = Dag::build(vec![a, b]).unwrap();
        assert_eq!(dag.parents_of("b"), &["a".to_string()]);
    }

    #[test]
    fn descendants_transitive() {
        let dag = Dag::build(vec![
            make_step("a", &[]),
            make_step("b", &["a"]),
            make_step("c", &["b"]),
        ])
        .unwrap();
        let mut d = dag.descendants("a");
        d.sort();
        assert_eq!(d, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn complete_and_succeeded_predicates() {
        let mut dag = Dag::build(vec![make_step("a", &[]), make_step("b", &["a"])]).unwrap();
        assert!(!dag.complete());
        dag.get_mut("a").unwrap().status = StepStatus::Succeeded;
        dag.get_mut("b").unwrap().status = StepStatus::Succeeded;
        assert!(dag.complete());
        assert!(dag.succeeded());
        assert!(!dag.failed());
    }
}
