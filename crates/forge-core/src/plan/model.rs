//! Plan data model: the contract shared by every pipeline stage.
//!
//! A [`Plan`] is built once by the normalizer and is read-only afterwards.
//! All file paths held here are relative to `architecture.project_root` and
//! never carry that prefix.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

/// Language substituted when the planner leaves it empty.
pub const DEFAULT_LANGUAGE: &str = "Python";

/// Framework substituted when the planner leaves it empty.
pub const DEFAULT_FRAMEWORK: &str = "none";

/// Project-level metadata produced by the planner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Architecture {
    pub language: String,
    pub framework: String,
    /// Single path segment naming the generated project's directory inside
    /// the workspace root.
    pub project_root: String,
    /// Module paths, relative to `project_root`.
    #[serde(default)]
    pub modules: Vec<String>,
    /// Any additional keys the planner emitted, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One unit of work: a set of files to generate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    /// Unique within a plan.
    pub id: i64,
    pub name: String,
    pub description: String,
    /// Relative paths in generation order.
    #[serde(default)]
    pub files: Vec<String>,
    /// Ids of other tasks in the same plan.
    #[serde(default)]
    pub depends_on: BTreeSet<i64>,
}

/// The planning stage's output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub architecture: Architecture,
    pub tasks: Vec<Task>,
}

impl Plan {
    /// Shorthand for `architecture.project_root`.
    pub fn project_root(&self) -> &str {
        &self.architecture.project_root
    }

    /// Look up a task by id.
    pub fn task(&self, id: i64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Every file named by any task, deduplicated, in first-seen order.
    pub fn expected_files(&self) -> Vec<&str> {
        expected_files(&self.tasks)
    }

    /// Number of (task, file) generation units.
    pub fn generation_units(&self) -> usize {
        self.tasks.iter().map(|t| t.files.len()).sum()
    }
}

/// Every file named by any of `tasks`, deduplicated, in first-seen order.
pub fn expected_files(tasks: &[Task]) -> Vec<&str> {
    let mut seen = HashSet::new();
    tasks
        .iter()
        .flat_map(|t| t.files.iter())
        .filter(|f| seen.insert(f.as_str()))
        .map(String::as_str)
        .collect()
}

/// Outcome of one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvaluationResult {
    /// The task this verdict covers, or [`EvaluationResult::PROJECT_WIDE`].
    pub task_id: i64,
    pub passed: bool,
    #[serde(default)]
    pub issues: Vec<String>,
}

impl EvaluationResult {
    /// Sentinel task id for verdicts that cover the whole project.
    pub const PROJECT_WIDE: i64 = -1;

    /// Build a project-wide verdict; it passes iff `issues` is empty.
    pub fn project_wide(issues: Vec<String>) -> Self {
        Self {
            task_id: Self::PROJECT_WIDE,
            passed: issues.is_empty(),
            issues,
        }
    }
}
