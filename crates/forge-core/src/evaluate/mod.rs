//! Evaluation aggregator: checks a generated project against its plan and
//! folds every finding into one project-wide verdict.
//!
//! Two checks run, in order:
//! 1. every file named by any task must exist under `project_root`;
//! 2. the configured check command must exit with status 0.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::EvalConfig;
use crate::exec::CommandRunner;
use crate::plan::{EvaluationResult, Task, expected_files};
use crate::workspace::{FileStore, WorkspaceError};

/// Longest stderr excerpt quoted in an issue.
const STDERR_SNIPPET_BYTES: usize = 1024;

/// Runs the evaluation checks for generated projects.
#[derive(Clone)]
pub struct Evaluator {
    store: FileStore,
    runner: Arc<dyn CommandRunner>,
    config: EvalConfig,
}

impl Evaluator {
    pub fn new(store: FileStore, runner: Arc<dyn CommandRunner>, config: EvalConfig) -> Self {
        Self {
            store,
            runner,
            config,
        }
    }

    /// Evaluate the files of `tasks` under `project_root`.
    ///
    /// Always yields exactly one [`EvaluationResult`] with
    /// `task_id == EvaluationResult::PROJECT_WIDE`. A task file that resolves
    /// outside the workspace is an error, not an issue.
    pub async fn evaluate(
        &self,
        tasks: &[Task],
        project_root: &str,
    ) -> Result<Vec<EvaluationResult>, WorkspaceError> {
        let mut issues = Vec::new();

        let missing = self.missing_files(tasks, project_root)?;
        if !missing.is_empty() {
            warn!(count = missing.len(), "expected files are missing");
            issues.push(format!("Missing files: {missing:?}"));
        }

        if let Some(issue) = self.run_check(project_root).await {
            issues.push(issue);
        }

        let result = EvaluationResult::project_wide(issues);
        info!(
            project_root,
            passed = result.passed,
            issues = result.issues.len(),
            "evaluation finished"
        );
        Ok(vec![result])
    }

    /// Absolute paths of expected files that do not exist, in first-seen
    /// order.
    fn missing_files(&self, tasks: &[Task], project_root: &str) -> Result<Vec<String>, WorkspaceError> {
        let mut missing = Vec::new();
        for file in expected_files(tasks) {
            let absolute = self.store.locate(Path::new(project_root).join(file))?;
            if !absolute.exists() {
                missing.push(absolute.display().to_string());
            }
        }
        Ok(missing)
    }

    /// Run the check command from the workspace root. `None` when it passes.
    async fn run_check(&self, project_root: &str) -> Option<String> {
        let argv = self.config.command_for(project_root);
        let command = argv.join(" ");
        info!(%command, "running check command");

        match self
            .runner
            .run(&argv, self.store.root(), self.config.timeout())
            .await
        {
            Ok(output) if output.success() => None,
            Ok(output) => Some(format!(
                "Check command `{command}` failed with exit code {}: {}",
                output.exit_code,
                truncate_snippet(output.stderr.trim(), STDERR_SNIPPET_BYTES)
            )),
            Err(e) => {
                warn!(%command, error = %e, "check command could not be started");
                Some(format!("Check command `{command}` could not be run: {e:#}"))
            }
        }
    }
}

/// Truncate a string to at most `max_bytes` bytes, appending "..." if
/// truncated.
fn truncate_snippet(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_owned();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut truncated = s[..end].to_owned();
    truncated.push_str("...");
    truncated
}
