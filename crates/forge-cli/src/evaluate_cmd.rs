//! `forge evaluate` command: re-check a generated project against a saved
//! plan.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use forge_core::config::PipelineConfig;
use forge_core::evaluate::Evaluator;
use forge_core::exec::ProcessRunner;
use forge_core::plan::{EvaluationResult, load_plan_json};
use forge_core::workspace::FileStore;

/// Evaluate the project described by the plan at `plan_path`. Returns
/// whether every result passed.
pub async fn run_evaluate(config: PipelineConfig, plan_path: &Path) -> Result<bool> {
    let content = std::fs::read_to_string(plan_path)
        .with_context(|| format!("failed to read plan file {}", plan_path.display()))?;
    let plan = load_plan_json(&content)
        .with_context(|| format!("invalid plan file {}", plan_path.display()))?;

    let store = FileStore::open(&config.workspace_root)?;
    let evaluator = Evaluator::new(store, Arc::new(ProcessRunner), config.eval);
    let results = evaluator.evaluate(&plan.tasks, plan.project_root()).await?;

    print_results(&results);
    Ok(results.iter().all(|r| r.passed))
}

/// Print evaluation verdicts and their issues.
pub fn print_results(results: &[EvaluationResult]) {
    for result in results {
        let scope = if result.task_id == EvaluationResult::PROJECT_WIDE {
            "project".to_owned()
        } else {
            format!("task {}", result.task_id)
        };
        let verdict = if result.passed { "PASSED" } else { "FAILED" };
        println!("Evaluation ({scope}): {verdict}");
        for issue in &result.issues {
            println!("  - {issue}");
        }
    }
}
