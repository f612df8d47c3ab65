//! `forge build` command: plan, generate and evaluate in one run.

use std::path::Path;

use anyhow::Result;

use forge_core::config::PipelineConfig;
use forge_core::pipeline::Pipeline;

use crate::evaluate_cmd::print_results;

/// Run the full pipeline. Returns whether evaluation passed.
pub async fn run_build(
    config: PipelineConfig,
    requirement_path: &Path,
    plan_output: Option<&Path>,
) -> Result<bool> {
    let mut pipeline = Pipeline::from_config(config)?;
    if let Some(path) = plan_output {
        pipeline = pipeline.with_plan_output(path);
    }

    let report = pipeline.run(requirement_path).await?;

    println!("Project: {}", report.project_dir.display());
    println!("Generated {} file(s):", report.generated.len());
    for file in &report.generated {
        let note = match (file.placeholder, file.repaired) {
            (true, _) => " (placeholder)".to_owned(),
            (false, true) => format!(" ({} calls, repaired)", file.model_calls),
            (false, false) if file.model_calls > 1 => format!(" ({} calls)", file.model_calls),
            _ => String::new(),
        };
        println!("  {}{note}", file.path);
    }
    if let Some(path) = plan_output {
        println!("Plan written to {}", path.display());
    }
    println!();

    print_results(&report.results);
    Ok(report.passed())
}
