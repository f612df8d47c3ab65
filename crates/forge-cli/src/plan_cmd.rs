//! `forge plan` command: run only the planning stage.

use std::path::Path;

use anyhow::{Context, Result};

use forge_core::config::PipelineConfig;
use forge_core::pipeline::{Pipeline, read_requirement, save_plan};
use forge_core::plan::Plan;

/// Plan `requirement_path`, print the plan and optionally save it as JSON.
pub async fn run_plan(
    config: PipelineConfig,
    requirement_path: &Path,
    output: Option<&Path>,
) -> Result<()> {
    let requirement = read_requirement(requirement_path)?;
    let pipeline = Pipeline::from_config(config)?;
    let plan = pipeline.plan(&requirement).await?;

    print_plan(&plan);

    if let Some(path) = output {
        save_plan(&plan, path).with_context(|| format!("failed to save plan to {}", path.display()))?;
        println!();
        println!("Plan written to {}", path.display());
    }
    Ok(())
}

/// Print a human-readable summary of `plan`.
pub fn print_plan(plan: &Plan) {
    let arch = &plan.architecture;
    println!("Project: {}", arch.project_root);
    println!("Stack:   {} / {}", arch.language, arch.framework);
    if !arch.modules.is_empty() {
        println!("Modules: {}", arch.modules.join(", "));
    }
    println!();

    println!("Tasks ({}):", plan.tasks.len());
    for task in &plan.tasks {
        let deps = if task.depends_on.is_empty() {
            String::new()
        } else {
            let ids: Vec<String> = task.depends_on.iter().map(i64::to_string).collect();
            format!(" (after {})", ids.join(", "))
        };
        println!("  [{}] {}{deps}", task.id, task.name);
        for file in &task.files {
            println!("      {file}");
        }
    }
}
