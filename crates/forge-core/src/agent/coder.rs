use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use super::Agent;
use crate::generate::{GeneratedFile, GenerationEngine};
use crate::plan::{Plan, generation_order};

/// Generates every file of a plan, one model cycle per file.
///
/// Tasks run in dependency order (stable with respect to plan order), files
/// within a task in list order. The first failure aborts the run.
pub struct CoderAgent {
    engine: GenerationEngine,
}

impl CoderAgent {
    pub fn new(engine: GenerationEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Agent for CoderAgent {
    type Input = Plan;
    type Output = Vec<GeneratedFile>;

    fn name(&self) -> &str {
        "coder"
    }

    async fn run(&self, plan: &Plan) -> Result<Vec<GeneratedFile>> {
        let order = generation_order(plan)?;
        let total = plan.generation_units();
        let mut generated = Vec::with_capacity(total);

        for task in order {
            info!(task_id = task.id, name = %task.name, files = task.files.len(), "generating task");
            for file in &task.files {
                let out = self
                    .engine
                    .generate_one(task, file, plan.project_root())
                    .await
                    .with_context(|| format!("generation failed for task {} file {file}", task.id))?;
                generated.push(out);
                info!(done = generated.len(), total, "progress");
            }
        }

        Ok(generated)
    }
}
