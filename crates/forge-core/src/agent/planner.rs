use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use super::Agent;
use crate::llm::{ChatMessage, ChatModel};
use crate::plan::{Plan, normalize};

/// System prompt for the planning call.
pub const PLANNER_SYSTEM_PROMPT: &str = "\
You are the planner of a project generator.
Turn the user's requirement into a build plan and output ONLY JSON, no commentary, no code fences:
{
  \"architecture\": {
    \"language\": \"...\",
    \"framework\": \"...\",
    \"project_root\": \"<single directory name>\",
    \"modules\": [\"<file path>\", ...]
  },
  \"tasks\": [
    {\"id\": 1, \"name\": \"...\", \"description\": \"...\", \"files\": [\"<file path>\"], \"depends_on\": []}
  ]
}
Rules:
- File paths are relative to project_root and must NOT include the project_root prefix.
- Every depends_on entry is the id of another task; no cycles.
- Always include main.py, utils.py, README.md and requirements.txt in some task's files.";

/// Turns a requirement into a normalized [`Plan`] with one model call.
pub struct PlannerAgent {
    model: Arc<dyn ChatModel>,
}

impl PlannerAgent {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Agent for PlannerAgent {
    type Input = str;
    type Output = Plan;

    fn name(&self) -> &str {
        "planner"
    }

    async fn run(&self, requirement: &str) -> Result<Plan> {
        info!(model = self.model.name(), "planning");
        let reply = self
            .model
            .chat(PLANNER_SYSTEM_PROMPT, &[ChatMessage::user(requirement)])
            .await
            .context("planner model call failed")?;

        let plan = normalize(&reply)?;
        info!(
            project_root = plan.project_root(),
            tasks = plan.tasks.len(),
            files = plan.generation_units(),
            "plan ready"
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::DemoModel;
    use crate::plan::REQUIRED_FILES;

    #[test]
    fn prompt_names_every_required_file() {
        for file in REQUIRED_FILES {
            assert!(PLANNER_SYSTEM_PROMPT.contains(file), "prompt misses {file}");
        }
    }

    #[tokio::test]
    async fn demo_backend_plans() {
        let planner = PlannerAgent::new(Arc::new(DemoModel));
        let plan = planner.run("an arXiv digest site").await.unwrap();
        assert_eq!(plan.project_root(), "arxiv_cs_daily");
        assert_eq!(planner.name(), "planner");
    }
}
