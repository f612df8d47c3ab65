//! Offline backend with canned replies.
//!
//! Answers planner prompts with a fixed sample plan so the planning stage
//! can be exercised without network access or an API key. Code generation
//! needs a real model, so every other prompt is refused.

use async_trait::async_trait;

use super::{ChatMessage, ChatModel, LlmError};

/// Marker the planner's system prompt carries.
const PLANNER_MARKER: &str = "planner";

const SAMPLE_PLAN: &str = r#"{
    "architecture": {
        "language": "Python",
        "framework": "Flask",
        "project_root": "arxiv_cs_daily",
        "modules": [
            "app.py",
            "utils/arxiv_api.py",
            "templates/index.html",
            "templates/category.html",
            "templates/paper.html",
            "static/styles.css",
            "requirements.txt",
            "README.md"
        ]
    },
    "tasks": [
        {
            "id": 1,
            "name": "Create project skeleton",
            "description": "Create basic Flask project files.",
            "files": ["app.py", "requirements.txt", "README.md"],
            "depends_on": []
        },
        {
            "id": 2,
            "name": "Implement arxiv_api utilities",
            "description": "Implement utils/arxiv_api.py to fetch papers from arXiv.",
            "files": ["utils/arxiv_api.py"],
            "depends_on": [1]
        },
        {
            "id": 3,
            "name": "Implement templates",
            "description": "Implement HTML templates for arXiv categories and paper details.",
            "files": ["templates/index.html", "templates/category.html", "templates/paper.html", "static/styles.css"],
            "depends_on": [1]
        },
        {
            "id": 4,
            "name": "Wire up Flask routes",
            "description": "Create Flask routes to render templates and handle API calls.",
            "files": ["app.py"],
            "depends_on": [1, 2, 3]
        }
    ]
}"#;

/// Canned-response backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoModel;

#[async_trait]
impl ChatModel for DemoModel {
    fn name(&self) -> &str {
        "demo"
    }

    async fn chat(
        &self,
        system_prompt: &str,
        _messages: &[ChatMessage],
    ) -> Result<String, LlmError> {
        if system_prompt.to_lowercase().contains(PLANNER_MARKER) {
            return Ok(SAMPLE_PLAN.to_owned());
        }
        Err(LlmError::Unavailable(
            "the demo backend can only plan; configure a remote model to generate code".to_owned(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::normalize;

    #[tokio::test]
    async fn planner_prompt_gets_sample_plan() {
        let reply = DemoModel
            .chat("You are a project Planner.", &[ChatMessage::user("build a site")])
            .await
            .unwrap();
        let plan = normalize(&reply).expect("sample plan must normalize");
        assert_eq!(plan.project_root(), "arxiv_cs_daily");
        // main.py and utils.py are synthesized.
        assert_eq!(plan.tasks.len(), 6);
    }

    #[tokio::test]
    async fn other_prompts_are_refused() {
        let err = DemoModel.chat("You are a coder.", &[]).await.unwrap_err();
        assert!(matches!(err, LlmError::Unavailable(_)));
    }
}
