use anyhow::Result;
use async_trait::async_trait;

use super::Agent;
use crate::evaluate::Evaluator;
use crate::plan::{EvaluationResult, Plan};

/// Checks a generated project against its plan.
pub struct EvaluatorAgent {
    evaluator: Evaluator,
}

impl EvaluatorAgent {
    pub fn new(evaluator: Evaluator) -> Self {
        Self { evaluator }
    }
}

#[async_trait]
impl Agent for EvaluatorAgent {
    type Input = Plan;
    type Output = Vec<EvaluationResult>;

    fn name(&self) -> &str {
        "evaluator"
    }

    async fn run(&self, plan: &Plan) -> Result<Vec<EvaluationResult>> {
        Ok(self.evaluator.evaluate(&plan.tasks, plan.project_root()).await?)
    }
}
