//! Role agents.
//!
//! Every pipeline stage is an [`Agent`]: one `run` operation from a
//! role-specific input to a role-specific output.

mod coder;
mod evaluator;
mod planner;

pub use coder::CoderAgent;
pub use evaluator::EvaluatorAgent;
pub use planner::{PLANNER_SYSTEM_PROMPT, PlannerAgent};

use anyhow::Result;
use async_trait::async_trait;

/// A pipeline role.
#[async_trait]
pub trait Agent: Send + Sync {
    type Input: ?Sized + Sync;
    type Output: Send;

    /// Human-readable role name (e.g. "planner").
    fn name(&self) -> &str;

    async fn run(&self, input: &Self::Input) -> Result<Self::Output>;
}
