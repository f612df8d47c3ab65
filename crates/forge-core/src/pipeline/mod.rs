//! Pipeline orchestrator: plan, generate, evaluate.
//!
//! Stages run strictly one after another and the first error halts the
//! run. Model and command capabilities are injected so tests can swap in
//! scripted implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::agent::{Agent, CoderAgent, EvaluatorAgent, PlannerAgent};
use crate::config::PipelineConfig;
use crate::evaluate::Evaluator;
use crate::exec::{CommandRunner, ProcessRunner};
use crate::generate::{GeneratedFile, GenerationEngine};
use crate::llm::{ChatModel, model_from_config};
use crate::plan::{EvaluationResult, Plan};
use crate::workspace::FileStore;

/// Everything a full run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub plan: Plan,
    pub generated: Vec<GeneratedFile>,
    pub results: Vec<EvaluationResult>,
    /// Absolute path of the generated project.
    pub project_dir: PathBuf,
}

impl RunReport {
    /// True when every evaluation result passed.
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }
}

/// The three-stage pipeline bound to one workspace.
pub struct Pipeline {
    store: FileStore,
    planner: PlannerAgent,
    coder: CoderAgent,
    evaluator: EvaluatorAgent,
    plan_output: Option<PathBuf>,
}

impl Pipeline {
    /// Build a pipeline from explicit capabilities. Creates the workspace
    /// root if it does not exist.
    pub fn new(
        config: PipelineConfig,
        model: Arc<dyn ChatModel>,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        let store = FileStore::open(&config.workspace_root).with_context(|| {
            format!(
                "failed to open workspace {}",
                config.workspace_root.display()
            )
        })?;

        Ok(Self {
            planner: PlannerAgent::new(model.clone()),
            coder: CoderAgent::new(GenerationEngine::new(model, store.clone())),
            evaluator: EvaluatorAgent::new(Evaluator::new(
                store.clone(),
                runner,
                config.eval,
            )),
            store,
            plan_output: None,
        })
    }

    /// Build a pipeline with the model backend named by the config and real
    /// child processes for checks.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let model = model_from_config(&config.model)?;
        Self::new(config, model, Arc::new(ProcessRunner))
    }

    /// Save the plan as pretty JSON to `path` as soon as planning finishes.
    pub fn with_plan_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.plan_output = Some(path.into());
        self
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// Absolute directory a plan's project is generated into.
    pub fn project_dir(&self, plan: &Plan) -> PathBuf {
        self.store.root().join(plan.project_root())
    }

    pub async fn plan(&self, requirement: &str) -> Result<Plan> {
        info!(agent = self.planner.name(), "stage started");
        self.planner.run(requirement).await
    }

    pub async fn generate(&self, plan: &Plan) -> Result<Vec<GeneratedFile>> {
        info!(agent = self.coder.name(), files = plan.generation_units(), "stage started");
        self.coder.run(plan).await
    }

    pub async fn evaluate(&self, plan: &Plan) -> Result<Vec<EvaluationResult>> {
        info!(agent = self.evaluator.name(), "stage started");
        self.evaluator.run(plan).await
    }

    /// Read the requirement at `requirement_path` and run every stage.
    pub async fn run(&self, requirement_path: &Path) -> Result<RunReport> {
        let requirement = read_requirement(requirement_path)?;

        let plan = self.plan(&requirement).await?;
        if let Some(path) = &self.plan_output {
            save_plan(&plan, path)?;
            info!(path = %path.display(), "plan saved");
        }

        let generated = self.generate(&plan).await?;
        let results = self.evaluate(&plan).await?;

        Ok(RunReport {
            project_dir: self.project_dir(&plan),
            plan,
            generated,
            results,
        })
    }
}

/// Read a requirement file. Fails if it is missing or blank.
pub fn read_requirement(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read requirement file {}", path.display()))?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        bail!("requirement file {} is empty", path.display());
    }
    Ok(trimmed.to_owned())
}

/// Write `plan` to `path` as pretty-printed JSON.
pub fn save_plan(plan: &Plan, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(plan).context("failed to serialize plan")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, json).with_context(|| format!("failed to write plan to {}", path.display()))
}
