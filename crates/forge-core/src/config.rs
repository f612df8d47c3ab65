//! Pipeline configuration values.
//!
//! Everything the pipeline needs is passed in explicitly; nothing is read
//! from process-wide state after construction.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which model backend answers chat requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// An OpenAI-compatible HTTP endpoint.
    #[default]
    Remote,
    /// Offline canned responses; can plan but cannot generate code.
    Demo,
}

/// Settings for the language-model capability.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Base URL; `/chat/completions` is appended.
    pub api_base: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub backend: Backend,
}

impl ModelConfig {
    pub const DEFAULT_API_BASE: &str = "https://api.deepseek.com";
    pub const DEFAULT_MODEL: &str = "deepseek-chat";
    pub const DEFAULT_API_KEY_ENV: &str = "DEEPSEEK_API_KEY";
    pub const DEFAULT_TEMPERATURE: f32 = 0.5;
    pub const DEFAULT_TIMEOUT_SECS: u64 = 240;

    /// Read the API key from the configured environment variable.
    ///
    /// Returns `None` when unset or blank.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_base: Self::DEFAULT_API_BASE.to_owned(),
            model: Self::DEFAULT_MODEL.to_owned(),
            api_key_env: Self::DEFAULT_API_KEY_ENV.to_owned(),
            temperature: Self::DEFAULT_TEMPERATURE,
            timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
            backend: Backend::default(),
        }
    }
}

/// Settings for the post-generation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalConfig {
    /// Argument vector; `{project_root}` is replaced with the plan's
    /// project root before running.
    pub check_command: Vec<String>,
    pub timeout_secs: u64,
}

impl EvalConfig {
    pub const PROJECT_ROOT_PLACEHOLDER: &str = "{project_root}";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

    pub fn default_check_command() -> Vec<String> {
        ["python", "-m", "compileall", Self::PROJECT_ROOT_PLACEHOLDER]
            .into_iter()
            .map(str::to_owned)
            .collect()
    }

    /// The check command with the placeholder substituted.
    pub fn command_for(&self, project_root: &str) -> Vec<String> {
        self.check_command
            .iter()
            .map(|arg| arg.replace(Self::PROJECT_ROOT_PLACEHOLDER, project_root))
            .collect()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            check_command: Self::default_check_command(),
            timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Everything a pipeline run needs.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Directory all generated projects live under.
    pub workspace_root: PathBuf,
    pub model: ModelConfig,
    pub eval: EvalConfig,
}

impl PipelineConfig {
    pub const DEFAULT_WORKSPACE: &str = "workspace";

    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            model: ModelConfig::default(),
            eval: EvalConfig::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WORKSPACE)
    }
}
