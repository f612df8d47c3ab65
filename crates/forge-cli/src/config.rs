//! Configuration file management for forge.
//!
//! Provides a TOML-based config file at `~/.config/forge/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use forge_core::config::{Backend, EvalConfig, ModelConfig, PipelineConfig};

/// Env var overriding the workspace root.
pub const ENV_WORKSPACE: &str = "FORGE_WORKSPACE";
/// Env var overriding the model API base URL.
pub const ENV_API_BASE: &str = "FORGE_API_BASE";
/// Env var overriding the model name.
pub const ENV_MODEL: &str = "FORGE_MODEL";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub workspace: WorkspaceSection,
    pub model: ModelSection,
    pub eval: EvalSection,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSection {
    /// Directory generated projects are written under.
    pub root: PathBuf,
}

impl Default for WorkspaceSection {
    fn default() -> Self {
        Self {
            root: PathBuf::from(PipelineConfig::DEFAULT_WORKSPACE),
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    pub backend: Backend,
    pub api_base: String,
    pub model: String,
    /// Name of the env var holding the API key (the key itself is never
    /// stored in the file).
    pub api_key_env: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for ModelSection {
    fn default() -> Self {
        let defaults = ModelConfig::default();
        Self {
            backend: defaults.backend,
            api_base: defaults.api_base,
            model: defaults.model,
            api_key_env: defaults.api_key_env,
            temperature: defaults.temperature,
            timeout_secs: defaults.timeout_secs,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalSection {
    /// Check command argv; `{project_root}` is substituted per run.
    pub check_command: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for EvalSection {
    fn default() -> Self {
        let defaults = EvalConfig::default();
        Self {
            check_command: defaults.check_command,
            timeout_secs: defaults.timeout_secs,
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the forge config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/forge` or `~/.config/forge`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("forge");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("forge")
}

/// Return the path to the forge config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. `Ok(None)` if it does not exist; a file
/// that exists but does not parse is an error.
pub fn load_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(Some(config))
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values supplied on the command line.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub workspace: Option<PathBuf>,
    pub api_base: Option<String>,
    pub model: Option<String>,
    pub demo: bool,
}

/// Resolve the pipeline configuration using the chain:
/// CLI flag > env var > config file > default.
///
/// - Workspace: `--workspace` > `FORGE_WORKSPACE` > `workspace.root`
/// - API base: `--api-base` > `FORGE_API_BASE` > `model.api_base`
/// - Model: `--model` > `FORGE_MODEL` > `model.model`
/// - Backend: `--demo` > `model.backend`
pub fn resolve(cli: &CliOverrides) -> Result<PipelineConfig> {
    let file = load_config()?.unwrap_or_default();

    let workspace_root = pick(cli.workspace.clone(), ENV_WORKSPACE, PathBuf::from)
        .unwrap_or(file.workspace.root);
    let api_base = pick(cli.api_base.clone(), ENV_API_BASE, |v| v).unwrap_or(file.model.api_base);
    let model = pick(cli.model.clone(), ENV_MODEL, |v| v).unwrap_or(file.model.model);
    let backend = if cli.demo {
        Backend::Demo
    } else {
        file.model.backend
    };

    Ok(PipelineConfig {
        workspace_root,
        model: ModelConfig {
            api_base,
            model,
            api_key_env: file.model.api_key_env,
            temperature: file.model.temperature,
            timeout_secs: file.model.timeout_secs,
            backend,
        },
        eval: EvalConfig {
            check_command: file.eval.check_command,
            timeout_secs: file.eval.timeout_secs,
        },
    })
}

/// The CLI value if given, else a non-empty env var.
fn pick<T>(cli: Option<T>, env: &str, from_env: impl FnOnce(String) -> T) -> Option<T> {
    cli.or_else(|| {
        std::env::var(env)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(from_env)
    })
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
