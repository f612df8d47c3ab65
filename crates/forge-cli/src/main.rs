mod build_cmd;
mod config;
mod evaluate_cmd;
mod plan_cmd;
#[cfg(test)]
mod test_util;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use forge_core::config::{Backend, PipelineConfig};

use config::CliOverrides;

/// Default requirement file, relative to the current directory.
const DEFAULT_REQUIREMENT: &str = "question.txt";

#[derive(Parser)]
#[command(name = "forge", about = "Turn a requirement into a generated project: plan, generate, evaluate")]
struct Cli {
    /// Workspace root for generated projects (overrides FORGE_WORKSPACE)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// Model API base URL (overrides FORGE_API_BASE)
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Model name (overrides FORGE_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Use the offline demo backend (planning only)
    #[arg(long, global = true)]
    demo: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a forge config file with default settings
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Plan, generate and evaluate a project
    Build {
        /// File containing the natural-language requirement
        #[arg(long, default_value = DEFAULT_REQUIREMENT)]
        requirement: PathBuf,
        /// Also save the plan as JSON
        #[arg(long)]
        plan_output: Option<PathBuf>,
    },
    /// Produce a plan without generating any files
    Plan {
        /// File containing the natural-language requirement
        #[arg(long, default_value = DEFAULT_REQUIREMENT)]
        requirement: PathBuf,
        /// Save the plan as JSON
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Evaluate a generated project against a saved plan
    Evaluate {
        /// Path to a plan JSON file
        #[arg(long)]
        plan: PathBuf,
    },
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            workspace: self.workspace.clone(),
            api_base: self.api_base.clone(),
            model: self.model.clone(),
            demo: self.demo,
        }
    }

    fn resolve_config(&self) -> anyhow::Result<PipelineConfig> {
        let resolved = config::resolve(&self.overrides())?;
        tracing::debug!(
            workspace = %resolved.workspace_root.display(),
            api_base = %resolved.model.api_base,
            model = %resolved.model.model,
            backend = ?resolved.model.backend,
            "configuration resolved"
        );
        Ok(resolved)
    }
}

/// Execute the `forge init` command: write config file.
fn cmd_init(cli: &Cli, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let mut cfg = config::ConfigFile::default();
    if let Some(ws) = &cli.workspace {
        cfg.workspace.root = ws.clone();
    }
    if let Some(base) = &cli.api_base {
        cfg.model.api_base = base.clone();
    }
    if let Some(model) = &cli.model {
        cfg.model.model = model.clone();
    }
    if cli.demo {
        cfg.model.backend = Backend::Demo;
    }

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  workspace.root = {}", cfg.workspace.root.display());
    println!("  model.api_base = {}", cfg.model.api_base);
    println!("  model.model = {}", cfg.model.model);
    println!("  model.api_key_env = {}", cfg.model.api_key_env);
    println!();
    println!(
        "Next: export {} and run `forge build`.",
        cfg.model.api_key_env
    );

    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    match &cli.command {
        Commands::Init { force } => {
            cmd_init(&cli, *force)?;
            Ok(true)
        }
        Commands::Build {
            requirement,
            plan_output,
        } => {
            let resolved = cli.resolve_config()?;
            build_cmd::run_build(resolved, requirement, plan_output.as_deref()).await
        }
        Commands::Plan {
            requirement,
            output,
        } => {
            let resolved = cli.resolve_config()?;
            plan_cmd::run_plan(resolved, requirement, output.as_deref()).await?;
            Ok(true)
        }
        Commands::Evaluate { plan } => {
            let resolved = cli.resolve_config()?;
            evaluate_cmd::run_evaluate(resolved, plan).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn build_defaults_to_question_txt() {
        let cli = Cli::try_parse_from(["forge", "build"]).unwrap();
        match cli.command {
            Commands::Build {
                requirement,
                plan_output,
            } => {
                assert_eq!(requirement, PathBuf::from("question.txt"));
                assert!(plan_output.is_none());
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "forge",
            "plan",
            "--demo",
            "--workspace",
            "/tmp/ws",
            "--model",
            "m",
        ])
        .unwrap();
        let overrides = cli.overrides();
        assert!(overrides.demo);
        assert_eq!(overrides.workspace, Some(PathBuf::from("/tmp/ws")));
        assert_eq!(overrides.model.as_deref(), Some("m"));
        assert!(overrides.api_base.is_none());
    }

    #[test]
    fn evaluate_requires_plan() {
        assert!(Cli::try_parse_from(["forge", "evaluate"]).is_err());
    }
}
