//! External command execution used for post-generation checks.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Exit code reported when a command is killed for exceeding its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code reported when a command is terminated by a signal.
pub const SIGNAL_EXIT_CODE: i32 = -1;

/// The result of running one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: i64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Capability to run an external command.
///
/// A timeout is not an error: implementations return
/// [`TIMEOUT_EXIT_CODE`] with an explanatory stderr. `Err` is reserved for
/// commands that could not be started at all.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, argv: &[String], cwd: &Path, timeout: Duration) -> Result<CommandOutput>;
}

/// Runs commands as child processes via `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, argv: &[String], cwd: &Path, timeout: Duration) -> Result<CommandOutput> {
        let Some((program, args)) = argv.split_first() else {
            bail!("cannot run an empty command");
        };
        let start = Instant::now();

        let mut child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to execute `{}`", argv.join(" ")))?;

        // Drain both pipes while waiting so a chatty child cannot fill the
        // pipe buffer and deadlock.
        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();

        let read_stdout = async {
            let mut buf = Vec::new();
            if let Some(ref mut pipe) = stdout_pipe {
                pipe.read_to_end(&mut buf).await.ok();
            }
            String::from_utf8_lossy(&buf).into_owned()
        };

        let read_stderr = async {
            let mut buf = Vec::new();
            if let Some(ref mut pipe) = stderr_pipe {
                pipe.read_to_end(&mut buf).await.ok();
            }
            String::from_utf8_lossy(&buf).into_owned()
        };

        let outcome = tokio::time::timeout(timeout, async {
            tokio::join!(child.wait(), read_stdout, read_stderr)
        })
        .await;

        let elapsed = || i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX);

        match outcome {
            Ok((Ok(status), stdout, stderr)) => Ok(CommandOutput {
                exit_code: status.code().unwrap_or(SIGNAL_EXIT_CODE),
                stdout,
                stderr,
                duration_ms: elapsed(),
            }),
            Ok((Err(e), _, _)) => {
                Err(e).with_context(|| format!("failed to wait on `{}`", argv.join(" ")))
            }
            Err(_) => {
                let _ = child.kill().await;
                tracing::warn!(
                    command = %argv.join(" "),
                    timeout_secs = timeout.as_secs(),
                    "command timed out"
                );
                Ok(CommandOutput {
                    exit_code: TIMEOUT_EXIT_CODE,
                    stdout: String::new(),
                    stderr: format!("Command timed out after {}s.", timeout.as_secs()),
                    duration_ms: elapsed(),
                })
            }
        }
    }
}
