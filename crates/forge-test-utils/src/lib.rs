//! Shared test utilities for forge integration tests.
//!
//! Provides scripted stand-ins for the two external capabilities the core
//! consumes (the chat model and the command runner) plus small fixture
//! builders for plans, tasks and workspaces.

use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tempfile::TempDir;

use forge_core::exec::{CommandOutput, CommandRunner};
use forge_core::llm::{ChatMessage, ChatModel, LlmError};
use forge_core::plan::{Architecture, Plan, Task};
use forge_core::workspace::FileStore;

// ---------------------------------------------------------------------------
// ScriptedModel
// ---------------------------------------------------------------------------

/// One recorded `chat` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
}

/// A [`ChatModel`] that answers from a queue of canned replies and records
/// every call.
///
/// Once the queue is empty the fallback reply is returned forever.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    fallback: String,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModel {
    pub const DEFAULT_FALLBACK: &str = "I am not able to produce JSON today.";

    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            fallback: Self::DEFAULT_FALLBACK.to_owned(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A model that never returns anything but `reply`.
    pub fn always(reply: impl Into<String>) -> Self {
        Self::new(Vec::<String>::new()).with_fallback(reply)
    }

    pub fn with_fallback(mut self, reply: impl Into<String>) -> Self {
        self.fallback = reply.into();
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock poisoned").len()
    }

    /// Number of calls made with exactly `system_prompt`.
    pub fn calls_with_prompt(&self, system_prompt: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .iter()
            .filter(|c| c.system_prompt == system_prompt)
            .count()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push(RecordedCall {
                system_prompt: system_prompt.to_owned(),
                messages: messages.to_vec(),
            });
        let next = self.replies.lock().expect("replies lock poisoned").pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}

// ---------------------------------------------------------------------------
// ScriptedRunner
// ---------------------------------------------------------------------------

/// A [`CommandRunner`] that returns a canned result and records each argv
/// and working directory it was asked to run.
pub struct ScriptedRunner {
    outcome: Result<CommandOutput, String>,
    runs: Mutex<Vec<(Vec<String>, PathBuf)>>,
}

impl ScriptedRunner {
    /// Every command exits 0.
    pub fn passing() -> Self {
        Self::with_output(0, "", "")
    }

    /// Every command exits with `exit_code` and the given output.
    pub fn with_output(exit_code: i32, stdout: &str, stderr: &str) -> Self {
        Self {
            outcome: Ok(CommandOutput {
                exit_code,
                stdout: stdout.to_owned(),
                stderr: stderr.to_owned(),
                duration_ms: 0,
            }),
            runs: Mutex::new(Vec::new()),
        }
    }

    /// Every command fails to start with `message`.
    pub fn unstartable(message: &str) -> Self {
        Self {
            outcome: Err(message.to_owned()),
            runs: Mutex::new(Vec::new()),
        }
    }

    pub fn runs(&self) -> Vec<(Vec<String>, PathBuf)> {
        self.runs.lock().expect("runs lock poisoned").clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        argv: &[String],
        cwd: &Path,
        _timeout: Duration,
    ) -> anyhow::Result<CommandOutput> {
        self.runs
            .lock()
            .expect("runs lock poisoned")
            .push((argv.to_vec(), cwd.to_path_buf()));
        match &self.outcome {
            Ok(output) => Ok(output.clone()),
            Err(message) => Err(anyhow::anyhow!("{message}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A well-formed generation payload for `path` carrying `content`.
pub fn payload(path: &str, content: &str) -> String {
    serde_json::json!({
        "path": path,
        "content_b64": STANDARD.encode(content),
    })
    .to_string()
}

/// A task named after its id.
pub fn task(id: i64, files: &[&str], depends_on: &[i64]) -> Task {
    Task {
        id,
        name: format!("Task {id}"),
        description: format!("Description of task {id}"),
        files: files.iter().map(|f| (*f).to_owned()).collect(),
        depends_on: depends_on.iter().copied().collect::<BTreeSet<_>>(),
    }
}

/// A Python plan rooted at `project_root`.
pub fn plan(project_root: &str, tasks: Vec<Task>) -> Plan {
    Plan {
        architecture: Architecture {
            language: "Python".to_owned(),
            framework: "none".to_owned(),
            project_root: project_root.to_owned(),
            modules: Vec::new(),
            extra: serde_json::Map::new(),
        },
        tasks,
    }
}

/// A fresh workspace in a temporary directory. Keep the [`TempDir`] alive
/// for as long as the store is used.
pub fn workspace() -> (TempDir, FileStore) {
    let tmp = TempDir::new().expect("failed to create temp dir");
    let store = FileStore::open(tmp.path().join("workspace")).expect("failed to open workspace");
    (tmp, store)
}
