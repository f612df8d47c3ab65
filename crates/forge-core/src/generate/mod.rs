//! Generation protocol engine.
//!
//! One generation unit is a (task, file) pair. The engine asks the model for
//! a `{"path", "content_b64"}` object and drives the reply through an
//! explicit state machine:
//!
//! ```text
//! Request ──► Validate ──ok──► Decode ──► write
//!    ▲           │
//!    └─ < 3 ─────┤ invalid
//!                └─ == 3 ──► Repair ──ok──► Decode
//!                               └─ invalid ──► GenerationFailedError
//! ```
//!
//! Model and workspace errors are never retried.

pub mod payload;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::llm::{ChatMessage, ChatModel, LlmError};
use crate::plan::{Task, normalize_path};
use crate::workspace::{FileStore, WorkspaceError};

use payload::{CONTENT_KEY, PATH_KEY, decode_text, extract_json_candidate, is_binary_path, parse_object};

/// Validation failures tolerated before falling back to a repair call.
pub const MAX_VALIDATION_ATTEMPTS: u32 = 3;

/// System prompt for code generation requests.
pub const CODER_SYSTEM_PROMPT: &str = "\
You are a senior software engineer acting as the coder of a project generator.
You receive one JSON request describing a task and ONE target file.
Respond with EXACTLY ONE JSON object and nothing else:
{\"path\": \"<file path relative to project_root>\", \"content_b64\": \"<file content, Base64>\"}
Rules:
- Generate exactly one file per request.
- \"path\" must NOT start with the project_root directory.
- \"content_b64\" is the complete file content encoded as standard Base64 on a single line.
- No explanations, no Markdown, no code fences.";

/// System prompt for the single repair call.
pub const REPAIR_SYSTEM_PROMPT: &str = "Fix this JSON. Output JSON only, no commentary:";

/// Errors that abort generation of a file.
#[derive(Debug, Error)]
pub enum GenerationFailedError {
    #[error(
        "no valid JSON for {file} after {attempts} attempts (repair attempted: {repaired})\nlast model output:\n{last_response}"
    )]
    InvalidJson {
        file: String,
        attempts: u32,
        repaired: bool,
        last_response: String,
    },

    #[error("payload for {file} has no \"path\" string")]
    MissingPath { file: String },

    #[error("payload for {file} has no \"content_b64\" string")]
    MissingContent { file: String },

    #[error("payload for {file} carries invalid Base64 content: {source}")]
    InvalidBase64 {
        file: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error(transparent)]
    Model(#[from] LlmError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

/// The request sent to the model for one generation unit.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GenerationRequest<'a> {
    pub project_root: &'a str,
    pub file_path: &'a str,
    pub task_id: i64,
    pub task_name: &'a str,
    pub task_description: &'a str,
}

impl<'a> GenerationRequest<'a> {
    pub fn new(task: &'a Task, file_path: &'a str, project_root: &'a str) -> Self {
        Self {
            project_root,
            file_path,
            task_id: task.id,
            task_name: &task.name,
            task_description: &task.description,
        }
    }

    pub fn to_json(&self) -> String {
        // A struct of strings and integers always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Protocol state for one generation unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Send a fresh request; `failures` validations have failed so far.
    Request { failures: u32 },
    /// Extract and validate `response`.
    Validate { failures: u32, response: String },
    /// Ask the model to fix `candidate`.
    Repair { candidate: String },
    /// Decode a validated payload.
    Decode {
        payload: Map<String, Value>,
        repaired: bool,
    },
}

impl Step {
    /// Transition after a failed validation. `failures` already counts the
    /// failure just observed.
    pub fn after_invalid(failures: u32, best_candidate: &str) -> Step {
        if failures < MAX_VALIDATION_ATTEMPTS {
            Step::Request { failures }
        } else {
            Step::Repair {
                candidate: best_candidate.to_owned(),
            }
        }
    }
}

/// Record of one materialized file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub task_id: i64,
    /// The file the task asked for.
    pub requested: String,
    /// Workspace-relative path actually written (`project_root/declared`).
    pub path: String,
    /// Absolute location on disk.
    pub written: PathBuf,
    /// Model calls spent, including the repair call.
    pub model_calls: u32,
    pub repaired: bool,
    /// True for binary files replaced by an empty placeholder.
    pub placeholder: bool,
}

/// Drives the generation protocol against a model and a file store.
#[derive(Clone)]
pub struct GenerationEngine {
    model: Arc<dyn ChatModel>,
    store: FileStore,
}

impl std::fmt::Debug for GenerationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationEngine")
            .field("model", &self.model.name())
            .field("root", &self.store.root())
            .finish()
    }
}

impl GenerationEngine {
    pub fn new(model: Arc<dyn ChatModel>, store: FileStore) -> Self {
        Self { model, store }
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// Generate `file_path` for `task` and write it under `project_root`.
    pub async fn generate_one(
        &self,
        task: &Task,
        file_path: &str,
        project_root: &str,
    ) -> Result<GeneratedFile, GenerationFailedError> {
        if is_binary_path(file_path) {
            let relative = normalize_path(project_root, file_path);
            warn!(task_id = task.id, file = %relative, "binary file; writing empty placeholder");
            let target = Path::new(project_root).join(&relative);
            let written = self.store.write(&target, b"")?;
            return Ok(GeneratedFile {
                task_id: task.id,
                requested: file_path.to_owned(),
                path: target.display().to_string(),
                written,
                model_calls: 0,
                repaired: false,
                placeholder: true,
            });
        }

        let request = GenerationRequest::new(task, file_path, project_root).to_json();
        let mut model_calls = 0u32;
        let mut best_candidate = String::new();
        let mut step = Step::Request { failures: 0 };

        let (object, repaired) = loop {
            step = match step {
                Step::Request { failures } => {
                    model_calls += 1;
                    let response = self
                        .model
                        .chat(CODER_SYSTEM_PROMPT, &[ChatMessage::user(request.as_str())])
                        .await?;
                    debug!(file = file_path, chars = response.len(), "model reply received");
                    Step::Validate { failures, response }
                }
                Step::Validate { failures, response } => {
                    let candidate = extract_json_candidate(&response);
                    if let Some(object) = parse_object(&candidate) {
                        Step::Decode {
                            payload: object,
                            repaired: false,
                        }
                    } else {
                        let failures = failures + 1;
                        warn!(
                            task_id = task.id,
                            file = file_path,
                            attempt = failures,
                            "model reply is not a JSON object"
                        );
                        best_candidate = best_available(candidate, &response, best_candidate);
                        Step::after_invalid(failures, &best_candidate)
                    }
                }
                Step::Repair { candidate } => {
                    warn!(task_id = task.id, file = file_path, "attempting JSON repair");
                    model_calls += 1;
                    let fixed = self
                        .model
                        .chat(REPAIR_SYSTEM_PROMPT, &[ChatMessage::user(candidate)])
                        .await?;
                    match parse_object(&extract_json_candidate(&fixed)) {
                        Some(object) => Step::Decode {
                            payload: object,
                            repaired: true,
                        },
                        None => {
                            return Err(GenerationFailedError::InvalidJson {
                                file: file_path.to_owned(),
                                attempts: MAX_VALIDATION_ATTEMPTS,
                                repaired: true,
                                last_response: fixed,
                            });
                        }
                    }
                }
                Step::Decode { payload, repaired } => break (payload, repaired),
            };
        };

        let declared = object
            .get(PATH_KEY)
            .and_then(Value::as_str)
            .map(|p| normalize_path(project_root, p.trim()))
            .filter(|p| !p.is_empty())
            .ok_or_else(|| GenerationFailedError::MissingPath {
                file: file_path.to_owned(),
            })?;
        let encoded = object
            .get(CONTENT_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| GenerationFailedError::MissingContent {
                file: file_path.to_owned(),
            })?;
        let content = decode_text(encoded).map_err(|source| GenerationFailedError::InvalidBase64 {
            file: file_path.to_owned(),
            source,
        })?;

        if declared != normalize_path(project_root, file_path) {
            warn!(requested = file_path, declared = %declared, "model declared a different path");
        }

        let target = Path::new(project_root).join(&declared);
        let written = self.store.write(&target, &content)?;
        info!(
            task_id = task.id,
            file = %target.display(),
            bytes = content.len(),
            model_calls,
            repaired,
            "file generated"
        );

        Ok(GeneratedFile {
            task_id: task.id,
            requested: file_path.to_owned(),
            path: target.display().to_string(),
            written,
            model_calls,
            repaired,
            placeholder: false,
        })
    }
}

/// The text to hand the repair call: the newest non-empty candidate, else
/// the newest raw reply.
fn best_available(candidate: String, response: &str, previous: String) -> String {
    if !candidate.is_empty() {
        return candidate;
    }
    if previous.is_empty() || !looks_like_candidate(&previous) {
        return response.trim().to_owned();
    }
    previous
}

fn looks_like_candidate(text: &str) -> bool {
    text.starts_with('{') && text.ends_with('}')
}
