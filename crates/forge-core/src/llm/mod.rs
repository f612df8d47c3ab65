//! Language-model capability.
//!
//! The pipeline only ever needs one operation: send a system prompt plus a
//! list of messages and get text back. [`ChatModel`] captures that; the
//! concrete backends are [`OpenAiCompatClient`] (HTTP) and [`DemoModel`]
//! (offline). Failures at this boundary are never retried by the core.

mod demo;
mod openai;

pub use demo::DemoModel;
pub use openai::OpenAiCompatClient;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{Backend, ModelConfig};

/// Role of a chat message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Errors from the model boundary. All of them are fatal to the caller.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model API key not set; export {0}")]
    MissingApiKey(String),

    #[error("request to model endpoint failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("model endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model response contained no message content")]
    EmptyResponse,

    #[error("failed to parse model response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0}")]
    Unavailable(String),
}

/// Synchronous-from-the-caller's-view chat capability.
///
/// Object-safe so pipelines can hold `Arc<dyn ChatModel>` and tests can
/// substitute scripted implementations.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Send `system_prompt` followed by `messages`; return the reply text.
    async fn chat(&self, system_prompt: &str, messages: &[ChatMessage])
    -> Result<String, LlmError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn ChatModel) {}
};

/// Build the backend selected by `config`.
pub fn model_from_config(config: &ModelConfig) -> Result<Arc<dyn ChatModel>, LlmError> {
    match config.backend {
        Backend::Remote => Ok(Arc::new(OpenAiCompatClient::new(config)?)),
        Backend::Demo => Ok(Arc::new(DemoModel)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_serializes_with_lowercase_role() {
        let json = serde_json::to_value(ChatMessage::user("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn demo_backend_needs_no_key() {
        let config = ModelConfig {
            backend: Backend::Demo,
            api_key_env: "FORGE_TEST_SURELY_UNSET_KEY".to_owned(),
            ..ModelConfig::default()
        };
        let model = model_from_config(&config).unwrap();
        assert_eq!(model.name(), "demo");
    }

    #[test]
    fn remote_backend_without_key_fails_fast() {
        let config = ModelConfig {
            api_key_env: "FORGE_TEST_SURELY_UNSET_KEY".to_owned(),
            ..ModelConfig::default()
        };
        let err = model_from_config(&config).err().expect("missing key should fail");
        assert!(matches!(err, LlmError::MissingApiKey(ref var) if var == "FORGE_TEST_SURELY_UNSET_KEY"));
    }
}
