//! Hosted LLM access.
//!
//! Agent selection needs exactly one non-streaming completion per request,
//! so this module exposes a small [`CompletionClient`] trait with a single
//! OpenAI-compatible Chat Completions implementation. The credential is
//! passed per call because it lives in the user's key store, not in the
//! process configuration.
//!
//! # Drivers
//!
//! - [`ChatCompletionsClient`]: `/v1/chat/completions` (or the provider's
//!   equivalent, see [`Provider::build_chat_url`])

pub mod chat_completions;
pub mod provider;

pub use chat_completions::ChatCompletionsClient;
pub use provider::Provider;

use crate::domain::matching::UpstreamError;
use serde::Deserialize;

/// LLM connection and model settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Whether agent selection may be delegated to the hosted model when the
    /// user has saved a credential.
    pub enabled: bool,
    /// Base URL for the LLM API (e.g., `https://api.openai.com`).
    pub base_url: String,
    /// Model identifier (e.g., `gemini-2.0-flash`, `gpt-4o-mini`).
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Azure deployment name (required for Azure `OpenAI`).
    pub deployment_name: Option<String>,
    /// Azure API version (required for Azure `OpenAI`).
    pub api_version: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            model: "gemini-2.0-flash".to_string(),
            timeout_secs: 30,
            deployment_name: None,
            api_version: None,
        }
    }
}

impl LlmSettings {
    /// Provider detected from the base URL, with Azure deployment details
    /// filled in when configured.
    pub fn provider(&self) -> Provider {
        let provider = Provider::detect_from_url(&self.base_url);
        match (&provider, &self.deployment_name) {
            (Provider::AzureOpenAI { .. }, Some(deployment)) => Provider::AzureOpenAI {
                deployment_name: deployment.clone(),
                api_version: self
                    .api_version
                    .clone()
                    .unwrap_or_else(|| "2024-08-01-preview".to_string()),
            },
            _ => provider,
        }
    }
}

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System prompt.
    System,
    /// User message.
    User,
    /// Assistant response.
    Assistant,
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// A hosted model that answers one prompt with one text completion.
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync + std::fmt::Debug {
    /// Returns the assistant's text content.
    async fn complete(
        &self,
        messages: Vec<Message>,
        credential: &str,
    ) -> Result<String, UpstreamError>;
}
