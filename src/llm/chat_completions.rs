//! OpenAI Chat Completions API client.
//!
//! Non-streaming: agent selection wants one short JSON answer, not deltas.

use std::time::Duration;

use reqwest::StatusCode;

use crate::domain::matching::UpstreamError;

use super::{CompletionClient, LlmSettings, Message, Provider};

/// Longest upstream error body kept for diagnostics.
const MAX_ERROR_BODY: usize = 512;

/// Client for the OpenAI Chat Completions API and compatible endpoints.
#[derive(Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    settings: LlmSettings,
    provider: Provider,
}

impl std::fmt::Debug for ChatCompletionsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsClient")
            .field("settings", &self.settings)
            .field("provider", &self.provider)
            .finish()
    }
}

impl ChatCompletionsClient {
    /// Create a new client with the given settings.
    pub fn new(settings: LlmSettings) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        let provider = settings.provider();

        Ok(Self {
            http,
            settings,
            provider,
        })
    }
}

#[async_trait::async_trait]
impl CompletionClient for ChatCompletionsClient {
    async fn complete(
        &self,
        messages: Vec<Message>,
        credential: &str,
    ) -> Result<String, UpstreamError> {
        if credential.trim().is_empty() {
            return Err(UpstreamError::MissingCredential);
        }

        let url = self.provider.build_chat_url(&self.settings.base_url);
        let body = serde_json::json!({
            "model": self.settings.model,
            "stream": false,
            "temperature": 0,
            "messages": messages,
        });

        let mut rb = self.http.post(&url).json(&body);
        rb = if self.provider.uses_api_key_header() {
            rb.header("api-key", credential)
        } else {
            rb.bearer_auth(credential)
        };

        let resp = rb.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(UpstreamError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let v: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| UpstreamError::Parse(e.to_string()))?;
        v["choices"][0]["message"]["content"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| UpstreamError::Parse("missing choices[0].message.content".to_string()))
    }
}
