use crate::verdict::{parse_reply, parse_verdict};
use crate::LlmProvider;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use subwatch_core::{required_env, CoreError, LlmError, LlmSettings, Verdict, VerdictKind};
use tracing::{debug, error, warn};

const PROVIDER: &str = "openai";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

pub struct OpenAiProvider {
    http_client: Client,
    api_key: String,
    model: String,
    base_url: String,
    verdict_kind: VerdictKind,
}

impl OpenAiProvider {
    pub fn new(api_key: String, settings: &LlmSettings) -> Result<Self, CoreError> {
        let http_client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            http_client,
            api_key,
            model: settings.model.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            verdict_kind: settings.verdict_kind,
        })
    }

    /// Reads the key from `OPENAI_API_KEY`.
    pub fn from_env(settings: &LlmSettings) -> Result<Self, CoreError> {
        let api_key = required_env("OPENAI_API_KEY")?;
        Self::new(api_key, settings)
    }

    /// Sends one system+user exchange in JSON mode and returns the raw
    /// message content.
    async fn complete_json(&self, system: &str, user: &str) -> Result<String, CoreError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        debug!(model = %self.model, chars = user.len(), "Sending chat completion");
        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("OpenAI request failed: {}", e);
                if e.is_timeout() {
                    CoreError::Llm(LlmError::RequestTimeout {
                        provider: PROVIDER.to_string(),
                    })
                } else {
                    CoreError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<u64>().ok());
            warn!(%status, "OpenAI returned an error status");
            return Err(self.status_error(status, retry_after).into());
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            CoreError::Llm(LlmError::InvalidResponseFormat {
                provider: PROVIDER.to_string(),
                details: e.to_string(),
            })
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                CoreError::Llm(LlmError::EmptyResponse {
                    provider: PROVIDER.to_string(),
                })
            })
    }

    fn status_error(&self, status: StatusCode, retry_after: Option<u64>) -> LlmError {
        let provider = PROVIDER.to_string();
        match status.as_u16() {
            401 => LlmError::InvalidApiKey { provider },
            404 => LlmError::ModelNotAvailable {
                model: self.model.clone(),
            },
            429 => LlmError::RateLimitExceeded {
                provider,
                retry_after: retry_after.unwrap_or(60),
            },
            _ if status.is_server_error() => LlmError::ServiceUnavailable { provider },
            code => LlmError::RequestFailed {
                provider,
                status_code: code,
            },
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn verdict_kind(&self) -> VerdictKind {
        self.verdict_kind
    }

    async fn analyze(&self, text: &str, system_prompt: &str) -> Result<Verdict, CoreError> {
        let content = self.complete_json(system_prompt, text).await?;
        parse_verdict(PROVIDER, &content, self.verdict_kind)
    }

    async fn suggest_reply(&self, text: &str, system_prompt: &str) -> Result<String, CoreError> {
        let content = self.complete_json(system_prompt, text).await?;
        parse_reply(PROVIDER, &content)
    }
}
