/*!
 * OpenAI chat completions client. Also serves OpenAI-compatible servers
 * such as LM Studio, vLLM or OpenRouter through a custom endpoint.
 */

use async_trait::async_trait;
use log::{debug, error};
use serde::{Deserialize, Serialize};

use super::{Completion, CompletionRequest, Provider, endpoint_url, http_client};
use crate::errors::ProviderError;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

/// OpenAI client
#[derive(Debug)]
pub struct OpenAI {
    client: reqwest::Client,
    url: url::Url,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

impl OpenAI {
    /// Create a client; an empty endpoint means the public API
    pub fn new(endpoint: &str, api_key: &str, model: &str, timeout_secs: u64) -> Result<Self, ProviderError> {
        let base = if endpoint.is_empty() { DEFAULT_ENDPOINT } else { endpoint };
        Ok(OpenAI {
            client: http_client(timeout_secs)?,
            url: endpoint_url(base, "chat/completions")?,
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Provider for OpenAI {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let mut messages = Vec::with_capacity(2);
        if !request.system.is_empty() {
            messages.push(ChatMessage { role: "system", content: &request.system });
        }
        messages.push(ChatMessage { role: "user", content: &request.prompt });

        let body = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: request.max_output_tokens,
            temperature: request.temperature,
        };

        let mut builder = self.client.post(self.url.clone()).json(&body);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("OpenAI API error ({}): {}", status, error_text);
            return Err(ProviderError::from_status(status.as_u16(), error_text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Unparseable(format!("Failed to parse OpenAI response: {}", e)))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Unparseable("response has no choices".to_string()))?;

        if let Some(refusal) = choice.message.refusal {
            return Err(ProviderError::SafetyRejected(refusal));
        }
        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(ProviderError::SafetyRejected("content filter triggered".to_string()));
        }
        let text = choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::Unparseable("empty completion".to_string()))?;
        debug!("OpenAI completion: {} chars, finish reason {:?}", text.len(), choice.finish_reason);

        Ok(Completion {
            text,
            prompt_tokens: parsed.usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens: parsed.usage.as_ref().map(|u| u.completion_tokens),
        })
    }
}
