use async_trait::async_trait;
use log::{debug, error};
use serde::{Deserialize, Serialize};

use super::{Completion, CompletionRequest, Provider, endpoint_url, http_client};
use crate::errors::ProviderError;

/// Default local server
const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Ollama client for the `/api/chat` endpoint
#[derive(Debug)]
pub struct Ollama {
    /// HTTP client for API requests
    client: reqwest::Client,
    /// Chat endpoint
    url: url::Url,
    /// Model tag, e.g. `llama3.2:3b`
    model: String,
}

/// Chat request
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    /// Ask the server to constrain output to JSON
    format: &'a str,
    options: GenerationOptions,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct GenerationOptions {
    /// Maximum number of tokens to generate
    num_predict: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Chat response
#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

impl Ollama {
    /// Create a client; an empty endpoint means `http://localhost:11434`
    pub fn new(endpoint: &str, model: &str, timeout_secs: u64) -> Result<Self, ProviderError> {
        let base = if endpoint.is_empty() { DEFAULT_ENDPOINT } else { endpoint };
        Ok(Ollama {
            client: http_client(timeout_secs)?,
            url: endpoint_url(base, "api/chat")?,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Provider for Ollama {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let mut messages = Vec::with_capacity(2);
        if !request.system.is_empty() {
            messages.push(ChatMessage { role: "system".to_string(), content: request.system });
        }
        messages.push(ChatMessage { role: "user".to_string(), content: request.prompt });

        let body = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            format: "json",
            options: GenerationOptions {
                num_predict: request.max_output_tokens,
                temperature: request.temperature,
            },
        };

        let response = self.client.post(self.url.clone()).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Ollama API error ({}): {}", status, error_text);
            return Err(ProviderError::from_status(status.as_u16(), error_text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Unparseable(format!("Failed to parse Ollama response: {}", e)))?;
        if parsed.message.content.trim().is_empty() {
            return Err(ProviderError::Unparseable("empty completion".to_string()));
        }
        debug!("Ollama completion: {} chars", parsed.message.content.len());

        Ok(Completion {
            text: parsed.message.content,
            prompt_tokens: parsed.prompt_eval_count,
            completion_tokens: parsed.eval_count,
        })
    }
}
