use async_trait::async_trait;
use log::{debug, error};
use serde::{Deserialize, Serialize};

use super::{Completion, CompletionRequest, Provider, endpoint_url, http_client};
use crate::errors::ProviderError;

const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Anthropic client for interacting with the Messages API
#[derive(Debug)]
pub struct Anthropic {
    /// HTTP client for API requests
    client: reqwest::Client,
    /// Messages endpoint
    url: url::Url,
    /// API key for authentication
    api_key: String,
    /// Model identifier
    model: String,
}

/// Anthropic message request
#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_tokens: usize,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Token usage information
#[derive(Debug, Deserialize)]
struct TokenUsage {
    input_tokens: u64,
    output_tokens: u64,
}

/// Anthropic response
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: TokenUsage,
}

/// Individual content block in an Anthropic response
#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

impl Anthropic {
    /// Create a new Anthropic client; an empty endpoint means the public API
    pub fn new(endpoint: &str, api_key: &str, model: &str, timeout_secs: u64) -> Result<Self, ProviderError> {
        let base = if endpoint.is_empty() { DEFAULT_ENDPOINT } else { endpoint };
        Ok(Anthropic {
            client: http_client(timeout_secs)?,
            url: endpoint_url(base, "v1/messages")?,
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Provider for Anthropic {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let body = AnthropicRequest {
            model: &self.model,
            messages: vec![AnthropicMessage { role: "user", content: &request.prompt }],
            system: (!request.system.is_empty()).then_some(request.system.as_str()),
            temperature: request.temperature,
            max_tokens: request.max_output_tokens,
        };

        let response = self
            .client
            .post(self.url.clone())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Anthropic API error ({}): {}", status, error_text);
            // 529 is Anthropic's "overloaded"
            return Err(ProviderError::from_status(status.as_u16(), error_text));
        }

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Unparseable(format!("Failed to parse Anthropic response: {}", e)))?;

        if parsed.stop_reason.as_deref() == Some("refusal") {
            return Err(ProviderError::SafetyRejected("model refused the request".to_string()));
        }
        let text: String = parsed
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .map(|c| c.text.as_str())
            .collect();
        if text.trim().is_empty() {
            return Err(ProviderError::Unparseable("empty completion".to_string()));
        }
        debug!("Anthropic completion: {} chars, stop reason {:?}", text.len(), parsed.stop_reason);

        Ok(Completion {
            text,
            prompt_tokens: Some(parsed.usage.input_tokens),
            completion_tokens: Some(parsed.usage.output_tokens),
        })
    }
}
