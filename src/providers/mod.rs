/*!
 * LLM collaborator implementations.
 *
 * The pipeline talks to the model through the narrow [`Provider`] trait:
 * a prompt and system instructions go in, text comes out, failures are
 * typed. Backends:
 * - OpenAI: the public API or any OpenAI-compatible server
 * - Ollama: local LLM server
 * - Anthropic: Messages API
 * - Mock: deterministic stub for tests
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{Config, LlmProvider};
use crate::errors::ProviderError;

pub mod anthropic;
pub mod mock;
pub mod ollama;
pub mod openai;

/// One prompt-completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System instructions
    pub system: String,
    /// User message
    pub prompt: String,
    /// Cap on generated tokens
    pub max_output_tokens: usize,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        CompletionRequest {
            system: String::new(),
            prompt: prompt.into(),
            max_output_tokens: 4096,
            temperature: None,
        }
    }

    /// Set the system prompt
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    /// Set the output cap
    pub fn max_output_tokens(mut self, tokens: usize) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Text returned by a provider, with usage when the backend reports it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Completion {
    pub text: String,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Completion {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Common trait for all LLM providers
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Complete a request using this provider
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError>;
}

/// HTTP client shared by the network backends
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ProviderError::Configuration(format!("Failed to build HTTP client: {}", e)))
}

/// Validate a base URL and append `path`
pub(crate) fn endpoint_url(base: &str, path: &str) -> Result<url::Url, ProviderError> {
    let joined = format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'));
    url::Url::parse(&joined).map_err(|e| ProviderError::Configuration(format!("Invalid endpoint '{}': {}", base, e)))
}

/// Build the provider selected by `config`
pub fn build_provider(config: &Config) -> Result<Arc<dyn Provider>, ProviderError> {
    let provider: Arc<dyn Provider> = match config.provider {
        LlmProvider::OpenAI => Arc::new(openai::OpenAI::new(
            &config.endpoint,
            &config.api_key,
            &config.model,
            config.timeout_secs,
        )?),
        LlmProvider::Ollama => Arc::new(ollama::Ollama::new(&config.endpoint, &config.model, config.timeout_secs)?),
        LlmProvider::Anthropic => Arc::new(anthropic::Anthropic::new(
            &config.endpoint,
            &config.api_key,
            &config.model,
            config.timeout_secs,
        )?),
    };
    Ok(provider)
}
