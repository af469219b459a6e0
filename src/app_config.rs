use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Application configuration module
///
/// Settings come from an optional JSON file, then environment variables
/// (`LLM_MODEL`, `MAX_INPUT_TOKEN`, ...), then command line flags. The
/// pipeline only ever reads the resulting `Config`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// LLM backend
    #[serde(default)]
    pub provider: LlmProvider,

    /// Model identifier (`LLM_MODEL`)
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL; empty means the provider's public endpoint (`LLM_ENDPOINT`)
    #[serde(default)]
    pub endpoint: String,

    /// Credential (`LLM_API_KEY`)
    #[serde(default)]
    pub api_key: String,

    /// Extra instruction appended to every translation request (`LLM_EXTRA_PROMPT`)
    #[serde(default)]
    pub extra_prompt: String,

    /// Output filename postfix; the target language when unset (`LANGUAGE_POSTFIX`)
    #[serde(default)]
    pub language_postfix: Option<String>,

    /// Source language hint; the model detects it when unset (`SOURCE_LANGUAGE`)
    #[serde(default)]
    pub source_language: Option<String>,

    /// Input token budget per request (`MAX_INPUT_TOKEN`)
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,

    /// Output token budget per request (`MAX_OUTPUT_TOKEN`)
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: usize,

    /// Output size requested from the context extraction pass (`PRE_TRANSLATE_SIZE`)
    #[serde(default = "default_pre_translate_size")]
    pub pre_translate_size: usize,

    /// Fraction of each budget held back for estimator error (`TOKEN_SAFETY_MARGIN`)
    #[serde(default = "default_safety_margin")]
    pub token_safety_margin: f64,

    /// Attempts per chunk (`LLM_RETRY_TIMES`)
    #[serde(default = "default_retry_times")]
    pub retry_times: u32,

    /// Initial backoff in seconds (`LLM_RETRY_DELAY`)
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: f64,

    /// Backoff multiplier (`LLM_RETRY_BACKOFF`)
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: f64,

    /// Per-call timeout in seconds (`LLM_TIMEOUT`)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Sampling temperature (`LLM_TEMPERATURE`)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Dialogue chunks read by the context extraction pass (`EXTRACTION_CHUNKS`)
    #[serde(default = "default_extraction_chunks")]
    pub extraction_chunks: usize,

    /// Chunks translated at once against a frozen glossary (`CONCURRENCY`)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Look the series up in an external catalogue before extraction (`METADATA_LOOKUP`)
    #[serde(default)]
    pub metadata_lookup: bool,

    /// AniList token; setting it also enables lookups (`ANILIST_TOKEN`)
    #[serde(default)]
    pub anilist_token: Option<String>,

    /// Catalogue endpoint; empty means the public AniList API (`METADATA_ENDPOINT`)
    #[serde(default)]
    pub metadata_endpoint: String,

    /// Log level (`LOG_LEVEL`)
    #[serde(default)]
    pub log_level: LogLevel,
}

/// LLM backend type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    // @provider: OpenAI or any compatible server
    #[default]
    OpenAI,
    // @provider: Ollama
    Ollama,
    // @provider: Anthropic
    Anthropic,
}

impl LlmProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::Ollama => "Ollama",
            Self::Anthropic => "Anthropic",
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::OpenAI => "openai",
            Self::Ollama => "ollama",
            Self::Anthropic => "anthropic",
        };
        f.write_str(name)
    }
}

impl FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "anthropic" => Ok(Self::Anthropic),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Log level for the application
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(anyhow!("Invalid log level: {}", s)),
        }
    }
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_max_input_tokens() -> usize {
    500_000
}

fn default_max_output_tokens() -> usize {
    5_000
}

fn default_pre_translate_size() -> usize {
    2_048
}

fn default_safety_margin() -> f64 {
    0.1
}

fn default_retry_times() -> u32 {
    5
}

fn default_retry_delay() -> f64 {
    2.0
}

fn default_retry_backoff() -> f64 {
    2.0
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_temperature() -> f32 {
    0.3
}

fn default_extraction_chunks() -> usize {
    4
}

fn default_concurrency() -> usize {
    1
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: LlmProvider::default(),
            model: default_model(),
            endpoint: String::new(),
            api_key: String::new(),
            extra_prompt: String::new(),
            language_postfix: None,
            source_language: None,
            max_input_tokens: default_max_input_tokens(),
            max_output_tokens: default_max_output_tokens(),
            pre_translate_size: default_pre_translate_size(),
            token_safety_margin: default_safety_margin(),
            retry_times: default_retry_times(),
            retry_delay_secs: default_retry_delay(),
            retry_backoff: default_retry_backoff(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            extraction_chunks: default_extraction_chunks(),
            concurrency: default_concurrency(),
            metadata_lookup: false,
            anilist_token: None,
            metadata_endpoint: String::new(),
            log_level: LogLevel::default(),
        }
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| anyhow!("Invalid value '{}' for {}: {}", value, name, e))
}

impl Config {
    /// Read the JSON file if given, then apply the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to open config file: {}", path.display()))?;
                serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))?
            }
            None => Config::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Override fields from environment-style variables
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(value) = get("LLM_PROVIDER") {
            self.provider = parse_var("LLM_PROVIDER", &value)?;
        }
        if let Some(value) = get("LLM_MODEL") {
            self.model = value;
        }
        if let Some(value) = get("LLM_ENDPOINT") {
            self.endpoint = value;
        }
        if let Some(value) = get("LLM_API_KEY") {
            self.api_key = value;
        } else if self.api_key.is_empty() {
            let fallback = match self.provider {
                LlmProvider::OpenAI => get("OPENAI_API_KEY"),
                LlmProvider::Anthropic => get("ANTHROPIC_API_KEY"),
                LlmProvider::Ollama => None,
            };
            if let Some(value) = fallback {
                self.api_key = value;
            }
        }
        if let Some(value) = lookup("LLM_EXTRA_PROMPT") {
            self.extra_prompt = value;
        }
        if let Some(value) = get("LANGUAGE_POSTFIX") {
            self.language_postfix = Some(value);
        }
        if let Some(value) = get("SOURCE_LANGUAGE") {
            self.source_language = Some(value);
        }
        if let Some(value) = get("MAX_INPUT_TOKEN") {
            self.max_input_tokens = parse_var("MAX_INPUT_TOKEN", &value)?;
        }
        if let Some(value) = get("MAX_OUTPUT_TOKEN") {
            self.max_output_tokens = parse_var("MAX_OUTPUT_TOKEN", &value)?;
        }
        if let Some(value) = get("PRE_TRANSLATE_SIZE") {
            self.pre_translate_size = parse_var("PRE_TRANSLATE_SIZE", &value)?;
        }
        if let Some(value) = get("TOKEN_SAFETY_MARGIN") {
            self.token_safety_margin = parse_var("TOKEN_SAFETY_MARGIN", &value)?;
        }
        if let Some(value) = get("LLM_RETRY_TIMES") {
            self.retry_times = parse_var("LLM_RETRY_TIMES", &value)?;
        }
        if let Some(value) = get("LLM_RETRY_DELAY") {
            self.retry_delay_secs = parse_var("LLM_RETRY_DELAY", &value)?;
        }
        if let Some(value) = get("LLM_RETRY_BACKOFF") {
            self.retry_backoff = parse_var("LLM_RETRY_BACKOFF", &value)?;
        }
        if let Some(value) = get("LLM_TIMEOUT") {
            self.timeout_secs = parse_var("LLM_TIMEOUT", &value)?;
        }
        if let Some(value) = get("LLM_TEMPERATURE") {
            self.temperature = parse_var("LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = get("EXTRACTION_CHUNKS") {
            self.extraction_chunks = parse_var("EXTRACTION_CHUNKS", &value)?;
        }
        if let Some(value) = get("CONCURRENCY") {
            self.concurrency = parse_var("CONCURRENCY", &value)?;
        }
        if let Some(value) = get("METADATA_LOOKUP") {
            self.metadata_lookup = parse_var("METADATA_LOOKUP", &value)?;
        }
        if let Some(value) = get("ANILIST_TOKEN") {
            self.anilist_token = Some(value);
        }
        if let Some(value) = get("METADATA_ENDPOINT") {
            self.metadata_endpoint = value;
        }
        if let Some(value) = get("LOG_LEVEL") {
            self.log_level = parse_var("LOG_LEVEL", &value)?;
        }
        Ok(())
    }

    /// Whether series metadata is looked up before extraction
    pub fn metadata_enabled(&self) -> bool {
        self.metadata_lookup || self.anilist_token.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    /// Postfix used in output filenames for `target_language`
    pub fn postfix_for(&self, target_language: &str) -> String {
        self.language_postfix
            .clone()
            .unwrap_or_else(|| target_language.trim().to_string())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(anyhow!("LLM_MODEL must not be empty"));
        }
        if self.max_input_tokens == 0 || self.max_output_tokens == 0 {
            return Err(anyhow!("MAX_INPUT_TOKEN and MAX_OUTPUT_TOKEN must be positive"));
        }
        if self.pre_translate_size == 0 {
            return Err(anyhow!("PRE_TRANSLATE_SIZE must be positive"));
        }
        if !self.token_safety_margin.is_finite() || !(0.0..0.9).contains(&self.token_safety_margin) {
            return Err(anyhow!(
                "TOKEN_SAFETY_MARGIN must be in [0, 0.9), got {}",
                self.token_safety_margin
            ));
        }
        if self.retry_times == 0 {
            return Err(anyhow!("LLM_RETRY_TIMES must be at least 1"));
        }
        if !self.retry_delay_secs.is_finite() || !self.retry_backoff.is_finite() {
            return Err(anyhow!("LLM_RETRY_DELAY and LLM_RETRY_BACKOFF must be finite numbers"));
        }
        if self.retry_delay_secs < 0.0 || self.retry_backoff < 1.0 {
            return Err(anyhow!("LLM_RETRY_DELAY must be >= 0 and LLM_RETRY_BACKOFF >= 1"));
        }
        if !self.temperature.is_finite() {
            return Err(anyhow!("LLM_TEMPERATURE must be a finite number"));
        }
        if self.timeout_secs == 0 {
            return Err(anyhow!("LLM_TIMEOUT must be positive"));
        }
        if self.concurrency == 0 {
            return Err(anyhow!("CONCURRENCY must be at least 1"));
        }
        if let Some(postfix) = &self.language_postfix {
            if postfix.contains(['/', '\\']) {
                return Err(anyhow!("LANGUAGE_POSTFIX must not contain path separators"));
            }
        }

        // Hosted APIs need a key; a custom OpenAI-compatible endpoint may not
        match self.provider {
            LlmProvider::OpenAI if self.endpoint.is_empty() && self.api_key.is_empty() => {
                Err(anyhow!("An API key is required for the OpenAI provider"))
            }
            LlmProvider::Anthropic if self.api_key.is_empty() => {
                Err(anyhow!("An API key is required for the Anthropic provider"))
            }
            _ => Ok(()),
        }
    }
}
