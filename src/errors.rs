/*!
 * Error types for the subglot pipeline.
 *
 * Each stage owns a `thiserror` enum. Subtitle and translation errors are
 * fatal for the file being processed; persistence errors are logged and
 * the pipeline continues with an empty context.
 */

use thiserror::Error;

/// Failure reported by an LLM collaborator.
///
/// Every variant is treated as retryable by the translation stage; the kind is
/// surfaced to the caller once the retry budget is spent.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The service asked us to slow down
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// No completion arrived within the configured timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The completion was refused by a content or safety filter
    #[error("Completion rejected by safety filter: {0}")]
    SafetyRejected(String),

    /// The completion could not be decoded
    #[error("Unparseable completion: {0}")]
    Unparseable(String),

    /// Connection reset, DNS failure, 5xx and the like
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    Api {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// The provider is not usable as configured (missing key, bad endpoint)
    #[error("Provider configuration error: {0}")]
    Configuration(String),
}

impl ProviderError {
    /// Short label used in logs and retry reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited(_) => "rate-limited",
            Self::Timeout(_) => "timeout",
            Self::SafetyRejected(_) => "safety-rejected",
            Self::Unparseable(_) => "unparseable",
            Self::TransientNetwork(_) => "transient-network",
            Self::Api { .. } => "api",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Map an HTTP status and body to the closest failure kind
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status_code {
            429 => Self::RateLimited(message),
            408 | 504 => Self::Timeout(message),
            500..=599 => Self::TransientNetwork(format!("HTTP {}: {}", status_code, message)),
            _ => Self::Api { status_code, message },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else if error.is_decode() {
            Self::Unparseable(error.to_string())
        } else if let Some(status) = error.status() {
            Self::from_status(status.as_u16(), error.to_string())
        } else {
            Self::TransientNetwork(error.to_string())
        }
    }
}

/// Errors raised while reading or writing subtitle files
#[derive(Error, Debug)]
pub enum SubtitleError {
    /// Malformed input subtitle
    #[error("Parse error at line {line}: {message}")]
    Parse {
        /// 1-based line number in the source file
        line: usize,
        /// What went wrong
        message: String,
    },

    /// The file extension does not name a supported format
    #[error("Unsupported subtitle format: {0}")]
    UnsupportedFormat(String),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a chunk response was rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationFailure {
    /// The response did not have the expected structure
    #[error("response structure is unparseable: {0}")]
    Unparseable(String),

    /// A requested cue is absent from the response
    #[error("cue {0} is missing from the response")]
    MissingIndex(usize),

    /// A cue appears more than once in the response
    #[error("cue {0} appears more than once in the response")]
    DuplicateIndex(usize),

    /// The response mentions a cue that was never requested
    #[error("cue {0} was not part of the request")]
    UnexpectedIndex(usize),

    /// A cue came back with blank text
    #[error("cue {0} has empty translated text")]
    EmptyText(usize),
}

/// Last failure seen by a chunk before its retries ran out
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChunkFailure {
    /// The collaborator call itself failed
    #[error("collaborator error ({}): {0}", .0.kind())]
    Collaborator(#[from] ProviderError),

    /// The collaborator answered but the answer was rejected
    #[error("chunk validation failure: {0}")]
    Validation(#[from] ValidationFailure),
}

/// Errors that can occur during translation
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Token estimation cannot produce a usable budget
    #[error("Token estimation error: {0}")]
    Estimation(String),

    /// A chunk failed on every attempt
    #[error("Chunk {chunk} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// 0-based chunk position
        chunk: usize,
        /// Attempts made
        attempts: u32,
        /// Failure of the final attempt
        #[source]
        last: ChunkFailure,
    },

    /// Translated cues do not line up with the source track
    #[error("Reassembly mismatch: {0}")]
    ReassemblyMismatch(String),

    /// The run was aborted before this file finished
    #[error("Translation cancelled")]
    Cancelled,

    /// Error with subtitle processing
    #[error("Subtitle error: {0}")]
    Subtitle(#[from] SubtitleError),
}

/// Errors from the persisted context store. Never fatal.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Reading or writing the store failed
    #[error("Context store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored document could not be encoded or decoded
    #[error("Context store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from subtitle processing
    #[error("Subtitle error: {0}")]
    Subtitle(#[from] SubtitleError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
