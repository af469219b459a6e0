/*!
 * Tests for the error taxonomy
 */

use std::error::Error;
use subglot::errors::{AppError, ChunkFailure, ProviderError, SubtitleError, TranslationError, ValidationFailure};

/// HTTP statuses map onto collaborator failure kinds
#[test]
fn test_providerError_fromStatus_shouldMapKinds() {
    assert_eq!(ProviderError::from_status(429, "slow down").kind(), "rate-limited");
    assert_eq!(ProviderError::from_status(408, "late").kind(), "timeout");
    assert_eq!(ProviderError::from_status(503, "busy").kind(), "transient-network");
    assert_eq!(ProviderError::from_status(400, "bad request").kind(), "api");
}

/// Exhausted retries expose the last failure as their source
#[test]
fn test_translationError_retriesExhausted_shouldCarryLastFailure() {
    let error = TranslationError::RetriesExhausted {
        chunk: 2,
        attempts: 5,
        last: ChunkFailure::Validation(ValidationFailure::MissingIndex(17)),
    };

    let message = error.to_string();
    assert!(message.contains("Chunk 2"));
    assert!(message.contains("5 attempts"));
    let source = error.source().expect("should have a source");
    assert!(source.to_string().contains("cue 17"));
}

/// Parse errors report the offending line
#[test]
fn test_subtitleError_parse_shouldIncludeLine() {
    let error = SubtitleError::Parse {
        line: 42,
        message: "invalid timestamp".to_string(),
    };
    assert_eq!(error.to_string(), "Parse error at line 42: invalid timestamp");
}

/// Stage errors convert into the application error
#[test]
fn test_appError_from_shouldWrapStageErrors() {
    let app: AppError = TranslationError::Cancelled.into();
    assert!(matches!(app, AppError::Translation(TranslationError::Cancelled)));

    let app: AppError = ProviderError::Timeout("120s".to_string()).into();
    assert!(app.to_string().contains("timed out"));
}
