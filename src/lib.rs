/*!
 * # Subglot - context-aware subtitle translation with LLMs
 *
 * A Rust library that translates subtitle tracks with a large language model
 * while keeping names and recurring terms consistent across a series.
 *
 * ## Features
 *
 * - SRT, SSA and ASS parsing with byte-faithful re-serialization
 * - Token-budgeted chunking of cues
 * - A context extraction pass that builds a glossary and character list
 * - Glossary persistence under `.translated/`, shared by every file of a directory
 * - Translation through OpenAI-compatible, Ollama or Anthropic endpoints
 * - Strict validation of model replies with bounded retries
 * - Optional series metadata from AniList to seed the glossary
 *
 * ## Architecture
 *
 * - `app_config`: Configuration management
 * - `subtitle`: Cue model and format adapters
 * - `translation`: The translation core:
 *   - `translation::tokens`: Token estimation and budgets
 *   - `translation::chunker`: Token-bounded chunking
 *   - `translation::glossary`: Glossary and context accumulator
 *   - `translation::store`: Persisted context
 *   - `translation::extraction_pass`: Context extraction stage
 *   - `translation::translation_pass`: Translation stage
 *   - `translation::reassembler`: Output assembly
 *   - `translation::pipeline`: The stages wired together
 * - `providers`: LLM clients and a deterministic mock
 * - `metadata`: External series metadata (AniList)
 * - `file_utils`: File system operations
 * - `app_controller`: Runs over files and directories
 * - `language_utils`: ISO language code utilities
 * - `errors`: Error types
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod app_config;
pub mod app_controller;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod metadata;
pub mod providers;
pub mod subtitle;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::{Controller, RunOptions, RunSummary};
pub use errors::{AppError, ProviderError, SubtitleError, TranslationError};
pub use subtitle::{Cue, SubtitleFormat, Track};
pub use translation::{TranslationContext, TranslationPipeline};
