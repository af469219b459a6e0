/*!
 * Metadata extraction stage.
 *
 * Before any cue is translated, the model reads the dialogue (deduplicated,
 * chunked by the input budget) and proposes a title, a synopsis, a
 * character roster and a glossary. Each request sees what earlier requests
 * produced so the context is refined rather than rebuilt.
 *
 * Failure is never fatal: whatever has been gathered when a request fails
 * for good is kept, which may be nothing at all.
 */

use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;

use super::chunker::Chunker;
use super::glossary::{ContextNote, TranslationContext};
use super::prompts::{self, ExtractionPayload, ExtractionReply};
use super::retry::{CancelFlag, RetryError, RetryPolicy};
use super::tokens::{TokenEstimator, estimate_json};
use super::usage::UsageTracker;
use crate::errors::ChunkFailure;
use crate::providers::{CompletionRequest, Provider};
use crate::subtitle::Cue;

/// Settings for the extraction stage
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Target language as shown to the model
    pub target_language: String,
    /// Source language hint
    pub source_language: Option<String>,
    /// Output tokens requested per extraction call
    pub pre_translate_size: usize,
    /// At most this many dialogue chunks are read
    pub max_chunks: usize,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        ExtractionConfig {
            target_language: "English".to_string(),
            source_language: None,
            pre_translate_size: 2048,
            max_chunks: 4,
            temperature: 0.3,
        }
    }
}

/// Builds a [`TranslationContext`] from dialogue
pub struct ExtractionPass {
    provider: Arc<dyn Provider>,
    chunker: Chunker,
    estimator: Arc<dyn TokenEstimator>,
    retry: RetryPolicy,
    usage: Arc<UsageTracker>,
    config: ExtractionConfig,
}

impl ExtractionPass {
    pub fn new(
        provider: Arc<dyn Provider>,
        chunker: Chunker,
        estimator: Arc<dyn TokenEstimator>,
        retry: RetryPolicy,
        usage: Arc<UsageTracker>,
        config: ExtractionConfig,
    ) -> Self {
        ExtractionPass {
            provider,
            chunker,
            estimator,
            retry,
            usage,
            config,
        }
    }

    /// Distinct non-blank lines in first-seen order, renumbered from 1
    pub fn dedup_dialogue<'a>(cues: impl IntoIterator<Item = &'a Cue>) -> Vec<Cue> {
        let mut seen = HashSet::new();
        cues.into_iter()
            .filter(|cue| !cue.is_blank())
            .filter(|cue| seen.insert(cue.text()))
            .enumerate()
            .map(|(i, cue)| Cue::new(i + 1, cue.start_ms, cue.end_ms, &cue.text()))
            .collect()
    }

    /// Extract context from `cues`, starting from `seed`
    pub async fn run<'a>(
        &self,
        cues: impl IntoIterator<Item = &'a Cue>,
        title_hint: Option<&str>,
        seed: TranslationContext,
        cancel: &CancelFlag,
    ) -> TranslationContext {
        let dialogue = Self::dedup_dialogue(cues);
        let mut context = seed;
        if dialogue.is_empty() {
            debug!("No dialogue to extract context from");
            return context;
        }

        // Budget against the seed; a refined context grows, the margin absorbs it
        let context_tokens = estimate_json(self.estimator.as_ref(), &context);
        let chunks = self.chunker.chunk(&dialogue, context_tokens);
        let total = chunks.len();
        let selected = total.min(self.config.max_chunks.max(1));
        info!(
            "Extracting context from {} distinct lines ({} of {} chunks)",
            dialogue.len(),
            selected,
            total
        );

        let system = prompts::extraction_system_prompt(&self.config.target_language, self.config.pre_translate_size);

        for chunk in chunks.iter().take(selected) {
            if cancel.is_cancelled() {
                break;
            }
            let payload = ExtractionPayload {
                target_language: self.config.target_language.clone(),
                source_language: self.config.source_language.clone(),
                title_hint: title_hint.map(str::to_string),
                previous: context.clone(),
                dialogue: chunk.cues.iter().map(Cue::text).collect(),
            };
            let prompt = match serde_json::to_string(&payload) {
                Ok(prompt) => prompt,
                Err(e) => {
                    warn!("Context extraction degraded: cannot encode request: {}", e);
                    break;
                }
            };
            let request = CompletionRequest::new(prompt)
                .system(system.clone())
                .max_output_tokens(self.config.pre_translate_size)
                .temperature(self.config.temperature);

            let label = format!("Context extraction {}/{}", chunk.position + 1, selected);
            let outcome = self
                .retry
                .run(&label, cancel, |_| {
                    let request = request.clone();
                    async move {
                        let completion = self.retry.call(self.provider.as_ref(), request).await.map_err(|e| {
                            self.usage.record_failure();
                            ChunkFailure::from(e)
                        })?;
                        self.usage.record(&completion);
                        prompts::parse_extraction_reply(&completion.text).map_err(|e| {
                            self.usage.record_failure();
                            ChunkFailure::from(e)
                        })
                    }
                })
                .await;

            match outcome {
                Ok(reply) => {
                    let update = Self::reply_to_context(reply);
                    debug!(
                        "{}: {} characters, {} glossary entries",
                        label,
                        update.note.characters.len(),
                        update.glossary.len()
                    );
                    context.merge(update);
                }
                Err(RetryError::Cancelled) => break,
                Err(RetryError::Exhausted { attempts, last }) => {
                    warn!(
                        "Context extraction degraded after {} attempts ({}); continuing with {} glossary entries",
                        attempts,
                        last,
                        context.glossary.len()
                    );
                    break;
                }
            }
        }

        context
    }

    fn reply_to_context(reply: ExtractionReply) -> TranslationContext {
        let mut note = ContextNote {
            title: reply.title.filter(|t| !t.trim().is_empty()),
            synopsis: reply.synopsis.filter(|s| !s.trim().is_empty()),
            style_notes: reply.style_notes,
            ..ContextNote::default()
        };
        for character in reply.characters {
            note.add_character(&character.source, &character.target);
        }

        // Names the model filed under `glossary` still belong to the roster
        let mut context = TranslationContext::new(note, Default::default());
        context.absorb(reply.glossary);
        context
    }
}
