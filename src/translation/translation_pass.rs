/*!
 * Translation stage.
 *
 * Chunks are translated as an ordered fold over a [`TranslationContext`]:
 * every request carries the context as it stands after the previous chunk,
 * and the terms a reply flags are merged before the next request is built.
 *
 * With a concurrency above one, the context is frozen for the duration of
 * the run instead, chunks are translated in parallel against that snapshot,
 * and flagged terms are merged in chunk order once every chunk succeeded.
 *
 * A reply is accepted only when it covers every requested cue exactly once
 * with non-empty text. Anything else is retried as a whole; when retries
 * run out the error propagates and nothing of the track is emitted.
 */

use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use log::{debug, info};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use super::chunker::Chunk;
use super::glossary::{DiscoveredTerm, TranslationContext};
use super::prompts::{self, CuePayload, TranslationPayload, TranslationReply};
use super::reassembler::ChunkTranslation;
use super::retry::{CancelFlag, RetryError, RetryPolicy};
use super::usage::UsageTracker;
use crate::errors::{ChunkFailure, TranslationError, ValidationFailure};
use crate::providers::{CompletionRequest, Provider};

/// Settings for the translation stage
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    /// Target language as shown to the model
    pub target_language: String,
    /// Source language hint
    pub source_language: Option<String>,
    /// Appended to the system prompt
    pub extra_prompt: String,
    /// Output cap per request
    pub max_output_tokens: usize,
    /// Sampling temperature
    pub temperature: f32,
    /// Chunks in flight at once; 1 keeps the context live between chunks
    pub concurrency: usize,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        TranslationConfig {
            target_language: "English".to_string(),
            source_language: None,
            extra_prompt: String::new(),
            max_output_tokens: 5000,
            temperature: 0.3,
            concurrency: 1,
        }
    }
}

/// Result of one chunk, before its terms are merged
#[derive(Debug, Clone)]
struct ChunkOutcome {
    translation: ChunkTranslation,
    new_terms: Vec<DiscoveredTerm>,
}

/// Drives the collaborator over chunks
pub struct TranslationPass {
    provider: Arc<dyn Provider>,
    retry: RetryPolicy,
    usage: Arc<UsageTracker>,
    config: TranslationConfig,
    system_prompt: String,
}

impl TranslationPass {
    pub fn new(provider: Arc<dyn Provider>, retry: RetryPolicy, usage: Arc<UsageTracker>, config: TranslationConfig) -> Self {
        let system_prompt = prompts::translation_system_prompt(&config.target_language, &config.extra_prompt);
        TranslationPass {
            provider,
            retry,
            usage,
            config,
            system_prompt,
        }
    }

    /// Translate `chunks` in order, updating `context` with flagged terms.
    /// `source_language` overrides the configured hint for this track.
    ///
    /// Returns one [`ChunkTranslation`] per chunk, in chunk order.
    pub async fn translate(
        &self,
        chunks: &[Chunk],
        source_language: Option<&str>,
        context: &mut TranslationContext,
        cancel: &CancelFlag,
        progress: &ProgressBar,
    ) -> Result<Vec<ChunkTranslation>, TranslationError> {
        let source_language = source_language.or(self.config.source_language.as_deref());
        if self.config.concurrency > 1 && chunks.len() > 1 {
            self.translate_frozen(chunks, source_language, context, cancel, progress).await
        } else {
            self.translate_sequential(chunks, source_language, context, cancel, progress).await
        }
    }

    async fn translate_sequential(
        &self,
        chunks: &[Chunk],
        source_language: Option<&str>,
        context: &mut TranslationContext,
        cancel: &CancelFlag,
        progress: &ProgressBar,
    ) -> Result<Vec<ChunkTranslation>, TranslationError> {
        let mut results = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if cancel.is_cancelled() {
                return Err(TranslationError::Cancelled);
            }
            let outcome = self.translate_chunk(chunk, source_language, context, cancel).await?;
            let merged = context.absorb(outcome.new_terms);
            if merged > 0 {
                debug!("Chunk {}: merged {} new terms", chunk.position + 1, merged);
            }
            results.push(outcome.translation);
            progress.inc(1);
        }
        Ok(results)
    }

    async fn translate_frozen(
        &self,
        chunks: &[Chunk],
        source_language: Option<&str>,
        context: &mut TranslationContext,
        cancel: &CancelFlag,
        progress: &ProgressBar,
    ) -> Result<Vec<ChunkTranslation>, TranslationError> {
        info!(
            "Translating {} chunks with up to {} in flight against a frozen glossary",
            chunks.len(),
            self.config.concurrency
        );
        let frozen = context.clone();
        let frozen = &frozen;

        let mut outcomes = stream::iter(chunks)
            .map(|chunk| async move {
                if cancel.is_cancelled() {
                    return Err(TranslationError::Cancelled);
                }
                self.translate_chunk(chunk, source_language, frozen, cancel).await
            })
            .buffered(self.config.concurrency);

        let mut results = Vec::with_capacity(chunks.len());
        let mut new_terms = Vec::new();
        while let Some(outcome) = outcomes.next().await {
            // Returning early drops the stream and the chunks still in flight
            let outcome = outcome?;
            new_terms.push(outcome.new_terms);
            results.push(outcome.translation);
            progress.inc(1);
        }

        for terms in new_terms {
            context.absorb(terms);
        }
        Ok(results)
    }

    /// Translate one chunk against `context`, retrying as a whole
    async fn translate_chunk(
        &self,
        chunk: &Chunk,
        source_language: Option<&str>,
        context: &TranslationContext,
        cancel: &CancelFlag,
    ) -> Result<ChunkOutcome, TranslationError> {
        let requested: Vec<CuePayload> = chunk
            .translatable()
            .map(|cue| CuePayload { id: cue.index, text: cue.text() })
            .collect();

        if requested.is_empty() {
            debug!("Chunk {} has no text to translate", chunk.position + 1);
            return Ok(ChunkOutcome {
                translation: ChunkTranslation {
                    position: chunk.position,
                    cues: chunk.cues.iter().map(|cue| (cue.index, cue.text())).collect(),
                },
                new_terms: Vec::new(),
            });
        }

        let ids: Vec<usize> = requested.iter().map(|c| c.id).collect();
        let payload = TranslationPayload::new(
            &self.config.target_language,
            source_language,
            context,
            requested,
        );
        let prompt = serde_json::to_string(&payload)
            .map_err(|e| TranslationError::Estimation(format!("cannot encode chunk {}: {}", chunk.position + 1, e)))?;
        let request = CompletionRequest::new(prompt)
            .system(self.system_prompt.clone())
            .max_output_tokens(self.config.max_output_tokens)
            .temperature(self.config.temperature);

        let label = format!("Chunk {} (cues {}..={})", chunk.position + 1, ids[0], ids[ids.len() - 1]);
        let outcome = self
            .retry
            .run(&label, cancel, |_| {
                let request = request.clone();
                let ids = &ids;
                async move {
                    let completion = self.retry.call(self.provider.as_ref(), request).await.map_err(|e| {
                        self.usage.record_failure();
                        ChunkFailure::from(e)
                    })?;
                    self.usage.record(&completion);
                    let reply = prompts::parse_translation_reply(&completion.text)
                        .and_then(|reply| validate_reply(ids, reply))
                        .map_err(|e| {
                            self.usage.record_failure();
                            ChunkFailure::from(e)
                        })?;
                    Ok(reply)
                }
            })
            .await;

        let (mut translated, new_terms) = match outcome {
            Ok(validated) => validated,
            Err(RetryError::Cancelled) => return Err(TranslationError::Cancelled),
            Err(RetryError::Exhausted { attempts, last }) => {
                return Err(TranslationError::RetriesExhausted {
                    chunk: chunk.position,
                    attempts,
                    last,
                });
            }
        };

        let cues = chunk
            .cues
            .iter()
            .map(|cue| {
                let text = translated.remove(&cue.index).unwrap_or_else(|| cue.text());
                (cue.index, text)
            })
            .collect();

        Ok(ChunkOutcome {
            translation: ChunkTranslation {
                position: chunk.position,
                cues,
            },
            new_terms,
        })
    }
}

/// Check that `reply` covers `requested` exactly once each with non-empty
/// text, returning the texts keyed by cue index
pub fn validate_reply(
    requested: &[usize],
    reply: TranslationReply,
) -> Result<(BTreeMap<usize, String>, Vec<DiscoveredTerm>), ValidationFailure> {
    let wanted: HashSet<usize> = requested.iter().copied().collect();
    let mut texts = BTreeMap::new();

    for cue in reply.translations {
        if !wanted.contains(&cue.id) {
            return Err(ValidationFailure::UnexpectedIndex(cue.id));
        }
        if cue.text.trim().is_empty() {
            return Err(ValidationFailure::EmptyText(cue.id));
        }
        if texts.insert(cue.id, cue.text).is_some() {
            return Err(ValidationFailure::DuplicateIndex(cue.id));
        }
    }

    if let Some(missing) = requested.iter().find(|id| !texts.contains_key(id)) {
        return Err(ValidationFailure::MissingIndex(*missing));
    }

    Ok((texts, reply.new_terms))
}
