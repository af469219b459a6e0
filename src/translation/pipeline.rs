/*!
 * Per-track orchestration: chunk, extract context, translate, reassemble.
 */

use indicatif::ProgressBar;
use log::{debug, info};
use std::sync::Arc;

use super::chunker::{Chunker, DEFAULT_REQUEST_OVERHEAD};
use super::extraction_pass::{ExtractionConfig, ExtractionPass};
use super::glossary::TranslationContext;
use super::reassembler;
use super::retry::{CancelFlag, RetryPolicy};
use super::tokens::{TokenBudget, TokenEstimator, estimate_json};
use super::translation_pass::{TranslationConfig, TranslationPass};
use super::usage::UsageTracker;
use crate::app_config::Config;
use crate::errors::TranslationError;
use crate::language_utils;
use crate::providers::Provider;
use crate::subtitle::{Cue, Track};

/// Everything the pipeline needs to know about one run
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Target language as shown to the model
    pub target_language: String,
    pub source_language: Option<String>,
    pub extra_prompt: String,
    pub max_input_tokens: usize,
    pub max_output_tokens: usize,
    pub pre_translate_size: usize,
    pub safety_margin: f64,
    /// Tokens charged per request for instructions
    pub request_overhead: usize,
    pub extraction_chunks: usize,
    pub temperature: f32,
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default(), "en")
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config, target_language: &str) -> Self {
        PipelineSettings {
            target_language: language_utils::display_name(target_language),
            source_language: config.source_language.as_deref().map(language_utils::display_name),
            extra_prompt: config.extra_prompt.clone(),
            max_input_tokens: config.max_input_tokens,
            max_output_tokens: config.max_output_tokens,
            pre_translate_size: config.pre_translate_size,
            safety_margin: config.token_safety_margin,
            request_overhead: DEFAULT_REQUEST_OVERHEAD,
            extraction_chunks: config.extraction_chunks,
            temperature: config.temperature,
            concurrency: config.concurrency,
            retry: RetryPolicy::from(config),
        }
    }
}

/// Turns a parsed track into a translated track
pub struct TranslationPipeline {
    chunker: Chunker,
    estimator: Arc<dyn TokenEstimator>,
    extraction: ExtractionPass,
    translation: TranslationPass,
}

impl TranslationPipeline {
    pub fn new(
        provider: Arc<dyn Provider>,
        estimator: Arc<dyn TokenEstimator>,
        usage: Arc<UsageTracker>,
        settings: PipelineSettings,
    ) -> Result<Self, TranslationError> {
        let budget = TokenBudget::new(settings.max_input_tokens, settings.max_output_tokens, settings.safety_margin)?;
        let chunker = Chunker::new(estimator.clone(), budget).with_request_overhead(settings.request_overhead);

        let extraction_budget = TokenBudget::input_only(settings.max_input_tokens, settings.safety_margin)?;
        let extraction_chunker =
            Chunker::new(estimator.clone(), extraction_budget).with_request_overhead(settings.request_overhead);

        let extraction = ExtractionPass::new(
            provider.clone(),
            extraction_chunker,
            estimator.clone(),
            settings.retry.clone(),
            usage.clone(),
            ExtractionConfig {
                target_language: settings.target_language.clone(),
                source_language: settings.source_language.clone(),
                pre_translate_size: settings.pre_translate_size,
                max_chunks: settings.extraction_chunks,
                temperature: settings.temperature,
            },
        );
        let translation = TranslationPass::new(
            provider,
            settings.retry.clone(),
            usage,
            TranslationConfig {
                target_language: settings.target_language.clone(),
                source_language: settings.source_language.clone(),
                extra_prompt: settings.extra_prompt.clone(),
                max_output_tokens: settings.max_output_tokens,
                temperature: settings.temperature,
                concurrency: settings.concurrency.max(1),
            },
        );

        Ok(TranslationPipeline {
            chunker,
            estimator,
            extraction,
            translation,
        })
    }

    /// Build the context for a series from its dialogue, starting from `seed`
    pub async fn extract_context<'a>(
        &self,
        cues: impl IntoIterator<Item = &'a Cue>,
        title_hint: Option<&str>,
        seed: TranslationContext,
        cancel: &CancelFlag,
    ) -> TranslationContext {
        self.extraction.run(cues, title_hint, seed, cancel).await
    }

    /// Tokens the context adds to every translation request
    pub fn context_tokens(&self, context: &TranslationContext) -> usize {
        if context.is_empty() {
            0
        } else {
            estimate_json(self.estimator.as_ref(), context)
        }
    }

    /// Translate `track`, threading `context` through the chunks. The
    /// track's source-language tag wins over the configured one.
    ///
    /// An empty track comes back unchanged without any request.
    pub async fn translate_track(
        &self,
        track: &Track,
        context: &mut TranslationContext,
        cancel: &CancelFlag,
        progress: &ProgressBar,
    ) -> Result<Track, TranslationError> {
        if track.is_empty() {
            debug!("Empty track, nothing to translate");
            return Ok(track.clone());
        }

        let chunks = self.chunker.chunk(track.cues(), self.context_tokens(context));
        info!("Translating {} cues in {} chunks", track.len(), chunks.len());
        progress.set_length(chunks.len() as u64);

        let source_language = track.source_language().map(language_utils::display_name);
        let results = self
            .translation
            .translate(&chunks, source_language.as_deref(), context, cancel, progress)
            .await?;
        reassembler::reassemble(track, &results)
    }
}
