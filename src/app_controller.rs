use anyhow::{Context, Result, anyhow};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::Config;
use crate::errors::TranslationError;
use crate::file_utils::FileManager;
use crate::language_utils;
use crate::metadata::{self, MetadataSource};
use crate::providers::{self, Provider};
use crate::subtitle::{self, Track};
use crate::translation::store::{self, ContextStore, FileContextStore, StoreKey};
use crate::translation::{
    CancelFlag, HeuristicEstimator, PipelineSettings, TokenEstimator, TranslationContext, TranslationPipeline,
    UsageStats, UsageTracker,
};

// @module: Application controller for subtitle translation runs

/// What a run should do
#[derive(Debug, Clone)]
pub struct RunOptions {
    // @field: Target language code or name
    pub target_language: String,
    // @field: Run the context extraction stage
    pub extract: bool,
    // @field: Run the translation stage
    pub translate: bool,
    // @field: Overwrite existing outputs
    pub force: bool,
    // @field: Draw progress bars
    pub show_progress: bool,
}

impl RunOptions {
    pub fn new(target_language: impl Into<String>) -> Self {
        RunOptions {
            target_language: target_language.into(),
            extract: true,
            translate: true,
            force: false,
            show_progress: true,
        }
    }
}

/// Outcome of a run over a file or directory
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub translated: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    pub cancelled: bool,
    pub usage: UsageStats,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}

/// Main application controller
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: LLM backend shared by both stages
    provider: Arc<dyn Provider>,
    estimator: Arc<dyn TokenEstimator>,
    store: Arc<dyn ContextStore>,
    // @field: Series catalogue consulted before extraction, when enabled
    metadata: Option<Arc<dyn MetadataSource>>,
    cancel: CancelFlag,
}

impl Controller {
    // @method: Create a controller talking to the configured provider
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        let provider = providers::build_provider(&config).context("Failed to create LLM provider")?;
        let metadata = metadata::build_metadata_source(&config).context("Failed to create metadata client")?;
        let mut controller = Self::with_provider(config, provider);
        controller.metadata = metadata;
        Ok(controller)
    }

    /// Create a controller with an explicit provider
    pub fn with_provider(config: Config, provider: Arc<dyn Provider>) -> Self {
        Controller {
            config,
            provider,
            estimator: Arc::new(HeuristicEstimator::default()),
            store: Arc::new(FileContextStore::new()),
            metadata: None,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ContextStore>) -> Self {
        self.store = store;
        self
    }

    /// Seed fresh contexts from `source` before extraction
    pub fn with_metadata_source(mut self, source: Arc<dyn MetadataSource>) -> Self {
        self.metadata = Some(source);
        self
    }

    /// Flag that stops the run before the next chunk when set
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Process a subtitle file, or every subtitle file of a directory
    pub async fn run(&self, path: &Path, options: &RunOptions) -> Result<RunSummary> {
        let start_time = Instant::now();
        if !options.extract && !options.translate {
            return Err(anyhow!("Nothing to do: both context extraction and translation are disabled"));
        }

        let postfix = self.config.postfix_for(&options.target_language);
        let files = FileManager::find_subtitle_files(path, &postfix)?;
        if files.is_empty() {
            return Err(anyhow!("No subtitle files found in: {}", path.display()));
        }

        let usage = Arc::new(UsageTracker::new());
        let settings = PipelineSettings::from_config(&self.config, &options.target_language);
        let pipeline = TranslationPipeline::new(self.provider.clone(), self.estimator.clone(), usage.clone(), settings)
            .context("Invalid token budget")?;

        info!(
            "{} - {} -> {} ({} file{})",
            self.provider.name(),
            self.config.model,
            language_utils::display_name(&options.target_language),
            files.len(),
            if files.len() == 1 { "" } else { "s" }
        );

        let multi_progress = if options.show_progress {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        // One shared context per directory
        let mut groups: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
        for file in files {
            let dir = match file.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            groups.entry(dir).or_default().push(file);
        }

        let mut summary = RunSummary::default();
        for (dir, files) in groups {
            self.run_directory(&dir, &files, options, &postfix, &pipeline, &multi_progress, &mut summary)
                .await;
            if summary.cancelled {
                break;
            }
        }

        summary.usage = usage.snapshot();
        info!(
            "Processing completed: {} translated, {} skipped, {} errors in {}",
            summary.translated.len(),
            summary.skipped.len(),
            summary.failed.len(),
            Self::format_duration(start_time.elapsed())
        );
        if summary.usage.requests > 0 {
            info!("Token usage: {}", summary.usage);
        }
        if summary.cancelled {
            warn!("Run cancelled; remaining files were not processed");
        }
        Ok(summary)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_directory(
        &self,
        dir: &Path,
        files: &[PathBuf],
        options: &RunOptions,
        postfix: &str,
        pipeline: &TranslationPipeline,
        multi_progress: &MultiProgress,
        summary: &mut RunSummary,
    ) {
        let mut tracks: Vec<(PathBuf, Track)> = Vec::new();
        for file in files {
            match subtitle::read_file(file) {
                Ok(track) => {
                    let source_language = self
                        .config
                        .source_language
                        .clone()
                        .or_else(|| FileManager::language_hint(file));
                    let track = match source_language {
                        Some(language) => track.with_source_language(language),
                        None => track,
                    };
                    tracks.push((file.clone(), track));
                }
                Err(e) => {
                    error!("Error reading file {}: {}", Self::display_file(file), e);
                    summary.failed.push((file.clone(), e.to_string()));
                }
            }
        }

        // Outputs already on disk are left alone
        let mut pending = Vec::new();
        for (file, track) in tracks {
            let output_path = FileManager::generate_output_path(&file, postfix);
            if options.translate && output_path.exists() && !options.force {
                warn!(
                    "Skipping {}, translation already exists (use -f to force overwrite)",
                    Self::display_file(&file)
                );
                summary.skipped.push(file);
            } else {
                pending.push((file, output_path, track));
            }
        }
        if pending.is_empty() {
            debug!("Nothing left to do in {}", dir.display());
            return;
        }

        let key = StoreKey::new(dir, &options.target_language);
        let mut context = store::load_or_empty(self.store.as_ref(), &key);
        if !context.is_empty() {
            info!(
                "Loaded stored context for {}: {} glossary terms",
                dir.display(),
                context.glossary.len()
            );
        }

        // A context-only run refreshes the stored context; otherwise reuse it
        if options.extract && (context.is_empty() || !options.translate) {
            let spinner = multi_progress.add(ProgressBar::new_spinner());
            spinner.set_message("Extracting context");
            spinner.enable_steady_tick(Duration::from_millis(120));

            let mut title_hint = FileManager::guess_series_title(dir);
            if context.is_empty() {
                if let (Some(source), Some(title)) = (&self.metadata, title_hint.clone()) {
                    spinner.set_message(format!("Looking up '{}'", title));
                    if let Some(found) = metadata::lookup_or_warn(source.as_ref(), &title).await {
                        context.note.merge(found.to_context_note());
                        title_hint = found.display_title().map(str::to_string).or(title_hint);
                    }
                    spinner.set_message("Extracting context");
                }
            }

            let cues = pending.iter().flat_map(|(_, _, track)| track.cues());
            context = pipeline
                .extract_context(cues, title_hint.as_deref(), context, &self.cancel)
                .await;
            spinner.finish_and_clear();

            info!(
                "Context for {}: {} glossary terms, {} characters",
                dir.display(),
                context.glossary.len(),
                context.note.characters.len()
            );
            store::save_or_warn(self.store.as_ref(), &key, &context);
        }

        if !options.translate {
            return;
        }
        if self.cancel.is_cancelled() {
            summary.cancelled = true;
            return;
        }

        let folder_pb = if pending.len() > 1 {
            let pb = multi_progress.add(ProgressBar::new(pending.len() as u64));
            pb.set_style(Self::progress_style("files"));
            pb.set_message("Processing files");
            Some(pb)
        } else {
            None
        };

        for (file, output_path, track) in &pending {
            let file_name = Self::display_file(file);
            if let Some(pb) = &folder_pb {
                pb.set_message(format!("Processing: {}", file_name));
            }

            match self
                .translate_file(track, output_path, &options.target_language, &mut context, pipeline, multi_progress)
                .await
            {
                Ok(()) => {
                    info!("Success: {}", output_path.display());
                    summary.translated.push(file.clone());
                    store::save_or_warn(self.store.as_ref(), &key, &context);
                }
                Err(e) => {
                    let cancelled = matches!(e.downcast_ref::<TranslationError>(), Some(TranslationError::Cancelled));
                    error!("Error processing file {}: {:#}", file_name, e);
                    summary.failed.push((file.clone(), format!("{:#}", e)));
                    if cancelled {
                        summary.cancelled = true;
                        break;
                    }
                }
            }

            if let Some(pb) = &folder_pb {
                pb.inc(1);
            }
        }

        if let Some(pb) = folder_pb {
            pb.finish_with_message("Folder processing complete");
        }
    }

    async fn translate_file(
        &self,
        track: &Track,
        output_path: &Path,
        target_language: &str,
        context: &mut TranslationContext,
        pipeline: &TranslationPipeline,
        multi_progress: &MultiProgress,
    ) -> Result<()> {
        let progress_bar = multi_progress.add(ProgressBar::new(0));
        progress_bar.set_style(Self::progress_style("chunks"));
        progress_bar.set_message("Translating");

        let result = pipeline
            .translate_track(track, context, &self.cancel, &progress_bar)
            .await;
        progress_bar.finish_and_clear();

        let mut translated = result?;
        translated.set_title(&format!("{} (AI Translated)", language_utils::display_name(target_language)));
        FileManager::write_atomic(output_path, &subtitle::serialize(&translated))?;
        Ok(())
    }

    fn progress_style(unit: &str) -> ProgressStyle {
        let template = format!(
            "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} ({{percent}}%) {{msg}} {{eta}}",
            unit
        );
        ProgressStyle::default_bar()
            .template(&template)
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░")
    }

    fn display_file(path: &Path) -> String {
        path.file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string())
    }

    // Format duration in a human-readable format
    fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
