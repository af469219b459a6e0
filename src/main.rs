// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, warn};
use std::io::Write;
use std::path::{Path, PathBuf};

use subglot::app_config::{self, Config, LlmProvider};
use subglot::app_controller::{Controller, RunOptions};

const DEFAULT_CONFIG_PATH: &str = "conf.json";

/// CLI Wrapper for LlmProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliProvider {
    #[value(name = "openai")]
    OpenAI,
    Ollama,
    Anthropic,
}

impl From<CliProvider> for LlmProvider {
    fn from(cli_provider: CliProvider) -> Self {
        match cli_provider {
            CliProvider::OpenAI => LlmProvider::OpenAI,
            CliProvider::Ollama => LlmProvider::Ollama,
            CliProvider::Anthropic => LlmProvider::Anthropic,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate shell completions for subglot
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Subglot - context-aware subtitle translation with LLMs
#[derive(Parser, Debug)]
#[command(name = "subglot")]
#[command(version)]
#[command(about = "LLM-powered subtitle translation tool")]
#[command(args_conflicts_with_subcommands = true)]
#[command(long_about = "Subglot translates SRT, SSA and ASS subtitles with a large language model.
A first pass reads the dialogue and builds a glossary of names and terms,
which is kept in .translated/ next to the subtitles and reused by every
translation request of the series.

EXAMPLES:
    subglot zh episode01.ass                    # Translate one file to Chinese
    subglot fr /shows/kiri-no-yama/              # Translate every subtitle in a directory
    subglot --context ja /shows/kiri-no-yama/    # Only build the glossary
    subglot -p ollama -m qwen2.5 en movie.srt    # Use a local model
    subglot --metadata en /shows/Shingeki_no_Kyojin/  # Seed names from AniList
    subglot completions bash > subglot.bash      # Generate bash completions

CONFIGURATION:
    Settings are read from conf.json when present (or --config), then from
    environment variables such as LLM_MODEL, LLM_API_KEY, LLM_EXTRA_PROMPT,
    LANGUAGE_POSTFIX, MAX_INPUT_TOKEN, MAX_OUTPUT_TOKEN, PRE_TRANSLATE_SIZE and
    ANILIST_TOKEN, then from the flags below.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Target language code or name (e.g. 'zh', 'fr', 'Japanese')
    #[arg(value_name = "TARGET_LANGUAGE")]
    target_language: Option<String>,

    /// Subtitle file or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<PathBuf>,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force: bool,

    /// Only extract and store context, do not translate
    #[arg(long, conflicts_with = "translate")]
    context: bool,

    /// Only translate, using whatever context is stored
    #[arg(long)]
    translate: bool,

    /// LLM provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Source language hint
    #[arg(short, long)]
    source_language: Option<String>,

    /// Look the series up on AniList to seed names and synopsis
    #[arg(long)]
    metadata: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Hide progress bars
    #[arg(short, long)]
    quiet: bool,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger { level: LevelFilter::Trace }))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji and ANSI color for log level
    fn decoration(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("❌ ", "1;31"),
            Level::Warn => ("🚧 ", "1;33"),
            Level::Info => (" ", "1;32"),
            Level::Debug => ("🔍 ", "1;36"),
            Level::Trace => ("📋 ", "1;35"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (emoji, color) = Self::decoration(record.level());
            let _ = writeln!(
                std::io::stderr(),
                "\x1B[{}m{} {} {}\x1B[0m",
                color,
                now,
                emoji,
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();
    if let Some(Commands::Completions { shell }) = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "subglot", &mut std::io::stdout());
        return Ok(());
    }

    let target_language = cli
        .target_language
        .clone()
        .ok_or_else(|| anyhow!("TARGET_LANGUAGE is required"))?;
    let input_path = cli
        .input_path
        .clone()
        .ok_or_else(|| anyhow!("INPUT_PATH is required"))?;

    let config = load_config(&cli)?;
    log::set_max_level(config.log_level.into());

    let controller = Controller::with_config(config).context("Configuration validation failed")?;

    let cancel = controller.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing the current request before stopping");
            cancel.cancel();
        }
    });

    let options = RunOptions {
        target_language,
        extract: !cli.translate,
        translate: !cli.context,
        force: cli.force,
        show_progress: !cli.quiet,
    };
    let summary = controller.run(&input_path, &options).await?;

    if summary.cancelled {
        return Err(anyhow!("Translation cancelled"));
    }
    if !summary.failed.is_empty() {
        for (path, reason) in &summary.failed {
            error!("{}: {}", path.display(), reason);
        }
        return Err(anyhow!("{} file(s) failed", summary.failed.len()));
    }
    Ok(())
}

// Config file, then environment, then flags
fn load_config(cli: &CommandLineOptions) -> Result<Config> {
    let config_path = match &cli.config {
        Some(path) => Some(path.as_path()),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Some(Path::new(DEFAULT_CONFIG_PATH)),
        None => None,
    };
    let mut config = Config::load(config_path)?;

    if let Some(provider) = &cli.provider {
        config.provider = provider.clone().into();
    }
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(source_language) = &cli.source_language {
        config.source_language = Some(source_language.clone());
    }
    if cli.metadata {
        config.metadata_lookup = true;
    }
    if let Some(log_level) = &cli.log_level {
        config.log_level = log_level.clone().into();
    }
    Ok(config)
}
