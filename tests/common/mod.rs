/*!
 * Common test utilities for the subglot test suite
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use subglot::app_config::Config;
use subglot::translation::{PipelineSettings, RetryPolicy};

pub const SAMPLE_SRT: &str = "1
00:00:01,000 --> 00:00:02,000
a

2
00:00:02,500 --> 00:00:04,000
b

3
00:00:05,000 --> 00:00:06,250
c

";

pub const SAMPLE_ASS: &str = "[Script Info]
Title: Kiri no Yama
ScriptType: v4.00+

[V4+ Styles]
Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding
Style: Default,Arial,20,&H00FFFFFF,&H000000FF,&H00000000,&H00000000,0,0,0,0,100,100,0,0,1,2,2,2,10,10,10,1

[Events]
Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text
Dialogue: 0,0:00:01.00,0:00:03.00,Default,,0,0,0,,霧山に行こう
Dialogue: 0,0:00:03.50,0:00:05.00,Default,,0,0,0,,{\\i1}待って{\\i0}\\Nどこへ？
";

/// SRT content whose second cue ends before it starts
pub const BROKEN_SRT: &str = "1
00:00:01,000 --> 00:00:02,000
fine

2
00:00:05,000 --> 00:00:03,000
backwards
";

/// Opt-in test logging through `RUST_LOG`
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Configuration that never sleeps between retries
pub fn fast_config() -> Config {
    Config {
        api_key: "test-key".to_string(),
        retry_times: 3,
        retry_delay_secs: 0.0,
        retry_backoff: 1.0,
        ..Config::default()
    }
}

/// Pipeline settings for `target` with immediate retries
pub fn fast_settings(target: &str) -> PipelineSettings {
    PipelineSettings {
        retry: RetryPolicy::immediate(3),
        ..PipelineSettings::from_config(&fast_config(), target)
    }
}
