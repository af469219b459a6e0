/*!
 * Subtitle track model and format adapters.
 */

pub mod model;
pub mod srt;
pub mod ssa;

use std::path::Path;

pub use model::{Cue, SubtitleFormat, Track};

use crate::errors::SubtitleError;

/// Parse raw file bytes in the given format
pub fn parse_bytes(bytes: &[u8], format: SubtitleFormat) -> Result<Track, SubtitleError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let content = std::str::from_utf8(bytes).map_err(|e| SubtitleError::Parse {
        line: 0,
        message: format!("input is not valid UTF-8: {}", e),
    })?;
    parse_str(content, format)
}

/// Parse text content in the given format
pub fn parse_str(content: &str, format: SubtitleFormat) -> Result<Track, SubtitleError> {
    match format {
        SubtitleFormat::Srt => srt::parse(content),
        SubtitleFormat::Ssa | SubtitleFormat::Ass => ssa::parse(content, format),
    }
}

/// Render a track in its own format
pub fn serialize(track: &Track) -> String {
    match track.format() {
        SubtitleFormat::Srt => srt::serialize(track),
        SubtitleFormat::Ssa | SubtitleFormat::Ass => ssa::serialize(track),
    }
}

/// Read and parse a subtitle file, detecting the format from its extension
pub fn read_file(path: &Path) -> Result<Track, SubtitleError> {
    let format = SubtitleFormat::from_path(path)?;
    let bytes = std::fs::read(path)?;
    parse_bytes(&bytes, format)
}
