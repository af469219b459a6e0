use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::SubtitleError;

// @module: In-memory subtitle track

// @struct: Single timed cue
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    // @field: Position key from the source file, strictly increasing within a track
    pub index: usize,

    // @field: Start time in ms
    pub start_ms: u64,

    // @field: End time in ms
    pub end_ms: u64,

    // @field: Text lines, top to bottom
    pub lines: Vec<String>,

    // @field: Opaque style token, passed through untouched
    pub style: Option<String>,

    // @field: Verbatim non-text part of the cue as read from disk
    pub(crate) header: Option<String>,
}

impl Cue {
    /// Creates a cue that has no on-disk representation yet
    pub fn new(index: usize, start_ms: u64, end_ms: u64, text: &str) -> Self {
        Cue {
            index,
            start_ms,
            end_ms,
            lines: split_lines(text),
            style: None,
            header: None,
        }
    }

    /// Attach a style token
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    /// Cue text with lines joined by `\n`
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// True when there is nothing to translate
    pub fn is_blank(&self) -> bool {
        self.lines.iter().all(|line| line.trim().is_empty())
    }

    /// Verbatim timing/styling part, if the cue came from a file
    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    /// Same timing and styling, new text
    pub fn with_text(&self, text: &str) -> Self {
        Cue {
            lines: split_lines(text),
            ..self.clone()
        }
    }

    /// Format a timestamp in milliseconds to SRT format (HH:MM:SS,mmm)
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "#{} [{} --> {}] {}",
            self.index,
            Self::format_timestamp(self.start_ms),
            Self::format_timestamp(self.end_ms),
            self.lines.join(" / ")
        )
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect()
}

/// Supported on-disk formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    /// SubRip
    Srt,
    /// SubStation Alpha
    Ssa,
    /// Advanced SubStation Alpha
    Ass,
}

impl SubtitleFormat {
    /// Detect format from a file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "srt" => Some(Self::Srt),
            "ssa" => Some(Self::Ssa),
            "ass" => Some(Self::Ass),
            _ => None,
        }
    }

    /// Detect format from a path
    pub fn from_path(path: &Path) -> Result<Self, SubtitleError> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| SubtitleError::UnsupportedFormat(path.display().to_string()))
    }

    /// Canonical lowercase extension
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Srt => "srt",
            Self::Ssa => "ssa",
            Self::Ass => "ass",
        }
    }
}

impl fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One physical line of a styled document, or a slot filled by a cue
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LayoutLine {
    Verbatim(String),
    Cue(usize),
}

/// Ordered cues plus whatever surrounds them in the source file.
///
/// Once parsed, only cue text may change; timing, styling and the
/// document layout are carried through to serialization unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    format: SubtitleFormat,
    source_language: Option<String>,
    cues: Vec<Cue>,
    pub(crate) layout: Vec<LayoutLine>,
}

impl Track {
    /// Build a track from cues. Cue indices must be strictly increasing.
    pub fn new(format: SubtitleFormat, cues: Vec<Cue>) -> Result<Self, SubtitleError> {
        Self::with_layout(format, cues, Vec::new())
    }

    pub(crate) fn with_layout(
        format: SubtitleFormat,
        cues: Vec<Cue>,
        layout: Vec<LayoutLine>,
    ) -> Result<Self, SubtitleError> {
        for pair in cues.windows(2) {
            if pair[1].index <= pair[0].index {
                return Err(SubtitleError::Parse {
                    line: 0,
                    message: format!(
                        "cue index {} follows {}; indices must be strictly increasing",
                        pair[1].index, pair[0].index
                    ),
                });
            }
        }
        Ok(Track {
            format,
            source_language: None,
            cues,
            layout,
        })
    }

    /// Tag the track with its source language
    pub fn with_source_language(mut self, language: impl Into<String>) -> Self {
        self.source_language = Some(language.into());
        self
    }

    pub fn format(&self) -> SubtitleFormat {
        self.format
    }

    pub fn source_language(&self) -> Option<&str> {
        self.source_language.as_deref()
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Copy of this track whose cue texts come from `texts`, in cue order
    pub(crate) fn with_cue_texts(&self, texts: Vec<String>) -> Self {
        let cues = self
            .cues
            .iter()
            .zip(texts)
            .map(|(cue, text)| cue.with_text(&text))
            .collect();
        Track {
            format: self.format,
            source_language: self.source_language.clone(),
            cues,
            layout: self.layout.clone(),
        }
    }

    /// Rewrite the `Title:` header of a styled document. No effect on SRT.
    pub fn set_title(&mut self, title: &str) {
        if self.format == SubtitleFormat::Srt {
            return;
        }
        for line in self.layout.iter_mut() {
            if let LayoutLine::Verbatim(text) = line {
                if text.trim_start().to_ascii_lowercase().starts_with("title:") {
                    *text = format!("Title: {}", title);
                    return;
                }
            }
        }
    }
}
