/*!
 * SubStation Alpha (`.ssa`) and Advanced SubStation Alpha (`.ass`) adapter.
 *
 * Every line of the document is kept in order. `Dialogue:` events become
 * cues whose header is the verbatim prefix up to the `Text` field, so
 * layer, timing, style, margins and effect survive a round trip untouched.
 * Hard line breaks (`\N`) map to cue lines; override tags stay inline.
 */

use log::debug;

use super::model::{Cue, LayoutLine, SubtitleFormat, Track};
use crate::errors::SubtitleError;

const DEFAULT_FIELD_COUNT: usize = 10;

/// Column positions of the `[Events]` section
#[derive(Debug, Clone, Copy)]
struct EventFormat {
    field_count: usize,
    start: usize,
    end: usize,
    style: Option<usize>,
}

impl Default for EventFormat {
    fn default() -> Self {
        // Marked/Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text
        EventFormat {
            field_count: DEFAULT_FIELD_COUNT,
            start: 1,
            end: 2,
            style: Some(3),
        }
    }
}

impl EventFormat {
    fn from_format_line(format_line: &str, line: usize) -> Result<Self, SubtitleError> {
        let fields: Vec<String> = format_line.split(',').map(|f| f.trim().to_ascii_lowercase()).collect();
        let position = |name: &str| fields.iter().position(|f| f == name);

        let text = position("text");
        if text != Some(fields.len() - 1) {
            return Err(SubtitleError::Parse {
                line,
                message: "event format must end with the Text field".to_string(),
            });
        }
        let start = position("start").ok_or_else(|| SubtitleError::Parse {
            line,
            message: "event format has no Start field".to_string(),
        })?;
        let end = position("end").ok_or_else(|| SubtitleError::Parse {
            line,
            message: "event format has no End field".to_string(),
        })?;

        Ok(EventFormat {
            field_count: fields.len(),
            start,
            end,
            style: position("style"),
        })
    }
}

/// Parse SSA/ASS content into a track
pub fn parse(content: &str, format: SubtitleFormat) -> Result<Track, SubtitleError> {
    let mut cues = Vec::new();
    let mut layout = Vec::new();
    let mut section = String::new();
    let mut event_format = EventFormat::default();

    for (line_no, raw) in content.lines().enumerate() {
        let line_no = line_no + 1;
        let line = raw.trim_end_matches('\r');
        let trimmed = line.trim();

        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            section = trimmed.to_ascii_lowercase();
            layout.push(LayoutLine::Verbatim(line.to_string()));
            continue;
        }

        if section == "[events]" {
            if let Some(format_line) = strip_key(trimmed, "format") {
                event_format = EventFormat::from_format_line(format_line, line_no)?;
                debug!("Event format at line {}: {:?}", line_no, event_format);
            } else if strip_key(trimmed, "dialogue").is_some() {
                let cue = parse_dialogue(line, cues.len() + 1, &event_format, line_no)?;
                layout.push(LayoutLine::Cue(cues.len()));
                cues.push(cue);
                continue;
            }
        }

        layout.push(LayoutLine::Verbatim(line.to_string()));
    }

    Track::with_layout(format, cues, layout)
}

fn strip_key<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let (name, rest) = line.split_once(':')?;
    name.trim().eq_ignore_ascii_case(key).then_some(rest)
}

fn parse_dialogue(line: &str, index: usize, format: &EventFormat, line_no: usize) -> Result<Cue, SubtitleError> {
    let colon = line.find(':').ok_or_else(|| SubtitleError::Parse {
        line: line_no,
        message: "dialogue line without ':'".to_string(),
    })?;

    // Byte offset where the Text field begins
    let mut text_offset = colon + 1;
    for _ in 0..format.field_count - 1 {
        match line[text_offset..].find(',') {
            Some(comma) => text_offset += comma + 1,
            None => {
                return Err(SubtitleError::Parse {
                    line: line_no,
                    message: format!("dialogue line has fewer than {} fields", format.field_count),
                });
            }
        }
    }

    let fields: Vec<&str> = line[colon + 1..text_offset].split(',').map(str::trim).collect();
    let start_ms = parse_timestamp(fields[format.start], line_no)?;
    let end_ms = parse_timestamp(fields[format.end], line_no)?;
    if end_ms < start_ms {
        return Err(SubtitleError::Parse {
            line: line_no,
            message: format!("dialogue {} ends before it starts", index),
        });
    }

    let text = &line[text_offset..];
    Ok(Cue {
        index,
        start_ms,
        end_ms,
        lines: text.split("\\N").map(str::to_string).collect(),
        style: format.style.map(|i| fields[i].to_string()),
        header: Some(line[..text_offset].to_string()),
    })
}

/// `H:MM:SS.cc` to milliseconds
fn parse_timestamp(value: &str, line: usize) -> Result<u64, SubtitleError> {
    let invalid = || SubtitleError::Parse {
        line,
        message: format!("invalid timestamp '{}'", value),
    };

    let (clock, fraction) = value.split_once('.').ok_or_else(invalid)?;
    let parts: Vec<&str> = clock.split(':').collect();
    if parts.len() != 3 {
        return Err(invalid());
    }
    let hours = parts[0].parse::<u64>().map_err(|_| invalid())?;
    let minutes = parts[1].parse::<u64>().map_err(|_| invalid())?;
    let seconds = parts[2].parse::<u64>().map_err(|_| invalid())?;
    if minutes >= 60 || seconds >= 60 {
        return Err(SubtitleError::Parse {
            line,
            message: format!("timestamp field out of range in '{}'", value),
        });
    }
    // Centiseconds are standard; pad or truncate to milliseconds
    let millis: String = format!("{:0<3}", fraction).chars().take(3).collect();
    let millis = millis.parse::<u64>().map_err(|_| invalid())?;

    hours
        .checked_mul(3_600_000)
        .and_then(|ms| ms.checked_add(minutes * 60_000 + seconds * 1_000 + millis))
        .ok_or_else(invalid)
}

fn format_timestamp(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1_000;
    let centis = (ms % 1_000) / 10;
    format!("{}:{:02}:{:02}.{:02}", hours, minutes, seconds, centis)
}

/// Render a track as SSA/ASS
pub fn serialize(track: &Track) -> String {
    let mut out = String::new();
    let push_cue = |out: &mut String, cue: &Cue| {
        match cue.header() {
            Some(header) => out.push_str(header),
            None => {
                let style = cue.style.as_deref().unwrap_or("Default");
                out.push_str(&format!(
                    "Dialogue: 0,{},{},{},,0,0,0,,",
                    format_timestamp(cue.start_ms),
                    format_timestamp(cue.end_ms),
                    style
                ));
            }
        }
        out.push_str(&cue.lines.join("\\N"));
        out.push('\n');
    };

    if track.layout.is_empty() {
        out.push_str("[Script Info]\nScriptType: v4.00+\n\n[Events]\n");
        out.push_str("Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n");
        for cue in track.cues() {
            push_cue(&mut out, cue);
        }
        return out;
    }

    for line in &track.layout {
        match line {
            LayoutLine::Verbatim(text) => {
                out.push_str(text);
                out.push('\n');
            }
            LayoutLine::Cue(position) => {
                if let Some(cue) = track.cues().get(*position) {
                    push_cue(&mut out, cue);
                }
            }
        }
    }
    out
}
