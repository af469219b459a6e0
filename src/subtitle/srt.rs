/*!
 * SubRip (`.srt`) adapter.
 *
 * The timing line of every cue is kept verbatim so that writing a parsed
 * track back reproduces it byte for byte. Text after the end timestamp
 * (position coordinates) is exposed as the cue style.
 */

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;

use super::model::{Cue, SubtitleFormat, Track};
use crate::errors::SubtitleError;

// @const: SRT timing line regex, tolerant of `.` separators and short fields
static TIMING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d{1,3}):(\d{1,2}):(\d{1,2})[,.](\d{1,3})\s*-->\s*(\d{1,3}):(\d{1,2}):(\d{1,2})[,.](\d{1,3})(.*)$").unwrap()
});

/// Parse SRT content into a track
pub fn parse(content: &str) -> Result<Track, SubtitleError> {
    let mut cues = Vec::new();
    let mut block: Vec<(usize, &str)> = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            if !block.is_empty() {
                cues.push(parse_block(&block, cues.last())?);
                block.clear();
            }
            continue;
        }
        block.push((line_no + 1, line));
    }
    if !block.is_empty() {
        cues.push(parse_block(&block, cues.last())?);
    }

    let ordered = cues.windows(2).all(|pair| pair[1].index > pair[0].index);
    if !ordered {
        warn!("SRT cue numbering is not strictly increasing; renumbering {} cues by position", cues.len());
        for (position, cue) in cues.iter_mut().enumerate() {
            cue.index = position + 1;
        }
    }

    Track::new(SubtitleFormat::Srt, cues)
}

fn parse_block(block: &[(usize, &str)], previous: Option<&Cue>) -> Result<Cue, SubtitleError> {
    let (first_line_no, first) = block[0];
    let next_index = previous.map_or(1, |cue| cue.index + 1);

    // The sequence number is optional in the wild; fall back to position
    let (index, timing_at) = match first.trim().parse::<usize>() {
        Ok(index) if block.len() > 1 => (index, 1),
        _ if TIMING_REGEX.is_match(first) => {
            warn!("Cue at line {} has no sequence number, using {}", first_line_no, next_index);
            (next_index, 0)
        }
        _ => {
            return Err(SubtitleError::Parse {
                line: first_line_no,
                message: format!("expected a cue number or timing line, found '{}'", first.trim()),
            });
        }
    };

    let (timing_line_no, timing) = block[timing_at];
    let caps = TIMING_REGEX.captures(timing).ok_or_else(|| SubtitleError::Parse {
        line: timing_line_no,
        message: format!("malformed timing line '{}'", timing.trim()),
    })?;

    let start_ms = captures_to_ms(&caps, 1, timing_line_no)?;
    let end_ms = captures_to_ms(&caps, 5, timing_line_no)?;
    if end_ms < start_ms {
        return Err(SubtitleError::Parse {
            line: timing_line_no,
            message: format!("cue {} ends before it starts", index),
        });
    }
    if end_ms == start_ms {
        warn!("Cue {} at line {} has zero duration", index, timing_line_no);
    }

    let style = caps
        .get(9)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let lines = block[timing_at + 1..]
        .iter()
        .map(|(_, line)| line.to_string())
        .collect();

    Ok(Cue {
        index,
        start_ms,
        end_ms,
        lines,
        style,
        header: Some(timing.to_string()),
    })
}

fn captures_to_ms(caps: &regex::Captures, start_idx: usize, line: usize) -> Result<u64, SubtitleError> {
    let field = |offset: usize| -> Result<&str, SubtitleError> {
        caps.get(start_idx + offset)
            .map(|m| m.as_str())
            .ok_or_else(|| SubtitleError::Parse { line, message: "incomplete timestamp".to_string() })
    };
    let number = |value: &str| -> Result<u64, SubtitleError> {
        value.parse::<u64>().map_err(|e| SubtitleError::Parse { line, message: e.to_string() })
    };

    let hours = number(field(0)?)?;
    let minutes = number(field(1)?)?;
    let seconds = number(field(2)?)?;
    // "5" after the separator means 500 ms
    let millis_raw = field(3)?;
    let millis = number(&format!("{:0<3}", millis_raw))?;

    if minutes >= 60 || seconds >= 60 {
        return Err(SubtitleError::Parse { line, message: "timestamp field out of range".to_string() });
    }

    Ok((hours * 3600 + minutes * 60 + seconds) * 1000 + millis)
}

/// Render a track as SRT
pub fn serialize(track: &Track) -> String {
    let mut out = String::new();
    for cue in track.cues() {
        out.push_str(&cue.index.to_string());
        out.push('\n');
        match cue.header() {
            Some(header) => out.push_str(header),
            None => {
                out.push_str(&Cue::format_timestamp(cue.start_ms));
                out.push_str(" --> ");
                out.push_str(&Cue::format_timestamp(cue.end_ms));
                if let Some(style) = &cue.style {
                    out.push(' ');
                    out.push_str(style);
                }
            }
        }
        out.push('\n');
        // An empty line would end the block early
        for line in cue.lines.iter().filter(|line| !line.trim().is_empty()) {
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
    }
    out
}
