/*!
 * Tests for the SRT, SSA and ASS adapters
 */

use anyhow::Result;
use subglot::errors::SubtitleError;
use subglot::subtitle::{self, SubtitleFormat};

use crate::common;

/// Reading a file detects the format from its extension
#[test]
fn test_readFile_withSrt_shouldParseCuesAndTimings() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "ep01.srt", common::SAMPLE_SRT)?;

    let track = subtitle::read_file(&path)?;

    assert_eq!(track.format(), SubtitleFormat::Srt);
    let cues: Vec<(usize, u64, u64, String)> = track
        .cues()
        .iter()
        .map(|c| (c.index, c.start_ms, c.end_ms, c.text()))
        .collect();
    assert_eq!(
        cues,
        vec![
            (1, 1_000, 2_000, "a".to_string()),
            (2, 2_500, 4_000, "b".to_string()),
            (3, 5_000, 6_250, "c".to_string()),
        ]
    );
    Ok(())
}

/// Parsing then serializing an unmodified file gives the same bytes
#[test]
fn test_serialize_withUnmodifiedTrack_shouldRoundTrip() -> Result<()> {
    let srt = subtitle::parse_str(common::SAMPLE_SRT, SubtitleFormat::Srt)?;
    assert_eq!(subtitle::serialize(&srt), common::SAMPLE_SRT);

    let ass = subtitle::parse_str(common::SAMPLE_ASS, SubtitleFormat::Ass)?;
    assert_eq!(subtitle::serialize(&ass), common::SAMPLE_ASS);
    Ok(())
}

/// Hard line breaks split cue lines; override tags stay in the text
#[test]
fn test_parseStr_withAssLineBreaks_shouldSplitLines() -> Result<()> {
    let track = subtitle::parse_str(common::SAMPLE_ASS, SubtitleFormat::Ass)?;

    assert_eq!(track.len(), 2);
    let second = &track.cues()[1];
    assert_eq!(second.lines, vec!["{\\i1}待って{\\i0}", "どこへ？"]);
    assert_eq!(second.start_ms, 3_500);
    assert_eq!(second.style.as_deref(), Some("Default"));
    Ok(())
}

/// The title header is rewritten for styled formats only
#[test]
fn test_setTitle_withAss_shouldRewriteScriptInfo() -> Result<()> {
    let mut track = subtitle::parse_str(common::SAMPLE_ASS, SubtitleFormat::Ass)?;
    track.set_title("French (AI Translated)");

    let output = subtitle::serialize(&track);
    assert!(output.contains("Title: French (AI Translated)\n"));
    assert!(!output.contains("Kiri no Yama"));
    Ok(())
}

/// A cue ending before it starts is a parse error at its timing line
#[test]
fn test_parseStr_withBackwardsTiming_shouldReportLine() {
    let error = subtitle::parse_str(common::BROKEN_SRT, SubtitleFormat::Srt).expect_err("should reject");
    match error {
        SubtitleError::Parse { line, .. } => assert_eq!(line, 6),
        other => panic!("unexpected error: {}", other),
    }
}

/// A UTF-8 byte order mark is ignored
#[test]
fn test_parseBytes_withBom_shouldIgnoreIt() -> Result<()> {
    let mut bytes = b"\xEF\xBB\xBF".to_vec();
    bytes.extend_from_slice(common::SAMPLE_SRT.as_bytes());

    let track = subtitle::parse_bytes(&bytes, SubtitleFormat::Srt)?;
    assert_eq!(track.len(), 3);
    assert_eq!(track.cues()[0].index, 1);
    Ok(())
}

/// Unknown extensions are refused
#[test]
fn test_subtitleFormat_fromExtension_shouldAcceptKnownFormats() {
    assert_eq!(SubtitleFormat::from_extension("SRT"), Some(SubtitleFormat::Srt));
    assert_eq!(SubtitleFormat::from_extension("ass"), Some(SubtitleFormat::Ass));
    assert_eq!(SubtitleFormat::from_extension("ssa"), Some(SubtitleFormat::Ssa));
    assert_eq!(SubtitleFormat::from_extension("vtt"), None);
}
