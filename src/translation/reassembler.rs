/*!
 * Reassembly of translated text into the source track.
 */

use crate::errors::TranslationError;
use crate::subtitle::Track;

/// Translated text for every cue of one chunk, in chunk order
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkTranslation {
    /// Position of the chunk this result belongs to
    pub position: usize,
    /// `(cue index, translated text)` pairs
    pub cues: Vec<(usize, String)>,
}

/// Produce the output track: same cues, same timing and styling, new text.
///
/// `results` must cover every cue of `track` exactly once and in order.
/// Anything else is an internal invariant violation and is reported, never
/// patched over with source text.
pub fn reassemble(track: &Track, results: &[ChunkTranslation]) -> Result<Track, TranslationError> {
    let translated: Vec<&(usize, String)> = results.iter().flat_map(|r| r.cues.iter()).collect();

    if translated.len() != track.len() {
        return Err(TranslationError::ReassemblyMismatch(format!(
            "track has {} cues but {} translations were produced",
            track.len(),
            translated.len()
        )));
    }

    let mut texts = Vec::with_capacity(track.len());
    for (cue, (index, text)) in track.cues().iter().zip(translated) {
        if cue.index != *index {
            return Err(TranslationError::ReassemblyMismatch(format!(
                "expected cue {} but found translation for cue {}",
                cue.index, index
            )));
        }
        if text.trim().is_empty() && !cue.is_blank() {
            return Err(TranslationError::ReassemblyMismatch(format!(
                "cue {} has no translated text",
                cue.index
            )));
        }
        texts.push(text.clone());
    }

    Ok(track.with_cue_texts(texts))
}
