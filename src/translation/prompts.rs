/*!
 * Prompt templates and the JSON shapes exchanged with the model.
 *
 * The user message of every request is a single JSON document; all
 * instructions live in the system prompt. Replies are decoded leniently:
 * code fences and surrounding prose are stripped, and common alternative
 * field names are accepted.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use super::glossary::{ContextNote, DiscoveredTerm, TranslationContext};
use crate::errors::ValidationFailure;

// @const: Runs of backslashes produced by over-escaping models
static BACKSLASH_RUN_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\{2,}").unwrap());

/// One cue as sent to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuePayload {
    pub id: usize,
    pub text: String,
}

/// User message of a translation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationPayload {
    pub target_language: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,

    #[serde(default, skip_serializing_if = "ContextNote::is_empty")]
    pub context: ContextNote,

    /// Source term to required rendering
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub glossary: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub glossary_notes: BTreeMap<String, String>,

    pub cues: Vec<CuePayload>,
}

impl TranslationPayload {
    pub fn new(target_language: &str, source_language: Option<&str>, context: &TranslationContext, cues: Vec<CuePayload>) -> Self {
        TranslationPayload {
            target_language: target_language.to_string(),
            source_language: source_language.map(str::to_string),
            context: context.note.clone(),
            glossary: context.glossary.renderings(),
            glossary_notes: context.glossary.notes(),
            cues,
        }
    }
}

/// One translated cue in a reply
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CueReply {
    #[serde(deserialize_with = "lenient_index")]
    pub id: usize,
    #[serde(alias = "content", alias = "translated", alias = "translation")]
    pub text: String,
}

/// Reply to a translation request
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TranslationReply {
    #[serde(alias = "subtitles", alias = "cues")]
    pub translations: Vec<CueReply>,

    #[serde(default, alias = "glossary_updates", alias = "terms")]
    pub new_terms: Vec<DiscoveredTerm>,
}

/// User message of a context extraction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionPayload {
    pub target_language: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_hint: Option<String>,

    /// Context gathered so far, to be reused and refined
    #[serde(default, skip_serializing_if = "TranslationContext::is_empty")]
    pub previous: TranslationContext,

    pub dialogue: Vec<String>,
}

/// Reply to a context extraction request
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExtractionReply {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub synopsis: Option<String>,

    #[serde(default)]
    pub characters: Vec<DiscoveredTerm>,

    #[serde(default, alias = "context", alias = "terms")]
    pub glossary: Vec<DiscoveredTerm>,

    #[serde(default)]
    pub style_notes: Vec<String>,
}

fn lenient_index<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Index {
        Number(usize),
        Text(String),
    }

    match Index::deserialize(deserializer)? {
        Index::Number(n) => Ok(n),
        Index::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// System prompt for translation requests
pub fn translation_system_prompt(target_language: &str, extra_prompt: &str) -> String {
    let mut prompt = format!(
        "You are a professional subtitle translator. Translate every cue in the `cues` array of the \
user's JSON document into {target}.

Rules:
- Return exactly one translation per cue, with the same `id`. Never merge, split, drop or add cues.
- Keep line breaks (`\\n`) where the meaning allows, and keep formatting tags such as `{{\\i1}}` or `<i>` unchanged.
- Use the renderings in `glossary` exactly as given, and the names in `context.characters`.
- Use `context` (title, synopsis, style notes) to choose tone and disambiguate.
- If you introduce a rendering for a recurring proper noun, place, or technique that is not in the glossary, list it in `new_terms`.

Reply with JSON only, in this shape:
{{\"translations\": [{{\"id\": 1, \"text\": \"...\"}}], \"new_terms\": [{{\"source\": \"...\", \"target\": \"...\", \"kind\": \"term\" or \"character\", \"note\": \"optional\"}}]}}",
        target = target_language
    );
    if !extra_prompt.trim().is_empty() {
        prompt.push_str("\n\nAdditional instructions:\n");
        prompt.push_str(extra_prompt.trim());
    }
    prompt
}

/// System prompt for context extraction requests
pub fn extraction_system_prompt(target_language: &str, size_hint_tokens: usize) -> String {
    format!(
        "You prepare translators for a subtitle translation into {target}. The user's JSON document holds \
deduplicated dialogue lines from one or more episodes of the same series, an optional title hint, and any \
context gathered from earlier lines under `previous`.

Produce:
- `title`: the work's title, if it can be inferred.
- `synopsis`: one paragraph describing the story so far.
- `characters`: every named character, with the name as it should appear in {target}.
- `glossary`: recurring proper nouns, places, organisations, techniques and catch phrases, each with a proposed {target} rendering and an optional short note.
- `style_notes`: short guidance on register and tone for {target}.

Reuse and refine everything under `previous`; keep its renderings unless they are clearly wrong. \
Keep the whole reply under about {size} tokens.

Reply with JSON only, in this shape:
{{\"title\": \"...\", \"synopsis\": \"...\", \"characters\": [{{\"source\": \"...\", \"target\": \"...\"}}], \
\"glossary\": [{{\"source\": \"...\", \"target\": \"...\", \"note\": \"optional\"}}], \"style_notes\": [\"...\"]}}",
        target = target_language,
        size = size_hint_tokens
    )
}

/// Locate the JSON object in a model reply
pub fn extract_json(response: &str) -> Option<&str> {
    let trimmed = response.trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }

    // Look for JSON block in markdown code fence
    if let Some(start) = trimmed.find("```json") {
        if let Some(end) = trimmed[start + 7..].find("```") {
            return Some(trimmed[start + 7..start + 7 + end].trim());
        }
    }

    // Look for JSON block without language specifier
    if let Some(start) = trimmed.find("```") {
        if let Some(end) = trimmed[start + 3..].find("```") {
            let json = trimmed[start + 3..start + 3 + end].trim();
            if json.starts_with('{') {
                return Some(json);
            }
        }
    }

    // Look for first { and last }
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => Some(&trimmed[start..=end]),
        _ => None,
    }
}

/// Collapse `\\\\N` style over-escaping back to a single backslash
pub fn collapse_backslashes(text: &str) -> String {
    BACKSLASH_RUN_REGEX.replace_all(text, "\\").into_owned()
}

/// Decode a translation reply
pub fn parse_translation_reply(response: &str) -> Result<TranslationReply, ValidationFailure> {
    let json = extract_json(response)
        .ok_or_else(|| ValidationFailure::Unparseable("no JSON object in response".to_string()))?;
    let mut reply: TranslationReply =
        serde_json::from_str(json).map_err(|e| ValidationFailure::Unparseable(e.to_string()))?;
    for cue in reply.translations.iter_mut() {
        cue.text = collapse_backslashes(&cue.text);
    }
    Ok(reply)
}

/// Decode a context extraction reply
pub fn parse_extraction_reply(response: &str) -> Result<ExtractionReply, ValidationFailure> {
    let json = extract_json(response)
        .ok_or_else(|| ValidationFailure::Unparseable("no JSON object in response".to_string()))?;
    serde_json::from_str(json).map_err(|e| ValidationFailure::Unparseable(e.to_string()))
}
