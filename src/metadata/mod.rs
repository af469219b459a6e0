/*!
 * External series metadata.
 *
 * A [`MetadataSource`] looks a series up by title and returns its native
 * title, synopsis and cast. The result seeds the context note before the
 * extraction stage reads any dialogue, so names come out the way the
 * series' official sources spell them. A failed lookup is logged and the
 * run carries on without it.
 */

use async_trait::async_trait;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;

use crate::app_config::Config;
use crate::errors::ProviderError;
use crate::translation::ContextNote;

pub mod anilist;

// @const: HTML tags in catalogue descriptions
static HTML_TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

// @const: Runs of whitespace
static SPACES_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Lowest title similarity accepted as a match
pub const MATCH_THRESHOLD: f64 = 0.2;

/// One character of a series
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CharacterInfo {
    /// Name in the original script, e.g. `エレン・イェーガー`
    pub name: String,
    /// Romanized and alternative names, best first
    pub alt_names: Vec<String>,
    pub gender: Option<String>,
}

/// What a catalogue knows about a series
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SeriesMetadata {
    /// Native title
    pub title: String,
    /// Romanized, English and other titles
    pub alt_titles: Vec<String>,
    pub description: Option<String>,
    pub characters: Vec<CharacterInfo>,
}

impl SeriesMetadata {
    /// All non-empty titles, native first
    pub fn titles(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.title.as_str())
            .chain(self.alt_titles.iter().map(String::as_str))
            .filter(|title| !title.trim().is_empty())
    }

    /// Best title to show: the native one, else the first alternative
    pub fn display_title(&self) -> Option<&str> {
        self.titles().next()
    }

    /// Context note seeded from this metadata.
    ///
    /// Characters map their native name to the first alternative name;
    /// genders become a style note so pronouns come out right.
    pub fn to_context_note(&self) -> ContextNote {
        let mut note = ContextNote {
            title: self.display_title().map(str::to_string),
            synopsis: self
                .description
                .as_deref()
                .map(strip_html)
                .filter(|text| !text.is_empty()),
            ..ContextNote::default()
        };

        let mut genders = Vec::new();
        for character in &self.characters {
            let rendering = character.alt_names.iter().find(|name| !name.trim().is_empty());
            if let Some(rendering) = rendering {
                note.add_character(&character.name, rendering);
            }
            if let Some(gender) = character.gender.as_deref().filter(|g| !g.trim().is_empty()) {
                let who = rendering.map_or(character.name.as_str(), String::as_str);
                if !who.trim().is_empty() {
                    genders.push(format!("{} ({})", who.trim(), gender.trim().to_lowercase()));
                }
            }
        }
        if !genders.is_empty() {
            note.style_notes.push(format!("Character genders: {}", genders.join(", ")));
        }
        note
    }
}

/// Catalogue of series metadata
#[async_trait]
pub trait MetadataSource: Send + Sync + Debug {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Best match for `title`, or `None` when nothing is close enough
    async fn lookup(&self, title: &str) -> Result<Option<SeriesMetadata>, ProviderError>;
}

/// Build the configured metadata source, if lookups are enabled
pub fn build_metadata_source(config: &Config) -> Result<Option<Arc<dyn MetadataSource>>, ProviderError> {
    if !config.metadata_enabled() {
        return Ok(None);
    }
    let client = anilist::AniList::new(
        &config.metadata_endpoint,
        config.anilist_token.as_deref(),
        config.timeout_secs,
    )?;
    Ok(Some(Arc::new(client)))
}

/// Look `title` up, logging instead of failing
pub async fn lookup_or_warn(source: &dyn MetadataSource, title: &str) -> Option<SeriesMetadata> {
    match source.lookup(title).await {
        Ok(Some(metadata)) => {
            info!(
                "{} metadata for '{}': {} ({} characters)",
                source.name(),
                title,
                metadata.display_title().unwrap_or(title),
                metadata.characters.len()
            );
            Some(metadata)
        }
        Ok(None) => {
            info!("No {} metadata found for '{}'", source.name(), title);
            None
        }
        Err(e) => {
            warn!("{} metadata lookup for '{}' failed, continuing without it: {}", source.name(), title, e);
            None
        }
    }
}

/// Candidate whose titles come closest to `query`, if any reaches `threshold`
pub fn best_match(query: &str, candidates: Vec<SeriesMetadata>, threshold: f64) -> Option<SeriesMetadata> {
    candidates
        .into_iter()
        .map(|candidate| {
            let score = candidate
                .titles()
                .map(|title| title_similarity(query, title))
                .fold(0.0, f64::max);
            (score, candidate)
        })
        .filter(|(score, _)| *score >= threshold)
        .fold(None, |best: Option<(f64, SeriesMetadata)>, (score, candidate)| match best {
            Some((best_score, _)) if best_score >= score => best,
            _ => Some((score, candidate)),
        })
        .map(|(_, candidate)| candidate)
}

/// Dice coefficient over character bigrams of the normalized titles, in [0, 1]
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let normalize = |s: &str| -> Vec<char> {
        s.chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect()
    };
    let (a, b) = (normalize(a), normalize(b));
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    if a.len() < 2 || b.len() < 2 {
        return 0.0;
    }

    let bigrams = |chars: &[char]| -> Vec<(char, char)> { chars.windows(2).map(|w| (w[0], w[1])).collect() };
    let (left, right) = (bigrams(&a), bigrams(&b));
    let right_set: HashSet<&(char, char)> = right.iter().collect();
    let shared = left.iter().filter(|pair| right_set.contains(pair)).count();
    (2 * shared) as f64 / (left.len() + right.len()) as f64
}

fn strip_html(text: &str) -> String {
    let text = text.replace("<br>", "\n").replace("<br/>", "\n").replace("<br />", "\n");
    let text = HTML_TAG_REGEX.replace_all(&text, "");
    SPACES_REGEX.replace_all(text.trim(), " ").to_string()
}
