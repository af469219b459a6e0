/*!
 * Glossary and narrative context shared across chunks.
 *
 * `TranslationContext` is the accumulator threaded through the translation
 * fold: each chunk reads a snapshot of it and the terms a response flags are
 * merged back before the next chunk is composed. Entries are keyed by source
 * term; a later rendering replaces an earlier one and the disagreement is
 * logged as a warning.
 */

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A fixed source term to target rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    /// Term as it appears in the source
    pub source: String,
    /// Agreed rendering in the target language
    pub target: String,
    /// Disambiguation or usage note
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl GlossaryEntry {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        GlossaryEntry {
            source: source.into(),
            target: target.into(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Two different renderings given for the same source term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderingConflict {
    pub source: String,
    pub previous: String,
    pub current: String,
}

/// Source term to rendering table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<GlossaryEntry>", into = "Vec<GlossaryEntry>")]
pub struct Glossary {
    entries: BTreeMap<String, GlossaryEntry>,
}

impl From<Vec<GlossaryEntry>> for Glossary {
    fn from(entries: Vec<GlossaryEntry>) -> Self {
        let mut glossary = Glossary::default();
        for entry in entries {
            glossary.insert(entry);
        }
        glossary
    }
}

impl From<Glossary> for Vec<GlossaryEntry> {
    fn from(glossary: Glossary) -> Self {
        glossary.entries.into_values().collect()
    }
}

impl Glossary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite. Returns the conflict when the term already had a
    /// different rendering. Entries with a blank side are ignored.
    pub fn insert(&mut self, entry: GlossaryEntry) -> Option<RenderingConflict> {
        let source = entry.source.trim().to_string();
        let target = entry.target.trim().to_string();
        if source.is_empty() || target.is_empty() {
            debug!("Ignoring glossary entry with a blank side: {:?}", entry);
            return None;
        }

        let entry = GlossaryEntry {
            source: source.clone(),
            target,
            note: entry.note.filter(|n| !n.trim().is_empty()),
        };
        let previous = self.entries.insert(source.clone(), entry.clone())?;

        // An update without a note keeps the one we had
        if entry.note.is_none() && previous.note.is_some() {
            if let Some(current) = self.entries.get_mut(&source) {
                current.note = previous.note.clone();
            }
        }

        (previous.target != entry.target).then(|| RenderingConflict {
            source,
            previous: previous.target,
            current: entry.target,
        })
    }

    pub fn get(&self, source: &str) -> Option<&GlossaryEntry> {
        self.entries.get(source)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by source term
    pub fn iter(&self) -> impl Iterator<Item = &GlossaryEntry> {
        self.entries.values()
    }

    /// Merge `other` into this glossary, `other` winning on conflicts
    pub fn merge(&mut self, other: Glossary) -> Vec<RenderingConflict> {
        other
            .entries
            .into_values()
            .filter_map(|entry| self.insert(entry))
            .collect()
    }

    /// Compact `{source: target}` view used in prompts
    pub fn renderings(&self) -> BTreeMap<String, String> {
        self.entries
            .values()
            .map(|e| (e.source.clone(), e.target.clone()))
            .collect()
    }

    /// `{source: note}` for entries that carry a note
    pub fn notes(&self) -> BTreeMap<String, String> {
        self.entries
            .values()
            .filter_map(|e| e.note.as_ref().map(|n| (e.source.clone(), n.clone())))
            .collect()
    }
}

/// Narrative metadata that helps the model translate consistently
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextNote {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synopsis: Option<String>,

    /// Character name in the source to name in the target
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub characters: BTreeMap<String, String>,

    /// Register, tone and other target-language guidance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub style_notes: Vec<String>,
}

impl ContextNote {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.synopsis.is_none() && self.characters.is_empty() && self.style_notes.is_empty()
    }

    /// Add or rename a character, reporting a changed rendering
    pub fn add_character(&mut self, source: &str, target: &str) -> Option<RenderingConflict> {
        let (source, target) = (source.trim(), target.trim());
        if source.is_empty() || target.is_empty() {
            return None;
        }
        let previous = self.characters.insert(source.to_string(), target.to_string())?;
        (previous != target).then(|| RenderingConflict {
            source: source.to_string(),
            previous,
            current: target.to_string(),
        })
    }

    /// Fold a newer note into this one. Present fields win; style notes are
    /// appended without duplicates.
    pub fn merge(&mut self, other: ContextNote) -> Vec<RenderingConflict> {
        if let Some(title) = other.title.filter(|t| !t.trim().is_empty()) {
            self.title = Some(title);
        }
        if let Some(synopsis) = other.synopsis.filter(|s| !s.trim().is_empty()) {
            self.synopsis = Some(synopsis);
        }
        for note in other.style_notes {
            if !note.trim().is_empty() && !self.style_notes.contains(&note) {
                self.style_notes.push(note);
            }
        }
        other
            .characters
            .iter()
            .filter_map(|(source, target)| self.add_character(source, target))
            .collect()
    }
}

/// Whether a flagged term names a character or is a general glossary term
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermKind {
    #[default]
    #[serde(alias = "name", alias = "place", alias = "other")]
    Term,
    #[serde(alias = "person")]
    Character,
}

/// A term surfaced by the model while translating or extracting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredTerm {
    #[serde(alias = "original")]
    pub source: String,
    #[serde(alias = "translated", alias = "translation")]
    pub target: String,
    #[serde(default, alias = "description", skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub kind: TermKind,
}

/// Context note plus glossary for one series and target language
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationContext {
    #[serde(default)]
    pub note: ContextNote,
    #[serde(default)]
    pub glossary: Glossary,
}

impl TranslationContext {
    pub fn new(note: ContextNote, glossary: Glossary) -> Self {
        TranslationContext { note, glossary }
    }

    pub fn is_empty(&self) -> bool {
        self.note.is_empty() && self.glossary.is_empty()
    }

    /// Merge terms flagged by a response. Characters go to the note, the
    /// rest to the glossary. Returns how many terms were taken.
    pub fn absorb(&mut self, terms: Vec<DiscoveredTerm>) -> usize {
        let mut taken = 0;
        for term in terms {
            let conflict = match term.kind {
                TermKind::Character => self.note.add_character(&term.source, &term.target),
                TermKind::Term => {
                    let mut entry = GlossaryEntry::new(&term.source, &term.target);
                    entry.note = term.note;
                    self.glossary.insert(entry)
                }
            };
            if let Some(conflict) = conflict {
                report_conflict(&conflict);
            }
            taken += 1;
        }
        taken
    }

    /// Fold another context into this one, the other winning on conflicts
    pub fn merge(&mut self, other: TranslationContext) {
        let mut conflicts = self.note.merge(other.note);
        conflicts.extend(self.glossary.merge(other.glossary));
        conflicts.iter().for_each(report_conflict);
    }
}

fn report_conflict(conflict: &RenderingConflict) {
    warn!(
        "Conflicting renderings for '{}': '{}' replaced by '{}'",
        conflict.source, conflict.previous, conflict.current
    );
}
