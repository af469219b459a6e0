/*!
 * Tests for the glossary accumulator and the persisted context store
 */

use anyhow::Result;
use std::fs;

use subglot::translation::glossary::{DiscoveredTerm, TermKind};
use subglot::translation::store::{self, ContextStore, FileContextStore, StoreKey};
use subglot::translation::{ContextNote, Glossary, GlossaryEntry, TranslationContext};

use crate::common;

fn sample_context() -> TranslationContext {
    let mut glossary = Glossary::new();
    glossary.insert(GlossaryEntry::new("霧山", "Kiri Mountain").with_note("the village's mountain"));
    let mut note = ContextNote {
        title: Some("Kiri no Yama".to_string()),
        ..ContextNote::default()
    };
    note.add_character("愛子", "Aiko");
    TranslationContext::new(note, glossary)
}

/// A later rendering of the same term replaces the earlier one
#[test]
fn test_glossary_insert_withConflict_shouldKeepLatestAndReport() {
    let mut glossary = Glossary::new();
    assert!(glossary.insert(GlossaryEntry::new("霧山", "Misty Mountain")).is_none());

    let conflict = glossary.insert(GlossaryEntry::new("霧山", "Kiri Mountain"));

    let conflict = conflict.expect("should report the changed rendering");
    assert_eq!(conflict.previous, "Misty Mountain");
    assert_eq!(glossary.get("霧山").map(|e| e.target.as_str()), Some("Kiri Mountain"));
    assert_eq!(glossary.len(), 1);
}

/// Terms flagged by a reply are split between characters and glossary
#[test]
fn test_translationContext_absorb_shouldRouteByKind() {
    let mut context = TranslationContext::default();
    let taken = context.absorb(vec![
        DiscoveredTerm {
            source: "愛子".to_string(),
            target: "Aiko".to_string(),
            note: None,
            kind: TermKind::Character,
        },
        DiscoveredTerm {
            source: "霧山".to_string(),
            target: "Kiri Mountain".to_string(),
            note: Some("place".to_string()),
            kind: TermKind::Term,
        },
    ]);

    assert_eq!(taken, 2);
    assert_eq!(context.note.characters.get("愛子").map(String::as_str), Some("Aiko"));
    assert_eq!(context.glossary.get("霧山").and_then(|e| e.note.as_deref()), Some("place"));
}

/// Saved context comes back unchanged
#[test]
fn test_fileContextStore_saveThenLoad_shouldRestoreContext() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let store = FileContextStore::new();
    let key = StoreKey::new(temp_dir.path(), "en");

    assert!(store.load(&key)?.is_none());
    store.save(&key, &sample_context())?;

    let path = FileContextStore::path_for(&key);
    assert_eq!(path, temp_dir.path().join(".translated").join("context.en.json"));
    assert_eq!(store.load(&key)?, Some(sample_context()));
    Ok(())
}

/// Equivalent language codes share one stored context
#[test]
fn test_storeKey_withEquivalentCodes_shouldShareFile() {
    let a = StoreKey::new("/shows/kiri", "fre");
    let b = StoreKey::new("/shows/kiri", "fr");
    assert_eq!(a.file_name(), b.file_name());
    assert_ne!(a.file_name(), StoreKey::new("/shows/kiri", "de").file_name());
}

/// Free-form language names produce a portable file name
#[test]
fn test_storeKey_withFreeFormLanguage_shouldHashName() {
    let name = StoreKey::new("/shows/kiri", "Brazilian Portuguese").file_name();
    assert!(name.starts_with("context."));
    assert!(name.ends_with(".json"));
    assert!(!name.contains(' '));
}

/// A corrupt store degrades to an empty context
#[test]
fn test_loadOrEmpty_withCorruptFile_shouldReturnEmpty() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let key = StoreKey::new(temp_dir.path(), "en");
    let path = FileContextStore::path_for(&key);
    fs::create_dir_all(path.parent().expect("store dir"))?;
    fs::write(&path, "{ not json")?;

    let context = store::load_or_empty(&FileContextStore::new(), &key);
    assert!(context.is_empty());
    Ok(())
}
