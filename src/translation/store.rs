/*!
 * Persisted context store.
 *
 * Context extracted for one episode is reused by its siblings, so the store
 * lives in a `.translated/` directory beside the subtitle files and is keyed
 * by that directory plus the target language. Files are JSON and replaced
 * atomically. Callers treat every store error as non-fatal.
 */

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::glossary::TranslationContext;
use crate::errors::PersistenceError;
use crate::language_utils;

/// Directory created beside the input files
pub const STORE_DIR_NAME: &str = ".translated";

const STORE_VERSION: u32 = 1;

/// Identifies one stored context: a series directory and a target language
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    directory: PathBuf,
    language: String,
}

impl StoreKey {
    /// Key for subtitles in `directory` translated to `target_language`
    pub fn new(directory: impl Into<PathBuf>, target_language: &str) -> Self {
        StoreKey {
            directory: directory.into(),
            language: language_utils::canonical_code(target_language),
        }
    }

    /// Key for the directory that holds `file`
    pub fn for_file(file: &Path, target_language: &str) -> Self {
        let directory = match file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::new(directory, target_language)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File name inside the store directory. Free-form language names are
    /// hashed so that the name stays portable.
    pub fn file_name(&self) -> String {
        let portable = !self.language.is_empty()
            && self
                .language
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if portable {
            format!("context.{}.json", self.language)
        } else {
            let digest = Sha256::digest(self.language.as_bytes());
            let hex: String = format!("{:x}", digest).chars().take(16).collect();
            format!("context.{}.json", hex)
        }
    }
}

/// On-disk document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredContext {
    pub version: u32,
    pub language: String,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub context: TranslationContext,
}

/// Key-value persistence for translation context
pub trait ContextStore: Send + Sync {
    /// Stored context for `key`, `None` when nothing was saved yet
    fn load(&self, key: &StoreKey) -> Result<Option<TranslationContext>, PersistenceError>;

    /// Replace the stored context for `key`
    fn save(&self, key: &StoreKey, context: &TranslationContext) -> Result<(), PersistenceError>;
}

/// JSON files under `<dir>/.translated/`
#[derive(Debug, Clone, Default)]
pub struct FileContextStore;

impl FileContextStore {
    pub fn new() -> Self {
        FileContextStore
    }

    /// Where the document for `key` lives
    pub fn path_for(key: &StoreKey) -> PathBuf {
        key.directory().join(STORE_DIR_NAME).join(key.file_name())
    }
}

impl ContextStore for FileContextStore {
    fn load(&self, key: &StoreKey) -> Result<Option<TranslationContext>, PersistenceError> {
        let path = Self::path_for(key);
        if !path.exists() {
            debug!("No stored context at {}", path.display());
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let stored: StoredContext = serde_json::from_str(&content)?;
        if stored.version != STORE_VERSION {
            warn!(
                "Stored context {} has version {}, expected {}; ignoring it",
                path.display(),
                stored.version,
                STORE_VERSION
            );
            return Ok(None);
        }
        debug!(
            "Loaded context from {} ({} glossary entries, updated {})",
            path.display(),
            stored.context.glossary.len(),
            stored.updated_at
        );
        Ok(Some(stored.context))
    }

    fn save(&self, key: &StoreKey, context: &TranslationContext) -> Result<(), PersistenceError> {
        let path = Self::path_for(key);
        let dir = key.directory().join(STORE_DIR_NAME);
        std::fs::create_dir_all(&dir)?;

        let stored = StoredContext {
            version: STORE_VERSION,
            language: key.language.clone(),
            updated_at: Utc::now(),
            context: context.clone(),
        };
        let json = serde_json::to_string_pretty(&stored)?;

        let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
        temp.write_all(json.as_bytes())?;
        temp.persist(&path).map_err(|e| PersistenceError::Io(e.error))?;
        debug!("Saved context to {}", path.display());
        Ok(())
    }
}

/// Load, degrading to an empty context on any error
pub fn load_or_empty(store: &dyn ContextStore, key: &StoreKey) -> TranslationContext {
    match store.load(key) {
        Ok(Some(context)) => context,
        Ok(None) => TranslationContext::default(),
        Err(e) => {
            warn!(
                "Could not read stored context for {}: {}; continuing without it",
                key.directory().display(),
                e
            );
            TranslationContext::default()
        }
    }
}

/// Save, logging instead of failing
pub fn save_or_warn(store: &dyn ContextStore, key: &StoreKey, context: &TranslationContext) {
    if let Err(e) = store.save(key, context) {
        warn!("Could not persist context for {}: {}", key.directory().display(), e);
    }
}
