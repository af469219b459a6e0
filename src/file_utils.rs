use anyhow::{Context, Result, anyhow};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::language_utils;
use crate::subtitle::SubtitleFormat;

// @module: File and directory utilities

// @const: Bracketed release tags such as [1080p] or (BD)
static BRACKETED_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\[\(\{【][^\]\)\}】]*[\]\)\}】]").unwrap());

// @const: Runs of whitespace
static SPACES_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @generates: `<basename>.<postfix>.<ext>` beside the input
    pub fn generate_output_path<P: AsRef<Path>>(input_file: P, postfix: &str) -> PathBuf {
        let input_file = input_file.as_ref();
        let stem = input_file.file_stem().unwrap_or_default().to_string_lossy();
        let mut output_filename = format!("{}.{}", stem, postfix);
        if let Some(ext) = input_file.extension() {
            output_filename.push('.');
            output_filename.push_str(&ext.to_string_lossy());
        }
        input_file.with_file_name(output_filename)
    }

    // @returns: Language tag of `<name>.<lang>.<ext>` when it names a major language
    pub fn language_hint<P: AsRef<Path>>(path: P) -> Option<String> {
        let stem = path.as_ref().file_stem()?.to_string_lossy().to_string();
        let (_, tag) = stem.rsplit_once('.')?;
        let code = tag.split(['-', '_']).next()?;
        language_utils::lookup_code(code)?
            .to_639_1()
            .map(|_| tag.to_string())
    }

    // @checks: File name already ends with `.<postfix>.<ext>`
    pub fn is_translated_output<P: AsRef<Path>>(path: P, postfix: &str) -> bool {
        let path = path.as_ref();
        path.file_stem()
            .map(|stem| stem.to_string_lossy().ends_with(&format!(".{}", postfix)))
            .unwrap_or(false)
    }

    /// Subtitle files to process for `path`.
    ///
    /// A file must carry a supported extension. A directory yields its
    /// subtitle files (non-recursive, sorted by name), minus outputs of a
    /// previous run.
    pub fn find_subtitle_files<P: AsRef<Path>>(path: P, postfix: &str) -> Result<Vec<PathBuf>> {
        let path = path.as_ref();
        if path.is_file() {
            SubtitleFormat::from_path(path)
                .map_err(|_| anyhow!("Unsupported file format: {}", path.display()))?;
            return Ok(vec![path.to_path_buf()]);
        }
        if !path.is_dir() {
            return Err(anyhow!("Path does not exist: {}", path.display()));
        }

        let mut result = Vec::new();
        for entry in WalkDir::new(path).min_depth(1).max_depth(1).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let candidate = entry.path();
            if candidate.is_file()
                && SubtitleFormat::from_path(candidate).is_ok()
                && !Self::is_translated_output(candidate, postfix)
            {
                result.push(candidate.to_path_buf());
            }
        }
        result.sort();
        Ok(result)
    }

    /// Write `content` so that `path` either keeps its old content or holds
    /// all of the new content, never a prefix.
    pub fn write_atomic<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
        temp.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write temporary file for {}", path.display()))?;
        temp.persist(path)
            .map_err(|e| anyhow!("Failed to move output into place at {}: {}", path.display(), e.error))?;
        Ok(())
    }

    /// Series title guessed from a directory name like `Kiri_no_Yama [BD 1080p]`
    pub fn guess_series_title<P: AsRef<Path>>(dir: P) -> Option<String> {
        let name = dir.as_ref().file_name()?.to_string_lossy().to_string();
        let name = BRACKETED_REGEX.replace_all(&name, " ");
        let name = name.replace(['_', '-', '.'], " ");
        let name = SPACES_REGEX.replace_all(name.trim(), " ").to_string();
        (!name.is_empty()).then_some(name)
    }
}
