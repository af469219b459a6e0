/*!
 * Tests for file utility functions
 */

use anyhow::Result;
use std::fs;
use std::path::Path;
use subglot::file_utils::FileManager;

use crate::common;

/// Output files are named `<basename>.<postfix>.<ext>`
#[test]
fn test_generateOutputPath_withPostfix_shouldKeepExtension() {
    assert_eq!(
        FileManager::generate_output_path(Path::new("/shows/ep01.srt"), "fr"),
        Path::new("/shows/ep01.fr.srt")
    );
    assert_eq!(
        FileManager::generate_output_path(Path::new("movie.en.ass"), "zh-Hans"),
        Path::new("movie.en.zh-Hans.ass")
    );
}

/// Directory discovery is sorted, non-recursive and skips previous outputs
#[test]
fn test_findSubtitleFiles_withDirectory_shouldListInputsOnly() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path();
    common::create_test_file(dir, "ep02.srt", common::SAMPLE_SRT)?;
    common::create_test_file(dir, "ep01.ass", common::SAMPLE_ASS)?;
    common::create_test_file(dir, "ep01.fr.ass", common::SAMPLE_ASS)?;
    common::create_test_file(dir, "notes.txt", "not a subtitle")?;
    fs::create_dir(dir.join("extras"))?;
    common::create_test_file(&dir.join("extras"), "ep03.srt", common::SAMPLE_SRT)?;

    let files = FileManager::find_subtitle_files(dir, "fr")?;
    let names: Vec<String> = files
        .iter()
        .map(|f| f.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["ep01.ass", "ep02.srt"]);
    Ok(())
}

/// A single file must have a supported extension
#[test]
fn test_findSubtitleFiles_withUnsupportedFile_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let file = common::create_test_file(temp_dir.path(), "episode.vtt", "WEBVTT")?;

    let error = FileManager::find_subtitle_files(&file, "fr").expect_err("vtt is not supported");
    assert!(error.to_string().contains("Unsupported file format"));
    Ok(())
}

/// Atomic writes replace the whole file
#[test]
fn test_writeAtomic_withExistingFile_shouldReplaceContent() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "out.srt", "old content that is longer")?;

    FileManager::write_atomic(&path, "new")?;

    assert_eq!(fs::read_to_string(&path)?, "new");
    assert_eq!(fs::read_dir(temp_dir.path())?.count(), 1, "no temporary file should be left behind");
    Ok(())
}
