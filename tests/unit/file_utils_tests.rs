/*!
 * Tests for file naming and writing
 */

use anyhow::Result;
use capfetch::file_utils::{filenamify, FileManager};
use std::fs;
use crate::common;

#[test]
fn test_filenamify_withPunctuation_shouldDropIt() {
    assert_eq!(filenamify("  Game of Thrones: Winter's Coming!  "), "game.of.thrones.winters.coming");
    assert_eq!(filenamify("Lilyhammer - Ærlig talt"), "lilyhammer-rlig.talt");
}

#[test]
fn test_filenamify_withDiacritics_shouldFoldToAscii() {
    assert_eq!(filenamify("Smörgåsbord Ødegård Café"), "smorgasbord.odegard.cafe");
}

#[test]
fn test_artifactPath_withEpisodeStem_shouldCombineStemAndSuffix() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let raw = FileManager::artifact_path(temp_dir.path(), "Foo.S01E03", "SV", "xml");
    let srt = FileManager::artifact_path(temp_dir.path(), "Foo.S01E03", "SV", "srt");

    assert_eq!(raw, temp_dir.path().join("foo.s01e03-se.xml"));
    assert_eq!(srt, temp_dir.path().join("foo.s01e03-se.srt"));
    Ok(())
}

#[test]
fn test_writeToFile_shouldOverwriteExistingContent() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "out.srt", "old")?;

    FileManager::write_to_file(&path, "new")?;

    assert_eq!(fs::read_to_string(&path)?, "new");
    Ok(())
}

#[test]
fn test_ensureDir_shouldCreateNestedDirectories() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let nested = temp_dir.path().join("a").join("b");

    FileManager::ensure_dir(&nested)?;
    FileManager::ensure_dir(&nested)?;

    assert!(nested.is_dir());
    Ok(())
}
