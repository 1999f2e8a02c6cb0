use anyhow::{Result, Context};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use crate::language_utils;

// @module: File and directory utilities

static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9 .-]").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static DOT_DASH_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.-\.").expect("valid regex"));

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    // @generates: Artifact path for one caption asset
    // @params: output_dir, stem, language tag, extension
    pub fn artifact_path<P: AsRef<Path>>(
        output_dir: P,
        stem: &str,
        language: &str,
        extension: &str,
    ) -> PathBuf {
        let name = format!(
            "{}-{}.{}",
            stem,
            language_utils::filename_suffix(language),
            extension
        );
        output_dir.as_ref().join(filenamify(&name))
    }

    /// Write a string to a file
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        Self::write_bytes(path, content.as_bytes())
    }

    /// Write raw bytes to a file
    pub fn write_bytes<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
        // Ensure the parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))?;

        Ok(())
    }
}

/// Turn a display title into a file name
///
/// `Matlagning del 1 av 10 - Räksmörgås | SVT Play` becomes
/// `matlagning.del.1.av.10-raksmorgas.svt.play`.
pub fn filenamify(title: &str) -> String {
    let folded: String = title.to_lowercase().chars().map(fold_diacritic).collect();
    let kept = DISALLOWED.replace_all(folded.trim(), "");
    let dotted = WHITESPACE.replace_all(kept.trim(), ".");
    DOT_DASH_DOT.replace_all(&dotted, "-").into_owned()
}

// Latin letters with diacritics that show up in Nordic titles
fn fold_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' => 'a',
        'ç' | 'č' | 'ć' => 'c',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ę' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' | 'ń' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        'š' | 'ś' => 's',
        'ž' | 'ź' | 'ż' => 'z',
        'ł' => 'l',
        other => other,
    }
}
