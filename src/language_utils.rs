use anyhow::{Result, anyhow};
use isolang::Language;
use std::collections::BTreeSet;

/// Language utilities for caption language tags
///
/// Caption references carry a two-letter tag, either from an explicit
/// language attribute or inferred from the asset URL (`..._SV.xml`). Tags are
/// kept uppercase (`SV`, `NO`, `DA`, `FI`) because that is how the catalog
/// spells them.

/// Tag used when neither the attribute nor the URL reveals a language
pub const UNKNOWN_LANGUAGE: &str = "UND";

// ISO 639-2/B codes that differ from their 639-2/T spelling
fn bibliographic_to_terminology(code: &str) -> &str {
    match code {
        "fre" => "fra",
        "ger" => "deu",
        "dut" => "nld",
        "gre" => "ell",
        "chi" => "zho",
        "cze" => "ces",
        "ice" => "isl",
        "alb" => "sqi",
        "arm" => "hye",
        "baq" => "eus",
        "bur" => "mya",
        "per" => "fas",
        "geo" => "kat",
        "may" => "msa",
        "mac" => "mkd",
        "rum" => "ron",
        "slo" => "slk",
        "wel" => "cym",
        other => other,
    }
}

/// Normalize a language code to an uppercase ISO 639-1 tag
///
/// Accepts 2-letter codes, 3-letter ISO 639-2 codes (T or B) and
/// region-qualified forms such as `sv-SE` or `sv_SE`.
pub fn normalize_language_tag(code: &str) -> Result<String> {
    let primary = code
        .trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase();

    match primary.len() {
        2 => {
            if Language::from_639_1(&primary).is_some() {
                return Ok(primary.to_uppercase());
            }
        }
        3 => {
            let part2t = bibliographic_to_terminology(&primary);
            if let Some(code_639_1) = Language::from_639_3(part2t).and_then(|l| l.to_639_1()) {
                return Ok(code_639_1.to_uppercase());
            }
        }
        _ => {}
    }

    Err(anyhow!("Invalid language code: {}", code))
}

/// Infer a caption's language from the URL suffix convention
///
/// The catalog names caption assets `<anything>_<TAG>.xml`, e.g.
/// `Gomorrah_S01E01_SV.xml`. The two letters before the extension are taken
/// as the tag when they are alphabetic and set off by `_`, `-` or `.`.
pub fn infer_language_from_url(href: &str) -> Option<String> {
    let without_query = href.split(['?', '#']).next().unwrap_or_default();
    let segment = without_query.rsplit('/').next()?;
    let stem = match segment.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => segment,
    };

    let chars: Vec<char> = stem.chars().collect();
    if chars.len() < 2 {
        return None;
    }
    let split = chars.len() - 2;
    let separated = split == 0 || matches!(chars[split - 1], '_' | '-' | '.');
    let tail: String = chars[split..].iter().collect();
    if separated && tail.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(tail.to_uppercase())
    } else {
        None
    }
}

/// Resolve the language tag of a caption reference
///
/// The explicit attribute wins when present and recognisable; otherwise the
/// URL suffix is used; otherwise [`UNKNOWN_LANGUAGE`].
pub fn resolve_caption_language(explicit: Option<&str>, href: &str) -> String {
    if let Some(attr) = explicit.map(str::trim).filter(|a| !a.is_empty()) {
        match normalize_language_tag(attr) {
            Ok(tag) => return tag,
            Err(_) => {
                // Unknown to ISO tables but still the catalog's own word for it
                let upper = attr.to_uppercase();
                if upper.len() == 2 && upper.chars().all(|c| c.is_ascii_alphabetic()) {
                    return upper;
                }
            }
        }
    }

    infer_language_from_url(href).unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string())
}

/// Filename suffix for a language tag
///
/// Subtitle files have historically been named with the country rather
/// than the language for Swedish and Danish.
pub fn filename_suffix(tag: &str) -> String {
    match tag.to_uppercase().as_str() {
        "SV" => "SE".to_string(),
        "DA" => "DK".to_string(),
        other => other.to_string(),
    }
}

/// Get the English language name for a code
pub fn get_language_name(code: &str) -> Result<String> {
    let tag = normalize_language_tag(code)?;
    let lang = Language::from_639_1(&tag.to_lowercase())
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", code))?;

    Ok(lang.to_name().to_string())
}

/// Check if two language codes represent the same language
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (normalize_language_tag(code1), normalize_language_tag(code2)) {
        (Ok(a), Ok(b)) => a == b,
        _ => code1.trim().eq_ignore_ascii_case(code2.trim()),
    }
}

/// Set of accepted caption languages
///
/// An empty filter accepts every language. Filtering happens before a
/// caption asset is requested, so rejected languages are never downloaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageFilter {
    accepted: BTreeSet<String>,
}

impl LanguageFilter {
    /// Filter that accepts everything
    pub fn accept_all() -> Self {
        Self::default()
    }

    /// Build a filter from user supplied codes, validating each one
    pub fn from_codes<I, S>(codes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut accepted = BTreeSet::new();
        for code in codes {
            let code = code.as_ref();
            if code.trim().is_empty() {
                continue;
            }
            accepted.insert(normalize_language_tag(code)?);
        }
        Ok(Self { accepted })
    }

    /// Whether the filter is active
    pub fn is_active(&self) -> bool {
        !self.accepted.is_empty()
    }

    /// Whether a caption with this tag should be fetched
    pub fn accepts(&self, tag: &str) -> bool {
        if !self.is_active() {
            return true;
        }
        self.accepted.iter().any(|a| language_codes_match(a, tag))
    }

    /// Accepted tags, sorted
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.accepted.iter().map(String::as_str)
    }
}
