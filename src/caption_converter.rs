use std::fmt;
use log::{debug, warn};
use roxmltree::{Document, Node, ParsingOptions};

use crate::errors::CatalogError;

// @module: Timed-markup to SubRip caption conversion

// @struct: Single converted caption cue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionCue {
    // @field: 1-based sequence number
    pub seq_num: usize,

    // @field: Start time in ms
    pub start_time_ms: u64,

    // @field: End time in ms
    pub end_time_ms: u64,

    // @field: Text lines, in display order
    pub lines: Vec<String>,
}

impl CaptionCue {
    /// Creates a new caption cue
    pub fn new(seq_num: usize, start_time_ms: u64, end_time_ms: u64, lines: Vec<String>) -> Self {
        CaptionCue {
            seq_num,
            start_time_ms,
            end_time_ms,
            lines,
        }
    }

    /// Convert start time to formatted SRT timestamp
    pub fn format_start_time(&self) -> String {
        Self::format_timestamp(self.start_time_ms)
    }

    /// Convert end time to formatted SRT timestamp
    pub fn format_end_time(&self) -> String {
        Self::format_timestamp(self.end_time_ms)
    }

    /// Format a timestamp in milliseconds to SRT format (HH:MM:SS,mmm)
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }

    /// Cue text with lines joined by newlines
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for CaptionCue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.seq_num)?;
        writeln!(f, "{} --> {}", self.format_start_time(), self.format_end_time())?;
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        writeln!(f)
    }
}

/// Parse a markup timestamp to milliseconds
///
/// Accepts `HH:MM:SS.mmm` and `HH:MM:SS:mmm`. The colon form is first
/// rewritten to the decimal form by turning its last colon into a point. A
/// comma separator and a missing fractional part are tolerated. Fractions
/// are read as decimal fractions of a second, so `.5` is 500 ms.
pub fn parse_timestamp(raw: &str) -> Result<u64, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("empty timestamp".to_string());
    }

    let decimal = rewrite_colon_fraction(trimmed);
    let (clock, fraction) = match decimal.split_once(['.', ',']) {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (decimal.as_str(), None),
    };

    let parts: Vec<&str> = clock.split(':').collect();
    if parts.len() != 3 {
        return Err(format!("invalid timestamp format: {}", raw));
    }

    let mut components = [0u64; 3];
    for (slot, part) in components.iter_mut().zip(&parts) {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("invalid timestamp format: {}", raw));
        }
        *slot = part
            .parse()
            .map_err(|_| format!("invalid timestamp format: {}", raw))?;
    }
    let [hours, minutes, seconds] = components;
    if minutes >= 60 || seconds >= 60 {
        return Err(format!("invalid time components in timestamp: {}", raw));
    }

    let millis = match fraction {
        None => 0,
        Some(digits) if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => {
            let mut padded: String = digits.chars().take(3).collect();
            while padded.len() < 3 {
                padded.push('0');
            }
            padded
                .parse::<u64>()
                .map_err(|_| format!("invalid fractional seconds: {}", raw))?
        }
        Some(_) => return Err(format!("invalid fractional seconds: {}", raw)),
    };

    hours
        .checked_mul(3_600_000)
        .and_then(|ms| ms.checked_add(minutes * 60_000 + seconds * 1_000 + millis))
        .ok_or_else(|| format!("timestamp out of range: {}", raw))
}

/// Normalize a markup timestamp to comma-decimal `HH:MM:SS,mmm`
pub fn normalize_timestamp(raw: &str) -> Result<String, String> {
    parse_timestamp(raw).map(CaptionCue::format_timestamp)
}

// `HH:MM:SS:mmm` -> `HH:MM:SS.mmm`; anything else is returned unchanged
fn rewrite_colon_fraction(timestamp: &str) -> String {
    if timestamp.matches(':').count() == 3 && !timestamp.contains(['.', ',']) {
        if let Some(pos) = timestamp.rfind(':') {
            let mut rewritten = timestamp.to_string();
            rewritten.replace_range(pos..=pos, ".");
            return rewritten;
        }
    }
    timestamp.to_string()
}

/// Result of converting one caption document
#[derive(Debug, Clone, Default)]
pub struct Conversion {
    /// Cues in document order, numbered from 1
    pub cues: Vec<CaptionCue>,

    /// One `MalformedCue` error per paragraph that could not be converted
    pub skipped: Vec<CatalogError>,
}

impl Conversion {
    /// Render the cues as a SubRip document
    pub fn to_srt(&self) -> String {
        render_srt(&self.cues)
    }
}

/// Render cues as a SubRip document
pub fn render_srt(cues: &[CaptionCue]) -> String {
    cues.iter().map(|cue| cue.to_string()).collect()
}

/// Converts timed-markup caption documents into numbered cues
pub struct CaptionConverter;

impl CaptionConverter {
    /// Convert a raw caption document, skipping paragraphs without timestamps
    ///
    /// Numbering follows document order over the cues that were kept; no
    /// sorting by time is done. Only an unparseable document is an error.
    pub fn convert(raw: &[u8]) -> Result<Conversion, CatalogError> {
        let text = decode(raw);
        let doc = parse_document(&text)?;

        let mut conversion = Conversion::default();
        for (position, paragraph) in paragraphs(&doc).enumerate() {
            let index = position + 1;
            match paragraph_times(&paragraph, index) {
                Ok((start_ms, end_ms)) => {
                    let seq_num = conversion.cues.len() + 1;
                    conversion.cues.push(CaptionCue::new(
                        seq_num,
                        start_ms,
                        end_ms,
                        paragraph_lines(&paragraph),
                    ));
                }
                Err(e) => {
                    warn!("Skipping caption paragraph: {}", e);
                    conversion.skipped.push(e);
                }
            }
        }

        debug!(
            "Converted {} cues ({} skipped)",
            conversion.cues.len(),
            conversion.skipped.len()
        );

        Ok(conversion)
    }

    /// Convert a raw caption document, failing on the first malformed paragraph
    pub fn convert_strict(raw: &[u8]) -> Result<Vec<CaptionCue>, CatalogError> {
        let text = decode(raw);
        let doc = parse_document(&text)?;

        paragraphs(&doc)
            .enumerate()
            .map(|(position, paragraph)| {
                let (start_ms, end_ms) = paragraph_times(&paragraph, position + 1)?;
                Ok(CaptionCue::new(
                    position + 1,
                    start_ms,
                    end_ms,
                    paragraph_lines(&paragraph),
                ))
            })
            .collect()
    }
}

fn decode(raw: &[u8]) -> String {
    let raw = raw.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

fn parse_document(text: &str) -> Result<Document<'_>, CatalogError> {
    let mut options = ParsingOptions::default();
    options.allow_dtd = true;

    Document::parse_with_options(text, options).map_err(|e| CatalogError::MalformedFeed {
        url: "caption document".to_string(),
        reason: e.to_string(),
    })
}

fn paragraphs<'a, 'input>(
    doc: &'a Document<'input>,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    doc.descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "p")
}

fn paragraph_times(paragraph: &Node, index: usize) -> Result<(u64, u64), CatalogError> {
    let attr = |name: &str| -> Result<u64, CatalogError> {
        let raw = paragraph
            .attribute(name)
            .ok_or_else(|| CatalogError::MalformedCue {
                index,
                reason: format!("missing '{}' attribute", name),
            })?;
        parse_timestamp(raw).map_err(|reason| CatalogError::MalformedCue { index, reason })
    };

    Ok((attr("begin")?, attr("end")?))
}

// Line breaks come only from <br/>; other whitespace is collapsed
fn paragraph_lines(paragraph: &Node) -> Vec<String> {
    let mut lines = vec![String::new()];
    collect_text(paragraph, &mut lines);

    lines
        .into_iter()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect()
}

fn collect_text(node: &Node, lines: &mut Vec<String>) {
    for child in node.children() {
        if child.is_text() {
            if let (Some(text), Some(current)) = (child.text(), lines.last_mut()) {
                current.push_str(text);
            }
        } else if child.is_element() {
            if child.tag_name().name().eq_ignore_ascii_case("br") {
                lines.push(String::new());
            } else {
                collect_text(&child, lines);
            }
        }
    }
}
