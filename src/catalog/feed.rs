/*!
 * Feed document parsing and item classification.
 *
 * The catalog answers browse requests with an RSS-like XML document. Items
 * are read into a loose `RawItem` first and then classified into the tagged
 * `FeedItem` type, so the walker never has to probe for optional fields.
 *
 * Expected item shape (namespace prefixes are ignored, element names are
 * matched case-insensitively):
 *
 * ```xml
 * <item>
 *   <title>Episode 3</title>
 *   <clearleap:series>Foo</clearleap:series>
 *   <clearleap:season>1</clearleap:season>
 *   <clearleap:episodeInSeason>3</clearleap:episodeInSeason>
 *   <media:subtitle href="https://cdn/foo_s1e3_SV.xml" lang="sv"/>
 *   <media:keywords>season</media:keywords>
 *   <link>https://host/cloffice/client/web/browse/3bc87b76</link>
 * </item>
 * ```
 */

use log::{debug, warn};
use roxmltree::{Document, Node, ParsingOptions};
use serde::{Deserialize, Serialize};

use super::model::{CaptionRef, ContainerItem, FeedItem, LeafItem, Naming};
use crate::errors::CatalogError;
use crate::language_utils;

/// How container items are told apart from unrelated show-page items
///
/// Early catalog schema revisions mark nothing and treat every item without
/// captions as a container; later revisions tag season groupings with a
/// keyword. The parser follows exactly one of the two contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContainerDetection {
    /// Only items whose keywords contain the season marker are containers
    #[default]
    KeywordMarker,
    /// Every item without caption references is a container
    MissingCaptions,
}

/// Caption element as found in the feed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCaption {
    /// `href` attribute
    pub href: Option<String>,
    /// `lang` attribute, if the feed version has one
    pub lang: Option<String>,
}

/// Feed item before classification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    /// Position inside the document, from 0
    pub index: usize,
    /// Caption elements
    pub captions: Vec<RawCaption>,
    /// Series title
    pub series: Option<String>,
    /// Season number text
    pub season: Option<String>,
    /// Episode-in-season number text
    pub episode: Option<String>,
    /// Item title
    pub title: Option<String>,
    /// Keyword tokens
    pub keywords: Vec<String>,
    /// Child link
    pub link: Option<String>,
}

/// Items of one feed document plus the items that had to be skipped
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    /// Classified items in document order
    pub items: Vec<FeedItem>,
    /// One `MalformedFeedItem` per skipped item
    pub errors: Vec<CatalogError>,
    /// Items that were neither leaves nor containers
    pub ignored: usize,
}

/// Parses feed documents according to one container-detection contract
#[derive(Debug, Clone)]
pub struct FeedParser {
    detection: ContainerDetection,
    season_keyword: String,
}

impl Default for FeedParser {
    fn default() -> Self {
        Self::new(ContainerDetection::default(), "season")
    }
}

impl FeedParser {
    /// Create a parser
    pub fn new(detection: ContainerDetection, season_keyword: impl Into<String>) -> Self {
        Self {
            detection,
            season_keyword: season_keyword.into(),
        }
    }

    /// The container-detection contract in use
    pub fn detection(&self) -> ContainerDetection {
        self.detection
    }

    /// Parse and classify one feed document
    ///
    /// An unparseable document is an error; a malformed item is recorded in
    /// [`ParsedFeed::errors`] and the remaining items are still returned.
    pub fn parse(&self, text: &str, url: &str) -> Result<ParsedFeed, CatalogError> {
        let raw_items = read_items(text, url)?;
        let mut parsed = ParsedFeed::default();

        for raw in raw_items {
            match self.classify(raw) {
                Ok(Some(item)) => parsed.items.push(item),
                Ok(None) => parsed.ignored += 1,
                Err(e) => {
                    warn!("Skipping feed item from {}: {}", url, e);
                    parsed.errors.push(e);
                }
            }
        }

        debug!(
            "Parsed {} items from {} ({} skipped, {} ignored)",
            parsed.items.len(),
            url,
            parsed.errors.len(),
            parsed.ignored
        );

        Ok(parsed)
    }

    /// Classify one raw item
    ///
    /// Any caption reference makes an item a leaf, whatever else it carries.
    /// `Ok(None)` means the item is neither a leaf nor a container under the
    /// active contract.
    pub fn classify(&self, raw: RawItem) -> Result<Option<FeedItem>, CatalogError> {
        if !raw.captions.is_empty() {
            return classify_leaf(raw).map(|leaf| Some(FeedItem::Leaf(leaf)));
        }

        let is_container = match self.detection {
            ContainerDetection::MissingCaptions => true,
            ContainerDetection::KeywordMarker => raw
                .keywords
                .iter()
                .any(|k| k.eq_ignore_ascii_case(&self.season_keyword)),
        };
        if !is_container {
            return Ok(None);
        }

        match raw.link.filter(|l| !l.is_empty()) {
            Some(link) => Ok(Some(FeedItem::Container(ContainerItem {
                link,
                title: raw.title,
            }))),
            None => Err(CatalogError::MalformedFeedItem {
                index: raw.index,
                reason: "container item has no link".to_string(),
            }),
        }
    }
}

fn classify_leaf(raw: RawItem) -> Result<LeafItem, CatalogError> {
    let index = raw.index;
    let malformed = |reason: String| CatalogError::MalformedFeedItem { index, reason };

    let mut captions = Vec::with_capacity(raw.captions.len());
    for caption in &raw.captions {
        let href = caption
            .href
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| malformed("caption reference without href".to_string()))?;
        captions.push(CaptionRef {
            href: href.to_string(),
            language: language_utils::resolve_caption_language(caption.lang.as_deref(), href),
        });
    }

    let naming = match (&raw.series, &raw.season, &raw.episode) {
        (Some(series), Some(season), Some(episode)) => Naming::Episode {
            series: series.clone(),
            season: parse_number(season)
                .ok_or_else(|| malformed(format!("season '{}' is not a number", season)))?,
            episode: parse_number(episode)
                .ok_or_else(|| malformed(format!("episode '{}' is not a number", episode)))?,
        },
        _ => match raw.title.filter(|t| !t.is_empty()) {
            Some(title) => Naming::Title(title),
            None => {
                return Err(malformed(
                    "leaf item has neither series/season/episode nor a title".to_string(),
                ));
            }
        },
    };

    Ok(LeafItem { naming, captions })
}

fn parse_number(text: &str) -> Option<u32> {
    text.trim().parse().ok()
}

/// Read the `item` elements of a feed document without classifying them
pub fn read_items(text: &str, url: &str) -> Result<Vec<RawItem>, CatalogError> {
    let mut options = ParsingOptions::default();
    options.allow_dtd = true;

    let doc = Document::parse_with_options(text, options).map_err(|e| {
        CatalogError::MalformedFeed {
            url: url.to_string(),
            reason: e.to_string(),
        }
    })?;

    Ok(doc
        .descendants()
        .filter(|n| is_named(n, "item"))
        .enumerate()
        .map(|(index, item)| read_item(index, &item))
        .collect())
}

fn read_item(index: usize, item: &Node) -> RawItem {
    let mut raw = RawItem {
        index,
        ..Default::default()
    };

    raw.captions = item
        .descendants()
        .filter(|n| is_named(n, "subtitle"))
        .map(|n| RawCaption {
            href: attribute(&n, "href"),
            lang: attribute(&n, "lang"),
        })
        .collect();

    for child in item.children().filter(|n| n.is_element()) {
        let name = child.tag_name().name().to_ascii_lowercase();
        match name.as_str() {
            "series" => raw.series = element_text(&child),
            "season" => raw.season = element_text(&child),
            "episodeinseason" => raw.episode = element_text(&child),
            "title" => raw.title = element_text(&child),
            "link" => raw.link = element_text(&child),
            "keywords" => {
                if let Some(text) = element_text(&child) {
                    raw.keywords.extend(
                        text.split([',', ' ', '\t', '\n'])
                            .map(str::trim)
                            .filter(|k| !k.is_empty())
                            .map(str::to_string),
                    );
                }
            }
            _ => {}
        }
    }

    raw
}

fn is_named(node: &Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name().eq_ignore_ascii_case(name)
}

// Attributes are matched by local name so `xml:lang` and `lang` both work
fn attribute(node: &Node, name: &str) -> Option<String> {
    node.attributes()
        .find(|a| a.name().eq_ignore_ascii_case(name))
        .map(|a| a.value().trim().to_string())
}

fn element_text(node: &Node) -> Option<String> {
    let text: String = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
