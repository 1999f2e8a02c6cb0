/*!
 * Catalog data model.
 *
 * A catalog is a tree of feed documents (show -> season -> episode, or a
 * standalone movie). Each fetched document yields feed items that are either
 * leaves carrying caption references or containers pointing at child nodes.
 */

use std::fmt;
use url::Url;

use crate::errors::CatalogError;
use crate::language_utils;

/// Path of the browse endpoint, relative to the catalog origin
pub const BROWSE_PATH: &str = "cloffice/client/web/browse/";

/// Reference to one catalog node
///
/// Built from a user input or a container's child link. The identifier is the
/// trailing path segment; the fetch URL is rebuilt against the browse endpoint
/// so that every way of addressing the same node maps to one canonical URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogNodeRef {
    /// Opaque node identifier
    pub id: String,
    /// Canonical fetch URL
    pub url: String,
}

impl CatalogNodeRef {
    /// Normalize a URL or bare identifier into a node reference
    ///
    /// Absolute URLs keep their own scheme and host; bare identifiers are
    /// resolved against `default_base`.
    pub fn parse(input: &str, default_base: &str) -> Result<Self, CatalogError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(CatalogError::InvalidInput(input.to_string()));
        }

        match Url::parse(trimmed) {
            Ok(parsed) if parsed.has_host() => {
                let id = parsed
                    .path_segments()
                    .and_then(|mut segments| segments.next_back())
                    .unwrap_or_default()
                    .to_string();
                let origin = parsed.origin().ascii_serialization();
                Self::build(input, id, &origin)
            }
            _ => {
                let id = trimmed.rsplit('/').next().unwrap_or_default().to_string();
                if default_base.trim().is_empty() {
                    return Err(CatalogError::InvalidInput(format!(
                        "{} (no catalog base URL configured for bare identifiers)",
                        input
                    )));
                }
                Self::build(input, id, default_base)
            }
        }
    }

    fn build(input: &str, id: String, base: &str) -> Result<Self, CatalogError> {
        if id.is_empty() {
            return Err(CatalogError::InvalidInput(input.to_string()));
        }

        let url = Url::parse(&format!("{}/{}{}", base.trim_end_matches('/'), BROWSE_PATH, id))
            .map_err(|e| CatalogError::InvalidInput(format!("{}: {}", input, e)))?;

        Ok(Self {
            id,
            url: url.to_string(),
        })
    }
}

impl fmt::Display for CatalogNodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Reference to one caption asset
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaptionRef {
    /// Source URL of the timed-markup document
    pub href: String,
    /// Uppercase two-letter language tag
    pub language: String,
}

/// How a leaf item is named on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Naming {
    /// Episode of a series
    Episode {
        /// Series title
        series: String,
        /// Season number
        season: u32,
        /// Episode number within the season
        episode: u32,
    },
    /// Standalone work named by its own title
    Title(String),
}

impl Naming {
    /// Filename stem: `<series>.SxxEyy` or the title
    pub fn stem(&self) -> String {
        match self {
            Self::Episode {
                series,
                season,
                episode,
            } => format!("{}.S{:02}E{:02}", series, season, episode),
            Self::Title(title) => title.clone(),
        }
    }
}

/// Feed item that references caption assets directly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafItem {
    /// Naming metadata
    pub naming: Naming,
    /// At least one caption reference
    pub captions: Vec<CaptionRef>,
}

/// Feed item that points at a child catalog node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerItem {
    /// Child link as found in the feed
    pub link: String,
    /// Item title, for logging
    pub title: Option<String>,
}

/// Classified feed item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedItem {
    /// Item with caption references
    Leaf(LeafItem),
    /// Grouping item with a child link
    Container(ContainerItem),
}

/// Caption asset found by a traversal, with its resolved naming stem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionTarget {
    /// The caption asset
    pub caption: CaptionRef,
    /// Filename stem from the owning leaf item
    pub stem: String,
    /// Fetch URL of the node the item came from
    pub node_url: String,
}

impl CaptionTarget {
    /// Tab-separated listing line: stem, language with its English name, href
    pub fn listing(&self) -> String {
        let language = match language_utils::get_language_name(&self.caption.language) {
            Ok(name) => format!("{} ({})", self.caption.language, name),
            Err(_) => self.caption.language.clone(),
        };
        format!("{}\t{}\t{}", self.stem, language, self.caption.href)
    }
}
