/*!
 * Error types for the capfetch application.
 *
 * `CatalogError` covers everything the catalog core can fail with: bad input,
 * rejected credentials, unreachable nodes, malformed feed items and cues.
 * `AppError` wraps it together with I/O and configuration failures for the
 * application edge.
 */

use thiserror::Error;

/// Errors produced by catalog traversal, session handling and caption conversion
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// No node identifier could be extracted from the user's input
    #[error("Can not find an ID in '{0}'")]
    InvalidInput(String),

    /// The identity provider rejected the credentials
    #[error("Login rejected: {0}")]
    Auth(String),

    /// The catalog service rejected the current session
    #[error("Session rejected by catalog service for {url}")]
    Unauthorized {
        /// URL that answered with an authentication failure
        url: String,
    },

    /// A node could not be fetched, even after a re-login
    #[error("Failed to fetch {url}: {reason}")]
    CatalogFetch {
        /// Canonical fetch URL of the node
        url: String,
        /// Human readable cause
        reason: String,
    },

    /// A whole feed document could not be parsed
    #[error("Malformed feed document from {url}: {reason}")]
    MalformedFeed {
        /// Where the document came from
        url: String,
        /// Parser message
        reason: String,
    },

    /// A single feed item lacks fields needed to process it
    #[error("Malformed feed item #{index}: {reason}")]
    MalformedFeedItem {
        /// Position of the item inside its feed document
        index: usize,
        /// What is missing or unparseable
        reason: String,
    },

    /// A single caption paragraph lacks a usable timestamp
    #[error("Malformed cue #{index}: {reason}")]
    MalformedCue {
        /// Position of the paragraph inside the markup document (1-based)
        index: usize,
        /// What is missing or unparseable
        reason: String,
    },

    /// The caller cancelled the run
    #[error("Operation cancelled")]
    Cancelled,

    /// The session store could not be read or written
    #[error("Session storage error: {0}")]
    Storage(String),
}

impl CatalogError {
    /// Whether this error should abort the whole run rather than one subtree or item
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::Auth(_) | Self::Cancelled | Self::Storage(_)
        )
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from the catalog core
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Error in the configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<CatalogError>() {
            Ok(catalog) => Self::Catalog(catalog),
            Err(other) => Self::Unknown(other.to_string()),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
