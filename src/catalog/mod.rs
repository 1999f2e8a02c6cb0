/*!
 * Catalog traversal.
 *
 * - `model`: node references, caption references and the tagged feed item type
 * - `feed`: feed document parsing and classification
 * - `client`: transport seam for node and caption fetches
 * - `walker`: recursive traversal with a visited set and session refresh
 */

pub mod client;
pub mod feed;
pub mod model;
pub mod walker;

// Re-export main types
pub use client::{CatalogClient, HttpCatalogClient};
pub use feed::{ContainerDetection, FeedParser};
pub use model::{CaptionRef, CaptionTarget, CatalogNodeRef, FeedItem, Naming};
pub use walker::{CatalogWalker, WalkOutcome};
