/*!
 * Recursive catalog traversal.
 *
 * `CatalogWalker::walk` turns one content identifier or URL into the flat set
 * of caption assets reachable below it:
 *
 * 1. The input is normalized into a canonical browse URL.
 * 2. Each node is fetched once per walk; a shared visited set is checked and
 *    updated atomically before any fetch is started.
 * 3. A rejected session is refreshed once and the fetch retried once.
 * 4. Leaf items yield caption targets; container items are expanded after the
 *    whole node has been classified, siblings concurrently.
 *
 * A failing subtree is recorded and its siblings are still walked; only a
 * failure on the root node, a rejected login or cancellation ends the walk
 * with an error.
 */

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt, stream};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::client::CatalogClient;
use super::feed::FeedParser;
use super::model::{CaptionTarget, CatalogNodeRef, FeedItem};
use crate::errors::CatalogError;
use crate::session::{Session, SessionManager};

/// Everything one walk found
#[derive(Debug, Clone, Default)]
pub struct WalkOutcome {
    /// Caption assets in traversal order
    pub targets: Vec<CaptionTarget>,
    /// Subtrees that could not be fetched or parsed
    pub failures: Vec<CatalogError>,
    /// Feed items that were skipped as malformed
    pub skipped_items: Vec<CatalogError>,
    /// Number of distinct nodes the walk claimed
    pub visited: usize,
}

impl WalkOutcome {
    fn merge(&mut self, other: WalkOutcome) {
        self.targets.extend(other.targets);
        self.failures.extend(other.failures);
        self.skipped_items.extend(other.skipped_items);
    }
}

/// State shared by every task of one walk
struct WalkState<'a> {
    // @field: Canonical URLs already claimed by some task
    visited: Mutex<HashSet<String>>,

    // @field: Bounds in-flight node fetches
    permits: Semaphore,

    cancel: &'a CancellationToken,
}

impl WalkState<'_> {
    /// Claim a URL; false when another task already has it
    fn claim(&self, url: &str) -> bool {
        self.visited.lock().insert(url.to_string())
    }
}

/// Orchestrates fetching, classification and recursion
pub struct CatalogWalker {
    client: Arc<dyn CatalogClient>,
    sessions: Option<Arc<SessionManager>>,
    parser: FeedParser,
    base_url: String,
    concurrency: usize,
}

impl CatalogWalker {
    /// Create a walker
    ///
    /// `sessions` is `None` when the catalog is browsed without
    /// authentication; `base_url` resolves bare identifiers.
    pub fn new(
        client: Arc<dyn CatalogClient>,
        sessions: Option<Arc<SessionManager>>,
        parser: FeedParser,
        base_url: impl Into<String>,
        concurrency: usize,
    ) -> Self {
        Self {
            client,
            sessions,
            parser,
            base_url: base_url.into(),
            concurrency: concurrency.max(1),
        }
    }

    /// Walk the catalog below `input`
    ///
    /// Each call starts with an empty visited set.
    pub async fn walk(
        &self,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<WalkOutcome, CatalogError> {
        let root = CatalogNodeRef::parse(input, &self.base_url)?;
        info!("Walking catalog from {}", root);

        let state = WalkState {
            visited: Mutex::new(HashSet::new()),
            permits: Semaphore::new(self.concurrency),
            cancel,
        };
        state.claim(&root.url);

        let mut outcome = self.expand(&state, root).await?;
        outcome.visited = state.visited.lock().len();

        info!(
            "Walk finished: {} nodes, {} captions, {} failed subtrees, {} skipped items",
            outcome.visited,
            outcome.targets.len(),
            outcome.failures.len(),
            outcome.skipped_items.len()
        );
        Ok(outcome)
    }

    /// Fetch one already-claimed node and expand its children
    fn expand<'a>(
        &'a self,
        state: &'a WalkState<'a>,
        node: CatalogNodeRef,
    ) -> BoxFuture<'a, Result<WalkOutcome, CatalogError>> {
        async move {
            if state.cancel.is_cancelled() {
                return Err(CatalogError::Cancelled);
            }

            let text = self.fetch(state, &node.url).await?;
            let parsed = self.parser.parse(&text, &node.url)?;

            let mut outcome = WalkOutcome {
                skipped_items: parsed.errors,
                ..WalkOutcome::default()
            };
            let mut children = Vec::new();

            for item in parsed.items {
                match item {
                    FeedItem::Leaf(leaf) => {
                        let stem = leaf.naming.stem();
                        for caption in leaf.captions {
                            debug!("Found {} caption for {}", caption.language, stem);
                            outcome.targets.push(CaptionTarget {
                                caption,
                                stem: stem.clone(),
                                node_url: node.url.clone(),
                            });
                        }
                    }
                    FeedItem::Container(container) => {
                        match self.resolve_child(&node, &container.link) {
                            Ok(child) if child.url == node.url => {
                                debug!("Ignoring self link in {}", node.url);
                            }
                            Ok(child) => {
                                let fresh = state.claim(&child.url);
                                if fresh {
                                    children.push(child);
                                } else {
                                    debug!("Already visited {}", child.url);
                                }
                            }
                            Err(e) => {
                                warn!("Unusable child link in {}: {}", node.url, e);
                                outcome.failures.push(e);
                            }
                        }
                    }
                }
            }

            let results: Vec<_> = stream::iter(children)
                .map(|child| {
                    let url = child.url.clone();
                    self.expand(state, child).map(move |result| (url, result))
                })
                .buffered(self.concurrency)
                .collect()
                .await;

            for (url, result) in results {
                match result {
                    Ok(child_outcome) => outcome.merge(child_outcome),
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        error!("Subtree {} failed: {}", url, e);
                        outcome.failures.push(e);
                    }
                }
            }

            Ok(outcome)
        }
        .boxed()
    }

    /// Turn a container's link into a node reference on the parent's host
    fn resolve_child(
        &self,
        parent: &CatalogNodeRef,
        link: &str,
    ) -> Result<CatalogNodeRef, CatalogError> {
        let absolute = Url::parse(&parent.url)
            .and_then(|base| base.join(link.trim()))
            .map_err(|e| CatalogError::CatalogFetch {
                url: link.to_string(),
                reason: format!("unusable child link: {}", e),
            })?;

        CatalogNodeRef::parse(absolute.as_str(), &self.base_url).map_err(|e| {
            CatalogError::CatalogFetch {
                url: link.to_string(),
                reason: format!("unusable child link: {}", e),
            }
        })
    }

    /// Fetch a node, refreshing a rejected session once
    async fn fetch(&self, state: &WalkState<'_>, url: &str) -> Result<String, CatalogError> {
        let session = match &self.sessions {
            Some(manager) => Some(manager.ensure().await?),
            None => None,
        };

        let first = self.fetch_once(state, url, session.as_deref()).await;
        match first {
            Err(CatalogError::Unauthorized { .. }) => match (&self.sessions, session) {
                (Some(manager), Some(stale)) => {
                    info!("Session rejected for {}, logging in again", url);
                    let fresh = manager.refresh(Some(&*stale)).await?;
                    match self.fetch_once(state, url, Some(&*fresh)).await {
                        Err(CatalogError::Unauthorized { url }) => Err(CatalogError::CatalogFetch {
                            url,
                            reason: "session rejected again after re-login".to_string(),
                        }),
                        other => other,
                    }
                }
                _ => Err(CatalogError::CatalogFetch {
                    url: url.to_string(),
                    reason: "unauthorized and authentication is disabled".to_string(),
                }),
            },
            other => other,
        }
    }

    async fn fetch_once(
        &self,
        state: &WalkState<'_>,
        url: &str,
        session: Option<&Session>,
    ) -> Result<String, CatalogError> {
        let _permit = tokio::select! {
            _ = state.cancel.cancelled() => return Err(CatalogError::Cancelled),
            permit = state.permits.acquire() => permit.map_err(|_| CatalogError::Cancelled)?,
        };

        tokio::select! {
            _ = state.cancel.cancelled() => Err(CatalogError::Cancelled),
            result = self.client.fetch_node(url, session) => result,
        }
    }
}
