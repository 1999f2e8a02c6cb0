use anyhow::{Result, Context};
use futures::{StreamExt, stream};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, warn, info, debug};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::app_config::Config;
use crate::caption_converter::CaptionConverter;
use crate::catalog::{CaptionTarget, CatalogClient, CatalogWalker, FeedParser, HttpCatalogClient};
use crate::errors::CatalogError;
use crate::file_utils::FileManager;
use crate::language_utils::LanguageFilter;
use crate::session::{AuthSettings, HttpAuthClient, SessionManager, SessionStore};

// @module: Application controller for caption retrieval

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Distinct catalog nodes fetched
    pub nodes_visited: usize,
    /// Distinct caption assets found by the walk
    pub captions_found: usize,
    /// Caption assets downloaded and written
    pub written: usize,
    /// Caption assets rejected by the language filter, never requested
    pub skipped_by_filter: usize,
    /// Caption assets whose artifacts already existed
    pub skipped_existing: usize,
    /// Caption assets that could not be fetched, converted or written
    pub failed: usize,
    /// Cues dropped as malformed across all conversions
    pub cues_skipped: usize,
    /// Catalog subtrees that could not be walked
    pub subtree_failures: usize,
    /// Feed items skipped as malformed
    pub items_skipped: usize,
}

/// What happened to one caption asset
#[derive(Debug, Clone, PartialEq, Eq)]
enum TargetOutcome {
    Written { cues_skipped: usize },
    AlreadyPresent,
}

/// Main application controller for caption retrieval
pub struct Controller {
    // @field: App configuration
    config: Config,

    // @field: Catalog transport
    client: Arc<dyn CatalogClient>,

    // @field: Shared session, when authentication is enabled
    sessions: Option<Arc<SessionManager>>,

    // @field: Accepted caption languages
    filter: LanguageFilter,

    // @field: Draw a progress bar while downloading
    show_progress: bool,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let client = HttpCatalogClient::new(
            config.catalog.timeout_secs,
            config.auth.client_name.clone(),
            config.auth.client_version.clone(),
        )?;

        let sessions = if config.auth.enabled {
            let store = SessionStore::open(config.session.backend, config.session.path.as_deref())
                .context("Failed to open session store")?;
            let authenticator = HttpAuthClient::new(
                AuthSettings {
                    endpoint: config.auth.endpoint.clone(),
                    locale: config.auth.locale.clone(),
                    device_type: config.auth.device_type.clone(),
                    client_name: config.auth.client_name.clone(),
                    client_version: config.auth.client_version.clone(),
                },
                config.catalog.timeout_secs,
            )?;
            let manager = SessionManager::new(store, Arc::new(authenticator), config.auth.credentials())?;
            Some(Arc::new(manager))
        } else {
            None
        };

        let mut controller = Self::with_parts(config, Arc::new(client), sessions)?;
        controller.show_progress = true;
        Ok(controller)
    }

    /// Create a controller around existing transport and session parts
    pub fn with_parts(
        config: Config,
        client: Arc<dyn CatalogClient>,
        sessions: Option<Arc<SessionManager>>,
    ) -> Result<Self> {
        let filter = config.output.language_filter()?;
        Ok(Self {
            config,
            client,
            sessions,
            filter,
            show_progress: false,
        })
    }

    /// Walker configured from this controller's settings
    pub fn walker(&self) -> CatalogWalker {
        CatalogWalker::new(
            Arc::clone(&self.client),
            self.sessions.clone(),
            FeedParser::new(
                self.config.catalog.container_detection,
                self.config.catalog.season_keyword.clone(),
            ),
            self.config.catalog.base_url.clone(),
            self.config.catalog.concurrent_requests,
        )
    }

    /// Walk the catalog and return the caption assets the filter accepts, without downloading
    pub async fn list(&self, input: &str, cancel: &CancellationToken) -> Result<Vec<CaptionTarget>> {
        let outcome = self.walker().walk(input, cancel).await?;
        Ok(distinct_by_href(outcome.targets)
            .into_iter()
            .filter(|t| self.filter.accepts(&t.caption.language))
            .collect())
    }

    /// Run the main workflow: walk, filter, download, convert and write
    pub async fn run(&self, input: &str, cancel: &CancellationToken) -> Result<RunSummary> {
        let start_time = std::time::Instant::now();

        let outcome = self.walker().walk(input, cancel).await?;
        let targets = distinct_by_href(outcome.targets);
        let mut summary = RunSummary {
            nodes_visited: outcome.visited,
            captions_found: targets.len(),
            subtree_failures: outcome.failures.len(),
            items_skipped: outcome.skipped_items.len(),
            ..RunSummary::default()
        };

        let (accepted, rejected): (Vec<_>, Vec<_>) = targets
            .into_iter()
            .partition(|t| self.filter.accepts(&t.caption.language));
        summary.skipped_by_filter = rejected.len();
        for target in &rejected {
            debug!("Skipping {} caption for {} (language filter)", target.caption.language, target.stem);
        }

        let output_dir = self.config.output.directory.clone();
        FileManager::ensure_dir(&output_dir)?;

        let progress_bar = self.progress_bar(accepted.len() as u64);

        let results: Vec<_> = stream::iter(accepted)
            .map(|target| {
                let progress_bar = progress_bar.clone();
                let output_dir = output_dir.clone();
                async move {
                    progress_bar.set_message(target.stem.clone());
                    let result = self.process_target(&target, output_dir, cancel).await;
                    progress_bar.inc(1);
                    (target, result)
                }
            })
            .buffer_unordered(self.config.catalog.concurrent_requests.max(1))
            .collect()
            .await;

        progress_bar.finish_and_clear();

        if cancel.is_cancelled() {
            return Err(CatalogError::Cancelled.into());
        }

        for (target, result) in results {
            match result {
                Ok(TargetOutcome::Written { cues_skipped }) => {
                    summary.written += 1;
                    summary.cues_skipped += cues_skipped;
                }
                Ok(TargetOutcome::AlreadyPresent) => {
                    warn!(
                        "Skipping {} {}, output already exists (use --force-overwrite to replace)",
                        target.stem, target.caption.language
                    );
                    summary.skipped_existing += 1;
                }
                Err(e) => {
                    error!("Failed to process {} caption {}: {:#}", target.caption.language, target.caption.href, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Done in {:.1}s: {} nodes, {} captions found, {} written, {} filtered, {} existing, {} failed",
            start_time.elapsed().as_secs_f64(),
            summary.nodes_visited,
            summary.captions_found,
            summary.written,
            summary.skipped_by_filter,
            summary.skipped_existing,
            summary.failed
        );

        Ok(summary)
    }

    /// Download one caption asset and write its artifacts
    async fn process_target(
        &self,
        target: &CaptionTarget,
        output_dir: PathBuf,
        cancel: &CancellationToken,
    ) -> Result<TargetOutcome> {
        let output = &self.config.output;
        let language = &target.caption.language;
        let raw_path = FileManager::artifact_path(&output_dir, &target.stem, language, "xml");
        let srt_path = FileManager::artifact_path(&output_dir, &target.stem, language, "srt");

        let write_raw = output.write_raw && (output.force_overwrite || !raw_path.exists());
        let write_srt = output.write_srt && (output.force_overwrite || !srt_path.exists());
        if !write_raw && !write_srt {
            return Ok(TargetOutcome::AlreadyPresent);
        }

        let raw = tokio::select! {
            _ = cancel.cancelled() => return Err(CatalogError::Cancelled.into()),
            result = self.client.fetch_caption(&target.caption.href) => result?,
        };

        if write_raw {
            FileManager::write_bytes(&raw_path, &raw)?;
            info!("Wrote {}", raw_path.display());
        }

        let mut cues_skipped = 0;
        if write_srt {
            let conversion = CaptionConverter::convert(&raw)?;
            cues_skipped = conversion.skipped.len();
            if cues_skipped > 0 {
                warn!("{} malformed cues dropped from {}", cues_skipped, target.caption.href);
            }
            FileManager::write_to_file(&srt_path, &conversion.to_srt())?;
            info!("Wrote {} ({} cues)", srt_path.display(), conversion.cues.len());
        }

        Ok(TargetOutcome::Written { cues_skipped })
    }

    fn progress_bar(&self, total: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let progress_bar = ProgressBar::new(total);
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} captions ({percent}%) {msg}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(template_result.progress_chars("█▓▒░"));
        progress_bar
    }

    /// The configuration this controller runs with
    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Keep the first target per caption href; a caption listed under several nodes is fetched once
fn distinct_by_href(targets: Vec<CaptionTarget>) -> Vec<CaptionTarget> {
    let mut seen = HashSet::new();
    targets
        .into_iter()
        .filter(|target| {
            let fresh = seen.insert(target.caption.href.clone());
            if !fresh {
                debug!("{} already listed under another node", target.caption.href);
            }
            fresh
        })
        .collect()
}
