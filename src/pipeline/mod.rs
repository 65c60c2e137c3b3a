//! Pipeline orchestrator: scraper → inference → CSV.
//!
//! Everything that can be rejected up front (selectors, filter regexes, URL
//! shape, reference tables) is built before the first request goes out. The
//! scrape itself never fails the run: whatever was collected before a fetch
//! error is still inferred and written.

use crate::config::AppConfig;
use crate::inference::{PostProcessor, ReferenceTables};
use crate::loader::load_geo_index;
use crate::models::InferredPost;
use crate::scraper::http_client::HttpClient;
use crate::scraper::rate_limit::RateLimiter;
use crate::scraper::{ForumScraper, PageSource, ScraperOptions};
use crate::storage;
use crate::utils::Timer;
use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

pub struct Pipeline {
    config: AppConfig,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self) -> Result<PipelineStats> {
        let client = HttpClient::new(&self.config.scraper).context("Failed to build HTTP client")?;
        self.run_with_source(client).await
    }

    pub async fn run_with_source<S: PageSource>(&self, source: S) -> Result<PipelineStats> {
        let options = ScraperOptions::from(&self.config.forum);
        let limiter = RateLimiter::from_config(&self.config.scraper);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut scraper = ForumScraper::new(source, options, limiter)
            .context("Invalid forum configuration")?
            .with_shutdown(Arc::clone(&shutdown));

        let tables = if self.config.output.infer_fields {
            let geo = load_geo_index(&self.config.geo).context("Failed to load geo reference data")?;
            Some(ReferenceTables::new(geo).context("Failed to build reference tables")?)
        } else {
            None
        };

        // Lives for the whole run so a Ctrl-C during inference or writing is not swallowed.
        let watcher = tokio::spawn(watch_interrupts(
            Arc::clone(&shutdown),
            tokio::signal::ctrl_c,
            || std::process::exit(130),
        ));
        let result = self.scrape_infer_write(&mut scraper, tables.as_ref()).await;
        watcher.abort();
        result
    }

    async fn scrape_infer_write<S: PageSource>(
        &self,
        scraper: &mut ForumScraper<S>,
        tables: Option<&ReferenceTables>,
    ) -> Result<PipelineStats> {
        // ── 1. Walk the thread ────────────────────────────────────────────────
        info!("=== Step 1: Scraping {} ===", self.config.forum.base_url);
        let posts = {
            let _t = Timer::start("Forum scrape");
            scraper.get_all_posts().await
        };

        // ── 2. Corpus-wide inference ──────────────────────────────────────────
        let posts: Vec<InferredPost> = match tables {
            Some(tables) => {
                info!("=== Step 2: Inferring fields over {} posts ===", posts.len());
                let mut processor = PostProcessor::new(tables, posts);
                processor.infer_all();
                processor.into_posts()
            }
            None => {
                info!("=== Step 2: Inference disabled ===");
                posts.into_iter().map(InferredPost::from).collect()
            }
        };

        // ── 3. Write the sheet ────────────────────────────────────────────────
        info!("=== Step 3: Writing {:?} ===", self.config.output.path);
        let rows_written = storage::write_csv(&self.config.output.path, &posts)
            .context("Failed to write price sheet")?;

        let stats = PipelineStats {
            pages_visited: scraper.pages_loaded(),
            posts_scraped: posts.len(),
            rows_written,
        };
        info!(
            "=== Done: {} pages | {} posts | {} rows ===",
            stats.pages_visited, stats.posts_scraped, stats.rows_written
        );
        Ok(stats)
    }
}

/// First interrupt stops the scrape after the current page and lets the run
/// finish with what it has; a second one calls `force_exit`.
async fn watch_interrupts<S, F>(flag: Arc<AtomicBool>, mut next_signal: S, force_exit: impl FnOnce())
where
    S: FnMut() -> F,
    F: Future<Output = std::io::Result<()>>,
{
    if next_signal().await.is_err() {
        return;
    }
    warn!("Ctrl-C received; finishing after the current page (press again to abort)");
    flag.store(true, Ordering::Relaxed);

    if next_signal().await.is_ok() {
        error!("Second Ctrl-C received; aborting without writing the price sheet");
        force_exit();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub pages_visited: u32,
    pub posts_scraped: usize,
    pub rows_written: usize,
}
