pub mod http_client;
pub mod parsers;
pub mod rate_limit;

use crate::config::ForumConfig;
use crate::error::{Result, ScrapeError};
use crate::extractor::FieldExtractor;
use crate::models::{ExtractedPost, RawPost};
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use self::parsers::PageParser;
use self::rate_limit::RateLimiter;

// ── Source trait ──────────────────────────────────────────────────────────────

/// Where pages come from. The HTTP client in production, canned pages in tests.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

// ── Options ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ScraperOptions {
    pub base_url: String,
    /// Must contain `{}`, replaced by the page number.
    pub page_template: String,
    pub post_selector: String,
    /// Posts must match this to be kept.
    pub content_filter: Option<String>,
    /// Posts matching this are dropped.
    pub content_blacklist: Option<String>,
    pub starting_page: u32,
    /// `None` means unbounded.
    pub ending_page: Option<u32>,
}

impl ScraperOptions {
    pub fn new(
        base_url: impl Into<String>,
        page_template: impl Into<String>,
        post_selector: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            page_template: page_template.into(),
            post_selector: post_selector.into(),
            content_filter: None,
            content_blacklist: None,
            starting_page: 1,
            ending_page: None,
        }
    }

    fn validate(&self) -> Result<()> {
        url::Url::parse(&self.base_url)
            .map_err(|e| ScrapeError::config(format!("base url {:?}: {}", self.base_url, e)))?;
        if !self.page_template.contains("{}") {
            return Err(ScrapeError::config(
                "the page template must contain '{}' where the page number goes",
            ));
        }
        if self.starting_page < 1 {
            return Err(ScrapeError::config("starting page must be >= 1"));
        }
        if self.ending_page == Some(0) {
            return Err(ScrapeError::config("ending page must be >= 1 or unbounded"));
        }
        Ok(())
    }
}

impl From<&ForumConfig> for ScraperOptions {
    fn from(cfg: &ForumConfig) -> Self {
        Self {
            base_url: cfg.base_url.clone(),
            page_template: cfg.page_template.clone(),
            post_selector: cfg.post_selector.clone(),
            content_filter: cfg.content_filter.clone(),
            content_blacklist: cfg.content_blacklist.clone(),
            starting_page: cfg.starting_page,
            ending_page: cfg.ending_page,
        }
    }
}

// ── State ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct ScraperState {
    next_page_num: u32,
    ending_page: Option<u32>,
    reached_end: bool,
    /// Body text of the page the cursor is on; `None` until the first page loads.
    current_page_text: Option<String>,
    current_page_num: u32,
    posts_on_current_page: Vec<String>,
    cursor: usize,
    total_posts_emitted: u32,
    pages_loaded: u32,
    /// Fetch failure hit while reading ahead; handed to the next caller.
    pending_error: Option<ScrapeError>,
}

impl ScraperState {
    fn past_ending_page(&self) -> bool {
        self.ending_page.is_some_and(|end| self.next_page_num > end)
    }

    fn post_ready(&self) -> bool {
        self.cursor < self.posts_on_current_page.len()
    }
}

// ── Forum scraper ─────────────────────────────────────────────────────────────

/// Walks a thread page by page and hands out its posts one at a time.
///
/// The walk ends when the ending page has been consumed, when the forum serves
/// the same body text twice in a row (many forums re-serve the last page for
/// any page number past the end), when a fetch fails, or on shutdown.
pub struct ForumScraper<S> {
    source: S,
    limiter: RateLimiter,
    parser: PageParser,
    extractor: FieldExtractor,
    base_url: String,
    page_template: String,
    content_filter: Option<Regex>,
    content_blacklist: Option<Regex>,
    shutdown: Option<Arc<AtomicBool>>,
    state: ScraperState,
}

impl<S: PageSource> ForumScraper<S> {
    pub fn new(source: S, options: ScraperOptions, limiter: RateLimiter) -> Result<Self> {
        options.validate()?;

        let content_filter = options.content_filter.as_deref().map(Regex::new).transpose()?;
        let content_blacklist = options
            .content_blacklist
            .as_deref()
            .map(Regex::new)
            .transpose()?;

        Ok(Self {
            source,
            limiter,
            parser: PageParser::new(&options.post_selector)?,
            extractor: FieldExtractor::new()?,
            base_url: options.base_url,
            page_template: options.page_template,
            content_filter,
            content_blacklist,
            shutdown: None,
            state: ScraperState {
                next_page_num: options.starting_page,
                ending_page: options.ending_page,
                ..ScraperState::default()
            },
        })
    }

    /// Checked before every page fetch; once set the scraper stops.
    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    /// Accurate once the first page is in: the page after a consumed one is
    /// read ahead, so the end of the thread is known before it is asked for.
    /// A read-ahead failure still counts as something to hand out.
    pub fn has_next_post(&self) -> bool {
        !self.state.reached_end || self.state.pending_error.is_some()
    }

    pub fn pages_loaded(&self) -> u32 {
        self.state.pages_loaded
    }

    /// `EndOfStream` when called after `has_next_post` turned false, or on the
    /// very first call when the thread holds no posts at all.
    pub async fn get_next_post(&mut self) -> Result<ExtractedPost> {
        if let Some(e) = self.state.pending_error.take() {
            return Err(e);
        }
        if self.state.reached_end {
            return Err(ScrapeError::EndOfStream);
        }
        if !self.state.post_ready() {
            self.advance().await?;
            if !self.state.post_ready() {
                return Err(ScrapeError::EndOfStream);
            }
        }

        let text = std::mem::take(&mut self.state.posts_on_current_page[self.state.cursor]);
        self.state.cursor += 1;
        self.state.total_posts_emitted += 1;

        let raw = RawPost {
            text,
            page_num: self.state.current_page_num,
            post_num: self.state.total_posts_emitted,
        };

        if !self.state.post_ready() {
            if let Err(e) = self.advance().await {
                warn!("Reading ahead after post {} failed: {}", raw.post_num, e);
                self.state.pending_error = Some(e);
            }
        }

        Ok(self.extractor.convert(raw))
    }

    /// Drains the thread. A failed fetch ends the walk; everything collected
    /// up to that point is still returned.
    pub async fn get_all_posts(&mut self) -> Vec<ExtractedPost> {
        let mut posts = Vec::new();
        while self.has_next_post() {
            match self.get_next_post().await {
                Ok(post) => posts.push(post),
                // a thread without a single post
                Err(ScrapeError::EndOfStream) => break,
                Err(e) => {
                    error!("Post scraping crashed unexpectedly: {}", e);
                    break;
                }
            }
        }
        info!(
            "Completed forum scrape: {} posts from {} pages",
            posts.len(),
            self.state.pages_loaded
        );
        posts
    }

    fn page_url(&self, page_num: u32) -> String {
        if page_num == 1 {
            self.base_url.clone()
        } else {
            format!(
                "{}{}",
                self.base_url,
                self.page_template.replace("{}", &page_num.to_string())
            )
        }
    }

    /// Loads pages until one has a post to hand out or the walk ends.
    async fn advance(&mut self) -> Result<()> {
        while !self.state.reached_end && !self.state.post_ready() {
            self.load_next_page().await?;
        }
        Ok(())
    }

    fn finish(&mut self, reason: &str) {
        if !self.state.reached_end {
            info!("Reached end of thread: {}", reason);
        }
        self.state.reached_end = true;
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    async fn load_next_page(&mut self) -> Result<()> {
        if self.state.reached_end {
            return Err(ScrapeError::EndOfStream);
        }
        if self.state.past_ending_page() {
            self.finish("ending page reached");
            return Ok(());
        }
        if self.shutdown_requested() {
            self.finish("shutdown requested");
            return Ok(());
        }

        let page_num = self.state.next_page_num;
        let url = self.page_url(page_num);
        info!("Loading page #{} @{}", page_num, url);

        self.limiter.wait().await;
        let start = Instant::now();
        let html = match self.source.fetch(&url).await {
            Ok(html) => html,
            Err(e) => {
                self.state.reached_end = true;
                return Err(e);
            }
        };

        let page = self.parser.parse(&html);
        if self.state.current_page_text.as_deref() == Some(page.body_text.as_str()) {
            self.finish(&format!(
                "page #{} has the same content as the previous page",
                page_num
            ));
            return Ok(());
        }

        let found = page.posts.len();
        let posts: Vec<String> = page.posts.into_iter().filter(|p| self.keep_post(p)).collect();
        info!(
            "Loaded page #{} in {} ms ({} posts, {} kept)",
            page_num,
            start.elapsed().as_millis(),
            found,
            posts.len()
        );

        self.state.current_page_text = Some(page.body_text);
        self.state.current_page_num = page_num;
        self.state.posts_on_current_page = posts;
        self.state.cursor = 0;
        self.state.next_page_num += 1;
        self.state.pages_loaded += 1;
        Ok(())
    }

    fn keep_post(&self, text: &str) -> bool {
        let wanted = self.content_filter.as_ref().is_none_or(|re| re.is_match(text));
        let banned = self
            .content_blacklist
            .as_ref()
            .is_some_and(|re| re.is_match(text));
        if wanted && banned {
            debug!("Dropping blacklisted post: {:.40}", text);
        }
        wanted && !banned
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
