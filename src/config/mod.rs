use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub scraper: ScraperConfig,
    pub forum: ForumConfig,
    pub output: OutputConfig,
    pub geo: GeoConfig,
}

/// HTTP / politeness settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Which thread to walk and how to slice its pages into posts
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForumConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Appended to `base_url` for pages after the first; `{}` is the page number.
    #[serde(default = "default_page_template")]
    pub page_template: String,

    #[serde(default = "default_post_selector")]
    pub post_selector: String,

    #[serde(default = "default_content_filter")]
    pub content_filter: Option<String>,

    #[serde(default = "default_content_blacklist")]
    pub content_blacklist: Option<String>,

    #[serde(default = "default_starting_page")]
    pub starting_page: u32,

    /// `None` walks until the forum starts repeating its last page.
    #[serde(default)]
    pub ending_page: Option<u32>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    #[serde(default = "default_true")]
    pub infer_fields: bool,
}

/// Reference data for the location resolver. Unset paths use the bundled tables.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GeoConfig {
    #[serde(default)]
    pub countries_path: Option<PathBuf>,

    #[serde(default)]
    pub currencies_path: Option<PathBuf>,

    #[serde(default)]
    pub provinces_path: Option<PathBuf>,

    #[serde(default)]
    pub cities_path: Option<PathBuf>,

    #[serde(default = "default_province_countries")]
    pub province_countries: Vec<String>,

    #[serde(default = "default_min_city_population")]
    pub min_city_population: u64,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_timeout_secs() -> u64 {
    30
}
fn default_request_delay_ms() -> u64 {
    3000
}
fn default_jitter_ms() -> u64 {
    500
}
fn default_user_agent() -> String {
    "forum-prices/0.1 (price survey research)".to_string()
}
fn default_base_url() -> String {
    "http://forum.pianoworld.com/ubbthreads.php/topics/1201029".to_string()
}
fn default_page_template() -> String {
    "/{}.html".to_string()
}
fn default_post_selector() -> String {
    ".post-content .post_inner".to_string()
}
fn default_content_filter() -> Option<String> {
    Some(r"(?im)MAKE[\s\S]*MODEL[\s\S]*PRICE PAID".to_string())
}
fn default_content_blacklist() -> Option<String> {
    Some("Originally Posted by|Quote".to_string())
}
fn default_starting_page() -> u32 {
    1
}
fn default_output_path() -> PathBuf {
    PathBuf::from("output_files/digital_piano_prices.csv")
}
fn default_true() -> bool {
    true
}
pub(crate) fn default_province_countries() -> Vec<String> {
    vec!["US".to_string(), "CA".to_string()]
}
pub(crate) fn default_min_city_population() -> u64 {
    10_000
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("FORUM").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|e| {
            warn!("Falling back to default configuration: {}", e);
            AppConfig::default()
        });
        Ok(app_cfg)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scraper: ScraperConfig {
                timeout_secs: default_timeout_secs(),
                request_delay_ms: default_request_delay_ms(),
                jitter_ms: default_jitter_ms(),
                user_agent: default_user_agent(),
            },
            forum: ForumConfig {
                base_url: default_base_url(),
                page_template: default_page_template(),
                post_selector: default_post_selector(),
                content_filter: default_content_filter(),
                content_blacklist: default_content_blacklist(),
                starting_page: default_starting_page(),
                ending_page: None,
            },
            output: OutputConfig {
                path: default_output_path(),
                infer_fields: true,
            },
            geo: GeoConfig {
                province_countries: default_province_countries(),
                min_city_population: default_min_city_population(),
                ..GeoConfig::default()
            },
        }
    }
}
