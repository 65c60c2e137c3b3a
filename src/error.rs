use thiserror::Error;

pub type Result<T> = core::result::Result<T, ScrapeError>;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The server answered, but not with a 2xx status.
    #[error("Fetching {url} returned HTTP {status}")]
    Transport { url: String, status: u16 },

    #[error("Request error: {0}")]
    Http(#[from] reqwest::Error),

    /// A post was requested after the scraper reached the end of the thread.
    #[error("Reached the end of the thread, no more posts can be retrieved")]
    EndOfStream,

    #[error("Invalid scraper configuration: {0}")]
    Configuration(String),

    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),
}

impl ScrapeError {
    pub fn config(msg: impl Into<String>) -> Self {
        ScrapeError::Configuration(msg.into())
    }
}
