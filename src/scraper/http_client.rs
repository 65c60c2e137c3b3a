use crate::config::ScraperConfig;
use crate::error::{Result, ScrapeError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::PageSource;

pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Accept cookies so session-based forum pages work
            .cookie_store(true)
            .build()?;

        Ok(Self { inner })
    }
}

#[async_trait]
impl PageSource for HttpClient {
    /// Single attempt; anything but a 2xx is a transport error.
    async fn fetch(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);

        let resp = self.inner.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Transport {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(resp.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn test_malformed_url_is_a_request_error() {
        let client = HttpClient::new(&AppConfig::default().scraper).unwrap();
        let err = tokio_test::block_on(client.fetch("not a url")).unwrap_err();
        assert!(matches!(err, ScrapeError::Http(_)));
    }
}
