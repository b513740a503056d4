use std::time::Duration;

use async_trait::async_trait;
use fieldsignal_common::{ScrapeStatus, ScrapedContent};
use rand::Rng;
use reqwest::Client;
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};
use tracing::{info, warn};

const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE: Duration = Duration::from_secs(2);

/// `scrape(url) -> {content: markdown, status}` / `batch_scrape`.
/// Out of scope: HTML parsing beyond a markdown projection.
#[async_trait]
pub trait ScrapeClient: Send + Sync {
    async fn scrape(&self, url: &str) -> ScrapedContent;

    async fn batch_scrape(&self, urls: &[String]) -> Vec<(String, ScrapedContent)> {
        let mut out = Vec::with_capacity(urls.len());
        for url in urls {
            out.push((url.clone(), self.scrape(url).await));
        }
        out
    }
}

/// Plain HTTP fetcher (no headless browser) that converts fetched HTML to
/// markdown via a Readability-style transform, with retry/backoff.
pub struct HttpScrapeClient {
    http: Client,
}

impl Default for HttpScrapeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpScrapeClient {
    pub fn new() -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("reqwest client"),
        }
    }

    async fn fetch_html(&self, url: &str) -> anyhow::Result<String> {
        for attempt in 0..MAX_ATTEMPTS {
            match self.http.get(url).send().await {
                Ok(response) if response.status().is_success() => {
                    return Ok(response.text().await?);
                }
                Ok(response) if is_transient_status(response.status().as_u16()) => {
                    if attempt + 1 < MAX_ATTEMPTS {
                        warn!(url, status = %response.status(), attempt = attempt + 1, "transient scrape failure, retrying");
                        backoff(attempt).await;
                        continue;
                    }
                    anyhow::bail!("scrape failed with status {}", response.status());
                }
                Ok(response) => {
                    anyhow::bail!("scrape failed with status {}", response.status());
                }
                Err(e) => {
                    if attempt + 1 < MAX_ATTEMPTS {
                        warn!(url, attempt = attempt + 1, error = %e, "scrape request failed, retrying");
                        backoff(attempt).await;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
        anyhow::bail!("scrape retries exhausted for {url}")
    }
}

#[async_trait]
impl ScrapeClient for HttpScrapeClient {
    async fn scrape(&self, url: &str) -> ScrapedContent {
        info!(url, "scraping page");
        match self.fetch_html(url).await {
            Ok(html) => {
                let markdown = html_to_markdown(&html, url);
                ScrapedContent {
                    content: markdown,
                    status: ScrapeStatus::Success,
                    error: None,
                }
            }
            Err(e) => {
                warn!(url, error = %e, "scrape failed");
                ScrapedContent {
                    content: String::new(),
                    status: ScrapeStatus::Error,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

async fn backoff(attempt: u32) {
    let base = RETRY_BASE * 2u32.pow(attempt);
    let jitter = Duration::from_millis(rand::rng().random_range(0..500));
    tokio::time::sleep(base + jitter).await;
}

fn html_to_markdown(html: &str, url: &str) -> String {
    let parsed_url = url::Url::parse(url).ok();
    let config = TransformConfig {
        readability: true,
        main_content: true,
        return_format: ReturnFormat::Markdown,
        filter_images: true,
        filter_svg: true,
        clean_html: true,
    };
    let input = TransformInput {
        url: parsed_url.as_ref(),
        content: html.as_bytes(),
        screenshot_bytes: None,
        encoding: None,
        selector_config: None,
        ignore_tags: None,
    };
    transform_content_input(input, &config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_statuses_are_retryable() {
        assert!(is_transient_status(429));
        assert!(is_transient_status(503));
        assert!(!is_transient_status(404));
    }
}
