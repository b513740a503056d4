use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use fieldsignal_common::SearchResult;
use tracing::info;

use crate::traits::SearchEngine;

#[derive(Debug, serde::Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperResult>,
}

#[derive(Debug, serde::Deserialize)]
struct SerperResult {
    #[serde(default)]
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

/// Default `SearchEngine`, backed by a Serper fetcher. Registered under
/// the name `"google"` — the vendor behind that name is not load-bearing,
/// any `SearchEngine` satisfies the contract.
pub struct SerperSearchEngine {
    api_key: String,
    client: reqwest::Client,
}

impl SerperSearchEngine {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("failed to build HTTP client"),
        }
    }
}

#[async_trait]
impl SearchEngine for SerperSearchEngine {
    fn name(&self) -> &str {
        "google"
    }

    async fn search(&self, query: &str, n: usize) -> Result<Vec<SearchResult>> {
        info!(query, n, "serper search");

        let body = serde_json::json!({"q": query, "num": n});
        let resp = self
            .client
            .post("https://google.serper.dev/search")
            .header("X-API-KEY", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .context("serper API request failed")?;

        let data: SerperResponse = resp.json().await.context("failed to parse serper response")?;

        let results = data
            .organic
            .into_iter()
            .enumerate()
            .map(|(idx, r)| SearchResult {
                url: r.link,
                title: r.title,
                snippet: r.snippet,
                rank: idx as u32 + 1,
            })
            .collect();

        Ok(results)
    }
}
