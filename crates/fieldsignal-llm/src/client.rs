use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use tracing::debug;

use crate::types::JudgeResponse;

/// Collaborator contract. Out of scope: the concrete vendor.
/// Any implementation satisfying this trait (Claude, OpenAI, a test double)
/// is valid.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn judge(&self, prompt: &str, model_id: &str) -> Result<JudgeResponse>;
}

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default HTTP-backed implementation, modeled on a plain chat-completion
/// vendor API. Cost is computed from the vendor's per-token pricing table;
/// callers needing exact cost parity with a specific vendor should supply
/// their own `LlmClient`.
pub struct HttpLlmClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
    input_cost_per_1k: f64,
    output_cost_per_1k: f64,
}

impl HttpLlmClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            http: reqwest::Client::new(),
            base_url: ANTHROPIC_API_URL.to_string(),
            input_cost_per_1k: 0.003,
            output_cost_per_1k: 0.015,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_pricing(mut self, input_cost_per_1k: f64, output_cost_per_1k: f64) -> Self {
        self.input_cost_per_1k = input_cost_per_1k;
        self.output_cost_per_1k = output_cost_per_1k;
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn judge(&self, prompt: &str, model_id: &str) -> Result<JudgeResponse> {
        let url = format!("{}/messages", self.base_url);

        debug!(model = model_id, "LLM judge request");

        let body = serde_json::json!({
            "model": model_id,
            "max_tokens": 1024,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .context("LLM API request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("LLM API error ({status}): {error_text}"));
        }

        let parsed: ChatResponse = response.json().await.context("failed to parse LLM response")?;

        let text = parsed
            .content
            .into_iter()
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");

        let cost_usd = (parsed.usage.input_tokens as f64 / 1000.0) * self.input_cost_per_1k
            + (parsed.usage.output_tokens as f64 / 1000.0) * self.output_cost_per_1k;

        Ok(JudgeResponse {
            text,
            input_tokens: parsed.usage.input_tokens,
            output_tokens: parsed.usage.output_tokens,
            cost_usd,
            model_id: model_id.to_string(),
        })
    }
}

#[derive(Debug, serde::Deserialize)]
struct ChatResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, serde::Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, serde::Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}
