use async_trait::async_trait;
use fieldsignal_common::SearchResult;

/// A single underlying search engine. Out of scope: the concrete vendor
///. Any implementation exposing `search(q, n)` is valid.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    fn name(&self) -> &str;
    async fn search(&self, query: &str, n: usize) -> anyhow::Result<Vec<SearchResult>>;
}

/// Collaborator contract:
/// `search(query, engine, n) → Result[]`.
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, query: &str, engine: &str, n: usize) -> anyhow::Result<Vec<SearchResult>>;
}
