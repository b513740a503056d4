use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fieldsignal_common::{ClusterStats, Episode, Hypothesis, RuntimeBinding};
use uuid::Uuid;

/// Append-only episode persistence, keyed by `(entity_id, timestamp)`
///.
#[async_trait]
pub trait EpisodeStore: Send + Sync {
    async fn put(&self, episode: Episode) -> anyhow::Result<()>;
    async fn query(&self, entity_id: Uuid, since: DateTime<Utc>) -> anyhow::Result<Vec<Episode>>;
}

/// Per-(entity, template) runtime binding persistence.
/// Writes are last-writer-wins per `(entity_id, template_id)`.
#[async_trait]
pub trait BindingStore: Send + Sync {
    async fn get(&self, entity_id: Uuid, template_id: Uuid) -> anyhow::Result<Option<RuntimeBinding>>;
    async fn put(&self, binding: RuntimeBinding) -> anyhow::Result<()>;
    async fn list(&self, template_id: Uuid) -> anyhow::Result<Vec<RuntimeBinding>>;
}

/// Hypothesis persistence. The backing implementation may
/// be a graph DB, a KV store, or a relational table — only these
/// operations are required.
#[async_trait]
pub trait HypothesisStore: Send + Sync {
    async fn get(&self, hypothesis_id: Uuid) -> anyhow::Result<Option<Hypothesis>>;
    async fn list(&self, entity_id: Uuid) -> anyhow::Result<Vec<Hypothesis>>;
    async fn put(&self, hypothesis: Hypothesis) -> anyhow::Result<()>;

    /// Chunked by 100 entity ids with bounded parallelism (<= 10) at the
    /// call site; the store itself just applies deltas.
    async fn batch_update(&self, deltas: Vec<(Uuid, f64)>) -> anyhow::Result<()>;
}

/// Single-row-per-cluster roll-up persistence.
#[async_trait]
pub trait ClusterStatsStore: Send + Sync {
    async fn get(&self, cluster_id: &str) -> anyhow::Result<Option<ClusterStats>>;
    async fn put(&self, stats: ClusterStats) -> anyhow::Result<()>;
}
