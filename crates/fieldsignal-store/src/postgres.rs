use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fieldsignal_common::{ClusterStats, Episode, Hypothesis, RuntimeBinding};
use sqlx::PgPool;
use uuid::Uuid;

use crate::traits::{BindingStore, ClusterStatsStore, EpisodeStore, HypothesisStore};

/// Runs the embedded migrations. Stores are backend-agnostic; Postgres is
/// the concrete choice here, using the `sqlx::migrate!` pattern.
pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Clone)]
pub struct PgEpisodeStore {
    pool: PgPool,
}

impl PgEpisodeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EpisodeRow {
    id: Uuid,
    entity_id: Uuid,
    episode_type: String,
    subtype: String,
    description: String,
    timestamp: DateTime<Utc>,
    confidence: f64,
    source_refs: serde_json::Value,
}

impl From<EpisodeRow> for Episode {
    fn from(row: EpisodeRow) -> Self {
        Self {
            id: row.id,
            entity_id: row.entity_id,
            episode_type: row.episode_type,
            subtype: row.subtype,
            description: row.description,
            timestamp: row.timestamp,
            confidence: row.confidence,
            source_refs: serde_json::from_value(row.source_refs).unwrap_or_default(),
        }
    }
}

#[async_trait]
impl EpisodeStore for PgEpisodeStore {
    async fn put(&self, episode: Episode) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO episodes (id, entity_id, episode_type, subtype, description, timestamp, confidence, source_refs)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(episode.id)
        .bind(episode.entity_id)
        .bind(&episode.episode_type)
        .bind(&episode.subtype)
        .bind(&episode.description)
        .bind(episode.timestamp)
        .bind(episode.confidence)
        .bind(serde_json::to_value(&episode.source_refs)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn query(&self, entity_id: Uuid, since: DateTime<Utc>) -> anyhow::Result<Vec<Episode>> {
        let rows = sqlx::query_as::<_, EpisodeRow>(
            r#"
            SELECT id, entity_id, episode_type, subtype, description, timestamp, confidence, source_refs
            FROM episodes
            WHERE entity_id = $1 AND timestamp >= $2
            ORDER BY timestamp ASC
            "#,
        )
        .bind(entity_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Episode::from).collect())
    }
}

#[derive(Clone)]
pub struct PgBindingStore {
    pool: PgPool,
}

impl PgBindingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BindingRow {
    entity_id: Uuid,
    template_id: Uuid,
    entity_name: String,
    discovered_domains: serde_json::Value,
    discovered_channels: serde_json::Value,
    enriched_patterns: serde_json::Value,
    confidence_adjustment: f64,
    usage_count: i32,
    success_rate: f64,
    state: String,
    promoted_at: Option<DateTime<Utc>>,
    last_used_at: Option<DateTime<Utc>>,
}

impl From<BindingRow> for RuntimeBinding {
    fn from(row: BindingRow) -> Self {
        Self {
            template_id: row.template_id,
            entity_id: row.entity_id,
            entity_name: row.entity_name,
            discovered_domains: serde_json::from_value(row.discovered_domains).unwrap_or_default(),
            discovered_channels: serde_json::from_value(row.discovered_channels).unwrap_or_default(),
            enriched_patterns: serde_json::from_value(row.enriched_patterns).unwrap_or_default(),
            confidence_adjustment: row.confidence_adjustment,
            usage_count: row.usage_count.max(0) as u32,
            success_rate: row.success_rate,
            state: parse_binding_state(&row.state),
            promoted_at: row.promoted_at,
            last_used_at: row.last_used_at,
        }
    }
}

fn parse_binding_state(s: &str) -> fieldsignal_common::BindingState {
    use fieldsignal_common::BindingState::*;
    match s {
        "PROMOTED" => Promoted,
        "FROZEN" => Frozen,
        "RETIRED" => Retired,
        _ => Exploring,
    }
}

#[async_trait]
impl BindingStore for PgBindingStore {
    async fn get(&self, entity_id: Uuid, template_id: Uuid) -> anyhow::Result<Option<RuntimeBinding>> {
        let row = sqlx::query_as::<_, BindingRow>(
            r#"SELECT * FROM runtime_bindings WHERE entity_id = $1 AND template_id = $2"#,
        )
        .bind(entity_id)
        .bind(template_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(RuntimeBinding::from))
    }

    /// Last-writer-wins per `(entity_id, template_id)` via `ON CONFLICT`
    ///.
    async fn put(&self, binding: RuntimeBinding) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO runtime_bindings
                (entity_id, template_id, entity_name, discovered_domains, discovered_channels,
                 enriched_patterns, confidence_adjustment, usage_count, success_rate, state,
                 promoted_at, last_used_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (entity_id, template_id) DO UPDATE SET
                entity_name = EXCLUDED.entity_name,
                discovered_domains = EXCLUDED.discovered_domains,
                discovered_channels = EXCLUDED.discovered_channels,
                enriched_patterns = EXCLUDED.enriched_patterns,
                confidence_adjustment = EXCLUDED.confidence_adjustment,
                usage_count = EXCLUDED.usage_count,
                success_rate = EXCLUDED.success_rate,
                state = EXCLUDED.state,
                promoted_at = EXCLUDED.promoted_at,
                last_used_at = EXCLUDED.last_used_at
            "#,
        )
        .bind(binding.entity_id)
        .bind(binding.template_id)
        .bind(&binding.entity_name)
        .bind(serde_json::to_value(&binding.discovered_domains)?)
        .bind(serde_json::to_value(&binding.discovered_channels)?)
        .bind(serde_json::to_value(&binding.enriched_patterns)?)
        .bind(binding.confidence_adjustment)
        .bind(binding.usage_count as i32)
        .bind(binding.success_rate)
        .bind(binding.state.to_string())
        .bind(binding.promoted_at)
        .bind(binding.last_used_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self, template_id: Uuid) -> anyhow::Result<Vec<RuntimeBinding>> {
        let rows = sqlx::query_as::<_, BindingRow>(r#"SELECT * FROM runtime_bindings WHERE template_id = $1"#)
            .bind(template_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(RuntimeBinding::from).collect())
    }
}

#[derive(Clone)]
pub struct PgHypothesisStore {
    pool: PgPool,
}

impl PgHypothesisStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct HypothesisRow {
    hypothesis_id: Uuid,
    entity_id: Uuid,
    template_id: Uuid,
    statement: String,
    category: String,
    target_entity_type: String,
    confidence: f64,
    state: String,
    iterations: i32,
    reinforcement_count: i32,
    created_at: DateTime<Utc>,
    last_tested_at: Option<DateTime<Utc>>,
    metadata: serde_json::Value,
    confidence_history: serde_json::Value,
}

impl TryFrom<HypothesisRow> for Hypothesis {
    type Error = serde_json::Error;

    fn try_from(row: HypothesisRow) -> Result<Self, Self::Error> {
        Ok(Self {
            hypothesis_id: row.hypothesis_id,
            entity_id: row.entity_id,
            template_id: row.template_id,
            statement: row.statement,
            category: row.category,
            target_entity_type: parse_entity_type(&row.target_entity_type),
            confidence: row.confidence,
            state: parse_hypothesis_state(&row.state),
            iterations: row.iterations.max(0) as u32,
            reinforcement_count: row.reinforcement_count.max(0) as u32,
            created_at: row.created_at,
            last_tested_at: row.last_tested_at,
            metadata: row.metadata,
            confidence_history: serde_json::from_value(row.confidence_history)?,
        })
    }
}

fn parse_hypothesis_state(s: &str) -> fieldsignal_common::HypothesisState {
    use fieldsignal_common::HypothesisState::*;
    match s {
        "RESOLVED" => Resolved,
        "INACTIVE" => Inactive,
        _ => Active,
    }
}

fn parse_entity_type(s: &str) -> fieldsignal_common::EntityType {
    use fieldsignal_common::EntityType::*;
    match s {
        "SPORT_CLUB" => SportClub,
        "SPORT_FEDERATION" => SportFederation,
        "SPORT_LEAGUE" => SportLeague,
        other => Other(other.to_string()),
    }
}

#[async_trait]
impl HypothesisStore for PgHypothesisStore {
    async fn get(&self, hypothesis_id: Uuid) -> anyhow::Result<Option<Hypothesis>> {
        let row = sqlx::query_as::<_, HypothesisRow>(r#"SELECT * FROM hypotheses WHERE hypothesis_id = $1"#)
            .bind(hypothesis_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Hypothesis::try_from).transpose()?)
    }

    async fn list(&self, entity_id: Uuid) -> anyhow::Result<Vec<Hypothesis>> {
        let rows = sqlx::query_as::<_, HypothesisRow>(r#"SELECT * FROM hypotheses WHERE entity_id = $1"#)
            .bind(entity_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Hypothesis::try_from).collect::<Result<_, _>>().map_err(Into::into)
    }

    async fn put(&self, hypothesis: Hypothesis) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO hypotheses
                (hypothesis_id, entity_id, template_id, statement, category, target_entity_type,
                 confidence, state, iterations, reinforcement_count, created_at, last_tested_at,
                 metadata, confidence_history)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (hypothesis_id) DO UPDATE SET
                confidence = EXCLUDED.confidence,
                state = EXCLUDED.state,
                iterations = EXCLUDED.iterations,
                reinforcement_count = EXCLUDED.reinforcement_count,
                last_tested_at = EXCLUDED.last_tested_at,
                confidence_history = EXCLUDED.confidence_history
            "#,
        )
        .bind(hypothesis.hypothesis_id)
        .bind(hypothesis.entity_id)
        .bind(hypothesis.template_id)
        .bind(&hypothesis.statement)
        .bind(&hypothesis.category)
        .bind(hypothesis.target_entity_type.to_string())
        .bind(hypothesis.confidence)
        .bind(hypothesis.state.to_string())
        .bind(hypothesis.iterations as i32)
        .bind(hypothesis.reinforcement_count as i32)
        .bind(hypothesis.created_at)
        .bind(hypothesis.last_tested_at)
        .bind(&hypothesis.metadata)
        .bind(serde_json::to_value(&hypothesis.confidence_history)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn batch_update(&self, deltas: Vec<(Uuid, f64)>) -> anyhow::Result<()> {
        for (hypothesis_id, delta) in deltas {
            sqlx::query(
                r#"
                UPDATE hypotheses
                SET confidence = LEAST(GREATEST(confidence + $2, 0.05), 0.95)
                WHERE hypothesis_id = $1
                "#,
            )
            .bind(hypothesis_id)
            .bind(delta)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgClusterStatsStore {
    pool: PgPool,
}

impl PgClusterStatsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ClusterStatsRow {
    cluster_id: String,
    channel_effectiveness: serde_json::Value,
    signal_reliability: serde_json::Value,
    discovery_shortcuts: serde_json::Value,
    total_bindings: i32,
    last_updated: DateTime<Utc>,
}

impl From<ClusterStatsRow> for ClusterStats {
    fn from(row: ClusterStatsRow) -> Self {
        Self {
            cluster_id: row.cluster_id,
            channel_effectiveness: serde_json::from_value(row.channel_effectiveness).unwrap_or_default(),
            signal_reliability: serde_json::from_value(row.signal_reliability).unwrap_or_default(),
            discovery_shortcuts: serde_json::from_value(row.discovery_shortcuts).unwrap_or_default(),
            total_bindings: row.total_bindings.max(0) as u32,
            last_updated: row.last_updated,
        }
    }
}

#[async_trait]
impl ClusterStatsStore for PgClusterStatsStore {
    async fn get(&self, cluster_id: &str) -> anyhow::Result<Option<ClusterStats>> {
        let row = sqlx::query_as::<_, ClusterStatsRow>(r#"SELECT * FROM cluster_stats WHERE cluster_id = $1"#)
            .bind(cluster_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ClusterStats::from))
    }

    async fn put(&self, stats: ClusterStats) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cluster_stats
                (cluster_id, channel_effectiveness, signal_reliability, discovery_shortcuts, total_bindings, last_updated)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (cluster_id) DO UPDATE SET
                channel_effectiveness = EXCLUDED.channel_effectiveness,
                signal_reliability = EXCLUDED.signal_reliability,
                discovery_shortcuts = EXCLUDED.discovery_shortcuts,
                total_bindings = EXCLUDED.total_bindings,
                last_updated = EXCLUDED.last_updated
            "#,
        )
        .bind(&stats.cluster_id)
        .bind(serde_json::to_value(&stats.channel_effectiveness)?)
        .bind(serde_json::to_value(&stats.signal_reliability)?)
        .bind(serde_json::to_value(&stats.discovery_shortcuts)?)
        .bind(stats.total_bindings as i32)
        .bind(stats.last_updated)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
