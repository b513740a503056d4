use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fieldsignal_common::{clamp_confidence, ClusterStats, Episode, Hypothesis, RuntimeBinding};
use uuid::Uuid;

use crate::traits::{BindingStore, ClusterStatsStore, EpisodeStore, HypothesisStore};

/// In-process store impls behind the same traits as the Postgres-backed
/// ones, for unit tests — any backend satisfying the store contracts is
/// a valid implementation.
#[derive(Default)]
pub struct InMemoryEpisodeStore {
    episodes: Mutex<Vec<Episode>>,
}

#[async_trait]
impl EpisodeStore for InMemoryEpisodeStore {
    async fn put(&self, episode: Episode) -> anyhow::Result<()> {
        self.episodes.lock().expect("episode store mutex poisoned").push(episode);
        Ok(())
    }

    async fn query(&self, entity_id: Uuid, since: DateTime<Utc>) -> anyhow::Result<Vec<Episode>> {
        let episodes = self.episodes.lock().expect("episode store mutex poisoned");
        Ok(episodes
            .iter()
            .filter(|e| e.entity_id == entity_id && e.timestamp >= since)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryBindingStore {
    bindings: Mutex<HashMap<(Uuid, Uuid), RuntimeBinding>>,
}

#[async_trait]
impl BindingStore for InMemoryBindingStore {
    async fn get(&self, entity_id: Uuid, template_id: Uuid) -> anyhow::Result<Option<RuntimeBinding>> {
        Ok(self
            .bindings
            .lock()
            .expect("binding store mutex poisoned")
            .get(&(entity_id, template_id))
            .cloned())
    }

    async fn put(&self, binding: RuntimeBinding) -> anyhow::Result<()> {
        let key = (binding.entity_id, binding.template_id);
        self.bindings.lock().expect("binding store mutex poisoned").insert(key, binding);
        Ok(())
    }

    async fn list(&self, template_id: Uuid) -> anyhow::Result<Vec<RuntimeBinding>> {
        Ok(self
            .bindings
            .lock()
            .expect("binding store mutex poisoned")
            .values()
            .filter(|b| b.template_id == template_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryHypothesisStore {
    hypotheses: Mutex<HashMap<Uuid, Hypothesis>>,
}

#[async_trait]
impl HypothesisStore for InMemoryHypothesisStore {
    async fn get(&self, hypothesis_id: Uuid) -> anyhow::Result<Option<Hypothesis>> {
        Ok(self
            .hypotheses
            .lock()
            .expect("hypothesis store mutex poisoned")
            .get(&hypothesis_id)
            .cloned())
    }

    async fn list(&self, entity_id: Uuid) -> anyhow::Result<Vec<Hypothesis>> {
        Ok(self
            .hypotheses
            .lock()
            .expect("hypothesis store mutex poisoned")
            .values()
            .filter(|h| h.entity_id == entity_id)
            .cloned()
            .collect())
    }

    async fn put(&self, hypothesis: Hypothesis) -> anyhow::Result<()> {
        self.hypotheses
            .lock()
            .expect("hypothesis store mutex poisoned")
            .insert(hypothesis.hypothesis_id, hypothesis);
        Ok(())
    }

    async fn batch_update(&self, deltas: Vec<(Uuid, f64)>) -> anyhow::Result<()> {
        let mut hypotheses = self.hypotheses.lock().expect("hypothesis store mutex poisoned");
        for (id, delta) in deltas {
            if let Some(h) = hypotheses.get_mut(&id) {
                h.confidence = clamp_confidence(h.confidence + delta);
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryClusterStatsStore {
    stats: Mutex<HashMap<String, ClusterStats>>,
}

#[async_trait]
impl ClusterStatsStore for InMemoryClusterStatsStore {
    async fn get(&self, cluster_id: &str) -> anyhow::Result<Option<ClusterStats>> {
        Ok(self.stats.lock().expect("cluster stats mutex poisoned").get(cluster_id).cloned())
    }

    async fn put(&self, stats: ClusterStats) -> anyhow::Result<()> {
        self.stats
            .lock()
            .expect("cluster stats mutex poisoned")
            .insert(stats.cluster_id.clone(), stats);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldsignal_common::BindingState;

    #[tokio::test]
    async fn binding_store_put_is_last_writer_wins_per_key() {
        let store = InMemoryBindingStore::default();
        let entity_id = Uuid::new_v4();
        let template_id = Uuid::new_v4();
        let mut binding = RuntimeBinding::new(template_id, entity_id, "Arsenal FC");
        binding.usage_count = 1;
        store.put(binding.clone()).await.unwrap();

        binding.usage_count = 2;
        binding.state = BindingState::Promoted;
        store.put(binding).await.unwrap();

        let fetched = store.get(entity_id, template_id).await.unwrap().unwrap();
        assert_eq!(fetched.usage_count, 2);
        assert_eq!(fetched.state, BindingState::Promoted);
    }

    #[tokio::test]
    async fn episode_query_filters_by_entity_and_since() {
        let store = InMemoryEpisodeStore::default();
        let entity_id = Uuid::new_v4();
        let old = Episode {
            id: Uuid::new_v4(),
            entity_id,
            episode_type: "discovery".to_string(),
            subtype: "rfp".to_string(),
            description: "old".to_string(),
            timestamp: Utc::now() - chrono::Duration::days(100),
            confidence: 0.5,
            source_refs: vec![],
        };
        let recent = Episode {
            timestamp: Utc::now(),
            ..old.clone()
        };
        store.put(old).await.unwrap();
        store.put(recent).await.unwrap();

        let since = Utc::now() - chrono::Duration::days(1);
        let results = store.query(entity_id, since).await.unwrap();
        assert_eq!(results.len(), 1);
    }
}
