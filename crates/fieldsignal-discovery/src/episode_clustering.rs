use chrono::Duration;
use fieldsignal_common::{ClusteredEpisode, Episode};
use uuid::Uuid;

use crate::embedder::{cosine_similarity, TextEmbedder};

const CLUSTER_WINDOW_DAYS: i64 = 45;
const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.75;

/// Outcome of one clustering pass: the derived records plus how much the
/// episode set was compressed. Compression ratio is reported.
pub struct ClusteringResult {
    pub clusters: Vec<ClusteredEpisode>,
    pub compression_ratio: f64,
}

/// Groups `episodes` (already filtered to one entity) into windows of
/// `CLUSTER_WINDOW_DAYS`, then greedily clusters within each window by
/// cosine similarity on embedded descriptions. Never
/// mutates the originals it references — it only reads `episode.description`
/// and `episode.id`.
pub async fn cluster_episodes(
    episodes: &[Episode],
    embedder: &dyn TextEmbedder,
    similarity_threshold: Option<f64>,
) -> anyhow::Result<ClusteringResult> {
    let threshold = similarity_threshold.unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);
    if episodes.is_empty() {
        return Ok(ClusteringResult { clusters: Vec::new(), compression_ratio: 0.0 });
    }

    let mut sorted: Vec<&Episode> = episodes.iter().collect();
    sorted.sort_by_key(|e| e.timestamp);

    let mut clusters = Vec::new();
    let mut window_start_idx = 0;
    while window_start_idx < sorted.len() {
        let window_start = sorted[window_start_idx].timestamp;
        let window_end_idx = sorted[window_start_idx..]
            .iter()
            .take_while(|e| e.timestamp - window_start < Duration::days(CLUSTER_WINDOW_DAYS))
            .count()
            + window_start_idx;
        let window = &sorted[window_start_idx..window_end_idx];

        let descriptions: Vec<String> = window.iter().map(|e| e.description.clone()).collect();
        let embeddings = embedder.embed_batch(descriptions).await?;

        clusters.extend(greedy_cluster(window, &embeddings, threshold));
        window_start_idx = window_end_idx;
    }

    let compression_ratio = 1.0 - (clusters.len() as f64 / episodes.len() as f64);
    Ok(ClusteringResult { clusters, compression_ratio })
}

/// Single-pass greedy clustering: each unassigned episode seeds a new
/// cluster and absorbs every later episode in the window whose embedding is
/// within `threshold` of the seed.
fn greedy_cluster(window: &[&Episode], embeddings: &[Vec<f32>], threshold: f64) -> Vec<ClusteredEpisode> {
    let mut assigned = vec![false; window.len()];
    let mut clusters = Vec::new();

    for seed_idx in 0..window.len() {
        if assigned[seed_idx] {
            continue;
        }
        assigned[seed_idx] = true;
        let mut members = vec![seed_idx];
        for candidate_idx in (seed_idx + 1)..window.len() {
            if assigned[candidate_idx] {
                continue;
            }
            if cosine_similarity(&embeddings[seed_idx], &embeddings[candidate_idx]) >= threshold {
                assigned[candidate_idx] = true;
                members.push(candidate_idx);
            }
        }

        let member_episodes: Vec<&Episode> = members.iter().map(|&i| window[i]).collect();
        let window_start = member_episodes.iter().map(|e| e.timestamp).min().unwrap();
        let window_end = member_episodes.iter().map(|e| e.timestamp).max().unwrap();
        clusters.push(ClusteredEpisode {
            id: Uuid::new_v4(),
            entity_id: member_episodes[0].entity_id,
            member_episode_ids: member_episodes.iter().map(|e| e.id).collect(),
            description: member_episodes[0].description.clone(),
            window_start,
            window_end,
        });
    }

    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    struct FixedEmbedder {
        vectors: std::collections::HashMap<String, Vec<f32>>,
    }

    #[async_trait::async_trait]
    impl TextEmbedder for FixedEmbedder {
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(self.vectors.get(text).cloned().unwrap_or_else(|| vec![0.0, 0.0]))
        }

        async fn embed_batch(&self, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
            let mut out = Vec::with_capacity(texts.len());
            for t in texts {
                out.push(self.embed(&t).await?);
            }
            Ok(out)
        }
    }

    fn episode(entity_id: Uuid, description: &str, timestamp: chrono::DateTime<Utc>) -> Episode {
        Episode {
            id: Uuid::new_v4(),
            entity_id,
            episode_type: "discovery".to_string(),
            subtype: "rfp".to_string(),
            description: description.to_string(),
            timestamp,
            confidence: 0.7,
            source_refs: vec![],
        }
    }

    #[tokio::test]
    async fn near_duplicate_descriptions_collapse_into_one_cluster() {
        let entity_id = Uuid::new_v4();
        let now = Utc::now();
        let episodes = vec![
            episode(entity_id, "kit supplier rfp published", now),
            episode(entity_id, "kit supplier rfp reposted", now + Duration::days(1)),
            episode(entity_id, "unrelated hiring announcement", now + Duration::days(2)),
        ];
        let mut vectors = std::collections::HashMap::new();
        vectors.insert("kit supplier rfp published".to_string(), vec![1.0, 0.0]);
        vectors.insert("kit supplier rfp reposted".to_string(), vec![0.99, 0.01]);
        vectors.insert("unrelated hiring announcement".to_string(), vec![0.0, 1.0]);
        let embedder = FixedEmbedder { vectors };

        let result = cluster_episodes(&episodes, &embedder, None).await.unwrap();
        assert_eq!(result.clusters.len(), 2);
        assert!(result.compression_ratio > 0.0);
    }

    #[tokio::test]
    async fn episodes_outside_the_window_never_merge() {
        let entity_id = Uuid::new_v4();
        let now = Utc::now();
        let episodes = vec![
            episode(entity_id, "same text", now),
            episode(entity_id, "same text", now + Duration::days(46)),
        ];
        let mut vectors = std::collections::HashMap::new();
        vectors.insert("same text".to_string(), vec![1.0, 0.0]);
        let embedder = FixedEmbedder { vectors };

        let result = cluster_episodes(&episodes, &embedder, None).await.unwrap();
        assert_eq!(result.clusters.len(), 2);
    }

    #[tokio::test]
    async fn empty_input_yields_no_clusters() {
        let embedder = FixedEmbedder { vectors: std::collections::HashMap::new() };
        let result = cluster_episodes(&[], &embedder, None).await.unwrap();
        assert!(result.clusters.is_empty());
        assert_eq!(result.compression_ratio, 0.0);
    }
}
