use ai_client::openai::OpenAi;
use ai_client::traits::EmbedAgent;
use anyhow::Result;
use async_trait::async_trait;

/// Text-to-vector embedding, injected so episode clustering's
/// cosine-similarity grouping never depends on a concrete
/// provider.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;
}

/// Wrapper around Voyage AI embeddings via the OpenAI-compatible API.
pub struct VoyageEmbedder {
    client: OpenAi,
}

impl VoyageEmbedder {
    pub fn new(voyage_api_key: &str) -> Self {
        let client = OpenAi::new(voyage_api_key, "voyage-3-large")
            .with_base_url("https://api.voyageai.com/v1")
            .with_embedding_model("voyage-3-large");
        Self { client }
    }
}

#[async_trait]
impl TextEmbedder for VoyageEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(text.to_string()).await
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.client.embed_batch(texts).await
    }
}

/// Cosine similarity between two equal-length vectors. Returns `0.0` for a
/// degenerate (zero-length or mismatched) pair rather than panicking.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_similarity_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_have_similarity_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_does_not_panic_and_scores_zero() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }
}
