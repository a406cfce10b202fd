use async_trait::async_trait;
use siteask_core::{SiteaskError, SiteaskResult};

/// Trait for computing text embeddings (vector representations).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute the embedding vector for a single text.
    async fn embed(&self, text: &str) -> SiteaskResult<Vec<f32>>;

    /// Dimension of the embedding vectors produced by this provider.
    fn dimension(&self) -> usize;
}

/// Deterministic feature-hashed embedding over unigrams and bigrams.
///
/// No model download, no network: each token and each adjacent token
/// pair is hashed to one dimension and the resulting vector is
/// L2-normalized. Retrieval quality is what you'd expect from a
/// lexical embedding — enough to drive the local shard backend and
/// the test suite; production deployments plug a real model in behind
/// [`EmbeddingProvider`].
pub struct HashedNgramEmbedding {
    dimension: usize,
}

impl HashedNgramEmbedding {
    /// Creates a provider emitting vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashedNgramEmbedding {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingProvider for HashedNgramEmbedding {
    async fn embed(&self, text: &str) -> SiteaskResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(SiteaskError::Retrieval(
                "cannot embed empty text".to_string(),
            ));
        }

        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > 1)
            .collect();

        let mut vector = vec![0.0f32; self.dimension];

        for token in &tokens {
            let slot = fnv1a(token.as_bytes()) as usize % self.dimension;
            vector[slot] += 1.0;
        }
        // Bigrams weigh less than unigrams so single-word overlap
        // still dominates short queries.
        for pair in tokens.windows(2) {
            let joined = format!("{} {}", pair[0], pair[1]);
            let slot = fnv1a(joined.as_bytes()) as usize % self.dimension;
            vector[slot] += 0.5;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// FNV-1a over the feature bytes. 64-bit to keep slot collisions rare
/// at small dimensions.
fn fnv1a(data: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &byte in data {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_dimension_and_normalization() {
        let emb = HashedNgramEmbedding::new(128);
        assert_eq!(emb.dimension(), 128);
        let v = emb.embed("granite climbing routes in the valley").await.unwrap();
        assert_eq!(v.len(), 128);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_deterministic() {
        let emb = HashedNgramEmbedding::default();
        let a = emb.embed("waterproof hiking boots").await.unwrap();
        let b = emb.embed("waterproof hiking boots").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_related_texts_closer() {
        let emb = HashedNgramEmbedding::default();
        let boots = emb.embed("waterproof hiking boots").await.unwrap();
        let shoes = emb.embed("hiking shoes waterproof").await.unwrap();
        let cake = emb.embed("chocolate layer cake").await.unwrap();

        assert!(cosine(&boots, &shoes) > cosine(&boots, &cake));
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let emb = HashedNgramEmbedding::default();
        assert!(emb.embed("   ").await.is_err());
    }
}
