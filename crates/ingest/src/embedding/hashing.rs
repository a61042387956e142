//! Local embeddings via feature hashing.
//!
//! Each lowercase alphanumeric token is hashed into one of `dimensions`
//! buckets; the term-frequency vector is L2-normalised. Stable across runs
//! and processes, needs no model download or network access.

use async_trait::async_trait;

use super::traits::{Embedder, EmbeddingError};

pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// FNV-1a, fixed so bucket assignment never changes between builds.
    fn bucket(&self, token: &str) -> usize {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in token.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        (hash % self.dimensions as u64) as usize
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut tf = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            tf[self.bucket(&token.to_lowercase())] += 1.0;
        }

        let norm: f32 = tf.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut tf {
                *x /= norm;
            }
        }
        tf
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "feature-hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vectors_are_normalised() {
        let e = HashingEmbedder::new(64);
        let v = e.embed("The capital of France is Paris.");
        assert_eq!(v.len(), 64);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn case_and_punctuation_are_ignored() {
        let e = HashingEmbedder::new(128);
        assert_eq!(e.embed("Paris, France!"), e.embed("paris france"));
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let e = HashingEmbedder::new(16);
        assert!(e.embed("  ...  ").iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let e = HashingEmbedder::new(32);
        let out = e.embed_batch(&["alpha", "beta"]).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], e.embed("alpha"));
        assert_eq!(out[1], e.embed("beta"));
    }
}
