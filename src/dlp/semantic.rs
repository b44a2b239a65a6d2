use crate::dlp::corpus::ProtectedEmbedding;
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const EMBEDDING_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbedValues,
}

#[derive(Debug, Deserialize)]
struct EmbedValues {
    values: Vec<f32>,
}

/// Client for the embedding provider, used online (per message) and offline
/// (corpus build).
pub struct EmbeddingClient {
    client: Client,
    api_key: Option<String>,
    api_base: String,
    model: String,
    timeout: Duration,
}

impl EmbeddingClient {
    pub fn new(api_key: Option<String>, model: String, timeout: Duration) -> Self {
        Self::with_base(api_key, EMBEDDING_API_BASE.to_string(), model, timeout)
    }

    pub fn with_base(
        api_key: Option<String>,
        api_base: String,
        model: String,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .user_agent(concat!("chatguard/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key,
            api_base,
            model,
            timeout,
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| anyhow!("No embedding API key configured"))?;

        let endpoint = format!(
            "{}/{}:embedContent?key={}",
            self.api_base, self.model, key
        );
        let body = json!({
            "model": format!("models/{}", self.model),
            "content": { "parts": [{ "text": text }] }
        });

        let request = async {
            let response = self
                .client
                .post(&endpoint)
                .json(&body)
                .send()
                .await
                .context("Embedding request failed")?;
            if !response.status().is_success() {
                return Err(anyhow!(
                    "Embedding provider returned status {}",
                    response.status()
                ));
            }
            let parsed: EmbedResponse = response
                .json()
                .await
                .context("Failed to parse embedding response")?;
            Ok(parsed.embedding.values)
        };

        let values = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| anyhow!("Embedding request timed out after {:?}", self.timeout))??;

        if values.is_empty() {
            return Err(anyhow!("Embedding provider returned an empty vector"));
        }
        Ok(values)
    }
}

/// Embeds the message and compares it against every protected-content entry.
/// A leak is any similarity above the threshold.
pub async fn find_leak(
    embedder: &EmbeddingClient,
    corpus: &[ProtectedEmbedding],
    text: &str,
    threshold: f32,
) -> Result<Option<String>> {
    let message_embedding = embedder.embed(text).await?;

    for entry in corpus {
        let similarity = cosine_similarity(&message_embedding, &entry.embedding);
        if similarity > threshold {
            log::debug!(
                "Semantic match against '{}' (similarity {similarity:.3})",
                entry.name
            );
            return Ok(Some(entry.name.clone()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical_vectors() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 0.001);
    }

    #[test]
    fn test_cosine_zero_norm_guard() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[tokio::test]
    async fn test_embed_without_key_errors() {
        let client = EmbeddingClient::new(
            None,
            "text-embedding-004".to_string(),
            Duration::from_millis(100),
        );
        assert!(client.embed("hello").await.is_err());
    }

    #[tokio::test]
    async fn test_find_leak_matches_similar_vector() {
        // Bypass the provider by comparing against a corpus directly
        let corpus = vec![ProtectedEmbedding {
            id: "r1".to_string(),
            name: "Marinara".to_string(),
            embedding: vec![1.0, 0.0, 0.0],
            tokens: vec![],
        }];
        let probe = vec![0.99, 0.1, 0.0];
        let similarity = cosine_similarity(&probe, &corpus[0].embedding);
        assert!(similarity > 0.9);
    }
}
