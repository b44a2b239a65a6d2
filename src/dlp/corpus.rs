use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One protected-content item with its precomputed embedding. Loaded
/// read-only at startup; the moderation pipeline never mutates the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectedEmbedding {
    pub id: String,
    pub name: String,
    pub embedding: Vec<f32>,
    /// Source tokens the embedding was derived from (also harvested into the
    /// sensitive term set)
    #[serde(default)]
    pub tokens: Vec<String>,
}

/// Source material for the offline corpus build.
#[derive(Debug, Clone, Deserialize)]
pub struct ProtectedItem {
    pub id: String,
    pub name: String,
    pub tokens: Vec<String>,
}

impl ProtectedItem {
    /// Text submitted to the embedding provider for this item.
    pub fn embedding_text(&self) -> String {
        format!("{}: {}", self.name, self.tokens.join(", "))
    }
}

pub fn load_corpus(path: &str) -> Result<Vec<ProtectedEmbedding>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read protected-content corpus: {path}"))?;
    let corpus: Vec<ProtectedEmbedding> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse protected-content corpus: {path}"))?;
    Ok(corpus)
}

pub fn load_items(path: &str) -> Result<Vec<ProtectedItem>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read protected-content source: {path}"))?;
    let items: Vec<ProtectedItem> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse protected-content source: {path}"))?;
    Ok(items)
}

/// Offline precomputation: embeds every protected item and writes the corpus
/// file the semantic checker loads at startup. Refuses to clobber an
/// existing corpus.
pub async fn build_corpus(
    items: &[ProtectedItem],
    embedder: &crate::dlp::semantic::EmbeddingClient,
    output_path: &str,
) -> Result<usize> {
    if Path::new(output_path).exists() {
        bail!("Corpus file already exists, refusing to overwrite: {output_path}");
    }

    let mut corpus = Vec::with_capacity(items.len());
    for item in items {
        let embedding = embedder
            .embed(&item.embedding_text())
            .await
            .with_context(|| format!("Failed to embed protected item {}", item.id))?;
        corpus.push(ProtectedEmbedding {
            id: item.id.clone(),
            name: item.name.clone(),
            embedding,
            tokens: item.tokens.clone(),
        });
    }

    std::fs::write(output_path, serde_json::to_string_pretty(&corpus)?)
        .with_context(|| format!("Failed to write corpus file: {output_path}"))?;
    Ok(corpus.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_text_shape() {
        let item = ProtectedItem {
            id: "r1".to_string(),
            name: "Marinara".to_string(),
            tokens: vec!["tomato".to_string(), "basil".to_string()],
        };
        assert_eq!(item.embedding_text(), "Marinara: tomato, basil");
    }

    #[test]
    fn test_corpus_roundtrips_through_json() {
        let corpus = vec![ProtectedEmbedding {
            id: "r1".to_string(),
            name: "Marinara".to_string(),
            embedding: vec![0.25, -0.5, 1.0],
            tokens: vec!["tomato".to_string()],
        }];
        let json = serde_json::to_string(&corpus).unwrap();
        let parsed: Vec<ProtectedEmbedding> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].embedding, vec![0.25, -0.5, 1.0]);
    }

    #[test]
    fn test_corpus_tokens_field_optional() {
        let json = r#"[{"id":"r1","name":"Marinara","embedding":[0.1,0.2]}]"#;
        let parsed: Vec<ProtectedEmbedding> = serde_json::from_str(json).unwrap();
        assert!(parsed[0].tokens.is_empty());
    }
}
