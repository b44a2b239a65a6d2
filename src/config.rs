use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub apis: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Raw score at or above which a URL blocks the message (0-100)
    #[serde(default = "default_block_threshold")]
    pub url_block_threshold: i32,
    #[serde(default = "default_url_check_timeout_ms")]
    pub url_check_timeout_ms: u64,
    #[serde(default = "default_max_urls_per_message")]
    pub max_urls_per_message: usize,
    #[serde(default)]
    pub blocked_url_cache: CacheConfig,
    #[serde(default)]
    pub dlp: DlpConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            url_block_threshold: default_block_threshold(),
            url_check_timeout_ms: default_url_check_timeout_ms(),
            max_urls_per_message: default_max_urls_per_message(),
            blocked_url_cache: CacheConfig::default(),
            dlp: DlpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_db_path")]
    pub database_path: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database_path: default_cache_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlpConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cosine similarity above which a message counts as a leak (0.0-1.0)
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Sensitive-term matches needed for a lexical block
    #[serde(default = "default_prefilter_match_threshold")]
    pub prefilter_match_threshold: usize,
    #[serde(default = "default_corpus_path")]
    pub corpus_path: String,
}

impl Default for DlpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            similarity_threshold: default_similarity_threshold(),
            prefilter_match_threshold: default_prefilter_match_threshold(),
            corpus_path: default_corpus_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    #[serde(default)]
    pub urlhaus: UrlhausConfig,
    #[serde(default)]
    pub virustotal: VirusTotalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlhausConfig {
    #[serde(default = "default_urlhaus_api_url")]
    pub api_url: String,
}

impl Default for UrlhausConfig {
    fn default() -> Self {
        Self {
            api_url: default_urlhaus_api_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirusTotalConfig {
    /// Optional; the VirusTotal client is skipped entirely without it.
    /// Falls back to the VT_API_KEY environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_vt_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for VirusTotalConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            timeout_ms: default_vt_timeout_ms(),
        }
    }
}

impl VirusTotalConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("VT_API_KEY").ok().filter(|k| !k.is_empty()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Falls back to the GEMINI_API_KEY environment variable
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_embedding_model(),
            timeout_ms: default_embedding_timeout_ms(),
        }
    }
}

impl EmbeddingConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key.clone().filter(|k| !k.is_empty()).or_else(|| {
            std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|k| !k.is_empty())
        })
    }
}

fn default_block_threshold() -> i32 {
    70
}
fn default_url_check_timeout_ms() -> u64 {
    1500
}
fn default_max_urls_per_message() -> usize {
    5
}
fn default_true() -> bool {
    true
}
fn default_cache_db_path() -> String {
    "chatguard-blocked.db".to_string()
}
fn default_similarity_threshold() -> f32 {
    0.8
}
fn default_prefilter_match_threshold() -> usize {
    1
}
fn default_corpus_path() -> String {
    "protected_embeddings.json".to_string()
}
fn default_urlhaus_api_url() -> String {
    "https://urlhaus.abuse.ch/api/v1/url/".to_string()
}
fn default_vt_timeout_ms() -> u64 {
    2500
}
fn default_embedding_model() -> String {
    "text-embedding-004".to_string()
}
fn default_embedding_timeout_ms() -> u64 {
    2500
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Startup validation so misconfiguration surfaces before the first
    /// message, never at per-message time.
    pub fn validate(&self) -> Result<()> {
        if !(0..=100).contains(&self.security.url_block_threshold) {
            bail!(
                "url_block_threshold must be within 0-100, got {}",
                self.security.url_block_threshold
            );
        }
        if !(0.0..=1.0).contains(&self.security.dlp.similarity_threshold) {
            bail!(
                "dlp similarity_threshold must be within 0.0-1.0, got {}",
                self.security.dlp.similarity_threshold
            );
        }
        if self.security.dlp.prefilter_match_threshold == 0 {
            bail!("dlp prefilter_match_threshold must be at least 1");
        }
        if self.security.max_urls_per_message == 0 {
            bail!("max_urls_per_message must be at least 1");
        }
        if self.security.dlp.enabled && self.apis.embedding.resolved_api_key().is_none() {
            bail!(
                "DLP is enabled but no embedding API key is configured \
                 (set apis.embedding.api_key or GEMINI_API_KEY)"
            );
        }
        Ok(())
    }

    pub fn generate_default(path: &str) -> Result<()> {
        if Path::new(path).exists() {
            bail!("Config file already exists, refusing to overwrite: {path}");
        }
        let yaml = serde_yaml::to_string(&Config::default())?;
        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file: {path}"))?;
        Ok(())
    }
}
