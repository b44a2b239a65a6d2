use crate::cache::{BlockedUrlStore, CacheWriter, NewBlockedUrl};
use crate::config::Config;
use crate::extractor::{normalize_url, UrlExtractor};
use crate::heuristics::HeuristicScorer;
use crate::intel::urlhaus::UrlhausClient;
use crate::intel::virustotal::VirusTotalClient;
use crate::verdict::{aggregate, Evidence, Verdict};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Transient result of checking one URL in one message. Feeds the
/// persistent cache only when the score crosses the block threshold.
#[derive(Debug, Clone, Serialize)]
pub struct UrlCheckResult {
    pub input: String,
    pub normalized: String,
    pub score: i32,
    pub verdict: Verdict,
    pub reasons: Vec<String>,
    pub categories: Vec<String>,
    pub evidence: Vec<Evidence>,
    pub from_cache: bool,
}

/// Per-URL scoring pipeline: cache first, then heuristics plus both
/// threat-intel lookups in parallel, then aggregation. Newly-detected
/// malicious URLs are handed to the cache writer without awaiting the write.
pub struct UrlChecker {
    extractor: UrlExtractor,
    scorer: HeuristicScorer,
    urlhaus: UrlhausClient,
    virustotal: VirusTotalClient,
    store: Option<BlockedUrlStore>,
    writer: Option<CacheWriter>,
    block_threshold: i32,
    max_urls: usize,
}

impl UrlChecker {
    pub fn new(config: &Config) -> Result<Self> {
        let store = if config.security.blocked_url_cache.enabled {
            Some(BlockedUrlStore::open(
                &config.security.blocked_url_cache.database_path,
            )?)
        } else {
            None
        };
        Ok(Self::from_parts(config, store))
    }

    /// Same wiring with a caller-supplied store (tests use an in-memory one).
    pub fn with_store(config: &Config, store: BlockedUrlStore) -> Self {
        Self::from_parts(config, Some(store))
    }

    fn from_parts(config: &Config, store: Option<BlockedUrlStore>) -> Self {
        let writer = store.as_ref().map(|s| CacheWriter::new(s.clone()));
        Self {
            extractor: UrlExtractor::new(),
            scorer: HeuristicScorer::new(),
            urlhaus: UrlhausClient::new(
                config.apis.urlhaus.api_url.clone(),
                Duration::from_millis(config.security.url_check_timeout_ms),
            ),
            virustotal: VirusTotalClient::new(
                config.apis.virustotal.resolved_api_key(),
                Duration::from_millis(config.apis.virustotal.timeout_ms),
            ),
            store,
            writer,
            block_threshold: config.security.url_block_threshold,
            max_urls: config.security.max_urls_per_message,
        }
    }

    pub fn block_threshold(&self) -> i32 {
        self.block_threshold
    }

    /// Drains pending cache writes. One-shot callers run this before exit so
    /// fresh detections are not lost when the runtime is dropped.
    pub async fn flush(&self) {
        if let Some(writer) = &self.writer {
            writer.flush().await;
        }
    }

    pub async fn check_url(&self, raw: &str) -> UrlCheckResult {
        let normalized = match normalize_url(raw) {
            Some(n) => n,
            None => {
                // Fail closed at the pipeline boundary
                return UrlCheckResult {
                    input: raw.to_string(),
                    normalized: raw.to_string(),
                    score: 90,
                    verdict: Verdict::Malicious,
                    reasons: vec!["invalid URL".to_string()],
                    categories: Vec::new(),
                    evidence: Vec::new(),
                    from_cache: false,
                };
            }
        };

        if let Some(hit) = self.cache_lookup(&normalized) {
            return hit;
        }

        let heuristic = self.scorer.score(&normalized);
        let (urlhaus, virustotal) = tokio::join!(
            self.urlhaus.check(&normalized),
            self.virustotal.check(&normalized)
        );

        let agg = aggregate(heuristic.risk, &heuristic.reasons, &urlhaus, &virustotal);
        let result = UrlCheckResult {
            input: raw.to_string(),
            normalized,
            score: agg.score,
            verdict: agg.verdict,
            reasons: agg.reasons,
            categories: agg.categories,
            evidence: agg.evidence,
            from_cache: false,
        };

        if result.score >= self.block_threshold {
            if let Some(writer) = &self.writer {
                writer.record(NewBlockedUrl {
                    url: result.input.clone(),
                    normalized_url: result.normalized.clone(),
                    risk_score: result.score,
                    detection_source: agg.source,
                    reasons: result.reasons.clone(),
                    categories: result.categories.clone(),
                    evidence: result.evidence.clone(),
                });
            }
        }

        result
    }

    /// Cache hit short-circuits both external lookups. Read failures behave
    /// as a miss so a broken cache never degrades into a broken check.
    fn cache_lookup(&self, normalized: &str) -> Option<UrlCheckResult> {
        let store = self.store.as_ref()?;
        match store.lookup(normalized) {
            Ok(Some(record)) => {
                log::info!(
                    "URL found in blocked cache: {} (blocked {} times)",
                    record.normalized_url,
                    record.blocked_count
                );
                let mut reasons = record.reasons.clone();
                reasons.push(format!(
                    "Previously blocked ({} times)",
                    record.blocked_count
                ));
                Some(UrlCheckResult {
                    input: record.url.clone(),
                    normalized: record.normalized_url.clone(),
                    score: record.risk_score,
                    verdict: Verdict::from_score(record.risk_score),
                    reasons,
                    categories: record.categories.clone(),
                    evidence: vec![Evidence::Cache {
                        blocked_count: record.blocked_count,
                        first_detected: record.first_detected,
                        last_detected: record.last_detected,
                    }],
                    from_cache: true,
                })
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("Blocked-URL cache lookup failed, treating as miss: {e:#}");
                None
            }
        }
    }

    /// Extracts and checks every URL in a message, concurrently, bounded by
    /// the per-message cap. Result order follows first occurrence.
    pub async fn check_message(self: Arc<Self>, text: &str) -> Vec<UrlCheckResult> {
        let urls: Vec<String> = self
            .extractor
            .extract(text)
            .into_iter()
            .take(self.max_urls)
            .collect();

        let mut handles = Vec::with_capacity(urls.len());
        for url in urls {
            let checker = Arc::clone(&self);
            handles.push(tokio::spawn(
                async move { checker.check_url(&url).await },
            ));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => log::error!("URL check task failed: {e}"),
            }
        }
        results
    }
}
