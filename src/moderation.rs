use crate::checker::{UrlCheckResult, UrlChecker};
use crate::config::Config;
use crate::dlp::{DlpEngine, LeakSource};
use crate::verdict::Verdict;
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

/// Per-URL summary handed back to the transport layer.
#[derive(Debug, Clone, Serialize)]
pub struct UrlFinding {
    pub url: String,
    pub score: i32,
    pub verdict: Verdict,
    pub reasons: Vec<String>,
    pub from_cache: bool,
}

impl From<&UrlCheckResult> for UrlFinding {
    fn from(result: &UrlCheckResult) -> Self {
        Self {
            url: result.normalized.clone(),
            score: result.score,
            verdict: result.verdict,
            reasons: result.reasons.clone(),
            from_cache: result.from_cache,
        }
    }
}

/// Final allow/block decision. The notice is what non-admin users may see;
/// it never carries internal scores or reasons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Block { notice: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ModerationOutcome {
    pub url_findings: Vec<UrlFinding>,
    pub leak_detected: bool,
    pub decision: Decision,
}

impl ModerationOutcome {
    pub fn is_blocked(&self) -> bool {
        matches!(self.decision, Decision::Block { .. })
    }
}

/// The single entry point the chat transport calls per outgoing message.
/// URL screening runs first; DLP only runs when every URL passed.
pub struct ModerationPipeline {
    urls: Arc<UrlChecker>,
    dlp: Option<DlpEngine>,
}

impl ModerationPipeline {
    pub fn new(config: &Config) -> Result<Self> {
        let urls = Arc::new(UrlChecker::new(config)?);
        let dlp = if config.security.dlp.enabled {
            Some(DlpEngine::new(config)?)
        } else {
            log::info!("DLP checks disabled by configuration");
            None
        };
        Ok(Self { urls, dlp })
    }

    pub fn with_parts(urls: Arc<UrlChecker>, dlp: Option<DlpEngine>) -> Self {
        Self { urls, dlp }
    }

    pub fn url_checker(&self) -> &UrlChecker {
        &self.urls
    }

    pub async fn screen_message(&self, text: &str) -> ModerationOutcome {
        let results = Arc::clone(&self.urls).check_message(text).await;
        let url_findings: Vec<UrlFinding> = results.iter().map(UrlFinding::from).collect();

        if let Some(worst) = results.iter().max_by_key(|r| r.score) {
            if worst.score >= self.urls.block_threshold() {
                log::warn!(
                    "Message blocked: URL {} scored {} (threshold {}){}",
                    worst.normalized,
                    worst.score,
                    self.urls.block_threshold(),
                    if worst.from_cache {
                        " [cache rematch]"
                    } else {
                        ""
                    }
                );
                let notice = if worst.from_cache {
                    "A link in this message was previously identified as malicious. \
                     Message blocked."
                } else {
                    "This message contains a dangerous link and was blocked."
                };
                return ModerationOutcome {
                    url_findings,
                    leak_detected: false,
                    decision: Decision::Block {
                        notice: notice.to_string(),
                    },
                };
            }
        }

        if let Some(dlp) = &self.dlp {
            if let Some(source) = dlp.evaluate(text).await {
                match &source {
                    LeakSource::Prefilter(matches) => log::warn!(
                        "Message blocked by DLP prefilter ({} sensitive matches)",
                        matches.len()
                    ),
                    LeakSource::Semantic(name) => {
                        log::warn!("Message blocked by DLP semantic match against '{name}'")
                    }
                }
                return ModerationOutcome {
                    url_findings,
                    leak_detected: true,
                    decision: Decision::Block {
                        notice: "Message contains restricted content".to_string(),
                    },
                };
            }
        }

        ModerationOutcome {
            url_findings,
            leak_detected: false,
            decision: Decision::Allow,
        }
    }
}
