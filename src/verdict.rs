use crate::intel::urlhaus::UrlhausResult;
use crate::intel::virustotal::VirusTotalResult;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

fn malicious_category_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)phishing|malware|suspicious|trojan|virus").unwrap())
}

/// Coarse risk label derived from the score. Distinct from the binary block
/// decision, which compares the raw score against the configured threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Clean,
    LikelyClean,
    PotentiallyRisky,
    Suspicious,
    Malicious,
}

impl Verdict {
    pub fn from_score(score: i32) -> Self {
        if score >= 60 {
            Verdict::Malicious
        } else if score >= 35 {
            Verdict::Suspicious
        } else if score >= 15 {
            Verdict::PotentiallyRisky
        } else if score >= 5 {
            Verdict::LikelyClean
        } else {
            Verdict::Clean
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Clean => "clean",
            Verdict::LikelyClean => "likely_clean",
            Verdict::PotentiallyRisky => "potentially_risky",
            Verdict::Suspicious => "suspicious",
            Verdict::Malicious => "malicious",
        }
    }
}

/// Which signal produced a blocked-URL record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    Heuristic,
    Urlhaus,
    Virustotal,
    Combined,
}

impl DetectionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionSource::Heuristic => "heuristic",
            DetectionSource::Urlhaus => "urlhaus",
            DetectionSource::Virustotal => "virustotal",
            DetectionSource::Combined => "combined",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "urlhaus" => DetectionSource::Urlhaus,
            "virustotal" => DetectionSource::Virustotal,
            "combined" => DetectionSource::Combined,
            _ => DetectionSource::Heuristic,
        }
    }
}

/// Per-source snapshot of what a detection was based on. One variant per
/// source so each keeps its own schema instead of a loose bag of fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Evidence {
    Urlhaus {
        status: Option<String>,
        raw: Option<Value>,
    },
    Virustotal {
        detections: u32,
        categories: Vec<String>,
        raw: Option<Value>,
    },
    Cache {
        blocked_count: i64,
        first_detected: DateTime<Utc>,
        last_detected: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
pub struct Aggregated {
    pub score: i32,
    pub verdict: Verdict,
    pub reasons: Vec<String>,
    pub categories: Vec<String>,
    pub evidence: Vec<Evidence>,
    pub source: DetectionSource,
}

/// Combines the heuristic risk with both threat-intel signals.
///
/// URLHaus is a binary listing and contributes a fixed bonus. VirusTotal
/// scales with detection count, capped at 80. Category labels are always
/// unioned into the result, but the per-malicious-category bonus applies only
/// when the detection-count bonus did not fire, so one underlying finding is
/// never scored twice.
pub fn aggregate(
    heuristic_risk: i32,
    heuristic_reasons: &[String],
    urlhaus: &UrlhausResult,
    virustotal: &VirusTotalResult,
) -> Aggregated {
    let malicious_category = malicious_category_pattern();

    let mut score = heuristic_risk;
    let mut reasons = heuristic_reasons.to_vec();
    let mut categories = Vec::new();
    let mut sources = Vec::new();

    if heuristic_risk > 0 {
        sources.push(DetectionSource::Heuristic);
    }

    if urlhaus.listed {
        score += 80;
        reasons.push(format!(
            "URLHaus: {}",
            urlhaus.status.as_deref().unwrap_or("listed")
        ));
        sources.push(DetectionSource::Urlhaus);
    }

    if virustotal.enabled {
        if virustotal.listed {
            let bonus = 80.min(30 + virustotal.detections as i32 * 5);
            score += bonus;
            reasons.push(format!(
                "VirusTotal detections: {}",
                virustotal.detections
            ));
            sources.push(DetectionSource::Virustotal);
        }
        if !virustotal.categories.is_empty() {
            for cat in &virustotal.categories {
                if !categories.contains(cat) {
                    categories.push(cat.clone());
                }
            }
            if !virustotal.listed {
                let malicious: Vec<&String> = virustotal
                    .categories
                    .iter()
                    .filter(|c| malicious_category.is_match(c))
                    .collect();
                if !malicious.is_empty() {
                    score += malicious.len() as i32 * 15;
                    reasons.push(format!(
                        "malicious categories: {}",
                        malicious
                            .iter()
                            .map(|c| c.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ));
                    if !sources.contains(&DetectionSource::Virustotal) {
                        sources.push(DetectionSource::Virustotal);
                    }
                }
            }
        }
    }

    let source = match sources.len() {
        0 => DetectionSource::Heuristic,
        1 => sources[0],
        _ => DetectionSource::Combined,
    };

    Aggregated {
        score,
        verdict: Verdict::from_score(score),
        reasons,
        categories,
        evidence: merge_evidence(urlhaus, virustotal),
        source,
    }
}

/// Explicit evidence merge: one entry per source that actually responded.
pub fn merge_evidence(urlhaus: &UrlhausResult, virustotal: &VirusTotalResult) -> Vec<Evidence> {
    let mut evidence = Vec::new();
    if urlhaus.listed {
        evidence.push(Evidence::Urlhaus {
            status: urlhaus.status.clone(),
            raw: urlhaus.raw.clone(),
        });
    }
    if virustotal.enabled && (virustotal.listed || !virustotal.categories.is_empty()) {
        evidence.push(Evidence::Virustotal {
            detections: virustotal.detections,
            categories: virustotal.categories.clone(),
            raw: virustotal.raw.clone(),
        });
    }
    evidence
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_urlhaus() -> UrlhausResult {
        UrlhausResult::not_listed()
    }

    fn no_vt() -> VirusTotalResult {
        VirusTotalResult::disabled()
    }

    #[test]
    fn test_verdict_boundaries_are_exact() {
        assert_eq!(Verdict::from_score(59), Verdict::Suspicious);
        assert_eq!(Verdict::from_score(60), Verdict::Malicious);
        assert_eq!(Verdict::from_score(34), Verdict::PotentiallyRisky);
        assert_eq!(Verdict::from_score(35), Verdict::Suspicious);
        assert_eq!(Verdict::from_score(14), Verdict::LikelyClean);
        assert_eq!(Verdict::from_score(15), Verdict::PotentiallyRisky);
        assert_eq!(Verdict::from_score(4), Verdict::Clean);
        assert_eq!(Verdict::from_score(5), Verdict::LikelyClean);
    }

    #[test]
    fn test_verdict_tiers_totally_ordered() {
        assert!(Verdict::Clean < Verdict::LikelyClean);
        assert!(Verdict::LikelyClean < Verdict::PotentiallyRisky);
        assert!(Verdict::PotentiallyRisky < Verdict::Suspicious);
        assert!(Verdict::Suspicious < Verdict::Malicious);
    }

    #[test]
    fn test_urlhaus_listing_adds_fixed_bonus() {
        let uh = UrlhausResult {
            listed: true,
            status: Some("online".to_string()),
            raw: None,
        };
        let agg = aggregate(10, &["suspicious TLD".to_string()], &uh, &no_vt());
        assert_eq!(agg.score, 90);
        assert_eq!(agg.verdict, Verdict::Malicious);
        assert!(agg.reasons.iter().any(|r| r == "URLHaus: online"));
        assert_eq!(agg.source, DetectionSource::Combined);
    }

    #[test]
    fn test_virustotal_bonus_scales_and_caps() {
        let vt = VirusTotalResult {
            enabled: true,
            listed: true,
            detections: 3,
            categories: vec![],
            raw: None,
        };
        let agg = aggregate(0, &[], &no_urlhaus(), &vt);
        assert_eq!(agg.score, 45); // 30 + 3*5
        assert_eq!(agg.source, DetectionSource::Virustotal);

        let many = VirusTotalResult {
            detections: 40,
            ..vt
        };
        let agg = aggregate(0, &[], &no_urlhaus(), &many);
        assert_eq!(agg.score, 80); // capped
    }

    #[test]
    fn test_category_bonus_not_double_counted_with_detections() {
        let vt = VirusTotalResult {
            enabled: true,
            listed: true,
            detections: 2,
            categories: vec!["phishing".to_string(), "malware".to_string()],
            raw: None,
        };
        let agg = aggregate(0, &[], &no_urlhaus(), &vt);
        // Detection bonus only: 30 + 2*5, no +15 per category on top
        assert_eq!(agg.score, 40);
        assert_eq!(agg.categories, vec!["phishing", "malware"]);
    }

    #[test]
    fn test_category_bonus_applies_without_detections() {
        let vt = VirusTotalResult {
            enabled: true,
            listed: false,
            detections: 0,
            categories: vec!["phishing".to_string(), "shopping".to_string()],
            raw: None,
        };
        let agg = aggregate(0, &[], &no_urlhaus(), &vt);
        assert_eq!(agg.score, 15); // only "phishing" matches the malicious pattern
        assert!(agg
            .reasons
            .iter()
            .any(|r| r == "malicious categories: phishing"));
    }

    #[test]
    fn test_category_pattern_is_case_insensitive() {
        let vt = VirusTotalResult {
            enabled: true,
            listed: false,
            detections: 0,
            categories: vec!["Phishing".to_string()],
            raw: None,
        };
        let agg = aggregate(0, &[], &no_urlhaus(), &vt);
        assert_eq!(agg.score, 15);
    }

    #[test]
    fn test_no_signals_keeps_heuristic_score() {
        let agg = aggregate(0, &[], &no_urlhaus(), &no_vt());
        assert_eq!(agg.score, 0);
        assert_eq!(agg.verdict, Verdict::Clean);
        assert!(agg.evidence.is_empty());
        assert_eq!(agg.source, DetectionSource::Heuristic);
    }
}
