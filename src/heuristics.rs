use regex::Regex;
use url::Url;

/// Outcome of the pure heuristic pass over one normalized URL.
#[derive(Debug, Clone)]
pub struct HeuristicScore {
    pub risk: i32,
    pub reasons: Vec<String>,
}

/// Facts precomputed once per URL so individual rules stay cheap.
struct UrlFacts {
    host: String,
    path: String,
    full: String,
    length: usize,
    port: Option<u16>,
}

type RuleCheck = Box<dyn Fn(&UrlFacts) -> Option<String> + Send + Sync>;

struct Rule {
    points: i32,
    check: RuleCheck,
}

const SHORTENER_HOSTS: &[&str] = &[
    "bit.ly", "tinyurl", "t.co", "goo.gl", "ow.ly", "is.gd", "buff.ly", "v.gd", "tiny.cc",
    "rb.gy", "cutt.ly", "shorturl.at",
];

const DANGEROUS_EXTENSIONS: &[&str] = &[
    ".exe", ".scr", ".bat", ".cmd", ".com", ".pif", ".vbs", ".jar", ".apk", ".dmg",
];

const STANDARD_PORTS: &[u16] = &[80, 443, 8080, 8443];

/// Additive risk scorer over a single normalized URL.
///
/// The rule table is built once as data; rules fire independently and scores
/// accumulate without a cap. A URL that cannot be parsed fails closed with a
/// fixed risk of 80.
pub struct HeuristicScorer {
    rules: Vec<Rule>,
}

impl Default for HeuristicScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicScorer {
    pub fn new() -> Self {
        let ip_literal = Regex::new(r"^\d{1,3}(\.\d{1,3}){3}$").unwrap();
        let suspicious_tld = Regex::new(
            r"\.(tk|ml|ga|cf|top|click|download|loan|faith|accountant|science|date|racing)$",
        )
        .unwrap();
        let brand_in_host =
            Regex::new(r"\b(secure|login|bank|paypal|amazon|microsoft|apple|facebook)\b").unwrap();
        let brand_own_domain =
            Regex::new(r"\.(paypal|amazon|microsoft|apple|google|facebook)\.com$").unwrap();
        let google_in_host = Regex::new(r"\bgoogle\b").unwrap();
        let real_google = Regex::new(r"^(www\.)?google\.com$").unwrap();
        let suspicious_keyword =
            Regex::new(r"\b(phishing|malware|virus|hack|crack|keygen|torrent|warez)\b").unwrap();
        let redirect_param = Regex::new(r"(?i)(\?|&)(redirect|url|goto|link|redir)=http").unwrap();

        let rules: Vec<Rule> = vec![
            Rule {
                points: 40,
                check: Box::new(move |f| {
                    ip_literal
                        .is_match(&f.host)
                        .then(|| "IP literal host".to_string())
                }),
            },
            Rule {
                points: 30,
                check: Box::new(|f| {
                    (f.host.split('.').count() > 4).then(|| "too many subdomains".to_string())
                }),
            },
            Rule {
                points: 35,
                check: Box::new(move |f| {
                    suspicious_tld
                        .is_match(&f.host)
                        .then(|| "suspicious TLD".to_string())
                }),
            },
            Rule {
                points: 50,
                check: Box::new(move |f| {
                    (brand_in_host.is_match(&f.host) && !brand_own_domain.is_match(&f.host))
                        .then(|| "domain spoofing attempt".to_string())
                }),
            },
            Rule {
                points: 50,
                check: Box::new(move |f| {
                    (google_in_host.is_match(&f.host) && !real_google.is_match(&f.host))
                        .then(|| "potential Google spoofing".to_string())
                }),
            },
            Rule {
                points: 25,
                check: Box::new(|f| {
                    SHORTENER_HOSTS
                        .iter()
                        .any(|s| f.host.contains(s))
                        .then(|| "URL shortener".to_string())
                }),
            },
            Rule {
                points: 45,
                check: Box::new(|f| {
                    DANGEROUS_EXTENSIONS
                        .iter()
                        .any(|ext| f.path.ends_with(ext))
                        .then(|| "dangerous file extension".to_string())
                }),
            },
            Rule {
                points: 40,
                check: Box::new(move |f| {
                    suspicious_keyword
                        .is_match(&f.full)
                        .then(|| "suspicious keywords".to_string())
                }),
            },
            Rule {
                points: 20,
                check: Box::new(|f| (f.length > 200).then(|| "very long URL".to_string())),
            },
            Rule {
                points: 10,
                check: Box::new(|f| {
                    (f.length > 100 && f.length <= 200).then(|| "long URL".to_string())
                }),
            },
            Rule {
                points: 25,
                check: Box::new(|f| match f.port {
                    Some(p) if !STANDARD_PORTS.contains(&p) => {
                        Some(format!("suspicious port :{p}"))
                    }
                    _ => None,
                }),
            },
            Rule {
                points: 15,
                check: Box::new(|f| {
                    (f.host.matches('-').count() > 3).then(|| "many dashes in domain".to_string())
                }),
            },
            Rule {
                points: 20,
                check: Box::new(|f| {
                    (f.host.chars().filter(|c| c.is_ascii_digit()).count() > 5)
                        .then(|| "many numbers in domain".to_string())
                }),
            },
            Rule {
                points: 30,
                check: Box::new(move |f| {
                    redirect_param
                        .is_match(&f.full)
                        .then(|| "suspicious redirect parameter".to_string())
                }),
            },
        ];

        Self { rules }
    }

    pub fn score(&self, url: &str) -> HeuristicScore {
        let parsed = match Url::parse(url) {
            Ok(u) => u,
            Err(_) => {
                return HeuristicScore {
                    risk: 80,
                    reasons: vec!["invalid URL".to_string()],
                }
            }
        };

        let facts = UrlFacts {
            host: parsed.host_str().unwrap_or("").to_lowercase(),
            path: parsed.path().to_lowercase(),
            full: url.to_lowercase(),
            length: url.len(),
            port: parsed.port(),
        };

        let mut risk = 0;
        let mut reasons = Vec::new();
        for rule in &self.rules {
            if let Some(reason) = (rule.check)(&facts) {
                risk += rule.points;
                reasons.push(reason);
            }
        }

        HeuristicScore { risk, reasons }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_url_scores_zero() {
        let scorer = HeuristicScorer::new();
        let result = scorer.score("https://example.org/about");
        assert_eq!(result.risk, 0);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn test_invalid_url_fails_closed() {
        let scorer = HeuristicScorer::new();
        let result = scorer.score("not a url at all");
        assert_eq!(result.risk, 80);
        assert_eq!(result.reasons, vec!["invalid URL"]);
    }

    #[test]
    fn test_ip_literal_plus_executable() {
        let scorer = HeuristicScorer::new();
        let result = scorer.score("http://192.168.1.5/app.exe");
        assert!(result.reasons.iter().any(|r| r == "IP literal host"));
        assert!(result
            .reasons
            .iter()
            .any(|r| r == "dangerous file extension"));
        // 40 (IP) + 45 (extension) + 20 (digits in host) at minimum
        assert!(result.risk >= 85, "got {}", result.risk);
    }

    #[test]
    fn test_suspicious_tld() {
        let scorer = HeuristicScorer::new();
        let result = scorer.score("http://free-prizes.tk/");
        assert!(result.reasons.iter().any(|r| r == "suspicious TLD"));
    }

    #[test]
    fn test_brand_spoofing_fires_outside_real_domain() {
        let scorer = HeuristicScorer::new();
        let spoof = scorer.score("http://paypal.account-verify.net/login");
        assert!(spoof
            .reasons
            .iter()
            .any(|r| r == "domain spoofing attempt"));

        let real = scorer.score("http://www.paypal.com/signin");
        assert!(!real
            .reasons
            .iter()
            .any(|r| r == "domain spoofing attempt"));
    }

    #[test]
    fn test_google_spoofing_special_case() {
        let scorer = HeuristicScorer::new();
        let spoof = scorer.score("http://google.secure-login.info/");
        assert!(spoof
            .reasons
            .iter()
            .any(|r| r == "potential Google spoofing"));

        let real = scorer.score("http://www.google.com/search");
        assert!(!real
            .reasons
            .iter()
            .any(|r| r == "potential Google spoofing"));
    }

    #[test]
    fn test_length_rules_mutually_exclusive() {
        let scorer = HeuristicScorer::new();
        let medium = format!("http://example.org/{}", "a".repeat(120));
        let result = scorer.score(&medium);
        assert!(result.reasons.iter().any(|r| r == "long URL"));
        assert!(!result.reasons.iter().any(|r| r == "very long URL"));

        let long = format!("http://example.org/{}", "a".repeat(250));
        let result = scorer.score(&long);
        assert!(result.reasons.iter().any(|r| r == "very long URL"));
        assert!(!result.reasons.iter().any(|r| r == "long URL"));
    }

    #[test]
    fn test_nonstandard_port() {
        let scorer = HeuristicScorer::new();
        let result = scorer.score("http://example.org:8081/");
        assert!(result
            .reasons
            .iter()
            .any(|r| r == "suspicious port :8081"));

        let standard = scorer.score("https://example.org:8443/");
        assert!(standard.reasons.is_empty());
    }

    #[test]
    fn test_redirect_parameter() {
        let scorer = HeuristicScorer::new();
        let result = scorer.score("http://example.org/go?redirect=http://evil.example");
        assert!(result
            .reasons
            .iter()
            .any(|r| r == "suspicious redirect parameter"));
    }

    #[test]
    fn test_score_is_monotone_as_features_accumulate() {
        let scorer = HeuristicScorer::new();
        let base = scorer.score("http://bit.ly/x").risk;
        let plus_port = scorer.score("http://bit.ly:9999/x").risk;
        let plus_exe = scorer.score("http://bit.ly:9999/x.exe").risk;
        assert!(plus_port > base);
        assert!(plus_exe > plus_port);
    }
}
