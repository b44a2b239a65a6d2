use regex::Regex;
use url::Url;

/// Canonical form used as the cache/matching key: parseable URL with the
/// fragment stripped. Returns `None` for anything `url::Url` rejects.
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut parsed = Url::parse(raw).ok()?;
    parsed.set_fragment(None);
    Some(parsed.to_string())
}

/// Pulls candidate URLs out of free-form chat text.
///
/// Three scans are combined: explicit http(s) URLs, `www.` hosts, and bare
/// `label.tld` tokens whose suffix is a recognized TLD or executable
/// extension. Results keep first-occurrence order with duplicates removed.
pub struct UrlExtractor {
    dot_spacing: Regex,
    protocol: Regex,
    www: Regex,
    domain: Regex,
    domain_suffix: Regex,
}

impl Default for UrlExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlExtractor {
    pub fn new() -> Self {
        Self {
            // Collapses "go o g l e . com" style spacing evasion
            dot_spacing: Regex::new(r"\s*\.\s*").unwrap(),
            protocol: Regex::new(r#"(?i)\bhttps?://[^\s<>"')\]]+"#).unwrap(),
            www: Regex::new(r#"(?i)\bwww\.[^\s<>"')\]]+"#).unwrap(),
            domain: Regex::new(r"\b[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.[a-zA-Z]{2,}\b")
                .unwrap(),
            domain_suffix: Regex::new(
                r"(?i)\.(com|org|net|edu|gov|mil|int|tk|ml|ga|cf|top|click|download|loan|faith|accountant|science|date|racing|exe|scr|bat)$",
            )
            .unwrap(),
        }
    }

    pub fn extract(&self, text: &str) -> Vec<String> {
        let normalized = self.dot_spacing.replace_all(text, ".");
        let mut urls: Vec<String> = Vec::new();
        let mut seen: Vec<String> = Vec::new();
        // Dedup on the canonical form so trailing-slash, fragment or scheme
        // variants of one URL are checked once; unparseable candidates fall
        // back to raw-string identity
        let mut push_unique =
            |urls: &mut Vec<String>, seen: &mut Vec<String>, candidate: String| {
                let key = normalize_url(&candidate).unwrap_or_else(|| candidate.clone());
                if !seen.contains(&key) {
                    seen.push(key);
                    urls.push(candidate);
                }
            };

        let protocol_urls: Vec<String> = self
            .protocol
            .find_iter(&normalized)
            .map(|m| m.as_str().to_string())
            .collect();
        for u in &protocol_urls {
            push_unique(&mut urls, &mut seen, u.clone());
        }

        let www_urls: Vec<String> = self
            .www
            .find_iter(&normalized)
            .map(|m| m.as_str().to_string())
            .collect();
        for u in &www_urls {
            push_unique(&mut urls, &mut seen, format!("http://{u}"));
        }

        // Bare domains: skip tokens already covered by the first two scans to
        // avoid partial rematches
        for word in normalized.split_whitespace() {
            if protocol_urls.iter().any(|u| u.contains(word))
                || www_urls.iter().any(|u| u.contains(word))
            {
                continue;
            }
            if self.domain.is_match(word) && self.domain_suffix.is_match(word) {
                push_unique(&mut urls, &mut seen, format!("http://{word}"));
            }
        }

        urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_fragment() {
        assert_eq!(
            normalize_url("http://example.com/page#section"),
            Some("http://example.com/page".to_string())
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "http://example.com/a?b=c#frag",
            "https://WWW.Example.COM/Path",
            "http://192.168.1.5:8081/app.exe",
        ];
        for input in inputs {
            let once = normalize_url(input).unwrap();
            let twice = normalize_url(&once).unwrap();
            assert_eq!(once, twice, "normalize not idempotent for {input}");
        }
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert_eq!(normalize_url("not a url"), None);
        assert_eq!(normalize_url(""), None);
    }

    #[test]
    fn test_extract_protocol_urls() {
        let extractor = UrlExtractor::new();
        let urls = extractor.extract("check out http://evil.example/path now");
        assert_eq!(urls, vec!["http://evil.example/path"]);
    }

    #[test]
    fn test_extract_www_gets_scheme() {
        let extractor = UrlExtractor::new();
        let urls = extractor.extract("visit www.example.com today");
        assert_eq!(urls, vec!["http://www.example.com"]);
    }

    #[test]
    fn test_extract_bare_domain() {
        let extractor = UrlExtractor::new();
        let urls = extractor.extract("download from malware-site.tk please");
        assert_eq!(urls, vec!["http://malware-site.tk"]);
    }

    #[test]
    fn test_extract_ignores_plain_words() {
        let extractor = UrlExtractor::new();
        assert!(extractor.extract("hello there, how are you?").is_empty());
    }

    #[test]
    fn test_extract_defeats_dot_spacing() {
        let extractor = UrlExtractor::new();
        let urls = extractor.extract("go to evil . com now");
        assert_eq!(urls, vec!["http://evil.com"]);
    }

    #[test]
    fn test_extract_dedup_preserves_first_seen_order() {
        let extractor = UrlExtractor::new();
        let urls = extractor.extract(
            "http://first.example then www.second.example then http://first.example again",
        );
        assert_eq!(
            urls,
            vec!["http://first.example", "http://www.second.example"]
        );
    }

    #[test]
    fn test_extract_no_duplicate_normalized_entries() {
        let extractor = UrlExtractor::new();
        let urls = extractor.extract("http://www.example.com and www.example.com");
        let normalized: Vec<_> = urls.iter().filter_map(|u| normalize_url(u)).collect();
        let mut deduped = normalized.clone();
        deduped.dedup();
        assert_eq!(normalized, deduped);
        assert_eq!(urls.len(), 1);
    }

    #[test]
    fn test_extract_collapses_trailing_slash_variants() {
        let extractor = UrlExtractor::new();
        // Both candidates normalize to http://www.example.com/ and must not
        // yield two checks for the same URL
        let urls =
            extractor.extract("visit www.example.com then http://www.example.com/ now");
        assert_eq!(urls.len(), 1);
        let normalized: Vec<_> = urls.iter().filter_map(|u| normalize_url(u)).collect();
        let mut deduped = normalized.clone();
        deduped.dedup();
        assert_eq!(normalized, deduped);
    }
}
