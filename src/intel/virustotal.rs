use anyhow::Result;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

const VT_API_BASE: &str = "https://www.virustotal.com/api/v3";

/// Outcome of a VirusTotal lookup. `enabled == false` means no API key is
/// configured and the client was skipped entirely.
#[derive(Debug, Clone)]
pub struct VirusTotalResult {
    pub enabled: bool,
    pub listed: bool,
    pub detections: u32,
    pub categories: Vec<String>,
    pub raw: Option<Value>,
}

impl VirusTotalResult {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            listed: false,
            detections: 0,
            categories: Vec::new(),
            raw: None,
        }
    }

    pub fn not_listed() -> Self {
        Self {
            enabled: true,
            ..Self::disabled()
        }
    }
}

/// Authenticated lookup providing detection counts and category labels.
///
/// The submit step refreshes the analysis object but is allowed to fail; the
/// fetch step is the one that matters.
pub struct VirusTotalClient {
    client: Client,
    api_key: Option<String>,
    api_base: String,
    timeout: Duration,
}

impl VirusTotalClient {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Self {
        Self::with_base(api_key, VT_API_BASE.to_string(), timeout)
    }

    pub fn with_base(api_key: Option<String>, api_base: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .user_agent(concat!("chatguard/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key,
            api_base,
            timeout,
        }
    }

    pub async fn check(&self, url: &str) -> VirusTotalResult {
        let key = match &self.api_key {
            Some(k) if !k.is_empty() => k.clone(),
            _ => return VirusTotalResult::disabled(),
        };

        // Submit and fetch are each time-boxed inside lookup; the outer
        // guard bounds the whole exchange
        super::guarded(
            "VirusTotal",
            self.timeout * 2,
            VirusTotalResult::not_listed(),
            self.lookup(url, &key),
        )
        .await
    }

    /// URL identifier for the /urls/{id} endpoint: base64url without padding.
    pub fn url_id(url: &str) -> String {
        URL_SAFE_NO_PAD.encode(url.as_bytes())
    }

    async fn lookup(&self, url: &str, key: &str) -> Result<VirusTotalResult> {
        // Submission refreshes the analysis; tolerate it failing or timing
        // out as long as the fetch below can still proceed.
        let submit = tokio::time::timeout(
            self.timeout,
            self.client
                .post(format!("{}/urls", self.api_base))
                .header("x-apikey", key)
                .form(&[("url", url)])
                .send(),
        )
        .await;
        match submit {
            Ok(Err(e)) => log::debug!("VirusTotal submit failed, continuing to fetch: {e}"),
            Err(_) => log::debug!("VirusTotal submit timed out, continuing to fetch"),
            Ok(Ok(_)) => {}
        }

        let response = tokio::time::timeout(
            self.timeout,
            self.client
                .get(format!("{}/urls/{}", self.api_base, Self::url_id(url)))
                .header("x-apikey", key)
                .send(),
        )
        .await
        .map_err(|_| anyhow::anyhow!("VirusTotal fetch timed out"))??;

        if !response.status().is_success() {
            return Ok(VirusTotalResult::not_listed());
        }

        let body: Value = response.json().await?;
        let attributes = &body["data"]["attributes"];

        let stats = &attributes["last_analysis_stats"];
        let detections = stats["malicious"].as_u64().unwrap_or(0) as u32
            + stats["suspicious"].as_u64().unwrap_or(0) as u32;

        // The category field maps engine name to label; distinct labels only
        let mut categories = Vec::new();
        if let Some(map) = attributes["categories"].as_object() {
            for label in map.values().filter_map(Value::as_str) {
                if !categories.iter().any(|c| c == label) {
                    categories.push(label.to_string());
                }
            }
        }

        Ok(VirusTotalResult {
            enabled: true,
            listed: detections > 0,
            detections,
            categories,
            raw: Some(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_id_is_base64url_without_padding() {
        let id = VirusTotalClient::url_id("http://example.com/");
        assert!(!id.contains('='));
        assert!(!id.contains('+'));
        assert!(!id.contains('/'));
        assert_eq!(id, "aHR0cDovL2V4YW1wbGUuY29tLw");
    }

    #[tokio::test]
    async fn test_check_without_key_is_disabled() {
        let client = VirusTotalClient::new(None, Duration::from_millis(100));
        let result = client.check("http://example.com/").await;
        assert!(!result.enabled);
        assert!(!result.listed);
    }
}
