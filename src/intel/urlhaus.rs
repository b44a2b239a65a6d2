use anyhow::Result;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Outcome of a URLHaus lookup. `listed == false` covers "not in the list"
/// as well as every failure mode.
#[derive(Debug, Clone)]
pub struct UrlhausResult {
    pub listed: bool,
    pub status: Option<String>,
    pub raw: Option<Value>,
}

impl UrlhausResult {
    pub fn not_listed() -> Self {
        Self {
            listed: false,
            status: None,
            raw: None,
        }
    }
}

/// Free reputation-list lookup, no API key required.
pub struct UrlhausClient {
    client: Client,
    api_url: String,
    timeout: Duration,
}

impl UrlhausClient {
    pub fn new(api_url: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .user_agent(concat!("chatguard/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_url,
            timeout,
        }
    }

    pub async fn check(&self, url: &str) -> UrlhausResult {
        super::guarded(
            "URLHaus",
            self.timeout,
            UrlhausResult::not_listed(),
            self.query(url),
        )
        .await
    }

    async fn query(&self, url: &str) -> Result<UrlhausResult> {
        let response = self
            .client
            .post(&self.api_url)
            .form(&[("url", url)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(UrlhausResult::not_listed());
        }

        let data: Value = response.json().await?;
        if data.get("query_status").and_then(Value::as_str) == Some("ok") {
            let status = data
                .get("url_status")
                .and_then(Value::as_str)
                .map(str::to_string);
            return Ok(UrlhausResult {
                listed: true,
                status,
                raw: Some(data),
            });
        }

        Ok(UrlhausResult::not_listed())
    }
}
