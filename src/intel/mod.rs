pub mod urlhaus;
pub mod virustotal;

use std::future::Future;
use std::time::Duration;

/// Single enforcement point for the fail-open contract on reputation
/// lookups: every error or timeout resolves to the service's neutral result
/// so a flaky dependency can never break moderation.
pub(crate) async fn guarded<T, F>(service: &str, limit: Duration, neutral: T, lookup: F) -> T
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(limit, lookup).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            log::debug!("{service} lookup failed, treating as no signal: {e:#}");
            neutral
        }
        Err(_) => {
            log::debug!("{service} lookup timed out after {limit:?}, treating as no signal");
            neutral
        }
    }
}
