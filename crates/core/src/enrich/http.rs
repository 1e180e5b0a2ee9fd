use crate::enrich::error::LookupError;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 12;
const DEFAULT_ATTEMPTS: u32 = 2;
const MAX_ERROR_BODY: usize = 200;

pub(crate) fn build_client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    use anyhow::Context;

    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("tickerbuzz/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build reference data http client")
}

pub(crate) fn timeout_from_env() -> u64 {
    std::env::var("LOOKUP_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_TIMEOUT_SECS)
}

/// GET a JSON document, retrying once on transport errors, 429 and 5xx.
pub(crate) async fn get_json(
    http: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<Value, LookupError> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;

        let res = match http.get(url).query(query).send().await {
            Ok(r) => r,
            Err(err) => {
                if attempt >= DEFAULT_ATTEMPTS {
                    return Err(err.into());
                }
                backoff(attempt, url, &err.without_url().to_string()).await;
                continue;
            }
        };

        let status = res.status();
        let text = res.text().await?;

        if !status.is_success() {
            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < DEFAULT_ATTEMPTS {
                backoff(attempt, url, status.as_str()).await;
                continue;
            }
            return Err(LookupError::Api {
                status: status.as_u16(),
                message: truncate_chars(&text, MAX_ERROR_BODY),
            });
        }

        return Ok(serde_json::from_str::<Value>(&text)?);
    }
}

async fn backoff(attempt: u32, url: &str, reason: &str) {
    let wait = Duration::from_secs(1 << (attempt - 1));
    tracing::debug!(attempt, ?wait, url, reason, "reference lookup failed; retrying");
    tokio::time::sleep(wait).await;
}

pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
