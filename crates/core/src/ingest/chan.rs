use crate::extract::text::strip_html;
use crate::ingest::types::{RawText, RawTextSource};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://a.4cdn.org";
const DEFAULT_TIMEOUT_SECS: u64 = 12;
const THREAD_LIMIT: usize = 12;
const LAST_REPLIES: usize = 30;
// The board API asks clients to stay around one request per second.
const REQ_DELAY_MS: u64 = 1_000;

/// Catalog + recent replies of one imageboard board.
#[derive(Debug, Clone)]
pub struct ChanCatalogSource {
    http: reqwest::Client,
    base_url: String,
    board: String,
    source_id: String,
    thread_limit: usize,
    last_replies: usize,
    req_delay: Duration,
}

impl ChanCatalogSource {
    pub fn new(board: &str) -> Result<Self> {
        let base_url =
            std::env::var("CHAN_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let thread_limit = std::env::var("CHAN_THREAD_LIMIT")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(THREAD_LIMIT);
        let req_delay_ms = std::env::var("CHAN_REQ_DELAY_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(REQ_DELAY_MS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build chan http client")?;

        Ok(Self {
            http,
            base_url,
            board: board.to_string(),
            source_id: format!("chan/{board}"),
            thread_limit,
            last_replies: LAST_REPLIES,
            req_delay: Duration::from_millis(req_delay_ms),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{path}", self.base_url.trim_end_matches('/'), self.board)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let res = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("chan request failed: {url}"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .with_context(|| format!("failed to read chan response: {url}"))?;
        if !status.is_success() {
            anyhow::bail!("chan HTTP {status}: {url}");
        }

        serde_json::from_str::<T>(&text).with_context(|| format!("unexpected chan payload: {url}"))
    }
}

#[async_trait::async_trait]
impl RawTextSource for ChanCatalogSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    async fn fetch_cycle(&self) -> Result<Vec<RawText>> {
        let catalog: Vec<CatalogPage> = self.get("catalog.json").await?;
        let mut out = catalog_texts(&catalog, &self.source_id);

        let threads: Vec<u64> = catalog
            .iter()
            .flat_map(|p| p.threads.iter().map(|t| t.no))
            .take(self.thread_limit)
            .collect();

        let mut failures: usize = 0;
        for no in threads {
            tokio::time::sleep(self.req_delay).await;

            match self.get::<ThreadPage>(&format!("thread/{no}.json")).await {
                Ok(thread) => out.extend(reply_texts(&thread, self.last_replies, &self.source_id)),
                Err(err) => {
                    failures += 1;
                    tracing::warn!(
                        board = %self.board,
                        thread = no,
                        failure_count = failures,
                        error = %err,
                        "thread fetch failed; skipping"
                    );
                }
            }
        }

        Ok(out)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogPage {
    #[serde(default)]
    threads: Vec<Post>,
}

#[derive(Debug, Clone, Deserialize)]
struct ThreadPage {
    #[serde(default)]
    posts: Vec<Post>,
}

#[derive(Debug, Clone, Deserialize)]
struct Post {
    #[serde(default)]
    no: u64,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    com: Option<String>,
}

impl Post {
    fn text(&self) -> String {
        let sub = self.sub.as_deref().unwrap_or_default();
        let com = self.com.as_deref().unwrap_or_default();
        strip_html(&format!("{sub} {com}"))
    }
}

fn catalog_texts(pages: &[CatalogPage], source_id: &str) -> Vec<RawText> {
    pages
        .iter()
        .flat_map(|p| p.threads.iter())
        .map(|t| RawText {
            source_id: source_id.to_string(),
            text: t.text(),
        })
        .filter(|r| !r.text.is_empty())
        .collect()
}

// Replies only: the opening post is already covered by the catalog.
fn reply_texts(thread: &ThreadPage, last: usize, source_id: &str) -> Vec<RawText> {
    let replies = thread.posts.get(1..).unwrap_or_default();
    let start = replies.len().saturating_sub(last);
    replies[start..]
        .iter()
        .map(|p| RawText {
            source_id: source_id.to_string(),
            text: p.text(),
        })
        .filter(|r| !r.text.is_empty())
        .collect()
}
