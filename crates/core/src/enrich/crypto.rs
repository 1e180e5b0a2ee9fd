use crate::config::Settings;
use crate::enrich::error::LookupError;
use crate::enrich::http;
use crate::enrich::{CryptoQuote, CryptoReference};
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

const DEFAULT_BASE_URL: &str = "https://api.coingecko.com";
const DEFAULT_TOP_N: usize = 250;
const PER_PAGE_MAX: usize = 250;
const REFRESH_HOURS: i64 = 24;
const RETRY_AFTER_MINUTES: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinMarket {
    #[serde(default)]
    pub id: String,
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub total_volume: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
}

/// Serialized form of the universe, mirrored to disk as a fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UniverseFile {
    #[serde(with = "chrono::serde::ts_seconds")]
    fetched_at: DateTime<Utc>,
    coins: Vec<CoinMarket>,
}

#[derive(Debug, Clone)]
struct Universe {
    fetched_at: DateTime<Utc>,
    by_symbol: HashMap<String, CoinMarket>,
}

impl Universe {
    fn build(fetched_at: DateTime<Utc>, coins: Vec<CoinMarket>) -> Self {
        // Coins arrive largest cap first; on symbol collisions the larger coin wins.
        let mut by_symbol = HashMap::with_capacity(coins.len());
        for coin in coins {
            let key = coin.symbol.trim().to_ascii_uppercase();
            if key.is_empty() {
                continue;
            }
            by_symbol.entry(key).or_insert(coin);
        }
        Self {
            fetched_at,
            by_symbol,
        }
    }

    fn is_fresh(&self, now: DateTime<Utc>, refresh_every: Duration) -> bool {
        now - self.fetched_at < refresh_every
    }
}

#[derive(Debug, Default)]
struct Cache {
    universe: Option<Universe>,
    /// Last failed refresh. No new attempt is made until `retry_after` has passed.
    failed_at: Option<DateTime<Utc>>,
}

impl Cache {
    fn needs_refresh(&self, now: DateTime<Utc>, refresh_every: Duration, retry_after: Duration) -> bool {
        if self
            .universe
            .as_ref()
            .is_some_and(|u| u.is_fresh(now, refresh_every))
        {
            return false;
        }
        !self.failed_at.is_some_and(|at| now - at < retry_after)
    }
}

/// Top-N coins by market cap, refreshed daily. A failed refresh keeps serving the last good
/// universe (in memory, else from the on-disk mirror).
#[derive(Debug)]
pub struct CoinGeckoUniverse {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    top_n: usize,
    refresh_every: Duration,
    retry_after: Duration,
    cache_path: Option<PathBuf>,
    cache: tokio::sync::RwLock<Cache>,
}

impl CoinGeckoUniverse {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let base_url =
            std::env::var("COINGECKO_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let top_n = std::env::var("CRYPTO_TOP_N")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| *n >= 1)
            .unwrap_or(DEFAULT_TOP_N);
        let retry_minutes = std::env::var("CRYPTO_RETRY_MINUTES")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|m| *m >= 1)
            .unwrap_or(RETRY_AFTER_MINUTES);

        Ok(Self {
            http: http::build_client(http::timeout_from_env())?,
            base_url,
            api_key: settings.coingecko_api_key.clone(),
            top_n,
            refresh_every: Duration::hours(REFRESH_HOURS),
            retry_after: Duration::minutes(retry_minutes),
            cache_path: settings.crypto_cache_path.clone().map(PathBuf::from),
            cache: tokio::sync::RwLock::new(Cache::default()),
        })
    }

    /// A universe seeded from already-fetched markets. Used by tests and offline runs.
    pub fn from_markets(coins: Vec<CoinMarket>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            top_n: DEFAULT_TOP_N,
            refresh_every: Duration::hours(REFRESH_HOURS),
            retry_after: Duration::minutes(RETRY_AFTER_MINUTES),
            cache_path: None,
            cache: tokio::sync::RwLock::new(Cache {
                universe: Some(Universe::build(fetched_at, coins)),
                failed_at: None,
            }),
        }
    }

    pub async fn lookup_at(&self, symbol: &str, now: DateTime<Utc>) -> Result<CryptoQuote, LookupError> {
        self.ensure_fresh(now).await;

        let guard = self.cache.read().await;
        let universe = guard
            .universe
            .as_ref()
            .ok_or_else(|| LookupError::Network("crypto universe unavailable".to_string()))?;
        let coin = universe
            .by_symbol
            .get(&symbol.to_ascii_uppercase())
            .ok_or(LookupError::NotFound)?;

        Ok(CryptoQuote {
            symbol: symbol.to_ascii_uppercase(),
            name: if coin.name.trim().is_empty() {
                symbol.to_ascii_uppercase()
            } else {
                coin.name.trim().to_string()
            },
            market_cap: coin.market_cap.filter(|c| *c > 0.0),
            market_cap_rank: coin.market_cap_rank,
            volume_24h: coin.total_volume,
            change_24h: coin.price_change_percentage_24h,
        })
    }

    async fn ensure_fresh(&self, now: DateTime<Utc>) {
        if !self
            .cache
            .read()
            .await
            .needs_refresh(now, self.refresh_every, self.retry_after)
        {
            return;
        }

        let mut guard = self.cache.write().await;
        // Another lookup may have refreshed (or failed to) while we waited for the write lock.
        if !guard.needs_refresh(now, self.refresh_every, self.retry_after) {
            return;
        }

        let err = match self.fetch_markets().await {
            Ok(coins) => {
                tracing::info!(coins = coins.len(), "crypto universe refreshed");
                if let Err(err) = self.write_mirror(now, &coins).await {
                    tracing::warn!(error = %err, "failed to mirror crypto universe to disk");
                }
                guard.universe = Some(Universe::build(now, coins));
                guard.failed_at = None;
                return;
            }
            Err(err) => err,
        };

        guard.failed_at = Some(now);
        let retry_at = now + self.retry_after;
        if guard.universe.is_some() {
            tracing::warn!(error = %err, %retry_at, "crypto universe refresh failed; keeping last good copy");
            return;
        }
        match self.read_mirror().await {
            Ok(Some(file)) => {
                tracing::warn!(
                    error = %err,
                    fetched_at = %file.fetched_at,
                    %retry_at,
                    "crypto universe refresh failed; using on-disk copy"
                );
                guard.universe = Some(Universe::build(file.fetched_at, file.coins));
            }
            Ok(None) => {
                tracing::warn!(error = %err, %retry_at, "crypto universe refresh failed and no cached copy exists");
            }
            Err(mirror_err) => {
                tracing::warn!(
                    error = %err,
                    mirror_error = %mirror_err,
                    %retry_at,
                    "crypto universe refresh failed and cached copy is unreadable"
                );
            }
        }
    }

    async fn fetch_markets(&self) -> Result<Vec<CoinMarket>, LookupError> {
        let url = format!(
            "{}/api/v3/coins/markets",
            self.base_url.trim_end_matches('/')
        );
        let pages = self.top_n.div_ceil(PER_PAGE_MAX);
        let mut out = Vec::with_capacity(self.top_n);

        for page in 1..=pages {
            let mut query = vec![
                ("vs_currency", "usd".to_string()),
                ("order", "market_cap_desc".to_string()),
                ("per_page", PER_PAGE_MAX.min(self.top_n).to_string()),
                ("page", page.to_string()),
            ];
            if let Some(key) = &self.api_key {
                query.push(("x_cg_demo_api_key", key.clone()));
            }

            let body = http::get_json(&self.http, &url, &query).await?;
            let coins: Vec<CoinMarket> = serde_json::from_value(body)?;
            let exhausted = coins.is_empty();
            out.extend(coins);
            if exhausted {
                break;
            }
        }

        out.truncate(self.top_n);
        if out.is_empty() {
            return Err(LookupError::Parse("empty coin market list".to_string()));
        }
        Ok(out)
    }

    async fn write_mirror(&self, fetched_at: DateTime<Utc>, coins: &[CoinMarket]) -> anyhow::Result<()> {
        let Some(path) = &self.cache_path else {
            return Ok(());
        };
        let file = UniverseFile {
            fetched_at,
            coins: coins.to_vec(),
        };
        let bytes = serde_json::to_vec(&file).context("serialize crypto universe failed")?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes)
            .await
            .with_context(|| format!("write {} failed", path.display()))?;
        Ok(())
    }

    async fn read_mirror(&self) -> anyhow::Result<Option<UniverseFile>> {
        let Some(path) = &self.cache_path else {
            return Ok(None);
        };
        let text = match tokio::fs::read_to_string(path).await {
            Ok(t) => t,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err).with_context(|| format!("read {} failed", path.display())),
        };
        let file = serde_json::from_str::<UniverseFile>(&text)
            .with_context(|| format!("{} is not a crypto universe file", path.display()))?;
        Ok(Some(file))
    }
}

#[async_trait::async_trait]
impl CryptoReference for CoinGeckoUniverse {
    fn provider_name(&self) -> &'static str {
        "coingecko"
    }

    async fn lookup_crypto(&self, symbol: &str) -> Result<CryptoQuote, LookupError> {
        self.lookup_at(symbol, Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::{Read, Write};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn coin(symbol: &str, name: &str, cap: f64, rank: u32) -> CoinMarket {
        CoinMarket {
            id: name.to_ascii_lowercase(),
            symbol: symbol.to_string(),
            name: name.to_string(),
            market_cap: Some(cap),
            market_cap_rank: Some(rank),
            total_volume: Some(cap / 10.0),
            price_change_percentage_24h: Some(-1.5),
        }
    }

    #[test]
    fn parses_market_rows() {
        let rows = json!([{
            "id": "pepe",
            "symbol": "pepe",
            "name": "Pepe",
            "market_cap": 4_000_000_000.0,
            "market_cap_rank": 30,
            "total_volume": 900_000_000.0,
            "price_change_percentage_24h": 8.2,
            "current_price": 0.00001
        }]);
        let coins: Vec<CoinMarket> = serde_json::from_value(rows).unwrap();
        assert_eq!(coins[0].symbol, "pepe");
        assert_eq!(coins[0].market_cap_rank, Some(30));
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive_and_prefers_larger_cap() {
        let universe = CoinGeckoUniverse::from_markets(
            vec![
                coin("eth", "Ethereum", 400_000_000_000.0, 2),
                coin("pepe", "Pepe", 4_000_000_000.0, 30),
                coin("eth", "Ether Clone", 1_000_000.0, 900),
            ],
            Utc::now(),
        );

        let eth = universe.lookup_crypto("ETH").await.unwrap();
        assert_eq!(eth.name, "Ethereum");
        assert_eq!(eth.market_cap_rank, Some(2));

        let pepe = universe.lookup_crypto("pepe").await.unwrap();
        assert_eq!(pepe.symbol, "PEPE");
        assert_eq!(pepe.change_24h, Some(-1.5));
    }

    #[tokio::test]
    async fn unknown_symbol_is_not_found() {
        let universe = CoinGeckoUniverse::from_markets(vec![coin("btc", "Bitcoin", 1.0e12, 1)], Utc::now());
        assert!(matches!(universe.lookup_crypto("GME").await, Err(LookupError::NotFound)));
    }

    #[test]
    fn freshness_window() {
        let now = Utc::now();
        let u = Universe::build(now - Duration::hours(23), Vec::new());
        assert!(u.is_fresh(now, Duration::hours(24)));
        let u = Universe::build(now - Duration::hours(25), Vec::new());
        assert!(!u.is_fresh(now, Duration::hours(24)));
    }

    /// Serves HTTP 500 to every request and counts them.
    fn failing_endpoint() -> (String, Arc<AtomicUsize>) {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf);
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = stream.write_all(
                    b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                );
            }
        });
        (format!("http://{addr}"), hits)
    }

    #[tokio::test]
    async fn failed_refresh_serves_last_good_copy_and_backs_off() {
        let (base_url, hits) = failing_endpoint();
        let mut universe = CoinGeckoUniverse::from_markets(
            vec![coin("btc", "Bitcoin", 1.0e12, 1)],
            Utc::now() - Duration::days(2),
        );
        universe.base_url = base_url;

        let btc = universe.lookup_crypto("BTC").await.unwrap();
        assert_eq!(btc.name, "Bitcoin");
        let after_first = hits.load(Ordering::SeqCst);
        assert!(after_first >= 1);

        for symbol in ["AAA", "BBB", "CCC", "DDD"] {
            assert!(matches!(universe.lookup_crypto(symbol).await, Err(LookupError::NotFound)));
        }
        assert!(universe.lookup_crypto("BTC").await.is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), after_first);
    }

    #[test]
    fn refresh_is_retried_after_backoff() {
        let now = Utc::now();
        let cache = Cache {
            universe: Some(Universe::build(now - Duration::days(2), Vec::new())),
            failed_at: Some(now - Duration::minutes(10)),
        };
        assert!(!cache.needs_refresh(now, Duration::hours(24), Duration::minutes(30)));
        assert!(cache.needs_refresh(now + Duration::minutes(25), Duration::hours(24), Duration::minutes(30)));

        let empty = Cache::default();
        assert!(empty.needs_refresh(now, Duration::hours(24), Duration::minutes(30)));
    }

    #[tokio::test]
    async fn api_key_stays_out_of_errors() {
        let mut universe = CoinGeckoUniverse::from_markets(Vec::new(), Utc::now());
        universe.base_url = "http://127.0.0.1:1".to_string();
        universe.api_key = Some("CGSECRETKEY".to_string());

        let err = universe.fetch_markets().await.unwrap_err();
        assert!(matches!(err, LookupError::Network(_)));
        assert!(!err.to_string().contains("CGSECRETKEY"));
    }

    #[tokio::test]
    async fn reads_mirror_file() {
        let dir = std::env::temp_dir().join(format!("tickerbuzz-{}", uuid::Uuid::new_v4()));
        let path = dir.join("coins.json");

        let mut universe = CoinGeckoUniverse::from_markets(Vec::new(), Utc::now());
        universe.cache_path = Some(path.clone());
        let fetched_at = Utc::now() - Duration::days(3);
        universe
            .write_mirror(fetched_at, &[coin("sol", "Solana", 8.0e10, 5)])
            .await
            .unwrap();

        let file = universe.read_mirror().await.unwrap().unwrap();
        assert_eq!(file.coins.len(), 1);
        assert_eq!(file.fetched_at.timestamp(), fetched_at.timestamp());

        let _ = std::fs::remove_dir_all(dir);
    }
}
