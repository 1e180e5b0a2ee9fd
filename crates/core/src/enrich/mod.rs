//! Resolving symbols to asset records.
//!
//! Equities are tried first (listing, cap band, optional options-chain check), then the crypto
//! universe. A symbol that resolves under neither path is dropped from ranking; provider failures
//! count as "unresolved" for that symbol and never abort the cycle.

pub mod crypto;
pub mod equity;
pub mod error;
mod http;

use crate::domain::asset::{AssetRecord, CryptoAsset, StockAsset};
use crate::ranking::CapBand;
use error::{LookupError, Unresolved};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityProfile {
    pub exchange: String,
    pub market_cap: Option<f64>,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoQuote {
    pub symbol: String,
    pub name: String,
    pub market_cap: Option<f64>,
    pub market_cap_rank: Option<u32>,
    pub volume_24h: Option<f64>,
    pub change_24h: Option<f64>,
}

#[async_trait::async_trait]
pub trait EquityResolver: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn resolve_equity(&self, symbol: &str) -> Result<EquityProfile, LookupError>;

    /// Whether the symbol has a listed options chain.
    async fn is_tradable(&self, symbol: &str) -> Result<bool, LookupError>;
}

#[async_trait::async_trait]
pub trait CryptoReference: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn lookup_crypto(&self, symbol: &str) -> Result<CryptoQuote, LookupError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPolicy {
    pub exchanges: Vec<String>,
    pub cap_band: CapBand,
    pub require_tradable: bool,
}

impl Default for EquityPolicy {
    fn default() -> Self {
        Self {
            exchanges: vec!["NASDAQ".to_string(), "NYSE".to_string(), "AMEX".to_string()],
            cap_band: CapBand {
                min: 5_000_000.0,
                max: 10_000_000_000.0,
            },
            require_tradable: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CryptoPolicy {
    pub min_market_cap: f64,
    pub min_volume_24h: f64,
}

pub struct Classifier {
    equity: Arc<dyn EquityResolver>,
    crypto: Arc<dyn CryptoReference>,
    equity_policy: EquityPolicy,
    crypto_policy: CryptoPolicy,
}

impl Classifier {
    pub fn new(equity: Arc<dyn EquityResolver>, crypto: Arc<dyn CryptoReference>) -> Self {
        Self {
            equity,
            crypto,
            equity_policy: EquityPolicy::default(),
            crypto_policy: CryptoPolicy::default(),
        }
    }

    pub fn with_equity_policy(mut self, policy: EquityPolicy) -> Self {
        self.equity_policy = policy;
        self
    }

    pub fn with_crypto_policy(mut self, policy: CryptoPolicy) -> Self {
        self.crypto_policy = policy;
        self
    }

    pub async fn resolve(&self, symbol: &str) -> Result<AssetRecord, Unresolved> {
        let equity = match self.resolve_stock(symbol).await {
            Ok(stock) => return Ok(AssetRecord::Stock(stock)),
            Err(err) => err,
        };
        match self.resolve_coin(symbol).await {
            Ok(coin) => Ok(AssetRecord::Crypto(coin)),
            Err(crypto) => Err(Unresolved { equity, crypto }),
        }
    }

    /// Resolve many symbols with at most `concurrency` lookups in flight.
    /// Unresolved symbols are absent from the result.
    pub async fn resolve_all(
        &self,
        symbols: Vec<String>,
        concurrency: usize,
    ) -> BTreeMap<String, AssetRecord> {
        let results: Vec<(String, Result<AssetRecord, Unresolved>)> =
            stream::iter(symbols.into_iter().map(|symbol| async move {
                let res = self.resolve(&symbol).await;
                (symbol, res)
            }))
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut out = BTreeMap::new();
        for (symbol, res) in results {
            match res {
                Ok(asset) => {
                    out.insert(symbol, asset);
                }
                Err(unresolved) => {
                    if unresolved.equity.is_provider_failure() || unresolved.crypto.is_provider_failure() {
                        tracing::debug!(
                            symbol = %symbol,
                            equity_provider = self.equity.provider_name(),
                            crypto_provider = self.crypto.provider_name(),
                            error = %unresolved,
                            "reference lookup failed; symbol unresolved this cycle"
                        );
                    } else {
                        tracing::debug!(symbol = %symbol, reason = %unresolved, "symbol unresolved");
                    }
                }
            }
        }
        out
    }

    async fn resolve_stock(&self, symbol: &str) -> Result<StockAsset, LookupError> {
        let policy = &self.equity_policy;
        let profile = self.equity.resolve_equity(symbol).await?;

        if !policy.exchanges.iter().any(|e| e.eq_ignore_ascii_case(&profile.exchange)) {
            return Err(LookupError::Filtered(format!("exchange {:?}", profile.exchange)));
        }

        let cap = profile
            .market_cap
            .ok_or_else(|| LookupError::Filtered("no market cap".to_string()))?;
        if !policy.cap_band.contains(cap) {
            return Err(LookupError::Filtered(format!("market cap {cap} outside band")));
        }

        let tradable = if policy.require_tradable {
            if !self.equity.is_tradable(symbol).await? {
                return Err(LookupError::Filtered("no options chain".to_string()));
            }
            true
        } else {
            false
        };

        Ok(StockAsset {
            symbol: symbol.to_string(),
            name: profile.name,
            exchange: profile.exchange,
            market_cap: Some(cap),
            tradable,
            description: profile.description,
        })
    }

    async fn resolve_coin(&self, symbol: &str) -> Result<CryptoAsset, LookupError> {
        let policy = &self.crypto_policy;
        let quote = self.crypto.lookup_crypto(symbol).await?;

        if quote.market_cap.unwrap_or(0.0) < policy.min_market_cap {
            return Err(LookupError::Filtered("market cap below minimum".to_string()));
        }
        if quote.volume_24h.unwrap_or(0.0) < policy.min_volume_24h {
            return Err(LookupError::Filtered("24h volume below minimum".to_string()));
        }

        let description = match quote.market_cap_rank {
            Some(rank) => format!("{} ({}), #{rank} by market cap", quote.name, quote.symbol),
            None => format!("{} ({})", quote.name, quote.symbol),
        };

        Ok(CryptoAsset {
            symbol: symbol.to_string(),
            name: quote.name,
            market_cap: quote.market_cap,
            volume_24h: quote.volume_24h,
            change_24h: quote.change_24h,
            description,
        })
    }
}
