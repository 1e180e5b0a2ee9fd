use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Stock,
    Crypto,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Stock => "stock",
            AssetKind::Crypto => "crypto",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAsset {
    pub symbol: String,
    pub name: String,
    pub exchange: String,
    pub market_cap: Option<f64>,
    pub tradable: bool,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoAsset {
    pub symbol: String,
    pub name: String,
    pub market_cap: Option<f64>,
    pub volume_24h: Option<f64>,
    pub change_24h: Option<f64>,
    pub description: String,
}

/// A symbol resolved against reference data. Only resolved symbols are ranked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetRecord {
    Stock(StockAsset),
    Crypto(CryptoAsset),
}

impl AssetRecord {
    pub fn kind(&self) -> AssetKind {
        match self {
            AssetRecord::Stock(_) => AssetKind::Stock,
            AssetRecord::Crypto(_) => AssetKind::Crypto,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            AssetRecord::Stock(s) => &s.symbol,
            AssetRecord::Crypto(c) => &c.symbol,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            AssetRecord::Stock(s) => &s.name,
            AssetRecord::Crypto(c) => &c.name,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            AssetRecord::Stock(s) => &s.description,
            AssetRecord::Crypto(c) => &c.description,
        }
    }

    pub fn market_cap(&self) -> Option<f64> {
        match self {
            AssetRecord::Stock(s) => s.market_cap,
            AssetRecord::Crypto(c) => c.market_cap,
        }
    }

    pub fn change_24h(&self) -> Option<f64> {
        match self {
            AssetRecord::Stock(_) => None,
            AssetRecord::Crypto(c) => c.change_24h,
        }
    }

    /// 24h volume over market cap. Stocks carry no liquidity metric.
    pub fn liquidity_ratio(&self) -> Option<f64> {
        let AssetRecord::Crypto(c) = self else {
            return None;
        };
        let volume = c.volume_24h?;
        let cap = c.market_cap.filter(|cap| *cap > 0.0)?;
        Some(volume / cap)
    }
}
