use crate::domain::asset::{AssetKind, AssetRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Per-symbol values derived from the current count and the stored history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub current: u32,
    pub previous: u32,
    pub delta: i64,
    pub momentum: f64,
    pub is_new: bool,
    pub is_spiking: bool,
}

/// One named ranking strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Elite,
    Asymmetric,
    PreBreakout,
    Degen,
}

impl View {
    pub const ALL: [View; 4] = [View::Elite, View::Asymmetric, View::PreBreakout, View::Degen];

    pub fn as_str(&self) -> &'static str {
        match self {
            View::Elite => "elite",
            View::Asymmetric => "asymmetric",
            View::PreBreakout => "pre_breakout",
            View::Degen => "degen",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for View {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        View::ALL
            .into_iter()
            .find(|v| v.as_str() == normalized)
            .ok_or_else(|| anyhow::anyhow!("unknown view: {s}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub symbol: String,
    pub asset: AssetRecord,
    pub features: FeatureRecord,
    /// Number of independent sources that mentioned the symbol this cycle.
    pub sources: usize,
    pub score: f64,
}

impl RankedCandidate {
    pub fn kind(&self) -> AssetKind {
        self.asset.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_view_names() {
        assert_eq!("elite".parse::<View>().unwrap(), View::Elite);
        assert_eq!("pre-breakout".parse::<View>().unwrap(), View::PreBreakout);
        assert_eq!(" DEGEN ".parse::<View>().unwrap(), View::Degen);
        assert!("moonshot".parse::<View>().is_err());
    }
}
