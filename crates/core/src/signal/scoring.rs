//! Heuristic scores shared by every view.
//!
//! Views differ only in their [`ScoreWeights`]:
//! ```text
//! base  = count·current + delta·Δ + momentum·m + novelty·[is_new] + spike·[is_spiking]
//!       + meme·hits + liquidity·(volume/cap)          (crypto only)
//! score = max(base, 0) × small_cap_boost(cap) × cross_source_bonus
//! ```

use crate::domain::asset::AssetRecord;
use crate::domain::candidate::FeatureRecord;
use serde::{Deserialize, Serialize};

// Substrings that mark a coin as meme-flavoured. Matched against symbol and display name.
const MEME_KEYWORDS: &[&str] = &[
    "DOGE", "SHIB", "PEPE", "INU", "MOON", "ELON", "FROG", "CAT", "WIF", "BONK", "FLOKI",
    "WOJAK", "MEME", "BABY", "SAFE", "APE",
];

/// Capped power-law multiplier `min((reference_cap / cap)^exponent, max_multiplier)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmallCapBoost {
    pub reference_cap: f64,
    pub exponent: f64,
    pub max_multiplier: f64,
}

impl SmallCapBoost {
    pub const NEUTRAL: SmallCapBoost = SmallCapBoost {
        reference_cap: 1.0,
        exponent: 0.0,
        max_multiplier: 1.0,
    };

    pub fn factor(&self, market_cap: Option<f64>) -> f64 {
        let Some(cap) = market_cap.filter(|c| c.is_finite() && *c > 0.0) else {
            return 1.0;
        };
        let raw = (self.reference_cap / cap).powf(self.exponent);
        if !raw.is_finite() {
            return self.max_multiplier;
        }
        raw.min(self.max_multiplier)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub count: f64,
    pub delta: f64,
    pub momentum: f64,
    pub novelty: f64,
    pub spike: f64,
    /// Multiplier applied when two or more independent sources mention the symbol.
    pub cross_source_bonus: Option<f64>,
    /// Additive weight per meme keyword hit (crypto only).
    pub meme: f64,
    /// Additive weight on volume/market-cap (crypto only).
    pub liquidity: f64,
    pub small_cap: SmallCapBoost,
}

impl ScoreWeights {
    pub fn score(&self, features: &FeatureRecord, asset: &AssetRecord, sources: usize) -> f64 {
        let mut base = self.count * f64::from(features.current)
            + self.delta * features.delta as f64
            + self.momentum * features.momentum;

        if features.is_new {
            base += self.novelty;
        }
        if features.is_spiking {
            base += self.spike;
        }

        if let AssetRecord::Crypto(_) = asset {
            if self.meme != 0.0 {
                base += self.meme * meme_hits(asset) as f64;
            }
            if self.liquidity != 0.0 {
                base += self.liquidity * asset.liquidity_ratio().unwrap_or(0.0);
            }
        }

        let mut score = base.max(0.0) * self.small_cap.factor(asset.market_cap());
        if let Some(bonus) = self.cross_source_bonus {
            if sources >= 2 {
                score *= bonus;
            }
        }
        score
    }
}

pub fn meme_hits(asset: &AssetRecord) -> usize {
    let symbol = asset.symbol().to_ascii_uppercase();
    let name = asset.display_name().to_ascii_uppercase();
    MEME_KEYWORDS
        .iter()
        .filter(|kw| symbol.contains(*kw) || name.contains(*kw))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::asset::{CryptoAsset, StockAsset};

    fn stock(cap: Option<f64>) -> AssetRecord {
        AssetRecord::Stock(StockAsset {
            symbol: "NANO".to_string(),
            name: "Nano Corp".to_string(),
            exchange: "NASDAQ".to_string(),
            market_cap: cap,
            tradable: true,
            description: String::new(),
        })
    }

    fn coin(symbol: &str, name: &str, cap: f64, volume: f64) -> AssetRecord {
        AssetRecord::Crypto(CryptoAsset {
            symbol: symbol.to_string(),
            name: name.to_string(),
            market_cap: Some(cap),
            volume_24h: Some(volume),
            change_24h: None,
            description: String::new(),
        })
    }

    fn features(current: u32, delta: i64, momentum: f64) -> FeatureRecord {
        FeatureRecord {
            current,
            previous: (i64::from(current) - delta).max(0) as u32,
            delta,
            momentum,
            is_new: false,
            is_spiking: false,
        }
    }

    fn weights() -> ScoreWeights {
        ScoreWeights {
            count: 1.0,
            delta: 1.0,
            momentum: 1.0,
            novelty: 2.0,
            spike: 3.0,
            cross_source_bonus: Some(1.5),
            meme: 0.0,
            liquidity: 0.0,
            small_cap: SmallCapBoost::NEUTRAL,
        }
    }

    #[test]
    fn small_cap_boost_is_capped() {
        let boost = SmallCapBoost {
            reference_cap: 25_000_000.0,
            exponent: 1.0,
            max_multiplier: 5.0,
        };
        assert!((boost.factor(Some(25_000_000.0)) - 1.0).abs() < 1e-9);
        assert!((boost.factor(Some(12_500_000.0)) - 2.0).abs() < 1e-9);
        assert_eq!(boost.factor(Some(1.0)), 5.0);
        assert!(boost.factor(Some(50_000_000.0)) < 1.0);
        assert_eq!(boost.factor(None), 1.0);
        assert_eq!(boost.factor(Some(0.0)), 1.0);
        assert_eq!(boost.factor(Some(-3.0)), 1.0);
    }

    #[test]
    fn monotone_in_delta_momentum_and_novelty() {
        let w = weights();
        let asset = stock(None);
        let lo = w.score(&features(5, 1, 0.5), &asset, 1);
        assert!(w.score(&features(5, 3, 0.5), &asset, 1) > lo);
        assert!(w.score(&features(5, 1, 1.5), &asset, 1) > lo);

        let mut novel = features(5, 1, 0.5);
        novel.is_new = true;
        assert!(w.score(&novel, &asset, 1) > lo);
    }

    #[test]
    fn smaller_cap_scores_higher() {
        let mut w = weights();
        w.small_cap = SmallCapBoost {
            reference_cap: 1_000_000_000.0,
            exponent: 0.5,
            max_multiplier: 4.0,
        };
        let f = features(4, 2, 1.0);
        assert!(w.score(&f, &stock(Some(50_000_000.0)), 1) > w.score(&f, &stock(Some(900_000_000.0)), 1));
    }

    #[test]
    fn cross_source_bonus_needs_two_sources() {
        let w = weights();
        let f = features(4, 2, 1.0);
        let one = w.score(&f, &stock(None), 1);
        let two = w.score(&f, &stock(None), 2);
        assert!((two - one * 1.5).abs() < 1e-9);
    }

    #[test]
    fn crypto_terms_do_not_touch_stocks() {
        let mut w = weights();
        w.meme = 10.0;
        w.liquidity = 10.0;
        let f = features(4, 2, 1.0);
        let plain = weights().score(&f, &stock(None), 1);
        assert_eq!(w.score(&f, &stock(None), 1), plain);

        let pepe = coin("PEPE", "Pepe", 1_000_000.0, 500_000.0);
        let expected = plain + 10.0 * 1.0 + 10.0 * 0.5;
        assert!((w.score(&f, &pepe, 1) - expected).abs() < 1e-9);
    }

    #[test]
    fn negative_base_floors_at_zero() {
        let w = weights();
        assert_eq!(w.score(&features(0, -20, -3.0), &stock(None), 3), 0.0);
    }

    #[test]
    fn meme_hits_checks_symbol_and_name() {
        assert_eq!(meme_hits(&coin("SHIB", "Shiba Inu", 1.0, 1.0)), 2);
        assert_eq!(meme_hits(&coin("ETH", "Ethereum", 1.0, 1.0)), 0);
    }
}
