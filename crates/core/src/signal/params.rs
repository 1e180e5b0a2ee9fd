use crate::domain::asset::AssetKind;
use crate::domain::candidate::View;
use crate::ranking::{CapBand, KindQuota, SelectionPolicy};
use crate::signal::scoring::{ScoreWeights, SmallCapBoost};
use chrono::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureParams {
    /// K: trailing points used for momentum, the current count included.
    pub momentum_points: usize,
    pub novelty_window: Duration,
    pub spike_abs: i64,
    pub spike_mult: f64,
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            momentum_points: 6,
            novelty_window: Duration::hours(24),
            spike_abs: 4,
            spike_mult: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewConfig {
    pub view: View,
    pub weights: ScoreWeights,
    pub selection: SelectionPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub retention: Duration,
    pub features: FeatureParams,
    /// Symbols below this many mentions in a cycle are not classified or ranked.
    pub min_mentions: u32,
    /// Concurrent reference-data lookups per cycle.
    pub lookup_concurrency: usize,
    pub views: Vec<ViewConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention: Duration::hours(48),
            features: FeatureParams::default(),
            min_mentions: 2,
            lookup_concurrency: 8,
            views: default_views(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Some(h) = env_parse::<i64>("RETENTION_HOURS").filter(|h| *h > 0) {
            out.retention = Duration::hours(h);
        }
        if let Some(k) = env_parse::<usize>("MOMENTUM_POINTS") {
            out.features.momentum_points = k;
        }
        if let Some(h) = env_parse::<i64>("NOVELTY_HOURS").filter(|h| *h > 0) {
            out.features.novelty_window = Duration::hours(h);
        }
        if let Some(n) = env_parse::<i64>("SPIKE_ABS") {
            out.features.spike_abs = n;
        }
        if let Some(m) = env_parse::<f64>("SPIKE_MULT").filter(|m| m.is_finite()) {
            out.features.spike_mult = m;
        }
        if let Some(n) = env_parse::<u32>("MIN_MENTIONS") {
            out.min_mentions = n;
        }
        if let Some(n) = env_parse::<usize>("LOOKUP_CONCURRENCY").filter(|n| *n >= 1) {
            out.lookup_concurrency = n;
        }

        out
    }

    pub fn view(&self, view: View) -> Option<&ViewConfig> {
        self.views.iter().find(|v| v.view == view)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}

pub fn default_views() -> Vec<ViewConfig> {
    vec![elite(), asymmetric(), pre_breakout(), degen()]
}

// Broad "best of the board" list: mostly stocks, a few coins.
fn elite() -> ViewConfig {
    ViewConfig {
        view: View::Elite,
        weights: ScoreWeights {
            count: 1.0,
            delta: 1.5,
            momentum: 2.0,
            novelty: 2.0,
            spike: 3.0,
            cross_source_bonus: Some(1.25),
            meme: 0.0,
            liquidity: 0.0,
            small_cap: SmallCapBoost {
                reference_cap: 1_000_000_000.0,
                exponent: 0.25,
                max_multiplier: 3.0,
            },
        },
        selection: SelectionPolicy {
            top_n: 20,
            kinds: vec![AssetKind::Stock, AssetKind::Crypto],
            cap_band: None,
            quotas: vec![
                KindQuota {
                    kind: AssetKind::Stock,
                    max: 15,
                },
                KindQuota {
                    kind: AssetKind::Crypto,
                    max: 5,
                },
            ],
        },
    }
}

// Nano-cap stocks ($5M-$25M); score is mentions scaled by 25M / cap.
fn asymmetric() -> ViewConfig {
    ViewConfig {
        view: View::Asymmetric,
        weights: ScoreWeights {
            count: 1.0,
            delta: 0.0,
            momentum: 0.0,
            novelty: 0.0,
            spike: 0.0,
            cross_source_bonus: None,
            meme: 0.0,
            liquidity: 0.0,
            small_cap: SmallCapBoost {
                reference_cap: 25_000_000.0,
                exponent: 1.0,
                max_multiplier: 5.0,
            },
        },
        selection: SelectionPolicy {
            top_n: 25,
            kinds: vec![AssetKind::Stock],
            cap_band: Some(CapBand {
                min: 5_000_000.0,
                max: 25_000_000.0,
            }),
            quotas: Vec::new(),
        },
    }
}

// Early movers: rising slope and fresh names matter more than raw volume.
fn pre_breakout() -> ViewConfig {
    ViewConfig {
        view: View::PreBreakout,
        weights: ScoreWeights {
            count: 0.25,
            delta: 1.0,
            momentum: 3.0,
            novelty: 3.0,
            spike: 1.0,
            cross_source_bonus: Some(1.2),
            meme: 0.0,
            liquidity: 0.0,
            small_cap: SmallCapBoost {
                reference_cap: 500_000_000.0,
                exponent: 0.35,
                max_multiplier: 4.0,
            },
        },
        selection: SelectionPolicy {
            top_n: 15,
            kinds: vec![AssetKind::Stock, AssetKind::Crypto],
            cap_band: None,
            quotas: Vec::new(),
        },
    }
}

fn degen() -> ViewConfig {
    ViewConfig {
        view: View::Degen,
        weights: ScoreWeights {
            count: 0.5,
            delta: 1.0,
            momentum: 1.0,
            novelty: 2.0,
            spike: 2.0,
            cross_source_bonus: Some(1.1),
            meme: 3.0,
            liquidity: 5.0,
            small_cap: SmallCapBoost {
                reference_cap: 50_000_000.0,
                exponent: 0.5,
                max_multiplier: 6.0,
            },
        },
        selection: SelectionPolicy {
            top_n: 20,
            kinds: vec![AssetKind::Crypto],
            cap_band: None,
            quotas: Vec::new(),
        },
    }
}
