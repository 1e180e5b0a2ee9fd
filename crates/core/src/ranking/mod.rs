use crate::domain::asset::{AssetKind, AssetRecord};
use crate::domain::candidate::RankedCandidate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapBand {
    pub min: f64,
    pub max: f64,
}

impl CapBand {
    pub fn contains(&self, cap: f64) -> bool {
        (self.min..=self.max).contains(&cap)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindQuota {
    pub kind: AssetKind,
    pub max: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionPolicy {
    pub top_n: usize,
    /// Asset kinds eligible for the view.
    pub kinds: Vec<AssetKind>,
    /// Market-cap window; assets without a known cap are excluded when set.
    pub cap_band: Option<CapBand>,
    /// Filled in order. Empty means a plain top-N.
    pub quotas: Vec<KindQuota>,
}

impl SelectionPolicy {
    pub fn admits(&self, asset: &AssetRecord) -> bool {
        if !self.kinds.contains(&asset.kind()) {
            return false;
        }
        match self.cap_band {
            Some(band) => asset.market_cap().is_some_and(|cap| band.contains(cap)),
            None => true,
        }
    }
}

/// Order candidates by score and apply the view's selection policy.
///
/// The sort is stable: equal scores keep their input order. With quotas the result is the
/// quota buckets concatenated in policy order, each sorted by score, so a later bucket may
/// hold higher scores than an earlier one.
pub fn select(candidates: Vec<RankedCandidate>, policy: &SelectionPolicy) -> Vec<RankedCandidate> {
    let mut eligible: Vec<RankedCandidate> = candidates
        .into_iter()
        .filter(|c| policy.admits(&c.asset))
        .collect();

    eligible.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut seen = HashSet::<String>::new();
    let mut out = Vec::with_capacity(policy.top_n.min(eligible.len()));

    if policy.quotas.is_empty() {
        for c in eligible {
            if out.len() >= policy.top_n {
                break;
            }
            if seen.insert(c.symbol.clone()) {
                out.push(c);
            }
        }
        return out;
    }

    for quota in &policy.quotas {
        let mut taken = 0;
        for c in eligible.iter().filter(|c| c.kind() == quota.kind) {
            if taken >= quota.max {
                break;
            }
            if seen.insert(c.symbol.clone()) {
                out.push(c.clone());
                taken += 1;
            }
        }
    }

    out.truncate(policy.top_n);
    out
}
