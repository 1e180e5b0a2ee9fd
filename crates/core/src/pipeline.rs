//! One batch cycle: count -> features -> append -> classify -> score -> rank.

use crate::domain::candidate::{FeatureRecord, RankedCandidate, View};
use crate::enrich::Classifier;
use crate::extract::MentionTally;
use crate::ingest::types::RawText;
use crate::ranking;
use crate::signal::{EngineConfig, FeatureCalculator};
use crate::snapshot::{AppendOutcome, SnapshotStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub at: DateTime<Utc>,
    pub texts: usize,
    pub mentions_total: u64,
    pub symbols_seen: usize,
    /// Symbols at or above the minimum-mention threshold.
    pub candidates: usize,
    pub resolved: usize,
    pub snapshot_appended: bool,
    pub views: BTreeMap<View, Vec<RankedCandidate>>,
}

pub async fn run_cycle(
    texts: &[RawText],
    store: &mut SnapshotStore,
    classifier: &Classifier,
    config: &EngineConfig,
    at: DateTime<Utc>,
) -> CycleReport {
    let tally = MentionTally::from_texts(texts);

    // Features must be read from the history as it stood before this cycle lands in it.
    let features: BTreeMap<String, FeatureRecord> = {
        let calc = FeatureCalculator::from_store(store, at, &config.features);
        tally
            .at_least(config.min_mentions)
            .map(|(symbol, count)| (symbol.to_string(), calc.compute(symbol, count)))
            .collect()
    };

    let outcome = store
        .append(tally.totals.clone(), tally.per_source.clone(), at)
        .await;
    let snapshot_appended = matches!(outcome, AppendOutcome::Appended { .. });

    let assets = classifier
        .resolve_all(features.keys().cloned().collect(), config.lookup_concurrency)
        .await;

    let mut views = BTreeMap::new();
    for view_cfg in &config.views {
        let scored: Vec<RankedCandidate> = features
            .iter()
            .filter_map(|(symbol, f)| {
                let asset = assets.get(symbol)?;
                let sources = tally.source_count(symbol);
                Some(RankedCandidate {
                    symbol: symbol.clone(),
                    asset: asset.clone(),
                    features: *f,
                    sources,
                    score: view_cfg.weights.score(f, asset, sources),
                })
            })
            .collect();

        let selected = ranking::select(scored, &view_cfg.selection);
        tracing::debug!(view = %view_cfg.view, selected = selected.len(), "view ranked");
        views.insert(view_cfg.view, selected);
    }

    let report = CycleReport {
        at,
        texts: texts.len(),
        mentions_total: tally.total_mentions(),
        symbols_seen: tally.totals.len(),
        candidates: features.len(),
        resolved: assets.len(),
        snapshot_appended,
        views,
    };

    tracing::info!(
        %at,
        texts = report.texts,
        mentions = report.mentions_total,
        symbols = report.symbols_seen,
        candidates = report.candidates,
        resolved = report.resolved,
        snapshot_appended,
        "mention cycle complete"
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::testing::{FakeCoins, FakeEquities};
    use crate::snapshot::blob::MemoryBlob;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap()
    }

    fn raw(source: &str, text: &str) -> RawText {
        RawText {
            source_id: source.to_string(),
            text: text.to_string(),
        }
    }

    fn repeat(symbol: &str, n: usize) -> String {
        vec![symbol; n].join(" ")
    }

    fn config() -> EngineConfig {
        let mut cfg = EngineConfig::default();
        cfg.min_mentions = 2;
        cfg.features.spike_abs = 4;
        cfg
    }

    fn find<'a>(report: &'a CycleReport, view: View, symbol: &str) -> Option<&'a RankedCandidate> {
        report.views.get(&view)?.iter().find(|c| c.symbol == symbol)
    }

    #[tokio::test]
    async fn cold_start_candidate_is_new_with_full_delta() {
        let classifier = Classifier::new(
            Arc::new(FakeEquities::default().listed("AAA", "NASDAQ", 20_000_000.0, true)),
            Arc::new(FakeCoins::default()),
        );
        let mut store = SnapshotStore::in_memory(Duration::hours(48));

        let report = run_cycle(&[raw("chan/biz", &repeat("AAA", 3))], &mut store, &classifier, &config(), t0()).await;

        let aaa = find(&report, View::Elite, "AAA").expect("AAA ranked");
        assert_eq!(aaa.features.delta, 3);
        assert_eq!(aaa.features.momentum, 0.0);
        assert!(aaa.features.is_new);
        assert!(find(&report, View::Asymmetric, "AAA").is_some());
        assert!(report.snapshot_appended);
    }

    #[tokio::test]
    async fn absolute_jump_spikes() {
        let classifier = Classifier::new(
            Arc::new(FakeEquities::default().listed("AAA", "NASDAQ", 20_000_000.0, true)),
            Arc::new(FakeCoins::default()),
        );
        let mut store = SnapshotStore::in_memory(Duration::hours(48));
        let mut cfg = config();
        cfg.features.spike_mult = 100.0;

        run_cycle(&[raw("chan/biz", &repeat("AAA", 2))], &mut store, &classifier, &cfg, t0()).await;
        let report = run_cycle(
            &[raw("chan/biz", &repeat("AAA", 10))],
            &mut store,
            &classifier,
            &cfg,
            t0() + Duration::hours(1),
        )
        .await;

        let aaa = find(&report, View::Elite, "AAA").unwrap();
        assert_eq!(aaa.features.previous, 2);
        assert_eq!(aaa.features.delta, 8);
        assert!(aaa.features.is_spiking);
        assert!(!aaa.features.is_new);
    }

    #[tokio::test]
    async fn unresolved_symbol_never_ranks() {
        let classifier = Classifier::new(
            Arc::new(FakeEquities::default().listed("AAA", "NASDAQ", 20_000_000.0, true)),
            Arc::new(FakeCoins::default()),
        );
        let mut store = SnapshotStore::in_memory(Duration::hours(48));
        let text = format!("{} {}", repeat("AAA", 2), repeat("ZZZ", 50));

        let report = run_cycle(&[raw("a", &text), raw("b", &text)], &mut store, &classifier, &config(), t0()).await;

        assert_eq!(report.candidates, 2);
        assert_eq!(report.resolved, 1);
        for (view, items) in &report.views {
            assert!(items.iter().all(|c| c.symbol != "ZZZ"), "ZZZ leaked into {view}");
        }
        assert!(find(&report, View::Elite, "AAA").is_some());
    }

    #[tokio::test]
    async fn expired_snapshot_is_purged_on_append() {
        let classifier = Classifier::new(Arc::new(FakeEquities::default()), Arc::new(FakeCoins::default()));
        let mut store = SnapshotStore::in_memory(Duration::hours(48));

        run_cycle(&[raw("a", "OLD OLD")], &mut store, &classifier, &config(), t0()).await;
        run_cycle(
            &[raw("a", "NEW NEW")],
            &mut store,
            &classifier,
            &config(),
            t0() + Duration::hours(49),
        )
        .await;

        assert_eq!(store.all().len(), 1);
        assert!(store.all().iter().all(|s| s.count("OLD") == 0));
    }

    #[tokio::test]
    async fn below_threshold_symbols_are_not_classified() {
        let equities = Arc::new(FakeEquities::default().listed("AAA", "NASDAQ", 20_000_000.0, true));
        let classifier = Classifier::new(equities.clone(), Arc::new(FakeCoins::default()));
        let mut store = SnapshotStore::in_memory(Duration::hours(48));

        let report = run_cycle(&[raw("a", "AAA BBB")], &mut store, &classifier, &config(), t0()).await;

        assert_eq!(report.candidates, 0);
        assert!(report.views.values().all(|v| v.is_empty()));
        assert_eq!(equities.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        // Still recorded in history.
        assert_eq!(store.latest().unwrap().count("AAA"), 1);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_views_and_empty_snapshot() {
        let classifier = Classifier::new(Arc::new(FakeEquities::default()), Arc::new(FakeCoins::default()));
        let mut store = SnapshotStore::load(Arc::new(MemoryBlob::broken()), Duration::hours(48), t0()).await;

        let report = run_cycle(&[], &mut store, &classifier, &config(), t0()).await;

        assert_eq!(report.mentions_total, 0);
        assert_eq!(report.views.len(), View::ALL.len());
        assert!(report.views.values().all(|v| v.is_empty()));
        assert_eq!(store.all().len(), 1);
    }

    #[tokio::test]
    async fn crypto_lands_in_degen_and_cross_source_counts() {
        let classifier = Classifier::new(
            Arc::new(FakeEquities::default()),
            Arc::new(FakeCoins::default().coin("PEPE", 40_000_000.0, 20_000_000.0)),
        );
        let mut store = SnapshotStore::in_memory(Duration::hours(48));

        let report = run_cycle(
            &[raw("chan/biz", "PEPE PEPE"), raw("chan/smg", "PEPE")],
            &mut store,
            &classifier,
            &config(),
            t0(),
        )
        .await;

        let pepe = find(&report, View::Degen, "PEPE").unwrap();
        assert_eq!(pepe.sources, 2);
        assert!(pepe.score > 0.0);
        assert!(find(&report, View::Asymmetric, "PEPE").is_none());
    }
}
