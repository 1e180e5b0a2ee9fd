use crate::domain::candidate::{RankedCandidate, View};
use crate::pipeline::CycleReport;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// A ranked run as read back from the database.
#[derive(Debug, Clone, Serialize)]
pub struct StoredRun {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub report: CycleReport,
}

#[derive(Debug, Clone, PartialEq)]
struct ItemRow {
    view: String,
    rank: i32,
    symbol: String,
    kind: String,
    score: f64,
    asset: Value,
    features: Value,
    sources: i32,
}

fn item_rows(report: &CycleReport) -> anyhow::Result<Vec<ItemRow>> {
    let mut rows = Vec::new();
    for (view, items) in &report.views {
        for (idx, c) in items.iter().enumerate() {
            rows.push(ItemRow {
                view: view.as_str().to_string(),
                rank: i32::try_from(idx + 1).context("rank overflow")?,
                symbol: c.symbol.clone(),
                kind: c.kind().as_str().to_string(),
                score: c.score,
                asset: serde_json::to_value(&c.asset).context("serialize asset failed")?,
                features: serde_json::to_value(c.features).context("serialize features failed")?,
                sources: i32::try_from(c.sources).context("sources overflow")?,
            });
        }
    }
    Ok(rows)
}

/// Rows must be ordered by (view, rank).
fn assemble_views(rows: Vec<ItemRow>) -> anyhow::Result<BTreeMap<View, Vec<RankedCandidate>>> {
    let mut views: BTreeMap<View, Vec<RankedCandidate>> =
        View::ALL.into_iter().map(|v| (v, Vec::new())).collect();

    for row in rows {
        let view: View = row.view.parse()?;
        let candidate = RankedCandidate {
            asset: serde_json::from_value(row.asset)
                .with_context(|| format!("invalid asset in DB for symbol={}", row.symbol))?,
            features: serde_json::from_value(row.features)
                .with_context(|| format!("invalid features in DB for symbol={}", row.symbol))?,
            symbol: row.symbol,
            sources: usize::try_from(row.sources).unwrap_or(0),
            score: row.score,
        };
        views.entry(view).or_default().push(candidate);
    }
    Ok(views)
}

pub async fn persist_run(pool: &sqlx::PgPool, report: &CycleReport) -> anyhow::Result<Uuid> {
    let rows = item_rows(report)?;
    let run_id = Uuid::new_v4();

    let mut tx = pool.begin().await.context("begin transaction failed")?;

    sqlx::query(
        "INSERT INTO ranked_runs (id, cycle_at, texts, mentions_total, symbols_seen, candidates, resolved, snapshot_appended) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .persistent(false)
    .bind(run_id)
    .bind(report.at)
    .bind(i32::try_from(report.texts).unwrap_or(i32::MAX))
    .bind(i64::try_from(report.mentions_total).unwrap_or(i64::MAX))
    .bind(i32::try_from(report.symbols_seen).unwrap_or(i32::MAX))
    .bind(i32::try_from(report.candidates).unwrap_or(i32::MAX))
    .bind(i32::try_from(report.resolved).unwrap_or(i32::MAX))
    .bind(report.snapshot_appended)
    .execute(&mut *tx)
    .await
    .context("insert ranked_runs failed")?;

    if !rows.is_empty() {
        let mut qb = sqlx::QueryBuilder::new(
            "INSERT INTO ranked_items (run_id, view, rank, symbol, kind, score, asset, features, sources) ",
        );
        qb.push_values(&rows, |mut b, row| {
            b.push_bind(run_id)
                .push_bind(&row.view)
                .push_bind(row.rank)
                .push_bind(&row.symbol)
                .push_bind(&row.kind)
                .push_bind(row.score)
                .push_bind(&row.asset)
                .push_bind(&row.features)
                .push_bind(row.sources);
        });
        qb.build()
            .persistent(false)
            .execute(&mut *tx)
            .await
            .context("insert ranked_items failed")?;
    }

    tx.commit().await.context("commit transaction failed")?;

    tracing::debug!(%run_id, items = rows.len(), "ranked run persisted");
    Ok(run_id)
}

type RunRow = (Uuid, DateTime<Utc>, DateTime<Utc>, i32, i64, i32, i32, i32, bool);

pub async fn fetch_latest_run(pool: &sqlx::PgPool) -> anyhow::Result<Option<StoredRun>> {
    let row = sqlx::query_as::<_, RunRow>(
        "SELECT id, cycle_at, created_at, texts, mentions_total, symbols_seen, candidates, resolved, snapshot_appended \
         FROM ranked_runs \
         ORDER BY cycle_at DESC, created_at DESC \
         LIMIT 1",
    )
    .fetch_optional(pool)
    .await
    .context("select latest ranked_runs failed")?;

    let Some((run_id, at, created_at, texts, mentions_total, symbols_seen, candidates, resolved, snapshot_appended)) =
        row
    else {
        return Ok(None);
    };

    let items = fetch_items(pool, run_id, None).await?;

    Ok(Some(StoredRun {
        run_id,
        created_at,
        report: CycleReport {
            at,
            texts: usize::try_from(texts).unwrap_or(0),
            mentions_total: u64::try_from(mentions_total).unwrap_or(0),
            symbols_seen: usize::try_from(symbols_seen).unwrap_or(0),
            candidates: usize::try_from(candidates).unwrap_or(0),
            resolved: usize::try_from(resolved).unwrap_or(0),
            snapshot_appended,
            views: assemble_views(items)?,
        },
    }))
}

/// Items of one view from the most recent run, in rank order.
pub async fn fetch_latest_view(
    pool: &sqlx::PgPool,
    view: View,
) -> anyhow::Result<Option<Vec<RankedCandidate>>> {
    let run_id: Option<Uuid> = sqlx::query_scalar(
        "SELECT id FROM ranked_runs ORDER BY cycle_at DESC, created_at DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await
    .context("select latest ranked_runs failed")?;

    let Some(run_id) = run_id else {
        return Ok(None);
    };

    let items = fetch_items(pool, run_id, Some(view)).await?;
    let mut views = assemble_views(items)?;
    Ok(Some(views.remove(&view).unwrap_or_default()))
}

async fn fetch_items(
    pool: &sqlx::PgPool,
    run_id: Uuid,
    view: Option<View>,
) -> anyhow::Result<Vec<ItemRow>> {
    let rows = sqlx::query_as::<_, (String, i32, String, String, f64, Value, Value, i32)>(
        "SELECT view, rank, symbol, kind, score, asset, features, sources \
         FROM ranked_items \
         WHERE run_id = $1 AND ($2::text IS NULL OR view = $2) \
         ORDER BY view ASC, rank ASC",
    )
    .bind(run_id)
    .bind(view.map(|v| v.as_str()))
    .fetch_all(pool)
    .await
    .with_context(|| format!("select ranked_items failed (run_id={run_id})"))?;

    Ok(rows
        .into_iter()
        .map(|(view, rank, symbol, kind, score, asset, features, sources)| ItemRow {
            view,
            rank,
            symbol,
            kind,
            score,
            asset,
            features,
            sources,
        })
        .collect())
}
