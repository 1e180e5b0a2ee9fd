use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use std::sync::Arc;
use tickerbuzz_core::enrich::crypto::CoinGeckoUniverse;
use tickerbuzz_core::enrich::equity::FmpEquityResolver;
use tickerbuzz_core::enrich::Classifier;
use tickerbuzz_core::signal::EngineConfig;
use tickerbuzz_core::snapshot::blob::{JsonFileBlob, MemoryBlob, SnapshotBlob};
use tickerbuzz_core::snapshot::SnapshotStore;
use tickerbuzz_core::storage::state::PgSnapshotBlob;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod sources;

#[derive(Debug, Parser)]
#[command(name = "tickerbuzz_worker")]
struct Args {
    /// Run the cycle without persisting the ranked run or the updated snapshot history.
    #[arg(long)]
    dry_run: bool,

    /// Keep snapshot history in this JSON file instead of Postgres.
    #[arg(long)]
    state_file: Option<String>,

    /// Cycle timestamp (RFC3339). Defaults to now.
    #[arg(long)]
    at: Option<String>,

    /// Comma-separated boards to read, e.g. `biz,smg`.
    #[arg(long)]
    boards: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = tickerbuzz_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let at = resolve_at(args.at.as_deref())?;
    let config = EngineConfig::from_env();

    let state_file = args
        .state_file
        .clone()
        .or_else(|| settings.snapshot_state_path.clone());

    let db_mode = DbMode::for_run(
        args.dry_run,
        state_file.is_some(),
        settings.database_url.is_some(),
    );
    let pool = match db_mode {
        DbMode::Unused => None,
        DbMode::ReadOnly | DbMode::ReadWrite => {
            let db_url = settings.require_database_url()?;
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await
                .context("connect DATABASE_URL failed")?;
            if db_mode == DbMode::ReadWrite {
                tickerbuzz_core::storage::migrate(&pool).await?;
            }
            Some(pool)
        }
    };

    if let (Some(pool), DbMode::ReadWrite) = (&pool, db_mode) {
        let acquired = tickerbuzz_core::storage::lock::try_acquire_cycle_lock(pool).await?;
        if !acquired {
            tracing::warn!(%at, "cycle lock not acquired; another run in progress");
            return Ok(());
        }
    }

    let result = run(&args, &settings, &config, state_file, pool.as_ref(), at).await;
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(%at, error = %err, "mention cycle failed");
    }

    if let (Some(pool), DbMode::ReadWrite) = (&pool, db_mode) {
        let _ = tickerbuzz_core::storage::lock::release_cycle_lock(pool).await;
    }
    result
}

/// How a run touches Postgres.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DbMode {
    Unused,
    /// Dry run reading history from Postgres: no migrations, no lock, no writes.
    ReadOnly,
    ReadWrite,
}

impl DbMode {
    // Postgres holds history unless a state file is given; ranked runs go there whenever it is configured.
    fn for_run(dry_run: bool, has_state_file: bool, has_database_url: bool) -> Self {
        match (dry_run, has_state_file) {
            (true, true) => DbMode::Unused,
            (true, false) => DbMode::ReadOnly,
            (false, false) => DbMode::ReadWrite,
            (false, true) if has_database_url => DbMode::ReadWrite,
            (false, true) => DbMode::Unused,
        }
    }
}

async fn run(
    args: &Args,
    settings: &tickerbuzz_core::config::Settings,
    config: &EngineConfig,
    state_file: Option<String>,
    pool: Option<&sqlx::PgPool>,
    at: DateTime<Utc>,
) -> anyhow::Result<()> {
    let blob: Arc<dyn SnapshotBlob> = match (state_file, pool) {
        (Some(path), _) => Arc::new(JsonFileBlob::new(path)),
        (None, Some(pool)) => Arc::new(PgSnapshotBlob::new(pool.clone())),
        (None, None) => anyhow::bail!("no snapshot state backend configured"),
    };
    let blob = if args.dry_run {
        detach(blob).await
    } else {
        blob
    };

    let boards = sources::resolve_boards(args.boards.as_deref(), settings);
    let sources = sources::build_sources(&boards)?;
    let texts = tickerbuzz_core::ingest::collect(&sources).await;

    let classifier = Classifier::new(
        Arc::new(FmpEquityResolver::from_settings(settings)?),
        Arc::new(CoinGeckoUniverse::from_settings(settings)?),
    );

    let mut store = SnapshotStore::load(blob, config.retention, at).await;
    let report =
        tickerbuzz_core::pipeline::run_cycle(&texts, &mut store, &classifier, config, at).await;

    match pool.filter(|_| !args.dry_run) {
        Some(pool) => {
            let run_id = tickerbuzz_core::storage::runs::persist_run(pool, &report).await?;
            tracing::info!(%at, %run_id, boards = ?boards, "persisted ranked run");
        }
        None => {
            let out = serde_json::to_string_pretty(&report).context("serialize cycle report failed")?;
            println!("{out}");
        }
    }

    Ok(())
}

/// Copy the persisted history into memory so a dry run never writes it back.
async fn detach(blob: Arc<dyn SnapshotBlob>) -> Arc<dyn SnapshotBlob> {
    match blob.load().await {
        Ok(Some(payload)) => Arc::new(MemoryBlob::with_payload(payload)),
        Ok(None) => Arc::new(MemoryBlob::new()),
        Err(err) => {
            tracing::warn!(blob = %blob.describe(), error = %err, "snapshot state unreadable; dry run starts empty");
            Arc::new(MemoryBlob::new())
        }
    }
}

fn init_sentry(settings: &tickerbuzz_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

fn resolve_at(at_arg: Option<&str>) -> anyhow::Result<DateTime<Utc>> {
    match at_arg {
        Some(s) => Ok(DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("invalid --at timestamp: {s}"))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn at_accepts_offsets() {
        let at = resolve_at(Some("2026-04-01T18:00:00+09:00")).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap());
        assert!(resolve_at(Some("yesterday")).is_err());
    }

    #[test]
    fn dry_runs_never_migrate_or_lock() {
        assert_eq!(DbMode::for_run(true, false, true), DbMode::ReadOnly);
        assert_eq!(DbMode::for_run(true, true, true), DbMode::Unused);
        assert_eq!(DbMode::for_run(false, false, true), DbMode::ReadWrite);
        assert_eq!(DbMode::for_run(false, true, true), DbMode::ReadWrite);
        assert_eq!(DbMode::for_run(false, true, false), DbMode::Unused);
    }

    #[tokio::test]
    async fn detached_blob_keeps_payload_but_not_writes() {
        let source = Arc::new(MemoryBlob::with_payload(serde_json::json!({"snapshots": []})));
        let detached = detach(source.clone()).await;

        detached.save(&serde_json::json!({"snapshots": [1]})).await.unwrap();
        assert_eq!(source.payload().await, Some(serde_json::json!({"snapshots": []})));
    }
}
