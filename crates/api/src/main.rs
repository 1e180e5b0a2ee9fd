use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tickerbuzz_core::domain::candidate::{RankedCandidate, View};
use tickerbuzz_core::domain::snapshot::{HistoryPoint, SnapshotState};
use tickerbuzz_core::snapshot::blob::{JsonFileBlob, SnapshotBlob};
use tickerbuzz_core::storage::runs::StoredRun;
use tickerbuzz_core::storage::state::PgSnapshotBlob;

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
    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match tickerbuzz_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let history: Option<Arc<dyn SnapshotBlob>> = match (&settings.snapshot_state_path, &pool) {
        (Some(path), _) => Some(Arc::new(JsonFileBlob::new(path.clone()))),
        (None, Some(pool)) => Some(Arc::new(PgSnapshotBlob::new(pool.clone()))),
        (None, None) => None,
    };

    let app = router(AppState { pool, history });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/runs/latest", get(get_latest_run))
        .route("/runs/latest/:view", get(get_latest_view))
        .route("/symbols/:symbol/history", get(get_symbol_history))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    pool: Option<PgPool>,
    history: Option<Arc<dyn SnapshotBlob>>,
}

fn internal_error(e: anyhow::Error) -> StatusCode {
    sentry_anyhow::capture_anyhow(&e);
    tracing::error!(error = %e, "request failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn get_latest_run(State(state): State<AppState>) -> Result<Json<StoredRun>, StatusCode> {
    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let run = tickerbuzz_core::storage::runs::fetch_latest_run(pool)
        .await
        .map_err(internal_error)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(run))
}

async fn get_latest_view(
    State(state): State<AppState>,
    Path(view): Path<String>,
) -> Result<Json<Vec<RankedCandidate>>, StatusCode> {
    let view: View = view.parse().map_err(|_| StatusCode::NOT_FOUND)?;

    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let items = tickerbuzz_core::storage::runs::fetch_latest_view(pool, view)
        .await
        .map_err(internal_error)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(items))
}

async fn get_symbol_history(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<Vec<HistoryPoint>>, StatusCode> {
    let Some(blob) = &state.history else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let snapshots = match blob.load().await.map_err(internal_error)? {
        Some(payload) => serde_json::from_value::<SnapshotState>(payload)
            .map_err(|e| internal_error(anyhow::Error::new(e)))?,
        None => SnapshotState::default(),
    };

    Ok(Json(snapshots.history(&symbol.trim().to_ascii_uppercase())))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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

#[cfg(test)]
mod tests {
    use super::*;
    use tickerbuzz_core::snapshot::blob::MemoryBlob;

    fn degraded() -> AppState {
        AppState {
            pool: None,
            history: None,
        }
    }

    #[tokio::test]
    async fn degraded_mode_is_unavailable() {
        let err = get_latest_run(State(degraded())).await.unwrap_err();
        assert_eq!(err, StatusCode::SERVICE_UNAVAILABLE);

        let err = get_latest_view(State(degraded()), Path("elite".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn unknown_view_is_not_found() {
        let err = get_latest_view(State(degraded()), Path("sideways".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn history_reads_snapshot_state() {
        let blob = MemoryBlob::with_payload(serde_json::json!({
            "snapshots": [
                {"timestamp": 1_767_225_600, "counts": {"GME": 3}},
                {"timestamp": 1_767_229_200, "counts": {"AMC": 1}}
            ]
        }));
        let state = AppState {
            pool: None,
            history: Some(Arc::new(blob)),
        };

        let Json(points) = get_symbol_history(State(state), Path("gme".to_string()))
            .await
            .unwrap();
        let counts: Vec<u32> = points.iter().map(|p| p.count).collect();
        assert_eq!(counts, vec![3, 0]);
    }
}
