use anyhow::Context;

// Advisory locks are scoped to the Postgres session. One key guards the whole
// load -> append -> save sequence so overlapping cycles cannot interleave.
const CYCLE_LOCK_KEY: i64 = 0x5449_434B_4255_5A5A; // "TICKBUZZ"

pub async fn try_acquire_cycle_lock(pool: &sqlx::PgPool) -> anyhow::Result<bool> {
    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .persistent(false)
        .bind(CYCLE_LOCK_KEY)
        .fetch_one(pool)
        .await
        .with_context(|| format!("failed to acquire advisory lock (key={CYCLE_LOCK_KEY})"))?;
    Ok(acquired.0)
}

pub async fn release_cycle_lock(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::query("SELECT pg_advisory_unlock($1)")
        .persistent(false)
        .bind(CYCLE_LOCK_KEY)
        .execute(pool)
        .await
        .with_context(|| format!("failed to release advisory lock (key={CYCLE_LOCK_KEY})"))?;
    Ok(())
}
