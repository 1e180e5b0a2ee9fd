use crate::snapshot::blob::SnapshotBlob;
use anyhow::Context;
use serde_json::Value;

pub const DEFAULT_STATE_KEY: &str = "mention_snapshots";

/// Snapshot history kept as one jsonb row of `engine_state`.
#[derive(Debug, Clone)]
pub struct PgSnapshotBlob {
    pool: sqlx::PgPool,
    key: String,
}

impl PgSnapshotBlob {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self::with_key(pool, DEFAULT_STATE_KEY)
    }

    pub fn with_key(pool: sqlx::PgPool, key: impl Into<String>) -> Self {
        Self {
            pool,
            key: key.into(),
        }
    }
}

#[async_trait::async_trait]
impl SnapshotBlob for PgSnapshotBlob {
    fn describe(&self) -> String {
        format!("postgres:engine_state/{}", self.key)
    }

    async fn load(&self) -> anyhow::Result<Option<Value>> {
        let row: Option<(Value,)> =
            sqlx::query_as("SELECT payload FROM engine_state WHERE key = $1")
                .persistent(false)
                .bind(&self.key)
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("select engine_state failed (key={})", self.key))?;
        Ok(row.map(|(payload,)| payload))
    }

    async fn save(&self, payload: &Value) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO engine_state (key, payload, updated_at) VALUES ($1, $2, now()) \
             ON CONFLICT (key) DO UPDATE SET payload = EXCLUDED.payload, updated_at = EXCLUDED.updated_at",
        )
        .persistent(false)
        .bind(&self.key)
        .bind(payload)
        .execute(&self.pool)
        .await
        .with_context(|| format!("upsert engine_state failed (key={})", self.key))?;
        Ok(())
    }
}
