use anyhow::Context;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Opaque storage for the serialized snapshot history.
///
/// `load` returns `Ok(None)` when nothing has been stored yet. Errors are surfaced to the caller,
/// which decides how to degrade.
#[async_trait::async_trait]
pub trait SnapshotBlob: Send + Sync {
    fn describe(&self) -> String;

    async fn load(&self) -> anyhow::Result<Option<Value>>;

    async fn save(&self, payload: &Value) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct JsonFileBlob {
    path: PathBuf,
}

impl JsonFileBlob {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait::async_trait]
impl SnapshotBlob for JsonFileBlob {
    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    async fn load(&self) -> anyhow::Result<Option<Value>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(t) => t,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("read snapshot state {} failed", self.path.display()))
            }
        };

        let v = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("snapshot state {} is not valid JSON", self.path.display()))?;
        Ok(Some(v))
    }

    async fn save(&self, payload: &Value) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create {} failed", parent.display()))?;
        }

        // Write then rename so a crash mid-write never leaves a truncated state file.
        let tmp = self.tmp_path();
        let bytes = serde_json::to_vec(payload).context("serialize snapshot state failed")?;
        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("write {} failed", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("rename {} failed", tmp.display()))?;
        Ok(())
    }
}

/// Process-local blob. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryBlob {
    payload: tokio::sync::Mutex<Option<Value>>,
    fail_io: bool,
}

impl MemoryBlob {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_payload(payload: Value) -> Self {
        Self {
            payload: tokio::sync::Mutex::new(Some(payload)),
            fail_io: false,
        }
    }

    /// A blob whose reads and writes always fail.
    pub fn broken() -> Self {
        Self {
            payload: tokio::sync::Mutex::new(None),
            fail_io: true,
        }
    }

    pub async fn payload(&self) -> Option<Value> {
        self.payload.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl SnapshotBlob for MemoryBlob {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn load(&self) -> anyhow::Result<Option<Value>> {
        anyhow::ensure!(!self.fail_io, "memory blob unavailable");
        Ok(self.payload.lock().await.clone())
    }

    async fn save(&self, payload: &Value) -> anyhow::Result<()> {
        anyhow::ensure!(!self.fail_io, "memory blob unavailable");
        *self.payload.lock().await = Some(payload.clone());
        Ok(())
    }
}
