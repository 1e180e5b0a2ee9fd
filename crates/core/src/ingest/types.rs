use serde::{Deserialize, Serialize};

/// One blob of discussion text collected this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawText {
    pub source_id: String,
    #[serde(default)]
    pub text: String,
}

#[async_trait::async_trait]
pub trait RawTextSource: Send + Sync {
    fn source_id(&self) -> &str;

    async fn fetch_cycle(&self) -> anyhow::Result<Vec<RawText>>;
}
