pub mod chan;
pub mod types;

use types::{RawText, RawTextSource};

/// Collect this cycle's text from every source. A failing source contributes nothing.
pub async fn collect(sources: &[Box<dyn RawTextSource>]) -> Vec<RawText> {
    let mut out = Vec::new();
    for source in sources {
        match source.fetch_cycle().await {
            Ok(texts) => {
                tracing::info!(source = source.source_id(), texts = texts.len(), "raw text fetched");
                out.extend(texts);
            }
            Err(err) => {
                tracing::warn!(source = source.source_id(), error = %err, "raw text source failed; skipping");
            }
        }
    }
    out
}
