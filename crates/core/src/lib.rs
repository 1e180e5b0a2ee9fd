pub mod domain;
pub mod enrich;
pub mod extract;
pub mod ingest;
pub mod pipeline;
pub mod ranking;
pub mod signal;
pub mod snapshot;
pub mod storage;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub fmp_api_key: Option<String>,
        pub coingecko_api_key: Option<String>,
        pub snapshot_state_path: Option<String>,
        pub crypto_cache_path: Option<String>,
        pub chan_boards: Vec<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                fmp_api_key: std::env::var("FMP_API_KEY").ok().filter(|s| !s.trim().is_empty()),
                coingecko_api_key: std::env::var("COINGECKO_API_KEY")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                snapshot_state_path: std::env::var("SNAPSHOT_STATE_PATH").ok(),
                crypto_cache_path: std::env::var("CRYPTO_CACHE_PATH").ok(),
                chan_boards: parse_boards(std::env::var("CHAN_BOARDS").ok().as_deref()),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_snapshot_state_path(&self) -> anyhow::Result<&str> {
            self.snapshot_state_path
                .as_deref()
                .context("SNAPSHOT_STATE_PATH is required")
        }
    }

    /// Comma-separated board names; defaults to `biz`.
    pub fn parse_boards(v: Option<&str>) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for board in v.unwrap_or_default().split(',') {
            let board = board.trim().trim_matches('/').to_ascii_lowercase();
            if !board.is_empty() && !out.contains(&board) {
                out.push(board);
            }
        }
        if out.is_empty() {
            out.push("biz".to_string());
        }
        out
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn board_list_defaults_and_normalizes() {
            assert_eq!(parse_boards(None), vec!["biz"]);
            assert_eq!(parse_boards(Some(" ")), vec!["biz"]);
            assert_eq!(parse_boards(Some("/biz/, SMG")), vec!["biz", "smg"]);
            assert_eq!(parse_boards(Some("biz,smg,biz")), vec!["biz", "smg"]);
        }
    }
}
