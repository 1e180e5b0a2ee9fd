use tickerbuzz_core::config::{parse_boards, Settings};
use tickerbuzz_core::ingest::chan::ChanCatalogSource;
use tickerbuzz_core::ingest::types::RawTextSource;

/// `--boards` wins over `CHAN_BOARDS`.
pub fn resolve_boards(arg: Option<&str>, settings: &Settings) -> Vec<String> {
    match arg {
        Some(list) => parse_boards(Some(list)),
        None => settings.chan_boards.clone(),
    }
}

/// One independent source per board, so each board counts separately for cross-source confirmation.
pub fn build_sources(boards: &[String]) -> anyhow::Result<Vec<Box<dyn RawTextSource>>> {
    let mut out: Vec<Box<dyn RawTextSource>> = Vec::with_capacity(boards.len());
    for board in boards {
        out.push(Box::new(ChanCatalogSource::new(board)?));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(boards: &[&str]) -> Settings {
        Settings {
            database_url: None,
            sentry_dsn: None,
            fmp_api_key: None,
            coingecko_api_key: None,
            snapshot_state_path: None,
            crypto_cache_path: None,
            chan_boards: boards.iter().map(|b| b.to_string()).collect(),
        }
    }

    #[test]
    fn cli_boards_override_settings() {
        let s = settings(&["biz"]);
        assert_eq!(resolve_boards(Some("smg, biz"), &s), vec!["smg", "biz"]);
        assert_eq!(resolve_boards(None, &s), vec!["biz"]);
    }

    #[test]
    fn each_board_is_its_own_source() {
        let sources = build_sources(&["biz".to_string(), "smg".to_string()]).unwrap();
        let ids: Vec<&str> = sources.iter().map(|s| s.source_id()).collect();
        assert_eq!(ids, vec!["chan/biz", "chan/smg"]);
    }
}
