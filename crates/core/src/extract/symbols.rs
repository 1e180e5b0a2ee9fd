use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

// Short all-caps words. `\b` rejects tokens glued to digits or letters, so "GME2" never matches.
static RE_TICKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{2,5}\b").expect("static ticker regex"));

const MIN_LEN: usize = 2;
const MAX_LEN: usize = 5;

// Common false positives: currency codes, exchanges/regulators, board slang, filler words.
const DENYLIST: &[&str] = &[
    // currencies and stablecoins
    "USD", "USDT", "USDC", "EUR", "GBP", "JPY", "CAD", "AUD", "CHF", "CNY", "DAI",
    // exchanges, agencies, corporate titles
    "NYSE", "AMEX", "OTC", "SEC", "FED", "FOMC", "IRS", "CEO", "CFO", "CTO", "COO", "ETF",
    "IPO", "GDP", "CPI", "EPS", "ROI", "PNL", "API", "NFT", "DEX", "CEX",
    // board and internet slang
    "AI", "DD", "IMO", "IMHO", "LOL", "LMAO", "KEK", "YOLO", "FOMO", "HODL", "ATH", "ATL",
    "TLDR", "NGMI", "WAGMI", "GM", "GN", "OP", "ITT", "DCA", "EOD", "EOW", "FUD", "MOASS",
    "BIZ", "DM", "PM", "AM", "OK", "TV", "PC", "US", "USA", "UK", "EU",
    // filler words people shout
    "THE", "AND", "FOR", "NOT", "YOU", "ARE", "BUT", "ALL", "THIS", "THAT", "WHAT", "JUST",
    "WITH", "HAVE", "WILL", "IT", "IS", "IN", "ON", "OF", "TO", "BE", "MY", "NO", "SO", "IF",
    "OR", "AT", "BY", "DO", "GO", "UP", "WE", "ME", "HE", "AN", "AS",
];

static DENYSET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| DENYLIST.iter().copied().collect());

/// Every token that looks like a ticker, in order of appearance. Duplicates are kept.
pub fn extract_candidates(text: &str) -> Vec<&str> {
    RE_TICKER.find_iter(text).map(|m| m.as_str()).collect()
}

pub fn is_plausible(token: &str) -> bool {
    (MIN_LEN..=MAX_LEN).contains(&token.len()) && !DENYSET.contains(token)
}

/// Candidates that survive the plausibility filter.
pub fn extract_symbols(text: &str) -> Vec<&str> {
    extract_candidates(text)
        .into_iter()
        .filter(|tk| is_plausible(tk))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_short_uppercase_words_only() {
        let found = extract_candidates("bought $GME and AMC, skipped TSLAXX and gme and GME2");
        assert_eq!(found, vec!["GME", "AMC"]);
    }

    #[test]
    fn keeps_duplicates_in_order() {
        assert_eq!(extract_candidates("PLTR then BB then PLTR"), vec!["PLTR", "BB", "PLTR"]);
    }

    #[test]
    fn denylist_filters_noise() {
        assert!(!is_plausible("USD"));
        assert!(!is_plausible("YOLO"));
        assert!(!is_plausible("CEO"));
        assert!(is_plausible("SOL"));
        assert!(is_plausible("NVDA"));
    }

    #[test]
    fn length_bounds() {
        assert!(!is_plausible("A"));
        assert!(!is_plausible("ABCDEF"));
        assert!(is_plausible("AB"));
        assert!(is_plausible("ABCDE"));
    }

    #[test]
    fn extract_symbols_drops_implausible_tokens() {
        let found = extract_symbols("THE CEO of NVDA says BUY USD now");
        assert_eq!(found, vec!["NVDA", "BUY"]);
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(extract_symbols("").is_empty());
        assert!(extract_symbols("no tickers here").is_empty());
    }
}
