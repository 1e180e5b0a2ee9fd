use crate::domain::snapshot::{MentionCounts, SourceCounts};
use crate::extract::symbols::extract_symbols;
use crate::ingest::types::RawText;

/// Plausible-mention counts for one cycle, in total and split by source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MentionTally {
    pub totals: MentionCounts,
    pub per_source: SourceCounts,
}

impl MentionTally {
    pub fn from_texts<'a, I>(texts: I) -> Self
    where
        I: IntoIterator<Item = &'a RawText>,
    {
        let mut tally = Self::default();
        for raw in texts {
            tally.record(&raw.source_id, &raw.text);
        }
        tally
    }

    pub fn record(&mut self, source_id: &str, text: &str) {
        for symbol in extract_symbols(text) {
            *self.totals.entry(symbol.to_string()).or_insert(0) += 1;
            *self
                .per_source
                .entry(source_id.to_string())
                .or_default()
                .entry(symbol.to_string())
                .or_insert(0) += 1;
        }
    }

    pub fn total_mentions(&self) -> u64 {
        self.totals.values().map(|c| u64::from(*c)).sum()
    }

    /// How many distinct sources mentioned `symbol` at least once.
    pub fn source_count(&self, symbol: &str) -> usize {
        self.per_source
            .values()
            .filter(|counts| counts.get(symbol).copied().unwrap_or(0) > 0)
            .count()
    }

    /// Symbols with at least `min_mentions` mentions, in symbol order.
    pub fn at_least(&self, min_mentions: u32) -> impl Iterator<Item = (&str, u32)> {
        self.totals
            .iter()
            .filter(move |(_, c)| **c >= min_mentions)
            .map(|(s, c)| (s.as_str(), *c))
    }
}
