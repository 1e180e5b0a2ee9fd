//! Turning raw discussion text into per-cycle mention counts.

pub mod counter;
pub mod symbols;
pub mod text;

pub use counter::MentionTally;
pub use symbols::{extract_candidates, extract_symbols, is_plausible};
