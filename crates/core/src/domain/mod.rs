pub mod asset;
pub mod candidate;
pub mod snapshot;
