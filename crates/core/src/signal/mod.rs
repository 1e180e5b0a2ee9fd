pub mod features;
pub mod params;
pub mod scoring;

pub use features::FeatureCalculator;
pub use params::{EngineConfig, FeatureParams, ViewConfig};
pub use scoring::{ScoreWeights, SmallCapBoost};
