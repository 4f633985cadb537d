//! capricorn-ranker: article relevance scoring.
//! Turns extracted metadata into a point total with a per-factor breakdown.

pub mod scorer;
pub mod normalise;
pub mod weights;

pub use scorer::{current_year, score, score_and_apply};
pub use weights::ScoringWeights;
