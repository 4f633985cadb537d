//! capricorn-common: Shared types and errors used across all Capricorn crates.

pub mod error;
pub mod articles;
pub mod journals;
pub mod query;

// Re-export commonly used types
pub use articles::{
    article_link, ActionableEventMatch, ArticleAnalysis, CandidateDocument, ExtractedMetadata,
    ScoreBreakdown, REQUIRED_METADATA_FIELDS,
};
pub use error::{ApiError, ValidationError};
pub use journals::{JournalImpact, JournalImpactTable};
pub use query::SearchQuery;
