//! Pipeline error types.

use thiserror::Error;

use capricorn_common::{ApiError, ValidationError};
use capricorn_db::DbError;
use capricorn_llm::LlmError;

use crate::json_extract::JsonExtractError;

/// Failure to turn one candidate into scored metadata. Scoped to that
/// candidate; the batch continues.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("model call failed: {0}")]
    Llm(#[from] LlmError),
    #[error("unusable model response: {0}")]
    Parse(#[from] JsonExtractError),
}

/// Request-level failure.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Corpus store error: {0}")]
    Corpus(#[from] DbError),
    #[error("Model call failed: {0}")]
    Llm(#[from] LlmError),
    #[error("Unusable model response: {0}")]
    Parse(#[from] JsonExtractError),
    #[error("Failed to retrieve any of the requested articles")]
    NoArticlesResolved,
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(v) => ApiError::Validation(v),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}
