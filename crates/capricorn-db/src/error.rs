//! Database error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Query embedding failed: {0}")]
    Embedding(#[from] capricorn_llm::LlmError),

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    InvalidEmbeddingDimension { expected: usize, actual: usize },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}
