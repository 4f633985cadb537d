//! Capricorn storage layer.
//!
//! PostgreSQL with the pgvector extension holds the article corpus (full text,
//! abstract, embedding) and the journal impact reference table.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use capricorn_db::{Database, load_journal_impact_table};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Arc::new(Database::connect("postgres://localhost/capricorn").await?);
//!     let journals = load_journal_impact_table(&db, "journal_rank").await?;
//!     println!("{} journals", journals.len());
//!     Ok(())
//! }
//! ```

pub mod database;
pub mod error;
pub mod schema;
pub mod corpus;
pub mod journals;

pub use corpus::{AbstractRecord, CorpusArticle, CorpusStore, PgCorpusStore};
pub use database::Database;
pub use error::{DbError, Result};
pub use journals::load_journal_impact_table;
pub use schema::EMBEDDING_DIM;
