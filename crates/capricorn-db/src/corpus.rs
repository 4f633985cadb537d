//! Article corpus: similarity search and identifier lookups.

use std::sync::Arc;

use async_trait::async_trait;
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use capricorn_common::{CandidateDocument, SearchQuery};
use capricorn_llm::LlmBackend;

use crate::database::Database;
use crate::error::{DbError, Result};
use crate::schema::EMBEDDING_DIM;

/// Full text resolved by external identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusArticle {
    pub external_id: String,
    pub corpus_id: String,
    pub title: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbstractRecord {
    pub pmid: String,
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
}

/// Read access to the literature corpus.
#[async_trait]
pub trait CorpusStore: Send + Sync {
    /// Up to `query.top_k` documents ordered by ascending distance, each with
    /// non-empty text.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<CandidateDocument>>;

    /// Full texts for the given external identifiers (case-insensitive).
    /// Unknown identifiers are simply absent from the result.
    async fn fetch_full_texts(&self, external_ids: &[String]) -> Result<Vec<CorpusArticle>>;

    /// Title and abstract for the given external identifiers.
    async fn fetch_abstracts(&self, external_ids: &[String]) -> Result<Vec<AbstractRecord>>;
}

/// Trim, upper-case and de-duplicate identifiers, preserving first-seen order.
pub fn normalise_ids(ids: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        let id = id.trim().to_uppercase();
        if !id.is_empty() && !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// Postgres + pgvector corpus. Queries are embedded through the model
/// backend, then ranked by cosine distance.
pub struct PgCorpusStore {
    db: Arc<Database>,
    embedder: Arc<dyn LlmBackend>,
    table: String,
}

impl PgCorpusStore {
    pub fn new(db: Arc<Database>, embedder: Arc<dyn LlmBackend>, table: impl Into<String>) -> Self {
        Self { db, embedder, table: table.into() }
    }

    async fn embed_query(&self, text: &str) -> Result<Vector> {
        let mut vectors = self.embedder.embed(vec![text.to_string()]).await?;
        let embedding = vectors.pop().unwrap_or_default();
        if embedding.len() != EMBEDDING_DIM {
            return Err(DbError::InvalidEmbeddingDimension {
                expected: EMBEDDING_DIM,
                actual: embedding.len(),
            });
        }
        Ok(Vector::from(embedding))
    }
}

#[async_trait]
impl CorpusStore for PgCorpusStore {
    #[instrument(skip(self, query), fields(top_k = query.top_k))]
    async fn search(&self, query: &SearchQuery) -> Result<Vec<CandidateDocument>> {
        let limit = i64::try_from(query.top_k)
            .map_err(|_| DbError::InvalidQuery(format!("top_k out of range: {}", query.top_k)))?;
        let embedding = self.embed_query(&query.text).await?;

        let sql = format!(
            "SELECT corpus_id, pmid, content, (embedding <=> $1)::float8 AS distance
             FROM {}
             WHERE content <> ''
             ORDER BY embedding <=> $1
             LIMIT $2",
            self.table
        );
        let rows = self.db.client().query(&sql, &[&embedding, &limit]).await?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let raw_text: String = row.try_get("content")?;
            if raw_text.trim().is_empty() {
                continue;
            }
            docs.push(CandidateDocument {
                corpus_id: row.try_get("corpus_id")?,
                external_id: row.try_get::<_, Option<String>>("pmid")?,
                raw_text,
                similarity_distance: row.try_get("distance")?,
            });
        }
        debug!(hits = docs.len(), "similarity search complete");
        Ok(docs)
    }

    #[instrument(skip(self, external_ids), fields(requested = external_ids.len()))]
    async fn fetch_full_texts(&self, external_ids: &[String]) -> Result<Vec<CorpusArticle>> {
        let ids = normalise_ids(external_ids);
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT corpus_id, pmid, title, content FROM {} WHERE UPPER(pmid) = ANY($1)",
            self.table
        );
        let rows = self.db.client().query(&sql, &[&ids]).await?;

        rows.into_iter()
            .map(|row| {
                Ok(CorpusArticle {
                    external_id: row.try_get("pmid")?,
                    corpus_id: row.try_get("corpus_id")?,
                    title: row.try_get("title")?,
                    content: row.try_get("content")?,
                })
            })
            .collect()
    }

    #[instrument(skip(self, external_ids), fields(requested = external_ids.len()))]
    async fn fetch_abstracts(&self, external_ids: &[String]) -> Result<Vec<AbstractRecord>> {
        let ids = normalise_ids(external_ids);
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT pmid, title, abstract FROM {} WHERE UPPER(pmid) = ANY($1)",
            self.table
        );
        let rows = self.db.client().query(&sql, &[&ids]).await?;

        rows.into_iter()
            .map(|row| {
                Ok(AbstractRecord {
                    pmid: row.try_get("pmid")?,
                    title: row.try_get("title")?,
                    abstract_text: row.try_get("abstract")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_ids() {
        let ids = vec![
            " 123 ".to_string(),
            "pmc9".to_string(),
            "".to_string(),
            "123".to_string(),
        ];
        assert_eq!(normalise_ids(&ids), vec!["123".to_string(), "PMC9".to_string()]);
    }

    #[test]
    fn test_abstract_serialises_with_abstract_key() {
        let rec = AbstractRecord {
            pmid: "1".into(),
            title: Some("t".into()),
            abstract_text: Some("a".into()),
        };
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["abstract"], "a");
    }
}
