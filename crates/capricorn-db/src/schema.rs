//! Table layout.
//!
//! Table names come from configuration and are validated as SQL identifiers
//! before they reach this module.

/// text-embedding-004 output width.
pub const EMBEDDING_DIM: usize = 768;

/// DDL for the corpus and journal tables.
pub fn create_statements(articles_table: &str, journal_table: &str) -> String {
    format!(
        "CREATE EXTENSION IF NOT EXISTS vector;
         CREATE TABLE IF NOT EXISTS {articles} (
             corpus_id  TEXT PRIMARY KEY,
             pmid       TEXT,
             title      TEXT,
             abstract   TEXT,
             content    TEXT NOT NULL,
             embedding  vector({dim}) NOT NULL
         );
         CREATE INDEX IF NOT EXISTS {articles_idx}_pmid_upper ON {articles} (UPPER(pmid));
         CREATE INDEX IF NOT EXISTS {articles_idx}_embedding ON {articles}
             USING hnsw (embedding vector_cosine_ops);
         CREATE TABLE IF NOT EXISTS {journals} (
             title TEXT NOT NULL,
             sjr   DOUBLE PRECISION NOT NULL
         );",
        articles = articles_table,
        articles_idx = index_prefix(articles_table),
        journals = journal_table,
        dim = EMBEDDING_DIM,
    )
}

/// Index names cannot be schema-qualified.
fn index_prefix(table: &str) -> String {
    table.replace('.', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_use_configured_tables() {
        let ddl = create_statements("corpus.articles", "journal_rank");
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS corpus.articles"));
        assert!(ddl.contains("corpus_articles_embedding ON corpus.articles"));
        assert!(ddl.contains("vector(768)"));
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS journal_rank"));
    }
}
