//! Shared test doubles for the Capricorn workspace.
//!
//! - [`MockLlmBackend`]: scripted responses, records every prompt
//! - [`InMemoryCorpusStore`]: fixed search hits and full texts
//! - [`RecordingSleeper`]: records requested delays and returns at once
//! - [`fixtures`]: canned candidates, model responses and journal tables

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use capricorn_common::{CandidateDocument, SearchQuery};
use capricorn_db::{AbstractRecord, CorpusArticle, CorpusStore, DbError, EMBEDDING_DIM};
use capricorn_llm::{LlmBackend, LlmError, LlmRequest, LlmResponse, Sleeper};

pub use pretty_assertions;

// ── Model backend ─────────────────────────────────────────────────────────────

/// Backend returning scripted results in order.
///
/// When the script runs out, calls fail with `Unavailable`, or never
/// resolve if built with [`MockLlmBackend::hang_when_exhausted`].
#[derive(Default)]
pub struct MockLlmBackend {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    hang_when_exhausted: bool,
}

impl MockLlmBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::new();
        for r in responses {
            mock.push_ok(r);
        }
        mock
    }

    pub fn hang_when_exhausted(mut self) -> Self {
        self.hang_when_exhausted = true;
        self
    }

    pub fn push_ok(&self, content: impl Into<String>) {
        self.script.lock().unwrap().push_back(Ok(content.into()));
    }

    pub fn push_err(&self, err: LlmError) {
        self.script.lock().unwrap().push_back(Err(err));
    }

    pub fn push_rate_limited(&self) {
        self.push_err(LlmError::RateLimitExceeded("429 RESOURCE_EXHAUSTED".to_string()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmBackend for MockLlmBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(req.prompt_text());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(content)) => Ok(LlmResponse {
                content,
                model: "mock".to_string(),
                prompt_tokens: 0,
                completion_tokens: 0,
            }),
            Some(Err(e)) => Err(e),
            None if self.hang_when_exhausted => std::future::pending().await,
            None => Err(LlmError::Unavailable("mock script exhausted".to_string())),
        }
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, LlmError> {
        Ok(texts.iter().map(|_| vec![0.0; EMBEDDING_DIM]).collect())
    }

    fn model_id(&self) -> &str {
        "mock"
    }

    fn max_output_tokens(&self) -> usize {
        8_192
    }
}

// ── Corpus store ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryCorpusStore {
    pub candidates: Vec<CandidateDocument>,
    pub articles: Vec<CorpusArticle>,
    pub abstracts: Vec<AbstractRecord>,
    pub fail_search: bool,
}

impl InMemoryCorpusStore {
    pub fn with_candidates(candidates: Vec<CandidateDocument>) -> Self {
        Self { candidates, ..Default::default() }
    }

    pub fn failing() -> Self {
        Self { fail_search: true, ..Default::default() }
    }
}

#[async_trait]
impl CorpusStore for InMemoryCorpusStore {
    async fn search(&self, query: &SearchQuery) -> capricorn_db::Result<Vec<CandidateDocument>> {
        if self.fail_search {
            return Err(DbError::InvalidQuery("corpus unavailable".to_string()));
        }
        let mut hits: Vec<CandidateDocument> = self
            .candidates
            .iter()
            .filter(|c| !c.raw_text.trim().is_empty())
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.similarity_distance.total_cmp(&b.similarity_distance));
        hits.truncate(query.top_k);
        Ok(hits)
    }

    async fn fetch_full_texts(&self, external_ids: &[String]) -> capricorn_db::Result<Vec<CorpusArticle>> {
        let wanted = capricorn_db::corpus::normalise_ids(external_ids);
        Ok(self
            .articles
            .iter()
            .filter(|a| wanted.contains(&a.external_id.to_uppercase()))
            .cloned()
            .collect())
    }

    async fn fetch_abstracts(&self, external_ids: &[String]) -> capricorn_db::Result<Vec<AbstractRecord>> {
        let wanted = capricorn_db::corpus::normalise_ids(external_ids);
        Ok(self
            .abstracts
            .iter()
            .filter(|a| wanted.contains(&a.pmid.to_uppercase()))
            .cloned()
            .collect())
    }
}

// ── Sleeper ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
}

// ── Fixtures ──────────────────────────────────────────────────────────────────

pub mod fixtures {
    use capricorn_common::{CandidateDocument, JournalImpactTable};
    use capricorn_db::CorpusArticle;
    use serde_json::json;

    pub fn candidate(pmid: &str, distance: f64) -> CandidateDocument {
        CandidateDocument {
            corpus_id: format!("PMC{}", pmid),
            external_id: Some(pmid.to_string()),
            raw_text: format!("Full text of article {}", pmid),
            similarity_distance: distance,
        }
    }

    pub fn candidates(n: usize) -> Vec<CandidateDocument> {
        (1..=n).map(|i| candidate(&format!("{}", 1000 + i), i as f64 * 0.1)).collect()
    }

    pub fn corpus_article(pmid: &str) -> CorpusArticle {
        CorpusArticle {
            external_id: pmid.to_string(),
            corpus_id: format!("PMC{}", pmid),
            title: Some(format!("Article {}", pmid)),
            content: format!("Full text of article {}", pmid),
        }
    }

    pub fn journal_table() -> JournalImpactTable {
        vec![
            ("Blood".to_string(), 5.5),
            ("Journal of Clinical Oncology".to_string(), 10.4),
            ("Pediatric Blood & Cancer".to_string(), 1.1),
        ]
        .into_iter()
        .collect()
    }

    /// A well-formed extraction answer wrapped in prose and a code fence.
    pub fn metadata_response(title: &str) -> String {
        let body = json!({
            "article_metadata": {
                "title": title,
                "year": "2023",
                "journal_title": "Blood",
                "journal_sjr": 0,
                "disease_focus": true,
                "pediatric_focus": true,
                "type_of_disease": "JMML",
                "disease_match": true,
                "paper_type": "Clinical Trial",
                "actionable_events": [
                    {"event": "NRAS", "matches_query": true},
                    {"event": "NRAS G12D", "matches_query": true}
                ],
                "drugs_tested": true,
                "drug_results": ["trametinib: partial response"],
                "treatment_shown": false
            }
        });
        format!("Here is the analysis:\n```json\n{}\n```", body)
    }

    /// An answer missing `paper_type`.
    pub fn incomplete_response() -> String {
        json!({
            "article_metadata": {
                "title": "Incomplete",
                "journal_title": "Blood",
                "journal_sjr": 1.0,
                "type_of_disease": "ALL",
                "actionable_events": []
            }
        })
        .to_string()
    }
}
