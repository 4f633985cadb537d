//! Progressive result streamer.
//!
//! States: searching, emitting ids, processing article i (1..=N), complete.
//! One candidate is processed at a time, in search order, with a fixed pause
//! between candidates. A failed candidate yields a scoped error event and the
//! batch continues. Events go into a bounded channel; once the receiving side
//! is gone the streamer stops, including in the middle of a model call or a
//! backoff wait.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

use capricorn_common::{ArticleAnalysis, CandidateDocument, SearchQuery, ValidationError};
use capricorn_db::CorpusStore;
use capricorn_llm::Sleeper;
use capricorn_ranker::{current_year, score_and_apply};

use crate::error::ExtractionError;
use crate::events::{BatchStatus, StreamEvent, StreamProgress};
use crate::extractor::{ExtractionContext, MetadataExtractor};

/// Body of a streaming retrieval request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamRequest {
    #[serde(default)]
    pub events_text: String,
    #[serde(default)]
    pub methodology_content: Option<String>,
    #[serde(default)]
    pub disease: Option<String>,
    #[serde(default)]
    pub num_articles: Option<usize>,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed { total: usize, failed: usize },
    SearchFailed,
    /// Receiver dropped before the terminal event.
    Cancelled { processed: usize },
}

pub struct ArticleStreamer {
    corpus: Arc<dyn CorpusStore>,
    extractor: MetadataExtractor,
    sleeper: Arc<dyn Sleeper>,
    inter_article_delay: Duration,
    default_articles: usize,
    max_articles: usize,
}

impl ArticleStreamer {
    pub fn new(
        corpus: Arc<dyn CorpusStore>,
        extractor: MetadataExtractor,
        sleeper: Arc<dyn Sleeper>,
        inter_article_delay: Duration,
        default_articles: usize,
        max_articles: usize,
    ) -> Self {
        Self { corpus, extractor, sleeper, inter_article_delay, default_articles, max_articles }
    }

    /// Validate the request and bind it to a search query.
    pub fn build_query(&self, req: &StreamRequest) -> Result<SearchQuery, ValidationError> {
        SearchQuery::build(&req.events_text, req.num_articles, self.default_articles, self.max_articles)
    }

    /// Drive one batch, sending events to `tx` in order.
    #[instrument(skip_all, fields(top_k = query.top_k))]
    pub async fn run(
        &self,
        query: SearchQuery,
        req: &StreamRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> StreamOutcome {
        // Searching
        let search = tokio::select! {
            _ = tx.closed() => return StreamOutcome::Cancelled { processed: 0 },
            r = self.corpus.search(&query) => r,
        };
        let docs = match search {
            Ok(docs) => docs,
            Err(e) => {
                error!(error = %e, "similarity search failed");
                let _ = tx.send(StreamEvent::fatal(format!("Search failed: {}", e))).await;
                return StreamOutcome::SearchFailed;
            }
        };

        // Emitting ids
        let total = docs.len();
        let pmids: Vec<String> = docs.iter().map(|d| d.display_id().to_string()).collect();
        info!(total, ids = ?pmids, "candidates retrieved");
        if tx.send(StreamEvent::Pmids { pmids }).await.is_err() {
            return StreamOutcome::Cancelled { processed: 0 };
        }
        let processing = StreamEvent::Metadata {
            total_articles: total,
            current_article: 0,
            status: BatchStatus::Processing,
        };
        if tx.send(processing).await.is_err() {
            return StreamOutcome::Cancelled { processed: 0 };
        }

        // Processing
        let ctx = ExtractionContext {
            events: &query.text,
            disease: req.disease.as_deref(),
            methodology: req.methodology_content.as_deref(),
        };
        let year = current_year();
        let mut failed = 0usize;

        for (idx, doc) in docs.iter().enumerate() {
            let number = idx + 1;
            if number > 1 {
                tokio::select! {
                    _ = tx.closed() => return self.cancelled(idx),
                    _ = self.sleeper.sleep(self.inter_article_delay) => {}
                }
            }

            let outcome = tokio::select! {
                _ = tx.closed() => return self.cancelled(idx),
                r = self.analyse(doc, &ctx, year) => r,
            };

            let event = match outcome {
                Ok(analysis) => StreamEvent::ArticleAnalysis {
                    progress: StreamProgress { article_number: number, total_articles: total },
                    analysis: Box::new(analysis),
                },
                Err(e) => {
                    failed += 1;
                    warn!(article = %doc.display_id(), number, error = %e, "article failed");
                    StreamEvent::article_error(
                        format!("Failed to analyze article {}: {}", doc.display_id(), e),
                        number,
                        total,
                    )
                }
            };
            if tx.send(event).await.is_err() {
                return self.cancelled(number);
            }
        }

        // Complete
        let complete = StreamEvent::Metadata {
            total_articles: total,
            current_article: total,
            status: BatchStatus::Complete,
        };
        if tx.send(complete).await.is_err() {
            return self.cancelled(total);
        }
        info!(total, failed, "batch complete");
        StreamOutcome::Completed { total, failed }
    }

    async fn analyse(
        &self,
        doc: &CandidateDocument,
        ctx: &ExtractionContext<'_>,
        year: i32,
    ) -> Result<ArticleAnalysis, ExtractionError> {
        let mut meta = self.extractor.extract(doc, ctx).await?;
        score_and_apply(&mut meta, year);
        Ok(ArticleAnalysis { article_metadata: meta, full_article_text: doc.raw_text.clone() })
    }

    fn cancelled(&self, processed: usize) -> StreamOutcome {
        info!(processed, "client disconnected; stopping batch");
        StreamOutcome::Cancelled { processed }
    }
}
