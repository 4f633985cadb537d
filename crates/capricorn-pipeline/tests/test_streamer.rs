//! End-to-end streamer runs against in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use capricorn_common::JournalImpactTable;
use capricorn_llm::LlmError;
use capricorn_pipeline::{
    ArticleStreamer, BatchStatus, ExtractorSettings, MetadataExtractor, StreamEvent, StreamOutcome,
    StreamRequest,
};
use capricorn_test_utils::fixtures::{candidates, incomplete_response, journal_table, metadata_response};
use capricorn_test_utils::pretty_assertions::assert_eq;
use capricorn_test_utils::{InMemoryCorpusStore, MockLlmBackend, RecordingSleeper};

const DELAY: Duration = Duration::from_secs(5);

fn streamer(
    backend: Arc<MockLlmBackend>,
    corpus: InMemoryCorpusStore,
    sleeper: Arc<RecordingSleeper>,
) -> ArticleStreamer {
    let journals: Arc<JournalImpactTable> = Arc::new(journal_table());
    let extractor = MetadataExtractor::new(backend, journals, sleeper.clone(), ExtractorSettings::default());
    ArticleStreamer::new(Arc::new(corpus), extractor, sleeper, DELAY, 15, 50)
}

fn request(n: usize) -> StreamRequest {
    StreamRequest {
        events_text: "NRAS G12D".to_string(),
        disease: Some("JMML".to_string()),
        num_articles: Some(n),
        ..Default::default()
    }
}

async fn collect(streamer: &ArticleStreamer, req: StreamRequest) -> (StreamOutcome, Vec<StreamEvent>) {
    let query = streamer.build_query(&req).unwrap();
    let (tx, mut rx) = mpsc::channel(64);
    let outcome = streamer.run(query, &req, tx).await;
    let mut events = Vec::new();
    while let Some(ev) = rx.recv().await {
        events.push(ev);
    }
    (outcome, events)
}

#[tokio::test]
async fn test_two_failures_in_five_yield_eight_ordered_events() {
    let backend = Arc::new(MockLlmBackend::new());
    backend.push_ok(metadata_response("one"));
    backend.push_ok("I am unable to analyse this article.");
    backend.push_ok(metadata_response("three"));
    backend.push_ok(incomplete_response());
    backend.push_ok(metadata_response("five"));

    let sleeper = Arc::new(RecordingSleeper::new());
    let s = streamer(backend.clone(), InMemoryCorpusStore::with_candidates(candidates(5)), sleeper.clone());
    let (outcome, events) = collect(&s, request(5)).await;

    assert_eq!(outcome, StreamOutcome::Completed { total: 5, failed: 2 });
    assert_eq!(events.len(), 8);

    assert_eq!(
        events[0],
        StreamEvent::Pmids { pmids: vec!["1001".into(), "1002".into(), "1003".into(), "1004".into(), "1005".into()] }
    );
    assert_eq!(
        events[1],
        StreamEvent::Metadata { total_articles: 5, current_article: 0, status: BatchStatus::Processing }
    );

    let kinds: Vec<(&str, usize)> = events[2..7]
        .iter()
        .map(|e| match e {
            StreamEvent::ArticleAnalysis { progress, .. } => ("analysis", progress.article_number),
            StreamEvent::Error { article_number: Some(n), .. } => ("error", *n),
            other => panic!("unexpected event {:?}", other),
        })
        .collect();
    assert_eq!(
        kinds,
        vec![("analysis", 1), ("error", 2), ("analysis", 3), ("error", 4), ("analysis", 5)]
    );

    assert_eq!(
        events[7],
        StreamEvent::Metadata { total_articles: 5, current_article: 5, status: BatchStatus::Complete }
    );

    // Paced between articles, never before the first
    assert_eq!(sleeper.delays(), vec![DELAY; 4]);
    assert_eq!(backend.calls(), 5);
}

#[tokio::test]
async fn test_analysis_is_scored_and_stamped() {
    let backend = Arc::new(MockLlmBackend::with_responses([metadata_response("NRAS in JMML")]));
    let sleeper = Arc::new(RecordingSleeper::new());
    let s = streamer(backend, InMemoryCorpusStore::with_candidates(candidates(1)), sleeper);
    let (_, events) = collect(&s, request(1)).await;

    let StreamEvent::ArticleAnalysis { analysis, .. } = &events[2] else {
        panic!("expected article analysis, got {:?}", events[2]);
    };
    let meta = &analysis.article_metadata;
    assert_eq!(meta.pmid.as_deref(), Some("1001"));
    assert_eq!(meta.link.as_deref(), Some("https://pubmed.ncbi.nlm.nih.gov/1001/"));
    // Model left journal_sjr at 0; the reference table supplies Blood's score.
    assert_eq!(meta.journal_sjr, 5.5);

    let breakdown = meta.point_breakdown.as_ref().unwrap();
    assert_eq!(meta.overall_points, Some(breakdown.total()));
    assert_eq!(breakdown.get("actionable_events"), Some(30.0));
    assert_eq!(breakdown.get("paper_type"), Some(40.0));
    assert_eq!(analysis.full_article_text, "Full text of article 1001");
}

#[tokio::test]
async fn test_search_failure_is_single_error_event() {
    let backend = Arc::new(MockLlmBackend::new());
    let sleeper = Arc::new(RecordingSleeper::new());
    let s = streamer(backend.clone(), InMemoryCorpusStore::failing(), sleeper);
    let (outcome, events) = collect(&s, request(3)).await;

    assert_eq!(outcome, StreamOutcome::SearchFailed);
    assert_eq!(events.len(), 1);
    assert!(events[0].is_terminal());
    assert!(matches!(&events[0], StreamEvent::Error { article_number: None, message, .. } if message.starts_with("Search failed")));
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_empty_search_still_completes() {
    let backend = Arc::new(MockLlmBackend::new());
    let sleeper = Arc::new(RecordingSleeper::new());
    let s = streamer(backend, InMemoryCorpusStore::default(), sleeper);
    let (outcome, events) = collect(&s, request(3)).await;

    assert_eq!(outcome, StreamOutcome::Completed { total: 0, failed: 0 });
    assert_eq!(events.len(), 3);
    assert_eq!(events[0], StreamEvent::Pmids { pmids: vec![] });
}

#[tokio::test]
async fn test_rate_limit_is_retried_not_reported() {
    let backend = Arc::new(MockLlmBackend::new());
    backend.push_rate_limited();
    backend.push_rate_limited();
    backend.push_ok(metadata_response("after backoff"));

    let sleeper = Arc::new(RecordingSleeper::new());
    let s = streamer(backend.clone(), InMemoryCorpusStore::with_candidates(candidates(1)), sleeper.clone());
    let (outcome, events) = collect(&s, request(1)).await;

    assert_eq!(outcome, StreamOutcome::Completed { total: 1, failed: 0 });
    assert!(matches!(events[2], StreamEvent::ArticleAnalysis { .. }));
    assert_eq!(sleeper.delays(), vec![Duration::from_secs(5), Duration::from_secs(10)]);
    assert_eq!(backend.calls(), 3);
}

#[tokio::test]
async fn test_non_rate_limit_error_fails_only_that_article() {
    let backend = Arc::new(MockLlmBackend::new());
    backend.push_err(LlmError::ApiError { status: 500, message: "internal".into() });
    backend.push_ok(metadata_response("second"));

    let sleeper = Arc::new(RecordingSleeper::new());
    let s = streamer(backend.clone(), InMemoryCorpusStore::with_candidates(candidates(2)), sleeper);
    let (outcome, events) = collect(&s, request(2)).await;

    assert_eq!(outcome, StreamOutcome::Completed { total: 2, failed: 1 });
    assert!(matches!(&events[2], StreamEvent::Error { article_number: Some(1), message, .. } if message.contains("1001")));
    assert!(matches!(events[3], StreamEvent::ArticleAnalysis { .. }));
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_disconnect_stops_generation() {
    let backend = Arc::new(MockLlmBackend::with_responses([metadata_response("first")]).hang_when_exhausted());
    let sleeper = Arc::new(RecordingSleeper::new());
    let s = Arc::new(streamer(backend.clone(), InMemoryCorpusStore::with_candidates(candidates(5)), sleeper));

    let req = request(5);
    let query = s.build_query(&req).unwrap();
    let (tx, mut rx) = mpsc::channel(1);
    let runner = {
        let s = s.clone();
        tokio::spawn(async move { s.run(query, &req, tx).await })
    };

    // pmids, processing, first article
    for _ in 0..3 {
        rx.recv().await.unwrap();
    }
    drop(rx);

    let outcome = tokio::time::timeout(Duration::from_secs(5), runner).await.unwrap().unwrap();
    assert!(matches!(outcome, StreamOutcome::Cancelled { .. }));
    // The second call was in flight when the client left; no third call is made.
    assert!(backend.calls() <= 2);
}

#[tokio::test]
async fn test_num_articles_clamped_and_validated() {
    let backend = Arc::new(MockLlmBackend::new());
    let sleeper = Arc::new(RecordingSleeper::new());
    let s = streamer(backend, InMemoryCorpusStore::default(), sleeper);

    assert_eq!(s.build_query(&request(500)).unwrap().top_k, 50);
    let unset = StreamRequest { events_text: "NRAS G12D".into(), ..Default::default() };
    assert_eq!(s.build_query(&unset).unwrap().top_k, 15);
    assert!(s.build_query(&request(0)).is_err());
    let blank = StreamRequest { events_text: "  ".into(), ..Default::default() };
    assert_eq!(s.build_query(&blank).unwrap_err().to_string(), "Missing required fields: events_text");
}
