//! Shared application state for the web server.

use std::sync::Arc;

use capricorn_common::JournalImpactTable;
use capricorn_config::Config;
use capricorn_db::CorpusStore;
use capricorn_llm::{LlmBackend, RetryPolicy, Sleeper};
use capricorn_pipeline::{
    ArticleStreamer, CaseInfoExtractor, ExtractorSettings, FinalAnalysisAssembler, MetadataExtractor,
};

/// Shared state injected into every Axum handler. Everything here is
/// read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn LlmBackend>,
    pub corpus: Arc<dyn CorpusStore>,
    pub journals: Arc<JournalImpactTable>,
    pub sleeper: Arc<dyn Sleeper>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        backend: Arc<dyn LlmBackend>,
        corpus: Arc<dyn CorpusStore>,
        journals: JournalImpactTable,
        sleeper: Arc<dyn Sleeper>,
        config: Config,
    ) -> Self {
        Self {
            backend,
            corpus,
            journals: Arc::new(journals),
            sleeper,
            config: Arc::new(config),
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        let p = &self.config.pipeline;
        RetryPolicy::new(p.retry_base_delay(), p.retry_max_delay())
    }

    /// Streamer for one request.
    pub fn article_streamer(&self) -> ArticleStreamer {
        let p = &self.config.pipeline;
        let extractor = MetadataExtractor::new(
            self.backend.clone(),
            self.journals.clone(),
            self.sleeper.clone(),
            ExtractorSettings::from_config(p),
        );
        ArticleStreamer::new(
            self.corpus.clone(),
            extractor,
            self.sleeper.clone(),
            p.inter_article_delay(),
            p.default_num_articles,
            p.max_num_articles,
        )
    }

    pub fn analysis_assembler(&self) -> FinalAnalysisAssembler {
        let a = &self.config.analysis;
        FinalAnalysisAssembler::new(
            self.corpus.clone(),
            self.backend.clone(),
            self.sleeper.clone(),
            self.retry_policy(),
            a.variant,
            a.max_output_tokens,
        )
    }

    pub fn case_info_extractor(&self) -> CaseInfoExtractor {
        CaseInfoExtractor::new(self.backend.clone(), self.sleeper.clone(), self.retry_policy())
    }
}

pub type SharedState = Arc<AppState>;
