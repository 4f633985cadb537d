//! Per-article metadata extraction.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use capricorn_common::{CandidateDocument, ExtractedMetadata, JournalImpactTable};
use capricorn_config::PipelineConfig;
use capricorn_llm::audit::complete_with_audit;
use capricorn_llm::{LlmBackend, LlmRequest, RetryPolicy, Sleeper};

use crate::error::ExtractionError;
use crate::json_extract::extract_metadata;
use crate::prompt::build_extraction_prompt;

/// Generation settings for extraction calls.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorSettings {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    pub retry: RetryPolicy,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            top_p: 0.95,
            max_output_tokens: 8192,
            retry: RetryPolicy::default(),
        }
    }
}

impl ExtractorSettings {
    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self {
            temperature: cfg.temperature,
            top_p: cfg.top_p,
            max_output_tokens: cfg.max_output_tokens,
            retry: RetryPolicy::new(cfg.retry_base_delay(), cfg.retry_max_delay()),
        }
    }
}

/// Case context shared by every article in a batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractionContext<'a> {
    pub events: &'a str,
    pub disease: Option<&'a str>,
    pub methodology: Option<&'a str>,
}

pub struct MetadataExtractor {
    backend: Arc<dyn LlmBackend>,
    journals: Arc<JournalImpactTable>,
    sleeper: Arc<dyn Sleeper>,
    settings: ExtractorSettings,
}

impl MetadataExtractor {
    pub fn new(
        backend: Arc<dyn LlmBackend>,
        journals: Arc<JournalImpactTable>,
        sleeper: Arc<dyn Sleeper>,
        settings: ExtractorSettings,
    ) -> Self {
        Self { backend, journals, sleeper, settings }
    }

    /// Prompt the model for one candidate and parse the result.
    ///
    /// Rate limits are retried with backoff; any other model error, or an
    /// unusable response, fails this candidate only.
    #[instrument(skip(self, doc, ctx), fields(article = %doc.display_id()))]
    pub async fn extract(
        &self,
        doc: &CandidateDocument,
        ctx: &ExtractionContext<'_>,
    ) -> Result<ExtractedMetadata, ExtractionError> {
        let prompt = build_extraction_prompt(
            &doc.raw_text,
            ctx.methodology,
            ctx.disease,
            ctx.events,
            &self.journals,
        );
        debug!(chars = doc.raw_text.len(), prompt_chars = prompt.len(), "extracting metadata");

        let req = LlmRequest::user(prompt)
            .with_temperature(self.settings.temperature)
            .with_top_p(self.settings.top_p)
            .with_max_tokens(self.settings.max_output_tokens);

        let resp = self
            .settings
            .retry
            .run(self.sleeper.as_ref(), || {
                complete_with_audit(self.backend.as_ref(), req.clone(), "metadata_extraction")
            })
            .await?;

        let mut meta = match extract_metadata(&resp.content) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "model response rejected");
                return Err(e.into());
            }
        };

        self.fill_journal_score(&mut meta);
        meta.stamp_identifier(doc.display_id());
        info!(title = %meta.title, journal = %meta.journal_title, "metadata extracted");
        Ok(meta)
    }

    /// Use the reference table when the model left the journal score at zero.
    fn fill_journal_score(&self, meta: &mut ExtractedMetadata) {
        if meta.journal_sjr > 0.0 || meta.journal_title.trim().is_empty() {
            return;
        }
        if let Some(sjr) = self.journals.lookup(&meta.journal_title) {
            debug!(journal = %meta.journal_title, sjr, "journal score from reference table");
            meta.journal_sjr = sjr;
        }
    }
}
