//! Disease and actionable-event extraction from free-text case notes.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use capricorn_common::ValidationError;
use capricorn_llm::audit::complete_with_audit;
use capricorn_llm::{LlmBackend, LlmRequest, RetryPolicy, Sleeper};

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionKind {
    #[default]
    Disease,
    Events,
}

impl FromStr for ExtractionKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disease" => Ok(ExtractionKind::Disease),
            "events" => Ok(ExtractionKind::Events),
            other => Err(ValidationError::InvalidField {
                field: "extraction_type",
                reason: format!("unsupported extraction type: {}", other),
            }),
        }
    }
}

impl ExtractionKind {
    fn input_label(self) -> &'static str {
        match self {
            ExtractionKind::Disease => "Case notes",
            ExtractionKind::Events => "Case input",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseInfo {
    pub disease: String,
    pub events: Vec<String>,
}

/// Split a `"EVENT A" "EVENT B"` style answer into events. Quotes, commas
/// and surrounding whitespace are separators.
pub fn parse_events(text: &str) -> Vec<String> {
    text.split('"')
        .map(|part| part.trim_matches(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | ',')))
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

pub struct CaseInfoExtractor {
    backend: Arc<dyn LlmBackend>,
    sleeper: Arc<dyn Sleeper>,
    retry: RetryPolicy,
}

impl CaseInfoExtractor {
    pub fn new(backend: Arc<dyn LlmBackend>, sleeper: Arc<dyn Sleeper>, retry: RetryPolicy) -> Self {
        Self { backend, sleeper, retry }
    }

    #[instrument(skip(self, prompt_content, text), fields(kind = ?kind))]
    pub async fn extract(
        &self,
        kind: ExtractionKind,
        prompt_content: &str,
        text: &str,
    ) -> Result<CaseInfo, PipelineError> {
        let prompt = format!("{}\n\n{}:\n{}", prompt_content.trim(), kind.input_label(), text.trim());
        let req = LlmRequest::user(prompt)
            .with_temperature(1.0)
            .with_top_p(0.95)
            .with_max_tokens(8192);

        let resp = self
            .retry
            .run(self.sleeper.as_ref(), || {
                complete_with_audit(self.backend.as_ref(), req.clone(), "case_info_extraction")
            })
            .await?;
        let answer = resp.content.trim();

        let info = match kind {
            ExtractionKind::Disease => CaseInfo { disease: answer.to_string(), events: Vec::new() },
            ExtractionKind::Events => CaseInfo { disease: String::new(), events: parse_events(answer) },
        };
        info!(events = info.events.len(), "case info extracted");
        Ok(info)
    }
}
