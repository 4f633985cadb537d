//! Final analysis across all scored articles.
//!
//! Articles are identified by external id (PMID). Full texts are resolved in
//! one batch; unresolved ids are dropped with a warning, but if none resolve
//! the request fails. A single generation call then produces either a
//! structured JSON analysis or a markdown report, depending on configuration.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use capricorn_common::{article_link, ActionableEventMatch, ValidationError};
use capricorn_config::AnalysisVariant;
use capricorn_db::{CorpusArticle, CorpusStore};
use capricorn_llm::audit::complete_with_audit;
use capricorn_llm::{LlmBackend, LlmRequest, RetryPolicy, Sleeper};

use crate::error::PipelineError;
use crate::json_extract::{extract_json, JsonExtractError};

const SEPARATOR_WIDTH: usize = 80;

/// A previously scored article as sent back by the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedArticle {
    #[serde(default, alias = "PMID")]
    pub pmid: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub journal_title: Option<String>,
    #[serde(default)]
    pub journal_sjr: Option<f64>,
    #[serde(default)]
    pub year: Option<Value>,
    #[serde(default)]
    pub paper_type: Option<String>,
    #[serde(default, alias = "type_of_cancer")]
    pub type_of_disease: Option<String>,
    #[serde(default, alias = "actionable_events")]
    pub events: Vec<ActionableEventMatch>,
    #[serde(default)]
    pub drug_results: Vec<String>,
    #[serde(default)]
    pub overall_points: Option<f64>,
}

impl AnalyzedArticle {
    fn id(&self) -> Option<&str> {
        self.pmid.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}

/// Body of a final analysis request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub case_notes: Option<String>,
    #[serde(default)]
    pub disease: Option<String>,
    #[serde(default)]
    pub events: Option<Vec<String>>,
    #[serde(default)]
    pub analyzed_articles: Option<Vec<AnalyzedArticle>>,
}

/// Validated analysis input.
#[derive(Debug, Clone)]
pub struct CaseForAnalysis {
    pub case_notes: String,
    pub disease: String,
    pub events: Vec<String>,
    pub articles: Vec<AnalyzedArticle>,
}

fn present(s: &Option<String>) -> bool {
    s.as_deref().is_some_and(|s| !s.trim().is_empty())
}

impl AnalysisRequest {
    /// Every missing or empty field is reported at once.
    pub fn validate(self) -> Result<CaseForAnalysis, ValidationError> {
        let checks = [
            ("case_notes", !present(&self.case_notes)),
            ("disease", !present(&self.disease)),
            ("events", !self.events.as_ref().is_some_and(|e| !e.is_empty())),
            ("analyzed_articles", !self.analyzed_articles.as_ref().is_some_and(|a| !a.is_empty())),
        ];
        if let Some(err) = ValidationError::missing(checks) {
            return Err(err);
        }
        Ok(CaseForAnalysis {
            case_notes: self.case_notes.unwrap_or_default(),
            disease: self.disease.unwrap_or_default(),
            events: self.events.unwrap_or_default(),
            articles: self.analyzed_articles.unwrap_or_default(),
        })
    }
}

/// Article metadata joined with its full text.
#[derive(Debug, Clone)]
struct ResolvedArticle<'a> {
    meta: &'a AnalyzedArticle,
    pmid: &'a str,
    source: CorpusArticle,
}

pub struct FinalAnalysisAssembler {
    corpus: Arc<dyn CorpusStore>,
    backend: Arc<dyn LlmBackend>,
    sleeper: Arc<dyn Sleeper>,
    retry: RetryPolicy,
    variant: AnalysisVariant,
    max_output_tokens: u32,
}

impl FinalAnalysisAssembler {
    pub fn new(
        corpus: Arc<dyn CorpusStore>,
        backend: Arc<dyn LlmBackend>,
        sleeper: Arc<dyn Sleeper>,
        retry: RetryPolicy,
        variant: AnalysisVariant,
        max_output_tokens: u32,
    ) -> Self {
        Self { corpus, backend, sleeper, retry, variant, max_output_tokens }
    }

    pub fn variant(&self) -> AnalysisVariant {
        self.variant
    }

    #[instrument(skip_all, fields(articles = case.articles.len(), variant = ?self.variant))]
    pub async fn assemble(&self, case: &CaseForAnalysis) -> Result<Value, PipelineError> {
        let resolved = self.resolve(&case.articles).await?;
        let prompt = build_analysis_prompt(case, &resolved, self.variant);

        let req = LlmRequest::user(prompt)
            .with_temperature(0.0)
            .with_top_p(0.95)
            .with_max_tokens(self.max_output_tokens);
        let resp = self
            .retry
            .run(self.sleeper.as_ref(), || {
                complete_with_audit(self.backend.as_ref(), req.clone(), "final_analysis")
            })
            .await?;

        match self.variant {
            AnalysisVariant::Structured => match extract_json(&resp.content)? {
                obj @ Value::Object(_) => Ok(obj),
                _ => Err(PipelineError::Parse(JsonExtractError::NoJson)),
            },
            AnalysisVariant::Markdown => Ok(json!({ "markdown_content": resp.content.trim() })),
        }
    }

    async fn resolve<'a>(&self, articles: &'a [AnalyzedArticle]) -> Result<Vec<ResolvedArticle<'a>>, PipelineError> {
        let ids: Vec<String> = articles.iter().filter_map(|a| a.id()).map(str::to_string).collect();
        if ids.len() < articles.len() {
            warn!(without_id = articles.len() - ids.len(), "articles without PMID skipped");
        }

        let mut by_id: HashMap<String, CorpusArticle> = self
            .corpus
            .fetch_full_texts(&ids)
            .await?
            .into_iter()
            .map(|a| (a.external_id.trim().to_uppercase(), a))
            .collect();

        let mut resolved = Vec::with_capacity(ids.len());
        for meta in articles {
            let Some(pmid) = meta.id() else { continue };
            match by_id.remove(&pmid.to_uppercase()) {
                Some(source) => resolved.push(ResolvedArticle { meta, pmid, source }),
                None => warn!(pmid, "no full text found; dropping article"),
            }
        }

        if resolved.is_empty() {
            return Err(PipelineError::NoArticlesResolved);
        }
        info!(requested = articles.len(), resolved = resolved.len(), "full texts resolved");
        Ok(resolved)
    }
}

fn year_text(year: &Option<Value>) -> String {
    match year {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "N/A".to_string(),
    }
}

fn article_block(out: &mut String, a: &ResolvedArticle<'_>) {
    let m = a.meta;
    let events = m
        .events
        .iter()
        .map(|e| format!("{} ({})", e.event, if e.matches_query { "matches" } else { "no match" }))
        .collect::<Vec<_>>()
        .join(", ");
    let drugs = if m.drug_results.is_empty() { "None".to_string() } else { m.drug_results.join(", ") };
    let title = m.title.as_deref().or(a.source.title.as_deref()).unwrap_or("N/A");

    let _ = writeln!(out, "PMID: {}", a.pmid);
    let _ = writeln!(out, "Title: {}", title);
    let _ = writeln!(
        out,
        "Journal: {} (SJR: {})",
        m.journal_title.as_deref().unwrap_or("N/A"),
        m.journal_sjr.unwrap_or(0.0)
    );
    let _ = writeln!(out, "Year: {}", year_text(&m.year));
    let _ = writeln!(out, "Type: {}", m.paper_type.as_deref().unwrap_or("N/A"));
    if let Some(disease) = m.type_of_disease.as_deref() {
        let _ = writeln!(out, "Disease: {}", disease);
    }
    let _ = writeln!(out, "Events: {}", events);
    let _ = writeln!(out, "Drug Results: {}", drugs);
    let _ = writeln!(out, "Points: {}", m.overall_points.unwrap_or(0.0));
    let _ = writeln!(out, "PMCID: {}", a.source.corpus_id);
    let _ = writeln!(out, "Link: {}", article_link(a.pmid));
    let _ = writeln!(out, "Full Text:\n{}", a.source.content);
    let _ = writeln!(out, "{}", "=".repeat(SEPARATOR_WIDTH));
}

const STRUCTURED_INSTRUCTIONS: &str = r#"Based on the clinical input, actionable events, and the analyzed articles above, provide a comprehensive analysis in the following JSON format:

{
    "case_summary": "Brief summary of the case",
    "actionable_events": [
        {
            "event": "Name of the event",
            "explanation": "Short explanation of the event's relevance to the disease",
            "type": "genetic|immune|other",
            "targetable": true/false,
            "prognostic_value": "Description of prognostic significance if any"
        }
    ],
    "treatment_recommendations": [
        {
            "actionable_event": "Event being targeted",
            "treatment": "Suggested treatment",
            "evidence": { "pmid": "PMID of the source", "link": "https://pubmed.ncbi.nlm.nih.gov/PMID/", "summary": "Brief summary of the evidence" },
            "previous_use": { "was_used": true/false, "response": "Description of previous response if applicable" },
            "warnings": ["Any warnings about sensitivities, adverse events, or allergies"]
        }
    ],
    "multi_target_opportunities": [
        {
            "treatment": "Treatment name",
            "targeted_events": ["event1", "event2"],
            "evidence": { "pmid": "PMID of the source", "link": "https://pubmed.ncbi.nlm.nih.gov/PMID/", "summary": "Summary of evidence for multi-targeting" }
        }
    ]
}

IMPORTANT: Return ONLY the raw JSON object. Do not include any explanatory text, markdown formatting, or code blocks."#;

const MARKDOWN_INSTRUCTIONS: &str = r#"Based on the clinical input, actionable events, and the analyzed articles above, provide a comprehensive analysis in markdown with these sections:

## Actionable Events
A table with columns | Event | Type | Explanation | Targetable | Prognostic Value |, followed by a concise interpretation of the clinical implications.

## Treatment Recommendations
A table with columns | Actionable Event | Treatment | Evidence | Previous Use | Warnings |. Every recommendation must cite at least one PMID from the provided articles in the Evidence column; do not write "N/A" there. Follow the table with a short clinical perspective on strength of evidence, benefits and risks.

## Multi-Target Opportunities
A table with columns | Treatment | Targeted Events | Evidence |, followed by a brief analysis of the combined approach.

Use proper markdown table syntax with | separators and aligned headers. Keep the language concise and focused on decisions for this patient.

IMPORTANT: Return the analysis in markdown format with the specified table structure. Do not include any JSON formatting."#;

fn build_analysis_prompt(case: &CaseForAnalysis, articles: &[ResolvedArticle<'_>], variant: AnalysisVariant) -> String {
    let rule = "=".repeat(SEPARATOR_WIDTH);
    let mut out = String::new();
    out.push_str(
        "You are a pediatric hematologist sitting on a tumor board for patients with complex diseases. \
         Your goal is to find the best treatment for every patient, considering their actionable events \
         (genetic, immune-related, or other).\n\n",
    );
    let _ = writeln!(out, "CASE INFORMATION:\n{}\n", case.case_notes.trim());
    let _ = writeln!(out, "Disease: {}", case.disease.trim());
    let _ = writeln!(out, "Actionable Events: {}\n", case.events.join(", "));
    let _ = writeln!(out, "ANALYZED ARTICLES:\n{}", rule);
    for a in articles {
        article_block(&mut out, a);
    }
    out.push('\n');
    out.push_str(match variant {
        AnalysisVariant::Structured => STRUCTURED_INSTRUCTIONS,
        AnalysisVariant::Markdown => MARKDOWN_INSTRUCTIONS,
    });
    out
}
