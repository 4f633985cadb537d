//! capricorn-pipeline: retrieval, extraction, scoring and synthesis.
//!
//! Flow for one streaming request:
//!   1. Build a similarity query from the events text
//!   2. Search the corpus store
//!   3. For each candidate, in order: prompt the model, parse its JSON,
//!      score the metadata, emit a stream event
//!   4. Emit the terminal progress event
//!
//! The final analysis assembler and case-info extractor reuse the same
//! backend, retry strategy and JSON parser.

pub mod error;
pub mod prompt;
pub mod json_extract;
pub mod extractor;
pub mod events;
pub mod streamer;
pub mod synthesis;
pub mod case_info;

pub use case_info::{CaseInfo, CaseInfoExtractor, ExtractionKind};
pub use error::{ExtractionError, PipelineError};
pub use events::{BatchStatus, StreamEvent, StreamProgress};
pub use extractor::{ExtractionContext, ExtractorSettings, MetadataExtractor};
pub use json_extract::{extract_json, extract_metadata, JsonExtractError};
pub use streamer::{ArticleStreamer, StreamOutcome, StreamRequest};
pub use synthesis::{AnalysisRequest, AnalyzedArticle, CaseForAnalysis, FinalAnalysisAssembler};
