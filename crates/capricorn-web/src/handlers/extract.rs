//! POST /api/extract: disease or actionable events from case notes.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use capricorn_common::{ApiError, ValidationError};
use capricorn_pipeline::{CaseInfo, ExtractionKind};

use crate::handlers::json_body;
use crate::state::SharedState;

#[derive(Debug, Default, Deserialize)]
pub struct ExtractRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub extraction_type: Option<String>,
    #[serde(default)]
    pub prompt_content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub result: CaseInfo,
}

fn blank(s: &Option<String>) -> bool {
    s.as_deref().map_or(true, |s| s.trim().is_empty())
}

pub async fn extract_case_info(
    State(state): State<SharedState>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<Json<ExtractResponse>, ApiError> {
    let req = json_body(payload)?;
    if let Some(err) = ValidationError::missing([
        ("text", blank(&req.text)),
        ("prompt_content", blank(&req.prompt_content)),
    ]) {
        return Err(err.into());
    }
    let kind = match req.extraction_type.as_deref() {
        Some(t) => t.parse::<ExtractionKind>()?,
        None => ExtractionKind::default(),
    };

    let result = state
        .case_info_extractor()
        .extract(kind, req.prompt_content.as_deref().unwrap_or_default(), req.text.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(ExtractResponse { result }))
}
