//! POST /api/analysis: final case analysis over scored articles.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use capricorn_common::ApiError;
use capricorn_pipeline::AnalysisRequest;

use crate::handlers::json_body;
use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub success: bool,
    pub analysis: Value,
}

pub async fn final_analysis(
    State(state): State<SharedState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let case = json_body(payload)?.validate()?;
    let analysis = state.analysis_assembler().assemble(&case).await?;
    Ok(Json(AnalysisResponse { success: true, analysis }))
}
