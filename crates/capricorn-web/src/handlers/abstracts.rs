//! POST /api/abstracts: title and abstract lookup by PMID.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use capricorn_common::{ApiError, ValidationError};
use capricorn_db::AbstractRecord;

use crate::handlers::json_body;
use crate::state::SharedState;

#[derive(Debug, Default, Deserialize)]
pub struct AbstractsRequest {
    #[serde(default)]
    pub pmids: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct AbstractsResponse {
    pub documents: Vec<AbstractRecord>,
    pub total: usize,
}

pub async fn retrieve_abstracts(
    State(state): State<SharedState>,
    payload: Result<Json<AbstractsRequest>, JsonRejection>,
) -> Result<Json<AbstractsResponse>, ApiError> {
    let pmids = json_body(payload)?.pmids.unwrap_or_default();
    if pmids.iter().all(|p| p.trim().is_empty()) {
        return Err(ValidationError::MissingFields(vec!["pmids".to_string()]).into());
    }

    let documents = state
        .corpus
        .fetch_abstracts(&pmids)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;
    Ok(Json(AbstractsResponse { total: documents.len(), documents }))
}
