//! GET /health

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub journals_loaded: usize,
    pub model: String,
}

pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        journals_loaded: state.journals.len(),
        model: state.backend.model_id().to_string(),
    })
}
