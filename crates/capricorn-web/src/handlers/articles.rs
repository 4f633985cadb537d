//! POST /api/articles/stream: retrieve, extract and score articles,
//! streaming one JSON event per line.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use tokio::sync::mpsc;
use tracing::info;

use capricorn_common::ApiError;
use capricorn_pipeline::StreamRequest;

use crate::handlers::json_body;
use crate::state::SharedState;
use crate::stream::ndjson_response;

pub async fn stream_articles(
    State(state): State<SharedState>,
    payload: Result<Json<StreamRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let req = json_body(payload)?;
    let streamer = state.article_streamer();
    // Validation happens before the response starts so it can still be a 400.
    let query = streamer.build_query(&req)?;
    info!(top_k = query.top_k, disease = ?req.disease, "article stream requested");

    let (tx, rx) = mpsc::channel(state.config.pipeline.channel_capacity.max(1));
    tokio::spawn(async move {
        let outcome = streamer.run(query, &req, tx).await;
        info!(?outcome, "article stream finished");
    });

    Ok(ndjson_response(rx))
}
