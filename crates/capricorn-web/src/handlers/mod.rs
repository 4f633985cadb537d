//! HTTP handlers, one module per endpoint.

pub mod articles;
pub mod analysis;
pub mod abstracts;
pub mod extract;
pub mod health;

use axum::extract::rejection::JsonRejection;
use axum::Json;

use capricorn_common::ApiError;

/// Unwrap a JSON body, turning decoder failures into 400s with the
/// decoder's message.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}
