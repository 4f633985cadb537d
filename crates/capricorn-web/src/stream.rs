//! Newline-delimited JSON streaming.
//!
//! Each `StreamEvent` is written as one JSON object followed by `\n` as soon
//! as the streamer produces it. The content type stays `text/event-stream`
//! so proxies and the compression layer pass chunks through unbuffered.

use std::convert::Infallible;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use capricorn_pipeline::StreamEvent;

/// Serialise one event as a single line.
pub fn event_line(event: &StreamEvent) -> String {
    match serde_json::to_string(event) {
        Ok(mut line) => {
            line.push('\n');
            line
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to serialise stream event");
            let fallback = StreamEvent::fatal(format!("Failed to serialise event: {}", e));
            // Error events hold only strings and integers.
            serde_json::to_string(&fallback).map(|l| l + "\n").unwrap_or_default()
        }
    }
}

/// Response body fed from the streamer's channel. Dropping the body (client
/// disconnect) drops the receiver, which stops the streamer.
pub fn ndjson_response(rx: mpsc::Receiver<StreamEvent>) -> Response {
    let lines = ReceiverStream::new(rx).map(|event| Ok::<_, Infallible>(event_line(&event)));

    let mut resp = (StatusCode::OK, Body::from_stream(lines)).into_response();
    let headers = resp.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    resp
}
