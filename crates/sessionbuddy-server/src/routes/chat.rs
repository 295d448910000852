//! Chat routes: blocking answer and SSE delta relay.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;
use sessionbuddy_chat::{ChatRequest, ChatResponse, DeltaFrame, StreamEvent};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat", post(chat))
        .route("/chat/stream", post(stream_chat))
}

fn parse_request(
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<ChatRequest, ApiError> {
    let Json(body) = payload?;
    Ok(ChatRequest::from_json(&body)?)
}

// ---------------------------------------------------------------
// Blocking chat
// ---------------------------------------------------------------

async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let req = parse_request(payload)?;

    let response = state.provider.chat(&req.message).await.map_err(|e| {
        warn!("{} chat failed: {}", state.provider.name(), e);
        e
    })?;

    Ok(Json(ChatResponse { response }))
}

// ---------------------------------------------------------------
// Streaming chat (SSE)
// ---------------------------------------------------------------

/// Nothing is streamed until the upstream has accepted the request, so
/// connection failures still get a normal JSON error and status code. After
/// that the status line is committed and failures just end the stream.
async fn stream_chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let req = parse_request(payload)?;

    let mut events = state.provider.chat_stream(&req.message).await.map_err(|e| {
        warn!("{} stream failed to start: {}", state.provider.name(), e);
        e
    })?;

    let sse_stream = async_stream::stream! {
        let mut frames = 0usize;
        while let Some(event) = events.next().await {
            match event {
                StreamEvent::Delta(delta) => {
                    match Event::default().json_data(DeltaFrame { delta }) {
                        Ok(event) => {
                            frames += 1;
                            yield Ok::<_, Infallible>(event);
                        }
                        Err(e) => {
                            warn!("Failed to encode delta frame: {}", e);
                            return;
                        }
                    }
                }
                StreamEvent::Done => {
                    debug!("Relayed {} frames", frames);
                    return;
                }
                StreamEvent::Error(e) => {
                    warn!("Upstream stream aborted after {} frames: {}", frames, e);
                    return;
                }
            }
        }
    };

    // Sse supplies Content-Type and Cache-Control; CorsLayer supplies the origin.
    Ok((
        [
            (header::CONNECTION, "keep-alive"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
        ],
        Sse::new(sse_stream),
    )
        .into_response())
}
