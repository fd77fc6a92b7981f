//! Request handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AppState;
use crate::bus::{LatestSubtitle, SubtitleFeed, SubtitlePayload};
use crate::orchestrator::Orchestrator;
use crate::room::{RoomId, UnknownRoom};
use crate::status::StatusResponse;

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Epoch seconds.
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReceipt {
    pub sequence: u64,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct FeedParams {
    /// Last sequence the listener already has; the feed resumes after it.
    after: Option<u64>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub(super) enum ApiError {
    #[error(transparent)]
    UnknownRoom(#[from] UnknownRoom),
    #[error("empty audio frame")]
    EmptyFrame,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::UnknownRoom(_) => StatusCode::NOT_FOUND,
            ApiError::EmptyFrame => StatusCode::BAD_REQUEST,
        };
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

pub(super) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        timestamp: state.orchestrator.clock().now_millis() / 1_000,
    })
}

pub(super) async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(state.orchestrator.status().to_response())
}

pub(super) async fn latest_subtitle(
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> Result<Json<LatestSubtitle>, ApiError> {
    let room: RoomId = room.parse()?;
    let latest = state.orchestrator.bus().latest(room);
    Ok(Json(LatestSubtitle {
        room,
        latest: latest.as_ref().map(SubtitlePayload::from),
    }))
}

pub(super) async fn ingest_chunk(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<IngestReceipt>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::EmptyFrame);
    }
    let frame = state.orchestrator.publish_audio(body);
    Ok(Json(IngestReceipt {
        sequence: frame.sequence,
    }))
}

// ---------------------------------------------------------------------------
// WebSockets
// ---------------------------------------------------------------------------

pub(super) async fn subtitle_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(room): Path<String>,
    Query(params): Query<FeedParams>,
) -> Result<Response, ApiError> {
    let room: RoomId = room.parse()?;
    // Subscribe before the upgrade so nothing published meanwhile is missed.
    let feed = state.orchestrator.bus().subscribe_after(room, params.after);
    Ok(ws.on_upgrade(move |socket| stream_subtitles(socket, feed)))
}

/// Forward one subscription to one listener until either side goes away.
async fn stream_subtitles(mut socket: WebSocket, mut feed: SubtitleFeed) {
    let room = feed.room();
    log::debug!("server: listener joined {room}");

    loop {
        tokio::select! {
            delivery = feed.next() => {
                let Some(delivery) = delivery else {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                };
                if let Some(kind) = delivery.discontinuity() {
                    log::debug!(
                        "server: listener on {room}: {kind}, skipped {} events",
                        delivery.dropped_before
                    );
                }
                let text = match serde_json::to_string(&SubtitlePayload::from(&delivery)) {
                    Ok(text) => text,
                    Err(e) => {
                        log::error!("server: failed to encode subtitle: {e}");
                        continue;
                    }
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    log::debug!("server: listener left {room}");
}

pub(super) async fn ingest_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| receive_audio(socket, state.orchestrator))
}

/// Every binary message from the broadcaster becomes one audio frame.
async fn receive_audio(mut socket: WebSocket, orchestrator: Arc<Orchestrator>) {
    log::info!("server: broadcaster connected");
    let mut frames = 0u64;

    while let Some(message) = socket.recv().await {
        match message {
            Ok(Message::Binary(data)) if !data.is_empty() => {
                orchestrator.publish_audio(data);
                frames += 1;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                log::warn!("server: broadcaster socket error: {e}");
                break;
            }
        }
    }

    log::info!("server: broadcaster disconnected after {frames} frames");
}
