// HTTP handlers for health, session listing and replay retrieval.

use crate::interface_adapters::protocol::{
    GameListDto, GameSummaryDto, HealthDto, ReplayListDto, ReplaySummaryDto,
};
use crate::interface_adapters::state::AppState;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    // Human-readable error string for consistent JSON error responses.
    pub error: String,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthDto> {
    let sessions = state.registry.list_sessions().await.len();
    let replays = state.registry.list_replays().await.len();
    Json(HealthDto {
        status: "healthy",
        sessions,
        replays,
    })
}

pub async fn games_handler(State(state): State<Arc<AppState>>) -> Json<GameListDto> {
    let games = state
        .registry
        .list_sessions()
        .await
        .iter()
        .map(GameSummaryDto::from)
        .collect();
    Json(GameListDto { games })
}

pub async fn replays_handler(State(state): State<Arc<AppState>>) -> Json<ReplayListDto> {
    let replays = state
        .registry
        .list_replays()
        .await
        .iter()
        .map(|replay| ReplaySummaryDto::from(replay.as_ref()))
        .collect();
    Json(ReplayListDto { replays })
}

pub async fn replay_handler(
    State(state): State<Arc<AppState>>,
    Path(replay_id): Path<String>,
) -> impl IntoResponse {
    match state.registry.get_replay(&replay_id).await {
        Some(replay) => Json(replay.as_ref().clone()).into_response(),
        None => {
            debug!(%replay_id, "replay lookup missed");
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: "replay not found".to_string(),
                }),
            )
                .into_response()
        }
    }
}
