// HTTP API routes (game lifecycle).

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::GameError;
use crate::game::GameServer;

// ── Request types ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct GuessRequest {
    pub guess: String,
}

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub server: Arc<GameServer>,
}

// ── Error helper ──────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> impl IntoResponse {
    (status, Json(json!({ "error": msg })))
}

fn game_error(err: GameError) -> axum::response::Response {
    match err {
        GameError::NoActiveGame => json_error(
            StatusCode::CONFLICT,
            "No active game. Call GET /api/game/new first.",
        )
        .into_response(),
        other => {
            tracing::error!("Game request failed: {other}");
            json_error(StatusCode::SERVICE_UNAVAILABLE, &other.to_string()).into_response()
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(server: Arc<GameServer>) -> Router {
    let state = AppState { server };

    Router::new()
        .route("/api/game/new", get(new_game))
        .route("/api/game/guess", post(submit_guess))
        .with_state(state)
}

// ── Game handlers ─────────────────────────────────────────────────────

async fn new_game(State(state): State<AppState>) -> impl IntoResponse {
    match state.server.start_game().await {
        Ok(game) => {
            let image = base64::engine::general_purpose::STANDARD.encode(game.svg.as_bytes());
            (
                StatusCode::OK,
                Json(json!({
                    "id": game.id,
                    "title": game.title,
                    "imageBase64": image,
                    "imageType": "image/svg+xml",
                    "seedOrigin": game.origin.label(),
                })),
            )
                .into_response()
        }
        Err(err) => game_error(err),
    }
}

async fn submit_guess(
    State(state): State<AppState>,
    Json(req): Json<GuessRequest>,
) -> impl IntoResponse {
    match state.server.submit_guess(&req.guess).await {
        Ok(outcome) => {
            let mut body = json!({
                "correct": outcome.correct,
                "attemptsRemaining": outcome.attempts_remaining,
            });
            if let Some(hint) = outcome.hint {
                body["hint"] = json!(hint);
            }
            if let Some(reveal) = outcome.reveal {
                body["correctEvent"] = json!(reveal.correct_event);
                body["explanation"] = json!(reveal.explanation);
            }
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => game_error(err),
    }
}
