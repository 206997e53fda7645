//! `POST /handle`: the single entry point for actions.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use relay_core::outcome::JsonResponse;
use tracing::debug;

use super::AppState;

/// Decodes the action request, dispatches it, and answers with the outcome's
/// status and JSON envelope.
///
/// Requests that arrive after shutdown has begun get 503 without being
/// dispatched.
pub async fn handle_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<JsonResponse>) {
    if !state.shutdown.accepting() {
        debug!(state = state.shutdown.health_state().as_str(), "rejecting action");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(JsonResponse::error("gateway is not accepting requests")),
        );
    }

    let _guard = state.shutdown.in_flight_guard();
    let outcome = state.dispatcher.handle_json(&body).await;
    let status =
        StatusCode::from_u16(outcome.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    (status, Json(outcome.into()))
}
