use axum::Json;
use relay_core::outcome::JsonResponse;

/// `POST /`: a reachability check that touches nothing downstream.
pub async fn root_handler() -> Json<JsonResponse> {
    Json(JsonResponse::ok("Hit the broker"))
}
