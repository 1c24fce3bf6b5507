//! Health route.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use quill_core::messages::HealthzRequest;
use quill_core::Message;

use super::{forward, AppState};

/// `GET /healthz` — forwarded through the RPC service like every other
/// call, but never behind authentication.
pub async fn healthz_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let payload = HealthzRequest {};
    forward(&state, &headers, Message::Healthz { payload }).await
}
