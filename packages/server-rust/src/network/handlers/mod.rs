//! HTTP gateway handlers.
//!
//! Handlers only decode the HTTP shape of a call (path/query/body binding)
//! into the request message, forward it through the in-process RPC client,
//! and map the response message back to JSON plus a status code. All
//! authentication, validation, and business logic runs behind the RPC
//! service, so both transports share one pipeline.

pub mod health;
pub mod posts;
pub mod users;

pub use health::healthz_handler;

use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use quill_core::messages::{CallMetadata, AUTHORIZATION_KEY, REQUEST_ID_KEY};
use quill_core::{ErrorPayload, Message};

use super::client::RpcClient;
use super::shutdown::ShutdownController;

/// Shared gateway state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// In-process client dialed into the RPC listener.
    pub client: Arc<RpcClient>,
    /// Shared shutdown controller (drain accounting).
    pub shutdown: Arc<ShutdownController>,
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

/// Builds the RPC call metadata from the inbound HTTP headers.
pub(crate) fn call_metadata(headers: &HeaderMap) -> CallMetadata {
    CallMetadata {
        request_id: header_value(headers, REQUEST_ID_KEY),
        authorization: header_value(headers, AUTHORIZATION_KEY),
    }
}

fn error_response(payload: ErrorPayload) -> Response {
    let status =
        StatusCode::from_u16(payload.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(payload)).into_response()
}

/// Forwards one decoded call through the RPC client and renders the
/// response.
pub(crate) async fn forward(state: &AppState, headers: &HeaderMap, body: Message) -> Response {
    let _guard = state.shutdown.in_flight_guard();
    match state.client.call(call_metadata(headers), body).await {
        Ok(envelope) => match envelope.body.into_json_payload() {
            Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
            Err(err) => error_response(ErrorPayload::from(&err)),
        },
        Err(err) => error_response(ErrorPayload::from(&err)),
    }
}

/// Fallback for unmatched routes: 404 with a plain JSON string body.
pub async fn not_found_handler() -> Response {
    (StatusCode::NOT_FOUND, Json("Page not found.")).into_response()
}
