//! User routes.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Json;
use quill_core::messages::{
    ChangePasswordRequest, CreateUserRequest, DeleteUserRequest, GetUserRequest, ListUsersRequest,
    LoginRequest, RefreshTokenRequest, UpdateUserRequest,
};
use quill_core::Message;

use super::{forward, AppState};

pub async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateUserRequest>,
) -> Response {
    forward(&state, &headers, Message::CreateUser { payload }).await
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    Json(mut payload): Json<UpdateUserRequest>,
) -> Response {
    payload.user_id = user_id;
    forward(&state, &headers, Message::UpdateUser { payload }).await
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let payload = DeleteUserRequest { user_id };
    forward(&state, &headers, Message::DeleteUser { payload }).await
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let payload = GetUserRequest { user_id };
    forward(&state, &headers, Message::GetUser { payload }).await
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(payload): Query<ListUsersRequest>,
    headers: HeaderMap,
) -> Response {
    forward(&state, &headers, Message::ListUsers { payload }).await
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Response {
    forward(&state, &headers, Message::Login { payload }).await
}

pub async fn refresh_token(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let payload = RefreshTokenRequest {};
    forward(&state, &headers, Message::RefreshToken { payload }).await
}

pub async fn change_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ChangePasswordRequest>,
) -> Response {
    forward(&state, &headers, Message::ChangePassword { payload }).await
}
