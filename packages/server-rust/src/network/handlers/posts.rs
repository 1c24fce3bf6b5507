//! Post routes.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Json;
use quill_core::messages::{
    CreatePostRequest, DeletePostRequest, GetPostRequest, ListPostsRequest, UpdatePostRequest,
};
use quill_core::Message;

use super::{forward, AppState};

pub async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreatePostRequest>,
) -> Response {
    forward(&state, &headers, Message::CreatePost { payload }).await
}

pub async fn update_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    headers: HeaderMap,
    Json(mut payload): Json<UpdatePostRequest>,
) -> Response {
    payload.post_id = post_id;
    forward(&state, &headers, Message::UpdatePost { payload }).await
}

/// Batch delete: the id list travels in the JSON body.
pub async fn delete_posts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<DeletePostRequest>,
) -> Response {
    forward(&state, &headers, Message::DeletePost { payload }).await
}

/// Single delete: the path id becomes a one-element batch.
pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let payload = DeletePostRequest {
        post_ids: vec![post_id],
    };
    forward(&state, &headers, Message::DeletePost { payload }).await
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let payload = GetPostRequest { post_id };
    forward(&state, &headers, Message::GetPost { payload }).await
}

pub async fn list_posts(
    State(state): State<AppState>,
    Query(payload): Query<ListPostsRequest>,
    headers: HeaderMap,
) -> Response {
    forward(&state, &headers, Message::ListPosts { payload }).await
}
