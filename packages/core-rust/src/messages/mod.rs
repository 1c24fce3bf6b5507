//! Wire-compatible message schemas for the Quill protocol.
//!
//! Every business operation is a request/response message pair carried
//! inside the transport envelopes defined in [`base`]. The [`Message`] enum
//! is internally tagged (`#[serde(tag = "type")]`) with SCREAMING_SNAKE
//! discriminators; payload structs live in per-domain submodules. Binary
//! frames use named `MsgPack` serialization (`rmp_serde::to_vec_named()`),
//! the HTTP gateway serializes the same payload structs as JSON, so both
//! transports observe isomorphic payload shapes.

pub mod base;
pub mod health;
pub mod post;
pub mod user;

pub use base::{
    CallMetadata, RequestEnvelope, ResponseEnvelope, AUTHORIZATION_KEY, REQUEST_ID_KEY,
};
pub use health::{HealthzRequest, HealthzResponse, ServiceStatus};
pub use post::{
    CreatePostRequest, CreatePostResponse, DeletePostRequest, DeletePostResponse, GetPostRequest,
    GetPostResponse, ListPostsRequest, ListPostsResponse, Post, UpdatePostRequest,
    UpdatePostResponse,
};
pub use user::{
    ChangePasswordRequest, ChangePasswordResponse, CreateUserRequest, CreateUserResponse,
    DeleteUserRequest, DeleteUserResponse, GetUserRequest, GetUserResponse, ListUsersRequest,
    ListUsersResponse, LoginRequest, LoginResponse, RefreshTokenRequest, RefreshTokenResponse,
    UpdateUserRequest, UpdateUserResponse, User,
};

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorPayload};

/// All messages understood by the RPC service.
///
/// Request variants are dispatched by the server router; `*_RESP` variants
/// and `ERROR` flow back to clients. The discriminator travels as a `type`
/// key in the serialized map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    // ---- User operations ----
    #[serde(rename = "CREATE_USER")]
    CreateUser { payload: CreateUserRequest },
    #[serde(rename = "CREATE_USER_RESP")]
    CreateUserResp { payload: CreateUserResponse },
    #[serde(rename = "UPDATE_USER")]
    UpdateUser { payload: UpdateUserRequest },
    #[serde(rename = "UPDATE_USER_RESP")]
    UpdateUserResp { payload: UpdateUserResponse },
    #[serde(rename = "DELETE_USER")]
    DeleteUser { payload: DeleteUserRequest },
    #[serde(rename = "DELETE_USER_RESP")]
    DeleteUserResp { payload: DeleteUserResponse },
    #[serde(rename = "GET_USER")]
    GetUser { payload: GetUserRequest },
    #[serde(rename = "GET_USER_RESP")]
    GetUserResp { payload: GetUserResponse },
    #[serde(rename = "LIST_USERS")]
    ListUsers { payload: ListUsersRequest },
    #[serde(rename = "LIST_USERS_RESP")]
    ListUsersResp { payload: ListUsersResponse },
    #[serde(rename = "LOGIN")]
    Login { payload: LoginRequest },
    #[serde(rename = "LOGIN_RESP")]
    LoginResp { payload: LoginResponse },
    #[serde(rename = "REFRESH_TOKEN")]
    RefreshToken { payload: RefreshTokenRequest },
    #[serde(rename = "REFRESH_TOKEN_RESP")]
    RefreshTokenResp { payload: RefreshTokenResponse },
    #[serde(rename = "CHANGE_PASSWORD")]
    ChangePassword { payload: ChangePasswordRequest },
    #[serde(rename = "CHANGE_PASSWORD_RESP")]
    ChangePasswordResp { payload: ChangePasswordResponse },

    // ---- Post operations ----
    #[serde(rename = "CREATE_POST")]
    CreatePost { payload: CreatePostRequest },
    #[serde(rename = "CREATE_POST_RESP")]
    CreatePostResp { payload: CreatePostResponse },
    #[serde(rename = "UPDATE_POST")]
    UpdatePost { payload: UpdatePostRequest },
    #[serde(rename = "UPDATE_POST_RESP")]
    UpdatePostResp { payload: UpdatePostResponse },
    #[serde(rename = "DELETE_POST")]
    DeletePost { payload: DeletePostRequest },
    #[serde(rename = "DELETE_POST_RESP")]
    DeletePostResp { payload: DeletePostResponse },
    #[serde(rename = "GET_POST")]
    GetPost { payload: GetPostRequest },
    #[serde(rename = "GET_POST_RESP")]
    GetPostResp { payload: GetPostResponse },
    #[serde(rename = "LIST_POSTS")]
    ListPosts { payload: ListPostsRequest },
    #[serde(rename = "LIST_POSTS_RESP")]
    ListPostsResp { payload: ListPostsResponse },

    // ---- Health ----
    #[serde(rename = "HEALTHZ")]
    Healthz { payload: HealthzRequest },
    #[serde(rename = "HEALTHZ_RESP")]
    HealthzResp { payload: HealthzResponse },

    // ---- Errors ----
    #[serde(rename = "ERROR")]
    Error { payload: ErrorPayload },
}

impl Message {
    /// The operation name (the wire discriminator) for logging and metrics.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::CreateUser { .. } => "CREATE_USER",
            Self::CreateUserResp { .. } => "CREATE_USER_RESP",
            Self::UpdateUser { .. } => "UPDATE_USER",
            Self::UpdateUserResp { .. } => "UPDATE_USER_RESP",
            Self::DeleteUser { .. } => "DELETE_USER",
            Self::DeleteUserResp { .. } => "DELETE_USER_RESP",
            Self::GetUser { .. } => "GET_USER",
            Self::GetUserResp { .. } => "GET_USER_RESP",
            Self::ListUsers { .. } => "LIST_USERS",
            Self::ListUsersResp { .. } => "LIST_USERS_RESP",
            Self::Login { .. } => "LOGIN",
            Self::LoginResp { .. } => "LOGIN_RESP",
            Self::RefreshToken { .. } => "REFRESH_TOKEN",
            Self::RefreshTokenResp { .. } => "REFRESH_TOKEN_RESP",
            Self::ChangePassword { .. } => "CHANGE_PASSWORD",
            Self::ChangePasswordResp { .. } => "CHANGE_PASSWORD_RESP",
            Self::CreatePost { .. } => "CREATE_POST",
            Self::CreatePostResp { .. } => "CREATE_POST_RESP",
            Self::UpdatePost { .. } => "UPDATE_POST",
            Self::UpdatePostResp { .. } => "UPDATE_POST_RESP",
            Self::DeletePost { .. } => "DELETE_POST",
            Self::DeletePostResp { .. } => "DELETE_POST_RESP",
            Self::GetPost { .. } => "GET_POST",
            Self::GetPostResp { .. } => "GET_POST_RESP",
            Self::ListPosts { .. } => "LIST_POSTS",
            Self::ListPostsResp { .. } => "LIST_POSTS_RESP",
            Self::Healthz { .. } => "HEALTHZ",
            Self::HealthzResp { .. } => "HEALTHZ_RESP",
            Self::Error { .. } => "ERROR",
        }
    }

    /// Wraps an [`Error`] into an `ERROR` message.
    #[must_use]
    pub fn from_error(err: &Error) -> Self {
        Self::Error {
            payload: ErrorPayload::from(err),
        }
    }

    /// Unwraps a response message into its bare JSON payload, the shape
    /// the HTTP gateway returns to clients (no `type` discriminator).
    ///
    /// # Errors
    ///
    /// `ERROR` messages come back as the decoded [`Error`]; request
    /// variants are a gateway bug and surface as `Internal`.
    pub fn into_json_payload(self) -> crate::error::Result<serde_json::Value> {
        fn json<T: Serialize>(payload: &T) -> crate::error::Result<serde_json::Value> {
            serde_json::to_value(payload).map_err(|err| Error::internal(err.to_string()))
        }

        match self {
            Self::CreateUserResp { payload } => json(&payload),
            Self::UpdateUserResp { payload } => json(&payload),
            Self::DeleteUserResp { payload } => json(&payload),
            Self::GetUserResp { payload } => json(&payload),
            Self::ListUsersResp { payload } => json(&payload),
            Self::LoginResp { payload } => json(&payload),
            Self::RefreshTokenResp { payload } => json(&payload),
            Self::ChangePasswordResp { payload } => json(&payload),
            Self::CreatePostResp { payload } => json(&payload),
            Self::UpdatePostResp { payload } => json(&payload),
            Self::DeletePostResp { payload } => json(&payload),
            Self::GetPostResp { payload } => json(&payload),
            Self::ListPostsResp { payload } => json(&payload),
            Self::HealthzResp { payload } => json(&payload),
            Self::Error { payload } => Err(Error::from(payload)),
            other => Err(Error::internal(format!(
                "{} is not a response message",
                other.operation()
            ))),
        }
    }
}

/// Serializes a value into named `MsgPack` bytes for the binary transport.
///
/// # Errors
///
/// Returns [`crate::error::ErrorKind::Internal`] when serialization fails;
/// messages are closed types, so this indicates a server bug.
pub fn encode<T: Serialize>(value: &T) -> crate::error::Result<Vec<u8>> {
    rmp_serde::to_vec_named(value).map_err(|err| Error::internal(err.to_string()))
}

/// Deserializes a value from `MsgPack` bytes received on the binary
/// transport.
///
/// # Errors
///
/// Returns [`crate::error::ErrorKind::InvalidArgument`] when the bytes do
/// not decode as `T`; malformed frames are a client fault.
pub fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> crate::error::Result<T> {
    rmp_serde::from_slice(bytes).map_err(|err| Error::invalid_argument(err.to_string()))
}
