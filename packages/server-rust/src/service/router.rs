//! Message routing: the transport-facing RPC service.
//!
//! [`RpcService::serve_envelope`] is the single entry point for both
//! transports: the binary RPC listener feeds it decoded frames, the HTTP
//! gateway feeds it through the in-process client. Per call it resolves
//! the correlation id, runs the authentication and authorization
//! interceptors for protected operations, routes the request message
//! through the generic dispatch adapter, and wraps the outcome — response
//! or error — back into a response envelope. Errors are annotated with the
//! request id, never downgraded.

use std::sync::Arc;

use metrics::counter;
use quill_core::messages::{
    CallMetadata, HealthzResponse, RequestEnvelope, ResponseEnvelope, ServiceStatus,
};
use quill_core::{Error, Message, RequestContext, Result};
use tracing::debug;

use crate::auth::{authenticate, resolve_request_id, PasswordHasher, TokenService};
use crate::authz::Authorizer;
use crate::config::ServerConfig;
use crate::context::CallContext;
use crate::service::dispatch::dispatch;
use crate::service::domain::{PostService, UserService};
use crate::store::DataStore;
use crate::validation::Validator;

/// The RPC service: interceptors plus operation routing.
pub struct RpcService {
    store: Arc<DataStore>,
    tokens: Arc<dyn TokenService>,
    authorizer: Arc<dyn Authorizer>,
    users: UserService,
    posts: PostService,
}

impl RpcService {
    #[must_use]
    pub fn new(
        store: Arc<DataStore>,
        tokens: Arc<dyn TokenService>,
        hasher: Arc<dyn PasswordHasher>,
        authorizer: Arc<dyn Authorizer>,
        config: &ServerConfig,
    ) -> Self {
        let users = UserService::new(
            Arc::clone(&store),
            Arc::clone(&tokens),
            hasher,
            config.list_concurrency,
        );
        let posts = PostService::new(Arc::clone(&store));
        Self {
            store,
            tokens,
            authorizer,
            users,
            posts,
        }
    }

    /// Whether an operation runs behind the authentication interceptor.
    /// Signup, login, and health checks are open; everything else is not.
    #[must_use]
    pub fn requires_auth(message: &Message) -> bool {
        !matches!(
            message,
            Message::CreateUser { .. } | Message::Login { .. } | Message::Healthz { .. }
        )
    }

    /// Serves one request envelope, producing the response envelope.
    ///
    /// The correlation id is resolved exactly once per call, propagated
    /// inward via the context, and echoed outward in the envelope; errors
    /// carry it in their payload.
    pub async fn serve_envelope(&self, envelope: RequestEnvelope) -> ResponseEnvelope {
        let request_id = resolve_request_id(&envelope.metadata);
        let operation = envelope.body.operation();
        counter!("quill_requests_total", "operation" => operation).increment(1);

        let ctx = CallContext::new(RequestContext::new(request_id.clone()));
        let body = match self.route(ctx, &envelope.metadata, envelope.body).await {
            Ok(message) => message,
            Err(err) => {
                counter!("quill_request_errors_total", "operation" => operation).increment(1);
                debug!(operation, %err, "request failed");
                Message::from_error(&err.with_request_id(request_id.clone()))
            }
        };

        ResponseEnvelope {
            call_id: envelope.call_id,
            request_id,
            body,
        }
    }

    async fn route(
        &self,
        ctx: CallContext,
        metadata: &CallMetadata,
        message: Message,
    ) -> Result<Message> {
        let ctx = if Self::requires_auth(&message) {
            let ctx = authenticate(
                ctx,
                metadata,
                self.tokens.as_ref(),
                &self.store.users(),
            )
            .await?;
            let subject = ctx.user_id().unwrap_or_default();
            let object = message.operation();
            if !self
                .authorizer
                .authorize(subject, object, "call")
                .unwrap_or(false)
            {
                return Err(Error::permission_denied(format!(
                    "access denied: subject={subject}, object={object}"
                )));
            }
            ctx
        } else {
            ctx
        };

        match message {
            Message::CreateUser { payload } => dispatch(
                ctx,
                payload,
                Validator::validate_create_user,
                |ctx, rq| async move { self.users.create(&ctx, rq).await },
            )
            .await
            .map(|payload| Message::CreateUserResp { payload }),

            Message::UpdateUser { payload } => dispatch(
                ctx,
                payload,
                Validator::validate_update_user,
                |ctx, rq| async move { self.users.update(&ctx, rq).await },
            )
            .await
            .map(|payload| Message::UpdateUserResp { payload }),

            Message::DeleteUser { payload } => dispatch(
                ctx,
                payload,
                Validator::validate_delete_user,
                |ctx, rq| async move { self.users.delete(&ctx, rq).await },
            )
            .await
            .map(|payload| Message::DeleteUserResp { payload }),

            Message::GetUser { payload } => dispatch(
                ctx,
                payload,
                Validator::validate_get_user,
                |ctx, rq| async move { self.users.get(&ctx, rq).await },
            )
            .await
            .map(|payload| Message::GetUserResp { payload }),

            Message::ListUsers { payload } => dispatch(
                ctx,
                payload,
                Validator::validate_list_users,
                |ctx, rq| async move { self.users.list(&ctx, rq).await },
            )
            .await
            .map(|payload| Message::ListUsersResp { payload }),

            Message::Login { payload } => dispatch(
                ctx,
                payload,
                Validator::validate_login,
                |ctx, rq| async move { self.users.login(&ctx, rq).await },
            )
            .await
            .map(|payload| Message::LoginResp { payload }),

            Message::RefreshToken { payload } => dispatch(
                ctx,
                payload,
                Validator::validate_refresh_token,
                |ctx, rq| async move { self.users.refresh_token(&ctx, rq).await },
            )
            .await
            .map(|payload| Message::RefreshTokenResp { payload }),

            Message::ChangePassword { payload } => dispatch(
                ctx,
                payload,
                Validator::validate_change_password,
                |ctx, rq| async move { self.users.change_password(&ctx, rq).await },
            )
            .await
            .map(|payload| Message::ChangePasswordResp { payload }),

            Message::CreatePost { payload } => dispatch(
                ctx,
                payload,
                Validator::validate_create_post,
                |ctx, rq| async move { self.posts.create(&ctx, rq).await },
            )
            .await
            .map(|payload| Message::CreatePostResp { payload }),

            Message::UpdatePost { payload } => dispatch(
                ctx,
                payload,
                Validator::validate_update_post,
                |ctx, rq| async move { self.posts.update(&ctx, rq).await },
            )
            .await
            .map(|payload| Message::UpdatePostResp { payload }),

            Message::DeletePost { payload } => dispatch(
                ctx,
                payload,
                Validator::validate_delete_post,
                |ctx, rq| async move { self.posts.delete(&ctx, rq).await },
            )
            .await
            .map(|payload| Message::DeletePostResp { payload }),

            Message::GetPost { payload } => dispatch(
                ctx,
                payload,
                Validator::validate_get_post,
                |ctx, rq| async move { self.posts.get(&ctx, rq).await },
            )
            .await
            .map(|payload| Message::GetPostResp { payload }),

            Message::ListPosts { payload } => dispatch(
                ctx,
                payload,
                Validator::validate_list_posts,
                |ctx, rq| async move { self.posts.list(&ctx, rq).await },
            )
            .await
            .map(|payload| Message::ListPostsResp { payload }),

            Message::Healthz { .. } => Ok(Message::HealthzResp {
                payload: healthz_response(),
            }),

            other => Err(Error::invalid_argument(format!(
                "{} is not a request message",
                other.operation()
            ))),
        }
    }
}

/// The health payload served by both transports, independent of
/// authentication state.
#[must_use]
pub fn healthz_response() -> HealthzResponse {
    HealthzResponse {
        status: ServiceStatus::Healthy,
        timestamp: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}
