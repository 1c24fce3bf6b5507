//! Authentication and request-id interceptors.
//!
//! Both transports funnel their per-call metadata into [`CallMetadata`],
//! so the identity pipeline is a single implementation: extract the bearer
//! token, validate it, resolve the subject through a [`UserRetriever`],
//! and bind the resulting identity into the call context. Downstream
//! business logic never branches on transport type.
//!
//! State machine per call:
//! `NoIdentity -> TokenExtracted -> IdentityResolved -> Dispatched`, or
//! `NoIdentity -> Rejected` at any extraction/resolution failure.

use async_trait::async_trait;
use quill_core::messages::CallMetadata;
use quill_core::{Error, Identity, Result};
use tracing::debug;
use uuid::Uuid;

use super::token::TokenService;
use crate::context::CallContext;
use crate::store::{Filter, UserRecord, UserStore};

/// Resolves a user record from a public user id.
#[async_trait]
pub trait UserRetriever: Send + Sync {
    /// Fetches the user addressed by `user_id`.
    async fn get_user(&self, ctx: &CallContext, user_id: &str) -> Result<UserRecord>;
}

#[async_trait]
impl UserRetriever for UserStore {
    async fn get_user(&self, ctx: &CallContext, user_id: &str) -> Result<UserRecord> {
        self.get(ctx, &Filter::new().eq("user_id", user_id)).await
    }
}

/// Resolves the call's correlation id: the inbound metadata value when
/// present, else a freshly generated UUID. Resolved once per call so the
/// id stays stable for every interceptor and for the response metadata.
#[must_use]
pub fn resolve_request_id(metadata: &CallMetadata) -> String {
    metadata
        .request_id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Authenticates a call and returns the identity-bound context.
///
/// # Errors
///
/// `TokenInvalid` when extraction or validation fails; `Unauthenticated`
/// when the token's subject cannot be resolved. Either failure aborts the
/// call before any business logic runs.
pub async fn authenticate(
    ctx: CallContext,
    metadata: &CallMetadata,
    tokens: &dyn TokenService,
    retriever: &dyn UserRetriever,
) -> Result<CallContext> {
    let bearer = metadata
        .bearer_token()
        .ok_or_else(|| Error::token_invalid("missing bearer token"))?;
    let user_id = tokens.parse(bearer)?;
    debug!(user_id, "token parsing successful");

    let user = retriever
        .get_user(&ctx, &user_id)
        .await
        .map_err(|err| Error::unauthenticated(err.message))?;

    Ok(ctx.with_identity(Identity {
        user_id: user.user_id,
        username: user.username,
    }))
}
