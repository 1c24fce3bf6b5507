//! Per-request context and caller identity.
//!
//! A [`RequestContext`] is created by the transport interceptors once per
//! inbound call and threaded by value through every layer. It is immutable:
//! enrichment (e.g. binding the resolved identity) produces a derived
//! context rather than mutating shared state, so concurrent requests can
//! never observe each other's identity or correlation id.

use serde::{Deserialize, Serialize};

/// Resolved caller principal for the current call.
///
/// Created by the authentication interceptor after the bearer token's
/// subject has been resolved against the user store. Lives exactly as long
/// as the call; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Public resource id of the caller (e.g. `user-000001`).
    pub user_id: String,
    /// Display name of the caller.
    pub username: String,
}

/// Immutable per-call context carrying the correlation id and, once
/// authentication has run, the caller's [`Identity`].
///
/// Accessors are typed; there is no string-keyed lookup. Deriving a new
/// context with [`RequestContext::with_identity`] leaves the original
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    request_id: String,
    identity: Option<Identity>,
}

impl RequestContext {
    /// Creates an unauthenticated context for the given correlation id.
    #[must_use]
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            identity: None,
        }
    }

    /// Returns a derived context with the resolved identity bound.
    #[must_use]
    pub fn with_identity(self, identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            ..self
        }
    }

    /// The correlation id assigned to this call.
    ///
    /// Stable for the lifetime of the call and echoed back to the client in
    /// the response metadata on both transports.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The authenticated caller, if the authentication interceptor ran.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// The caller's public user id, if authenticated.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.identity.as_ref().map(|id| id.user_id.as_str())
    }

    /// The caller's username, if authenticated.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.identity.as_ref().map(|id| id.username.as_str())
    }
}
