//! Server-side call context.
//!
//! [`CallContext`] wraps the transport-neutral [`RequestContext`] and adds
//! the one piece of server-only call state: the transaction binding. Once a
//! transaction token is bound (by [`crate::store::DataStore::in_transaction`]),
//! every data-access call made with the derived context reuses that exact
//! transaction; contexts without a binding run against the shared handle.

use quill_core::{Identity, RequestContext};

use crate::store::backend::TxToken;

/// Per-call context threaded through interceptors, business operations, and
/// the data access layer.
#[derive(Debug, Clone)]
pub struct CallContext {
    request: RequestContext,
    tx: Option<TxToken>,
}

impl CallContext {
    /// Wraps a freshly built request context; no transaction bound.
    #[must_use]
    pub fn new(request: RequestContext) -> Self {
        Self { request, tx: None }
    }

    /// The transport-neutral request context.
    #[must_use]
    pub fn request(&self) -> &RequestContext {
        &self.request
    }

    /// The call's correlation id.
    #[must_use]
    pub fn request_id(&self) -> &str {
        self.request.request_id()
    }

    /// The authenticated caller, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.request.identity()
    }

    /// The caller's public user id, if authenticated.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.request.user_id()
    }

    /// The caller's username, if authenticated.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.request.username()
    }

    /// Returns a derived context with the resolved identity bound.
    #[must_use]
    pub fn with_identity(self, identity: Identity) -> Self {
        Self {
            request: self.request.with_identity(identity),
            ..self
        }
    }

    /// The bound transaction, if this context is transaction-scoped.
    #[must_use]
    pub fn transaction(&self) -> Option<TxToken> {
        self.tx
    }

    /// Derives a transaction-bound context. Only the store opens scopes.
    #[must_use]
    pub(crate) fn with_transaction(&self, tx: TxToken) -> Self {
        Self {
            request: self.request.clone(),
            tx: Some(tx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> CallContext {
        CallContext::new(RequestContext::new("req-1"))
    }

    #[test]
    fn fresh_context_has_no_transaction() {
        assert!(ctx().transaction().is_none());
    }

    #[test]
    fn with_transaction_binds_token_without_touching_request() {
        let base = ctx();
        let scoped = base.with_transaction(TxToken(3));
        assert_eq!(scoped.transaction(), Some(TxToken(3)));
        assert_eq!(scoped.request_id(), "req-1");
        assert!(base.transaction().is_none());
    }

    #[test]
    fn identity_accessors_delegate() {
        let bound = ctx().with_identity(Identity {
            user_id: "user-000001".to_string(),
            username: "alice123".to_string(),
        });
        assert_eq!(bound.user_id(), Some("user-000001"));
        assert_eq!(bound.username(), Some("alice123"));
    }
}
