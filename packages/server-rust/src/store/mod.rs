//! Data access layer.
//!
//! [`DataStore`] wraps the shared [`StorageBackend`] handle, hands out
//! entity-scoped stores, and scopes transactions via context propagation:
//! [`run_in_transaction`] binds an open transaction into a derived
//! [`CallContext`], and every store call made with that context reuses the
//! same transaction handle.

pub mod backend;
pub mod filter;
pub mod memory;
pub mod model;
pub mod post;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod user;

pub use backend::{Row, StorageBackend, TableSchema, TxToken, ID_COLUMN};
pub use filter::{Condition, FieldEq, Filter, Owner, Page, QuerySpec, Value, NO_LIMIT};
pub use memory::MemoryBackend;
pub use model::{PostRecord, UserRecord, POSTS_TABLE, USERS_TABLE};
pub use post::PostStore;
pub use user::UserStore;

use std::future::Future;
use std::sync::{Arc, OnceLock};

use quill_core::Result;
use tracing::warn;

use crate::context::CallContext;

static GLOBAL: OnceLock<Arc<DataStore>> = OnceLock::new();

/// Runs `f` inside a transaction bound to a derived context.
///
/// Commits when `f` returns `Ok`, rolls back and propagates the error
/// unchanged when it returns `Err`. A context that is already
/// transaction-bound is flattened: `f` runs inside the existing
/// transaction and commit/rollback stay with the outermost scope.
pub async fn run_in_transaction<T, F, Fut>(
    backend: &Arc<dyn StorageBackend>,
    ctx: &CallContext,
    f: F,
) -> Result<T>
where
    F: FnOnce(CallContext) -> Fut,
    Fut: Future<Output = Result<T>> + Send,
{
    if ctx.transaction().is_some() {
        return f(ctx.clone()).await;
    }

    let tx = backend.begin().await?;
    let scoped = ctx.with_transaction(tx);
    match f(scoped).await {
        Ok(value) => {
            backend.commit(tx).await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = backend.rollback(tx).await {
                warn!(%rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

/// Process-wide data access layer.
///
/// Constructed once at startup and passed by `Arc` into every component
/// that needs it; there is no ambient lookup. [`DataStore::initialize`]
/// guards the one-time construction so concurrent first-callers converge
/// on the same instance.
pub struct DataStore {
    backend: Arc<dyn StorageBackend>,
}

impl DataStore {
    /// Creates a store over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Arc<Self> {
        Arc::new(Self { backend })
    }

    /// Returns the process-wide store, constructing it on the first call.
    ///
    /// Later calls return the existing instance and ignore their argument.
    /// Tests that need isolation should use [`DataStore::new`] instead.
    #[must_use]
    pub fn initialize(backend: Arc<dyn StorageBackend>) -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| Self::new(backend)))
    }

    /// The shared backend handle. Used by the entity stores; exposed for
    /// the rare caller that needs raw query access.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// The user entity store.
    #[must_use]
    pub fn users(&self) -> UserStore {
        UserStore::new(Arc::clone(&self.backend))
    }

    /// The post entity store.
    #[must_use]
    pub fn posts(&self) -> PostStore {
        PostStore::new(Arc::clone(&self.backend))
    }

    /// See [`run_in_transaction`].
    pub async fn in_transaction<T, F, Fut>(&self, ctx: &CallContext, f: F) -> Result<T>
    where
        F: FnOnce(CallContext) -> Fut,
        Fut: Future<Output = Result<T>> + Send,
    {
        run_in_transaction(&self.backend, ctx, f).await
    }
}
