//! User entity store.

use std::sync::Arc;

use quill_core::{derive_resource_id, Error, ResourceKind, Result};
use tracing::error;

use super::backend::StorageBackend;
use super::filter::Filter;
use super::model::{now_millis, UserRecord, USERS_TABLE};
use super::run_in_transaction;
use crate::context::CallContext;

/// CRUD over the users table.
pub struct UserStore {
    backend: Arc<dyn StorageBackend>,
}

impl UserStore {
    pub(super) fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Inserts a user and derives its public resource id.
    ///
    /// Two-phase creation inside one transaction: insert, derive
    /// `user-<key>` from the assigned surrogate key, persist the id.
    /// Derivation is a pure function of the key, so re-deriving for the
    /// same row always yields the same id.
    ///
    /// # Errors
    ///
    /// `WriteError` on constraint violation (duplicate username, phone) or
    /// I/O failure.
    pub async fn create(&self, ctx: &CallContext, record: &mut UserRecord) -> Result<()> {
        let now = now_millis();
        record.created_at = now;
        record.updated_at = now;

        let backend = Arc::clone(&self.backend);
        let draft = record.clone();
        let created = run_in_transaction(&self.backend, ctx, |scoped| async move {
            let mut rec = draft;
            let key = backend
                .insert(scoped.transaction(), USERS_TABLE, rec.to_row())
                .await?;
            rec.id = key;
            rec.user_id = derive_resource_id(ResourceKind::User, key);
            backend
                .update(scoped.transaction(), USERS_TABLE, rec.to_row())
                .await?;
            Ok(rec)
        })
        .await
        .inspect_err(|err| error!(%err, "failed to insert user"))?;

        *record = created;
        Ok(())
    }

    /// Full-row update keyed by the surrogate key. Does not re-derive the
    /// resource id.
    pub async fn update(&self, ctx: &CallContext, record: &mut UserRecord) -> Result<()> {
        record.updated_at = now_millis();
        self.backend
            .update(ctx.transaction(), USERS_TABLE, record.to_row())
            .await
            .inspect_err(|err| error!(%err, "failed to update user"))
    }

    /// Deletes all users matching the filter. Zero matches is not an error.
    pub async fn delete(&self, ctx: &CallContext, filter: &Filter) -> Result<()> {
        self.backend
            .delete(ctx.transaction(), USERS_TABLE, &filter.build())
            .await
            .map(|_| ())
            .inspect_err(|err| error!(%err, "failed to delete user"))
    }

    /// Returns the first matching user, most-recent-first.
    ///
    /// # Errors
    ///
    /// `NotFound` when no row matches; `ReadError` on I/O failure.
    pub async fn get(&self, ctx: &CallContext, filter: &Filter) -> Result<UserRecord> {
        let mut query = filter.build();
        if query.limit().is_none() {
            query = query.page(0, 1);
        }
        let rows = self
            .backend
            .fetch(ctx.transaction(), USERS_TABLE, &query)
            .await
            .inspect_err(|err| error!(%err, "failed to retrieve user"))?;
        let row = rows
            .first()
            .ok_or_else(|| Error::not_found("user not found"))?;
        UserRecord::from_row(row)
    }

    /// Returns `(total ignoring the page, page of users)`.
    pub async fn list(&self, ctx: &CallContext, filter: &Filter) -> Result<(i64, Vec<UserRecord>)> {
        let query = filter.build();
        let total = self
            .backend
            .count(ctx.transaction(), USERS_TABLE, &query.without_page())
            .await
            .inspect_err(|err| error!(%err, "failed to count users"))?;
        let rows = self
            .backend
            .fetch(ctx.transaction(), USERS_TABLE, &query)
            .await
            .inspect_err(|err| error!(%err, "failed to list users"))?;
        let records = rows
            .iter()
            .map(UserRecord::from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok((total, records))
    }
}
