//! Post entity store.

use std::sync::Arc;

use quill_core::{derive_resource_id, Error, ResourceKind, Result};
use tracing::error;

use super::backend::StorageBackend;
use super::filter::Filter;
use super::model::{now_millis, PostRecord, POSTS_TABLE};
use super::run_in_transaction;
use crate::context::CallContext;

/// CRUD over the posts table.
pub struct PostStore {
    backend: Arc<dyn StorageBackend>,
}

impl PostStore {
    pub(super) fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Inserts a post and derives its public resource id (two-phase
    /// creation in one transaction, as for users).
    pub async fn create(&self, ctx: &CallContext, record: &mut PostRecord) -> Result<()> {
        let now = now_millis();
        record.created_at = now;
        record.updated_at = now;

        let backend = Arc::clone(&self.backend);
        let draft = record.clone();
        let created = run_in_transaction(&self.backend, ctx, |scoped| async move {
            let mut rec = draft;
            let key = backend
                .insert(scoped.transaction(), POSTS_TABLE, rec.to_row())
                .await?;
            rec.id = key;
            rec.post_id = derive_resource_id(ResourceKind::Post, key);
            backend
                .update(scoped.transaction(), POSTS_TABLE, rec.to_row())
                .await?;
            Ok(rec)
        })
        .await
        .inspect_err(|err| error!(%err, "failed to insert post"))?;

        *record = created;
        Ok(())
    }

    /// Full-row update keyed by the surrogate key.
    pub async fn update(&self, ctx: &CallContext, record: &mut PostRecord) -> Result<()> {
        record.updated_at = now_millis();
        self.backend
            .update(ctx.transaction(), POSTS_TABLE, record.to_row())
            .await
            .inspect_err(|err| error!(%err, "failed to update post"))
    }

    /// Deletes all posts matching the filter. Zero matches is not an error.
    pub async fn delete(&self, ctx: &CallContext, filter: &Filter) -> Result<()> {
        self.backend
            .delete(ctx.transaction(), POSTS_TABLE, &filter.build())
            .await
            .map(|_| ())
            .inspect_err(|err| error!(%err, "failed to delete post"))
    }

    /// Returns the first matching post, most-recent-first.
    ///
    /// # Errors
    ///
    /// `NotFound` when no row matches; `ReadError` on I/O failure.
    pub async fn get(&self, ctx: &CallContext, filter: &Filter) -> Result<PostRecord> {
        let mut query = filter.build();
        if query.limit().is_none() {
            query = query.page(0, 1);
        }
        let rows = self
            .backend
            .fetch(ctx.transaction(), POSTS_TABLE, &query)
            .await
            .inspect_err(|err| error!(%err, "failed to retrieve post"))?;
        let row = rows
            .first()
            .ok_or_else(|| Error::not_found("post not found"))?;
        PostRecord::from_row(row)
    }

    /// Returns `(total ignoring the page, page of posts)`.
    pub async fn list(&self, ctx: &CallContext, filter: &Filter) -> Result<(i64, Vec<PostRecord>)> {
        let query = filter.build();
        let total = self
            .backend
            .count(ctx.transaction(), POSTS_TABLE, &query.without_page())
            .await
            .inspect_err(|err| error!(%err, "failed to count posts"))?;
        let rows = self
            .backend
            .fetch(ctx.transaction(), POSTS_TABLE, &query)
            .await
            .inspect_err(|err| error!(%err, "failed to list posts"))?;
        let records = rows
            .iter()
            .map(PostRecord::from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok((total, records))
    }
}

#[cfg(test)]
mod tests {
    use quill_core::{ErrorKind, RequestContext};

    use super::*;
    use crate::store::memory::MemoryBackend;
    use crate::store::DataStore;

    fn ctx() -> CallContext {
        CallContext::new(RequestContext::new("req-1"))
    }

    fn store() -> Arc<DataStore> {
        DataStore::new(Arc::new(MemoryBackend::new()))
    }

    fn draft(title: &str) -> PostRecord {
        PostRecord {
            user_id: "user-000001".to_string(),
            title: title.to_string(),
            content: "body".to_string(),
            ..PostRecord::default()
        }
    }

    #[tokio::test]
    async fn create_derives_a_post_id() {
        let store = store();
        let mut record = draft("Hello");
        store.posts().create(&ctx(), &mut record).await.unwrap();
        assert!(record.post_id.starts_with("post-"));
    }

    #[tokio::test]
    async fn resource_ids_are_stable_across_lookups() {
        let store = store();
        let mut record = draft("Hello");
        store.posts().create(&ctx(), &mut record).await.unwrap();

        let fetched = store
            .posts()
            .get(&ctx(), &Filter::new().eq("post_id", record.post_id.clone()))
            .await
            .unwrap();
        assert_eq!(fetched.post_id, record.post_id);
    }

    #[tokio::test]
    async fn two_posts_never_share_an_id() {
        let store = store();
        let mut a = draft("One");
        let mut b = draft("Two");
        store.posts().create(&ctx(), &mut a).await.unwrap();
        store.posts().create(&ctx(), &mut b).await.unwrap();
        assert_ne!(a.post_id, b.post_id);
    }

    #[tokio::test]
    async fn get_missing_post_is_not_found() {
        let store = store();
        let err = store
            .posts()
            .get(&ctx(), &Filter::new().eq("post_id", "post-zzzzzz"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn delete_by_id_list_removes_only_matches() {
        let store = store();
        let mut a = draft("One");
        let mut b = draft("Two");
        let mut c = draft("Three");
        for record in [&mut a, &mut b, &mut c] {
            store.posts().create(&ctx(), record).await.unwrap();
        }

        let ids = vec![a.post_id.clone(), c.post_id.clone()];
        store
            .posts()
            .delete(&ctx(), &Filter::new().eq("post_id", ids))
            .await
            .unwrap();

        let (total, _) = store.posts().list(&ctx(), &Filter::new()).await.unwrap();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn list_filters_by_title() {
        let store = store();
        let mut a = draft("Hello");
        let mut b = draft("Other");
        store.posts().create(&ctx(), &mut a).await.unwrap();
        store.posts().create(&ctx(), &mut b).await.unwrap();

        let (total, page) = store
            .posts()
            .list(&ctx(), &Filter::new().eq("title", "Hello"))
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(page[0].title, "Hello");
    }
}
