//! Post business operations.

use std::sync::Arc;

use quill_core::messages::{
    CreatePostRequest, CreatePostResponse, DeletePostRequest, DeletePostResponse, GetPostRequest,
    GetPostResponse, ListPostsRequest, ListPostsResponse, Post, UpdatePostRequest,
    UpdatePostResponse,
};
use quill_core::{Error, Result};

use super::user::ADMIN_USERNAME;
use crate::context::CallContext;
use crate::store::{DataStore, Filter, PostRecord};

/// Post use-cases. All mutations are owner-scoped: a non-privileged caller
/// can only touch their own rows.
pub struct PostService {
    store: Arc<DataStore>,
}

impl PostService {
    #[must_use]
    pub fn new(store: Arc<DataStore>) -> Self {
        Self { store }
    }

    /// Creates a post owned by the calling identity.
    pub async fn create(
        &self,
        ctx: &CallContext,
        rq: CreatePostRequest,
    ) -> Result<CreatePostResponse> {
        let user_id = ctx
            .user_id()
            .ok_or_else(|| Error::unauthenticated("no identity bound to the call"))?;
        let mut record = PostRecord {
            user_id: user_id.to_string(),
            title: rq.title,
            content: rq.content,
            ..PostRecord::default()
        };
        self.store.posts().create(ctx, &mut record).await?;
        Ok(CreatePostResponse {
            post_id: record.post_id,
        })
    }

    /// Updates one of the caller's posts.
    pub async fn update(
        &self,
        ctx: &CallContext,
        rq: UpdatePostRequest,
    ) -> Result<UpdatePostResponse> {
        let posts = self.store.posts();
        let mut record = posts
            .get(ctx, &Filter::new().owner(ctx).eq("post_id", rq.post_id))
            .await?;
        if let Some(title) = rq.title {
            record.title = title;
        }
        if let Some(content) = rq.content {
            record.content = content;
        }
        posts.update(ctx, &mut record).await?;
        Ok(UpdatePostResponse {})
    }

    /// Deletes a batch of the caller's posts; absent ids are skipped.
    pub async fn delete(
        &self,
        ctx: &CallContext,
        rq: DeletePostRequest,
    ) -> Result<DeletePostResponse> {
        self.store
            .posts()
            .delete(ctx, &Filter::new().owner(ctx).eq("post_id", rq.post_ids))
            .await?;
        Ok(DeletePostResponse {})
    }

    /// Fetches one of the caller's posts by public id.
    pub async fn get(&self, ctx: &CallContext, rq: GetPostRequest) -> Result<GetPostResponse> {
        let record = self
            .store
            .posts()
            .get(ctx, &Filter::new().owner(ctx).eq("post_id", rq.post_id))
            .await?;
        Ok(GetPostResponse {
            post: to_api_post(record),
        })
    }

    /// Lists posts: the caller's own unless the caller is the admin, with
    /// an optional exact-match title filter.
    pub async fn list(&self, ctx: &CallContext, rq: ListPostsRequest) -> Result<ListPostsResponse> {
        let mut filter = Filter::new();
        if ctx.username() != Some(ADMIN_USERNAME) {
            filter = filter.owner(ctx);
        }
        if let Some(title) = rq.title {
            filter = filter.eq("title", title);
        }
        filter = filter.page(rq.offset, rq.limit);

        let (total_count, records) = self.store.posts().list(ctx, &filter).await?;
        Ok(ListPostsResponse {
            total_count,
            posts: records.into_iter().map(to_api_post).collect(),
        })
    }
}

/// Converts a stored post row to its client-facing shape.
#[must_use]
pub fn to_api_post(record: PostRecord) -> Post {
    Post {
        post_id: record.post_id,
        user_id: record.user_id,
        title: record.title,
        content: record.content,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}
