//! User business operations.

use std::sync::Arc;

use futures_util::{StreamExt, TryStreamExt};
use quill_core::messages::{
    ChangePasswordRequest, ChangePasswordResponse, CreateUserRequest, CreateUserResponse,
    DeleteUserRequest, DeleteUserResponse, GetUserRequest, GetUserResponse, ListUsersRequest,
    ListUsersResponse, LoginRequest, LoginResponse, RefreshTokenRequest, RefreshTokenResponse,
    UpdateUserRequest, UpdateUserResponse, User,
};
use quill_core::{Error, Result};
use tracing::{debug, warn};

use crate::auth::{PasswordHasher, TokenService};
use crate::context::CallContext;
use crate::store::{DataStore, Filter, UserRecord};

/// Username of the administrative account that may list all users.
pub const ADMIN_USERNAME: &str = "root";

/// User use-cases: thin orchestration over the store, the token service,
/// and the password hasher.
pub struct UserService {
    store: Arc<DataStore>,
    tokens: Arc<dyn TokenService>,
    hasher: Arc<dyn PasswordHasher>,
    list_concurrency: usize,
}

impl UserService {
    #[must_use]
    pub fn new(
        store: Arc<DataStore>,
        tokens: Arc<dyn TokenService>,
        hasher: Arc<dyn PasswordHasher>,
        list_concurrency: usize,
    ) -> Self {
        Self {
            store,
            tokens,
            hasher,
            list_concurrency: list_concurrency.max(1),
        }
    }

    /// Registers a new user. The plaintext password is encrypted before it
    /// reaches the store; the store derives the public user id.
    pub async fn create(
        &self,
        ctx: &CallContext,
        rq: CreateUserRequest,
    ) -> Result<CreateUserResponse> {
        let mut record = UserRecord {
            username: rq.username.clone(),
            password: self.hasher.hash(&rq.password)?,
            nickname: rq.nickname.unwrap_or_else(|| rq.username.clone()),
            email: rq.email,
            phone: rq.phone,
            ..UserRecord::default()
        };
        self.store.users().create(ctx, &mut record).await?;
        Ok(CreateUserResponse {
            user_id: record.user_id,
        })
    }

    /// Updates the calling user's own profile fields.
    pub async fn update(
        &self,
        ctx: &CallContext,
        rq: UpdateUserRequest,
    ) -> Result<UpdateUserResponse> {
        let users = self.store.users();
        let mut record = users.get(ctx, &Filter::new().owner(ctx)).await?;
        if let Some(username) = rq.username {
            record.username = username;
        }
        if let Some(nickname) = rq.nickname {
            record.nickname = nickname;
        }
        if let Some(email) = rq.email {
            record.email = email;
        }
        if let Some(phone) = rq.phone {
            record.phone = phone;
        }
        users.update(ctx, &mut record).await?;
        Ok(UpdateUserResponse {})
    }

    /// Deletes the addressed user. The authorizer decides who may address
    /// other users; deleting an absent user is not an error.
    pub async fn delete(
        &self,
        ctx: &CallContext,
        rq: DeleteUserRequest,
    ) -> Result<DeleteUserResponse> {
        self.store
            .users()
            .delete(ctx, &Filter::new().eq("user_id", rq.user_id))
            .await?;
        Ok(DeleteUserResponse {})
    }

    /// Fetches a user by public id.
    pub async fn get(&self, ctx: &CallContext, rq: GetUserRequest) -> Result<GetUserResponse> {
        let record = self
            .store
            .users()
            .get(ctx, &Filter::new().eq("user_id", rq.user_id))
            .await?;
        Ok(GetUserResponse {
            user: to_api_user(record, 0),
        })
    }

    /// Lists users with per-user post counts.
    ///
    /// Non-admin callers only see their own row. The per-row enrichment
    /// fans out with a bounded concurrency ceiling; the first failure
    /// cancels the remaining workers and fails the whole call, so partial
    /// results are never returned.
    pub async fn list(&self, ctx: &CallContext, rq: ListUsersRequest) -> Result<ListUsersResponse> {
        let mut filter = Filter::new();
        if ctx.username() != Some(ADMIN_USERNAME) {
            filter = filter.owner(ctx);
        }
        filter = filter.page(rq.offset, rq.limit);

        let (total_count, records) = self.store.users().list(ctx, &filter).await?;

        let mut enriched: Vec<(usize, User)> =
            futures_util::stream::iter(records.into_iter().enumerate().map(|(index, record)| {
                let posts = self.store.posts();
                async move {
                    let (post_count, _) = posts
                        .list(ctx, &Filter::new().eq("user_id", record.user_id.clone()))
                        .await?;
                    Ok::<(usize, User), Error>((index, to_api_user(record, post_count)))
                }
            }))
            .buffer_unordered(self.list_concurrency)
            .try_collect()
            .await?;
        enriched.sort_by_key(|(index, _)| *index);

        debug!(count = enriched.len(), "users listed from storage");
        Ok(ListUsersResponse {
            total_count,
            users: enriched.into_iter().map(|(_, user)| user).collect(),
        })
    }

    /// Verifies credentials and issues a bearer token.
    pub async fn login(&self, ctx: &CallContext, rq: LoginRequest) -> Result<LoginResponse> {
        let user = self
            .store
            .users()
            .get(ctx, &Filter::new().eq("username", rq.username))
            .await?;

        self.hasher
            .verify(&user.password, &rq.password)
            .inspect_err(|err| warn!(%err, "failed to compare password"))?;

        let (token, expires_at) = self.tokens.sign(&user.user_id)?;
        Ok(LoginResponse { token, expires_at })
    }

    /// Re-signs a token for the already authenticated caller.
    pub async fn refresh_token(
        &self,
        ctx: &CallContext,
        _rq: RefreshTokenRequest,
    ) -> Result<RefreshTokenResponse> {
        let user_id = ctx
            .user_id()
            .ok_or_else(|| Error::unauthenticated("no identity bound to the call"))?;
        let (token, expires_at) = self.tokens.sign(user_id)?;
        Ok(RefreshTokenResponse { token, expires_at })
    }

    /// Replaces the caller's password after verifying the old one.
    pub async fn change_password(
        &self,
        ctx: &CallContext,
        rq: ChangePasswordRequest,
    ) -> Result<ChangePasswordResponse> {
        let users = self.store.users();
        let mut record = users.get(ctx, &Filter::new().owner(ctx)).await?;

        self.hasher
            .verify(&record.password, &rq.old_password)
            .inspect_err(|err| warn!(%err, "failed to compare password"))?;

        record.password = self.hasher.hash(&rq.new_password)?;
        users.update(ctx, &mut record).await?;
        Ok(ChangePasswordResponse {})
    }
}

/// Converts a stored user row to its client-facing shape.
#[must_use]
pub fn to_api_user(record: UserRecord, post_count: i64) -> User {
    User {
        user_id: record.user_id,
        username: record.username,
        nickname: record.nickname,
        email: record.email,
        phone: record.phone,
        post_count,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use quill_core::{ErrorKind, Identity, RequestContext};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::auth::{JwtTokenService, SaltedSha256Hasher};
    use crate::store::backend::{Row, StorageBackend, TxToken};
    use crate::store::filter::QuerySpec;
    use crate::store::{MemoryBackend, PostRecord, POSTS_TABLE};

    fn ctx() -> CallContext {
        CallContext::new(RequestContext::new("req-1"))
    }

    fn identity(user_id: &str, username: &str) -> Identity {
        Identity {
            user_id: user_id.to_string(),
            username: username.to_string(),
        }
    }

    fn service_over(backend: Arc<dyn StorageBackend>) -> (UserService, Arc<DataStore>) {
        let store = DataStore::new(backend);
        let svc = UserService::new(
            Arc::clone(&store),
            Arc::new(JwtTokenService::new("test-key", Duration::from_secs(3600))),
            Arc::new(SaltedSha256Hasher),
            4,
        );
        (svc, store)
    }

    fn create_rq(username: &str, phone: &str) -> CreateUserRequest {
        CreateUserRequest {
            username: username.to_string(),
            password: "Abcdef1!".to_string(),
            re_password: "Abcdef1!".to_string(),
            nickname: None,
            email: format!("{username}@example.com"),
            phone: phone.to_string(),
        }
    }

    #[tokio::test]
    async fn create_then_login_roundtrip() {
        let (svc, _) = service_over(Arc::new(MemoryBackend::new()));
        let created = svc
            .create(&ctx(), create_rq("alice123", "+15550001111"))
            .await
            .unwrap();
        assert!(created.user_id.starts_with("user-"));

        let login = svc
            .login(
                &ctx(),
                LoginRequest {
                    username: "alice123".to_string(),
                    password: "Abcdef1!".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(!login.token.is_empty());
    }

    #[tokio::test]
    async fn login_with_wrong_password_issues_no_token() {
        let (svc, _) = service_over(Arc::new(MemoryBackend::new()));
        svc.create(&ctx(), create_rq("alice123", "+15550001111"))
            .await
            .unwrap();

        let err = svc
            .login(
                &ctx(),
                LoginRequest {
                    username: "alice123".to_string(),
                    password: "Wrong9$xx".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthenticated);
    }

    #[tokio::test]
    async fn list_enriches_with_post_counts() {
        let (svc, store) = service_over(Arc::new(MemoryBackend::new()));
        let created = svc
            .create(&ctx(), create_rq("alice123", "+15550001111"))
            .await
            .unwrap();

        for title in ["One", "Two"] {
            let mut post = PostRecord {
                user_id: created.user_id.clone(),
                title: title.to_string(),
                content: "body".to_string(),
                ..PostRecord::default()
            };
            store.posts().create(&ctx(), &mut post).await.unwrap();
        }

        let caller = ctx().with_identity(identity(&created.user_id, "alice123"));
        let listed = svc
            .list(
                &caller,
                ListUsersRequest {
                    offset: 0,
                    limit: 20,
                },
            )
            .await
            .unwrap();
        assert_eq!(listed.total_count, 1);
        assert_eq!(listed.users[0].post_count, 2);
    }

    #[tokio::test]
    async fn non_admin_list_sees_only_itself() {
        let (svc, _) = service_over(Arc::new(MemoryBackend::new()));
        let alice = svc
            .create(&ctx(), create_rq("alice123", "+15550001111"))
            .await
            .unwrap();
        svc.create(&ctx(), create_rq("bobby456", "+15550002222"))
            .await
            .unwrap();

        let caller = ctx().with_identity(identity(&alice.user_id, "alice123"));
        let listed = svc
            .list(
                &caller,
                ListUsersRequest {
                    offset: 0,
                    limit: 20,
                },
            )
            .await
            .unwrap();
        assert_eq!(listed.total_count, 1);
        assert_eq!(listed.users[0].username, "alice123");
    }

    #[tokio::test]
    async fn admin_list_sees_everyone() {
        let (svc, _) = service_over(Arc::new(MemoryBackend::new()));
        let root = svc
            .create(&ctx(), create_rq("root-user", "+15550000000"))
            .await
            .unwrap();
        svc.create(&ctx(), create_rq("alice123", "+15550001111"))
            .await
            .unwrap();

        // The admin check keys on the username constant, not on the id.
        let caller = ctx().with_identity(identity(&root.user_id, ADMIN_USERNAME));
        let listed = svc
            .list(
                &caller,
                ListUsersRequest {
                    offset: 0,
                    limit: 20,
                },
            )
            .await
            .unwrap();
        assert_eq!(listed.total_count, 2);
    }

    /// Backend wrapper that fails post reads on demand.
    struct FlakyPosts {
        inner: MemoryBackend,
        fail_post_reads: AtomicBool,
    }

    #[async_trait]
    impl StorageBackend for FlakyPosts {
        async fn begin(&self) -> Result<TxToken> {
            self.inner.begin().await
        }
        async fn commit(&self, tx: TxToken) -> Result<()> {
            self.inner.commit(tx).await
        }
        async fn rollback(&self, tx: TxToken) -> Result<()> {
            self.inner.rollback(tx).await
        }
        async fn insert(&self, tx: Option<TxToken>, table: &str, row: Row) -> Result<u64> {
            self.inner.insert(tx, table, row).await
        }
        async fn update(&self, tx: Option<TxToken>, table: &str, row: Row) -> Result<()> {
            self.inner.update(tx, table, row).await
        }
        async fn delete(&self, tx: Option<TxToken>, table: &str, query: &QuerySpec) -> Result<u64> {
            self.inner.delete(tx, table, query).await
        }
        async fn fetch(&self, tx: Option<TxToken>, table: &str, query: &QuerySpec) -> Result<Vec<Row>> {
            if table == POSTS_TABLE && self.fail_post_reads.load(Ordering::SeqCst) {
                return Err(quill_core::Error::read("injected failure"));
            }
            self.inner.fetch(tx, table, query).await
        }
        async fn count(&self, tx: Option<TxToken>, table: &str, query: &QuerySpec) -> Result<i64> {
            if table == POSTS_TABLE && self.fail_post_reads.load(Ordering::SeqCst) {
                return Err(quill_core::Error::read("injected failure"));
            }
            self.inner.count(tx, table, query).await
        }
    }

    #[tokio::test]
    async fn enrichment_failure_fails_the_whole_list() {
        let backend = Arc::new(FlakyPosts {
            inner: MemoryBackend::new(),
            fail_post_reads: AtomicBool::new(false),
        });
        let flaky: Arc<dyn StorageBackend> = backend.clone();
        let (svc, _) = service_over(flaky);

        let root = svc
            .create(&ctx(), create_rq("root-user", "+15550000000"))
            .await
            .unwrap();
        for i in 0..4 {
            svc.create(&ctx(), create_rq(&format!("user{i:04}"), &format!("+1555000{i:04}")))
                .await
                .unwrap();
        }

        backend.fail_post_reads.store(true, Ordering::SeqCst);
        let caller = ctx().with_identity(identity(&root.user_id, ADMIN_USERNAME));
        let err = svc
            .list(
                &caller,
                ListUsersRequest {
                    offset: 0,
                    limit: 20,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ReadError);
    }

    #[tokio::test]
    async fn change_password_requires_the_old_one() {
        let (svc, _) = service_over(Arc::new(MemoryBackend::new()));
        let created = svc
            .create(&ctx(), create_rq("alice123", "+15550001111"))
            .await
            .unwrap();
        let caller = ctx().with_identity(identity(&created.user_id, "alice123"));

        let err = svc
            .change_password(
                &caller,
                ChangePasswordRequest {
                    old_password: "Wrong9$xx".to_string(),
                    new_password: "Newpass1!".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthenticated);

        svc.change_password(
            &caller,
            ChangePasswordRequest {
                old_password: "Abcdef1!".to_string(),
                new_password: "Newpass1!".to_string(),
            },
        )
        .await
        .unwrap();

        assert!(svc
            .login(
                &ctx(),
                LoginRequest {
                    username: "alice123".to_string(),
                    password: "Newpass1!".to_string(),
                },
            )
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn update_is_owner_scoped() {
        let (svc, _) = service_over(Arc::new(MemoryBackend::new()));
        let created = svc
            .create(&ctx(), create_rq("alice123", "+15550001111"))
            .await
            .unwrap();
        let caller = ctx().with_identity(identity(&created.user_id, "alice123"));

        svc.update(
            &caller,
            UpdateUserRequest {
                user_id: created.user_id.clone(),
                nickname: Some("allie1".to_string()),
                ..UpdateUserRequest::default()
            },
        )
        .await
        .unwrap();

        let fetched = svc
            .get(
                &caller,
                GetUserRequest {
                    user_id: created.user_id,
                },
            )
            .await
            .unwrap();
        assert_eq!(fetched.user.nickname, "allie1");
    }
}
