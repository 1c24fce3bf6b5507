//! Generic dispatch adapter.
//!
//! Every operation, on either transport, flows through the same shape:
//! fill defaults, validate, invoke. Validation always runs before the
//! business method, and invocation errors are returned intact; the outer
//! interceptor annotates them with the request id before serialization.

use std::future::Future;

use quill_core::messages::{
    ChangePasswordRequest, CreatePostRequest, CreateUserRequest, DeletePostRequest,
    DeleteUserRequest, GetPostRequest, GetUserRequest, HealthzRequest, ListPostsRequest,
    ListUsersRequest, LoginRequest, RefreshTokenRequest, UpdatePostRequest, UpdateUserRequest,
};
use quill_core::Result;

use crate::context::CallContext;

/// Page size used when a list request leaves `limit` unset.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Optional default-filling capability for request types.
///
/// Dispatch is static per request type: types that have defaults override
/// [`FillDefaults::fill_defaults`], all others keep the no-op body.
pub trait FillDefaults {
    /// Fills unset fields with their defaults before validation.
    fn fill_defaults(&mut self) {}
}

impl FillDefaults for CreateUserRequest {}
impl FillDefaults for UpdateUserRequest {}
impl FillDefaults for DeleteUserRequest {}
impl FillDefaults for GetUserRequest {}
impl FillDefaults for LoginRequest {}
impl FillDefaults for RefreshTokenRequest {}
impl FillDefaults for ChangePasswordRequest {}
impl FillDefaults for CreatePostRequest {}
impl FillDefaults for UpdatePostRequest {}
impl FillDefaults for DeletePostRequest {}
impl FillDefaults for GetPostRequest {}
impl FillDefaults for HealthzRequest {}

impl FillDefaults for ListUsersRequest {
    fn fill_defaults(&mut self) {
        if self.limit == 0 {
            self.limit = DEFAULT_PAGE_SIZE;
        }
    }
}

impl FillDefaults for ListPostsRequest {
    fn fill_defaults(&mut self) {
        if self.limit == 0 {
            self.limit = DEFAULT_PAGE_SIZE;
        }
    }
}

/// Runs one operation through the uniform defaults → validate → invoke
/// sequence.
///
/// # Errors
///
/// Propagates the validator's `InvalidArgument` (the business method is
/// then never invoked) or the business method's error, unchanged.
pub async fn dispatch<Rq, Rsp, V, F, Fut>(
    ctx: CallContext,
    mut rq: Rq,
    validate: V,
    invoke: F,
) -> Result<Rsp>
where
    Rq: FillDefaults,
    V: FnOnce(&Rq) -> Result<()>,
    F: FnOnce(CallContext, Rq) -> Fut,
    Fut: Future<Output = Result<Rsp>>,
{
    rq.fill_defaults();
    validate(&rq)?;
    invoke(ctx, rq).await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use quill_core::{Error, ErrorKind, RequestContext};

    use super::*;

    fn ctx() -> CallContext {
        CallContext::new(RequestContext::new("req-1"))
    }

    #[tokio::test]
    async fn validation_failure_prevents_invocation() {
        let invoked = AtomicBool::new(false);
        let result: Result<()> = dispatch(
            ctx(),
            ListUsersRequest::default(),
            |_| Err(Error::invalid_argument("nope")),
            |_, _| async {
                invoked.store(true, Ordering::SeqCst);
                Ok(())
            },
        )
        .await;

        assert_eq!(result.unwrap_err().kind, ErrorKind::InvalidArgument);
        assert!(!invoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn defaults_are_filled_before_validation() {
        let result = dispatch(
            ctx(),
            ListUsersRequest {
                offset: 0,
                limit: 0,
            },
            |rq| {
                assert_eq!(rq.limit, DEFAULT_PAGE_SIZE);
                Ok(())
            },
            |_, rq| async move { Ok(rq.limit) },
        )
        .await
        .unwrap();
        assert_eq!(result, DEFAULT_PAGE_SIZE);
    }

    #[tokio::test]
    async fn explicit_limit_is_not_overridden() {
        let limit = dispatch(
            ctx(),
            ListPostsRequest {
                offset: 0,
                limit: 5,
                title: None,
            },
            |_| Ok(()),
            |_, rq| async move { Ok(rq.limit) },
        )
        .await
        .unwrap();
        assert_eq!(limit, 5);
    }

    #[tokio::test]
    async fn invocation_errors_pass_through_unchanged() {
        let result: Result<()> = dispatch(
            ctx(),
            GetUserRequest {
                user_id: "user-000001".to_string(),
            },
            |_| Ok(()),
            |_, _| async { Err(Error::not_found("user not found")) },
        )
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.message, "user not found");
    }
}
