//! Authorization collaborator contract.
//!
//! The policy store (subject/object/action triples) lives outside this
//! server; the dispatch pipeline only consults the [`Authorizer`] trait
//! after authentication. Denials surface as `PermissionDenied`.

use quill_core::Result;

/// Decides whether `subject` may perform `action` on `object`.
pub trait Authorizer: Send + Sync {
    /// Returns `Ok(true)` to allow the call.
    ///
    /// # Errors
    ///
    /// Implementations may fail while consulting their policy store; a
    /// failure is treated as a denial by the dispatch pipeline.
    fn authorize(&self, subject: &str, object: &str, action: &str) -> Result<bool>;
}

/// Permissive default used when no policy engine is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _subject: &str, _object: &str, _action: &str) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_all_allows_everything() {
        let authz = AllowAll;
        assert!(authz.authorize("user-000001", "LIST_USERS", "call").unwrap());
    }
}
