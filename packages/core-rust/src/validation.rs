//! Generic field validation engine.
//!
//! Validation is declarative: a [`Rules`] table maps field names to
//! predicates, and [`validate_all_fields`] evaluates the table against a
//! typed field view of the request ([`Validatable`]). Rules run in
//! registration order and the first violation aborts the call with
//! `InvalidArgument` (fail-fast). Fields without a registered rule are
//! ignored; registered fields the request does not expose are skipped, so
//! one rule table can serve every request shape of a domain.
//!
//! Cross-field checks (e.g. password confirmation) do not fit the
//! one-field-one-predicate model and are expressed as dedicated pre-checks
//! in the operation validators instead.

use crate::error::{Error, Result};
use crate::messages;

/// Typed view of a single request field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Str(&'a str),
    I64(i64),
    StrList(&'a [String]),
}

/// A request that exposes its fields by name for rule evaluation.
///
/// Returning `None` means "this request shape has no such field" (or the
/// optional field is unset); the rule for that name is then skipped.
pub trait Validatable {
    fn field(&self, name: &str) -> Option<FieldValue<'_>>;
}

type RuleFn = Box<dyn Fn(&FieldValue<'_>) -> std::result::Result<(), String> + Send + Sync>;

/// Ordered table of per-field validation rules.
#[derive(Default)]
pub struct Rules {
    entries: Vec<(&'static str, RuleFn)>,
}

impl Rules {
    /// Creates an empty rule table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registers a rule for a field name. Registration order is evaluation
    /// order.
    #[must_use]
    pub fn rule<F>(mut self, field: &'static str, rule: F) -> Self
    where
        F: Fn(&FieldValue<'_>) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.entries.push((field, Box::new(rule)));
        self
    }

    /// Number of registered rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Evaluates every registered rule against the request's field view.
///
/// # Errors
///
/// Returns `InvalidArgument` carrying the first violated rule's message.
pub fn validate_all_fields<R: Validatable>(request: &R, rules: &Rules) -> Result<()> {
    for (field, rule) in &rules.entries {
        if let Some(value) = request.field(field) {
            if let Err(violation) = rule(&value) {
                return Err(Error::invalid_argument(violation));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Field views for request types
// ---------------------------------------------------------------------------

fn opt_str(value: &Option<String>) -> Option<FieldValue<'_>> {
    value.as_deref().map(FieldValue::Str)
}

impl Validatable for messages::CreateUserRequest {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "username" => Some(FieldValue::Str(&self.username)),
            "password" => Some(FieldValue::Str(&self.password)),
            "nickname" => opt_str(&self.nickname),
            "email" => Some(FieldValue::Str(&self.email)),
            "phone" => Some(FieldValue::Str(&self.phone)),
            _ => None,
        }
    }
}

impl Validatable for messages::UpdateUserRequest {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "username" => opt_str(&self.username),
            "nickname" => opt_str(&self.nickname),
            "email" => opt_str(&self.email),
            "phone" => opt_str(&self.phone),
            _ => None,
        }
    }
}

impl Validatable for messages::DeleteUserRequest {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "userID" => Some(FieldValue::Str(&self.user_id)),
            _ => None,
        }
    }
}

impl Validatable for messages::GetUserRequest {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "userID" => Some(FieldValue::Str(&self.user_id)),
            _ => None,
        }
    }
}

impl Validatable for messages::ListUsersRequest {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "offset" => Some(FieldValue::I64(self.offset)),
            "limit" => Some(FieldValue::I64(self.limit)),
            _ => None,
        }
    }
}

impl Validatable for messages::LoginRequest {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "username" => Some(FieldValue::Str(&self.username)),
            "password" => Some(FieldValue::Str(&self.password)),
            _ => None,
        }
    }
}

impl Validatable for messages::RefreshTokenRequest {
    fn field(&self, _name: &str) -> Option<FieldValue<'_>> {
        None
    }
}

impl Validatable for messages::ChangePasswordRequest {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "oldPassword" => Some(FieldValue::Str(&self.old_password)),
            "newPassword" => Some(FieldValue::Str(&self.new_password)),
            _ => None,
        }
    }
}

impl Validatable for messages::CreatePostRequest {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "title" => Some(FieldValue::Str(&self.title)),
            _ => None,
        }
    }
}

impl Validatable for messages::UpdatePostRequest {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "postID" => Some(FieldValue::Str(&self.post_id)),
            "title" => opt_str(&self.title),
            _ => None,
        }
    }
}

impl Validatable for messages::DeletePostRequest {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "postIDs" => Some(FieldValue::StrList(&self.post_ids)),
            _ => None,
        }
    }
}

impl Validatable for messages::GetPostRequest {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "postID" => Some(FieldValue::Str(&self.post_id)),
            _ => None,
        }
    }
}

impl Validatable for messages::ListPostsRequest {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "offset" => Some(FieldValue::I64(self.offset)),
            "limit" => Some(FieldValue::I64(self.limit)),
            "title" => opt_str(&self.title),
            _ => None,
        }
    }
}

impl Validatable for messages::HealthzRequest {
    fn field(&self, _name: &str) -> Option<FieldValue<'_>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::messages::{ListUsersRequest, LoginRequest};

    fn non_negative(value: &FieldValue<'_>) -> std::result::Result<(), String> {
        match value {
            FieldValue::I64(n) if *n < 0 => Err("must not be negative".to_string()),
            _ => Ok(()),
        }
    }

    fn non_empty(value: &FieldValue<'_>) -> std::result::Result<(), String> {
        match value {
            FieldValue::Str(s) if s.is_empty() => Err("must not be empty".to_string()),
            _ => Ok(()),
        }
    }

    #[test]
    fn passes_when_all_rules_hold() {
        let rules = Rules::new()
            .rule("username", non_empty)
            .rule("password", non_empty);
        let rq = LoginRequest {
            username: "alice123".to_string(),
            password: "Abcdef1!".to_string(),
        };
        assert!(validate_all_fields(&rq, &rules).is_ok());
    }

    #[test]
    fn fails_fast_on_first_violation_in_registration_order() {
        let rules = Rules::new()
            .rule("username", |_| Err("first".to_string()))
            .rule("password", |_| Err("second".to_string()));
        let rq = LoginRequest {
            username: String::new(),
            password: String::new(),
        };
        let err = validate_all_fields(&rq, &rules).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        assert_eq!(err.message, "first");
    }

    #[test]
    fn rules_for_absent_fields_are_skipped() {
        // LoginRequest has no "offset" field; the rule must not fire.
        let rules = Rules::new().rule("offset", |_| Err("unreachable".to_string()));
        let rq = LoginRequest {
            username: "alice123".to_string(),
            password: "pw".to_string(),
        };
        assert!(validate_all_fields(&rq, &rules).is_ok());
    }

    #[test]
    fn fields_without_rules_are_ignored() {
        let rules = Rules::new().rule("offset", non_negative);
        let rq = ListUsersRequest {
            offset: 0,
            limit: -5, // no rule registered for "limit" here
        };
        assert!(validate_all_fields(&rq, &rules).is_ok());
    }

    #[test]
    fn unset_optional_fields_are_skipped() {
        let rules = Rules::new().rule("nickname", non_empty);
        let rq = crate::messages::CreateUserRequest {
            username: "alice123".to_string(),
            password: "pw".to_string(),
            re_password: "pw".to_string(),
            nickname: None,
            email: "a@b.co".to_string(),
            phone: "+15550001111".to_string(),
        };
        assert!(validate_all_fields(&rq, &rules).is_ok());
    }
}
