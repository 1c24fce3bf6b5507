//! Field-rule tables for user and post requests.
//!
//! Rules are keyed by wire field name and evaluated through the generic
//! engine in `quill_core::validation`. One table serves every request
//! shape of a domain; rules for fields a request does not expose are
//! skipped. Cross-field checks (password confirmation) run as dedicated
//! pre-checks before the generic pass.

use std::sync::LazyLock;

use quill_core::messages::{
    ChangePasswordRequest, CreatePostRequest, CreateUserRequest, DeletePostRequest,
    DeleteUserRequest, GetPostRequest, GetUserRequest, ListPostsRequest, ListUsersRequest,
    LoginRequest, RefreshTokenRequest, UpdatePostRequest, UpdateUserRequest,
};
use quill_core::validation::{validate_all_fields, FieldValue, Rules};
use quill_core::{Error, Result};
use regex::Regex;

static HAS_LETTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z]").expect("regex"));
static HAS_DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d").expect("regex"));
static HAS_SPECIAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\W_]").expect("regex"));
static NAME_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("regex"));
static EMAIL_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("regex")
});
static PHONE_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("regex"));

fn valid_password(value: &FieldValue<'_>) -> std::result::Result<(), String> {
    let FieldValue::Str(password) = value else {
        return Ok(());
    };
    if password.len() < 8 || password.len() > 32 {
        return Err("password must be between 8 and 32 characters long".to_string());
    }
    if !HAS_LETTER.is_match(password)
        || !HAS_DIGIT.is_match(password)
        || !HAS_SPECIAL.is_match(password)
    {
        return Err(
            "password must contain at least one letter, one number, and one special character"
                .to_string(),
        );
    }
    Ok(())
}

fn valid_name(value: &FieldValue<'_>) -> std::result::Result<(), String> {
    let FieldValue::Str(name) = value else {
        return Ok(());
    };
    if name.len() < 6 || name.len() > 20 {
        return Err("name must be between 6 and 20 characters long".to_string());
    }
    if !NAME_FORMAT.is_match(name) {
        return Err(
            "name can only contain letters, numbers, underscores, and hyphens".to_string(),
        );
    }
    Ok(())
}

fn valid_email(value: &FieldValue<'_>) -> std::result::Result<(), String> {
    match value {
        FieldValue::Str(email) if !EMAIL_FORMAT.is_match(email) => {
            Err("invalid email format".to_string())
        }
        _ => Ok(()),
    }
}

fn valid_phone(value: &FieldValue<'_>) -> std::result::Result<(), String> {
    match value {
        FieldValue::Str(phone) if !PHONE_FORMAT.is_match(phone) => {
            Err("phone must be a valid international number".to_string())
        }
        _ => Ok(()),
    }
}

fn valid_offset(value: &FieldValue<'_>) -> std::result::Result<(), String> {
    match value {
        FieldValue::I64(offset) if *offset < 0 => Err("offset must not be negative".to_string()),
        _ => Ok(()),
    }
}

fn valid_limit(value: &FieldValue<'_>) -> std::result::Result<(), String> {
    match value {
        FieldValue::I64(limit) if *limit <= 0 => Err("limit must be positive".to_string()),
        _ => Ok(()),
    }
}

fn non_empty(label: &'static str) -> impl Fn(&FieldValue<'_>) -> std::result::Result<(), String> {
    move |value| match value {
        FieldValue::Str(s) if s.is_empty() => Err(format!("{label} cannot be empty")),
        _ => Ok(()),
    }
}

fn non_empty_id_list(value: &FieldValue<'_>) -> std::result::Result<(), String> {
    let FieldValue::StrList(ids) = value else {
        return Ok(());
    };
    if ids.is_empty() {
        return Err("postIDs cannot be empty".to_string());
    }
    if ids.iter().any(String::is_empty) {
        return Err("postID cannot be empty".to_string());
    }
    Ok(())
}

/// Stateless request validator consulted by the dispatch adapter.
#[derive(Debug, Default, Clone, Copy)]
pub struct Validator;

impl Validator {
    /// Rule table shared by every user request shape.
    #[must_use]
    pub fn user_rules() -> Rules {
        Rules::new()
            .rule("username", valid_name)
            .rule("nickname", valid_name)
            .rule("password", valid_password)
            .rule("oldPassword", valid_password)
            .rule("newPassword", valid_password)
            .rule("email", valid_email)
            .rule("phone", valid_phone)
            .rule("offset", valid_offset)
            .rule("limit", valid_limit)
    }

    /// Rule table shared by every post request shape.
    #[must_use]
    pub fn post_rules() -> Rules {
        Rules::new()
            .rule("title", non_empty("title"))
            .rule("postID", non_empty("postID"))
            .rule("postIDs", non_empty_id_list)
            .rule("offset", valid_offset)
            .rule("limit", valid_limit)
    }

    /// # Errors
    ///
    /// `InvalidArgument` when the confirmation password differs or any
    /// field rule is violated.
    pub fn validate_create_user(rq: &CreateUserRequest) -> Result<()> {
        if rq.password != rq.re_password {
            return Err(Error::invalid_argument(
                "confirmation password must match the password",
            ));
        }
        validate_all_fields(rq, &Self::user_rules())
    }

    pub fn validate_update_user(rq: &UpdateUserRequest) -> Result<()> {
        validate_all_fields(rq, &Self::user_rules())
    }

    pub fn validate_delete_user(rq: &DeleteUserRequest) -> Result<()> {
        validate_all_fields(rq, &Self::user_rules())
    }

    pub fn validate_get_user(rq: &GetUserRequest) -> Result<()> {
        validate_all_fields(rq, &Self::user_rules())
    }

    pub fn validate_list_users(rq: &ListUsersRequest) -> Result<()> {
        validate_all_fields(rq, &Self::user_rules())
    }

    pub fn validate_login(rq: &LoginRequest) -> Result<()> {
        validate_all_fields(rq, &Self::user_rules())
    }

    pub fn validate_refresh_token(rq: &RefreshTokenRequest) -> Result<()> {
        validate_all_fields(rq, &Self::user_rules())
    }

    pub fn validate_change_password(rq: &ChangePasswordRequest) -> Result<()> {
        validate_all_fields(rq, &Self::user_rules())
    }

    pub fn validate_create_post(rq: &CreatePostRequest) -> Result<()> {
        validate_all_fields(rq, &Self::post_rules())
    }

    pub fn validate_update_post(rq: &UpdatePostRequest) -> Result<()> {
        validate_all_fields(rq, &Self::post_rules())
    }

    pub fn validate_delete_post(rq: &DeletePostRequest) -> Result<()> {
        validate_all_fields(rq, &Self::post_rules())
    }

    pub fn validate_get_post(rq: &GetPostRequest) -> Result<()> {
        validate_all_fields(rq, &Self::post_rules())
    }

    pub fn validate_list_posts(rq: &ListPostsRequest) -> Result<()> {
        validate_all_fields(rq, &Self::post_rules())
    }
}

#[cfg(test)]
mod tests {
    use quill_core::ErrorKind;

    use super::*;

    fn create_user(password: &str) -> CreateUserRequest {
        CreateUserRequest {
            username: "alice123".to_string(),
            password: password.to_string(),
            re_password: password.to_string(),
            nickname: None,
            email: "alice@example.com".to_string(),
            phone: "+15550001111".to_string(),
        }
    }

    #[test]
    fn accepts_a_conforming_password() {
        assert!(Validator::validate_create_user(&create_user("Abcdef1!")).is_ok());
    }

    #[test]
    fn rejects_a_short_password() {
        let err = Validator::validate_create_user(&create_user("abc")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        assert!(err.message.contains("between 8 and 32"));
    }

    #[test]
    fn rejects_a_password_without_a_special_character() {
        let err = Validator::validate_create_user(&create_user("Abcdefg1")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn rejects_a_mismatched_confirmation_before_field_rules() {
        let mut rq = create_user("Abcdef1!");
        rq.re_password = "Other2@x".to_string();
        let err = Validator::validate_create_user(&rq).unwrap_err();
        assert!(err.message.contains("confirmation"));
    }

    #[test]
    fn rejects_a_malformed_email() {
        let mut rq = create_user("Abcdef1!");
        rq.email = "not-an-email".to_string();
        let err = Validator::validate_create_user(&rq).unwrap_err();
        assert_eq!(err.message, "invalid email format");
    }

    #[test]
    fn rejects_a_short_username() {
        let mut rq = create_user("Abcdef1!");
        rq.username = "abc".to_string();
        assert!(Validator::validate_create_user(&rq).is_err());
    }

    #[test]
    fn list_rejects_negative_offset_and_zero_limit() {
        let err = Validator::validate_list_users(&ListUsersRequest {
            offset: -1,
            limit: 20,
        })
        .unwrap_err();
        assert!(err.message.contains("offset"));

        let err = Validator::validate_list_users(&ListUsersRequest {
            offset: 0,
            limit: 0,
        })
        .unwrap_err();
        assert!(err.message.contains("limit"));
    }

    #[test]
    fn update_user_skips_rules_for_unset_fields() {
        let rq = UpdateUserRequest {
            user_id: "user-000001".to_string(),
            username: None,
            nickname: None,
            email: None,
            phone: None,
        };
        assert!(Validator::validate_update_user(&rq).is_ok());
    }

    #[test]
    fn delete_post_rejects_empty_id_lists() {
        let err =
            Validator::validate_delete_post(&DeletePostRequest { post_ids: vec![] }).unwrap_err();
        assert!(err.message.contains("postIDs"));

        let err = Validator::validate_delete_post(&DeletePostRequest {
            post_ids: vec![String::new()],
        })
        .unwrap_err();
        assert!(err.message.contains("postID"));
    }

    #[test]
    fn create_post_requires_a_title() {
        let err = Validator::validate_create_post(&CreatePostRequest {
            title: String::new(),
            content: "body".to_string(),
        })
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn login_accepts_reasonable_credentials() {
        assert!(Validator::validate_login(&LoginRequest {
            username: "alice123".to_string(),
            password: "Abcdef1!".to_string(),
        })
        .is_ok());
    }
}
