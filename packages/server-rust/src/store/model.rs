//! Persisted row types and their table schemas.

use quill_core::{Error, Result};

use super::backend::{Row, TableSchema, ID_COLUMN};
use super::filter::Value;

/// Users table.
pub const USERS_TABLE: &str = "users";
/// Posts table.
pub const POSTS_TABLE: &str = "posts";

/// Schema of the users table: unique username, unique derived user id,
/// unique phone.
#[must_use]
pub const fn users_schema() -> TableSchema {
    TableSchema {
        name: USERS_TABLE,
        unique: &["username", "user_id", "phone"],
    }
}

/// Schema of the posts table: unique derived post id.
#[must_use]
pub const fn posts_schema() -> TableSchema {
    TableSchema {
        name: POSTS_TABLE,
        unique: &["post_id"],
    }
}

/// Current wall-clock time as unix epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A persisted user row. `password` holds the encrypted form; it never
/// leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserRecord {
    /// Surrogate key, assigned by the backend on insert.
    pub id: u64,
    /// Derived public resource id, assigned after the first insert.
    pub user_id: String,
    pub username: String,
    pub password: String,
    pub nickname: String,
    pub email: String,
    pub phone: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl UserRecord {
    /// Converts to a backend row.
    #[must_use]
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert(ID_COLUMN.to_string(), Value::I64(i64_from_key(self.id)));
        row.insert("user_id".to_string(), Value::Str(self.user_id.clone()));
        row.insert("username".to_string(), Value::Str(self.username.clone()));
        row.insert("password".to_string(), Value::Str(self.password.clone()));
        row.insert("nickname".to_string(), Value::Str(self.nickname.clone()));
        row.insert("email".to_string(), Value::Str(self.email.clone()));
        row.insert("phone".to_string(), Value::Str(self.phone.clone()));
        row.insert("created_at".to_string(), Value::I64(self.created_at));
        row.insert("updated_at".to_string(), Value::I64(self.updated_at));
        row
    }

    /// Rebuilds a record from a backend row.
    ///
    /// # Errors
    ///
    /// Returns `ReadError` when a column is missing or has the wrong type.
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: key_from_row(row)?,
            user_id: str_column(row, "user_id")?,
            username: str_column(row, "username")?,
            password: str_column(row, "password")?,
            nickname: str_column(row, "nickname")?,
            email: str_column(row, "email")?,
            phone: str_column(row, "phone")?,
            created_at: i64_column(row, "created_at")?,
            updated_at: i64_column(row, "updated_at")?,
        })
    }
}

/// A persisted post row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PostRecord {
    /// Surrogate key, assigned by the backend on insert.
    pub id: u64,
    /// Derived public resource id, assigned after the first insert.
    pub post_id: String,
    /// Resource id of the owning user.
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PostRecord {
    /// Converts to a backend row.
    #[must_use]
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert(ID_COLUMN.to_string(), Value::I64(i64_from_key(self.id)));
        row.insert("post_id".to_string(), Value::Str(self.post_id.clone()));
        row.insert("user_id".to_string(), Value::Str(self.user_id.clone()));
        row.insert("title".to_string(), Value::Str(self.title.clone()));
        row.insert("content".to_string(), Value::Str(self.content.clone()));
        row.insert("created_at".to_string(), Value::I64(self.created_at));
        row.insert("updated_at".to_string(), Value::I64(self.updated_at));
        row
    }

    /// Rebuilds a record from a backend row.
    ///
    /// # Errors
    ///
    /// Returns `ReadError` when a column is missing or has the wrong type.
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: key_from_row(row)?,
            post_id: str_column(row, "post_id")?,
            user_id: str_column(row, "user_id")?,
            title: str_column(row, "title")?,
            content: str_column(row, "content")?,
            created_at: i64_column(row, "created_at")?,
            updated_at: i64_column(row, "updated_at")?,
        })
    }
}

fn i64_from_key(key: u64) -> i64 {
    i64::try_from(key).unwrap_or(i64::MAX)
}

fn key_from_row(row: &Row) -> Result<u64> {
    let raw = i64_column(row, ID_COLUMN)?;
    u64::try_from(raw).map_err(|_| Error::read(format!("negative surrogate key: {raw}")))
}

fn str_column(row: &Row, column: &str) -> Result<String> {
    row.get(column)
        .and_then(|value| value.as_str())
        .map(ToString::to_string)
        .ok_or_else(|| Error::read(format!("missing string column: {column}")))
}

fn i64_column(row: &Row, column: &str) -> Result<i64> {
    row.get(column)
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::read(format!("missing integer column: {column}")))
}

#[cfg(test)]
mod tests {
    use quill_core::ErrorKind;

    use super::*;

    fn sample_user() -> UserRecord {
        UserRecord {
            id: 1,
            user_id: "user-000001".to_string(),
            username: "alice123".to_string(),
            password: "sha256$ab$cd".to_string(),
            nickname: "alice".to_string(),
            email: "alice@example.com".to_string(),
            phone: "+15550001111".to_string(),
            created_at: 1_700_000_000_000,
            updated_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn user_row_roundtrip() {
        let record = sample_user();
        let back = UserRecord::from_row(&record.to_row()).expect("from_row");
        assert_eq!(back, record);
    }

    #[test]
    fn post_row_roundtrip() {
        let record = PostRecord {
            id: 9,
            post_id: "post-000009".to_string(),
            user_id: "user-000001".to_string(),
            title: "Hello".to_string(),
            content: "First post.".to_string(),
            created_at: 1,
            updated_at: 2,
        };
        let back = PostRecord::from_row(&record.to_row()).expect("from_row");
        assert_eq!(back, record);
    }

    #[test]
    fn missing_column_is_a_read_error() {
        let mut row = sample_user().to_row();
        row.remove("email");
        let err = UserRecord::from_row(&row).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ReadError);
    }

    #[test]
    fn schemas_declare_unique_columns() {
        assert!(users_schema().unique.contains(&"username"));
        assert!(users_schema().unique.contains(&"phone"));
        assert!(posts_schema().unique.contains(&"post_id"));
    }
}
