//! Declarative filter conditions and the backend-neutral query they build.
//!
//! A [`Condition`] is a single capability: apply itself to a [`QuerySpec`],
//! returning a new one. Conditions compose into a [`Filter`], an ordered
//! conjunction applied left-to-right; later members are additive (logical
//! AND) and never replace earlier ones. The resulting [`QuerySpec`] is
//! interpreted by each storage backend — rendered to a parameterized SQL
//! predicate by the Postgres backend, evaluated directly by the in-memory
//! backend.
//!
//! Invalid offsets/limits are a validation-layer concern; nothing is
//! enforced here.

use crate::context::CallContext;

/// Sentinel limit meaning "no limit", used internally when materializing
/// unpaginated result sets.
pub const NO_LIMIT: i64 = -1;

/// Column owning an entity row; equality against the caller's identity.
pub const OWNER_COLUMN: &str = "user_id";

/// Scalar (or id-list) value bound into a predicate or a row column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    I64(i64),
    /// Matches any of the listed strings (`IN`-style membership).
    StrList(Vec<String>),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::I64(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Self::StrList(value)
    }
}

impl Value {
    /// The string payload, when this value is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The integer payload, when this value is an integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(n) => Some(*n),
            _ => None,
        }
    }
}

/// Backend-neutral query description: equality predicates plus an optional
/// pagination window. Results are always ordered most-recent-first
/// (descending surrogate key) unless a backend caller overrides it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    predicates: Vec<(String, Value)>,
    offset: Option<i64>,
    limit: Option<i64>,
}

impl QuerySpec {
    /// Adds an equality predicate. Additive; earlier predicates remain.
    #[must_use]
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates.push((column.into(), value.into()));
        self
    }

    /// Sets the pagination window. A later window replaces an earlier one;
    /// `NO_LIMIT` disables the row cap.
    #[must_use]
    pub fn page(mut self, offset: i64, limit: i64) -> Self {
        self.offset = Some(offset);
        self.limit = Some(limit);
        self
    }

    /// The predicates in application order.
    #[must_use]
    pub fn predicates(&self) -> &[(String, Value)] {
        &self.predicates
    }

    /// The pagination offset, if a window was set.
    #[must_use]
    pub fn offset(&self) -> Option<i64> {
        self.offset
    }

    /// The pagination limit, if a window was set. `NO_LIMIT` means none.
    #[must_use]
    pub fn limit(&self) -> Option<i64> {
        self.limit
    }

    /// A copy of this query without its pagination window, used for total
    /// counts that must ignore the page.
    #[must_use]
    pub fn without_page(&self) -> Self {
        Self {
            predicates: self.predicates.clone(),
            offset: None,
            limit: None,
        }
    }
}

/// A predicate fragment that applies itself to a query.
pub trait Condition: Send + Sync {
    /// Applies this condition, returning the extended query.
    fn apply(&self, query: QuerySpec) -> QuerySpec;
}

/// Equality on a named column.
#[derive(Debug, Clone)]
pub struct FieldEq {
    column: String,
    value: Value,
}

impl FieldEq {
    #[must_use]
    pub fn new(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

impl Condition for FieldEq {
    fn apply(&self, query: QuerySpec) -> QuerySpec {
        query.eq(self.column.clone(), self.value.clone())
    }
}

/// Restricts rows to those owned by the calling identity.
///
/// Captures the caller's user id at construction; an unauthenticated
/// context yields an empty owner id, which matches no rows.
#[derive(Debug, Clone)]
pub struct Owner {
    user_id: String,
}

impl Owner {
    #[must_use]
    pub fn of(ctx: &CallContext) -> Self {
        Self {
            user_id: ctx.user_id().unwrap_or_default().to_string(),
        }
    }
}

impl Condition for Owner {
    fn apply(&self, query: QuerySpec) -> QuerySpec {
        query.eq(OWNER_COLUMN, self.user_id.clone())
    }
}

/// Pagination window.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    offset: i64,
    limit: i64,
}

impl Page {
    #[must_use]
    pub fn new(offset: i64, limit: i64) -> Self {
        Self { offset, limit }
    }
}

impl Condition for Page {
    fn apply(&self, query: QuerySpec) -> QuerySpec {
        query.page(self.offset, self.limit)
    }
}

/// Ordered sequence of conditions applied left-to-right.
#[derive(Default)]
pub struct Filter {
    conditions: Vec<Box<dyn Condition>>,
}

impl Filter {
    /// An empty filter matching every row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an equality condition.
    #[must_use]
    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(FieldEq::new(column, value))
    }

    /// Appends an owner condition scoped to the calling identity.
    #[must_use]
    pub fn owner(self, ctx: &CallContext) -> Self {
        self.push(Owner::of(ctx))
    }

    /// Appends a pagination window.
    #[must_use]
    pub fn page(self, offset: i64, limit: i64) -> Self {
        self.push(Page::new(offset, limit))
    }

    /// Appends an arbitrary condition.
    #[must_use]
    pub fn push(mut self, condition: impl Condition + 'static) -> Self {
        self.conditions.push(Box::new(condition));
        self
    }

    /// Builds the query by folding all conditions over an empty query.
    #[must_use]
    pub fn build(&self) -> QuerySpec {
        self.conditions
            .iter()
            .fold(QuerySpec::default(), |query, cond| cond.apply(query))
    }
}

impl Condition for Filter {
    fn apply(&self, query: QuerySpec) -> QuerySpec {
        self.conditions
            .iter()
            .fold(query, |acc, cond| cond.apply(acc))
    }
}

#[cfg(test)]
mod tests {
    use quill_core::{Identity, RequestContext};

    use super::*;

    fn authed_ctx() -> CallContext {
        CallContext::new(RequestContext::new("req-1")).with_identity(Identity {
            user_id: "user-000001".to_string(),
            username: "alice123".to_string(),
        })
    }

    #[test]
    fn conditions_apply_in_order_and_are_additive() {
        let query = Filter::new()
            .eq("username", "alice123")
            .eq("phone", "+15550001111")
            .build();
        assert_eq!(
            query.predicates(),
            &[
                ("username".to_string(), Value::from("alice123")),
                ("phone".to_string(), Value::from("+15550001111")),
            ]
        );
    }

    #[test]
    fn owner_captures_the_calling_identity() {
        let query = Filter::new().owner(&authed_ctx()).build();
        assert_eq!(
            query.predicates(),
            &[(OWNER_COLUMN.to_string(), Value::from("user-000001"))]
        );
    }

    #[test]
    fn owner_of_unauthenticated_context_matches_nothing() {
        let ctx = CallContext::new(RequestContext::new("req-1"));
        let query = Filter::new().owner(&ctx).build();
        assert_eq!(
            query.predicates(),
            &[(OWNER_COLUMN.to_string(), Value::from(""))]
        );
    }

    #[test]
    fn page_sets_the_window() {
        let query = Filter::new().page(40, 20).build();
        assert_eq!(query.offset(), Some(40));
        assert_eq!(query.limit(), Some(20));
    }

    #[test]
    fn without_page_drops_only_the_window() {
        let query = Filter::new().eq("title", "Hello").page(0, 10).build();
        let unpaged = query.without_page();
        assert_eq!(unpaged.predicates(), query.predicates());
        assert_eq!(unpaged.offset(), None);
        assert_eq!(unpaged.limit(), None);
    }

    #[test]
    fn filter_composes_as_a_condition() {
        let inner = Filter::new().eq("title", "Hello");
        let query = Filter::new().push(inner).page(0, 5).build();
        assert_eq!(query.predicates().len(), 1);
        assert_eq!(query.limit(), Some(5));
    }
}
