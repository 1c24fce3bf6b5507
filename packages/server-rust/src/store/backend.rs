//! Storage backend contract.
//!
//! [`StorageBackend`] is the data handle the store layer is built on: it
//! runs parameterized reads/writes described by a
//! [`QuerySpec`](super::filter::QuerySpec) and scopes writes into
//! transactions identified by opaque [`TxToken`]s. The entity stores never
//! see a concrete driver; the in-memory engine backs tests and development,
//! the Postgres engine (feature `postgres`) renders the same queries to
//! SQL.
//!
//! Backends never retry internally: failures surface immediately with
//! their kind classification (`ReadError`/`WriteError`).

use std::collections::BTreeMap;

use async_trait::async_trait;
use quill_core::Result;

use super::filter::{QuerySpec, Value};

/// A row travelling between the entity stores and a backend: column name to
/// scalar value. `BTreeMap` keeps column order deterministic.
pub type Row = BTreeMap<String, Value>;

/// Surrogate-key column present in every table.
pub const ID_COLUMN: &str = "id";

/// Opaque handle to an open transaction.
///
/// Obtained from [`StorageBackend::begin`] and bound into a derived
/// [`CallContext`](crate::context::CallContext); must not be shared outside
/// the context it was bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxToken(pub u64);

/// Static description of a table the backend manages.
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    /// Table name.
    pub name: &'static str,
    /// Columns with a uniqueness constraint.
    pub unique: &'static [&'static str],
}

/// Parameterized storage operations plus transaction scoping.
///
/// Implementations are safe for concurrent independent use. Writes issued
/// within one transaction apply in issue order; cross-request ordering is
/// whatever the engine's isolation provides.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Opens a transaction and returns its token.
    async fn begin(&self) -> Result<TxToken>;

    /// Commits the transaction.
    async fn commit(&self, tx: TxToken) -> Result<()>;

    /// Rolls the transaction back, discarding its writes.
    async fn rollback(&self, tx: TxToken) -> Result<()>;

    /// Inserts a row, returning the assigned surrogate key.
    ///
    /// Fails with `WriteError` on constraint violation or I/O failure.
    async fn insert(&self, tx: Option<TxToken>, table: &str, row: Row) -> Result<u64>;

    /// Full-row update keyed by the row's [`ID_COLUMN`].
    async fn update(&self, tx: Option<TxToken>, table: &str, row: Row) -> Result<()>;

    /// Deletes all rows matching the query, returning the count removed.
    /// Zero matches is not an error.
    async fn delete(&self, tx: Option<TxToken>, table: &str, query: &QuerySpec) -> Result<u64>;

    /// Fetches rows matching the query, most-recent-first, honoring the
    /// query's pagination window.
    async fn fetch(&self, tx: Option<TxToken>, table: &str, query: &QuerySpec) -> Result<Vec<Row>>;

    /// Counts rows matching the query's predicates. The pagination window
    /// is ignored.
    async fn count(&self, tx: Option<TxToken>, table: &str, query: &QuerySpec) -> Result<i64>;
}
