//! In-memory [`StorageBackend`] for tests and development.
//!
//! Tables live in a `parking_lot::RwLock`; open transactions buffer their
//! writes in per-transaction overlays keyed by [`TxToken`] in a `DashMap`.
//! Reads inside a transaction see base rows merged with the overlay;
//! reads outside see only committed state, so a rolled-back transaction
//! leaves no trace. Surrogate keys are allocated from per-table atomic
//! sequences and are never reused, even when a transaction rolls back.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use quill_core::{Error, Result};

use super::backend::{Row, StorageBackend, TableSchema, TxToken, ID_COLUMN};
use super::filter::{QuerySpec, Value, NO_LIMIT};
use super::model::{posts_schema, users_schema};

struct TableData {
    schema: TableSchema,
    next_id: AtomicU64,
    rows: BTreeMap<u64, Row>,
}

impl TableData {
    fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            next_id: AtomicU64::new(0),
            rows: BTreeMap::new(),
        }
    }
}

#[derive(Default)]
struct TableOverlay {
    inserted: BTreeMap<u64, Row>,
    updated: BTreeMap<u64, Row>,
    deleted: BTreeSet<u64>,
}

#[derive(Default)]
struct TxState {
    overlays: BTreeMap<String, TableOverlay>,
}

/// In-memory storage engine with snapshot-style transactions.
pub struct MemoryBackend {
    base: RwLock<BTreeMap<String, TableData>>,
    txs: DashMap<u64, TxState>,
    next_tx: AtomicU64,
}

impl MemoryBackend {
    /// Creates an engine with the users and posts tables registered.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tables(&[users_schema(), posts_schema()])
    }

    /// Creates an engine managing the given tables.
    #[must_use]
    pub fn with_tables(schemas: &[TableSchema]) -> Self {
        let mut tables = BTreeMap::new();
        for schema in schemas {
            tables.insert(schema.name.to_string(), TableData::new(*schema));
        }
        Self {
            base: RwLock::new(tables),
            txs: DashMap::new(),
            next_tx: AtomicU64::new(0),
        }
    }

    fn overlay_op<T>(
        &self,
        tx: TxToken,
        table: &str,
        op: impl FnOnce(&mut TableOverlay) -> T,
    ) -> Result<T> {
        let mut state = self
            .txs
            .get_mut(&tx.0)
            .ok_or_else(|| Error::internal(format!("unknown transaction: {}", tx.0)))?;
        let overlay = state.overlays.entry(table.to_string()).or_default();
        Ok(op(overlay))
    }

    /// Rows visible to the given transaction (or to no transaction),
    /// filtered by the query's predicates and sorted most-recent-first.
    fn visible_rows(
        &self,
        tx: Option<TxToken>,
        table: &str,
        query: &QuerySpec,
    ) -> Result<Vec<(u64, Row)>> {
        let base = self.base.read();
        let data = table_data(&base, table)?;

        let mut merged: BTreeMap<u64, Row> = BTreeMap::new();
        for (id, row) in &data.rows {
            merged.insert(*id, row.clone());
        }
        if let Some(token) = tx {
            let state = self
                .txs
                .get(&token.0)
                .ok_or_else(|| Error::internal(format!("unknown transaction: {}", token.0)))?;
            if let Some(overlay) = state.overlays.get(table) {
                for id in &overlay.deleted {
                    merged.remove(id);
                }
                for (id, row) in &overlay.updated {
                    merged.insert(*id, row.clone());
                }
                for (id, row) in &overlay.inserted {
                    merged.insert(*id, row.clone());
                }
            }
        }

        let mut rows: Vec<(u64, Row)> = merged
            .into_iter()
            .filter(|(_, row)| matches(query, row))
            .collect();
        rows.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(rows)
    }

    fn check_unique(
        &self,
        tx: Option<TxToken>,
        table: &str,
        row: &Row,
        exclude_id: u64,
    ) -> Result<()> {
        let schema = {
            let base = self.base.read();
            table_data(&base, table)?.schema
        };
        for column in schema.unique {
            let Some(value) = row.get(*column) else {
                continue;
            };
            // Empty strings are placeholders until the post-insert hook
            // fills the derived id; they do not participate in uniqueness.
            if value.as_str() == Some("") {
                continue;
            }
            let probe = QuerySpec::default().eq(*column, value.clone());
            let hit = self
                .visible_rows(tx, table, &probe)?
                .into_iter()
                .any(|(id, _)| id != exclude_id);
            if hit {
                return Err(Error::write(format!(
                    "duplicate value for unique column {table}.{column}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn table_data<'a>(
    tables: &'a BTreeMap<String, TableData>,
    table: &str,
) -> Result<&'a TableData> {
    tables
        .get(table)
        .ok_or_else(|| Error::internal(format!("unknown table: {table}")))
}

fn matches(query: &QuerySpec, row: &Row) -> bool {
    query.predicates().iter().all(|(column, wanted)| {
        match (wanted, row.get(column)) {
            (Value::StrList(list), Some(Value::Str(actual))) => list.iter().any(|s| s == actual),
            (wanted, Some(actual)) => wanted == actual,
            (_, None) => false,
        }
    })
}

fn apply_window(rows: Vec<(u64, Row)>, query: &QuerySpec) -> Vec<Row> {
    let offset = usize::try_from(query.offset().unwrap_or(0).max(0)).unwrap_or(0);
    let iter = rows.into_iter().skip(offset).map(|(_, row)| row);
    match query.limit() {
        Some(limit) if limit != NO_LIMIT => {
            let cap = usize::try_from(limit.max(0)).unwrap_or(0);
            iter.take(cap).collect()
        }
        _ => iter.collect(),
    }
}

/// Scans candidate final rows of a table for duplicate unique values.
fn commit_conflict(schema: TableSchema, rows: &[&Row]) -> Option<String> {
    for column in schema.unique {
        let mut seen: HashMap<&str, u32> = HashMap::new();
        for row in rows {
            if let Some(Value::Str(value)) = row.get(*column) {
                if value.is_empty() {
                    continue;
                }
                let count = seen.entry(value.as_str()).or_insert(0);
                *count += 1;
                if *count > 1 {
                    return Some(format!(
                        "duplicate value for unique column {}.{column}",
                        schema.name
                    ));
                }
            }
        }
    }
    None
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn begin(&self) -> Result<TxToken> {
        let token = self.next_tx.fetch_add(1, Ordering::Relaxed) + 1;
        self.txs.insert(token, TxState::default());
        Ok(TxToken(token))
    }

    async fn commit(&self, tx: TxToken) -> Result<()> {
        let (_, state) = self
            .txs
            .remove(&tx.0)
            .ok_or_else(|| Error::internal(format!("unknown transaction: {}", tx.0)))?;

        let mut base = self.base.write();

        // Validate every table's final state before touching any of them,
        // so a conflicting commit leaves the base untouched.
        for (table, overlay) in &state.overlays {
            let data = table_data(&base, table)?;
            let candidates: Vec<&Row> = data
                .rows
                .iter()
                .filter(|(id, _)| {
                    !overlay.deleted.contains(id) && !overlay.updated.contains_key(id)
                })
                .map(|(_, row)| row)
                .chain(overlay.updated.values())
                .chain(overlay.inserted.values())
                .collect();
            if let Some(conflict) = commit_conflict(data.schema, &candidates) {
                return Err(Error::write(conflict));
            }
        }

        for (table, overlay) in state.overlays {
            let Some(data) = base.get_mut(&table) else {
                continue;
            };
            for id in overlay.deleted {
                data.rows.remove(&id);
            }
            for (id, row) in overlay.updated {
                data.rows.insert(id, row);
            }
            for (id, row) in overlay.inserted {
                data.rows.insert(id, row);
            }
        }
        Ok(())
    }

    async fn rollback(&self, tx: TxToken) -> Result<()> {
        self.txs
            .remove(&tx.0)
            .map(|_| ())
            .ok_or_else(|| Error::internal(format!("unknown transaction: {}", tx.0)))
    }

    async fn insert(&self, tx: Option<TxToken>, table: &str, mut row: Row) -> Result<u64> {
        let id = {
            let base = self.base.read();
            let data = table_data(&base, table)?;
            data.next_id.fetch_add(1, Ordering::Relaxed) + 1
        };
        row.insert(
            ID_COLUMN.to_string(),
            Value::I64(i64::try_from(id).unwrap_or(i64::MAX)),
        );
        self.check_unique(tx, table, &row, id)?;

        if let Some(token) = tx {
            self.overlay_op(token, table, |overlay| {
                overlay.inserted.insert(id, row);
            })?;
        } else {
            let mut base = self.base.write();
            let data = base
                .get_mut(table)
                .ok_or_else(|| Error::internal(format!("unknown table: {table}")))?;
            data.rows.insert(id, row);
        }
        Ok(id)
    }

    async fn update(&self, tx: Option<TxToken>, table: &str, row: Row) -> Result<()> {
        let id = row
            .get(ID_COLUMN)
            .and_then(Value::as_i64)
            .and_then(|raw| u64::try_from(raw).ok())
            .ok_or_else(|| Error::write("update requires a surrogate key"))?;
        self.check_unique(tx, table, &row, id)?;

        if let Some(token) = tx {
            self.overlay_op(token, table, |overlay| {
                if overlay.inserted.contains_key(&id) {
                    overlay.inserted.insert(id, row);
                } else {
                    overlay.deleted.remove(&id);
                    overlay.updated.insert(id, row);
                }
            })?;
        } else {
            let mut base = self.base.write();
            let data = base
                .get_mut(table)
                .ok_or_else(|| Error::internal(format!("unknown table: {table}")))?;
            data.rows.insert(id, row);
        }
        Ok(())
    }

    async fn delete(&self, tx: Option<TxToken>, table: &str, query: &QuerySpec) -> Result<u64> {
        let matched: Vec<u64> = self
            .visible_rows(tx, table, query)?
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        if let Some(token) = tx {
            self.overlay_op(token, table, |overlay| {
                for id in &matched {
                    overlay.inserted.remove(id);
                    overlay.updated.remove(id);
                    overlay.deleted.insert(*id);
                }
            })?;
        } else {
            let mut base = self.base.write();
            let data = base
                .get_mut(table)
                .ok_or_else(|| Error::internal(format!("unknown table: {table}")))?;
            for id in &matched {
                data.rows.remove(id);
            }
        }
        Ok(matched.len() as u64)
    }

    async fn fetch(&self, tx: Option<TxToken>, table: &str, query: &QuerySpec) -> Result<Vec<Row>> {
        let rows = self.visible_rows(tx, table, query)?;
        Ok(apply_window(rows, query))
    }

    async fn count(&self, tx: Option<TxToken>, table: &str, query: &QuerySpec) -> Result<i64> {
        let rows = self.visible_rows(tx, table, query)?;
        Ok(i64::try_from(rows.len()).unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use quill_core::ErrorKind;

    use super::*;
    use crate::store::model::{UserRecord, POSTS_TABLE, USERS_TABLE};

    fn user_row(username: &str, phone: &str) -> Row {
        UserRecord {
            username: username.to_string(),
            phone: phone.to_string(),
            ..UserRecord::default()
        }
        .to_row()
    }

    fn engine() -> MemoryBackend {
        MemoryBackend::new()
    }

    #[tokio::test]
    async fn insert_assigns_increasing_keys() {
        let backend = engine();
        let a = backend
            .insert(None, USERS_TABLE, user_row("alice123", "+1"))
            .await
            .unwrap();
        let b = backend
            .insert(None, USERS_TABLE, user_row("bobby456", "+2"))
            .await
            .unwrap();
        assert!(b > a);
    }

    #[tokio::test]
    async fn fetch_orders_most_recent_first() {
        let backend = engine();
        for (name, phone) in [("alice123", "+1"), ("bobby456", "+2"), ("carol789", "+3")] {
            backend
                .insert(None, USERS_TABLE, user_row(name, phone))
                .await
                .unwrap();
        }
        let rows = backend
            .fetch(None, USERS_TABLE, &QuerySpec::default())
            .await
            .unwrap();
        let names: Vec<String> = rows
            .iter()
            .map(|row| row.get("username").unwrap().as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["carol789", "bobby456", "alice123"]);
    }

    #[tokio::test]
    async fn adding_a_condition_narrows_monotonically() {
        let backend = engine();
        for (name, phone) in [("alice123", "+1"), ("alice456", "+2"), ("bobby789", "+3")] {
            backend
                .insert(None, USERS_TABLE, user_row(name, phone))
                .await
                .unwrap();
        }
        let broad = QuerySpec::default();
        let narrow = broad.clone().eq("username", "alice123");

        let broad_rows = backend.fetch(None, USERS_TABLE, &broad).await.unwrap();
        let narrow_rows = backend.fetch(None, USERS_TABLE, &narrow).await.unwrap();

        assert!(narrow_rows.len() <= broad_rows.len());
        for row in &narrow_rows {
            assert!(broad_rows.contains(row));
        }
    }

    #[tokio::test]
    async fn count_ignores_the_pagination_window() {
        let backend = engine();
        for i in 0..5 {
            backend
                .insert(None, USERS_TABLE, user_row(&format!("user{i:04}"), &format!("+{i}")))
                .await
                .unwrap();
        }
        let query = QuerySpec::default().page(0, 2);
        assert_eq!(backend.count(None, USERS_TABLE, &query).await.unwrap(), 5);
        assert_eq!(backend.fetch(None, USERS_TABLE, &query).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn no_limit_sentinel_disables_the_cap() {
        let backend = engine();
        for i in 0..4 {
            backend
                .insert(None, USERS_TABLE, user_row(&format!("user{i:04}"), &format!("+{i}")))
                .await
                .unwrap();
        }
        let query = QuerySpec::default().page(0, NO_LIMIT);
        assert_eq!(backend.fetch(None, USERS_TABLE, &query).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn duplicate_unique_value_is_a_write_error() {
        let backend = engine();
        backend
            .insert(None, USERS_TABLE, user_row("alice123", "+1"))
            .await
            .unwrap();
        let err = backend
            .insert(None, USERS_TABLE, user_row("alice123", "+2"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::WriteError);
    }

    #[tokio::test]
    async fn delete_of_absent_rows_is_idempotent() {
        let backend = engine();
        let query = QuerySpec::default().eq("username", "ghost");
        assert_eq!(backend.delete(None, USERS_TABLE, &query).await.unwrap(), 0);
        assert_eq!(backend.delete(None, USERS_TABLE, &query).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn transaction_writes_are_invisible_until_commit() {
        let backend = engine();
        let tx = backend.begin().await.unwrap();
        backend
            .insert(Some(tx), USERS_TABLE, user_row("alice123", "+1"))
            .await
            .unwrap();

        // Not visible outside the transaction...
        assert_eq!(
            backend.count(None, USERS_TABLE, &QuerySpec::default()).await.unwrap(),
            0
        );
        // ...but visible inside it.
        assert_eq!(
            backend
                .count(Some(tx), USERS_TABLE, &QuerySpec::default())
                .await
                .unwrap(),
            1
        );

        backend.commit(tx).await.unwrap();
        assert_eq!(
            backend.count(None, USERS_TABLE, &QuerySpec::default()).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn rollback_discards_every_write() {
        let backend = engine();
        let tx = backend.begin().await.unwrap();
        backend
            .insert(Some(tx), USERS_TABLE, user_row("alice123", "+1"))
            .await
            .unwrap();
        backend
            .insert(Some(tx), POSTS_TABLE, crate::store::model::PostRecord::default().to_row())
            .await
            .unwrap();
        backend.rollback(tx).await.unwrap();

        assert_eq!(
            backend.count(None, USERS_TABLE, &QuerySpec::default()).await.unwrap(),
            0
        );
        assert_eq!(
            backend.count(None, POSTS_TABLE, &QuerySpec::default()).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn conflicting_commit_fails_and_applies_nothing() {
        let backend = engine();
        let a = backend.begin().await.unwrap();
        let b = backend.begin().await.unwrap();
        backend
            .insert(Some(a), USERS_TABLE, user_row("alice123", "+1"))
            .await
            .unwrap();
        backend
            .insert(Some(b), USERS_TABLE, user_row("alice123", "+2"))
            .await
            .unwrap();

        backend.commit(a).await.unwrap();
        let err = backend.commit(b).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::WriteError);
        assert_eq!(
            backend.count(None, USERS_TABLE, &QuerySpec::default()).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn str_list_predicate_matches_membership() {
        let backend = engine();
        for (name, phone) in [("alice123", "+1"), ("bobby456", "+2"), ("carol789", "+3")] {
            backend
                .insert(None, USERS_TABLE, user_row(name, phone))
                .await
                .unwrap();
        }
        let query = QuerySpec::default().eq(
            "username",
            vec!["alice123".to_string(), "carol789".to_string()],
        );
        assert_eq!(backend.count(None, USERS_TABLE, &query).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn update_replaces_the_full_row() {
        let backend = engine();
        let id = backend
            .insert(None, USERS_TABLE, user_row("alice123", "+1"))
            .await
            .unwrap();
        let mut record = UserRecord {
            id,
            username: "alice123".to_string(),
            phone: "+1".to_string(),
            ..UserRecord::default()
        };
        record.nickname = "al".to_string();
        backend
            .update(None, USERS_TABLE, record.to_row())
            .await
            .unwrap();

        let rows = backend
            .fetch(None, USERS_TABLE, &QuerySpec::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("nickname").unwrap().as_str(), Some("al"));
    }
}
