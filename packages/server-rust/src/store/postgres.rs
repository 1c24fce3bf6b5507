//! PostgreSQL [`StorageBackend`] (feature `postgres`).
//!
//! Renders [`QuerySpec`] predicates to parameterized SQL (`WHERE c = $n`,
//! `c = ANY($n)` for id lists) over sqlx. Expected layout: every table has
//! a `BIGSERIAL id` primary key, `TEXT` string columns, and `BIGINT`
//! timestamp columns named as in [`super::model`].
//!
//! Transactions are held server-side and addressed by [`TxToken`], so the
//! store layer can bind them into derived call contexts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use quill_core::{Error, Result};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row as _, Transaction};

use super::backend::{Row, StorageBackend, TxToken, ID_COLUMN};
use super::filter::{QuerySpec, Value, NO_LIMIT};
use super::model::{POSTS_TABLE, USERS_TABLE};

type SharedTx = Arc<tokio::sync::Mutex<Option<Transaction<'static, Postgres>>>>;

/// sqlx-backed storage engine.
pub struct PostgresBackend {
    pool: PgPool,
    txs: Mutex<HashMap<u64, SharedTx>>,
    next_tx: AtomicU64,
}

impl PostgresBackend {
    /// Connects to the given database URL.
    ///
    /// # Errors
    ///
    /// Returns `Internal` when the pool cannot be established.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .connect(url)
            .await
            .map_err(|err| Error::internal(format!("failed to connect to postgres: {err}")))?;
        Ok(Self {
            pool,
            txs: Mutex::new(HashMap::new()),
            next_tx: AtomicU64::new(0),
        })
    }

    fn shared_tx(&self, tx: TxToken) -> Result<SharedTx> {
        self.txs
            .lock()
            .get(&tx.0)
            .cloned()
            .ok_or_else(|| Error::internal(format!("unknown transaction: {}", tx.0)))
    }
}

/// Appends `WHERE ...` for the query's predicates. Column names originate
/// in the store layer; only values are bound.
fn push_predicates(qb: &mut QueryBuilder<'_, Postgres>, query: &QuerySpec) {
    if query.predicates().is_empty() {
        return;
    }
    qb.push(" WHERE ");
    for (index, (column, value)) in query.predicates().iter().enumerate() {
        if index > 0 {
            qb.push(" AND ");
        }
        match value {
            Value::Str(s) => {
                qb.push(format!("{column} = "));
                qb.push_bind(s.clone());
            }
            Value::I64(n) => {
                qb.push(format!("{column} = "));
                qb.push_bind(*n);
            }
            Value::StrList(list) => {
                qb.push(format!("{column} = ANY("));
                qb.push_bind(list.clone());
                qb.push(")");
            }
        }
    }
}

fn push_window(qb: &mut QueryBuilder<'_, Postgres>, query: &QuerySpec) {
    if let Some(offset) = query.offset() {
        if offset > 0 {
            qb.push(" OFFSET ");
            qb.push_bind(offset);
        }
    }
    if let Some(limit) = query.limit() {
        if limit != NO_LIMIT {
            qb.push(" LIMIT ");
            qb.push_bind(limit);
        }
    }
}

fn decode_row(table: &str, pg_row: &PgRow) -> Result<Row> {
    let string_columns: &[&str] = match table {
        USERS_TABLE => &[
            "user_id", "username", "password", "nickname", "email", "phone",
        ],
        POSTS_TABLE => &["post_id", "user_id", "title", "content"],
        other => return Err(Error::read(format!("unknown table: {other}"))),
    };

    let mut row = Row::new();
    for column in [ID_COLUMN, "created_at", "updated_at"] {
        let value: i64 = pg_row
            .try_get(column)
            .map_err(|err| Error::read(err.to_string()))?;
        row.insert(column.to_string(), Value::I64(value));
    }
    for column in string_columns {
        let value: String = pg_row
            .try_get(*column)
            .map_err(|err| Error::read(err.to_string()))?;
        row.insert((*column).to_string(), Value::Str(value));
    }
    Ok(row)
}

#[async_trait]
impl StorageBackend for PostgresBackend {
    async fn begin(&self) -> Result<TxToken> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|err| Error::write(err.to_string()))?;
        let token = self.next_tx.fetch_add(1, Ordering::Relaxed) + 1;
        self.txs
            .lock()
            .insert(token, Arc::new(tokio::sync::Mutex::new(Some(tx))));
        Ok(TxToken(token))
    }

    async fn commit(&self, tx: TxToken) -> Result<()> {
        let shared = self
            .txs
            .lock()
            .remove(&tx.0)
            .ok_or_else(|| Error::internal(format!("unknown transaction: {}", tx.0)))?;
        let mut guard = shared.lock().await;
        let open = guard
            .take()
            .ok_or_else(|| Error::internal("transaction already closed"))?;
        open.commit()
            .await
            .map_err(|err| Error::write(err.to_string()))
    }

    async fn rollback(&self, tx: TxToken) -> Result<()> {
        let shared = self
            .txs
            .lock()
            .remove(&tx.0)
            .ok_or_else(|| Error::internal(format!("unknown transaction: {}", tx.0)))?;
        let mut guard = shared.lock().await;
        let open = guard
            .take()
            .ok_or_else(|| Error::internal("transaction already closed"))?;
        open.rollback()
            .await
            .map_err(|err| Error::write(err.to_string()))
    }

    async fn insert(&self, tx: Option<TxToken>, table: &str, row: Row) -> Result<u64> {
        let entries: Vec<(&String, &Value)> = row
            .iter()
            .filter(|(column, _)| column.as_str() != ID_COLUMN)
            .collect();
        let columns: Vec<&str> = entries.iter().map(|(column, _)| column.as_str()).collect();

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "INSERT INTO {table} ({}) VALUES (",
            columns.join(", ")
        ));
        {
            let mut values = qb.separated(", ");
            for (_, value) in &entries {
                match value {
                    Value::Str(s) => {
                        values.push_bind(s.clone());
                    }
                    Value::I64(n) => {
                        values.push_bind(*n);
                    }
                    Value::StrList(_) => {
                        return Err(Error::write("id lists cannot be stored as a column"));
                    }
                }
            }
        }
        qb.push(") RETURNING id");

        let pg_row = match tx {
            Some(token) => {
                let shared = self.shared_tx(token)?;
                let mut guard = shared.lock().await;
                let open = guard
                    .as_mut()
                    .ok_or_else(|| Error::internal("transaction already closed"))?;
                qb.build().fetch_one(&mut **open).await
            }
            None => qb.build().fetch_one(&self.pool).await,
        }
        .map_err(|err| Error::write(err.to_string()))?;

        let id: i64 = pg_row
            .try_get(ID_COLUMN)
            .map_err(|err| Error::write(err.to_string()))?;
        u64::try_from(id).map_err(|_| Error::write(format!("negative surrogate key: {id}")))
    }

    async fn update(&self, tx: Option<TxToken>, table: &str, row: Row) -> Result<()> {
        let id = row
            .get(ID_COLUMN)
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::write("update requires a surrogate key"))?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("UPDATE {table} SET "));
        {
            let mut assignments = qb.separated(", ");
            for (column, value) in row.iter().filter(|(column, _)| column.as_str() != ID_COLUMN) {
                assignments.push(format!("{column} = "));
                match value {
                    Value::Str(s) => {
                        assignments.push_bind_unseparated(s.clone());
                    }
                    Value::I64(n) => {
                        assignments.push_bind_unseparated(*n);
                    }
                    Value::StrList(_) => {
                        return Err(Error::write("id lists cannot be stored as a column"));
                    }
                }
            }
        }
        qb.push(" WHERE id = ");
        qb.push_bind(id);

        match tx {
            Some(token) => {
                let shared = self.shared_tx(token)?;
                let mut guard = shared.lock().await;
                let open = guard
                    .as_mut()
                    .ok_or_else(|| Error::internal("transaction already closed"))?;
                qb.build().execute(&mut **open).await
            }
            None => qb.build().execute(&self.pool).await,
        }
        .map(|_| ())
        .map_err(|err| Error::write(err.to_string()))
    }

    async fn delete(&self, tx: Option<TxToken>, table: &str, query: &QuerySpec) -> Result<u64> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("DELETE FROM {table}"));
        push_predicates(&mut qb, query);

        let result = match tx {
            Some(token) => {
                let shared = self.shared_tx(token)?;
                let mut guard = shared.lock().await;
                let open = guard
                    .as_mut()
                    .ok_or_else(|| Error::internal("transaction already closed"))?;
                qb.build().execute(&mut **open).await
            }
            None => qb.build().execute(&self.pool).await,
        }
        .map_err(|err| Error::write(err.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn fetch(&self, tx: Option<TxToken>, table: &str, query: &QuerySpec) -> Result<Vec<Row>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT * FROM {table}"));
        push_predicates(&mut qb, query);
        qb.push(" ORDER BY id DESC");
        push_window(&mut qb, query);

        let pg_rows = match tx {
            Some(token) => {
                let shared = self.shared_tx(token)?;
                let mut guard = shared.lock().await;
                let open = guard
                    .as_mut()
                    .ok_or_else(|| Error::internal("transaction already closed"))?;
                qb.build().fetch_all(&mut **open).await
            }
            None => qb.build().fetch_all(&self.pool).await,
        }
        .map_err(|err| Error::read(err.to_string()))?;

        pg_rows.iter().map(|row| decode_row(table, row)).collect()
    }

    async fn count(&self, tx: Option<TxToken>, table: &str, query: &QuerySpec) -> Result<i64> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) AS total FROM {table}"));
        push_predicates(&mut qb, &query.without_page());

        let pg_row = match tx {
            Some(token) => {
                let shared = self.shared_tx(token)?;
                let mut guard = shared.lock().await;
                let open = guard
                    .as_mut()
                    .ok_or_else(|| Error::internal("transaction already closed"))?;
                qb.build().fetch_one(&mut **open).await
            }
            None => qb.build().fetch_one(&self.pool).await,
        }
        .map_err(|err| Error::read(err.to_string()))?;

        pg_row
            .try_get("total")
            .map_err(|err| Error::read(err.to_string()))
    }
}
