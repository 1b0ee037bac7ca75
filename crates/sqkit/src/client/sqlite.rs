//! SQLite through `sqlx`.

use super::{ExecOutcome, GenericClient, RowStream};
use crate::dialect::Dialect;
use crate::error::{SqError, SqResult};
use crate::row::Row;
use crate::transaction::{TxBegin, TxFinish};
use crate::value::{Value, format_time};
use futures_util::StreamExt;
use sqlx::sqlite::{Sqlite, SqlitePool, SqliteRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use std::sync::Arc;
use tokio::sync::Mutex;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, <Sqlite as sqlx::Database>::Arguments<'q>>;

fn bind_all<'q>(sql: &'q str, args: &[Value]) -> SqliteQuery<'q> {
    args.iter().fold(sqlx::query(sql), |query, value| match value {
        Value::Null => query.bind(None::<i64>),
        Value::Bool(v) => query.bind(*v),
        Value::Int(v) => query.bind(*v),
        Value::Float(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.clone()),
        Value::Bytes(v) => query.bind(v.clone()),
        Value::Time(v) => query.bind(format_time(v)),
        Value::Json(v) => query.bind(v.to_string()),
    })
}

/// Convert a driver row, reusing the column name list across one result set.
fn convert_row(row: &SqliteRow, names: &mut Option<Arc<[String]>>) -> SqResult<Row> {
    let names = names
        .get_or_insert_with(|| row.columns().iter().map(|c| c.name().to_string()).collect())
        .clone();

    let mut values = Vec::with_capacity(row.len());
    for idx in 0..row.len() {
        let raw = row.try_get_raw(idx).map_err(SqError::from_sqlx)?;
        if raw.is_null() {
            values.push(Value::Null);
            continue;
        }
        // Storage class of this value, not the declared column type.
        let value = match raw.type_info().name() {
            "INTEGER" | "BOOLEAN" => row.try_get::<i64, _>(idx).map(Value::Int),
            "REAL" => row.try_get::<f64, _>(idx).map(Value::Float),
            "BLOB" => row.try_get::<Vec<u8>, _>(idx).map(Value::Bytes),
            _ => row.try_get::<String, _>(idx).map(Value::Text),
        };
        values.push(value.map_err(|e| SqError::decode(names[idx].as_str(), e.to_string()))?);
    }
    Ok(Row::new(names, values))
}

impl GenericClient for SqlitePool {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> SqResult<ExecOutcome> {
        let done = bind_all(sql, args)
            .execute(self)
            .await
            .map_err(SqError::from_sqlx)?;
        Ok(ExecOutcome {
            rows_affected: done.rows_affected(),
            last_insert_id: Some(done.last_insert_rowid()),
        })
    }

    async fn query_stream<'a>(&'a self, sql: &'a str, args: &'a [Value]) -> SqResult<RowStream<'a>> {
        let mut names = None;
        let stream = bind_all(sql, args).fetch(self).map(move |row| {
            let row = row.map_err(SqError::from_sqlx)?;
            convert_row(&row, &mut names)
        });
        Ok(RowStream::new(stream))
    }
}

/// An open SQLite transaction usable as a [`GenericClient`].
///
/// Statements run one at a time; a query reads its whole result set before
/// the next statement may start.
pub struct SqliteTx {
    tx: Mutex<Option<sqlx::Transaction<'static, Sqlite>>>,
}

impl SqliteTx {
    pub fn new(tx: sqlx::Transaction<'static, Sqlite>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }

    fn finished() -> SqError {
        SqError::Other("transaction already finished".to_string())
    }

    fn take(self) -> SqResult<sqlx::Transaction<'static, Sqlite>> {
        self.tx.into_inner().ok_or_else(Self::finished)
    }
}

impl GenericClient for SqliteTx {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> SqResult<ExecOutcome> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(Self::finished)?;
        let done = bind_all(sql, args)
            .execute(&mut **tx)
            .await
            .map_err(SqError::from_sqlx)?;
        Ok(ExecOutcome {
            rows_affected: done.rows_affected(),
            last_insert_id: Some(done.last_insert_rowid()),
        })
    }

    async fn query_stream<'a>(&'a self, sql: &'a str, args: &'a [Value]) -> SqResult<RowStream<'a>> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(Self::finished)?;
        let fetched = bind_all(sql, args)
            .fetch_all(&mut **tx)
            .await
            .map_err(SqError::from_sqlx)?;
        let mut names = None;
        let rows: Vec<SqResult<Row>> = fetched
            .iter()
            .map(|row| convert_row(row, &mut names))
            .collect();
        Ok(RowStream::new(futures_util::stream::iter(rows)))
    }
}

impl TxBegin for SqlitePool {
    type Tx<'a> = SqliteTx;

    async fn begin(&mut self) -> SqResult<SqliteTx> {
        let tx = sqlx::Pool::begin(&*self)
            .await
            .map_err(|e| SqError::Connection(format!("begin transaction: {e}")))?;
        Ok(SqliteTx::new(tx))
    }
}

impl TxFinish for SqliteTx {
    async fn commit(self) -> SqResult<()> {
        self.take()?.commit().await.map_err(SqError::from_sqlx)
    }

    async fn rollback(self) -> SqResult<()> {
        self.take()?.rollback().await.map_err(SqError::from_sqlx)
    }
}
