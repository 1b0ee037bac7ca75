//! PostgreSQL through `tokio-postgres` (and `deadpool-postgres` with the `pool` feature).

use super::{ExecOutcome, GenericClient, RowStream};
use crate::dialect::Dialect;
use crate::error::{SqError, SqResult};
use crate::row::Row;
use crate::transaction::{TxBegin, TxFinish};
use crate::value::Value;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDateTime, Utc};
use futures_util::StreamExt;
use std::error::Error;
use std::sync::Arc;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql_checked(ty, out),
            Value::Int(v) => match *ty {
                Type::INT2 => i16::try_from(*v)?.to_sql_checked(ty, out),
                Type::INT4 => i32::try_from(*v)?.to_sql_checked(ty, out),
                Type::FLOAT8 => (*v as f64).to_sql_checked(ty, out),
                _ => v.to_sql_checked(ty, out),
            },
            Value::Float(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql_checked(ty, out),
                _ => v.to_sql_checked(ty, out),
            },
            Value::Text(v) => v.to_sql_checked(ty, out),
            Value::Bytes(v) => v.to_sql_checked(ty, out),
            Value::Time(v) => v.to_sql_checked(ty, out),
            Value::Json(v) => v.to_sql_checked(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn params(args: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    args.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

fn decode_column(row: &tokio_postgres::Row, idx: usize) -> SqResult<Value> {
    let column = &row.columns()[idx];
    let decoded = match *column.type_() {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx).map(|v| v.map(Value::Bool)),
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)
            .map(|v| v.map(|v| Value::Int(v.into()))),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)
            .map(|v| v.map(|v| Value::Int(v.into()))),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx).map(|v| v.map(Value::Int)),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)
            .map(|v| v.map(|v| Value::Float(v.into()))),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx).map(|v| v.map(Value::Float)),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx).map(|v| v.map(Value::Bytes)),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)
            .map(|v| v.map(Value::Time)),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)
            .map(|v| v.map(|v| Value::Time(v.and_utc()))),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(idx)
            .map(|v| v.map(Value::Json)),
        _ => row.try_get::<_, Option<String>>(idx).map(|v| v.map(Value::Text)),
    };
    decoded
        .map(|v| v.unwrap_or(Value::Null))
        .map_err(|e| SqError::decode(column.name(), e.to_string()))
}

fn convert_row(row: &tokio_postgres::Row, names: &mut Option<Arc<[String]>>) -> SqResult<Row> {
    let names = names
        .get_or_insert_with(|| row.columns().iter().map(|c| c.name().to_string()).collect())
        .clone();
    let values = (0..row.len())
        .map(|idx| decode_column(row, idx))
        .collect::<SqResult<Vec<_>>>()?;
    Ok(Row::new(names, values))
}

fn map_stream<'a>(stream: tokio_postgres::RowStream) -> RowStream<'a> {
    let mut names = None;
    RowStream::new(stream.map(move |row| {
        let row = row.map_err(SqError::from_db_error)?;
        convert_row(&row, &mut names)
    }))
}

impl GenericClient for tokio_postgres::Client {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> SqResult<ExecOutcome> {
        let rows_affected = tokio_postgres::Client::execute(self, sql, &params(args))
            .await
            .map_err(SqError::from_db_error)?;
        Ok(ExecOutcome {
            rows_affected,
            last_insert_id: None,
        })
    }

    async fn query_stream<'a>(&'a self, sql: &'a str, args: &'a [Value]) -> SqResult<RowStream<'a>> {
        let params = params(args);
        let stream = tokio_postgres::Client::query_raw(self, sql, params.iter().copied())
            .await
            .map_err(SqError::from_db_error)?;
        Ok(map_stream(stream))
    }
}

impl GenericClient for tokio_postgres::Transaction<'_> {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> SqResult<ExecOutcome> {
        let rows_affected = tokio_postgres::Transaction::execute(self, sql, &params(args))
            .await
            .map_err(SqError::from_db_error)?;
        Ok(ExecOutcome {
            rows_affected,
            last_insert_id: None,
        })
    }

    async fn query_stream<'a>(&'a self, sql: &'a str, args: &'a [Value]) -> SqResult<RowStream<'a>> {
        let params = params(args);
        let stream = tokio_postgres::Transaction::query_raw(self, sql, params.iter().copied())
            .await
            .map_err(SqError::from_db_error)?;
        Ok(map_stream(stream))
    }
}

impl TxBegin for tokio_postgres::Client {
    type Tx<'a> = tokio_postgres::Transaction<'a>;

    async fn begin(&mut self) -> SqResult<tokio_postgres::Transaction<'_>> {
        tokio_postgres::Client::transaction(self)
            .await
            .map_err(SqError::from_db_error)
    }
}

impl TxFinish for tokio_postgres::Transaction<'_> {
    async fn commit(self) -> SqResult<()> {
        tokio_postgres::Transaction::commit(self)
            .await
            .map_err(SqError::from_db_error)
    }

    async fn rollback(self) -> SqResult<()> {
        tokio_postgres::Transaction::rollback(self)
            .await
            .map_err(SqError::from_db_error)
    }
}

// ===== deadpool-postgres support =====

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::ClientWrapper {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> SqResult<ExecOutcome> {
        // Delegate to the deref target (tokio_postgres::Client).
        GenericClient::execute(&**self, sql, args).await
    }

    async fn query_stream<'a>(&'a self, sql: &'a str, args: &'a [Value]) -> SqResult<RowStream<'a>> {
        GenericClient::query_stream(&**self, sql, args).await
    }
}

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::Client {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> SqResult<ExecOutcome> {
        GenericClient::execute(&**self, sql, args).await
    }

    async fn query_stream<'a>(&'a self, sql: &'a str, args: &'a [Value]) -> SqResult<RowStream<'a>> {
        GenericClient::query_stream(&**self, sql, args).await
    }
}

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::Transaction<'_> {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> SqResult<ExecOutcome> {
        GenericClient::execute(&**self, sql, args).await
    }

    async fn query_stream<'a>(&'a self, sql: &'a str, args: &'a [Value]) -> SqResult<RowStream<'a>> {
        GenericClient::query_stream(&**self, sql, args).await
    }
}

#[cfg(feature = "pool")]
impl TxBegin for deadpool_postgres::Client {
    type Tx<'a> = deadpool_postgres::Transaction<'a>;

    async fn begin(&mut self) -> SqResult<deadpool_postgres::Transaction<'_>> {
        deadpool_postgres::ClientWrapper::transaction(&mut **self)
            .await
            .map_err(SqError::from_db_error)
    }
}

#[cfg(feature = "pool")]
impl TxFinish for deadpool_postgres::Transaction<'_> {
    async fn commit(self) -> SqResult<()> {
        deadpool_postgres::Transaction::commit(self)
            .await
            .map_err(SqError::from_db_error)
    }

    async fn rollback(self) -> SqResult<()> {
        deadpool_postgres::Transaction::rollback(self)
            .await
            .map_err(SqError::from_db_error)
    }
}
