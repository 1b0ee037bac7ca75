//! Database clients.
//!
//! [`GenericClient`] is the only seam between statement execution and a
//! driver: run a statement, or run a query and stream its rows. It is
//! implemented for `sqlx::SqlitePool`, [`SqliteTx`], `tokio_postgres::Client`
//! and `Transaction`, and (with the `pool` feature) the deadpool wrappers.
//! [`InstrumentedClient`](crate::monitor::InstrumentedClient) wraps any of
//! them with a query monitor.

mod postgres;
mod sqlite;

pub use sqlite::SqliteTx;

use crate::dialect::Dialect;
use crate::error::SqResult;
use crate::monitor::Observer;
use crate::row::Row;
use crate::value::Value;
use futures_core::Stream;
use futures_util::StreamExt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// What the driver reports after running a statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    /// Row id of the last inserted row; `None` when the driver has no such notion.
    pub last_insert_id: Option<i64>,
}

/// A trait that unifies database clients and transactions.
///
/// Driver functions such as [`exec`](crate::exec) and [`fetch`](crate::fetch)
/// accept either a pool/connection or a transaction through this trait, so the
/// same code runs inside and outside [`with_tx`](crate::with_tx).
pub trait GenericClient: Send + Sync {
    /// SQL variant statements are rendered in for this client.
    fn dialect(&self) -> Dialect;

    /// Run a statement that returns no rows.
    fn execute(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = SqResult<ExecOutcome>> + Send;

    /// Run a query and stream its rows.
    fn query_stream<'a>(
        &'a self,
        sql: &'a str,
        args: &'a [Value],
    ) -> impl Future<Output = SqResult<RowStream<'a>>> + Send;

    /// Run a query and collect every row.
    fn query(&self, sql: &str, args: &[Value]) -> impl Future<Output = SqResult<Vec<Row>>> + Send {
        async move {
            let mut stream = self.query_stream(sql, args).await?;
            let mut rows = Vec::new();
            while let Some(row) = stream.next().await {
                rows.push(row?);
            }
            Ok(rows)
        }
    }

    /// Monitor that statement events are reported to, if any.
    fn observer(&self) -> Option<Observer<'_>> {
        None
    }
}

/// A stream of result rows.
///
/// Type-erased so every client returns the same stream type.
#[must_use]
pub struct RowStream<'a> {
    inner: Pin<Box<dyn Stream<Item = SqResult<Row>> + Send + 'a>>,
}

impl<'a> RowStream<'a> {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = SqResult<Row>> + Send + 'a,
    {
        Self {
            inner: Box::pin(stream),
        }
    }
}

impl Stream for RowStream<'_> {
    type Item = SqResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}
