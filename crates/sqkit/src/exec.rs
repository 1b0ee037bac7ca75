//! Statement execution: `exec`, `fetch`, `exists`.
//!
//! Every call renders its statement for the client's dialect, runs it, and
//! reports the outcome to the client's monitor. Driver errors come back
//! wrapped in [`SqError::Statement`] carrying the executed SQL.
//!
//! Rows are consumed with a two-phase protocol: `extract` reads what it needs
//! from a [`Row`] and returns [`RowAction::Keep`] or [`RowAction::Skip`];
//! kept values are handed to `commit` before the next row is read.
//!
//! ```ignore
//! let p = Pages::new("p");
//! let mut urls = Vec::new();
//! let n = sqkit::fetch(
//!     &pool,
//!     &qb::from(&p).where_(p.disabled.is_false()),
//!     |row| Ok(RowAction::Keep(row.string(&p.url)?)),
//!     |url| {
//!         urls.push(url);
//!         Ok(())
//!     },
//! )
//! .await?;
//! ```

use crate::client::GenericClient;
use crate::context::Context;
use crate::dialect::Dialect;
use crate::error::{SqError, SqResult};
use crate::monitor::{Observer, Probe, QueryResult};
use crate::qb::{SelectQb, Statement};
use crate::row::Row;
use bitflags::bitflags;
use futures_util::StreamExt;
use std::future::Future;
use std::panic::Location;
use std::sync::Arc;
use thiserror::Error;

bitflags! {
    /// Which results [`exec`] computes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ExecFlags: u8 {
        const ROWS_AFFECTED = 1;
        /// Row id of the last inserted row. SQLite only.
        const LAST_INSERT_ID = 1 << 1;
    }
}

/// Results requested through [`ExecFlags`]; unrequested fields are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: Option<u64>,
    pub last_insert_id: Option<i64>,
}

/// Decision returned by a fetch `extract` callback.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum RowAction<T> {
    /// Pass the value to `commit`.
    Keep(T),
    /// Drop this row.
    Skip,
}

/// A failed fetch, with the number of rows read before the failure.
#[derive(Debug, Error)]
#[error("fetch failed after {rows} rows: {error}")]
pub struct FetchError {
    pub rows: u64,
    #[source]
    pub error: SqError,
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        self.error.is_cancelled()
    }
}

impl From<FetchError> for SqError {
    fn from(err: FetchError) -> Self {
        err.error
    }
}

fn effective_context(ctx: &Context, observer: Option<Observer<'_>>) -> Context {
    match Observer::query_timeout(observer) {
        Some(timeout) => ctx.clone().with_timeout(timeout),
        None => ctx.clone(),
    }
}

/// Run a statement that returns no rows.
#[track_caller]
pub fn exec<'a, C, S>(
    conn: &'a C,
    stmt: &'a S,
    flags: ExecFlags,
) -> impl Future<Output = SqResult<ExecResult>> + 'a
where
    C: GenericClient + ?Sized,
    S: Statement + ?Sized,
{
    run_exec(Context::background(), conn, stmt, flags, Location::caller())
}

/// [`exec`] bounded by a [`Context`].
#[track_caller]
pub fn exec_context<'a, C, S>(
    ctx: &Context,
    conn: &'a C,
    stmt: &'a S,
    flags: ExecFlags,
) -> impl Future<Output = SqResult<ExecResult>> + 'a
where
    C: GenericClient + ?Sized,
    S: Statement + ?Sized,
{
    run_exec(ctx.clone(), conn, stmt, flags, Location::caller())
}

async fn run_exec<C, S>(
    ctx: Context,
    conn: &C,
    stmt: &S,
    flags: ExecFlags,
    caller: &'static Location<'static>,
) -> SqResult<ExecResult>
where
    C: GenericClient + ?Sized,
    S: Statement + ?Sized,
{
    let dialect = conn.dialect();
    if flags.contains(ExecFlags::LAST_INSERT_ID) && dialect == Dialect::Postgres {
        return Err(SqError::Unsupported {
            dialect,
            feature: "LAST_INSERT_ID",
        });
    }
    let rendered = stmt.to_sql(dialect)?;
    let observer = conn.observer();
    let ctx = effective_context(&ctx, observer);

    let probe = Probe::start(observer, &rendered, caller, || {
        stmt.to_interpolated_sql(dialect).ok()
    });
    let result = ctx
        .run(conn.execute(&rendered.sql, &rendered.args))
        .await
        .map_err(|e| e.with_sql(&rendered.sql));
    probe.finish(|| match &result {
        Ok(outcome) => QueryResult::Affected(outcome.rows_affected),
        Err(err) => QueryResult::error(err),
    });
    let outcome = result?;

    let last_insert_id = if flags.contains(ExecFlags::LAST_INSERT_ID) {
        let id = outcome.last_insert_id.ok_or(SqError::Unsupported {
            dialect,
            feature: "LAST_INSERT_ID",
        })?;
        Some(id)
    } else {
        None
    };
    Ok(ExecResult {
        rows_affected: flags
            .contains(ExecFlags::ROWS_AFFECTED)
            .then_some(outcome.rows_affected),
        last_insert_id,
    })
}

/// Run a query, feeding each row through `extract` then `commit`.
///
/// Returns the number of rows read. Zero rows never call `extract`.
#[track_caller]
pub fn fetch<'a, C, S, T, X, M>(
    conn: &'a C,
    stmt: &'a S,
    extract: X,
    commit: M,
) -> impl Future<Output = Result<u64, FetchError>> + 'a
where
    C: GenericClient + ?Sized,
    S: Statement + ?Sized,
    X: FnMut(&Row) -> SqResult<RowAction<T>> + 'a,
    M: FnMut(T) -> SqResult<()> + 'a,
    T: 'a,
{
    run_fetch(Context::background(), conn, stmt, extract, commit, Location::caller())
}

/// [`fetch`] bounded by a [`Context`].
///
/// Cancellation is raced against every driver await and checked between
/// rows; the error carries the rows read so far.
#[track_caller]
pub fn fetch_context<'a, C, S, T, X, M>(
    ctx: &Context,
    conn: &'a C,
    stmt: &'a S,
    extract: X,
    commit: M,
) -> impl Future<Output = Result<u64, FetchError>> + 'a
where
    C: GenericClient + ?Sized,
    S: Statement + ?Sized,
    X: FnMut(&Row) -> SqResult<RowAction<T>> + 'a,
    M: FnMut(T) -> SqResult<()> + 'a,
    T: 'a,
{
    run_fetch(ctx.clone(), conn, stmt, extract, commit, Location::caller())
}

/// Run a query and map every row.
#[track_caller]
pub fn fetch_all<'a, C, S, T, F>(
    conn: &'a C,
    stmt: &'a S,
    mut map: F,
) -> impl Future<Output = SqResult<Vec<T>>> + 'a
where
    C: GenericClient + ?Sized,
    S: Statement + ?Sized,
    F: FnMut(&Row) -> SqResult<T> + 'a,
    T: 'a,
{
    let caller = Location::caller();
    async move {
        let mut out = Vec::new();
        run_fetch(
            Context::background(),
            conn,
            stmt,
            |row| map(row).map(RowAction::Keep),
            |value| {
                out.push(value);
                Ok(())
            },
            caller,
        )
        .await?;
        Ok(out)
    }
}

async fn run_fetch<C, S, T, X, M>(
    ctx: Context,
    conn: &C,
    stmt: &S,
    mut extract: X,
    mut commit: M,
    caller: &'static Location<'static>,
) -> Result<u64, FetchError>
where
    C: GenericClient + ?Sized,
    S: Statement + ?Sized,
    X: FnMut(&Row) -> SqResult<RowAction<T>>,
    M: FnMut(T) -> SqResult<()>,
{
    let dialect = conn.dialect();
    let rendered = stmt
        .to_sql(dialect)
        .map_err(|error| FetchError { rows: 0, error })?;
    let projection = Arc::new(stmt.projection());
    let observer = conn.observer();
    let ctx = effective_context(&ctx, observer);

    let probe = Probe::start(observer, &rendered, caller, || {
        stmt.to_interpolated_sql(dialect).ok()
    });
    let mut rows = 0u64;
    let result: SqResult<()> = async {
        let mut stream = ctx
            .run(conn.query_stream(&rendered.sql, &rendered.args))
            .await?;
        loop {
            ctx.check()?;
            let next = ctx.run(async { stream.next().await.transpose() }).await?;
            let Some(row) = next else { break };
            rows += 1;
            match extract(&row.with_projection(Arc::clone(&projection)))? {
                RowAction::Keep(value) => commit(value)?,
                RowAction::Skip => {}
            }
        }
        Ok(())
    }
    .await;
    let result = result.map_err(|e| e.with_sql(&rendered.sql));

    probe.finish(|| match &result {
        Ok(()) => QueryResult::Rows(rows),
        Err(err) => QueryResult::error(err),
    });
    match result {
        Ok(()) => Ok(rows),
        Err(error) => Err(FetchError { rows, error }),
    }
}

/// `SELECT EXISTS (SELECT 1 ...)` for `query`. No rows is `false`.
#[track_caller]
pub fn exists<'a, C>(conn: &'a C, query: &SelectQb) -> impl Future<Output = SqResult<bool>> + 'a
where
    C: GenericClient + ?Sized,
{
    run_exists(Context::background(), conn, query.clone(), Location::caller())
}

/// [`exists`] bounded by a [`Context`].
#[track_caller]
pub fn exists_context<'a, C>(
    ctx: &Context,
    conn: &'a C,
    query: &SelectQb,
) -> impl Future<Output = SqResult<bool>> + 'a
where
    C: GenericClient + ?Sized,
{
    run_exists(ctx.clone(), conn, query.clone(), Location::caller())
}

async fn run_exists<C>(
    ctx: Context,
    conn: &C,
    query: SelectQb,
    caller: &'static Location<'static>,
) -> SqResult<bool>
where
    C: GenericClient + ?Sized,
{
    let wrapped = query.exists_query();
    let mut found = false;
    run_fetch(
        ctx,
        conn,
        &wrapped,
        |row| row.get_index::<bool>(0).map(RowAction::Keep),
        |value| {
            found = value;
            Ok(())
        },
        caller,
    )
    .await?;
    Ok(found)
}
