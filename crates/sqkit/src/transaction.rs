//! Transaction helpers.
//!
//! Pass the transaction handle into anything that accepts a
//! [`GenericClient`]; the same driver calls then run inside the transaction.
//!
//! [`with_tx`] commits when the body returns `Ok`, rolls back when it returns
//! `Err`, and rolls back before resuming the unwind when the body panics.
//! The [`transaction!`](crate::transaction!) macro is the borrow-friendly form
//! for bodies that need to reference locals.
//!
//! # Example
//!
//! ```ignore
//! use sqkit::{ExecFlags, SqResult, exec, qb, with_tx};
//!
//! # async fn demo(pool: &mut sqlx::SqlitePool) -> SqResult<()> {
//! with_tx(pool, |tx| {
//!     Box::pin(async move {
//!         let p = Pages::new("");
//!         exec(tx, &qb::delete_from(&p).where_(p.url.eq("/old")), ExecFlags::empty()).await?;
//!         Ok(())
//!     })
//! })
//! .await?;
//! # Ok(()) }
//! ```

use crate::client::GenericClient;
use crate::error::SqResult;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// A connection that can open a transaction.
pub trait TxBegin: Send + Sync {
    /// The open transaction; it borrows the connection for its lifetime.
    type Tx<'a>: GenericClient + TxFinish
    where
        Self: 'a;

    /// `BEGIN`.
    fn begin(&mut self) -> impl Future<Output = SqResult<Self::Tx<'_>>> + Send;
}

/// An open transaction that can be committed or rolled back.
pub trait TxFinish: Sized {
    fn commit(self) -> impl Future<Output = SqResult<()>> + Send;

    fn rollback(self) -> impl Future<Output = SqResult<()>> + Send;
}

/// Run `f` inside a transaction.
///
/// - `Ok(_)`: commit; a commit failure is returned.
/// - `Err(e)`: roll back and return `e` unchanged.
/// - panic: roll back, then resume the panic.
pub async fn with_tx<'c, C, T, F>(conn: &'c mut C, f: F) -> SqResult<T>
where
    C: TxBegin,
    F: for<'t> FnOnce(&'t C::Tx<'c>) -> BoxFuture<'t, SqResult<T>>,
{
    let tx = conn.begin().await?;
    let outcome = AssertUnwindSafe(async { f(&tx).await })
        .catch_unwind()
        .await;
    match outcome {
        Ok(result) => finish_tx(tx, result).await,
        Err(panic) => {
            if let Err(err) = tx.rollback().await {
                tracing::warn!(target: "sqkit.sql", error = %err, "rollback after panic failed");
            }
            std::panic::resume_unwind(panic)
        }
    }
}

/// Commit on `Ok`, roll back on `Err`. Used by [`with_tx`] and
/// [`transaction!`](crate::transaction!).
#[doc(hidden)]
pub async fn finish_tx<X, T>(tx: X, result: SqResult<T>) -> SqResult<T>
where
    X: TxFinish,
{
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(
                    target: "sqkit.sql",
                    error = %error,
                    rollback_error = %rollback_err,
                    "rollback failed"
                );
            }
            Err(error)
        }
    }
}

/// Runs the given block inside a database transaction.
///
/// - Begins a transaction via [`TxBegin::begin`].
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)`.
///
/// The block must evaluate to `sqkit::SqResult<T>`. A panic in the block drops
/// the open transaction, which the driver rolls back.
///
/// ```ignore
/// let views = 3;
/// sqkit::transaction!(&mut pool, tx, {
///     sqkit::exec(&tx, &qb::update(&p).set(p.views.set(views)), ExecFlags::empty()).await?;
///     Ok(())
/// })?;
/// ```
#[macro_export]
macro_rules! transaction {
    ($client:expr, $tx:ident, $body:block) => {{
        let $tx = $crate::TxBegin::begin($client).await?;
        let __sqkit_tx_body_result: $crate::SqResult<_> = async { $body }.await;
        $crate::transaction::finish_tx($tx, __sqkit_tx_body_result).await
    }};
}
