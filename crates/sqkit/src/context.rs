//! Cancellation and deadlines for `*_context` driver calls.

use crate::error::{SqError, SqResult};
use futures_util::future::select_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Carries an optional cancel signal and an optional deadline.
///
/// Cheap to clone; clones observe the same cancel signals. A derived context
/// is cancelled by its own handle and by every handle of its ancestors.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancel: Vec<watch::Receiver<bool>>,
    deadline: Option<(Instant, Duration)>,
}

/// Cancels every [`Context`] derived from the call that created it.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a context that is cancelled by the returned handle, or by any
    /// signal `self` already observes.
    pub fn with_cancel(mut self) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        self.cancel.push(rx);
        (self, CancelHandle { tx: Arc::new(tx) })
    }

    /// Derive a context that expires `timeout` from now, or at the existing
    /// deadline if that is earlier.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let at = Instant::now() + timeout;
        match self.deadline {
            Some((existing, _)) if existing <= at => {}
            _ => self.deadline = Some((at, timeout)),
        }
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.iter().any(|rx| *rx.borrow())
    }

    /// `Err(Cancelled)` or `Err(Timeout)` once the context is done.
    pub fn check(&self) -> SqResult<()> {
        if self.is_cancelled() {
            return Err(SqError::Cancelled);
        }
        match self.deadline {
            Some((at, timeout)) if Instant::now() >= at => Err(SqError::Timeout(timeout)),
            _ => Ok(()),
        }
    }

    /// Race `fut` against cancellation and the deadline.
    pub async fn run<T, F>(&self, fut: F) -> SqResult<T>
    where
        F: Future<Output = SqResult<T>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            () = self.cancelled() => Err(SqError::Cancelled),
            err = self.expired() => Err(err),
            out = fut => out,
        }
    }

    async fn cancelled(&self) {
        if self.cancel.is_empty() {
            return std::future::pending().await;
        }
        let waits = self.cancel.iter().cloned().map(|mut rx| {
            Box::pin(async move {
                if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                    // Handle dropped without cancelling.
                    std::future::pending::<()>().await;
                }
            })
        });
        select_all(waits).await;
    }

    async fn expired(&self) -> SqError {
        match self.deadline {
            Some((at, timeout)) => {
                tokio::time::sleep_until(at).await;
                SqError::Timeout(timeout)
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_wins_over_pending_work() {
        let (ctx, handle) = Context::background().with_cancel();
        handle.cancel();
        let err = ctx
            .run(std::future::pending::<SqResult<()>>())
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn parent_cancel_reaches_derived_context() {
        let (parent, outer) = Context::background().with_cancel();
        let (child, _inner) = parent.clone().with_cancel();
        assert!(!child.is_cancelled());

        let waiting = tokio::spawn(async move {
            child.run(std::future::pending::<SqResult<()>>()).await
        });
        tokio::task::yield_now().await;
        outer.cancel();
        let err = waiting.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert!(parent.is_cancelled());
    }

    #[tokio::test]
    async fn child_cancel_leaves_parent_running() {
        let (parent, _outer) = Context::background().with_cancel();
        let (child, inner) = parent.clone().with_cancel();
        inner.cancel();
        assert!(child.check().unwrap_err().is_cancelled());
        assert!(parent.check().is_ok());
    }

    #[tokio::test]
    async fn deadline_expires() {
        let ctx = Context::background().with_timeout(Duration::from_millis(5));
        let err = ctx
            .run(std::future::pending::<SqResult<()>>())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn background_runs_to_completion() {
        let ctx = Context::background();
        assert_eq!(ctx.run(async { Ok(7) }).await.unwrap(), 7);
        assert!(ctx.check().is_ok());
    }

    #[test]
    fn earlier_deadline_is_kept() {
        let ctx = Context::background()
            .with_timeout(Duration::from_secs(1))
            .with_timeout(Duration::from_secs(60));
        assert_eq!(ctx.deadline.map(|(_, d)| d), Some(Duration::from_secs(1)));
    }
}
