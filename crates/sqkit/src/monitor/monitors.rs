use super::config::LogFlags;
use super::truncate_sql_bytes;
use super::types::{QueryContext, QueryMonitor, QueryResult, QueryType};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// A no-op monitor that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMonitor;

impl QueryMonitor for NoopMonitor {
    fn on_query_complete(&self, _ctx: &QueryContext, _duration: Duration, _result: &QueryResult) {}
}

/// Emits one `tracing` event per statement under the `sqkit.sql` target.
///
/// Successful statements log at `DEBUG`, failures and slow queries at `WARN`.
/// The line content follows the context's [`LogFlags`].
#[derive(Debug, Clone)]
pub struct LoggingMonitor {
    /// Minimum duration to log (filters out fast queries).
    pub min_duration: Option<Duration>,
    /// Truncate logged SQL to this many bytes.
    pub max_sql_length: Option<usize>,
}

impl Default for LoggingMonitor {
    fn default() -> Self {
        Self {
            min_duration: None,
            max_sql_length: Some(1000),
        }
    }
}

impl LoggingMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only log queries slower than this duration.
    pub fn min_duration(mut self, duration: Duration) -> Self {
        self.min_duration = Some(duration);
        self
    }

    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// The statement text as it should appear in the log line.
    pub(crate) fn statement_text(&self, ctx: &QueryContext) -> String {
        let sql = match &ctx.interpolated {
            Some(interpolated) if ctx.log_flags.contains(LogFlags::INTERPOLATE) => interpolated,
            _ => &ctx.sql,
        };
        let sql = if ctx.log_flags.contains(LogFlags::COMPACT) {
            compact_sql(sql)
        } else {
            sql.clone()
        };
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(&sql, max)),
            _ => sql,
        }
    }
}

fn caller_of(ctx: &QueryContext) -> Option<String> {
    ctx.caller
        .filter(|_| ctx.log_flags.contains(LogFlags::CALLER))
        .map(|loc| format!("{}:{}", loc.file(), loc.line()))
}

/// Collapse runs of whitespace to one space.
pub(crate) fn compact_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl QueryMonitor for LoggingMonitor {
    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        if let Some(min) = self.min_duration {
            if duration < min && !result.is_error() {
                return;
            }
        }

        let sql = self.statement_text(ctx);
        let caller = caller_of(ctx);
        match result {
            QueryResult::Error(error) => tracing::warn!(
                target: "sqkit.sql",
                kind = ?ctx.query_type,
                elapsed = ?duration,
                caller = caller.as_deref(),
                error = %error,
                "{sql}"
            ),
            _ => {
                let summary = ctx
                    .log_flags
                    .contains(LogFlags::RESULTS)
                    .then(|| result.to_string());
                tracing::debug!(
                    target: "sqkit.sql",
                    kind = ?ctx.query_type,
                    elapsed = ?duration,
                    caller = caller.as_deref(),
                    result = summary.as_deref(),
                    "{sql}"
                );
            }
        }
    }

    fn on_slow_query(&self, ctx: &QueryContext, duration: Duration) {
        let sql = self.statement_text(ctx);
        let caller = caller_of(ctx);
        tracing::warn!(
            target: "sqkit.sql",
            kind = ?ctx.query_type,
            elapsed = ?duration,
            caller = caller.as_deref(),
            "slow query: {sql}"
        );
    }
}

/// A monitor that tracks query statistics.
#[derive(Debug, Default)]
pub struct StatsMonitor {
    total_queries: AtomicU64,
    failed_queries: AtomicU64,
    total_duration_nanos: AtomicU64,
    select_count: AtomicU64,
    insert_count: AtomicU64,
    update_count: AtomicU64,
    delete_count: AtomicU64,
    ddl_count: AtomicU64,
    rows_read: AtomicU64,
    rows_affected: AtomicU64,
    max_duration_nanos: AtomicU64,
    slowest_query: Mutex<Option<String>>,
}

/// Collected query statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryStats {
    pub total_queries: u64,
    pub failed_queries: u64,
    pub total_duration: Duration,
    pub select_count: u64,
    pub insert_count: u64,
    pub update_count: u64,
    pub delete_count: u64,
    pub ddl_count: u64,
    /// Rows read by successful queries.
    pub rows_read: u64,
    /// Rows affected by successful statements.
    pub rows_affected: u64,
    pub max_duration: Duration,
    /// SQL of the slowest statement.
    pub slowest_query: Option<String>,
}

impl StatsMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of current statistics.
    pub fn stats(&self) -> QueryStats {
        QueryStats {
            total_queries: self.total_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            total_duration: Duration::from_nanos(self.total_duration_nanos.load(Ordering::Relaxed)),
            select_count: self.select_count.load(Ordering::Relaxed),
            insert_count: self.insert_count.load(Ordering::Relaxed),
            update_count: self.update_count.load(Ordering::Relaxed),
            delete_count: self.delete_count.load(Ordering::Relaxed),
            ddl_count: self.ddl_count.load(Ordering::Relaxed),
            rows_read: self.rows_read.load(Ordering::Relaxed),
            rows_affected: self.rows_affected.load(Ordering::Relaxed),
            max_duration: Duration::from_nanos(self.max_duration_nanos.load(Ordering::Relaxed)),
            slowest_query: self.slowest().clone(),
        }
    }

    /// Reset all statistics.
    pub fn reset(&self) {
        for counter in [
            &self.total_queries,
            &self.failed_queries,
            &self.total_duration_nanos,
            &self.select_count,
            &self.insert_count,
            &self.update_count,
            &self.delete_count,
            &self.ddl_count,
            &self.rows_read,
            &self.rows_affected,
            &self.max_duration_nanos,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        *self.slowest() = None;
    }

    fn slowest(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.slowest_query
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn saturating_add(counter: &AtomicU64, n: u64) {
    let prev = counter.fetch_add(n, Ordering::Relaxed);
    if prev.checked_add(n).is_none() {
        counter.store(u64::MAX, Ordering::Relaxed);
    }
}

impl QueryMonitor for StatsMonitor {
    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        let duration_nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);

        self.total_queries.fetch_add(1, Ordering::Relaxed);
        saturating_add(&self.total_duration_nanos, duration_nanos);

        let counter = match ctx.query_type {
            QueryType::Select => Some(&self.select_count),
            QueryType::Insert => Some(&self.insert_count),
            QueryType::Update => Some(&self.update_count),
            QueryType::Delete => Some(&self.delete_count),
            QueryType::Ddl => Some(&self.ddl_count),
            QueryType::Other => None,
        };
        if let Some(counter) = counter {
            counter.fetch_add(1, Ordering::Relaxed);
        }

        match result {
            QueryResult::Rows(n) => saturating_add(&self.rows_read, *n),
            QueryResult::Affected(n) => saturating_add(&self.rows_affected, *n),
            QueryResult::Error(_) => {
                self.failed_queries.fetch_add(1, Ordering::Relaxed);
            }
        }

        // Update max duration + slowest query only when we actually become the new max.
        let mut current_max = self.max_duration_nanos.load(Ordering::Relaxed);
        while duration_nanos > current_max {
            match self.max_duration_nanos.compare_exchange_weak(
                current_max,
                duration_nanos,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    *self.slowest() = Some(ctx.sql.clone());
                    break;
                }
                Err(updated) => current_max = updated,
            }
        }
    }
}

/// A composite monitor that delegates to multiple monitors.
#[derive(Default)]
pub struct CompositeMonitor {
    monitors: Vec<Arc<dyn QueryMonitor>>,
}

impl CompositeMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a monitor.
    #[allow(clippy::should_implement_trait)]
    pub fn add<M: QueryMonitor + 'static>(mut self, monitor: M) -> Self {
        self.monitors.push(Arc::new(monitor));
        self
    }

    /// Add an Arc-wrapped monitor, e.g. a [`StatsMonitor`] the caller keeps reading.
    pub fn add_arc(mut self, monitor: Arc<dyn QueryMonitor>) -> Self {
        self.monitors.push(monitor);
        self
    }
}

impl QueryMonitor for CompositeMonitor {
    fn on_query_start(&self, ctx: &QueryContext) {
        for monitor in &self.monitors {
            monitor.on_query_start(ctx);
        }
    }

    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        for monitor in &self.monitors {
            monitor.on_query_complete(ctx, duration, result);
        }
    }

    fn on_slow_query(&self, ctx: &QueryContext, duration: Duration) {
        for monitor in &self.monitors {
            monitor.on_slow_query(ctx, duration);
        }
    }
}
