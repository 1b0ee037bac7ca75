use super::config::{LogFlags, MonitorConfig};
use super::monitors::NoopMonitor;
use super::types::{QueryContext, QueryMonitor, QueryResult};
use crate::client::{ExecOutcome, GenericClient, RowStream};
use crate::dialect::Dialect;
use crate::error::SqResult;
use crate::qb::Rendered;
use crate::transaction::{TxBegin, TxFinish};
use crate::value::Value;
use std::panic::Location;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The monitor and configuration a client reports statement events to.
#[derive(Clone, Copy)]
pub struct Observer<'a> {
    pub monitor: &'a dyn QueryMonitor,
    pub config: &'a MonitorConfig,
}

impl Observer<'_> {
    /// Timeout driver calls apply on top of their [`Context`](crate::Context).
    pub(crate) fn query_timeout(observer: Option<Self>) -> Option<Duration> {
        observer.and_then(|o| o.config.query_timeout)
    }
}

/// A database client that wraps a `GenericClient` with monitoring.
///
/// Monitoring must be explicitly enabled via `MonitorConfig::enable_monitoring()`.
/// Events are reported by the driver functions ([`exec`](crate::exec),
/// [`fetch`](crate::fetch), ...), which know the statement, the caller and the
/// final row count. Transactions begun through the wrapper stay instrumented.
pub struct InstrumentedClient<C> {
    client: C,
    monitor: Arc<dyn QueryMonitor>,
    config: MonitorConfig,
}

impl<C: GenericClient> InstrumentedClient<C> {
    /// Create a new instrumented client with no monitoring.
    pub fn new(client: C) -> Self {
        Self {
            client,
            monitor: Arc::new(NoopMonitor),
            config: MonitorConfig::default(),
        }
    }

    /// Set the monitor configuration.
    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the query monitor.
    pub fn with_monitor<M: QueryMonitor + 'static>(mut self, monitor: M) -> Self {
        self.monitor = Arc::new(monitor);
        self
    }

    /// Set the query monitor from an Arc.
    pub fn with_monitor_arc(mut self, monitor: Arc<dyn QueryMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_log_flags(mut self, flags: LogFlags) -> Self {
        self.config.log_flags = flags;
        self
    }

    pub fn enable_monitoring(mut self) -> Self {
        self.config.monitoring_enabled = true;
        self
    }

    pub fn is_monitoring_enabled(&self) -> bool {
        self.config.monitoring_enabled
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Get a reference to the inner client.
    pub fn inner(&self) -> &C {
        &self.client
    }

    /// Get the inner client, consuming this wrapper.
    pub fn into_inner(self) -> C {
        self.client
    }
}

impl<C: GenericClient> GenericClient for InstrumentedClient<C> {
    fn dialect(&self) -> Dialect {
        self.client.dialect()
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> SqResult<ExecOutcome> {
        self.client.execute(sql, args).await
    }

    async fn query_stream<'a>(&'a self, sql: &'a str, args: &'a [Value]) -> SqResult<RowStream<'a>> {
        self.client.query_stream(sql, args).await
    }

    fn observer(&self) -> Option<Observer<'_>> {
        Some(Observer {
            monitor: self.monitor.as_ref(),
            config: &self.config,
        })
    }
}

impl<C: TxBegin + GenericClient> TxBegin for InstrumentedClient<C> {
    type Tx<'a>
        = InstrumentedClient<C::Tx<'a>>
    where
        Self: 'a;

    async fn begin(&mut self) -> SqResult<Self::Tx<'_>> {
        let monitor = Arc::clone(&self.monitor);
        let config = self.config.clone();
        let client = self.client.begin().await?;
        Ok(InstrumentedClient {
            client,
            monitor,
            config,
        })
    }
}

impl<X: TxFinish + Send> TxFinish for InstrumentedClient<X> {
    async fn commit(self) -> SqResult<()> {
        self.client.commit().await
    }

    async fn rollback(self) -> SqResult<()> {
        self.client.rollback().await
    }
}

/// Reports one statement to a client's observer.
///
/// Inert when the client has no observer or monitoring is disabled.
pub(crate) struct Probe<'a> {
    active: Option<(Observer<'a>, QueryContext, Instant)>,
}

impl<'a> Probe<'a> {
    pub(crate) fn start(
        observer: Option<Observer<'a>>,
        rendered: &Rendered,
        caller: &'static Location<'static>,
        interpolate: impl FnOnce() -> Option<String>,
    ) -> Self {
        let Some(observer) = observer.filter(|o| o.config.monitoring_enabled) else {
            return Self { active: None };
        };
        let flags = observer.config.log_flags;
        let mut ctx = QueryContext::new(&rendered.sql, rendered.args.len())
            .with_caller(caller)
            .with_log_flags(flags);
        if flags.contains(LogFlags::INTERPOLATE) {
            ctx.interpolated = interpolate();
        }
        observer.monitor.on_query_start(&ctx);
        Self {
            active: Some((observer, ctx, Instant::now())),
        }
    }

    pub(crate) fn finish(self, result: impl FnOnce() -> QueryResult) {
        let Some((observer, ctx, start)) = self.active else {
            return;
        };
        let duration = start.elapsed();
        let result = result();
        observer.monitor.on_query_complete(&ctx, duration, &result);
        if let Some(threshold) = observer.config.slow_query_threshold {
            if duration > threshold {
                observer.monitor.on_slow_query(&ctx, duration);
            }
        }
    }
}
