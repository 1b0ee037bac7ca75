use bitflags::bitflags;
use std::time::Duration;

bitflags! {
    /// What [`LoggingMonitor`](super::LoggingMonitor) includes in each log line.
    ///
    /// Observational only; flags never change what is executed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LogFlags: u8 {
        /// Collapse whitespace so every statement logs on one line.
        const COMPACT = 1;
        /// Log the statement with arguments inlined as literals.
        const INTERPOLATE = 1 << 1;
        /// Log the `file:line` of the driver call.
        const CALLER = 1 << 2;
        /// Log row counts and rows affected.
        const RESULTS = 1 << 3;
    }
}

impl Default for LogFlags {
    fn default() -> Self {
        LogFlags::COMPACT
    }
}

/// Configuration for query monitoring and timeouts.
///
/// By default, monitoring is disabled and must be explicitly enabled.
#[derive(Debug, Clone, Default)]
pub struct MonitorConfig {
    /// Query timeout duration. `None` means no timeout (default).
    pub query_timeout: Option<Duration>,
    /// Slow query threshold for alerting.
    pub slow_query_threshold: Option<Duration>,
    /// Whether monitoring is enabled.
    pub monitoring_enabled: bool,
    /// What log lines carry.
    pub log_flags: LogFlags,
}

impl MonitorConfig {
    /// Create a new configuration with defaults (monitoring disabled, no timeout).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the query timeout duration.
    ///
    /// Statements exceeding it fail with [`SqError::Timeout`](crate::SqError::Timeout).
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Queries exceeding this duration trigger `on_slow_query`.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = Some(threshold);
        self
    }

    pub fn with_log_flags(mut self, flags: LogFlags) -> Self {
        self.log_flags = flags;
        self
    }

    /// Enable monitoring.
    pub fn enable_monitoring(mut self) -> Self {
        self.monitoring_enabled = true;
        self
    }

    pub fn disable_monitoring(mut self) -> Self {
        self.monitoring_enabled = false;
        self
    }
}
