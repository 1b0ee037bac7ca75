//! Query monitoring and SQL logging.
//!
//! This module provides:
//! - [`QueryMonitor`], told about every statement a driver call runs
//! - [`LoggingMonitor`] (`tracing` events under the `sqkit.sql` target),
//!   [`StatsMonitor`], [`CompositeMonitor`]
//! - [`LogFlags`] selecting what log lines carry
//! - Query timeouts through [`MonitorConfig`]
//!
//! # Example
//!
//! ```rust,ignore
//! use sqkit::monitor::{InstrumentedClient, LogFlags, LoggingMonitor, MonitorConfig};
//! use std::time::Duration;
//!
//! let config = MonitorConfig::new()
//!     .with_query_timeout(Duration::from_secs(30))
//!     .with_slow_query_threshold(Duration::from_millis(200))
//!     .with_log_flags(LogFlags::COMPACT | LogFlags::INTERPOLATE | LogFlags::CALLER)
//!     .enable_monitoring();
//!
//! let db = InstrumentedClient::new(pool)
//!     .with_config(config)
//!     .with_monitor(LoggingMonitor::new());
//! ```

mod config;
mod instrumented;
mod monitors;
mod types;


pub use config::{LogFlags, MonitorConfig};
pub use instrumented::{InstrumentedClient, Observer};
pub use monitors::{CompositeMonitor, LoggingMonitor, NoopMonitor, QueryStats, StatsMonitor};
pub use types::{QueryContext, QueryMonitor, QueryResult, QueryType};

pub(crate) use instrumented::Probe;

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
