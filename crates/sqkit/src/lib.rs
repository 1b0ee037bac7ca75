//! # sqkit
//!
//! Typed SQL query building and execution for SQLite and PostgreSQL.
//!
//! ## Features
//!
//! - **Typed columns**: tables are declared once with [`table!`] and queried through typed fields
//! - **No reflection**: descriptors are plain structs built per query, so self joins just work
//! - **Dialect-parametric rendering**: one statement tree renders for SQLite or PostgreSQL
//! - **Two-phase row accumulation**: `extract` then `commit`, with explicit keep/skip
//! - **Transaction-friendly**: pass a transaction anywhere a [`GenericClient`] is expected
//! - **Cancellation**: `*_context` calls take a [`Context`] with a cancel handle or deadline
//! - **Query monitoring**: `tracing` logging controlled by [`LogFlags`], stats, slow query alerts
//!
//! ## Example
//!
//! ```ignore
//! use sqkit::qb::{BooleanField, StringField};
//! use sqkit::{ExecFlags, RowAction, qb};
//!
//! sqkit::table! {
//!     pub struct Pages("pm_pages") {
//!         url: StringField [primary_key, not_null],
//!         content: StringField,
//!         disabled: BooleanField,
//!     }
//! }
//!
//! let pool = sqkit::connect_sqlite(&sqkit::SqliteConfig::default()).await?;
//! sqkit::ensure_tables(&pool, &[&Pages::new("")]).await?;
//!
//! // upsert
//! let p = Pages::new("");
//! let upsert = qb::insert_into(&p)
//!     .valuesx(|col| {
//!         col.set(&p.url, "/a").set(&p.content, "hi");
//!     })
//!     .on_conflict([&p.url])
//!     .do_update_set([qb::set_excluded(&p.content)]);
//! sqkit::exec(&pool, &upsert, ExecFlags::ROWS_AFFECTED).await?;
//!
//! // fetch
//! let p = Pages::new("p");
//! let mut contents = Vec::new();
//! sqkit::fetch(
//!     &pool,
//!     &qb::from(&p).where_(p.disabled.is_false()),
//!     |row| Ok(RowAction::Keep(row.string(&p.content)?)),
//!     |content| {
//!         contents.push(content);
//!         Ok(())
//!     },
//! )
//! .await?;
//! ```

pub mod client;
pub mod context;
pub mod dialect;
pub mod error;
pub mod exec;
pub mod monitor;
pub mod pool;
pub mod qb;
pub mod row;
pub mod schema;
pub mod table;
pub mod transaction;
pub mod value;

pub use client::{ExecOutcome, GenericClient, RowStream, SqliteTx};
pub use context::{CancelHandle, Context};
pub use dialect::Dialect;
pub use error::{SqError, SqResult};
pub use exec::{
    ExecFlags, ExecResult, FetchError, RowAction, exec, exec_context, exists, exists_context,
    fetch, fetch_all, fetch_context,
};
pub use monitor::{
    CompositeMonitor, InstrumentedClient, LogFlags, LoggingMonitor, MonitorConfig, NoopMonitor,
    QueryContext, QueryMonitor, QueryResult, QueryStats, QueryType, StatsMonitor,
};
pub use pool::{SqliteConfig, connect_sqlite};
pub use row::{ColumnKey, Projection, Row};
pub use schema::{create_table_sql, ensure_tables};
pub use table::{
    ColumnDef, ColumnKind, ColumnOptions, DynamicTable, Table, TableBuilder, TableInfo,
    tenant_table_name,
};
pub use transaction::{TxBegin, TxFinish, with_tx};
pub use value::{FromValue, Value};

// Re-export qb entry points for easy access
pub use qb::{Statement, delete_from, from, insert_into, select, update};

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config, create_pool_with_manager_config};
