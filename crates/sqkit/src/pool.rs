//! Connection pool utilities

use crate::error::{SqError, SqResult};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;
use std::time::Duration;

/// Settings for [`connect_sqlite`].
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// `sqlite://path/to.db`, `sqlite::memory:`, ...
    pub url: String,
    pub max_connections: u32,
    /// Use WAL journaling for file databases.
    pub wal: bool,
    pub foreign_keys: bool,
    /// How long a connection waits on a locked database.
    pub busy_timeout: Duration,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 8,
            wal: true,
            foreign_keys: true,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl SqliteConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Read the database URL from `DATABASE_URL`.
    pub fn from_env() -> SqResult<Self> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| SqError::Connection("DATABASE_URL is not set".to_string()))?;
        Ok(Self::new(url))
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    fn is_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

/// Open a SQLite pool: NORMAL synchronous, foreign keys and busy timeout per
/// `config`, WAL for file databases.
///
/// An in-memory database lives only as long as its connection, so it gets a
/// single connection that is never retired.
///
/// # Example
///
/// ```ignore
/// let pool = sqkit::connect_sqlite(&SqliteConfig::new("sqlite://pages.db")).await?;
/// ```
pub async fn connect_sqlite(config: &SqliteConfig) -> SqResult<SqlitePool> {
    let mut options = SqliteConnectOptions::from_str(&config.url)
        .map_err(|e| SqError::Connection(e.to_string()))?
        .create_if_missing(true)
        .foreign_keys(config.foreign_keys)
        .busy_timeout(config.busy_timeout)
        .synchronous(SqliteSynchronous::Normal);
    if config.wal && !config.is_memory() {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool = if config.is_memory() {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(config.max_connections)
    };
    pool.connect_with(options)
        .await
        .map_err(|e| SqError::Connection(e.to_string()))
}

#[cfg(feature = "pool")]
pub use postgres::{create_pool, create_pool_with_config, create_pool_with_manager_config};

#[cfg(feature = "pool")]
mod postgres {
    use crate::error::{SqError, SqResult};
    use deadpool_postgres::{Manager, ManagerConfig, Pool, PoolBuilder, RecyclingMethod};
    use tokio_postgres::NoTls;
    use tokio_postgres::Socket;
    use tokio_postgres::tls::{MakeTlsConnect, TlsConnect};

    /// Create a PostgreSQL connection pool from a database URL.
    ///
    /// Uses `NoTls` and 16 connections. For TLS or tuning, use
    /// [`create_pool_with_manager_config`].
    pub fn create_pool(database_url: &str) -> SqResult<Pool> {
        create_pool_with_config(database_url, 16)
    }

    /// Create a connection pool with a custom maximum size.
    pub fn create_pool_with_config(database_url: &str, max_size: usize) -> SqResult<Pool> {
        create_pool_with_manager_config(database_url, NoTls, default_manager_config(), |builder| {
            builder.max_size(max_size)
        })
    }

    /// Create a connection pool with an injected TLS connector, `ManagerConfig` and `PoolBuilder`.
    pub fn create_pool_with_manager_config<T>(
        database_url: &str,
        tls: T,
        manager_config: ManagerConfig,
        configure_pool: impl FnOnce(PoolBuilder) -> PoolBuilder,
    ) -> SqResult<Pool>
    where
        T: MakeTlsConnect<Socket> + Clone + Sync + Send + 'static,
        T::Stream: Sync + Send,
        T::TlsConnect: Sync + Send,
        <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
    {
        let pg_config: tokio_postgres::Config = database_url
            .parse()
            .map_err(|e: tokio_postgres::Error| SqError::Connection(e.to_string()))?;

        let mgr = Manager::from_config(pg_config, tls, manager_config);
        configure_pool(Pool::builder(mgr))
            .build()
            .map_err(|e| SqError::Pool(e.to_string()))
    }

    fn default_manager_config() -> ManagerConfig {
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_urls_are_detected() {
        assert!(SqliteConfig::default().is_memory());
        assert!(SqliteConfig::new("sqlite:file:pages?mode=memory&cache=shared").is_memory());
        assert!(!SqliteConfig::new("sqlite://pages.db").is_memory());
    }

    #[tokio::test]
    async fn memory_pool_keeps_its_database() {
        let pool = connect_sqlite(&SqliteConfig::default()).await.unwrap();
        sqlx::query("CREATE TABLE t (x INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO t (x) VALUES (1)")
            .execute(&pool)
            .await
            .unwrap();
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM t")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(n, 1);
    }
}
