//! Error types for sqkit

use crate::dialect::Dialect;
use thiserror::Error;

/// Result type alias for sqkit operations
pub type SqResult<T> = Result<T, SqError>;

/// Error types for building, rendering and executing statements
#[derive(Debug, Error)]
pub enum SqError {
    /// A builder was used incorrectly (duplicate column, empty CASE, clause given twice, ...)
    #[error("Build error: {0}")]
    Build(String),

    /// The statement tree could not be turned into SQL text
    #[error("Render error: {0}")]
    Render(String),

    /// The target dialect has no way to express a requested feature
    #[error("{feature} is not supported by the {dialect} dialect")]
    Unsupported {
        dialect: Dialect,
        feature: &'static str,
    },

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// PostgreSQL driver error
    #[error("Query error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// SQLite driver error
    #[error("Query error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// NOT NULL constraint violation
    #[error("Not null violation: {0}")]
    NotNullViolation(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// The caller's context was cancelled
    #[error("Query cancelled")]
    Cancelled,

    /// A driver error annotated with the statement that produced it
    #[error("{source} (sql: {sql})")]
    Statement {
        sql: String,
        #[source]
        source: Box<SqError>,
    },

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl SqError {
    /// Create a build-time error
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build(message.into())
    }

    /// Create a render error
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Attach the executed SQL to a driver error.
    ///
    /// Classification helpers look through the annotation, so
    /// `is_unique_violation()` keeps working on the wrapped error.
    pub fn with_sql(self, sql: impl Into<String>) -> Self {
        match self {
            // Build and render errors never reached the database.
            Self::Build(_) | Self::Render(_) | Self::Unsupported { .. } | Self::Statement { .. } => {
                self
            }
            other => Self::Statement {
                sql: sql.into(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, skipping statement annotations
    pub fn root(&self) -> &SqError {
        match self {
            Self::Statement { source, .. } => source.root(),
            other => other,
        }
    }

    /// The SQL attached by [`SqError::with_sql`], if any
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Statement { sql, .. } => Some(sql),
            _ => None,
        }
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self.root(), Self::UniqueViolation(_))
    }

    /// Check if this is a foreign key violation error
    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(self.root(), Self::ForeignKeyViolation(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NotFound(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), Self::Timeout(_))
    }

    /// Check if the caller's context was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Self::Cancelled)
    }

    /// Check if this error was raised while building a statement
    pub fn is_build(&self) -> bool {
        matches!(self.root(), Self::Build(_))
    }

    /// Parse a tokio_postgres error into a more specific SqError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                "23502" => return Self::NotNullViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        Self::Postgres(err)
    }

    /// Parse a sqlx (SQLite) error into a more specific SqError
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        if let sqlx::Error::Database(db_err) = &err {
            let message = db_err.message().to_string();
            match db_err.kind() {
                ErrorKind::UniqueViolation => return Self::UniqueViolation(message),
                ErrorKind::ForeignKeyViolation => return Self::ForeignKeyViolation(message),
                ErrorKind::CheckViolation => return Self::CheckViolation(message),
                ErrorKind::NotNullViolation => return Self::NotNullViolation(message),
                _ => {}
            }
        }
        match err {
            sqlx::Error::RowNotFound => Self::not_found("no rows returned"),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                Self::Connection(err.to_string())
            }
            other => Self::Sqlite(other),
        }
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for SqError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_annotation_keeps_identity() {
        let err = SqError::UniqueViolation("pages.url".into()).with_sql("INSERT INTO pages");
        assert!(err.is_unique_violation());
        assert_eq!(err.sql(), Some("INSERT INTO pages"));
        assert!(err.to_string().contains("INSERT INTO pages"));
    }

    #[test]
    fn build_errors_are_not_annotated() {
        let err = SqError::build("empty CASE").with_sql("SELECT 1");
        assert!(err.sql().is_none());
        assert!(err.is_build());
    }

    #[test]
    fn annotation_is_not_nested() {
        let err = SqError::Cancelled.with_sql("SELECT 1").with_sql("SELECT 2");
        assert_eq!(err.sql(), Some("SELECT 1"));
        assert!(err.is_cancelled());
    }
}
