use super::config::LogFlags;
use std::fmt;
use std::panic::Location;
use std::time::Duration;

/// The type of SQL operation being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    /// `CREATE`, `DROP`, `ALTER`
    Ddl,
    Other,
}

impl QueryType {
    /// Classify a statement by its leading keyword.
    pub fn from_sql(sql: &str) -> Self {
        let keyword: String = sql
            .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        match keyword.to_ascii_uppercase().as_str() {
            "SELECT" | "VALUES" | "WITH" => QueryType::Select,
            "INSERT" | "REPLACE" => QueryType::Insert,
            "UPDATE" => QueryType::Update,
            "DELETE" => QueryType::Delete,
            "CREATE" | "DROP" | "ALTER" => QueryType::Ddl,
            _ => QueryType::Other,
        }
    }
}

/// What a monitor is told about one statement.
#[derive(Debug, Clone)]
pub struct QueryContext {
    /// SQL text sent to the database.
    pub sql: String,
    /// The statement with arguments inlined, when [`LogFlags::INTERPOLATE`] is set.
    pub interpolated: Option<String>,
    /// Number of bound arguments.
    pub param_count: usize,
    pub query_type: QueryType,
    /// Location of the driver call that ran the statement.
    pub caller: Option<&'static Location<'static>>,
    pub log_flags: LogFlags,
}

impl QueryContext {
    pub fn new(sql: &str, param_count: usize) -> Self {
        Self {
            sql: sql.to_string(),
            interpolated: None,
            param_count,
            query_type: QueryType::from_sql(sql),
            caller: None,
            log_flags: LogFlags::default(),
        }
    }

    pub fn with_caller(mut self, caller: &'static Location<'static>) -> Self {
        self.caller = Some(caller);
        self
    }

    pub fn with_interpolated(mut self, sql: String) -> Self {
        self.interpolated = Some(sql);
        self
    }

    pub fn with_log_flags(mut self, flags: LogFlags) -> Self {
        self.log_flags = flags;
        self
    }
}

/// Maximum length for error messages in `QueryResult::Error`.
const MAX_ERROR_LEN: usize = 512;

/// Outcome of one statement, for monitoring.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Query returned rows.
    Rows(u64),
    /// Statement affected rows.
    Affected(u64),
    /// Failed; the message is truncated to 512 bytes.
    Error(String),
}

impl QueryResult {
    /// Create an error result, truncating the message to avoid monitoring data explosion.
    pub fn error(msg: impl fmt::Display) -> Self {
        let msg = msg.to_string();
        if msg.len() > MAX_ERROR_LEN {
            Self::Error(format!("{}...", super::truncate_sql_bytes(&msg, MAX_ERROR_LEN)))
        } else {
            Self::Error(msg)
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, QueryResult::Error(_))
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryResult::Rows(n) => write!(f, "{n} rows"),
            QueryResult::Affected(n) => write!(f, "{n} affected"),
            QueryResult::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// Trait for monitoring SQL execution.
///
/// Implement this trait to collect metrics, log queries, or integrate
/// with observability systems.
pub trait QueryMonitor: Send + Sync {
    /// Called before a statement is executed.
    fn on_query_start(&self, _ctx: &QueryContext) {}

    /// Called after a statement completes (success or failure). For queries
    /// this is after the last row was read.
    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult);

    /// Called when a statement exceeds the configured slow query threshold.
    fn on_slow_query(&self, _ctx: &QueryContext, _duration: Duration) {}
}
