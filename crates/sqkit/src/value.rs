//! Literal values bound to statements and read back from rows.

use crate::error::{SqError, SqResult};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// A value bound as a statement argument or decoded from a result column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Time(DateTime<Utc>),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, used in decode errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Time(_) => "time",
            Value::Json(_) => "json",
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i8 => Int,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => Int,
    u16 => Int,
    u32 => Int,
    f32 => Float,
    f64 => Float,
    String => Text,
    &str => Text,
    Vec<u8> => Bytes,
    &[u8] => Bytes,
    DateTime<Utc> => Time,
    serde_json::Value => Json,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Conversion from a decoded column value into a Rust type.
///
/// SQLite is dynamically typed, so conversions accept every storage class that
/// can losslessly represent the target (e.g. booleans stored as integers,
/// timestamps stored as text).
pub trait FromValue: Sized {
    fn from_value(value: Value, column: &str) -> SqResult<Self>;
}

fn mismatch(column: &str, want: &str, got: &Value) -> SqError {
    SqError::decode(column, format!("expected {want}, found {}", got.kind()))
}

impl FromValue for Value {
    fn from_value(value: Value, _column: &str) -> SqResult<Self> {
        Ok(value)
    }
}

impl FromValue for bool {
    fn from_value(value: Value, column: &str) -> SqResult<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            Value::Int(i) => Ok(i != 0),
            other => Err(mismatch(column, "bool", &other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value, column: &str) -> SqResult<Self> {
        match value {
            Value::Int(i) => Ok(i),
            Value::Bool(b) => Ok(b as i64),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| SqError::decode(column, format!("invalid integer {s:?}"))),
            other => Err(mismatch(column, "integer", &other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value, column: &str) -> SqResult<Self> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            other => Err(mismatch(column, "float", &other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value, column: &str) -> SqResult<Self> {
        match value {
            Value::Text(s) => Ok(s),
            Value::Bytes(b) => String::from_utf8(b)
                .map_err(|e| SqError::decode(column, format!("invalid utf-8: {e}"))),
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            Value::Json(j) => Ok(j.to_string()),
            Value::Time(t) => Ok(format_time(&t)),
            other => Err(mismatch(column, "text", &other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value, column: &str) -> SqResult<Self> {
        match value {
            Value::Bytes(b) => Ok(b),
            Value::Text(s) => Ok(s.into_bytes()),
            Value::Json(j) => Ok(j.to_string().into_bytes()),
            other => Err(mismatch(column, "bytes", &other)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value, column: &str) -> SqResult<Self> {
        match value {
            Value::Time(t) => Ok(t),
            Value::Text(s) => parse_time(&s)
                .ok_or_else(|| SqError::decode(column, format!("invalid timestamp {s:?}"))),
            Value::Int(secs) => Utc
                .timestamp_opt(secs, 0)
                .single()
                .ok_or_else(|| SqError::decode(column, format!("invalid unix time {secs}"))),
            other => Err(mismatch(column, "time", &other)),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: Value, column: &str) -> SqResult<Self> {
        let parse = |bytes: &[u8]| {
            serde_json::from_slice(bytes)
                .map_err(|e| SqError::decode(column, format!("invalid json: {e}")))
        };
        match value {
            Value::Json(j) => Ok(j),
            Value::Text(s) => parse(s.as_bytes()),
            Value::Bytes(b) => parse(&b),
            other => Err(mismatch(column, "json", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value, column: &str) -> SqResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other, column).map(Some),
        }
    }
}

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%:z";

/// Text form used when a timestamp is stored in a TEXT column.
pub fn format_time(t: &DateTime<Utc>) -> String {
    t.format(TIME_FORMAT).to_string()
}

/// Parse the timestamp layouts SQLite applications commonly store.
pub fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_str(s, TIME_FORMAT) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_storage_classes_decode() {
        assert!(bool::from_value(Value::Int(1), "c").unwrap());
        assert_eq!(i64::from_value(Value::Text(" 42".into()), "c").unwrap(), 42);
        assert_eq!(f64::from_value(Value::Int(2), "c").unwrap(), 2.0);
        assert_eq!(
            Option::<String>::from_value(Value::Null, "c").unwrap(),
            None
        );
    }

    #[test]
    fn time_round_trips_through_text() {
        let t = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let text = format_time(&t);
        assert_eq!(text, "2024-05-06 07:08:09+00:00");
        assert_eq!(parse_time(&text), Some(t));
        assert_eq!(parse_time("2024-05-06 07:08:09"), Some(t));
    }

    #[test]
    fn decode_error_names_column() {
        let err = i64::from_value(Value::Bytes(vec![1]), "user_id").unwrap_err();
        assert!(err.to_string().contains("user_id"));
    }
}
