//! Result rows and typed getters.

use crate::error::{SqError, SqResult};
use crate::qb::Field;
use crate::value::{FromValue, Value};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Identifies one output column: the qualifier it was selected under plus its
/// name. Computed columns without an alias have an empty key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ColumnKey {
    qualifier: String,
    name: String,
}

impl ColumnKey {
    pub fn new(qualifier: &str, name: &str) -> Self {
        Self {
            qualifier: qualifier.to_string(),
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }
}

/// The output columns a statement produces, in order.
#[derive(Debug, Clone, Default)]
pub struct Projection {
    keys: Vec<ColumnKey>,
}

impl Projection {
    pub fn new(keys: impl IntoIterator<Item = ColumnKey>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[ColumnKey] {
        &self.keys
    }

    /// Index of `key`: an exact match, else the only column with that name.
    pub fn position(&self, key: &ColumnKey) -> Option<usize> {
        if let Some(idx) = self.keys.iter().position(|k| k == key) {
            return Some(idx);
        }
        unique_position(self.keys.iter().map(ColumnKey::name), &key.name)
    }
}

fn unique_position<'a>(names: impl Iterator<Item = &'a str>, name: &str) -> Option<usize> {
    let mut found = None;
    for (idx, candidate) in names.enumerate() {
        if candidate.eq_ignore_ascii_case(name) {
            if found.is_some() {
                return None;
            }
            found = Some(idx);
        }
    }
    found
}

/// One result row.
///
/// Values are looked up by field through the statement's [`Projection`], so a
/// self join can read `a.name` and `b.name` separately. Raw queries without a
/// projection fall back to the column names reported by the driver.
#[derive(Debug, Clone)]
pub struct Row {
    names: Arc<[String]>,
    values: Vec<Value>,
    projection: Arc<Projection>,
}

impl Row {
    pub fn new(names: Arc<[String]>, values: Vec<Value>) -> Self {
        Self {
            names,
            values,
            projection: Arc::default(),
        }
    }

    pub(crate) fn with_projection(mut self, projection: Arc<Projection>) -> Self {
        self.projection = projection;
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Column names as reported by the driver.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    fn index_of<T>(&self, field: &Field<T>) -> SqResult<usize> {
        let key = ColumnKey::new(field.qualifier(), field.name());
        let idx = if self.projection.len() == self.values.len() {
            self.projection.position(&key)
        } else {
            None
        };
        idx.or_else(|| unique_position(self.names.iter().map(String::as_str), field.name()))
            .ok_or_else(|| {
                SqError::decode(
                    format!("{}.{}", field.qualifier(), field.name()),
                    "column is not in the result set",
                )
            })
    }

    fn raw<'a, T>(&'a self, field: &'a Field<T>) -> SqResult<(&'a Value, &'a str)> {
        let idx = self.index_of(field)?;
        Ok((&self.values[idx], field.name()))
    }

    /// Decode the value of `field` into any [`FromValue`] type.
    pub fn get<T, F>(&self, field: &Field<F>) -> SqResult<T>
    where
        T: FromValue,
    {
        let (value, name) = self.raw(field)?;
        T::from_value(value.clone(), name)
    }

    /// Decode the column at `idx` (0-based).
    pub fn get_index<T: FromValue>(&self, idx: usize) -> SqResult<T> {
        let value = self.values.get(idx).ok_or_else(|| {
            SqError::decode(
                format!("#{idx}"),
                format!("row has only {} columns", self.values.len()),
            )
        })?;
        let name = self.names.get(idx).map_or("", String::as_str);
        T::from_value(value.clone(), name)
    }

    /// Decode the column the driver reported as `name`.
    pub fn get_named<T: FromValue>(&self, name: &str) -> SqResult<T> {
        let idx = unique_position(self.names.iter().map(String::as_str), name)
            .ok_or_else(|| SqError::decode(name, "column is not in the result set"))?;
        T::from_value(self.values[idx].clone(), name)
    }

    fn or_default<T: FromValue + Default, F>(&self, field: &Field<F>) -> SqResult<T> {
        self.get::<Option<T>, F>(field).map(Option::unwrap_or_default)
    }

    /// Text value; NULL reads as an empty string.
    pub fn string(&self, field: &Field<String>) -> SqResult<String> {
        self.or_default(field)
    }

    /// Integer value; NULL reads as 0.
    pub fn int64(&self, field: &Field<i64>) -> SqResult<i64> {
        self.or_default(field)
    }

    /// Float value; NULL reads as 0.0.
    pub fn float64(&self, field: &Field<f64>) -> SqResult<f64> {
        self.or_default(field)
    }

    /// Boolean value; NULL reads as false.
    pub fn bool(&self, field: &Field<bool>) -> SqResult<bool> {
        self.or_default(field)
    }

    /// Blob value; NULL reads as empty.
    pub fn bytes(&self, field: &Field<Vec<u8>>) -> SqResult<Vec<u8>> {
        self.or_default(field)
    }

    /// Timestamp value. NULL is an error; use [`Row::null_time`] for nullable columns.
    pub fn time(&self, field: &Field<DateTime<Utc>>) -> SqResult<DateTime<Utc>> {
        self.get(field)
    }

    /// JSON value; NULL reads as JSON `null`.
    pub fn json(&self, field: &Field<serde_json::Value>) -> SqResult<serde_json::Value> {
        self.or_default(field)
    }

    /// JSON column deserialized into `T`.
    pub fn json_as<T: DeserializeOwned>(&self, field: &Field<serde_json::Value>) -> SqResult<T> {
        let json = self.json(field)?;
        serde_json::from_value(json).map_err(|e| SqError::decode(field.name(), e.to_string()))
    }

    pub fn null_string(&self, field: &Field<String>) -> SqResult<Option<String>> {
        self.get(field)
    }

    pub fn null_int64(&self, field: &Field<i64>) -> SqResult<Option<i64>> {
        self.get(field)
    }

    pub fn null_float64(&self, field: &Field<f64>) -> SqResult<Option<f64>> {
        self.get(field)
    }

    pub fn null_bool(&self, field: &Field<bool>) -> SqResult<Option<bool>> {
        self.get(field)
    }

    pub fn null_time(&self, field: &Field<DateTime<Utc>>) -> SqResult<Option<DateTime<Utc>>> {
        self.get(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ColumnOptions, TableBuilder};

    fn row(names: &[&str], values: Vec<Value>) -> Row {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        Row::new(names.into(), values)
    }

    #[test]
    fn self_join_columns_resolve_by_qualifier() {
        let mut a = TableBuilder::new("users", "a");
        let a_name = a.field::<String>("name", ColumnOptions::new()).unwrap();
        let mut b = TableBuilder::new("users", "b");
        let b_name = b.field::<String>("name", ColumnOptions::new()).unwrap();

        let projection = Projection::new([ColumnKey::new("a", "name"), ColumnKey::new("b", "name")]);
        let r = row(
            &["name", "name"],
            vec![Value::Text("alice".into()), Value::Text("bob".into())],
        )
        .with_projection(Arc::new(projection));

        assert_eq!(r.string(&a_name).unwrap(), "alice");
        assert_eq!(r.string(&b_name).unwrap(), "bob");
    }

    #[test]
    fn null_defaults_and_options() {
        let mut t = TableBuilder::new("t", "");
        let n = t.field::<i64>("n", ColumnOptions::new()).unwrap();
        let s = t.field::<String>("s", ColumnOptions::new()).unwrap();
        let r = row(&["n", "s"], vec![Value::Null, Value::Null]);

        assert_eq!(r.int64(&n).unwrap(), 0);
        assert_eq!(r.null_int64(&n).unwrap(), None);
        assert_eq!(r.string(&s).unwrap(), "");
        assert_eq!(r.null_string(&s).unwrap(), None);
    }

    #[test]
    fn positional_and_named_access() {
        let r = row(&["id", "Title"], vec![Value::Int(7), Value::Text("x".into())]);
        assert_eq!(r.get_index::<i64>(0).unwrap(), 7);
        assert_eq!(r.get_named::<String>("title").unwrap(), "x");
        assert!(r.get_index::<i64>(5).is_err());
        assert!(r.get_named::<i64>("missing").is_err());
    }

    #[test]
    fn missing_field_is_decode_error() {
        let mut t = TableBuilder::new("t", "");
        let other = t.field::<i64>("other", ColumnOptions::new()).unwrap();
        let r = row(&["id"], vec![Value::Int(1)]);
        let err = r.int64(&other).unwrap_err();
        assert!(matches!(err, SqError::Decode { .. }));
    }

    #[test]
    fn json_as_deserializes_text_storage() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct Meta {
            tags: Vec<String>,
        }

        let mut t = TableBuilder::new("t", "");
        let meta = t.field::<serde_json::Value>("meta", ColumnOptions::new()).unwrap();
        let r = row(&["meta"], vec![Value::Text(r#"{"tags":["a","b"]}"#.into())]);
        assert_eq!(
            r.json_as::<Meta>(&meta).unwrap(),
            Meta {
                tags: vec!["a".into(), "b".into()]
            }
        );

        let r = row(&["meta"], vec![Value::Text("[1]".into())]);
        assert!(matches!(r.json_as::<Meta>(&meta), Err(SqError::Decode { .. })));
    }
}
