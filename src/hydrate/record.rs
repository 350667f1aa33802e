use std::sync::Arc;

use serde_json::{Map, Value as Json};

use super::coerce::{Coercible, CoercionEngine};
use super::names_match;
use crate::value::Value;

/// One row as an ordered column to value dictionary.
///
/// [`Record::get_as`] coerces with the engine the record was read with, so
/// coercers registered on a session's hydrator apply here too.
#[derive(Debug, Clone)]
pub struct Record {
    columns: Vec<String>,
    values: Vec<Value>,
    engine: Arc<CoercionEngine>,
}

impl Default for Record {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns && self.values == other.values
    }
}

impl Record {
    /// A record coercing with the standard engine.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self::with_engine(columns, values, CoercionEngine::standard())
    }
    pub fn with_engine(columns: Vec<String>, values: Vec<Value>, engine: Arc<CoercionEngine>) -> Self {
        Self {
            columns,
            values,
            engine,
        }
    }
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
    pub fn values(&self) -> &[Value] {
        &self.values
    }
    pub fn len(&self) -> usize {
        self.columns.len()
    }
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
    /// Case-insensitive; the first column with a matching name wins.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| names_match(c, column))
            .and_then(|i| self.values.get(i))
    }
    pub fn get_as<V: Coercible>(&self, column: &str) -> Option<V> {
        let raw = self.get(column)?.clone();
        let coerced = self.engine.coerce(V::KIND, raw)?;
        V::from_value(coerced)
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }
    pub fn to_json(&self) -> Json {
        let mut map = Map::new();
        for (column, value) in self.iter() {
            map.entry(column).or_insert_with(|| value.to_json());
        }
        Json::Object(map)
    }
}
