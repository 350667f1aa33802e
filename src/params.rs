//! Bound parameters and their generated names.

use chrono::{NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use std::fmt;

use crate::value::{Kind, Value};

lazy_static! {
    static ref UNSAFE_NAME_CHARACTERS: Regex = Regex::new(r"[^A-Za-z0-9_]").unwrap();
}

const NAME_MARKERS: &[char] = &['@', ':', '$', '?'];
const SUFFIX_LENGTH: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamDirection {
    #[default]
    Input,
    Output,
    InputOutput,
    ReturnValue,
}

/// A named value travelling with the statement text.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParameter {
    name: String,
    value: Value,
    kind: Kind,
    direction: ParamDirection,
}

impl BoundParameter {
    /// Name including the `@` marker, as it appears in the SQL text.
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn value(&self) -> &Value {
        &self.value
    }
    /// Declared kind, which survives even when the value was cleared to NULL.
    pub fn kind(&self) -> Kind {
        self.kind
    }
    pub fn direction(&self) -> ParamDirection {
        self.direction
    }
}

/// Reference token to embed in SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamRef(String);

impl ParamRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParamRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    params: Vec<BoundParameter>,
    temp_counter: usize,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn add_named(&mut self, name: &str, value: impl Into<Value>) -> ParamRef {
        self.add_named_with_direction(name, value, ParamDirection::Input)
    }
    pub fn add_named_with_direction(
        &mut self,
        name: &str,
        value: impl Into<Value>,
        direction: ParamDirection,
    ) -> ParamRef {
        let name = canonical_name(name);
        let value = value.into();
        let kind = value.kind();
        let value = clear_absent(value);
        match self.params.iter_mut().find(|p| p.name == name) {
            Some(existing) => {
                existing.value = value;
                existing.kind = kind;
                existing.direction = direction;
            }
            None => self.params.push(BoundParameter {
                name: name.clone(),
                value,
                kind,
                direction,
            }),
        }
        ParamRef(name)
    }
    /// Binds a value under a generated name derived from `hint`.
    pub fn add_temp(&mut self, value: impl Into<Value>, hint: &str) -> ParamRef {
        let hint = UNSAFE_NAME_CHARACTERS.replace_all(hint, "");
        let hint = if hint.is_empty() { "p" } else { hint.as_ref() };
        self.temp_counter += 1;
        let suffix: String = rand::rng()
            .sample_iter(rand::distr::Alphanumeric)
            .take(SUFFIX_LENGTH)
            .map(char::from)
            .collect();
        let name = format!("{}_{}_{}", hint, self.temp_counter, suffix);
        self.add_named(&name, value)
    }
    pub fn get(&self, name: &str) -> Option<&BoundParameter> {
        let name = canonical_name(name);
        self.params.iter().find(|p| p.name == name)
    }
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
    pub fn len(&self) -> usize {
        self.params.len()
    }
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, BoundParameter> {
        self.params.iter()
    }
    pub fn as_slice(&self) -> &[BoundParameter] {
        &self.params
    }
    /// Imports the parameters of another set; names already present are kept.
    pub fn extend(&mut self, other: ParameterSet) {
        for param in other.params {
            if !self.contains(&param.name) {
                self.params.push(param);
            }
        }
        self.temp_counter += other.temp_counter;
    }
    pub fn into_vec(self) -> Vec<BoundParameter> {
        self.params
    }
}

impl<'a> IntoIterator for &'a ParameterSet {
    type Item = &'a BoundParameter;
    type IntoIter = std::slice::Iter<'a, BoundParameter>;
    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

// `@` plus the bare name, with characters a parameter token cannot carry
// replaced by `_`.
fn canonical_name(name: &str) -> String {
    let bare = name.trim_start_matches(NAME_MARKERS);
    if bare.is_empty() {
        return String::from("@p");
    }
    format!("@{}", UNSAFE_NAME_CHARACTERS.replace_all(bare, "_"))
}

// The minimum date is what a cleared date picker posts back, so it means "no value".
fn clear_absent(value: Value) -> Value {
    let absent = match &value {
        Value::Date(d) => *d == NaiveDate::MIN,
        Value::DateTime(d) => *d == NaiveDateTime::MIN,
        Value::DateTimeOffset(d) => d.naive_utc() == NaiveDateTime::MIN,
        _ => false,
    };
    if absent { Value::Null } else { value }
}
