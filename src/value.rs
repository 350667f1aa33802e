//! Values exchanged with the driver and the kinds hydrated members declare.
//!
//! [`Value`] is the closed set of SQL values that travel in both directions:
//! bound parameters going out, row cells coming back. [`Kind`] names the
//! declared type of a hydration target and drives the coercion engine.

// used for persistence
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};

// used for timestamps
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
// used for decimal numbers
use bigdecimal::BigDecimal;
// used for GUID-like identifiers
use uuid::Uuid;

// used to print out readable forms of a value
use std::fmt;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(BigDecimal),
    Text(String),
    Blob(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    Guid(Uuid),
}

/// Declared type of a hydration target.
///
/// Integer widths are kept apart so that coercion can range-check before a
/// member setter narrows the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Null,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Decimal,
    Text,
    Blob,
    Date,
    DateTime,
    DateTimeOffset,
    Guid,
    /// An enumeration described by its `(name, ordinal)` pairs.
    Enum(&'static [(&'static str, i64)]),
    /// A type only a registered coercer knows how to produce.
    Custom(&'static str),
}

impl Kind {
    /// Name used to look up a registered coercer.
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Null => "Null",
            Kind::Bool => "Bool",
            Kind::Int8 => "Int8",
            Kind::Int16 => "Int16",
            Kind::Int32 => "Int32",
            Kind::Int64 => "Int64",
            Kind::UInt8 => "UInt8",
            Kind::UInt16 => "UInt16",
            Kind::UInt32 => "UInt32",
            Kind::UInt64 => "UInt64",
            Kind::Float32 => "Float32",
            Kind::Float64 => "Float64",
            Kind::Decimal => "Decimal",
            Kind::Text => "Text",
            Kind::Blob => "Blob",
            Kind::Date => "Date",
            Kind::DateTime => "DateTime",
            Kind::DateTimeOffset => "DateTimeOffset",
            Kind::Guid => "Guid",
            Kind::Enum(_) => "Enum",
            Kind::Custom(name) => name,
        }
    }
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Kind::Int8
                | Kind::Int16
                | Kind::Int32
                | Kind::Int64
                | Kind::UInt8
                | Kind::UInt16
                | Kind::UInt32
                | Kind::UInt64
        )
    }
    /// Whether `i` is representable by this integer kind.
    pub fn fits(&self, i: i64) -> bool {
        match self {
            Kind::Int8 => i8::try_from(i).is_ok(),
            Kind::Int16 => i16::try_from(i).is_ok(),
            Kind::Int32 => i32::try_from(i).is_ok(),
            Kind::Int64 => true,
            Kind::UInt8 => u8::try_from(i).is_ok(),
            Kind::UInt16 => u16::try_from(i).is_ok(),
            Kind::UInt32 => u32::try_from(i).is_ok(),
            Kind::UInt64 => i >= 0,
            _ => false,
        }
    }
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int64,
            Value::Float(_) => Kind::Float64,
            Value::Decimal(_) => Kind::Decimal,
            Value::Text(_) => Kind::Text,
            Value::Blob(_) => Kind::Blob,
            Value::Date(_) => Kind::Date,
            Value::DateTime(_) => Kind::DateTime,
            Value::DateTimeOffset(_) => Kind::DateTimeOffset,
            Value::Guid(_) => Kind::Guid,
        }
    }
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
    /// Plain textual form, `None` for NULL.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
    /// Renders the value as a SQL literal, for diagnostics only.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => String::from("NULL"),
            Value::Bool(b) => String::from(if *b { "1" } else { "0" }),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::Blob(b) => format!("X'{}'", hex(b)),
            other => quote(&other.to_string()),
        }
    }
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Text(s) => Json::String(s.clone()),
            other => Json::String(other.to_string()),
        }
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Text(s) => write!(f, "{}", s),
            Value::Blob(b) => write!(f, "{}", hex(b)),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::DateTime(d) => write!(f, "{}", d.format(DATETIME_FORMAT)),
            Value::DateTimeOffset(d) => write!(f, "{}", d.to_rfc3339()),
            Value::Guid(g) => write!(f, "{}", g.hyphenated()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Bool(b) => ToSqlOutput::from(*b),
            Value::Int(i) => ToSqlOutput::from(*i),
            Value::Float(f) => ToSqlOutput::from(*f),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
            Value::Blob(b) => ToSqlOutput::from(b.as_slice()),
            other => ToSqlOutput::from(other.to_string()),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Int(i),
            ValueRef::Real(f) => Value::Float(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

macro_rules! value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

value_from!(
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
    BigDecimal => Decimal,
    String => Text,
    Vec<u8> => Blob,
    NaiveDate => Date,
    NaiveDateTime => DateTime,
    DateTime<FixedOffset> => DateTimeOffset,
    Uuid => Guid,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}
impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}
impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTimeOffset(v.fixed_offset())
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
