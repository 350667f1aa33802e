//! Lenient conversion of driver values into declared member kinds.
//!
//! Coercion never fails loudly: a value that cannot be converted yields
//! `None`, and the member it was meant for keeps its default.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::{BigDecimal, FromPrimitive, ToPrimitive};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use lazy_static::lazy_static;
use tracing::trace;
use uuid::Uuid;

use crate::value::{Kind, Value};

lazy_static! {
    static ref STANDARD_ENGINE: Arc<CoercionEngine> = Arc::new(CoercionEngine::new());
}

const TRUTHY: &[&str] = &["1", "on", "true", "yes"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f %z"];

/// A Rust type a member can be declared with.
pub trait Coercible: Sized {
    const KIND: Kind;
    const NULLABLE: bool = false;
    /// Unwraps a value already coerced to `KIND`.
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! coercible_integer {
    ($($t:ty => $kind:ident),* $(,)?) => {
        $(
            impl Coercible for $t {
                const KIND: Kind = Kind::$kind;
                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::Int(i) => <$t>::try_from(i).ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

coercible_integer!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
);

macro_rules! coercible_variant {
    ($($t:ty => $kind:ident, $variant:ident);* $(;)?) => {
        $(
            impl Coercible for $t {
                const KIND: Kind = Kind::$kind;
                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

coercible_variant!(
    bool => Bool, Bool;
    f64 => Float64, Float;
    BigDecimal => Decimal, Decimal;
    String => Text, Text;
    Vec<u8> => Blob, Blob;
    NaiveDate => Date, Date;
    NaiveDateTime => DateTime, DateTime;
    DateTime<FixedOffset> => DateTimeOffset, DateTimeOffset;
    Uuid => Guid, Guid;
);

impl Coercible for f32 {
    const KIND: Kind = Kind::Float32;
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Float(f) => Some(f as f32),
            _ => None,
        }
    }
}

impl Coercible for DateTime<Utc> {
    const KIND: Kind = Kind::DateTimeOffset;
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::DateTimeOffset(d) => Some(d.with_timezone(&Utc)),
            _ => None,
        }
    }
}

impl<V: Coercible> Coercible for Option<V> {
    const KIND: Kind = V::KIND;
    const NULLABLE: bool = true;
    fn from_value(value: Value) -> Option<Self> {
        V::from_value(value).map(Some)
    }
}

/// An enumeration stored as its ordinal.
pub trait SqlEnum: Sized {
    const VARIANTS: &'static [(&'static str, i64)];
    fn from_ordinal(ordinal: i64) -> Option<Self>;
    fn ordinal(&self) -> i64;
}

/// Declares a fieldless enum together with its [`SqlEnum`] implementation.
///
/// ```
/// sqlforge::sql_enum! {
///     #[derive(Default)]
///     pub enum Status {
///         #[default]
///         Active = 1,
///         Suspended = 2,
///     }
/// }
/// use sqlforge::hydrate::SqlEnum;
/// assert_eq!(Status::from_ordinal(2), Some(Status::Suspended));
/// ```
#[macro_export]
macro_rules! sql_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$variant_meta:meta])* $variant:ident = $ordinal:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        $vis enum $name {
            $( $(#[$variant_meta])* $variant = $ordinal ),+
        }
        impl $crate::hydrate::SqlEnum for $name {
            const VARIANTS: &'static [(&'static str, i64)] =
                &[$( (stringify!($variant), $ordinal) ),+];
            fn from_ordinal(ordinal: i64) -> Option<Self> {
                $( if ordinal == $ordinal { return Some($name::$variant); } )+
                None
            }
            fn ordinal(&self) -> i64 {
                *self as i64
            }
        }
    };
}

/// Converts a raw value for a custom kind.
pub trait Coercer: Send + Sync {
    fn coerce(&self, raw: &Value) -> Option<Value>;
}

impl<F> Coercer for F
where
    F: Fn(&Value) -> Option<Value> + Send + Sync,
{
    fn coerce(&self, raw: &Value) -> Option<Value> {
        self(raw)
    }
}

#[derive(Clone, Default)]
pub struct CoercionEngine {
    custom: HashMap<String, Arc<dyn Coercer>>,
}

impl fmt::Debug for CoercionEngine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CoercionEngine")
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CoercionEngine {
    pub fn new() -> Self {
        Self::default()
    }
    /// The shared engine with no custom coercers.
    pub fn standard() -> Arc<CoercionEngine> {
        STANDARD_ENGINE.clone()
    }
    /// Registers a coercer for the kind named `type_name`. A coercer for a
    /// built-in kind name takes precedence over the generic conversion.
    pub fn register(&mut self, type_name: &str, coercer: impl Coercer + 'static) -> &mut Self {
        self.custom.insert(type_name.to_string(), Arc::new(coercer));
        self
    }
    pub fn is_registered(&self, type_name: &str) -> bool {
        self.custom.contains_key(type_name)
    }

    pub fn coerce(&self, kind: Kind, raw: Value) -> Option<Value> {
        match &raw {
            Value::Null => return None,
            Value::Text(s) if s.is_empty() => return None,
            _ => {}
        }
        if raw.kind() == kind {
            return Some(raw);
        }
        let coerced = match kind {
            Kind::Bool => Some(Value::Bool(truthy(&raw))),
            Kind::Guid => to_guid(&raw),
            Kind::Enum(variants) => to_ordinal(variants, &raw),
            Kind::Custom(name) => match self.custom.get(name) {
                Some(coercer) => coercer.coerce(&raw),
                None => Some(raw.clone()),
            },
            other => match self.custom.get(other.name()) {
                Some(coercer) => coercer.coerce(&raw),
                None => convert(other, &raw),
            },
        };
        if coerced.is_none() {
            trace!(kind = kind.name(), raw = ?raw, "Value could not be coerced, member left unchanged");
        }
        coerced
    }
}

fn truthy(raw: &Value) -> bool {
    match raw.to_text() {
        Some(text) => {
            let text = text.trim();
            TRUTHY.iter().any(|t| t.eq_ignore_ascii_case(text))
        }
        None => false,
    }
}

fn to_guid(raw: &Value) -> Option<Value> {
    match raw {
        Value::Text(s) => Uuid::parse_str(s.trim()).ok().map(Value::Guid),
        Value::Blob(b) => Uuid::from_slice(b).ok().map(Value::Guid),
        _ => None,
    }
}

fn to_ordinal(variants: &[(&str, i64)], raw: &Value) -> Option<Value> {
    if let Value::Text(s) = raw {
        let s = s.trim();
        if let Ok(ordinal) = s.parse::<i64>() {
            return Some(Value::Int(ordinal));
        }
        return variants
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|(_, ordinal)| Value::Int(*ordinal));
    }
    to_i64(raw).map(Value::Int)
}

fn convert(kind: Kind, raw: &Value) -> Option<Value> {
    match kind {
        k if k.is_integer() => to_i64(raw).filter(|i| k.fits(*i)).map(Value::Int),
        Kind::Float32 | Kind::Float64 => to_f64(raw).map(Value::Float),
        Kind::Decimal => to_decimal(raw).map(Value::Decimal),
        Kind::Text => raw.to_text().map(Value::Text),
        Kind::Blob => match raw {
            Value::Text(s) => Some(Value::Blob(s.as_bytes().to_vec())),
            Value::Guid(g) => Some(Value::Blob(g.as_bytes().to_vec())),
            _ => None,
        },
        Kind::Date => to_datetime(raw).map(|d| Value::Date(d.date())),
        Kind::DateTime => to_datetime(raw).map(Value::DateTime),
        Kind::DateTimeOffset => to_offset(raw).map(Value::DateTimeOffset),
        _ => None,
    }
}

fn to_i64(raw: &Value) -> Option<i64> {
    match raw {
        Value::Int(i) => Some(*i),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Float(f) => {
            let rounded = f.round_ties_even();
            if rounded.is_finite() && rounded >= i64::MIN as f64 && rounded < i64::MAX as f64 {
                Some(rounded as i64)
            } else {
                None
            }
        }
        Value::Decimal(d) => d.round(0).to_i64(),
        Value::Text(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn to_f64(raw: &Value) -> Option<f64> {
    match raw {
        Value::Int(i) => Some(*i as f64),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Float(f) => Some(*f),
        Value::Decimal(d) => d.to_f64(),
        Value::Text(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn to_decimal(raw: &Value) -> Option<BigDecimal> {
    match raw {
        Value::Int(i) => Some(BigDecimal::from(*i)),
        Value::Bool(b) => Some(BigDecimal::from(i64::from(*b))),
        Value::Float(f) => BigDecimal::from_f64(*f),
        Value::Text(s) => BigDecimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .or_else(|| parse_offset(s).map(|d| d.naive_utc()))
}

fn parse_offset(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .ok()
        .or_else(|| OFFSET_FORMATS.iter().find_map(|f| DateTime::parse_from_str(s, f).ok()))
}

fn to_datetime(raw: &Value) -> Option<NaiveDateTime> {
    match raw {
        Value::Text(s) => parse_datetime(s),
        Value::Date(d) => Some(d.and_time(NaiveTime::MIN)),
        Value::DateTime(d) => Some(*d),
        Value::DateTimeOffset(d) => Some(d.naive_utc()),
        Value::Int(secs) => DateTime::from_timestamp(*secs, 0).map(|d| d.naive_utc()),
        _ => None,
    }
}

// Naive values are taken to be UTC.
fn to_offset(raw: &Value) -> Option<DateTime<FixedOffset>> {
    match raw {
        Value::Text(s) => parse_offset(s).or_else(|| parse_datetime(s).map(|d| d.and_utc().fixed_offset())),
        other => to_datetime(other).map(|d| d.and_utc().fixed_offset()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Arc<CoercionEngine> {
        CoercionEngine::standard()
    }

    #[test]
    fn null_and_empty_text_assign_nothing() {
        assert_eq!(engine().coerce(Kind::Int32, Value::Null), None);
        assert_eq!(engine().coerce(Kind::Text, Value::from("")), None);
    }

    #[test]
    fn bool_uses_truthy_words() {
        for (raw, expected) in [("YES", true), (" on ", true), ("1", true), ("no", false), ("2", false)] {
            assert_eq!(engine().coerce(Kind::Bool, Value::from(raw)), Some(Value::Bool(expected)));
        }
        assert_eq!(engine().coerce(Kind::Bool, Value::Int(1)), Some(Value::Bool(true)));
    }

    #[test]
    fn floats_round_half_to_even_with_range_check() {
        assert_eq!(engine().coerce(Kind::Int32, Value::Float(2.5)), Some(Value::Int(2)));
        assert_eq!(engine().coerce(Kind::Int32, Value::Float(3.5)), Some(Value::Int(4)));
        assert_eq!(engine().coerce(Kind::Int8, Value::Int(300)), None);
        assert_eq!(engine().coerce(Kind::UInt16, Value::Int(-1)), None);
    }

    #[test]
    fn unparsable_text_is_ignored() {
        assert_eq!(engine().coerce(Kind::Int32, Value::from("not-a-number")), None);
        assert_eq!(engine().coerce(Kind::Date, Value::from("someday")), None);
    }

    #[test]
    fn dates_from_text_and_timestamps() {
        let expected = NaiveDate::from_ymd_opt(2023, 7, 14).unwrap();
        assert_eq!(engine().coerce(Kind::Date, Value::from("2023-07-14")), Some(Value::Date(expected)));
        assert_eq!(
            engine().coerce(Kind::Date, Value::from("2023-07-14 08:30:00")),
            Some(Value::Date(expected))
        );
        let epoch = engine().coerce(Kind::DateTime, Value::Int(0));
        assert_eq!(epoch, Some(Value::DateTime(DateTime::from_timestamp(0, 0).unwrap().naive_utc())));
    }

    #[test]
    fn guid_from_text_and_blob() {
        let id = Uuid::new_v4();
        assert_eq!(engine().coerce(Kind::Guid, Value::from(id.to_string())), Some(Value::Guid(id)));
        assert_eq!(engine().coerce(Kind::Guid, Value::Blob(id.as_bytes().to_vec())), Some(Value::Guid(id)));
        assert_eq!(engine().coerce(Kind::Guid, Value::Int(5)), None);
    }

    #[test]
    fn registered_coercer_handles_custom_kind() {
        let mut custom = CoercionEngine::new();
        custom.register("Upper", |raw: &Value| raw.to_text().map(|s| Value::Text(s.to_uppercase())));
        assert_eq!(
            custom.coerce(Kind::Custom("Upper"), Value::from("abc")),
            Some(Value::from("ABC"))
        );
        assert_eq!(
            custom.coerce(Kind::Custom("Unknown"), Value::Int(3)),
            Some(Value::Int(3))
        );
    }
}
