//! Record value model consumed by the rendering pipeline.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

/// Ordered mapping from key to value; one input row of the pipeline.
pub type Record = IndexMap<String, EnumRecordValue>;

/// Deferred scalar, resolved when the flattener or a formatter inspects it.
#[derive(Clone)]
pub struct LazyValue(Arc<dyn Fn() -> EnumRecordValue + Send + Sync>);

impl LazyValue {
    /// Wrap a producer closure.
    pub fn new<F>(producer: F) -> Self
    where
        F: Fn() -> EnumRecordValue + Send + Sync + 'static,
    {
        Self(Arc::new(producer))
    }

    /// Evaluate the producer once.
    pub fn evaluate(&self) -> EnumRecordValue {
        (self.0)()
    }
}

impl fmt::Debug for LazyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LazyValue(..)")
    }
}

impl PartialEq for LazyValue {
    fn eq(&self, other: &Self) -> bool {
        self.evaluate().force() == other.evaluate().force()
    }
}

/// One value inside a record: scalar, sequence, nested mapping or lazy proxy.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EnumRecordValue {
    /// Missing/blank value.
    #[default]
    Null,
    /// Two-valued boolean.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Binary floating point number.
    Float(f64),
    /// Exact decimal number.
    Decimal(Decimal),
    /// Text value.
    Text(String),
    /// Calendar date.
    Date(NaiveDate),
    /// Naive date-time.
    DateTime(NaiveDateTime),
    /// Date-time carrying a UTC offset.
    DateTimeTz(DateTime<FixedOffset>),
    /// Time of day.
    Time(NaiveTime),
    /// Sequence of values.
    List(Vec<EnumRecordValue>),
    /// Nested record.
    Map(Record),
    /// Lazily evaluated proxy.
    Lazy(LazyValue),
}

impl EnumRecordValue {
    /// Create a lazily evaluated value.
    pub fn lazy<F>(producer: F) -> Self
    where
        F: Fn() -> EnumRecordValue + Send + Sync + 'static,
    {
        Self::Lazy(LazyValue::new(producer))
    }

    /// Resolve lazy proxies (recursively) to their concrete value.
    pub fn force(self) -> Self {
        let mut value = self;
        while let Self::Lazy(lazy) = value {
            value = lazy.evaluate();
        }
        value
    }

    /// Borrowing variant of [`Self::force`]; clones only for lazy values.
    pub fn forced(&self) -> std::borrow::Cow<'_, Self> {
        match self {
            Self::Lazy(_) => std::borrow::Cow::Owned(self.clone().force()),
            _ => std::borrow::Cow::Borrowed(self),
        }
    }

    /// Falsy values: null, `false`, zeros, empty text/list/map.
    pub fn is_falsy(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(val) => !val,
            Self::Integer(val) => *val == 0,
            Self::Float(val) => *val == 0.0,
            Self::Decimal(val) => val.is_zero(),
            Self::Text(val) => val.is_empty(),
            Self::List(val) => val.is_empty(),
            Self::Map(val) => val.is_empty(),
            Self::Date(_) | Self::DateTime(_) | Self::DateTimeTz(_) | Self::Time(_) => false,
            Self::Lazy(lazy) => lazy.evaluate().is_falsy(),
        }
    }

    /// Whether the value is a sequence or a mapping.
    pub fn is_structured(&self) -> bool {
        matches!(self.forced().as_ref(), Self::List(_) | Self::Map(_))
    }

    /// Text representation used for sanitizing and list joining.
    pub fn to_display_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(val) => derive_bool_text(*val).to_string(),
            Self::Integer(val) => val.to_string(),
            Self::Float(val) => derive_float_text(*val),
            Self::Decimal(val) => val.to_string(),
            Self::Text(val) => val.clone(),
            Self::Date(val) => val.format("%Y-%m-%d").to_string(),
            Self::DateTime(val) => derive_datetime_text(val),
            Self::DateTimeTz(val) => {
                format!("{}{}", derive_datetime_text(&val.naive_local()), val.offset())
            }
            Self::Time(val) => derive_time_text(val),
            Self::List(_) | Self::Map(_) => self.to_json_value().to_string(),
            Self::Lazy(lazy) => lazy.evaluate().to_display_text(),
        }
    }

    /// JSON projection; dates become ISO text and decimals become strings.
    pub fn to_json_value(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(val) => JsonValue::Bool(*val),
            Self::Integer(val) => JsonValue::from(*val),
            Self::Float(val) => serde_json::Number::from_f64(*val)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Self::Decimal(val) => JsonValue::String(val.to_string()),
            Self::Text(val) => JsonValue::String(val.clone()),
            Self::Date(_) | Self::DateTime(_) | Self::DateTimeTz(_) | Self::Time(_) => {
                JsonValue::String(self.to_display_text())
            }
            Self::List(items) => JsonValue::Array(items.iter().map(Self::to_json_value).collect()),
            Self::Map(record) => JsonValue::Object(
                record
                    .iter()
                    .map(|(key, val)| (key.clone(), val.to_json_value()))
                    .collect(),
            ),
            Self::Lazy(lazy) => lazy.evaluate().to_json_value(),
        }
    }
}

fn derive_bool_text(val: bool) -> &'static str {
    if val { "True" } else { "False" }
}

fn derive_float_text(val: f64) -> String {
    if val.is_finite() && val.fract() == 0.0 && val.abs() < 1e16 {
        format!("{val:.1}")
    } else {
        val.to_string()
    }
}

fn derive_datetime_text(val: &NaiveDateTime) -> String {
    format!("{} {}", val.date().format("%Y-%m-%d"), derive_time_text(&val.time()))
}

fn derive_time_text(val: &NaiveTime) -> String {
    if val.nanosecond() == 0 {
        val.format("%H:%M:%S").to_string()
    } else {
        val.format("%H:%M:%S%.6f").to_string()
    }
}

impl From<JsonValue> for EnumRecordValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(val) => Self::Bool(val),
            JsonValue::Number(val) => match val.as_i64() {
                Some(n) => Self::Integer(n),
                None => val.as_f64().map_or(Self::Null, Self::Float),
            },
            JsonValue::String(val) => Self::Text(val),
            JsonValue::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            JsonValue::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(key, val)| (key, Self::from(val)))
                    .collect(),
            ),
        }
    }
}

/// Convert a JSON object into a [`Record`]; non-object input yields `None`.
pub fn derive_record_from_json(value: JsonValue) -> Option<Record> {
    match EnumRecordValue::from(value) {
        EnumRecordValue::Map(record) => Some(record),
        _ => None,
    }
}

macro_rules! impl_from_scalar {
    ($($src:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$src> for EnumRecordValue {
                fn from(value: $src) -> Self {
                    Self::$variant(value.into())
                }
            }
        )*
    };
}

impl_from_scalar! {
    bool => Bool,
    i64 => Integer,
    i32 => Integer,
    f64 => Float,
    Decimal => Decimal,
    String => Text,
    &str => Text,
    NaiveDate => Date,
    NaiveDateTime => DateTime,
    DateTime<FixedOffset> => DateTimeTz,
    NaiveTime => Time,
    Vec<EnumRecordValue> => List,
    Record => Map,
}
