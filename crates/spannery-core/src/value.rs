//! Dynamically typed column values.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use crate::types::SpannerType;

/// A single column value, either bound as a query parameter or read back from a row.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// SQL NULL
    #[default]
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    /// Exact decimal (NUMERIC). Equality is by value: `1.50 == 1.5`.
    Numeric(Decimal),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Json(serde_json::Value),
    Array(Vec<Value>),
}

impl Value {
    /// Short name of the variant, used in conversion errors.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOL",
            Value::Int64(_) => "INT64",
            Value::Float64(_) => "FLOAT64",
            Value::Numeric(_) => "NUMERIC",
            Value::String(_) => "STRING",
            Value::Bytes(_) => "BYTES",
            Value::Timestamp(_) => "TIMESTAMP",
            Value::Date(_) => "DATE",
            Value::Json(_) => "JSON",
            Value::Array(_) => "ARRAY",
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the string payload, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view; accepts decimal strings because some clients ship INT64 as text.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Parameter type inferred from the value. `None` for NULL and empty arrays.
    #[must_use]
    pub fn param_type(&self) -> Option<SpannerType> {
        Some(match self {
            Value::Null => return None,
            Value::Bool(_) => SpannerType::Bool,
            Value::Int64(_) => SpannerType::Int64,
            Value::Float64(_) => SpannerType::Float64,
            Value::Numeric(_) => SpannerType::numeric(),
            Value::String(_) => SpannerType::string(),
            Value::Bytes(_) => SpannerType::bytes(),
            Value::Timestamp(_) => SpannerType::Timestamp,
            Value::Date(_) => SpannerType::Date,
            Value::Json(_) => SpannerType::Json,
            Value::Array(items) => {
                SpannerType::array(items.iter().find_map(Value::param_type)?)
            }
        })
    }

    /// JSON rendering. Decimals, timestamps and dates become strings, bytes become base64.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int64(v) => Json::from(*v),
            Value::Float64(v) => serde_json::Number::from_f64(*v).map_or(Json::Null, Json::Number),
            Value::Numeric(d) => Json::String(d.to_string()),
            Value::String(s) => Json::String(s.clone()),
            Value::Bytes(b) => Json::String(BASE64.encode(b)),
            Value::Timestamp(ts) => Json::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Date(d) => Json::String(d.format("%Y-%m-%d").to_string()),
            Value::Json(j) => j.clone(),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
        }
    }

    /// Structural conversion from JSON. Objects are kept as [`Value::Json`].
    #[must_use]
    pub fn from_json(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int64(i),
                None => n.as_f64().map_or(Value::Null, Value::Float64),
            },
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from_json).collect()),
            obj @ Json::Object(_) => Value::Json(obj),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::String(s) => write!(f, "'{s}'"),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            other => match other.to_json() {
                serde_json::Value::String(s) => f.write_str(&s),
                json => write!(f, "{json}"),
            },
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

macro_rules! impl_from_scalar {
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

impl_from_scalar! {
    bool => Bool,
    i64 => Int64,
    i32 => Int64,
    u32 => Int64,
    f64 => Float64,
    Decimal => Numeric,
    String => String,
    &str => String,
    Vec<u8> => Bytes,
    DateTime<Utc> => Timestamp,
    NaiveDate => Date,
    serde_json::Value => Json,
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::String(v.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Typed extraction out of a [`Value`].
///
/// On mismatch the original value is handed back so the caller can report it.
pub trait FromValue: Sized {
    /// Name of the expected type, for error messages.
    fn expected() -> &'static str;

    fn from_value(value: Value) -> Result<Self, Value>;
}

macro_rules! impl_from_value {
    ($($ty:ty, $expected:literal, $pat:pat => $out:expr);* $(;)?) => {
        $(
            impl FromValue for $ty {
                fn expected() -> &'static str {
                    $expected
                }

                fn from_value(value: Value) -> Result<Self, Value> {
                    match value {
                        $pat => Ok($out),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

impl_from_value! {
    bool, "BOOL", Value::Bool(v) => v;
    f64, "FLOAT64", Value::Float64(v) => v;
    Decimal, "NUMERIC", Value::Numeric(v) => v;
    String, "STRING", Value::String(v) => v;
    Vec<u8>, "BYTES", Value::Bytes(v) => v;
    DateTime<Utc>, "TIMESTAMP", Value::Timestamp(v) => v;
    NaiveDate, "DATE", Value::Date(v) => v;
    serde_json::Value, "JSON", Value::Json(v) => v;
}

impl FromValue for i64 {
    fn expected() -> &'static str {
        "INT64"
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        value.as_i64().ok_or(value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn expected() -> &'static str {
        T::expected()
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

macro_rules! impl_array_value {
    ($($ty:ty),*) => {
        $(
            impl From<Vec<$ty>> for Value {
                fn from(items: Vec<$ty>) -> Self {
                    Value::Array(items.into_iter().map(Value::from).collect())
                }
            }

            impl FromValue for Vec<$ty> {
                fn expected() -> &'static str {
                    "ARRAY"
                }

                fn from_value(value: Value) -> Result<Self, Value> {
                    let Value::Array(items) = value else {
                        return Err(value);
                    };
                    let mut out = Vec::with_capacity(items.len());
                    for item in &items {
                        match <$ty>::from_value(item.clone()) {
                            Ok(v) => out.push(v),
                            Err(_) => return Err(Value::Array(items)),
                        }
                    }
                    Ok(out)
                }
            }
        )*
    };
}

impl_array_value!(String, i64, f64, bool);
