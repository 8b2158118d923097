//! Field declarations and per-field value coercion.

use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::{Error, Result};
use crate::types::{FOREIGN_KEY_LENGTH, SpannerType};
use crate::value::Value;

/// What happens to interleaved child rows when the parent row is deleted.
///
/// The service only supports these two policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferentialAction {
    /// Child rows are deleted together with the parent.
    #[default]
    Cascade,
    /// Deleting a parent with children fails.
    NoAction,
}

impl ReferentialAction {
    /// Get the SQL representation of this action.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::NoAction => "NO ACTION",
        }
    }

    /// Parse a referential action from a string (case-insensitive).
    ///
    /// Returns `None` if the string is not a recognized action.
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "CASCADE" => Some(ReferentialAction::Cascade),
            "NO ACTION" | "NOACTION" | "NO_ACTION" => Some(ReferentialAction::NoAction),
            _ => None,
        }
    }
}

/// Default applied to a field that was not given a value.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// A fixed value.
    Static(Value),
    /// Called once per instance, e.g. to mint an id.
    Generator(fn() -> Value),
}

impl DefaultValue {
    /// Produce the default for one instance.
    #[must_use]
    pub fn produce(&self) -> Value {
        match self {
            DefaultValue::Static(v) => v.clone(),
            DefaultValue::Generator(f) => f(),
        }
    }
}

/// Generator for random UUID v4 strings; the usual primary-key default.
#[must_use]
pub fn uuid4() -> Value {
    Value::String(uuid::Uuid::new_v4().to_string())
}

/// Generator for the current UTC timestamp.
#[must_use]
pub fn now() -> Value {
    Value::Timestamp(Utc::now())
}

/// Foreign-key metadata carried by a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyInfo {
    /// Model name of the referenced model (resolved through the registry).
    pub related_model: &'static str,
    /// Name of the reverse relation on the referenced model.
    pub related_name: Option<&'static str>,
    /// Whether deleting the referenced row should delete this one.
    pub cascade_delete: bool,
}

/// Metadata about one model field / table column.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    /// Field and column name.
    pub name: &'static str,
    /// Column type.
    pub spanner_type: SpannerType,
    /// Whether NULL is allowed. Fields are nullable unless declared otherwise.
    pub nullable: bool,
    /// Part of the primary key (in declaration order).
    pub primary_key: bool,
    /// Default for instances that do not set this field.
    pub default: Option<DefaultValue>,
    /// Set to "now" on every write.
    pub auto_now: bool,
    /// Set to "now" on insert when unset.
    pub auto_now_add: bool,
    /// Create a secondary index on this column.
    pub index: bool,
    /// Create a unique index on this column.
    pub unique: bool,
    /// Free-form documentation.
    pub description: Option<&'static str>,
    /// Foreign-key metadata, for relationship fields.
    pub foreign_key: Option<ForeignKeyInfo>,
}

impl FieldInfo {
    /// Create a new nullable field of the given type.
    #[must_use]
    pub const fn new(name: &'static str, spanner_type: SpannerType) -> Self {
        Self {
            name,
            spanner_type,
            nullable: true,
            primary_key: false,
            default: None,
            auto_now: false,
            auto_now_add: false,
            index: false,
            unique: false,
            description: None,
            foreign_key: None,
        }
    }

    /// `STRING(MAX)` field.
    #[must_use]
    pub const fn string(name: &'static str) -> Self {
        Self::new(name, SpannerType::string())
    }

    /// `INT64` field.
    #[must_use]
    pub const fn int64(name: &'static str) -> Self {
        Self::new(name, SpannerType::Int64)
    }

    /// `BOOL` field.
    #[must_use]
    pub const fn bool(name: &'static str) -> Self {
        Self::new(name, SpannerType::Bool)
    }

    /// `FLOAT64` field.
    #[must_use]
    pub const fn float64(name: &'static str) -> Self {
        Self::new(name, SpannerType::Float64)
    }

    /// `NUMERIC` field.
    #[must_use]
    pub const fn numeric(name: &'static str) -> Self {
        Self::new(name, SpannerType::numeric())
    }

    /// `TIMESTAMP` field.
    #[must_use]
    pub const fn timestamp(name: &'static str) -> Self {
        Self::new(name, SpannerType::Timestamp)
    }

    /// `DATE` field.
    #[must_use]
    pub const fn date(name: &'static str) -> Self {
        Self::new(name, SpannerType::Date)
    }

    /// `JSON` field.
    #[must_use]
    pub const fn json(name: &'static str) -> Self {
        Self::new(name, SpannerType::Json)
    }

    /// `BYTES(MAX)` field.
    #[must_use]
    pub const fn bytes(name: &'static str) -> Self {
        Self::new(name, SpannerType::bytes())
    }

    /// `ARRAY<item>` field.
    #[must_use]
    pub fn array(name: &'static str, item: SpannerType) -> Self {
        Self::new(name, SpannerType::array(item))
    }

    /// Foreign-key field referencing `related_model` (a registered model name).
    #[must_use]
    pub fn foreign_key(name: &'static str, related_model: &'static str) -> Self {
        let mut field = Self::new(
            name,
            SpannerType::String {
                max_length: Some(FOREIGN_KEY_LENGTH),
            },
        );
        field.foreign_key = Some(ForeignKeyInfo {
            related_model,
            related_name: None,
            cascade_delete: false,
        });
        field
    }

    /// Mark as part of the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark as `NOT NULL`.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Set nullability explicitly.
    #[must_use]
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Static default value.
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Static(value.into()));
        self
    }

    /// Default produced by a generator, e.g. [`uuid4`] or [`now`].
    #[must_use]
    pub fn default_with(mut self, generator: fn() -> Value) -> Self {
        self.default = Some(DefaultValue::Generator(generator));
        self
    }

    /// Length limit for `STRING` and `BYTES` columns. Ignored for other types.
    #[must_use]
    pub fn max_length(mut self, n: u32) -> Self {
        match &mut self.spanner_type {
            SpannerType::String { max_length } | SpannerType::Bytes { max_length } => {
                *max_length = Some(n);
            }
            SpannerType::Array(item) => {
                if let SpannerType::String { max_length } | SpannerType::Bytes { max_length } =
                    item.as_mut()
                {
                    *max_length = Some(n);
                }
            }
            _ => {}
        }
        self
    }

    /// Precision and scale for `NUMERIC` columns. Ignored for other types.
    #[must_use]
    pub fn precision(mut self, precision: u8, scale: u8) -> Self {
        if let SpannerType::Numeric {
            precision: p,
            scale: s,
        } = &mut self.spanner_type
        {
            *p = Some(precision);
            *s = Some(scale);
        }
        self
    }

    /// Refresh to "now" on every insert and update.
    #[must_use]
    pub fn auto_now(mut self) -> Self {
        self.auto_now = true;
        self
    }

    /// Fill with "now" on insert when unset.
    #[must_use]
    pub fn auto_now_add(mut self) -> Self {
        self.auto_now_add = true;
        self
    }

    /// Request a secondary index.
    #[must_use]
    pub fn index(mut self) -> Self {
        self.index = true;
        self
    }

    /// Request a unique index.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn description(mut self, text: &'static str) -> Self {
        self.description = Some(text);
        self
    }

    /// Reverse relation name for a foreign-key field.
    #[must_use]
    pub fn related_name(mut self, name: &'static str) -> Self {
        if let Some(fk) = &mut self.foreign_key {
            fk.related_name = Some(name);
        }
        self
    }

    /// Cascade deletes from the referenced row. Only meaningful on foreign keys.
    #[must_use]
    pub fn cascade_delete(mut self) -> Self {
        if let Some(fk) = &mut self.foreign_key {
            fk.cascade_delete = true;
        }
        self
    }

    /// Whether a default exists for this field.
    #[must_use]
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Encode a value for storage in this column.
    ///
    /// `auto_now` fields always encode to the current time.
    pub fn to_db_value(&self, value: Value) -> Result<Value> {
        if self.auto_now {
            return Ok(now());
        }
        encode(self.name, &self.spanner_type, value)
    }

    /// Decode a value read back from this column.
    pub fn from_db_value(&self, value: Value) -> Result<Value> {
        decode(self.name, &self.spanner_type, value)
    }
}

fn mismatch(field: &str, ty: &SpannerType, value: &Value) -> Error {
    Error::conversion(field, ty.ddl(), value.type_name())
}

fn encode(field: &str, ty: &SpannerType, value: Value) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let out = match (ty, value) {
        (SpannerType::String { .. }, v @ Value::String(_)) => v,
        (SpannerType::Int64, Value::Int64(i)) => Value::Int64(i),
        (SpannerType::Int64, Value::Bool(b)) => Value::Int64(i64::from(b)),
        // Whole floats inside the i64 range only.
        (SpannerType::Int64, Value::Float64(f))
            if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 =>
        {
            Value::Int64(f as i64)
        }
        (SpannerType::Int64, Value::String(s)) => match s.trim().parse::<i64>() {
            Ok(i) => Value::Int64(i),
            Err(_) => return Err(mismatch(field, ty, &Value::String(s))),
        },
        (SpannerType::Bool, Value::Bool(b)) => Value::Bool(b),
        (SpannerType::Bool, Value::Int64(i)) => Value::Bool(i != 0),
        (SpannerType::Bool, Value::String(s)) => match parse_bool(&s) {
            Some(b) => Value::Bool(b),
            None => return Err(mismatch(field, ty, &Value::String(s))),
        },
        (SpannerType::Float64, Value::Float64(f)) => Value::Float64(f),
        (SpannerType::Float64, Value::Int64(i)) => Value::Float64(i as f64),
        (SpannerType::Float64, Value::Numeric(d)) => match d.to_f64() {
            Some(f) => Value::Float64(f),
            None => return Err(mismatch(field, ty, &Value::Numeric(d))),
        },
        (SpannerType::Float64, Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(f) => Value::Float64(f),
            Err(_) => return Err(mismatch(field, ty, &Value::String(s))),
        },
        (SpannerType::Numeric { .. }, Value::Numeric(d)) => Value::Numeric(d),
        (SpannerType::Numeric { .. }, Value::Int64(i)) => Value::Numeric(Decimal::from(i)),
        // Shortest textual form, so 123.45 becomes exactly 123.45.
        (SpannerType::Numeric { .. }, Value::Float64(f)) => match Decimal::from_str(&f.to_string()) {
            Ok(d) => Value::Numeric(d),
            Err(_) => return Err(mismatch(field, ty, &Value::Float64(f))),
        },
        (SpannerType::Numeric { .. }, Value::String(s)) => parse_decimal(field, ty, s)?,
        (SpannerType::Timestamp, Value::Timestamp(ts)) => Value::Timestamp(ts),
        (SpannerType::Timestamp, Value::String(s)) => parse_timestamp(field, ty, s)?,
        (SpannerType::Date, Value::Date(d)) => Value::Date(d),
        (SpannerType::Date, Value::Timestamp(ts)) => Value::Date(ts.date_naive()),
        (SpannerType::Date, Value::String(s)) => parse_date(field, ty, s)?,
        (SpannerType::Bytes { .. }, Value::Bytes(b)) => Value::Bytes(b),
        (SpannerType::Bytes { .. }, Value::String(s)) => Value::Bytes(s.into_bytes()),
        (SpannerType::Json, Value::Json(j)) => Value::Json(j),
        (SpannerType::Json, other) => Value::Json(other.to_json()),
        (SpannerType::Array(item), Value::Array(items)) => Value::Array(
            items
                .into_iter()
                .map(|v| encode(field, item, v))
                .collect::<Result<Vec<_>>>()?,
        ),
        (ty, other) => return Err(mismatch(field, ty, &other)),
    };
    Ok(out)
}

fn decode(field: &str, ty: &SpannerType, value: Value) -> Result<Value> {
    let out = match (ty, value) {
        (_, Value::Null) => Value::Null,
        (SpannerType::Int64, Value::String(s)) => match s.trim().parse::<i64>() {
            Ok(i) => Value::Int64(i),
            Err(_) => return Err(mismatch(field, ty, &Value::String(s))),
        },
        (SpannerType::Float64, Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(f) => Value::Float64(f),
            Err(_) => return Err(mismatch(field, ty, &Value::String(s))),
        },
        (SpannerType::Float64, Value::Int64(i)) => Value::Float64(i as f64),
        (SpannerType::Numeric { .. }, Value::String(s)) => parse_decimal(field, ty, s)?,
        (SpannerType::Numeric { .. }, Value::Int64(i)) => Value::Numeric(Decimal::from(i)),
        (SpannerType::Timestamp, Value::String(s)) => parse_timestamp(field, ty, s)?,
        (SpannerType::Date, Value::String(s)) => parse_date(field, ty, s)?,
        (SpannerType::Bytes { .. }, Value::String(s)) => match BASE64.decode(s.as_bytes()) {
            Ok(b) => Value::Bytes(b),
            Err(_) => return Err(mismatch(field, ty, &Value::String(s))),
        },
        (SpannerType::Json, Value::String(s)) => match serde_json::from_str(&s) {
            Ok(j) => Value::Json(j),
            Err(_) => return Err(mismatch(field, ty, &Value::String(s))),
        },
        (SpannerType::Json, Value::Json(j)) => Value::Json(j),
        (SpannerType::Json, other) => Value::Json(other.to_json()),
        (SpannerType::Array(item), Value::Array(items)) => Value::Array(
            items
                .into_iter()
                .map(|v| decode(field, item, v))
                .collect::<Result<Vec<_>>>()?,
        ),
        (_, other) => other,
    };
    Ok(out)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

fn parse_decimal(field: &str, ty: &SpannerType, s: String) -> Result<Value> {
    Decimal::from_str(s.trim())
        .map(Value::Numeric)
        .map_err(|_| mismatch(field, ty, &Value::String(s)))
}

fn parse_timestamp(field: &str, ty: &SpannerType, s: String) -> Result<Value> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|ts| Value::Timestamp(ts.with_timezone(&Utc)))
        .map_err(|_| mismatch(field, ty, &Value::String(s)))
}

fn parse_date(field: &str, ty: &SpannerType, s: String) -> Result<Value> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map(Value::Date)
        .map_err(|_| mismatch(field, ty, &Value::String(s)))
}
