//! Column types understood by the database service.

use serde::{Deserialize, Serialize};

/// Length used for foreign-key columns (UUID text).
pub const FOREIGN_KEY_LENGTH: u32 = 36;

/// A column type as written in DDL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpannerType {
    /// `STRING(n)` or `STRING(MAX)`.
    String { max_length: Option<u32> },
    /// `INT64`
    Int64,
    /// `BOOL`
    Bool,
    /// `FLOAT64`
    Float64,
    /// `NUMERIC` or `NUMERIC(p, s)`.
    Numeric {
        precision: Option<u8>,
        scale: Option<u8>,
    },
    /// `TIMESTAMP`
    Timestamp,
    /// `DATE`
    Date,
    /// `JSON`
    Json,
    /// `BYTES(n)` or `BYTES(MAX)`.
    Bytes { max_length: Option<u32> },
    /// `ARRAY<T>`
    Array(Box<SpannerType>),
}

impl SpannerType {
    /// Unbounded `STRING(MAX)`.
    #[must_use]
    pub const fn string() -> Self {
        SpannerType::String { max_length: None }
    }

    /// Unscaled `NUMERIC`.
    #[must_use]
    pub const fn numeric() -> Self {
        SpannerType::Numeric {
            precision: None,
            scale: None,
        }
    }

    /// Unbounded `BYTES(MAX)`.
    #[must_use]
    pub const fn bytes() -> Self {
        SpannerType::Bytes { max_length: None }
    }

    /// `ARRAY<item>`.
    #[must_use]
    pub fn array(item: SpannerType) -> Self {
        SpannerType::Array(Box::new(item))
    }

    /// Bare type code used for query parameter typing (`STRING`, `INT64`...).
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            SpannerType::String { .. } => "STRING",
            SpannerType::Int64 => "INT64",
            SpannerType::Bool => "BOOL",
            SpannerType::Float64 => "FLOAT64",
            SpannerType::Numeric { .. } => "NUMERIC",
            SpannerType::Timestamp => "TIMESTAMP",
            SpannerType::Date => "DATE",
            SpannerType::Json => "JSON",
            SpannerType::Bytes { .. } => "BYTES",
            SpannerType::Array(_) => "ARRAY",
        }
    }

    /// Full DDL spelling, e.g. `STRING(MAX)` or `ARRAY<INT64>`.
    #[must_use]
    pub fn ddl(&self) -> String {
        match self {
            SpannerType::String { max_length } => sized("STRING", *max_length),
            SpannerType::Bytes { max_length } => sized("BYTES", *max_length),
            SpannerType::Numeric {
                precision: Some(p),
                scale: Some(s),
            } => format!("NUMERIC({p}, {s})"),
            SpannerType::Array(item) => format!("ARRAY<{}>", item.ddl()),
            other => other.code().to_string(),
        }
    }
}

fn sized(base: &str, max_length: Option<u32>) -> String {
    match max_length {
        Some(n) => format!("{base}({n})"),
        None => format!("{base}(MAX)"),
    }
}

impl std::fmt::Display for SpannerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.ddl())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ddl_spelling() {
        assert_eq!(SpannerType::string().ddl(), "STRING(MAX)");
        assert_eq!(
            SpannerType::String {
                max_length: Some(100)
            }
            .ddl(),
            "STRING(100)"
        );
        assert_eq!(SpannerType::Int64.ddl(), "INT64");
        assert_eq!(SpannerType::Bool.ddl(), "BOOL");
        assert_eq!(SpannerType::Float64.ddl(), "FLOAT64");
        assert_eq!(SpannerType::Timestamp.ddl(), "TIMESTAMP");
        assert_eq!(SpannerType::Date.ddl(), "DATE");
        assert_eq!(SpannerType::Json.ddl(), "JSON");
        assert_eq!(SpannerType::bytes().ddl(), "BYTES(MAX)");
        assert_eq!(
            SpannerType::Bytes {
                max_length: Some(50)
            }
            .ddl(),
            "BYTES(50)"
        );
    }

    #[test]
    fn test_numeric_precision_needs_both_parts() {
        assert_eq!(SpannerType::numeric().ddl(), "NUMERIC");
        let sized = SpannerType::Numeric {
            precision: Some(10),
            scale: Some(2),
        };
        assert_eq!(sized.ddl(), "NUMERIC(10, 2)");
        let partial = SpannerType::Numeric {
            precision: Some(10),
            scale: None,
        };
        assert_eq!(partial.ddl(), "NUMERIC");
    }

    #[test]
    fn test_array_nesting() {
        assert_eq!(
            SpannerType::array(SpannerType::string()).ddl(),
            "ARRAY<STRING(MAX)>"
        );
        assert_eq!(SpannerType::array(SpannerType::Int64).ddl(), "ARRAY<INT64>");
        assert_eq!(
            SpannerType::array(SpannerType::String {
                max_length: Some(50)
            })
            .ddl(),
            "ARRAY<STRING(50)>"
        );
        assert_eq!(SpannerType::array(SpannerType::Int64).code(), "ARRAY");
    }
}
