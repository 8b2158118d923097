//! SQL text plus its bound parameters.

use crate::error::{Error, Result};
use crate::types::SpannerType;
use crate::value::Value;

/// Named parameters in binding order. Names are written without the `@`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, Value)>,
}

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` under `name`, replacing an earlier binding of that name.
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Parameter types inferred from the bound values. NULLs and empty
    /// arrays carry no type and are left for the client to infer.
    #[must_use]
    pub fn types(&self) -> Vec<(&str, SpannerType)> {
        self.entries
            .iter()
            .filter_map(|(n, v)| v.param_type().map(|t| (n.as_str(), t)))
            .collect()
    }
}

impl<N: Into<String>> FromIterator<(N, Value)> for Params {
    fn from_iter<I: IntoIterator<Item = (N, Value)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.push(name, value);
        }
        params
    }
}

/// Scheduling priority the client attaches to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Name used by the Spanner API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "PRIORITY_LOW",
            Priority::Medium => "PRIORITY_MEDIUM",
            Priority::High => "PRIORITY_HIGH",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = Error;

    /// Accepts `LOW`, `MEDIUM`, `HIGH` in any case, with or without the
    /// `PRIORITY_` prefix.
    fn from_str(s: &str) -> Result<Self> {
        let upper = s.to_ascii_uppercase();
        match upper.strip_prefix("PRIORITY_").unwrap_or(&upper) {
            "LOW" => Ok(Priority::Low),
            "MEDIUM" => Ok(Priority::Medium),
            "HIGH" => Ok(Priority::High),
            _ => Err(Error::Custom(format!("unknown request priority `{s}`"))),
        }
    }
}

/// Per-request options forwarded to the client with a statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Free-form tag shown in Spanner's query statistics.
    pub request_tag: Option<String>,
    pub priority: Option<Priority>,
}

impl RequestOptions {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.request_tag.is_none() && self.priority.is_none()
    }
}

/// A parameterized SQL statement ready for the client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Params,
    pub options: RequestOptions,
}

impl Statement {
    /// Statement without parameters.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self::with_params(sql, Params::new())
    }

    #[must_use]
    pub fn with_params(sql: impl Into<String>, params: Params) -> Self {
        Self {
            sql: sql.into(),
            params,
            options: RequestOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Builder-style bind.
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.push(name, value.into());
        self
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sql)?;
        if !self.params.is_empty() {
            f.write_str(" {")?;
            for (i, (name, value)) in self.params.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{name}: {value}")?;
            }
            f.write_str("}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_keeps_order_and_replaces() {
        let mut params = Params::new();
        params.push("p0", Value::Int64(1));
        params.push("p1", Value::from("x"));
        params.push("p0", Value::Int64(2));
        assert_eq!(params.names().collect::<Vec<_>>(), vec!["p0", "p1"]);
        assert_eq!(params.get("p0"), Some(&Value::Int64(2)));
    }

    #[test]
    fn test_types_skip_nulls() {
        let params: Params = [("a", Value::Int64(1)), ("b", Value::Null)].into_iter().collect();
        assert_eq!(params.types(), vec![("a", SpannerType::Int64)]);
    }

    #[test]
    fn test_display() {
        let stmt = Statement::new("SELECT * FROM Products AS t0 WHERE t0.Stock < @p0").bind("p0", 10_i64);
        assert_eq!(
            stmt.to_string(),
            "SELECT * FROM Products AS t0 WHERE t0.Stock < @p0 {p0: 10}"
        );
        assert_eq!(Statement::new("SELECT 1").to_string(), "SELECT 1");
    }

    #[test]
    fn test_priority_names() {
        assert_eq!("high".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("PRIORITY_LOW".parse::<Priority>().unwrap(), Priority::Low);
        assert_eq!(Priority::Medium.to_string(), "PRIORITY_MEDIUM");
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_options_ride_along() {
        let stmt = Statement::new("SELECT 1").with_options(RequestOptions {
            request_tag: Some("nightly-report".to_string()),
            priority: Some(Priority::Low),
        });
        assert!(!stmt.options.is_empty());
        assert_eq!(stmt.options.request_tag.as_deref(), Some("nightly-report"));
        assert!(Statement::new("SELECT 1").options.is_empty());
    }
}
