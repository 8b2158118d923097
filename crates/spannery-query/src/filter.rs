//! Filter conditions, sort order and join kinds.

use spannery_core::{Error, Result, Value};

/// Comparison operator of one condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Like,
    /// Case-insensitive LIKE, compiled through `LOWER()`.
    ILike,
    IsNull,
    IsNotNull,
    /// `REGEXP_CONTAINS`.
    Regex,
    /// Inclusive range; the value is a two-element array.
    Between,
}

impl Operator {
    /// Operator keyword as it appears in SQL.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Like => "LIKE",
            Operator::ILike => "ILIKE",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
            Operator::Regex => "REGEXP",
            Operator::Between => "BETWEEN",
        }
    }

    /// Parse a lookup suffix such as `lt` or `not_in` (case-insensitive).
    #[must_use]
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Some(match suffix.to_ascii_lowercase().as_str() {
            "eq" => Operator::Eq,
            "ne" | "not" => Operator::Ne,
            "lt" => Operator::Lt,
            "lte" | "le" => Operator::Le,
            "gt" => Operator::Gt,
            "gte" | "ge" => Operator::Ge,
            "in" => Operator::In,
            "not_in" | "notin" => Operator::NotIn,
            "like" => Operator::Like,
            "ilike" => Operator::ILike,
            "isnull" | "is_null" => Operator::IsNull,
            "isnotnull" | "is_not_null" => Operator::IsNotNull,
            "regex" => Operator::Regex,
            "between" => Operator::Between,
            _ => return None,
        })
    }

    /// Whether the operator binds no value.
    #[must_use]
    pub const fn is_unary(&self) -> bool {
        matches!(self, Operator::IsNull | Operator::IsNotNull)
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A column reference inside a condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnRef {
    /// Field of the queried model (alias `t0`).
    Base(String),
    /// Field of a joined table, named by table name or join alias.
    Qualified { table: String, column: String },
}

impl ColumnRef {
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            ColumnRef::Base(column) | ColumnRef::Qualified { column, .. } => column,
        }
    }
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnRef::Base(column) => f.write_str(column),
            ColumnRef::Qualified { table, column } => write!(f, "{table}.{column}"),
        }
    }
}

/// One predicate: column, operator, operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: ColumnRef,
    pub op: Operator,
    /// Operand. An array for `In`/`NotIn`, a two-element array for
    /// `Between`, `Null` for the unary operators.
    pub value: Value,
}

macro_rules! comparison_constructors {
    ($($name:ident => $op:ident),* $(,)?) => {
        $(
            #[must_use]
            pub fn $name(field: impl Into<String>, value: impl Into<Value>) -> Self {
                Self::new(field, Operator::$op, value)
            }
        )*
    };
}

impl Condition {
    /// Condition on a base-table field.
    #[must_use]
    pub fn new(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self {
            column: ColumnRef::Base(field.into()),
            op,
            value: value.into(),
        }
    }

    /// Condition on a column of a joined table.
    #[must_use]
    pub fn qualified(
        table: impl Into<String>,
        column: impl Into<String>,
        op: Operator,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            column: ColumnRef::Qualified {
                table: table.into(),
                column: column.into(),
            },
            op,
            value: value.into(),
        }
    }

    comparison_constructors! {
        eq => Eq,
        ne => Ne,
        lt => Lt,
        le => Le,
        gt => Gt,
        ge => Ge,
        like => Like,
        ilike => ILike,
        regex => Regex,
    }

    #[must_use]
    pub fn is_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::new(
            field,
            Operator::In,
            Value::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    #[must_use]
    pub fn not_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::new(
            field,
            Operator::NotIn,
            Value::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    #[must_use]
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::IsNull, Value::Null)
    }

    #[must_use]
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::IsNotNull, Value::Null)
    }

    /// Inclusive range condition.
    #[must_use]
    pub fn between(field: impl Into<String>, start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Self::new(
            field,
            Operator::Between,
            Value::Array(vec![start.into(), end.into()]),
        )
    }

    /// Parse a `Field__suffix` lookup key. A key without a suffix means equality.
    ///
    /// ```ignore
    /// Condition::parse("ListPrice__lt", 20)?; // ListPrice < 20
    /// Condition::parse("OnSale", true)?;      // OnSale = true
    /// ```
    pub fn parse(key: &str, value: impl Into<Value>) -> Result<Self> {
        let (field, op) = match key.split_once("__") {
            Some((field, suffix)) => {
                let op = Operator::from_suffix(suffix).ok_or_else(|| {
                    Error::Custom(format!("unknown lookup `{suffix}` in `{key}`"))
                })?;
                (field, op)
            }
            None => (key, Operator::Eq),
        };
        let value = if op.is_unary() { Value::Null } else { value.into() };
        Ok(Self::new(field, op, value))
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.op.is_unary() {
            write!(f, "{} {}", self.column, self.op)
        } else {
            write!(f, "{} {} {}", self.column, self.op, self.value)
        }
    }
}

/// An entry of the WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Condition(Condition),
    /// Conditions joined by OR, emitted as one parenthesized group.
    AnyOf(Vec<Condition>),
}

impl From<Condition> for Filter {
    fn from(condition: Condition) -> Self {
        Filter::Condition(condition)
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Filter::Condition(c) => write!(f, "{c}"),
            Filter::AnyOf(conditions) => {
                f.write_str("(")?;
                for (i, c) in conditions.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" OR ")?;
                    }
                    write!(f, "{c}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Human-readable summary of filters, used in not-found errors.
#[must_use]
pub fn describe_filters(filters: &[Filter]) -> String {
    if filters.is_empty() {
        return "no filters".to_string();
    }
    filters
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl Order {
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// Join kind, emitted verbatim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

impl JoinKind {
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lookup_keys() {
        let c = Condition::parse("ListPrice__lt", 20_i64).unwrap();
        assert_eq!(c.column, ColumnRef::Base("ListPrice".to_string()));
        assert_eq!(c.op, Operator::Lt);
        assert_eq!(c.value, Value::Int64(20));

        let c = Condition::parse("OnSale", true).unwrap();
        assert_eq!(c.op, Operator::Eq);

        let c = Condition::parse("Description__isnull", true).unwrap();
        assert_eq!(c.op, Operator::IsNull);
        assert_eq!(c.value, Value::Null);

        assert!(Condition::parse("Name__near", "x").is_err());
    }

    #[test]
    fn test_describe_filters() {
        let filters = vec![
            Filter::from(Condition::lt("Stock", 10_i64)),
            Filter::AnyOf(vec![Condition::eq("Name", "John"), Condition::eq("Name", "Jane")]),
            Filter::from(Condition::is_null("Description")),
        ];
        assert_eq!(
            describe_filters(&filters),
            "Stock < 10 AND (Name = 'John' OR Name = 'Jane') AND Description IS NULL"
        );
        assert_eq!(describe_filters(&[]), "no filters");
    }

    #[test]
    fn test_keywords() {
        assert_eq!(JoinKind::default().as_sql(), "INNER JOIN");
        assert_eq!(JoinKind::Full.as_sql(), "FULL JOIN");
        assert_eq!(Order::Desc.as_sql(), "DESC");
        assert_eq!(Operator::NotIn.to_string(), "NOT IN");
    }
}
