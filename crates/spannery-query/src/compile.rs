//! Predicate compilation: filters to a parameterized WHERE expression.

use spannery_core::{Error, Params, Result, Value, is_valid_identifier};

use crate::filter::{ColumnRef, Condition, Filter, Operator};
use crate::join::{BASE_ALIAS, JoinPlan};

/// Hands out parameter names from one counter per statement.
#[derive(Debug, Clone)]
pub struct ParamAllocator {
    prefix: String,
    next: usize,
    params: Params,
}

impl ParamAllocator {
    /// Allocator producing `@{prefix}0`, `@{prefix}1`...
    pub fn new(prefix: &str) -> Result<Self> {
        if !is_valid_identifier(&format!("{prefix}0")) {
            return Err(Error::Custom(format!(
                "invalid parameter prefix `{prefix}`"
            )));
        }
        Ok(Self {
            prefix: prefix.to_string(),
            next: 0,
            params: Params::new(),
        })
    }

    /// Bind `value` under a fresh name and return its placeholder.
    pub fn bind(&mut self, value: Value) -> String {
        let name = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        let placeholder = format!("@{name}");
        self.params.push(name, value);
        placeholder
    }

    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    #[must_use]
    pub fn into_params(self) -> Params {
        self.params
    }
}

/// Alias-qualified column for a reference, checked against the schema it
/// resolves to.
pub fn qualify(column: &ColumnRef, plan: &JoinPlan<'_>) -> Result<String> {
    match column {
        ColumnRef::Base(field) => {
            let field = plan.base().require_field(field)?;
            Ok(format!("{BASE_ALIAS}.{}", field.name))
        }
        ColumnRef::Qualified { table, column } => {
            let (alias, schema) = plan.resolve(table)?;
            let field = schema.require_field(column)?;
            Ok(format!("{alias}.{}", field.name))
        }
    }
}

fn list_items(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

/// Compile one condition, binding its operands.
pub fn compile_condition(
    condition: &Condition,
    plan: &JoinPlan<'_>,
    params: &mut ParamAllocator,
) -> Result<String> {
    let col = qualify(&condition.column, plan)?;
    let value = &condition.value;
    let sql = match condition.op {
        Operator::Eq
        | Operator::Ne
        | Operator::Lt
        | Operator::Le
        | Operator::Gt
        | Operator::Ge
        | Operator::Like => {
            let p = params.bind(value.clone());
            format!("{col} {} {p}", condition.op.as_sql())
        }
        Operator::ILike => {
            let p = params.bind(value.clone());
            format!("LOWER({col}) LIKE LOWER({p})")
        }
        Operator::Regex => {
            let p = params.bind(value.clone());
            format!("REGEXP_CONTAINS({col}, {p})")
        }
        Operator::IsNull => format!("{col} IS NULL"),
        Operator::IsNotNull => format!("{col} IS NOT NULL"),
        Operator::In | Operator::NotIn => {
            let items = list_items(value);
            if items.is_empty() {
                // Nothing is in an empty list.
                return Ok(if condition.op == Operator::In { "FALSE" } else { "TRUE" }.to_string());
            }
            let placeholders: Vec<String> = items.into_iter().map(|v| params.bind(v)).collect();
            format!("{col} {} ({})", condition.op.as_sql(), placeholders.join(", "))
        }
        Operator::Between => {
            let Value::Array(bounds) = value else {
                return Err(Error::Custom(format!(
                    "BETWEEN on `{}` needs a two-element range, got {value}",
                    condition.column
                )));
            };
            let [start, end] = bounds.as_slice() else {
                return Err(Error::Custom(format!(
                    "BETWEEN on `{}` needs a two-element range, got {value}",
                    condition.column
                )));
            };
            let start = params.bind(start.clone());
            let end = params.bind(end.clone());
            format!("{col} BETWEEN {start} AND {end}")
        }
    };
    Ok(sql)
}

/// Compile one filter. An OR-group becomes a parenthesized disjunction;
/// an empty group is always true and yields nothing.
pub fn compile_filter(
    filter: &Filter,
    plan: &JoinPlan<'_>,
    params: &mut ParamAllocator,
) -> Result<Option<String>> {
    match filter {
        Filter::Condition(condition) => compile_condition(condition, plan, params).map(Some),
        Filter::AnyOf(conditions) if conditions.is_empty() => Ok(None),
        Filter::AnyOf(conditions) => {
            let parts = conditions
                .iter()
                .map(|c| compile_condition(c, plan, params))
                .collect::<Result<Vec<_>>>()?;
            Ok(Some(format!("({})", parts.join(" OR "))))
        }
    }
}

/// Compile filters in order, joined with AND. `None` when nothing constrains
/// the query.
pub fn compile_filters(
    filters: &[Filter],
    plan: &JoinPlan<'_>,
    params: &mut ParamAllocator,
) -> Result<Option<String>> {
    let mut parts = Vec::with_capacity(filters.len());
    for filter in filters {
        if let Some(part) = compile_filter(filter, plan, params)? {
            parts.push(part);
        }
    }
    Ok((!parts.is_empty()).then(|| parts.join(" AND ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::JoinKind;
    use spannery_core::{FieldInfo, TableSchema};

    fn products() -> TableSchema {
        TableSchema::declare("Product", "Products")
            .field(FieldInfo::string("ProductID").primary_key())
            .field(FieldInfo::string("Name"))
            .field(FieldInfo::string("Category"))
            .field(FieldInfo::string("Description"))
            .field(FieldInfo::int64("Stock"))
            .field(FieldInfo::numeric("ListPrice"))
            .build()
            .unwrap()
    }

    fn compile_one(condition: Condition) -> (String, Params) {
        let schema = products();
        let plan = JoinPlan::new(&schema);
        let mut params = ParamAllocator::new("p").unwrap();
        let sql = compile_condition(&condition, &plan, &mut params).unwrap();
        (sql, params.into_params())
    }

    #[test]
    fn test_binary_operator_templates() {
        let cases = [
            (Condition::eq("Name", "x"), "t0.Name = @p0"),
            (Condition::ne("Name", "x"), "t0.Name != @p0"),
            (Condition::lt("Stock", 1_i64), "t0.Stock < @p0"),
            (Condition::le("Stock", 1_i64), "t0.Stock <= @p0"),
            (Condition::gt("Stock", 1_i64), "t0.Stock > @p0"),
            (Condition::ge("Stock", 1_i64), "t0.Stock >= @p0"),
            (Condition::like("Name", "Widget%"), "t0.Name LIKE @p0"),
            (Condition::ilike("Name", "%widget%"), "LOWER(t0.Name) LIKE LOWER(@p0)"),
            (Condition::regex("Name", "^W"), "REGEXP_CONTAINS(t0.Name, @p0)"),
        ];
        for (condition, expected) in cases {
            let (sql, params) = compile_one(condition);
            assert_eq!(sql, expected);
            assert_eq!(params.len(), 1);
        }
    }

    #[test]
    fn test_null_checks_bind_nothing() {
        let (sql, params) = compile_one(Condition::is_null("Description"));
        assert_eq!(sql, "t0.Description IS NULL");
        assert!(params.is_empty());

        let (sql, params) = compile_one(Condition::is_not_null("Description"));
        assert_eq!(sql, "t0.Description IS NOT NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn test_in_binds_each_element() {
        let (sql, params) = compile_one(Condition::is_in("Category", ["A", "B", "C"]));
        assert_eq!(sql, "t0.Category IN (@p0, @p1, @p2)");
        assert_eq!(params.get("p2"), Some(&Value::from("C")));

        let (sql, params) = compile_one(Condition::not_in("ProductID", ["id1", "id2"]));
        assert_eq!(sql, "t0.ProductID NOT IN (@p0, @p1)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_empty_lists_are_constant() {
        let (sql, params) = compile_one(Condition::is_in("Category", Vec::<String>::new()));
        assert_eq!(sql, "FALSE");
        assert!(params.is_empty());

        let (sql, params) = compile_one(Condition::not_in("Category", Vec::<String>::new()));
        assert_eq!(sql, "TRUE");
        assert!(params.is_empty());
    }

    #[test]
    fn test_between_binds_two() {
        let (sql, params) = compile_one(Condition::between("Stock", 10_i64, 100_i64));
        assert_eq!(sql, "t0.Stock BETWEEN @p0 AND @p1");
        assert_eq!(params.get("p0"), Some(&Value::Int64(10)));
        assert_eq!(params.get("p1"), Some(&Value::Int64(100)));

        let schema = products();
        let plan = JoinPlan::new(&schema);
        let mut alloc = ParamAllocator::new("p").unwrap();
        let bad = Condition::new("Stock", Operator::Between, 5_i64);
        assert!(compile_condition(&bad, &plan, &mut alloc).is_err());
    }

    #[test]
    fn test_filters_and_or_groups() {
        let schema = products();
        let plan = JoinPlan::new(&schema);
        let mut params = ParamAllocator::new("p").unwrap();
        let filters = vec![
            Filter::from(Condition::lt("Stock", 10_i64)),
            Filter::AnyOf(vec![
                Condition::le("ListPrice", 20_i64),
                Condition::is_in("Category", ["A", "B"]),
                Condition::is_null("Description"),
            ]),
            Filter::from(Condition::eq("Category", "Widgets")),
        ];
        let sql = compile_filters(&filters, &plan, &mut params).unwrap().unwrap();
        assert_eq!(
            sql,
            "t0.Stock < @p0 AND (t0.ListPrice <= @p1 OR t0.Category IN (@p2, @p3) \
             OR t0.Description IS NULL) AND t0.Category = @p4"
        );
        assert_eq!(params.params().len(), 5);
    }

    #[test]
    fn test_no_filters_no_expression() {
        let schema = products();
        let plan = JoinPlan::new(&schema);
        let mut params = ParamAllocator::new("p").unwrap();
        assert_eq!(compile_filters(&[], &plan, &mut params).unwrap(), None);
        assert_eq!(
            compile_filters(&[Filter::AnyOf(vec![])], &plan, &mut params).unwrap(),
            None
        );
    }

    #[test]
    fn test_qualified_columns() {
        let base = products();
        let categories = TableSchema::declare("Category", "Categories")
            .field(FieldInfo::string("Name").primary_key())
            .field(FieldInfo::bool("Visible"))
            .build()
            .unwrap();
        let mut plan = JoinPlan::new(&base);
        plan.add(JoinKind::Inner, &categories, "Category", "Name", None).unwrap();
        let mut params = ParamAllocator::new("p").unwrap();

        let c = Condition::qualified("Categories", "Visible", Operator::Eq, true);
        assert_eq!(compile_condition(&c, &plan, &mut params).unwrap(), "t1.Visible = @p0");

        let c = Condition::qualified("t1", "Visible", Operator::Eq, true);
        assert_eq!(compile_condition(&c, &plan, &mut params).unwrap(), "t1.Visible = @p1");

        let c = Condition::qualified("Products", "Stock", Operator::Gt, 0_i64);
        assert_eq!(compile_condition(&c, &plan, &mut params).unwrap(), "t0.Stock > @p2");

        let c = Condition::qualified("Suppliers", "Name", Operator::Eq, "x");
        assert!(matches!(
            compile_condition(&c, &plan, &mut params),
            Err(Error::UnknownTable(_))
        ));

        let c = Condition::qualified("Categories", "Colour", Operator::Eq, "x");
        assert!(matches!(
            compile_condition(&c, &plan, &mut params),
            Err(Error::UnknownField { .. })
        ));
    }

    #[test]
    fn test_unknown_base_field() {
        let schema = products();
        let plan = JoinPlan::new(&schema);
        let mut params = ParamAllocator::new("p").unwrap();
        let err = compile_condition(&Condition::eq("Colour", "red"), &plan, &mut params).unwrap_err();
        assert_eq!(err.to_string(), "model `Product` has no field `Colour`");
    }

    #[test]
    fn test_custom_prefix() {
        let mut params = ParamAllocator::new("param_").unwrap();
        assert_eq!(params.bind(Value::Int64(1)), "@param_0");
        assert!(ParamAllocator::new("1x").is_err());
    }
}
