//! Builders for write operations.
//!
//! Model writes become [`Mutation`]s, buffered by the client until commit.
//! Set-based changes (`UPDATE ... WHERE`, `DELETE ... WHERE`) become DML
//! [`Statement`]s that reuse the predicate compiler.

use spannery_core::{
    Error, KeySet, Mutation, Record, Result, Statement, TableSchema, Value,
};

use crate::compile::{ParamAllocator, compile_filters};
use crate::filter::{Condition, Filter};
use crate::join::{BASE_ALIAS, JoinPlan};

fn encode_rows(schema: &TableSchema, records: &[Record], columns: &[&'static str]) -> Result<Vec<Vec<Value>>> {
    records
        .iter()
        .map(|record| {
            schema.key_of(record)?;
            let encoded = schema.encode_record(record)?;
            Ok(columns
                .iter()
                .map(|c| encoded.get(c).cloned().unwrap_or_default())
                .collect())
        })
        .collect()
}

/// Insert (or insert-or-update) builder for one or more records.
///
/// # Example
///
/// ```ignore
/// let mutation = InsertBuilder::new(schema, product.to_record()).build()?;
/// txn.apply(mutation)?;
/// ```
#[derive(Debug)]
pub struct InsertBuilder<'a> {
    schema: &'a TableSchema,
    records: Vec<Record>,
    or_update: bool,
}

impl<'a> InsertBuilder<'a> {
    /// Insert a single record.
    pub fn new(schema: &'a TableSchema, record: Record) -> Self {
        Self::many(schema, vec![record])
    }

    /// Insert several records in one mutation.
    pub fn many(schema: &'a TableSchema, records: Vec<Record>) -> Self {
        Self {
            schema,
            records,
            or_update: false,
        }
    }

    /// Overwrite rows that already exist instead of failing.
    pub fn or_update(mut self) -> Self {
        self.or_update = true;
        self
    }

    /// Build the mutation. Every schema column is written; missing fields
    /// are written as NULL.
    pub fn build(&self) -> Result<Mutation> {
        let columns: Vec<&'static str> = self.schema.fields().iter().map(|f| f.name).collect();
        let values = encode_rows(self.schema, &self.records, &columns)?;
        let table = self.schema.table_name().to_string();
        let columns = columns.into_iter().map(str::to_string).collect();
        Ok(if self.or_update {
            Mutation::InsertOrUpdate {
                table,
                columns,
                values,
            }
        } else {
            Mutation::Insert {
                table,
                columns,
                values,
            }
        })
    }
}

/// Update builder.
///
/// From a record it builds an `Update` mutation addressed by primary key.
/// With explicit `set` calls and filters it builds a DML statement instead.
///
/// # Example
///
/// ```ignore
/// // Update a model instance by key
/// let mutation = UpdateBuilder::new(schema, product.to_record()).build()?;
///
/// // Set-based update
/// let stmt = UpdateBuilder::empty(schema)
///     .set("Active", false)
///     .filter(Condition::lt("Stock", 1))
///     .build_dml("p")?;
/// ```
#[derive(Debug)]
pub struct UpdateBuilder<'a> {
    schema: &'a TableSchema,
    record: Option<Record>,
    set_fields: Option<Vec<&'static str>>,
    explicit_sets: Vec<(String, Value)>,
    filters: Vec<Filter>,
}

impl<'a> UpdateBuilder<'a> {
    /// Update the row identified by the record's primary key.
    pub fn new(schema: &'a TableSchema, record: Record) -> Self {
        Self {
            schema,
            record: Some(record),
            set_fields: None,
            explicit_sets: Vec::new(),
            filters: Vec::new(),
        }
    }

    /// Builder for a set-based update.
    pub fn empty(schema: &'a TableSchema) -> Self {
        Self {
            schema,
            record: None,
            set_fields: None,
            explicit_sets: Vec::new(),
            filters: Vec::new(),
        }
    }

    /// Set a column to a specific value. Overrides the record's value.
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.explicit_sets.push((column.to_string(), value.into()));
        self
    }

    /// Only write these fields of the record (the key is always written).
    pub fn set_only(mut self, fields: &[&'static str]) -> Self {
        self.set_fields = Some(fields.to_vec());
        self
    }

    /// Add a WHERE condition for [`UpdateBuilder::build_dml`].
    pub fn filter(mut self, condition: impl Into<Filter>) -> Self {
        self.filters.push(condition.into());
        self
    }

    /// Build an `Update` mutation from the record.
    pub fn build(&self) -> Result<Mutation> {
        let Some(record) = &self.record else {
            return Err(Error::Custom(format!(
                "update of {} needs a record; use build_dml for set-based updates",
                self.schema.model_name()
            )));
        };
        let mut record = record.clone();
        for (column, value) in &self.explicit_sets {
            self.schema.require_field(column)?;
            record.set(column.clone(), value.clone());
        }
        if let Some(fields) = &self.set_fields {
            for field in fields {
                self.schema.require_field(field)?;
            }
        }
        let columns: Vec<&'static str> = self
            .schema
            .fields()
            .iter()
            .filter(|f| {
                f.primary_key
                    || f.auto_now
                    || self.explicit_sets.iter().any(|(c, _)| c == f.name)
                    || self
                        .set_fields
                        .as_ref()
                        .is_none_or(|only| only.contains(&f.name))
            })
            .map(|f| f.name)
            .collect();
        let values = encode_rows(self.schema, std::slice::from_ref(&record), &columns)?;
        Ok(Mutation::Update {
            table: self.schema.table_name().to_string(),
            columns: columns.into_iter().map(str::to_string).collect(),
            values,
        })
    }

    /// Build `UPDATE <table> AS t0 SET ... WHERE ...`. Without filters the
    /// statement updates every row (`WHERE TRUE`).
    pub fn build_dml(&self, param_prefix: &str) -> Result<Statement> {
        if self.explicit_sets.is_empty() {
            return Err(Error::Custom(format!(
                "update of {} sets no columns",
                self.schema.model_name()
            )));
        }
        let mut params = ParamAllocator::new(param_prefix)?;
        let mut sets = Vec::with_capacity(self.explicit_sets.len());
        for (column, value) in &self.explicit_sets {
            let field = self.schema.require_field(column)?;
            if field.primary_key {
                return Err(Error::Custom(format!(
                    "primary key `{}` of {} cannot be updated",
                    field.name,
                    self.schema.model_name()
                )));
            }
            let placeholder = params.bind(field.to_db_value(value.clone())?);
            sets.push(format!("{} = {placeholder}", field.name));
        }
        let plan = JoinPlan::new(self.schema);
        let predicate = compile_filters(&self.filters, &plan, &mut params)?;
        let sql = format!(
            "UPDATE {} AS {BASE_ALIAS} SET {} WHERE {}",
            self.schema.table_name(),
            sets.join(", "),
            predicate.as_deref().unwrap_or("TRUE")
        );
        let statement = Statement::with_params(sql, params.into_params());
        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "built UPDATE statement");
        Ok(statement)
    }
}

/// Delete builder.
///
/// # Example
///
/// ```ignore
/// // Delete a specific model instance
/// let mutation = DeleteBuilder::from_record(schema, &product.to_record()).build()?;
///
/// // Delete by filter
/// let stmt = DeleteBuilder::new(schema)
///     .filter(Condition::eq("Active", false))
///     .build_dml("p")?;
/// ```
#[derive(Debug)]
pub struct DeleteBuilder<'a> {
    schema: &'a TableSchema,
    keys: Vec<Record>,
    filters: Vec<Filter>,
}

impl<'a> DeleteBuilder<'a> {
    /// Builder with no rows selected yet.
    pub fn new(schema: &'a TableSchema) -> Self {
        Self {
            schema,
            keys: Vec::new(),
            filters: Vec::new(),
        }
    }

    /// Delete the row with the record's primary key.
    pub fn from_record(schema: &'a TableSchema, record: &Record) -> Self {
        let key = schema
            .primary_keys()
            .filter_map(|f| record.get(f.name).map(|v| (f.name, v.clone())))
            .collect();
        Self {
            schema,
            keys: vec![key],
            filters: Vec::new(),
        }
    }

    /// Add another key to delete.
    pub fn key(mut self, key: Record) -> Self {
        self.keys.push(key);
        self
    }

    /// Add a WHERE condition for [`DeleteBuilder::build_dml`].
    pub fn filter(mut self, condition: impl Into<Filter>) -> Self {
        self.filters.push(condition.into());
        self
    }

    /// Build a `Delete` mutation for the collected keys.
    pub fn build(&self) -> Result<Mutation> {
        if self.keys.is_empty() {
            return Err(Error::Custom(format!(
                "delete from {} names no keys",
                self.schema.model_name()
            )));
        }
        let keys = self
            .keys
            .iter()
            .map(|key| self.schema.validate_key(key))
            .collect::<Result<Vec<_>>>()?;
        Ok(Mutation::Delete {
            table: self.schema.table_name().to_string(),
            keys: KeySet { keys, all: false },
        })
    }

    /// Build `DELETE FROM <table> AS t0 WHERE ...`. Without filters every
    /// row is deleted (`WHERE TRUE`).
    pub fn build_dml(&self, param_prefix: &str) -> Result<Statement> {
        let mut params = ParamAllocator::new(param_prefix)?;
        let plan = JoinPlan::new(self.schema);
        let predicate = compile_filters(&self.filters, &plan, &mut params)?;
        let sql = format!(
            "DELETE FROM {} AS {BASE_ALIAS} WHERE {}",
            self.schema.table_name(),
            predicate.as_deref().unwrap_or("TRUE")
        );
        Ok(Statement::with_params(sql, params.into_params()))
    }
}

/// Equality filters for every primary-key field of `key`.
pub fn key_filters(schema: &TableSchema, key: &Record) -> Result<Vec<Filter>> {
    let values = schema.validate_key(key)?;
    Ok(schema
        .primary_keys()
        .zip(values)
        .map(|(field, value)| Condition::eq(field.name, value).into())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spannery_core::FieldInfo;

    fn heroes() -> TableSchema {
        TableSchema::declare("Hero", "Heroes")
            .field(FieldInfo::string("HeroID").primary_key())
            .field(FieldInfo::string("Name").not_null())
            .field(FieldInfo::int64("Age"))
            .field(FieldInfo::timestamp("UpdatedAt").auto_now())
            .build()
            .unwrap()
    }

    fn hero() -> Record {
        Record::new()
            .with("HeroID", "h1")
            .with("Name", "Spider-Man")
            .with("Age", "25")
    }

    #[test]
    fn test_insert_basic() {
        let schema = heroes();
        let Mutation::Insert { table, columns, values } = InsertBuilder::new(&schema, hero()).build().unwrap() else {
            panic!("expected insert");
        };
        assert_eq!(table, "Heroes");
        assert_eq!(columns, vec!["HeroID", "Name", "Age", "UpdatedAt"]);
        assert_eq!(values[0][2], Value::Int64(25));
        assert!(matches!(values[0][3], Value::Timestamp(_)));
    }

    #[test]
    fn test_insert_or_update_many() {
        let schema = heroes();
        let other = Record::new().with("HeroID", "h2").with("Name", "Iron Man");
        let mutation = InsertBuilder::many(&schema, vec![hero(), other])
            .or_update()
            .build()
            .unwrap();
        let Mutation::InsertOrUpdate { values, .. } = mutation else {
            panic!("expected insert_or_update");
        };
        assert_eq!(values.len(), 2);
        assert_eq!(values[1][2], Value::Null);
    }

    #[test]
    fn test_insert_requires_key() {
        let schema = heroes();
        let err = InsertBuilder::new(&schema, Record::new().with("Name", "x"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidKey { .. }));
    }

    #[test]
    fn test_update_set_only() {
        let schema = heroes();
        let mutation = UpdateBuilder::new(&schema, hero())
            .set_only(&["Age"])
            .build()
            .unwrap();
        let Mutation::Update { columns, values, .. } = mutation else {
            panic!("expected update");
        };
        assert_eq!(columns, vec!["HeroID", "Age", "UpdatedAt"]);
        assert_eq!(values[0][0], Value::from("h1"));
    }

    #[test]
    fn test_update_explicit_set_overrides_record() {
        let schema = heroes();
        let Mutation::Update { values, .. } = UpdateBuilder::new(&schema, hero())
            .set("Age", 30_i64)
            .build()
            .unwrap()
        else {
            panic!("expected update");
        };
        assert_eq!(values[0][2], Value::Int64(30));
    }

    #[test]
    fn test_update_dml() {
        let schema = heroes();
        let stmt = UpdateBuilder::empty(&schema)
            .set("Age", 30_i64)
            .filter(Condition::eq("HeroID", "h1"))
            .build_dml("p")
            .unwrap();
        assert_eq!(stmt.sql, "UPDATE Heroes AS t0 SET Age = @p0 WHERE t0.HeroID = @p1");
        assert_eq!(stmt.params.len(), 2);

        let all = UpdateBuilder::empty(&schema).set("Age", 1_i64).build_dml("p").unwrap();
        assert!(all.sql.ends_with("WHERE TRUE"));

        assert!(UpdateBuilder::empty(&schema).build_dml("p").is_err());
        assert!(UpdateBuilder::empty(&schema).set("HeroID", "x").build_dml("p").is_err());
        assert!(UpdateBuilder::empty(&schema).set("Age", 1_i64).build().is_err());
    }

    #[test]
    fn test_delete_from_record() {
        let schema = heroes();
        let mutation = DeleteBuilder::from_record(&schema, &hero()).build().unwrap();
        assert_eq!(
            mutation,
            Mutation::Delete {
                table: "Heroes".to_string(),
                keys: KeySet::single(vec![Value::from("h1")]),
            }
        );
        assert!(DeleteBuilder::new(&schema).build().is_err());
    }

    #[test]
    fn test_delete_dml() {
        let schema = heroes();
        let stmt = DeleteBuilder::new(&schema)
            .filter(Condition::lt("Age", 18_i64))
            .build_dml("p")
            .unwrap();
        assert_eq!(stmt.sql, "DELETE FROM Heroes AS t0 WHERE t0.Age < @p0");
    }

    #[test]
    fn test_key_filters() {
        let schema = heroes();
        let filters = key_filters(&schema, &Record::new().with("HeroID", "h1")).unwrap();
        assert_eq!(filters, vec![Filter::from(Condition::eq("HeroID", "h1"))]);
        assert!(key_filters(&schema, &Record::new()).is_err());
    }
}
