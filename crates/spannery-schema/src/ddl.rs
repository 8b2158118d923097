//! Spanner DDL generator.
//!
//! Spanner creates secondary indexes with separate statements and refuses to
//! drop a table that still has indexes, so both directions emit the index
//! statements alongside the table statement.

use spannery_core::{FieldInfo, TableSchema};

/// A schema change for one table.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaOperation<'s> {
    /// Create the table and its declared indexes.
    CreateTable(&'s TableSchema),
    /// Drop the table's declared indexes, then the table.
    DropTable(&'s TableSchema),
    /// Create one index.
    CreateIndex(IndexDef),
    /// Drop one index by name.
    DropIndex(String),
}

/// A single-column secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub name: String,
    pub table: String,
    pub column: String,
    pub unique: bool,
}

impl IndexDef {
    /// Index for a field hint: `idx_<table>_<field>`, or `uq_<table>_<field>`
    /// for a unique one.
    #[must_use]
    pub fn for_field(table: &str, field: &FieldInfo, unique: bool) -> Self {
        let prefix = if unique { "uq" } else { "idx" };
        Self {
            name: format!("{prefix}_{table}_{}", field.name),
            table: table.to_string(),
            column: field.name.to_string(),
            unique,
        }
    }

    #[must_use]
    pub fn to_sql(&self) -> String {
        let unique = if self.unique { "UNIQUE " } else { "" };
        format!(
            "CREATE {unique}INDEX {} ON {}({})",
            self.name, self.table, self.column
        )
    }
}

/// Indexes requested by the field hints of `schema`. A field marked both
/// `unique` and `index` gets only the unique index.
#[must_use]
pub fn indexes_for(schema: &TableSchema) -> Vec<IndexDef> {
    schema
        .fields()
        .iter()
        .filter(|f| !f.primary_key && (f.unique || f.index))
        .map(|f| IndexDef::for_field(schema.table_name(), f, f.unique))
        .collect()
}

fn column_ddl(field: &FieldInfo) -> String {
    let mut sql = format!("{} {}", field.name, field.spanner_type.ddl());
    if !field.nullable {
        sql.push_str(" NOT NULL");
    }
    sql
}

/// `CREATE TABLE` for `schema`, without its indexes.
///
/// ```text
/// CREATE TABLE Products (
///   ProductID STRING(36) NOT NULL,
///   Name STRING(MAX)
/// ) PRIMARY KEY (ProductID)
/// ```
#[must_use]
pub fn create_table_ddl(schema: &TableSchema) -> String {
    let columns = schema
        .fields()
        .iter()
        .map(|f| format!("  {}", column_ddl(f)))
        .collect::<Vec<_>>()
        .join(",\n");
    let mut sql = format!(
        "CREATE TABLE {} (\n{columns}\n) PRIMARY KEY ({})",
        schema.table_name(),
        schema.primary_key_names().join(", ")
    );
    if let Some(interleave) = schema.interleave() {
        sql.push_str(&format!(
            ",\n  INTERLEAVE IN PARENT {} ON DELETE {}",
            interleave.parent,
            interleave.on_delete.as_sql()
        ));
    }
    sql
}

/// `DROP TABLE <table>`.
#[must_use]
pub fn drop_table_ddl(schema: &TableSchema) -> String {
    format!("DROP TABLE {}", schema.table_name())
}

/// Turns schema operations into DDL statements.
pub trait DdlGenerator {
    /// Name of the SQL dialect.
    fn dialect(&self) -> &'static str;

    /// Statements for one operation, in execution order.
    fn generate(&self, op: &SchemaOperation<'_>) -> Vec<String>;

    /// Statements for several operations, in order.
    fn generate_all(&self, ops: &[SchemaOperation<'_>]) -> Vec<String> {
        ops.iter().flat_map(|op| self.generate(op)).collect()
    }
}

/// DDL generator for Spanner's GoogleSQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpannerDdlGenerator;

impl DdlGenerator for SpannerDdlGenerator {
    fn dialect(&self) -> &'static str {
        "spanner"
    }

    fn generate(&self, op: &SchemaOperation<'_>) -> Vec<String> {
        tracing::debug!(dialect = "spanner", op = ?op, "generating DDL");

        match op {
            SchemaOperation::CreateTable(schema) => {
                let mut stmts = vec![create_table_ddl(schema)];
                stmts.extend(indexes_for(schema).iter().map(IndexDef::to_sql));
                stmts
            }
            SchemaOperation::DropTable(schema) => {
                let mut stmts: Vec<String> = indexes_for(schema)
                    .into_iter()
                    .map(|idx| format!("DROP INDEX {}", idx.name))
                    .collect();
                stmts.push(drop_table_ddl(schema));
                stmts
            }
            SchemaOperation::CreateIndex(index) => vec![index.to_sql()],
            SchemaOperation::DropIndex(name) => vec![format!("DROP INDEX {name}")],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spannery_core::{ReferentialAction, SpannerType};

    fn products() -> TableSchema {
        TableSchema::declare("Product", "Products")
            .field(FieldInfo::string("ProductID").primary_key().not_null().max_length(36))
            .field(FieldInfo::string("Name").not_null().max_length(100).index())
            .field(FieldInfo::string("SKU").unique())
            .field(FieldInfo::numeric("ListPrice").precision(10, 2))
            .field(FieldInfo::array("Tags", SpannerType::string()))
            .field(FieldInfo::timestamp("CreatedAt").auto_now_add())
            .build()
            .unwrap()
    }

    fn line_items() -> TableSchema {
        TableSchema::declare("LineItem", "LineItems")
            .field(FieldInfo::string("ProductID").primary_key().not_null())
            .field(FieldInfo::int64("LineNo").primary_key().not_null())
            .field(FieldInfo::int64("Quantity"))
            .interleave_in("Products")
            .build()
            .unwrap()
    }

    #[test]
    fn test_create_table() {
        assert_eq!(
            create_table_ddl(&products()),
            "CREATE TABLE Products (\n  \
             ProductID STRING(36) NOT NULL,\n  \
             Name STRING(100) NOT NULL,\n  \
             SKU STRING(MAX),\n  \
             ListPrice NUMERIC(10, 2),\n  \
             Tags ARRAY<STRING(MAX)>,\n  \
             CreatedAt TIMESTAMP\n\
             ) PRIMARY KEY (ProductID)"
        );
    }

    #[test]
    fn test_interleaved_table() {
        assert_eq!(
            create_table_ddl(&line_items()),
            "CREATE TABLE LineItems (\n  \
             ProductID STRING(MAX) NOT NULL,\n  \
             LineNo INT64 NOT NULL,\n  \
             Quantity INT64\n\
             ) PRIMARY KEY (ProductID, LineNo),\n  \
             INTERLEAVE IN PARENT Products ON DELETE CASCADE"
        );

        let no_action = TableSchema::declare("LineItem", "LineItems")
            .field(FieldInfo::string("ProductID").primary_key())
            .interleave_in("Products")
            .on_delete(ReferentialAction::NoAction)
            .build()
            .unwrap();
        assert!(create_table_ddl(&no_action).ends_with("ON DELETE NO ACTION"));
    }

    #[test]
    fn test_create_emits_index_statements() {
        let schema = products();
        let stmts = SpannerDdlGenerator.generate(&SchemaOperation::CreateTable(&schema));
        assert_eq!(stmts.len(), 3);
        assert_eq!(stmts[1], "CREATE INDEX idx_Products_Name ON Products(Name)");
        assert_eq!(stmts[2], "CREATE UNIQUE INDEX uq_Products_SKU ON Products(SKU)");
    }

    #[test]
    fn test_drop_removes_indexes_first() {
        let schema = products();
        let stmts = SpannerDdlGenerator.generate(&SchemaOperation::DropTable(&schema));
        assert_eq!(
            stmts,
            vec![
                "DROP INDEX idx_Products_Name".to_string(),
                "DROP INDEX uq_Products_SKU".to_string(),
                "DROP TABLE Products".to_string(),
            ]
        );
    }

    #[test]
    fn test_unique_wins_over_plain_index() {
        let schema = TableSchema::declare("User", "Users")
            .field(FieldInfo::string("UserID").primary_key().index())
            .field(FieldInfo::string("Email").index().unique())
            .build()
            .unwrap();
        let indexes = indexes_for(&schema);
        assert_eq!(indexes.len(), 1);
        assert!(indexes[0].unique);
        assert_eq!(indexes[0].name, "uq_Users_Email");
    }

    #[test]
    fn test_standalone_index_ops() {
        let generator = SpannerDdlGenerator;
        assert_eq!(generator.dialect(), "spanner");
        let index = IndexDef {
            name: "idx_custom".to_string(),
            table: "Products".to_string(),
            column: "Name".to_string(),
            unique: false,
        };
        let stmts = generator.generate_all(&[
            SchemaOperation::CreateIndex(index),
            SchemaOperation::DropIndex("idx_custom".to_string()),
        ]);
        assert_eq!(
            stmts,
            vec![
                "CREATE INDEX idx_custom ON Products(Name)".to_string(),
                "DROP INDEX idx_custom".to_string(),
            ]
        );
    }
}
