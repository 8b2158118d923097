//! Catalog lookups through `INFORMATION_SCHEMA`.

use spannery_core::{ReadContext, Result, Statement, Value};

/// Whether `table` exists in the default schema.
pub fn table_exists<R: ReadContext + ?Sized>(read: &R, table: &str) -> Result<bool> {
    let statement = Statement::new(
        "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
         WHERE TABLE_SCHEMA = '' AND TABLE_NAME = @table",
    )
    .bind("table", table);
    let exists = !read.execute_sql(&statement)?.is_empty();
    tracing::debug!(table, exists, "checked table existence");
    Ok(exists)
}

/// Names of the user tables in the default schema, sorted.
pub fn list_tables<R: ReadContext + ?Sized>(read: &R) -> Result<Vec<String>> {
    let statement = Statement::new(
        "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
         WHERE TABLE_SCHEMA = '' ORDER BY TABLE_NAME",
    );
    let result = read.execute_sql(&statement)?;
    Ok(result
        .rows
        .into_iter()
        .filter_map(|row| match row.into_iter().next() {
            Some(Value::String(name)) => Some(name),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spannery_core::testing::MockDatabase;
    use spannery_core::{Database, ResultSet, TimestampBound};

    #[test]
    fn test_table_exists() {
        let db = MockDatabase::new();
        db.push_result(ResultSet::new(["TABLE_NAME"], vec![vec![Value::from("Products")]]));
        let snapshot = db.snapshot(TimestampBound::Strong).unwrap();
        assert!(table_exists(&snapshot, "Products").unwrap());
        assert!(!table_exists(&snapshot, "Missing").unwrap());

        let executed = db.executed();
        assert!(executed[0].sql.contains("INFORMATION_SCHEMA.TABLES"));
        assert!(executed[0].sql.ends_with("TABLE_NAME = @table"));
        assert_eq!(executed[1].params.get("table"), Some(&Value::from("Missing")));
    }

    #[test]
    fn test_list_tables() {
        let db = MockDatabase::new();
        db.push_result(ResultSet::positional(vec![
            vec![Value::from("Organizations")],
            vec![Value::from("Products")],
        ]));
        let snapshot = db.snapshot(TimestampBound::Strong).unwrap();
        assert_eq!(
            list_tables(&snapshot).unwrap(),
            vec!["Organizations".to_string(), "Products".to_string()]
        );
    }
}
