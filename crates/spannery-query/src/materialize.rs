//! Turning result sets back into models.

use spannery_core::{Error, Model, Record, ResultSet, Result, TableSchema};

use crate::config::QueryConfig;
use crate::join::BASE_ALIAS;

/// Field name of a reported column, or `None` for a column of a joined table.
fn base_column(column: &str) -> Option<&str> {
    match column.rsplit_once('.') {
        Some((BASE_ALIAS, name)) => Some(name),
        Some(_) => None,
        None => Some(column),
    }
}

/// Decode rows into records of `schema`.
///
/// With column names, values are matched by name: `t0.` qualifiers are
/// stripped, columns of joined tables and columns the schema does not know
/// are skipped, and the first of several same-named columns wins. Without
/// column names, rows are zipped against `projection` (or the schema's field
/// order) when the config allows it.
pub fn materialize_records(
    schema: &TableSchema,
    result: ResultSet,
    projection: Option<&[&'static str]>,
    config: &QueryConfig,
) -> Result<Vec<Record>> {
    if result.rows.is_empty() {
        return Ok(Vec::new());
    }
    let names: Vec<Option<&str>> = match &result.columns {
        Some(columns) => columns.iter().map(|c| base_column(c)).collect(),
        None => {
            if !config.allow_positional_rows {
                return Err(Error::Custom(format!(
                    "result set for {} has no column names",
                    schema.model_name()
                )));
            }
            tracing::warn!(
                model = schema.model_name(),
                "result set has no column names; matching values by position"
            );
            match projection {
                Some(fields) if !fields.is_empty() => fields.iter().map(|f| Some(*f)).collect(),
                _ => schema.fields().iter().map(|f| Some(f.name)).collect(),
            }
        }
    };

    let mut records = Vec::with_capacity(result.rows.len());
    for row in result.rows {
        let mut record = Record::new();
        for (name, value) in names.iter().zip(row) {
            let Some(name) = name else { continue };
            let Some(field) = schema.field(name) else { continue };
            if record.contains(field.name) {
                continue;
            }
            record.set(field.name, field.from_db_value(value)?);
        }
        records.push(record);
    }
    Ok(records)
}

/// Decode rows into model instances.
pub fn materialize<M: Model>(
    schema: &TableSchema,
    result: ResultSet,
    projection: Option<&[&'static str]>,
    config: &QueryConfig,
) -> Result<Vec<M>> {
    materialize_records(schema, result, projection, config)?
        .into_iter()
        .map(M::from_record)
        .collect()
}
