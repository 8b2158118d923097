//! Table schemas: the validated shape of one model's table.

use crate::error::{Error, Result};
use crate::field::{FieldInfo, ReferentialAction, now};
use crate::identifiers::validate_identifier;
use crate::record::Record;
use crate::relationship::RelationshipInfo;
use crate::value::Value;

/// Parent-table declaration for an interleaved table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interleave {
    /// Table name of the parent.
    pub parent: &'static str,
    /// Delete policy for child rows.
    pub on_delete: ReferentialAction,
}

/// An unvalidated schema, as returned by `Model::declare`.
#[derive(Debug, Clone)]
pub struct SchemaDeclaration {
    model_name: &'static str,
    table_name: &'static str,
    fields: Vec<FieldInfo>,
    interleave: Option<Interleave>,
}

impl SchemaDeclaration {
    /// Add a field. Declaration order is column order.
    #[must_use]
    pub fn field(mut self, field: FieldInfo) -> Self {
        self.fields.push(field);
        self
    }

    /// Add several fields.
    #[must_use]
    pub fn fields(mut self, fields: impl IntoIterator<Item = FieldInfo>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Interleave this table in `parent` (a table name), cascading deletes.
    #[must_use]
    pub fn interleave_in(mut self, parent: &'static str) -> Self {
        self.interleave = Some(Interleave {
            parent,
            on_delete: ReferentialAction::Cascade,
        });
        self
    }

    /// Delete policy for an interleaved table. No effect without `interleave_in`.
    #[must_use]
    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        if let Some(interleave) = &mut self.interleave {
            interleave.on_delete = action;
        }
        self
    }

    #[must_use]
    pub fn model_name(&self) -> &'static str {
        self.model_name
    }

    /// Validate and freeze the declaration.
    pub fn build(self) -> Result<TableSchema> {
        let model = self.model_name;
        validate_identifier("model", model)?;
        validate_identifier("table", self.table_name)?;
        if self.fields.is_empty() {
            return Err(Error::ModelDefinition(format!("Model {model} has no fields")));
        }
        for (i, field) in self.fields.iter().enumerate() {
            validate_identifier("field", field.name)?;
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(Error::ModelDefinition(format!(
                    "Model {model} declares field {} twice",
                    field.name
                )));
            }
        }
        if !self.fields.iter().any(|f| f.primary_key) {
            return Err(Error::ModelDefinition(format!(
                "Model {model} has no primary key fields"
            )));
        }
        if let Some(interleave) = &self.interleave {
            validate_identifier("parent table", interleave.parent)?;
            if interleave.parent == self.table_name {
                return Err(Error::ModelDefinition(format!(
                    "Model {model} cannot be interleaved in its own table"
                )));
            }
        }
        Ok(TableSchema {
            model_name: self.model_name,
            table_name: self.table_name,
            fields: self.fields,
            interleave: self.interleave,
        })
    }
}

/// Validated schema of one table.
///
/// Invariants: at least one field, at least one primary-key field, unique
/// field names, every name a plain identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    model_name: &'static str,
    table_name: &'static str,
    fields: Vec<FieldInfo>,
    interleave: Option<Interleave>,
}

impl TableSchema {
    /// Start declaring the schema of `model_name`, stored in `table_name`.
    #[must_use]
    pub fn declare(model_name: &'static str, table_name: &'static str) -> SchemaDeclaration {
        SchemaDeclaration {
            model_name,
            table_name,
            fields: Vec::new(),
            interleave: None,
        }
    }

    #[must_use]
    pub fn model_name(&self) -> &'static str {
        self.model_name
    }

    #[must_use]
    pub fn table_name(&self) -> &'static str {
        self.table_name
    }

    /// Fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Like [`TableSchema::field`], failing with [`Error::UnknownField`].
    pub fn require_field(&self, name: &str) -> Result<&FieldInfo> {
        self.field(name).ok_or_else(|| Error::UnknownField {
            model: self.model_name.to_string(),
            field: name.to_string(),
        })
    }

    /// Primary-key fields in declaration order.
    pub fn primary_keys(&self) -> impl Iterator<Item = &FieldInfo> {
        self.fields.iter().filter(|f| f.primary_key)
    }

    #[must_use]
    pub fn primary_key_names(&self) -> Vec<&'static str> {
        self.primary_keys().map(|f| f.name).collect()
    }

    #[must_use]
    pub fn interleave(&self) -> Option<&Interleave> {
        self.interleave.as_ref()
    }

    /// Many-to-one relationships declared by foreign-key fields.
    #[must_use]
    pub fn relationships(&self) -> Vec<RelationshipInfo> {
        self.fields
            .iter()
            .filter_map(RelationshipInfo::from_field)
            .collect()
    }

    /// Fill fields that are absent or NULL from their defaults.
    pub fn apply_defaults(&self, record: &mut Record) {
        for field in &self.fields {
            if let Some(default) = &field.default {
                if record.is_null(field.name) {
                    record.set(field.name, default.produce());
                }
            }
        }
    }

    /// Stamp auto timestamps ahead of a write. `auto_now_add` fields are only
    /// filled on insert, and only when unset.
    pub fn touch_timestamps(&self, record: &mut Record, inserting: bool) {
        for field in &self.fields {
            if field.auto_now || (inserting && field.auto_now_add && record.is_null(field.name)) {
                record.set(field.name, now());
            }
        }
    }

    /// Check that a record names only schema fields.
    pub fn check_fields(&self, record: &Record) -> Result<()> {
        match record.names().find(|n| self.field(n).is_none()) {
            Some(name) => Err(Error::UnknownField {
                model: self.model_name.to_string(),
                field: name.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Encode every schema field of `record` for storage, in declaration
    /// order. Missing fields encode as NULL.
    pub fn encode_record(&self, record: &Record) -> Result<Record> {
        self.check_fields(record)?;
        let mut out = Record::new();
        for field in &self.fields {
            let value = record.get(field.name).cloned().unwrap_or_default();
            out.set(field.name, field.to_db_value(value)?);
        }
        Ok(out)
    }

    /// Decode a row read back from the database. Unknown columns are dropped.
    pub fn decode_record(&self, record: Record) -> Result<Record> {
        let mut out = Record::new();
        for (name, value) in record {
            if let Some(field) = self.field(&name) {
                out.set(name, field.from_db_value(value)?);
            }
        }
        Ok(out)
    }

    /// Primary-key values of `record`, encoded, in key order.
    pub fn key_of(&self, record: &Record) -> Result<Vec<Value>> {
        self.primary_keys()
            .map(|field| match record.get(field.name) {
                Some(value) if !value.is_null() => field.to_db_value(value.clone()),
                _ => Err(Error::InvalidKey {
                    model: self.model_name.to_string(),
                    reason: format!("missing value for primary key `{}`", field.name),
                }),
            })
            .collect()
    }

    /// Validate a lookup key: exactly the primary-key fields, none NULL.
    pub fn validate_key(&self, key: &Record) -> Result<Vec<Value>> {
        if let Some(extra) = key
            .names()
            .find(|n| !self.primary_keys().any(|f| f.name == *n))
        {
            return Err(Error::InvalidKey {
                model: self.model_name.to_string(),
                reason: format!("`{extra}` is not a primary key field"),
            });
        }
        self.key_of(key)
    }
}
