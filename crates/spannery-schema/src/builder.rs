//! Create/drop scripts for several tables.

use spannery_core::{ModelRegistry, TableSchema};

use crate::ddl::{DdlGenerator, SchemaOperation, SpannerDdlGenerator};

/// Collects tables and emits DDL in dependency order.
///
/// Interleaved tables are created after their parent and dropped before it.
/// Tables without an ordering constraint keep the order they were added in.
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder<'s> {
    tables: Vec<&'s TableSchema>,
}

impl<'s> SchemaBuilder<'s> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every schema in the registry.
    #[must_use]
    pub fn from_registry(registry: &'s ModelRegistry) -> Self {
        Self {
            tables: registry.schemas().collect(),
        }
    }

    /// Add one table. Adding the same table twice has no effect.
    #[must_use]
    pub fn table(mut self, schema: &'s TableSchema) -> Self {
        if !self
            .tables
            .iter()
            .any(|t| t.table_name() == schema.table_name())
        {
            self.tables.push(schema);
        }
        self
    }

    /// Tables with every parent ahead of its children. A parent outside the
    /// builder puts no constraint on the child.
    #[must_use]
    pub fn ordered(&self) -> Vec<&'s TableSchema> {
        let mut ordered: Vec<&'s TableSchema> = Vec::with_capacity(self.tables.len());
        let mut pending: Vec<&'s TableSchema> = self.tables.clone();
        while !pending.is_empty() {
            let before = pending.len();
            pending.retain(|schema| {
                let ready = match schema.interleave() {
                    Some(interleave) => {
                        !self.contains(interleave.parent)
                            || ordered.iter().any(|t| t.table_name() == interleave.parent)
                    }
                    None => true,
                };
                if ready {
                    ordered.push(*schema);
                }
                !ready
            });
            if pending.len() == before {
                // A parent cycle cannot be ordered; keep declaration order for the rest.
                tracing::warn!(
                    tables = ?pending.iter().map(|t| t.table_name()).collect::<Vec<_>>(),
                    "interleave cycle; emitting remaining tables unordered"
                );
                ordered.append(&mut pending);
            }
        }
        ordered
    }

    fn contains(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t.table_name() == table)
    }

    /// Statements creating every table and index, parents first.
    #[must_use]
    pub fn create_statements(&self) -> Vec<String> {
        let ops: Vec<SchemaOperation<'s>> = self
            .ordered()
            .into_iter()
            .map(SchemaOperation::CreateTable)
            .collect();
        SpannerDdlGenerator.generate_all(&ops)
    }

    /// Statements dropping every table and index, children first.
    #[must_use]
    pub fn drop_statements(&self) -> Vec<String> {
        let ops: Vec<SchemaOperation<'s>> = self
            .ordered()
            .into_iter()
            .rev()
            .map(SchemaOperation::DropTable)
            .collect();
        SpannerDdlGenerator.generate_all(&ops)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
