//! The model registry: every validated schema, built once at startup.

use std::any::TypeId;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::model::Model;
use crate::record::Record;
use crate::relationship::RelationshipInfo;
use crate::schema::TableSchema;

/// Collects schemas before the registry is frozen.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    schemas: Vec<TableSchema>,
    types: HashMap<TypeId, usize>,
}

impl RegistryBuilder {
    /// Validate and add the schema of `M`.
    pub fn register<M: Model>(self) -> Result<Self> {
        let schema = M::declare().build()?;
        if schema.model_name() != M::MODEL_NAME {
            return Err(Error::ModelDefinition(format!(
                "Model {} declares its schema under the name {}",
                M::MODEL_NAME,
                schema.model_name()
            )));
        }
        let mut this = self.register_schema(schema)?;
        let index = this.schemas.len() - 1;
        this.types.insert(TypeId::of::<M>(), index);
        Ok(this)
    }

    /// Add a schema that has no Rust type behind it.
    pub fn register_schema(mut self, schema: TableSchema) -> Result<Self> {
        if let Some(existing) = self.schemas.iter().find(|s| {
            s.model_name() == schema.model_name() || s.table_name() == schema.table_name()
        }) {
            return Err(Error::ModelDefinition(format!(
                "Model {} (table {}) conflicts with registered model {} (table {})",
                schema.model_name(),
                schema.table_name(),
                existing.model_name(),
                existing.table_name()
            )));
        }
        tracing::debug!(
            model = schema.model_name(),
            table = schema.table_name(),
            "registered model"
        );
        self.schemas.push(schema);
        Ok(self)
    }

    /// Freeze the registry. Interleave parents and foreign-key targets must
    /// all be registered by now.
    pub fn build(self) -> Result<ModelRegistry> {
        for schema in &self.schemas {
            if let Some(interleave) = schema.interleave() {
                if !self.schemas.iter().any(|s| s.table_name() == interleave.parent) {
                    return Err(Error::ModelDefinition(format!(
                        "Model {} is interleaved in unknown table {}",
                        schema.model_name(),
                        interleave.parent
                    )));
                }
            }
            for rel in schema.relationships() {
                if !self.schemas.iter().any(|s| s.model_name() == rel.related_model) {
                    return Err(Error::ModelDefinition(format!(
                        "Model {} field {} references unknown model {}",
                        schema.model_name(),
                        rel.name,
                        rel.related_model
                    )));
                }
            }
        }
        let by_model = self
            .schemas
            .iter()
            .enumerate()
            .map(|(i, s)| (s.model_name(), i))
            .collect();
        let by_table = self
            .schemas
            .iter()
            .enumerate()
            .map(|(i, s)| (s.table_name(), i))
            .collect();
        Ok(ModelRegistry {
            schemas: self.schemas,
            by_type: self.types,
            by_model,
            by_table,
        })
    }
}

/// Read-only set of validated schemas, looked up by type, model name or table name.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    schemas: Vec<TableSchema>,
    by_type: HashMap<TypeId, usize>,
    by_model: HashMap<&'static str, usize>,
    by_table: HashMap<&'static str, usize>,
}

impl ModelRegistry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Schema of a registered model type.
    pub fn schema_of<M: Model>(&self) -> Result<&TableSchema> {
        self.by_type
            .get(&TypeId::of::<M>())
            .map(|&i| &self.schemas[i])
            .ok_or_else(|| Error::UnknownModel(M::MODEL_NAME.to_string()))
    }

    /// Schema by model name.
    pub fn by_name(&self, model_name: &str) -> Result<&TableSchema> {
        self.by_model
            .get(model_name)
            .map(|&i| &self.schemas[i])
            .ok_or_else(|| Error::UnknownModel(model_name.to_string()))
    }

    #[must_use]
    pub fn by_table(&self, table_name: &str) -> Option<&TableSchema> {
        self.by_table.get(table_name).map(|&i| &self.schemas[i])
    }

    /// Schema by model name, falling back to table name.
    pub fn resolve(&self, name: &str) -> Result<&TableSchema> {
        self.by_name(name)
            .or_else(|_| self.by_table(name).ok_or_else(|| Error::UnknownModel(name.to_string())))
    }

    #[must_use]
    pub fn contains(&self, model_name: &str) -> bool {
        self.by_model.contains_key(model_name)
    }

    /// Schemas in registration order.
    pub fn schemas(&self) -> impl Iterator<Item = &TableSchema> {
        self.schemas.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Build an `M` from `record` after filling schema defaults.
    pub fn create<M: Model>(&self, mut record: Record) -> Result<M> {
        let schema = self.schema_of::<M>()?;
        schema.check_fields(&record)?;
        schema.apply_defaults(&mut record);
        M::from_record(record)
    }

    /// One-to-many relationships pointing at `model_name` from other models.
    #[must_use]
    pub fn reverse_relationships(&self, model_name: &str) -> Vec<RelationshipInfo> {
        self.schemas
            .iter()
            .flat_map(|s| {
                s.relationships()
                    .into_iter()
                    .filter(|r| r.related_model == model_name)
                    .filter_map(|r| r.reverse(s.model_name()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldInfo;
    use crate::schema::SchemaDeclaration;
    use crate::value::Value;

    #[derive(Debug, PartialEq)]
    struct Organization {
        id: String,
        active: bool,
    }

    impl Model for Organization {
        const MODEL_NAME: &'static str = "Organization";

        fn declare() -> SchemaDeclaration {
            TableSchema::declare(Self::MODEL_NAME, "Organizations")
                .field(FieldInfo::string("OrganizationID").primary_key())
                .field(FieldInfo::bool("Active").default(true))
        }

        fn to_record(&self) -> Record {
            Record::new()
                .with("OrganizationID", &self.id)
                .with("Active", self.active)
        }

        fn from_record(mut record: Record) -> Result<Self> {
            Ok(Self {
                id: record.take("OrganizationID")?,
                active: record.take("Active")?,
            })
        }
    }

    struct Membership;

    impl Model for Membership {
        const MODEL_NAME: &'static str = "Membership";

        fn declare() -> SchemaDeclaration {
            TableSchema::declare(Self::MODEL_NAME, "Memberships")
                .field(
                    FieldInfo::foreign_key("OrganizationID", "Organization")
                        .primary_key()
                        .related_name("members"),
                )
                .field(FieldInfo::string("MemberID").primary_key())
                .interleave_in("Organizations")
        }

        fn to_record(&self) -> Record {
            Record::new()
        }

        fn from_record(_record: Record) -> Result<Self> {
            Ok(Self)
        }
    }

    fn registry() -> ModelRegistry {
        ModelRegistry::builder()
            .register::<Organization>()
            .unwrap()
            .register::<Membership>()
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_lookup_paths() {
        let registry = registry();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.schema_of::<Organization>().unwrap().table_name(), "Organizations");
        assert_eq!(registry.by_name("Membership").unwrap().table_name(), "Memberships");
        assert_eq!(registry.by_table("Memberships").unwrap().model_name(), "Membership");
        assert_eq!(registry.resolve("Organizations").unwrap().model_name(), "Organization");
        assert!(matches!(registry.by_name("Nope"), Err(Error::UnknownModel(_))));
        assert!(registry.contains("Organization"));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let err = ModelRegistry::builder()
            .register::<Organization>()
            .unwrap()
            .register::<Organization>()
            .unwrap_err();
        assert!(matches!(err, Error::ModelDefinition(_)));
    }

    #[test]
    fn test_unregistered_type() {
        let registry = ModelRegistry::builder().build().unwrap();
        assert!(registry.is_empty());
        let err = registry.schema_of::<Organization>().unwrap_err();
        assert_eq!(err.to_string(), "model `Organization` is not registered");
    }

    #[test]
    fn test_build_checks_references() {
        let err = ModelRegistry::builder()
            .register::<Membership>()
            .unwrap()
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("interleaved in unknown table Organizations"));
    }

    #[test]
    fn test_create_applies_defaults() {
        let registry = registry();
        let org: Organization = registry
            .create(Record::new().with("OrganizationID", "org-1"))
            .unwrap();
        assert_eq!(
            org,
            Organization {
                id: "org-1".to_string(),
                active: true
            }
        );

        let org: Organization = registry
            .create(Record::new().with("OrganizationID", "org-2").with("Active", false))
            .unwrap();
        assert!(!org.active);

        let err = registry
            .create::<Organization>(Record::new().with("Colour", Value::Null))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownField { .. }));
    }

    #[test]
    fn test_reverse_relationships() {
        let registry = registry();
        let reverse = registry.reverse_relationships("Organization");
        assert_eq!(reverse.len(), 1);
        assert_eq!(reverse[0].name, "members");
        assert_eq!(reverse[0].related_model, "Membership");
    }
}
