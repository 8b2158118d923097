//! The `Model` trait implemented by application row types.

use crate::error::Result;
use crate::record::Record;
use crate::schema::SchemaDeclaration;

/// A typed row of one table.
///
/// Implementations describe their schema once in [`Model::declare`]; the
/// registry validates it at startup. Conversions to and from [`Record`] carry
/// the persisted fields by name.
///
/// ```ignore
/// impl Model for Organization {
///     const MODEL_NAME: &'static str = "Organization";
///
///     fn declare() -> SchemaDeclaration {
///         TableSchema::declare(Self::MODEL_NAME, "Organizations")
///             .field(FieldInfo::string("OrganizationID").primary_key().default_with(uuid4))
///             .field(FieldInfo::string("Name").not_null())
///     }
///
///     fn to_record(&self) -> Record {
///         Record::new()
///             .with("OrganizationID", &self.organization_id)
///             .with("Name", &self.name)
///     }
///
///     fn from_record(mut record: Record) -> Result<Self> {
///         Ok(Self {
///             organization_id: record.take("OrganizationID")?,
///             name: record.take("Name")?,
///         })
///     }
/// }
/// ```
pub trait Model: Sized + 'static {
    /// Name the model is registered and referenced under.
    const MODEL_NAME: &'static str;

    /// Schema declaration: table, fields, interleaving.
    fn declare() -> SchemaDeclaration;

    /// Persisted fields of this instance.
    fn to_record(&self) -> Record;

    /// Rebuild an instance from decoded field values.
    fn from_record(record: Record) -> Result<Self>;
}
