//! Spannery: typed models, queries and sessions for Cloud Spanner style
//! databases.
//!
//! Application code declares each table once through [`Model::declare`],
//! registers it in a [`ModelRegistry`], and then reads and writes through a
//! [`Session`]. Queries compile to `@name`-parameterized GoogleSQL; writes
//! become buffered [`Mutation`]s applied on commit. Execution, transactions
//! and storage belong to the external client behind the [`Database`] trait.
//!
//! # Quick Start
//!
//! ```ignore
//! use spannery::prelude::*;
//!
//! struct Product {
//!     id: Option<String>,
//!     name: String,
//!     stock: i64,
//! }
//!
//! impl Model for Product {
//!     const MODEL_NAME: &'static str = "Product";
//!
//!     fn declare() -> SchemaDeclaration {
//!         TableSchema::declare(Self::MODEL_NAME, "Products")
//!             .field(FieldInfo::string("ProductID").primary_key().default_with(uuid4))
//!             .field(FieldInfo::string("Name").not_null())
//!             .field(FieldInfo::int64("Stock").default(0_i64))
//!     }
//!
//!     fn to_record(&self) -> Record {
//!         Record::new()
//!             .with("ProductID", self.id.clone())
//!             .with("Name", &self.name)
//!             .with("Stock", self.stock)
//!     }
//!
//!     fn from_record(mut record: Record) -> Result<Self> {
//!         Ok(Self {
//!             id: record.take("ProductID")?,
//!             name: record.take("Name")?,
//!             stock: record.take("Stock")?,
//!         })
//!     }
//! }
//!
//! let registry = ModelRegistry::builder().register::<Product>()?.build()?;
//! let session = Session::new(client, Arc::new(registry));
//!
//! let low_stock = session
//!     .query::<Product>()?
//!     .filter_lt("Stock", 10)
//!     .order_by("Name", Order::Asc)
//!     .all()?;
//! ```
//!
//! # Crates
//!
//! - `spannery-core`: values, schemas, the `Model` trait, the registry and the
//!   client traits.
//! - `spannery-query`: predicate compiler, join aliases, statement assembly and
//!   result materialization.
//! - `spannery-schema`: DDL generation.
//! - `spannery-session`: the `Session` facade.

pub mod session;

pub use spannery_core::{
    ClientError, Database, DefaultValue, Error, FieldInfo, ForeignKeyInfo, FromValue, Interleave,
    KeySet, Model, ModelRegistry, Mutation, Mutations, Params, Priority, ReadContext, Record,
    ReferentialAction, RegistryBuilder, RelationshipInfo, RelationshipKind, RequestOptions,
    Result, ResultSet, Row, SchemaDeclaration, SpannerType, Statement, TableSchema,
    TimestampBound, Transaction, Value, now, run_in_snapshot, run_in_snapshot_at,
    run_in_transaction, uuid4,
};
pub use spannery_query::{
    ColumnRef, Condition, DeleteBuilder, Filter, InsertBuilder, JoinKind, Operator, Order,
    Query, QueryConfig, SelectSpec, UpdateBuilder,
};
pub use spannery_schema::{DdlGenerator, SchemaBuilder, SpannerDdlGenerator};
pub use session::{Session, SessionConfig};

/// In-memory recording client for tests.
#[cfg(feature = "testing")]
pub mod testing {
    pub use spannery_core::testing::{MockDatabase, MockSnapshot, MockTransaction};
}

/// Everything needed to declare models and run queries.
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::{
        Condition, Database, Error, FieldInfo, Filter, JoinKind, Model, ModelRegistry, Mutation,
        Order, Priority, Query, ReadContext, Record, ReferentialAction, Result, SchemaDeclaration,
        Session, SessionConfig, SpannerType, Statement, TableSchema, TimestampBound, Transaction,
        Value, now, uuid4,
    };
}
