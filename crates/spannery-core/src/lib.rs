//! Core types and traits for Spannery.
//!
//! `spannery-core` is the **foundation layer** for the workspace. It defines the
//! traits and data types every other crate builds on.
//!
//! # Role In The Architecture
//!
//! - **Contract layer**: `Model` is implemented by application row types; the
//!   `client` traits (`Database`, `ReadContext`, `Mutations`, `Transaction`) are
//!   implemented by an adapter around the external database client.
//! - **Data model**: `Value`, `Record`, `ResultSet` and `Statement` carry query
//!   inputs and outputs; `FieldInfo` and `TableSchema` describe tables.
//! - **Registry**: `ModelRegistry` holds every validated schema and is built once,
//!   before any query runs.
//!
//! # Who Uses This Crate
//!
//! - `spannery-query` compiles filters against `TableSchema` and materializes
//!   `ResultSet` rows into models.
//! - `spannery-schema` turns `TableSchema` into DDL.
//! - `spannery-session` drives `Database` for CRUD and scoped transactions.
//!
//! Most applications should use the `spannery` facade; reach for
//! `spannery-core` directly when writing a client adapter.

pub mod client;
pub mod error;
pub mod field;
pub mod identifiers;
pub mod model;
pub mod record;
pub mod registry;
pub mod relationship;
pub mod row;
pub mod schema;
pub mod statement;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;
pub mod value;

pub use client::{
    Database, KeySet, Mutation, Mutations, ReadContext, TimestampBound, Transaction,
    run_in_snapshot, run_in_snapshot_at, run_in_transaction,
};
pub use error::{ClientError, Error, Result};
pub use field::{DefaultValue, FieldInfo, ForeignKeyInfo, ReferentialAction, now, uuid4};
pub use identifiers::{is_valid_identifier, validate_identifier};
pub use model::Model;
pub use record::Record;
pub use registry::{ModelRegistry, RegistryBuilder};
pub use relationship::{RelationshipInfo, RelationshipKind, find_relationship};
pub use row::{ResultSet, Row};
pub use schema::{Interleave, SchemaDeclaration, TableSchema};
pub use statement::{Params, Priority, RequestOptions, Statement};
pub use types::{FOREIGN_KEY_LENGTH, SpannerType};
pub use value::{FromValue, Value};
