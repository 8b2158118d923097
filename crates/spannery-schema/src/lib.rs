//! DDL generation and schema introspection for Spannery.
//!
//! `spannery-schema` turns validated `TableSchema`s into Spanner DDL:
//! `CREATE TABLE` with primary key and interleave clauses, secondary and
//! unique indexes from field hints, and drop scripts that remove indexes
//! before their table. `SchemaBuilder` orders several tables so parents are
//! created before the tables interleaved in them.
//!
//! Statements are plain strings; applying them is the job of
//! `Database::update_ddl`, which `spannery-session` calls.

pub mod builder;
pub mod ddl;
pub mod introspect;

pub use builder::SchemaBuilder;
pub use ddl::{
    DdlGenerator, IndexDef, SchemaOperation, SpannerDdlGenerator, create_table_ddl,
    drop_table_ddl, indexes_for,
};
pub use introspect::{list_tables, table_exists};
