//! Query building and result materialization for Spannery.
//!
//! `spannery-query` is the **statement layer**. It compiles typed filters into
//! parameterized predicates, allocates join aliases, assembles SELECT, COUNT
//! and DML statements, and turns result sets back into models.
//!
//! # Role In The Architecture
//!
//! - **Predicate compiler** (`filter`, `compile`): conditions and OR-groups
//!   become `t0.Col <op> @pN` fragments with one parameter counter per statement.
//! - **Join planner** (`join`): the queried table is `t0`, joins take `t1`, `t2`...
//!   or an explicit alias, and qualified references are resolved through it.
//! - **Statement assembler** (`select`, `mutation`): SELECT/COUNT text plus
//!   insert, update and delete mutations or DML.
//! - **Materializer** (`materialize`): rows decoded by column name, or by
//!   position when the client reports no names.
//! - **Fluent query** (`query`): the model-typed builder applications use.
//!
//! # Who Uses This Crate
//!
//! - `spannery-session` builds every read and write through it.
//! - `spannery` re-exports `Query`, `Condition` and friends in its prelude.

pub mod compile;
pub mod config;
pub mod filter;
pub mod join;
pub mod materialize;
pub mod mutation;
pub mod query;
pub mod select;

pub use compile::{ParamAllocator, compile_condition, compile_filter, compile_filters, qualify};
pub use config::QueryConfig;
pub use filter::{ColumnRef, Condition, Filter, JoinKind, Operator, Order, describe_filters};
pub use join::{BASE_ALIAS, JoinClause, JoinPlan};
pub use materialize::{materialize, materialize_records};
pub use mutation::{DeleteBuilder, InsertBuilder, UpdateBuilder, key_filters};
pub use query::Query;
pub use select::SelectSpec;
