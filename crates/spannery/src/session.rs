//! Session re-exports.
//!
//! `spannery::Session` wraps a [`Database`](crate::Database) handle and the
//! model registry: CRUD by primary key, scoped transactions, relationship
//! traversal and DDL. It keeps no identity map; every read goes to the
//! database.
//!
//! The implementation lives in the separate `spannery-session` crate. This
//! module exists so applications can reach it without depending on
//! sub-crates directly.

pub use spannery_session::{Session, SessionConfig};
