//! The seam to the external database client.
//!
//! Spannery never talks to the network itself. An application adapts its
//! client to these traits: reads go through [`ReadContext`], writes through
//! [`Mutations`], and [`Database`] hands out scoped snapshots and
//! transactions. Client failures travel back as [`Error::Client`] unchanged.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::row::ResultSet;
use crate::statement::Statement;
use crate::value::Value;

/// Anything that can run a read-only query: a snapshot or a transaction.
pub trait ReadContext {
    fn execute_sql(&self, statement: &Statement) -> Result<ResultSet>;
}

/// Set of rows addressed by primary key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeySet {
    /// Each key lists the primary-key values in key order.
    pub keys: Vec<Vec<Value>>,
    /// Address every row of the table.
    pub all: bool,
}

impl KeySet {
    /// A single key.
    #[must_use]
    pub fn single(key: Vec<Value>) -> Self {
        Self {
            keys: vec![key],
            all: false,
        }
    }

    /// Every row in the table.
    #[must_use]
    pub fn all() -> Self {
        Self {
            keys: Vec::new(),
            all: true,
        }
    }
}

/// A buffered write, applied by the client at commit.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Fails if a row with the same key exists.
    Insert {
        table: String,
        columns: Vec<String>,
        values: Vec<Vec<Value>>,
    },
    /// Fails if the row does not exist.
    Update {
        table: String,
        columns: Vec<String>,
        values: Vec<Vec<Value>>,
    },
    /// Insert, or overwrite the listed columns of an existing row.
    InsertOrUpdate {
        table: String,
        columns: Vec<String>,
        values: Vec<Vec<Value>>,
    },
    Delete { table: String, keys: KeySet },
}

impl Mutation {
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Mutation::Insert { table, .. }
            | Mutation::Update { table, .. }
            | Mutation::InsertOrUpdate { table, .. }
            | Mutation::Delete { table, .. } => table,
        }
    }

    /// Short operation name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Mutation::Insert { .. } => "insert",
            Mutation::Update { .. } => "update",
            Mutation::InsertOrUpdate { .. } => "insert_or_update",
            Mutation::Delete { .. } => "delete",
        }
    }
}

/// Write operations available inside a transaction.
pub trait Mutations {
    /// Buffer a mutation.
    fn apply(&mut self, mutation: Mutation) -> Result<()>;

    /// Run a DML statement, returning the affected row count.
    fn execute_update(&mut self, statement: &Statement) -> Result<i64>;
}

/// A read-write transaction. Dropping it without `commit` must roll it back.
pub trait Transaction: ReadContext + Mutations {
    fn commit(self) -> Result<()>
    where
        Self: Sized;

    fn rollback(self) -> Result<()>
    where
        Self: Sized;
}

/// Which committed data a read-only snapshot observes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimestampBound {
    /// Everything committed before the snapshot started.
    #[default]
    Strong,
    /// Data exactly this old.
    ExactStaleness(Duration),
    /// Data at most this old; the client picks the timestamp.
    MaxStaleness(Duration),
    /// Data as of this commit timestamp.
    ReadTimestamp(DateTime<Utc>),
    /// Data no older than this commit timestamp.
    MinReadTimestamp(DateTime<Utc>),
}

impl TimestampBound {
    #[must_use]
    pub const fn is_strong(&self) -> bool {
        matches!(self, TimestampBound::Strong)
    }
}

/// A database handle.
pub trait Database {
    /// Read-only snapshot. Released when dropped.
    type Snapshot<'a>: ReadContext
    where
        Self: 'a;

    type Txn<'a>: Transaction
    where
        Self: 'a;

    /// Read-only snapshot at `bound`. Stale bounds are only valid for
    /// single-use reads in Spanner; a client may reject them otherwise.
    fn snapshot(&self, bound: TimestampBound) -> Result<Self::Snapshot<'_>>;

    fn begin_transaction(&self) -> Result<Self::Txn<'_>>;

    /// Apply schema statements and wait for them to finish.
    fn update_ddl(&self, statements: &[String]) -> Result<()>;
}

/// Rolls back on drop unless the transaction was finished explicitly.
struct TxnGuard<T: Transaction> {
    txn: Option<T>,
}

impl<T: Transaction> TxnGuard<T> {
    fn get(&mut self) -> Result<&mut T> {
        self.txn
            .as_mut()
            .ok_or_else(|| Error::Custom("transaction already finished".to_string()))
    }

    fn take(&mut self) -> Result<T> {
        self.txn
            .take()
            .ok_or_else(|| Error::Custom("transaction already finished".to_string()))
    }
}

impl<T: Transaction> Drop for TxnGuard<T> {
    fn drop(&mut self) {
        if let Some(txn) = self.txn.take() {
            tracing::warn!("transaction dropped without commit; rolling back");
            if let Err(err) = txn.rollback() {
                tracing::warn!(error = %err, "rollback failed");
            }
        }
    }
}

/// Run `f` in a fresh transaction: commit when it returns `Ok`, roll back
/// when it returns `Err` or unwinds. The body's error wins over a rollback
/// failure.
pub fn run_in_transaction<'db, D, F, R>(db: &'db D, f: F) -> Result<R>
where
    D: Database + ?Sized,
    F: FnOnce(&mut D::Txn<'db>) -> Result<R>,
{
    let mut guard = TxnGuard {
        txn: Some(db.begin_transaction()?),
    };
    match f(guard.get()?) {
        Ok(value) => {
            guard.take()?.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = guard.take()?.rollback() {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

/// Run `f` against a fresh strong snapshot, released on return.
pub fn run_in_snapshot<'db, D, F, R>(db: &'db D, f: F) -> Result<R>
where
    D: Database + ?Sized,
    F: FnOnce(&D::Snapshot<'db>) -> Result<R>,
{
    run_in_snapshot_at(db, TimestampBound::Strong, f)
}

/// Like [`run_in_snapshot`] with an explicit timestamp bound.
pub fn run_in_snapshot_at<'db, D, F, R>(db: &'db D, bound: TimestampBound, f: F) -> Result<R>
where
    D: Database + ?Sized,
    F: FnOnce(&D::Snapshot<'db>) -> Result<R>,
{
    if !bound.is_strong() {
        tracing::debug!(?bound, "opening stale snapshot");
    }
    let snapshot = db.snapshot(bound)?;
    f(&snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDatabase;

    #[test]
    fn test_commit_on_ok() {
        let db = MockDatabase::new();
        let n = run_in_transaction(&db, |txn| {
            txn.apply(Mutation::Delete {
                table: "Products".to_string(),
                keys: KeySet::all(),
            })?;
            Ok(3)
        })
        .unwrap();
        assert_eq!(n, 3);
        assert_eq!(db.commits(), 1);
        assert_eq!(db.rollbacks(), 0);
        assert_eq!(db.mutations().len(), 1);
    }

    #[test]
    fn test_rollback_on_err() {
        let db = MockDatabase::new();
        let err = run_in_transaction(&db, |txn| -> Result<()> {
            txn.apply(Mutation::Delete {
                table: "Products".to_string(),
                keys: KeySet::all(),
            })?;
            Err(Error::Custom("boom".to_string()))
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(db.commits(), 0);
        assert_eq!(db.rollbacks(), 1);
        assert!(db.mutations().is_empty());
    }

    #[test]
    fn test_rollback_on_unwind() {
        let db = MockDatabase::new();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = run_in_transaction(&db, |_txn| -> Result<()> { panic!("body panicked") });
        }));
        assert!(outcome.is_err());
        assert_eq!(db.rollbacks(), 1);
    }

    #[test]
    fn test_snapshot_reads() {
        let db = MockDatabase::new();
        db.push_result(ResultSet::positional(vec![vec![Value::Int64(1)]]));
        let result = run_in_snapshot(&db, |snap| snap.execute_sql(&Statement::new("SELECT 1"))).unwrap();
        assert_eq!(result.scalar(), Some(&Value::Int64(1)));
        assert_eq!(db.executed()[0].sql, "SELECT 1");
    }

    #[test]
    fn test_snapshot_bound_reaches_client() {
        let db = MockDatabase::new();
        let bound = TimestampBound::ExactStaleness(Duration::from_secs(10));
        run_in_snapshot_at(&db, bound, |snap| snap.execute_sql(&Statement::new("SELECT 1"))).unwrap();
        run_in_snapshot(&db, |snap| snap.execute_sql(&Statement::new("SELECT 2"))).unwrap();
        assert_eq!(db.bounds(), vec![bound, TimestampBound::Strong]);
    }
}
