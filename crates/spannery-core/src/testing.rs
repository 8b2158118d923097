//! In-memory recording client for tests.
//!
//! [`MockDatabase`] answers reads from a queue of canned result sets and
//! records every statement, committed mutation and DDL batch it sees.
//! Mutations applied in a transaction only become visible through
//! [`MockDatabase::mutations`] once that transaction commits.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use crate::client::{Database, Mutation, Mutations, ReadContext, TimestampBound, Transaction};
use crate::error::{Error, Result};
use crate::row::ResultSet;
use crate::statement::Statement;

/// Error injected through [`MockDatabase::push_error`].
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct MockError(pub String);

#[derive(Debug, Default)]
pub struct MockDatabase {
    results: RefCell<VecDeque<Result<ResultSet, String>>>,
    update_counts: RefCell<VecDeque<i64>>,
    executed: RefCell<Vec<Statement>>,
    mutations: RefCell<Vec<Mutation>>,
    ddl: RefCell<Vec<String>>,
    commits: Cell<usize>,
    rollbacks: Cell<usize>,
    bounds: RefCell<Vec<TimestampBound>>,
    fail_commit: Cell<bool>,
}

impl MockDatabase {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next read. Reads with nothing queued return no rows.
    pub fn push_result(&self, result: ResultSet) {
        self.results.borrow_mut().push_back(Ok(result));
    }

    /// Make the next read fail with a client error.
    pub fn push_error(&self, message: impl Into<String>) {
        self.results.borrow_mut().push_back(Err(message.into()));
    }

    /// Queue the affected-row count of the next DML statement (default 0).
    pub fn push_update_count(&self, count: i64) {
        self.update_counts.borrow_mut().push_back(count);
    }

    /// Make every later commit fail.
    pub fn fail_commits(&self) {
        self.fail_commit.set(true);
    }

    /// Statements run so far, reads and DML alike.
    #[must_use]
    pub fn executed(&self) -> Vec<Statement> {
        self.executed.borrow().clone()
    }

    /// The most recent statement.
    #[must_use]
    pub fn last_statement(&self) -> Option<Statement> {
        self.executed.borrow().last().cloned()
    }

    /// Mutations of committed transactions, in commit order.
    #[must_use]
    pub fn mutations(&self) -> Vec<Mutation> {
        self.mutations.borrow().clone()
    }

    /// DDL statements applied so far.
    #[must_use]
    pub fn ddl(&self) -> Vec<String> {
        self.ddl.borrow().clone()
    }

    #[must_use]
    pub fn commits(&self) -> usize {
        self.commits.get()
    }

    #[must_use]
    pub fn rollbacks(&self) -> usize {
        self.rollbacks.get()
    }

    #[must_use]
    pub fn snapshots(&self) -> usize {
        self.bounds.borrow().len()
    }

    /// Timestamp bound of every snapshot opened so far.
    #[must_use]
    pub fn bounds(&self) -> Vec<TimestampBound> {
        self.bounds.borrow().clone()
    }

    fn read(&self, statement: &Statement) -> Result<ResultSet> {
        self.executed.borrow_mut().push(statement.clone());
        match self.results.borrow_mut().pop_front() {
            Some(Ok(result)) => Ok(result),
            Some(Err(message)) => Err(Error::client(MockError(message))),
            None => Ok(ResultSet::empty()),
        }
    }
}

pub struct MockSnapshot<'a> {
    db: &'a MockDatabase,
}

impl ReadContext for MockSnapshot<'_> {
    fn execute_sql(&self, statement: &Statement) -> Result<ResultSet> {
        self.db.read(statement)
    }
}

pub struct MockTransaction<'a> {
    db: &'a MockDatabase,
    pending: Vec<Mutation>,
    finished: bool,
}

impl MockTransaction<'_> {
    /// Mutations buffered so far in this transaction.
    #[must_use]
    pub fn pending(&self) -> &[Mutation] {
        &self.pending
    }
}

impl ReadContext for MockTransaction<'_> {
    fn execute_sql(&self, statement: &Statement) -> Result<ResultSet> {
        self.db.read(statement)
    }
}

impl Mutations for MockTransaction<'_> {
    fn apply(&mut self, mutation: Mutation) -> Result<()> {
        self.pending.push(mutation);
        Ok(())
    }

    fn execute_update(&mut self, statement: &Statement) -> Result<i64> {
        self.db.executed.borrow_mut().push(statement.clone());
        Ok(self.db.update_counts.borrow_mut().pop_front().unwrap_or(0))
    }
}

impl Transaction for MockTransaction<'_> {
    fn commit(mut self) -> Result<()> {
        self.finished = true;
        if self.db.fail_commit.get() {
            self.db.rollbacks.set(self.db.rollbacks.get() + 1);
            return Err(Error::client(MockError("commit aborted".to_string())));
        }
        self.db
            .mutations
            .borrow_mut()
            .extend(std::mem::take(&mut self.pending));
        self.db.commits.set(self.db.commits.get() + 1);
        Ok(())
    }

    fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.db.rollbacks.set(self.db.rollbacks.get() + 1);
        Ok(())
    }
}

impl Drop for MockTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.db.rollbacks.set(self.db.rollbacks.get() + 1);
        }
    }
}

impl Database for MockDatabase {
    type Snapshot<'a> = MockSnapshot<'a>;
    type Txn<'a> = MockTransaction<'a>;

    fn snapshot(&self, bound: TimestampBound) -> Result<MockSnapshot<'_>> {
        self.bounds.borrow_mut().push(bound);
        Ok(MockSnapshot { db: self })
    }

    fn begin_transaction(&self) -> Result<MockTransaction<'_>> {
        Ok(MockTransaction {
            db: self,
            pending: Vec::new(),
            finished: false,
        })
    }

    fn update_ddl(&self, statements: &[String]) -> Result<()> {
        self.ddl.borrow_mut().extend(statements.iter().cloned());
        Ok(())
    }
}
