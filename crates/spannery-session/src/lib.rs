//! Session: CRUD, scoped transactions and schema management for Spannery.
//!
//! A [`Session`] wraps a database handle together with the model registry and
//! turns model-level calls into queries, mutations and DDL.
//!
//! # Design Philosophy
//!
//! - **No hidden state**: the session keeps no identity map; every read goes
//!   to the database and every write is applied when its transaction commits.
//! - **Scoped transactions**: `transaction` commits when the closure returns
//!   `Ok` and rolls back on `Err` or unwind.
//! - **Pass-through writes**: each write has a `*_in` form that buffers into a
//!   caller-supplied transaction instead of opening one.
//!
//! # Example
//!
//! ```ignore
//! let session = Session::new(db, Arc::new(registry));
//!
//! let mut product = session.create::<Product>(Record::new().with("Name", "Bolt"))?;
//! session.save(&mut product)?;
//!
//! let cheap = session
//!     .query::<Product>()?
//!     .filter_lt("ListPrice", 10)
//!     .all()?;
//!
//! session.transaction(|txn| {
//!     session.update_in(txn, &mut product)?;
//!     session.delete_in(txn, &old)
//! })?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use spannery_core::{
    Database, Error, Model, ModelRegistry, Mutation, Mutations, ReadContext, Record, Result,
    ResultSet, Statement, TableSchema, TimestampBound, Value, find_relationship, run_in_snapshot,
    run_in_snapshot_at, run_in_transaction,
};
use spannery_query::{
    DeleteBuilder, Filter, InsertBuilder, Query, QueryConfig, UpdateBuilder,
};
use spannery_schema::{DdlGenerator, SchemaBuilder, SchemaOperation, SpannerDdlGenerator};

// ============================================================================
// Session Configuration
// ============================================================================

/// Configuration for Session behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Log every raw statement at `info` level instead of `debug`.
    pub log_statements: bool,
    /// Settings handed to every query the session builds.
    pub query: QueryConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            log_statements: false,
            query: QueryConfig::default(),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Model-level access to one database.
pub struct Session<D: Database> {
    db: D,
    registry: Arc<ModelRegistry>,
    config: SessionConfig,
}

impl<D: Database> std::fmt::Debug for Session<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("models", &self.registry.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<D: Database> Session<D> {
    /// Create a session with the default configuration.
    pub fn new(db: D, registry: Arc<ModelRegistry>) -> Self {
        Self::with_config(db, registry, SessionConfig::default())
    }

    pub fn with_config(db: D, registry: Arc<ModelRegistry>, config: SessionConfig) -> Self {
        Self {
            db,
            registry,
            config,
        }
    }

    /// The wrapped database handle.
    pub fn database(&self) -> &D {
        &self.db
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn schema<M: Model>(&self) -> Result<&TableSchema> {
        self.registry.schema_of::<M>()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Start a query over `M`, run in a fresh snapshot.
    pub fn query<M: Model>(&self) -> Result<Query<'_, M, D>> {
        Ok(Query::new(&self.registry, &self.db)?.with_config(self.config.query.clone()))
    }

    /// Start a query over `M` that reads through `read` (usually an open transaction).
    pub fn query_in<'a, M: Model>(&'a self, read: &'a dyn ReadContext) -> Result<Query<'a, M, D>> {
        Ok(self.query::<M>()?.with_transaction(read))
    }

    /// Query over `M` inner-joined to `T` on `t0.<local_key> = t1.<foreign_key>`.
    pub fn join_query<M: Model, T: Model>(
        &self,
        local_key: &str,
        foreign_key: &str,
    ) -> Result<Query<'_, M, D>> {
        Ok(self.query::<M>()?.inner_join::<T>(local_key, foreign_key))
    }

    fn key_query<'a, M: Model>(&'a self, key: &Record) -> Result<Query<'a, M, D>> {
        Ok(self.query::<M>()?.filter_by_id(key))
    }

    /// Build an instance from `record`, filling schema defaults. Nothing is
    /// written.
    pub fn create<M: Model>(&self, record: Record) -> Result<M> {
        self.registry.create(record)
    }

    /// Row with primary key `key` (every key field, nothing else).
    #[tracing::instrument(level = "debug", skip(self, key))]
    pub fn get<M: Model>(&self, key: &Record) -> Result<Option<M>> {
        tracing::debug!(model = M::MODEL_NAME, key = %key, "getting by primary key");
        self.key_query::<M>(key)?.first()
    }

    /// Like [`Session::get`], failing with [`Error::RecordNotFound`].
    pub fn get_or_error<M: Model>(&self, key: &Record) -> Result<M> {
        self.get(key)?.ok_or_else(|| Error::RecordNotFound {
            model: M::MODEL_NAME.to_string(),
            criteria: key.to_string(),
        })
    }

    /// Reload `model` from the database.
    #[tracing::instrument(level = "debug", skip(self, model))]
    pub fn refresh<M: Model>(&self, model: &mut M) -> Result<()> {
        let key = self.key_record(model)?;
        *model = self.get_or_error(&key)?;
        Ok(())
    }

    fn key_record<M: Model>(&self, model: &M) -> Result<Record> {
        let schema = self.schema::<M>()?;
        let values = schema.key_of(&model.to_record())?;
        Ok(schema
            .primary_keys()
            .map(|f| f.name)
            .zip(values)
            .collect())
    }

    /// Whether a row of `M` matches every field of `criteria`.
    pub fn exists<M: Model>(&self, criteria: &Record) -> Result<bool> {
        criteria
            .iter()
            .fold(self.query::<M>()?, |query, (field, value)| {
                query.filter_eq(field, value.clone())
            })
            .exists()
    }

    /// Every row of `M`.
    pub fn all<M: Model>(&self) -> Result<Vec<M>> {
        self.query::<M>()?.all()
    }

    /// Fetch the row with `key`, or insert one built from `key` and
    /// `defaults`. Returns the row and whether it was created. Both steps run
    /// in one transaction.
    #[tracing::instrument(level = "debug", skip(self, key, defaults))]
    pub fn get_or_create<M: Model>(&self, key: &Record, defaults: Record) -> Result<(M, bool)> {
        run_in_transaction(&self.db, |txn| {
            let read: &dyn ReadContext = &*txn;
            if let Some(found) = self.key_query::<M>(key)?.with_transaction(read).first()? {
                return Ok((found, false));
            }
            let mut record = defaults;
            record.merge(key.clone());
            let mut model: M = self.registry.create(record)?;
            self.save_in(txn, &mut model)?;
            Ok((model, true))
        })
    }

    // ========================================================================
    // Writes
    // ========================================================================

    fn apply<T: Mutations + ?Sized>(&self, txn: &mut T, mutation: Mutation) -> Result<()> {
        tracing::info!(
            table = mutation.table(),
            op = mutation.kind(),
            "buffering mutation"
        );
        txn.apply(mutation)
    }

    fn prepare<M: Model>(&self, model: &M, inserting: bool) -> Result<(&TableSchema, Record)> {
        let schema = self.schema::<M>()?;
        let mut record = model.to_record();
        schema.check_fields(&record)?;
        if inserting {
            schema.apply_defaults(&mut record);
        }
        schema.touch_timestamps(&mut record, inserting);
        Ok((schema, record))
    }

    /// Insert `model` in its own transaction. Defaults and timestamps filled
    /// in along the way are written back to `model`.
    pub fn save<M: Model>(&self, model: &mut M) -> Result<()> {
        run_in_transaction(&self.db, |txn| self.save_in(txn, model))
    }

    /// Insert `model` inside `txn`.
    #[tracing::instrument(level = "debug", skip(self, txn, model))]
    pub fn save_in<M: Model, T: Mutations + ?Sized>(&self, txn: &mut T, model: &mut M) -> Result<()> {
        let (schema, record) = self.prepare(model, true)?;
        self.apply(txn, InsertBuilder::new(schema, record.clone()).build()?)?;
        *model = M::from_record(record)?;
        Ok(())
    }

    /// Insert `model`, or overwrite the existing row with its key.
    pub fn upsert<M: Model>(&self, model: &mut M) -> Result<()> {
        run_in_transaction(&self.db, |txn| self.upsert_in(txn, model))
    }

    #[tracing::instrument(level = "debug", skip(self, txn, model))]
    pub fn upsert_in<M: Model, T: Mutations + ?Sized>(
        &self,
        txn: &mut T,
        model: &mut M,
    ) -> Result<()> {
        let (schema, record) = self.prepare(model, true)?;
        self.apply(
            txn,
            InsertBuilder::new(schema, record.clone()).or_update().build()?,
        )?;
        *model = M::from_record(record)?;
        Ok(())
    }

    /// Write every field of `model` to the row with its key. `auto_now`
    /// fields are refreshed and written back to `model`.
    pub fn update<M: Model>(&self, model: &mut M) -> Result<()> {
        run_in_transaction(&self.db, |txn| self.update_in(txn, model))
    }

    #[tracing::instrument(level = "debug", skip(self, txn, model))]
    pub fn update_in<M: Model, T: Mutations + ?Sized>(
        &self,
        txn: &mut T,
        model: &mut M,
    ) -> Result<()> {
        let (schema, record) = self.prepare(model, false)?;
        self.apply(txn, UpdateBuilder::new(schema, record.clone()).build()?)?;
        *model = M::from_record(record)?;
        Ok(())
    }

    /// Delete the row with `model`'s key. Interleaved child rows follow the
    /// table's `ON DELETE` policy.
    pub fn delete<M: Model>(&self, model: &M) -> Result<()> {
        run_in_transaction(&self.db, |txn| self.delete_in(txn, model))
    }

    #[tracing::instrument(level = "debug", skip(self, txn, model))]
    pub fn delete_in<M: Model, T: Mutations + ?Sized>(&self, txn: &mut T, model: &M) -> Result<()> {
        let schema = self.schema::<M>()?;
        let mutation = DeleteBuilder::from_record(schema, &model.to_record()).build()?;
        self.apply(txn, mutation)
    }

    /// `UPDATE ... SET <sets> WHERE <filters>` on `M`'s table. Returns the
    /// affected row count.
    pub fn update_where<M: Model>(
        &self,
        sets: &Record,
        filters: impl IntoIterator<Item = Filter>,
    ) -> Result<i64> {
        let schema = self.schema::<M>()?;
        let builder = sets
            .iter()
            .fold(UpdateBuilder::empty(schema), |b, (column, value)| {
                b.set(column, value.clone())
            });
        let statement = filters
            .into_iter()
            .fold(builder, UpdateBuilder::filter)
            .build_dml(&self.config.query.param_prefix)?;
        self.execute_update(&statement)
    }

    /// `DELETE ... WHERE <filters>` on `M`'s table. Returns the affected row count.
    pub fn delete_where<M: Model>(&self, filters: impl IntoIterator<Item = Filter>) -> Result<i64> {
        let schema = self.schema::<M>()?;
        let statement = filters
            .into_iter()
            .fold(DeleteBuilder::new(schema), DeleteBuilder::filter)
            .build_dml(&self.config.query.param_prefix)?;
        self.execute_update(&statement)
    }

    // ========================================================================
    // Raw statements and scopes
    // ========================================================================

    fn log_statement(&self, statement: &Statement) {
        if self.config.log_statements {
            tracing::info!(statement = %statement, "executing statement");
        } else {
            tracing::debug!(sql = %statement.sql, params = statement.params.len(), "executing statement");
        }
    }

    /// Run a read in a fresh snapshot.
    pub fn execute_sql(&self, statement: &Statement) -> Result<ResultSet> {
        self.log_statement(statement);
        run_in_snapshot(&self.db, |snapshot| snapshot.execute_sql(statement))
    }

    /// Run DML in its own transaction. Returns the affected row count.
    pub fn execute_update(&self, statement: &Statement) -> Result<i64> {
        self.log_statement(statement);
        let count = run_in_transaction(&self.db, |txn| txn.execute_update(statement))?;
        tracing::info!(rows = count, "executed update");
        Ok(count)
    }

    /// Run `f` in a transaction: commit on `Ok`, roll back on `Err` or unwind.
    pub fn transaction<'s, F, R>(&'s self, f: F) -> Result<R>
    where
        F: FnOnce(&mut D::Txn<'s>) -> Result<R>,
    {
        tracing::debug!("beginning transaction");
        run_in_transaction(&self.db, f)
    }

    /// Run `f` against a read-only snapshot.
    pub fn snapshot<'s, F, R>(&'s self, f: F) -> Result<R>
    where
        F: FnOnce(&D::Snapshot<'s>) -> Result<R>,
    {
        run_in_snapshot(&self.db, f)
    }

    /// Run `f` against a snapshot at `bound`.
    pub fn snapshot_at<'s, F, R>(&'s self, bound: TimestampBound, f: F) -> Result<R>
    where
        F: FnOnce(&D::Snapshot<'s>) -> Result<R>,
    {
        run_in_snapshot_at(&self.db, bound, f)
    }

    /// Run `f` against a snapshot reading data exactly `staleness` old.
    pub fn stale_snapshot<'s, F, R>(&'s self, staleness: Duration, f: F) -> Result<R>
    where
        F: FnOnce(&D::Snapshot<'s>) -> Result<R>,
    {
        self.snapshot_at(TimestampBound::ExactStaleness(staleness), f)
    }

    /// Several reads that see one consistent, strong view of the database.
    /// Queries join it through [`Session::query_in`].
    pub fn read_only_transaction<'s, F, R>(&'s self, f: F) -> Result<R>
    where
        F: FnOnce(&D::Snapshot<'s>) -> Result<R>,
    {
        tracing::debug!("beginning read-only transaction");
        self.snapshot_at(TimestampBound::Strong, f)
    }

    // ========================================================================
    // Relationships
    // ========================================================================

    /// Follow the foreign key `field` of `model` to its `T` row. `None` when
    /// the field is NULL or no row matches.
    pub fn get_related<T: Model, M: Model>(&self, model: &M, field: &str) -> Result<Option<T>> {
        let schema = self.schema::<M>()?;
        let info = schema.require_field(field)?;
        let Some(relation) = schema
            .relationships()
            .into_iter()
            .find(|r| r.key_column == info.name)
        else {
            return Err(Error::Custom(format!(
                "field `{}` of {} is not a foreign key",
                info.name,
                M::MODEL_NAME
            )));
        };
        if relation.related_model != T::MODEL_NAME {
            return Err(Error::Custom(format!(
                "field `{}` of {} references {}, not {}",
                info.name,
                M::MODEL_NAME,
                relation.related_model,
                T::MODEL_NAME
            )));
        }
        let target_key = single_key(self.schema::<T>()?)?;
        let value = model.to_record().remove(info.name).unwrap_or(Value::Null);
        if value.is_null() {
            return Ok(None);
        }
        self.query::<T>()?.filter_eq(target_key, value).first()
    }

    /// Rows of `C` pointing at `parent` through the relation named
    /// `relation` (the foreign key's `related_name`).
    pub fn get_children<C: Model, M: Model>(&self, parent: &M, relation: &str) -> Result<Vec<C>> {
        let reverse = self.registry.reverse_relationships(M::MODEL_NAME);
        let Some(rel) = find_relationship(&reverse, relation) else {
            return Err(Error::Custom(format!(
                "{} has no relation named `{relation}`",
                M::MODEL_NAME
            )));
        };
        if rel.related_model != C::MODEL_NAME {
            return Err(Error::Custom(format!(
                "relation `{relation}` of {} holds {}, not {}",
                M::MODEL_NAME,
                rel.related_model,
                C::MODEL_NAME
            )));
        }
        let parent_schema = self.schema::<M>()?;
        single_key(parent_schema)?;
        let mut key = parent_schema.key_of(&parent.to_record())?;
        self.query::<C>()?.filter_eq(rel.key_column, key.remove(0)).all()
    }

    // ========================================================================
    // Schema management
    // ========================================================================

    fn apply_ddl(&self, statements: &[String]) -> Result<()> {
        if statements.is_empty() {
            return Ok(());
        }
        for statement in statements {
            tracing::info!(ddl = %statement, "applying DDL");
        }
        self.db.update_ddl(statements)
    }

    /// Create `M`'s table and indexes.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn create_table<M: Model>(&self) -> Result<()> {
        let schema = self.schema::<M>()?;
        self.apply_ddl(&SpannerDdlGenerator.generate(&SchemaOperation::CreateTable(schema)))
    }

    /// Drop `M`'s indexes and table.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn drop_table<M: Model>(&self) -> Result<()> {
        let schema = self.schema::<M>()?;
        self.apply_ddl(&SpannerDdlGenerator.generate(&SchemaOperation::DropTable(schema)))
    }

    /// Whether `M`'s table exists.
    pub fn table_exists<M: Model>(&self) -> Result<bool> {
        let table = self.schema::<M>()?.table_name();
        run_in_snapshot(&self.db, |snapshot| {
            spannery_schema::table_exists(snapshot, table)
        })
    }

    /// Create every registered table, parents before interleaved children.
    pub fn create_all(&self) -> Result<()> {
        self.apply_ddl(&SchemaBuilder::from_registry(&self.registry).create_statements())
    }

    /// Drop every registered table, children first.
    pub fn drop_all(&self) -> Result<()> {
        self.apply_ddl(&SchemaBuilder::from_registry(&self.registry).drop_statements())
    }
}

/// The only primary-key field of `schema`.
fn single_key(schema: &TableSchema) -> Result<&'static str> {
    match schema.primary_key_names().as_slice() {
        [name] => Ok(*name),
        _ => Err(Error::InvalidKey {
            model: schema.model_name().to_string(),
            reason: "relationships need a single-column primary key".to_string(),
        }),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
