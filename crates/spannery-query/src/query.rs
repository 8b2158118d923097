//! The fluent, model-typed query.

use std::marker::PhantomData;

use spannery_core::{
    Database, Error, Model, ModelRegistry, Priority, ReadContext, Record, Result, ResultSet,
    Statement, TableSchema, Value, run_in_snapshot, validate_identifier,
};

use crate::compile::qualify;
use crate::config::QueryConfig;
use crate::filter::{ColumnRef, Condition, Filter, JoinKind, Operator, Order, describe_filters};
use crate::materialize::materialize;
use crate::mutation::key_filters;
use crate::select::SelectSpec;

/// Query over the table of model `M`.
///
/// Builder methods check fields and tables as they are called. The first
/// failure is kept and returned by `build` and by every terminal call, so a
/// chain can be written without intermediate `?`.
///
/// # Example
///
/// ```ignore
/// let low_stock = Query::<Product, _>::new(&registry, &db)?
///     .filter_lt("Stock", 10)
///     .filter_eq("Category", "Widgets")
///     .order_by("Name", Order::Asc)
///     .all()?;
/// ```
pub struct Query<'a, M: Model, D: Database + ?Sized> {
    registry: &'a ModelRegistry,
    db: &'a D,
    txn: Option<&'a dyn ReadContext>,
    spec: SelectSpec<'a>,
    config: QueryConfig,
    error: Option<Error>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model, D: Database + ?Sized> Clone for Query<'_, M, D> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry,
            db: self.db,
            txn: self.txn,
            spec: self.spec.clone(),
            config: self.config.clone(),
            error: self.error.clone(),
            _model: PhantomData,
        }
    }
}

impl<M: Model, D: Database + ?Sized> std::fmt::Debug for Query<'_, M, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("model", &M::MODEL_NAME)
            .field("spec", &self.spec)
            .field("in_transaction", &self.txn.is_some())
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<'a, M: Model, D: Database + ?Sized> Query<'a, M, D> {
    /// Query over `M`, which must be registered in `registry`.
    pub fn new(registry: &'a ModelRegistry, db: &'a D) -> Result<Self> {
        let schema = registry.schema_of::<M>()?;
        Ok(Self {
            registry,
            db,
            txn: None,
            spec: SelectSpec::new(schema),
            config: QueryConfig::default(),
            error: None,
            _model: PhantomData,
        })
    }

    pub fn with_config(mut self, config: QueryConfig) -> Self {
        self.config = config;
        self
    }

    /// Run inside an existing transaction instead of a fresh snapshot.
    pub fn with_transaction(mut self, txn: &'a dyn ReadContext) -> Self {
        self.txn = Some(txn);
        self
    }

    #[must_use]
    pub fn schema(&self) -> &'a TableSchema {
        self.spec.base()
    }

    fn fail(&mut self, err: Error) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn check(&self) -> Result<()> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn field_name(&mut self, field: &str) -> Option<&'static str> {
        match self.spec.base().require_field(field) {
            Ok(info) => Some(info.name),
            Err(err) => {
                self.fail(err);
                None
            }
        }
    }

    fn validate_condition(&self, condition: &Condition) -> Result<()> {
        qualify(&condition.column, &self.spec.plan).map(|_| ())
    }

    /// Select only these fields (`t0.<field>` each) instead of `*`.
    pub fn select(mut self, fields: &[&str]) -> Self {
        let mut names = Vec::with_capacity(fields.len());
        for field in fields {
            match self.field_name(field) {
                Some(name) => names.push(name),
                None => return self,
            }
        }
        self.spec.projection = Some(names);
        self
    }

    /// Add a filter. Base-table fields must exist in the schema; qualified
    /// references must name a joined table (or alias) and one of its fields.
    pub fn filter(mut self, filter: impl Into<Filter>) -> Self {
        let filter = filter.into();
        let checked = match &filter {
            Filter::Condition(c) => self.validate_condition(c),
            Filter::AnyOf(conditions) => conditions
                .iter()
                .try_for_each(|c| self.validate_condition(c)),
        };
        match checked {
            Ok(()) => self.spec.filters.push(filter),
            Err(err) => self.fail(err),
        }
        self
    }

    pub fn filter_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(Condition::eq(field, value))
    }

    pub fn filter_ne(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(Condition::ne(field, value))
    }

    pub fn filter_lt(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(Condition::lt(field, value))
    }

    pub fn filter_lte(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(Condition::le(field, value))
    }

    pub fn filter_gt(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(Condition::gt(field, value))
    }

    pub fn filter_gte(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(Condition::ge(field, value))
    }

    /// `field IN (...)`. An empty list matches nothing.
    pub fn filter_in<V: Into<Value>>(self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.filter(Condition::is_in(field, values))
    }

    /// `field NOT IN (...)`. An empty list excludes nothing.
    pub fn filter_not_in<V: Into<Value>>(
        self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.filter(Condition::not_in(field, values))
    }

    /// `LIKE` pattern match (`%` and `_` wildcards).
    pub fn filter_like(self, field: &str, pattern: &str, case_sensitive: bool) -> Self {
        if case_sensitive {
            self.filter(Condition::like(field, pattern))
        } else {
            self.filter(Condition::ilike(field, pattern))
        }
    }

    pub fn filter_ilike(self, field: &str, pattern: &str) -> Self {
        self.filter_like(field, pattern, false)
    }

    pub fn filter_is_null(self, field: &str) -> Self {
        self.filter(Condition::is_null(field))
    }

    pub fn filter_is_not_null(self, field: &str) -> Self {
        self.filter(Condition::is_not_null(field))
    }

    /// `REGEXP_CONTAINS(field, pattern)`.
    pub fn filter_regex(self, field: &str, pattern: &str) -> Self {
        self.filter(Condition::regex(field, pattern))
    }

    /// Range filter. The exclusive form adds `field > start` and `field < end`.
    pub fn filter_between(
        self,
        field: &str,
        start: impl Into<Value>,
        end: impl Into<Value>,
        inclusive: bool,
    ) -> Self {
        if inclusive {
            self.filter(Condition::between(field, start, end))
        } else {
            self.filter(Condition::gt(field, start))
                .filter(Condition::lt(field, end))
        }
    }

    /// One parenthesized OR-group of conditions.
    pub fn filter_or(self, conditions: impl IntoIterator<Item = Condition>) -> Self {
        self.filter(Filter::AnyOf(conditions.into_iter().collect()))
    }

    /// Filter from a `Field__lookup` key, e.g. `("Stock__lt", 10)`.
    pub fn filter_lookup(mut self, key: &str, value: impl Into<Value>) -> Self {
        match Condition::parse(key, value) {
            Ok(condition) => self.filter(condition),
            Err(err) => {
                self.fail(err);
                self
            }
        }
    }

    /// Equality filters on every primary-key field of `key`. A missing or
    /// extra key field fails the query.
    pub fn filter_by_id(mut self, key: &Record) -> Self {
        match key_filters(self.spec.base(), key) {
            Ok(filters) => filters.into_iter().fold(self, Self::filter),
            Err(err) => {
                self.fail(err);
                self
            }
        }
    }

    /// Equality filter on a joined table, named by table name or alias.
    pub fn table_filter(self, table: &str, field: &str, value: impl Into<Value>) -> Self {
        self.table_filter_op(table, field, Operator::Eq, value)
    }

    pub fn table_filter_op(
        self,
        table: &str,
        field: &str,
        op: Operator,
        value: impl Into<Value>,
    ) -> Self {
        self.filter(Condition::qualified(table, field, op, value))
    }

    pub fn order_by(mut self, field: &str, order: Order) -> Self {
        if let Some(name) = self.field_name(field) {
            self.spec.order.push((name, order));
        }
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.spec.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.spec.offset = Some(offset);
        self
    }

    /// Read the base table through `index` (`FROM T@{FORCE_INDEX=index}`).
    pub fn force_index(mut self, index: &str) -> Self {
        match validate_identifier("index", index) {
            Ok(()) => self.spec.force_index = Some(index.to_string()),
            Err(err) => self.fail(err),
        }
        self
    }

    /// Tag the request for Spanner's query statistics.
    pub fn with_request_tag(mut self, tag: impl Into<String>) -> Self {
        self.spec.options.request_tag = Some(tag.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.spec.options.priority = Some(priority);
        self
    }

    fn add_join(
        mut self,
        target: Result<&'a TableSchema>,
        local_key: &str,
        foreign_key: &str,
        kind: JoinKind,
        alias: Option<&str>,
    ) -> Self {
        let added = target.and_then(|target| {
            self.spec
                .plan
                .add(kind, target, local_key, foreign_key, alias)
                .map(|_| ())
        });
        if let Err(err) = added {
            self.fail(err);
        }
        self
    }

    /// Join the table of model `T` on `t0.<local_key> = tN.<foreign_key>`.
    pub fn join<T: Model>(self, local_key: &str, foreign_key: &str, kind: JoinKind) -> Self {
        let target = self.registry.schema_of::<T>();
        self.add_join(target, local_key, foreign_key, kind, None)
    }

    /// `INNER JOIN` shorthand for [`Query::join`].
    pub fn inner_join<T: Model>(self, local_key: &str, foreign_key: &str) -> Self {
        self.join::<T>(local_key, foreign_key, JoinKind::Inner)
    }

    /// `LEFT JOIN` shorthand for [`Query::join`].
    pub fn left_join<T: Model>(self, local_key: &str, foreign_key: &str) -> Self {
        self.join::<T>(local_key, foreign_key, JoinKind::Left)
    }

    /// Join a model given by model name (or table name).
    pub fn join_named(
        self,
        model: &str,
        local_key: &str,
        foreign_key: &str,
        kind: JoinKind,
    ) -> Self {
        let target = self.registry.resolve(model);
        self.add_join(target, local_key, foreign_key, kind, None)
    }

    /// Join a schema directly.
    pub fn join_schema(
        self,
        schema: &'a TableSchema,
        local_key: &str,
        foreign_key: &str,
        kind: JoinKind,
    ) -> Self {
        self.add_join(Ok(schema), local_key, foreign_key, kind, None)
    }

    /// Join a model (by model or table name) under an explicit alias.
    pub fn join_as(
        self,
        model: &str,
        alias: &str,
        local_key: &str,
        foreign_key: &str,
        kind: JoinKind,
    ) -> Self {
        let target = self.registry.resolve(model);
        self.add_join(target, local_key, foreign_key, kind, Some(alias))
    }

    /// The select statement this query runs.
    pub fn build(&self) -> Result<Statement> {
        self.check()?;
        self.spec.to_statement(&self.config.param_prefix)
    }

    /// The count statement for the same filters and joins.
    pub fn build_count(&self) -> Result<Statement> {
        self.check()?;
        self.spec.to_count_statement(&self.config.param_prefix)
    }

    fn fetch(&self, statement: &Statement) -> Result<ResultSet> {
        tracing::debug!(
            model = M::MODEL_NAME,
            in_transaction = self.txn.is_some(),
            "running query"
        );
        match self.txn {
            Some(txn) => txn.execute_sql(statement),
            None => run_in_snapshot(self.db, |snapshot| snapshot.execute_sql(statement)),
        }
    }

    fn run(&self, statement: &Statement) -> Result<Vec<M>> {
        let result = self.fetch(statement)?;
        materialize(
            self.spec.base(),
            result,
            self.spec.projection.as_deref(),
            &self.config,
        )
    }

    fn not_found(&self) -> Error {
        Error::RecordNotFound {
            model: M::MODEL_NAME.to_string(),
            criteria: describe_filters(&self.spec.filters),
        }
    }

    /// Every matching row.
    pub fn all(&self) -> Result<Vec<M>> {
        let statement = self.build()?;
        self.run(&statement)
    }

    /// First matching row. Applies `LIMIT 1` unless a limit is set.
    pub fn first(&self) -> Result<Option<M>> {
        self.check()?;
        let statement = self
            .spec
            .to_statement_with_limit(&self.config.param_prefix, self.spec.limit.or(Some(1)))?;
        Ok(self.run(&statement)?.into_iter().next())
    }

    /// Like [`Query::first`], failing with [`Error::RecordNotFound`].
    pub fn first_or_error(&self) -> Result<M> {
        self.first()?.ok_or_else(|| self.not_found())
    }

    /// Exactly one row: none is [`Error::RecordNotFound`], several are
    /// [`Error::MultipleResults`].
    pub fn one(&self) -> Result<M> {
        self.one_or_none()?.ok_or_else(|| self.not_found())
    }

    /// At most one row.
    pub fn one_or_none(&self) -> Result<Option<M>> {
        let mut rows = self.all()?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            count => Err(Error::MultipleResults {
                model: M::MODEL_NAME.to_string(),
                count,
            }),
        }
    }

    /// Number of matching rows, ignoring order, limit and offset.
    pub fn count(&self) -> Result<u64> {
        let statement = self.build_count()?;
        let result = self.fetch(&statement)?;
        let Some(value) = result.scalar() else {
            return Ok(0);
        };
        value
            .as_i64()
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| Error::Custom(format!("COUNT(*) returned {value}")))
    }

    /// Whether any row matches. Like [`Query::count`], order, limit and
    /// offset are ignored.
    pub fn exists(&self) -> Result<bool> {
        self.check()?;
        let mut spec = self.spec.clone();
        spec.order.clear();
        spec.offset = None;
        let statement = spec.to_statement_with_limit(&self.config.param_prefix, Some(1))?;
        Ok(!self.fetch(&statement)?.is_empty())
    }

    /// Filters added so far, in order.
    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.spec.filters
    }

    /// Column reference helper for qualified filters built by hand.
    #[must_use]
    pub fn column(table: &str, field: &str) -> ColumnRef {
        ColumnRef::Qualified {
            table: table.to_string(),
            column: field.to_string(),
        }
    }
}
