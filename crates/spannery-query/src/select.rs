//! Statement assembly for SELECT and COUNT.

use spannery_core::{RequestOptions, Result, Statement, TableSchema};

use crate::compile::{ParamAllocator, compile_filters};
use crate::filter::{Filter, Order};
use crate::join::{BASE_ALIAS, JoinPlan};

/// Everything a select statement is assembled from. Fields and join keys
/// have already been checked against their schemas.
#[derive(Debug, Clone)]
pub struct SelectSpec<'s> {
    pub plan: JoinPlan<'s>,
    /// `None` selects `*`.
    pub projection: Option<Vec<&'static str>>,
    pub filters: Vec<Filter>,
    pub order: Vec<(&'static str, Order)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Index named in a `@{FORCE_INDEX=...}` hint on the base table.
    pub force_index: Option<String>,
    /// Attached to every statement built from this spec.
    pub options: RequestOptions,
}

impl<'s> SelectSpec<'s> {
    #[must_use]
    pub fn new(base: &'s TableSchema) -> Self {
        Self {
            plan: JoinPlan::new(base),
            projection: None,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            force_index: None,
            options: RequestOptions::default(),
        }
    }

    #[must_use]
    pub fn base(&self) -> &'s TableSchema {
        self.plan.base()
    }

    fn from_clause(&self) -> String {
        let mut sql = format!("FROM {}", self.base().table_name());
        if let Some(index) = &self.force_index {
            sql.push_str(&format!("@{{FORCE_INDEX={index}}}"));
        }
        sql.push_str(&format!(" AS {BASE_ALIAS}"));
        for join in self.plan.joins() {
            sql.push(' ');
            sql.push_str(&join.to_sql());
        }
        sql
    }

    /// `SELECT <projection> FROM <base> AS t0 [joins] [WHERE] [ORDER BY] [LIMIT] [OFFSET]`
    pub fn to_statement(&self, param_prefix: &str) -> Result<Statement> {
        self.to_statement_with_limit(param_prefix, self.limit)
    }

    /// Like [`SelectSpec::to_statement`] with the limit overridden.
    pub fn to_statement_with_limit(
        &self,
        param_prefix: &str,
        limit: Option<u64>,
    ) -> Result<Statement> {
        let mut params = ParamAllocator::new(param_prefix)?;
        let projection = match &self.projection {
            Some(fields) if !fields.is_empty() => fields
                .iter()
                .map(|f| format!("{BASE_ALIAS}.{f}"))
                .collect::<Vec<_>>()
                .join(", "),
            _ => "*".to_string(),
        };
        let mut sql = format!("SELECT {projection} {}", self.from_clause());
        if let Some(predicate) = compile_filters(&self.filters, &self.plan, &mut params)? {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate);
        }
        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|(field, dir)| format!("{BASE_ALIAS}.{field} {}", dir.as_sql()))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        tracing::debug!(sql = %sql, params = params.params().len(), "built select");
        Ok(Statement::with_params(sql, params.into_params()).with_options(self.options.clone()))
    }

    /// `SELECT COUNT(*) FROM <base> AS t0 [joins] [WHERE]`, with the same
    /// parameters the select would bind.
    pub fn to_count_statement(&self, param_prefix: &str) -> Result<Statement> {
        let mut params = ParamAllocator::new(param_prefix)?;
        let mut sql = format!("SELECT COUNT(*) {}", self.from_clause());
        if let Some(predicate) = compile_filters(&self.filters, &self.plan, &mut params)? {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate);
        }
        tracing::debug!(sql = %sql, params = params.params().len(), "built count");
        Ok(Statement::with_params(sql, params.into_params()).with_options(self.options.clone()))
    }
}
