//! Join clauses and table alias allocation.
//!
//! The queried table is always `t0`. Each join takes the next free alias
//! `t1`, `t2`... in call order unless an explicit alias is given. Joining a
//! table twice yields two aliases; referring to such a table by name is then
//! ambiguous and has to go through the alias.

use spannery_core::{Error, Result, TableSchema, validate_identifier};

use crate::filter::JoinKind;

/// Alias of the queried table.
pub const BASE_ALIAS: &str = "t0";

/// One `JOIN` of a select statement.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause<'s> {
    pub kind: JoinKind,
    pub target: &'s TableSchema,
    pub alias: String,
    /// Field of the base table.
    pub local_key: &'static str,
    /// Field of the joined table.
    pub foreign_key: &'static str,
}

impl JoinClause<'_> {
    /// `<KIND> JOIN <table> AS <alias> ON t0.<local> = <alias>.<foreign>`
    #[must_use]
    pub fn to_sql(&self) -> String {
        format!(
            "{} {} AS {} ON {BASE_ALIAS}.{} = {}.{}",
            self.kind.as_sql(),
            self.target.table_name(),
            self.alias,
            self.local_key,
            self.alias,
            self.foreign_key
        )
    }
}

/// The base table and every join added so far.
#[derive(Debug, Clone)]
pub struct JoinPlan<'s> {
    base: &'s TableSchema,
    joins: Vec<JoinClause<'s>>,
    next_alias: usize,
}

impl<'s> JoinPlan<'s> {
    #[must_use]
    pub fn new(base: &'s TableSchema) -> Self {
        Self {
            base,
            joins: Vec::new(),
            next_alias: 1,
        }
    }

    #[must_use]
    pub fn base(&self) -> &'s TableSchema {
        self.base
    }

    #[must_use]
    pub fn joins(&self) -> &[JoinClause<'s>] {
        &self.joins
    }

    fn alias_in_use(&self, alias: &str) -> bool {
        alias == BASE_ALIAS || self.joins.iter().any(|j| j.alias == alias)
    }

    fn allocate(&mut self) -> String {
        loop {
            let candidate = format!("t{}", self.next_alias);
            self.next_alias += 1;
            if !self.alias_in_use(&candidate) {
                return candidate;
            }
        }
    }

    /// Add a join and return its alias.
    ///
    /// `local_key` must be a field of the base table and `foreign_key` a
    /// field of `target`. An explicit alias must be a plain identifier not
    /// already in use.
    pub fn add(
        &mut self,
        kind: JoinKind,
        target: &'s TableSchema,
        local_key: &str,
        foreign_key: &str,
        alias: Option<&str>,
    ) -> Result<&str> {
        let local_key = self.base.require_field(local_key)?.name;
        let foreign_key = target.require_field(foreign_key)?.name;
        let alias = match alias {
            Some(alias) => {
                validate_identifier("alias", alias)?;
                if self.alias_in_use(alias) {
                    return Err(Error::DuplicateAlias(alias.to_string()));
                }
                alias.to_string()
            }
            None => self.allocate(),
        };
        tracing::trace!(table = target.table_name(), alias = %alias, "allocated join alias");
        self.joins.push(JoinClause {
            kind,
            target,
            alias,
            local_key,
            foreign_key,
        });
        Ok(self.joins.last().map_or(BASE_ALIAS, |j| j.alias.as_str()))
    }

    /// Resolve a table name or alias to the alias and schema it stands for.
    ///
    /// Aliases win over table names. A table name matches the base table
    /// and every join of that table; more than one match is ambiguous.
    pub fn resolve(&self, table_or_alias: &str) -> Result<(&str, &'s TableSchema)> {
        if table_or_alias == BASE_ALIAS {
            return Ok((BASE_ALIAS, self.base));
        }
        if let Some(join) = self.joins.iter().find(|j| j.alias == table_or_alias) {
            return Ok((join.alias.as_str(), join.target));
        }

        let mut matches: Vec<(&str, &'s TableSchema)> = Vec::new();
        if self.base.table_name() == table_or_alias {
            matches.push((BASE_ALIAS, self.base));
        }
        matches.extend(
            self.joins
                .iter()
                .filter(|j| j.target.table_name() == table_or_alias)
                .map(|j| (j.alias.as_str(), j.target)),
        );
        match matches.as_slice() {
            [] => Err(Error::UnknownTable(table_or_alias.to_string())),
            [single] => Ok(*single),
            many => Err(Error::AmbiguousTable {
                table: table_or_alias.to_string(),
                aliases: many
                    .iter()
                    .map(|(alias, _)| *alias)
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    /// The `JOIN ...` clauses, space separated. Empty without joins.
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.joins
            .iter()
            .map(JoinClause::to_sql)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spannery_core::FieldInfo;

    fn org_user() -> TableSchema {
        TableSchema::declare("OrganizationUser", "OrganizationUsers")
            .field(FieldInfo::foreign_key("OrganizationID", "Organization").primary_key())
            .field(FieldInfo::foreign_key("UserID", "User").primary_key())
            .field(FieldInfo::string("Status"))
            .build()
            .unwrap()
    }

    fn users() -> TableSchema {
        TableSchema::declare("User", "Users")
            .field(FieldInfo::string("UserID").primary_key())
            .field(FieldInfo::string("Email"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_aliases_increase_in_call_order() {
        let base = org_user();
        let users = users();
        let mut plan = JoinPlan::new(&base);
        assert_eq!(plan.add(JoinKind::Inner, &users, "UserID", "UserID", None).unwrap(), "t1");
        assert_eq!(plan.add(JoinKind::Left, &users, "OrganizationID", "UserID", None).unwrap(), "t2");
        assert_eq!(
            plan.to_sql(),
            "INNER JOIN Users AS t1 ON t0.UserID = t1.UserID \
             LEFT JOIN Users AS t2 ON t0.OrganizationID = t2.UserID"
        );
    }

    #[test]
    fn test_resolve_by_name_and_alias() {
        let base = org_user();
        let users = users();
        let mut plan = JoinPlan::new(&base);
        plan.add(JoinKind::Inner, &users, "UserID", "UserID", None).unwrap();

        assert_eq!(plan.resolve("Users").unwrap().0, "t1");
        assert_eq!(plan.resolve("t1").unwrap().0, "t1");
        assert_eq!(plan.resolve("OrganizationUsers").unwrap().0, "t0");
        assert_eq!(plan.resolve("t0").unwrap().0, "t0");
        assert!(matches!(plan.resolve("Products"), Err(Error::UnknownTable(_))));
    }

    #[test]
    fn test_rejoin_makes_name_ambiguous() {
        let base = org_user();
        let users = users();
        let mut plan = JoinPlan::new(&base);
        plan.add(JoinKind::Inner, &users, "UserID", "UserID", None).unwrap();
        plan.add(JoinKind::Inner, &users, "UserID", "UserID", None).unwrap();

        let err = plan.resolve("Users").unwrap_err();
        assert_eq!(
            err.to_string(),
            "table `Users` is joined more than once (t1, t2); qualify by alias"
        );
        assert_eq!(plan.resolve("t2").unwrap().1.table_name(), "Users");
    }

    #[test]
    fn test_explicit_alias() {
        let base = org_user();
        let users = users();
        let mut plan = JoinPlan::new(&base);
        assert_eq!(plan.add(JoinKind::Inner, &users, "UserID", "UserID", Some("u")).unwrap(), "u");
        assert_eq!(plan.resolve("Users").unwrap().0, "u");

        let dup = plan.add(JoinKind::Inner, &users, "UserID", "UserID", Some("u"));
        assert!(matches!(dup, Err(Error::DuplicateAlias(_))));
        let base_alias = plan.add(JoinKind::Inner, &users, "UserID", "UserID", Some("t0"));
        assert!(matches!(base_alias, Err(Error::DuplicateAlias(_))));
        let bad = plan.add(JoinKind::Inner, &users, "UserID", "UserID", Some("u 2"));
        assert!(matches!(bad, Err(Error::ModelDefinition(_))));
    }

    #[test]
    fn test_automatic_alias_skips_explicit_ones() {
        let base = org_user();
        let users = users();
        let mut plan = JoinPlan::new(&base);
        plan.add(JoinKind::Inner, &users, "UserID", "UserID", Some("t1")).unwrap();
        assert_eq!(plan.add(JoinKind::Inner, &users, "UserID", "UserID", None).unwrap(), "t2");
    }

    #[test]
    fn test_join_keys_must_exist() {
        let base = org_user();
        let users = users();
        let mut plan = JoinPlan::new(&base);
        let err = plan.add(JoinKind::Inner, &users, "Missing", "UserID", None).unwrap_err();
        assert!(matches!(err, Error::UnknownField { .. }));
        let err = plan.add(JoinKind::Inner, &users, "UserID", "Missing", None).unwrap_err();
        assert!(matches!(err, Error::UnknownField { .. }));
        assert!(plan.joins().is_empty());
    }
}
