// File: src/query/mod.rs
//
// Query pipelines: an immutable chain of steps that renders to one SQL
// statement. Each step wraps the SQL rendered so far in an aliased subquery
// and tracks the column names and types the step produces, so expressions in
// later steps can be type-checked against them while the pipeline is built.

pub mod codegen;
pub mod connection;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use codegen::{translate, Constraint, TranslateContext};
pub use connection::{Connection, Driver, ResultSet};

use crate::interpreter::{type_names, Exported};
use std::fmt;

/// Ordered column names with their qry types
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMap {
    columns: Vec<(String, &'static str)>,
}

impl ColumnMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&'static str> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, ty)| *ty)
    }

    /// Adds a column, replacing the type of an existing one with the same name
    pub fn insert(&mut self, name: impl Into<String>, ty: &'static str) {
        let name = name.into();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = ty,
            None => self.columns.push((name, ty)),
        }
    }

    /// Appends every column of `other`. A name already taken gets a `_rhs`
    /// suffix; the `(old, new)` pairs of those renames are returned.
    pub fn merge_renaming(&mut self, other: &ColumnMap) -> Vec<(String, String)> {
        let mut renames = Vec::new();
        for (name, ty) in &other.columns {
            let mut renamed = name.clone();
            while self.get(&renamed).is_some() || (renamed != *name && other.get(&renamed).is_some()) {
                renamed.push_str("_rhs");
            }
            if renamed != *name {
                renames.push((name.clone(), renamed.clone()));
            }
            self.columns.push((renamed, *ty));
        }
        renames
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &'static str)> {
        self.columns.iter().map(|(n, ty)| (n.as_str(), *ty))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, &'static str)> for ColumnMap {
    fn from_iter<I: IntoIterator<Item = (String, &'static str)>>(iter: I) -> Self {
        let mut map = ColumnMap::new();
        for (name, ty) in iter {
            map.insert(name, ty);
        }
        map
    }
}

/// Translated SQL text and the qry type it evaluates to
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    pub ty: &'static str,
    pub sql: String,
}

impl SqlFragment {
    pub fn new(ty: &'static str, sql: impl Into<String>) -> Self {
        SqlFragment { ty, sql: sql.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Cross,
    Left,
}

impl JoinKind {
    fn keyword(&self) -> &'static str {
        match self {
            JoinKind::Cross => "cross",
            JoinKind::Left => "left",
        }
    }
}

#[derive(Debug, Clone)]
pub enum QueryStep {
    From { table: String, columns: ColumnMap },
    Filter { conditions: Vec<SqlFragment> },
    Join { kind: JoinKind, rhs: QueryPipeline, on: Option<SqlFragment>, renames: Vec<(String, String)> },
    Aggregate {
        keys: Vec<SqlFragment>,
        computed_keys: Vec<(String, SqlFragment)>,
        aggregations: Vec<(String, SqlFragment)>,
    },
    Select { columns: Vec<SqlFragment>, computed: Vec<(String, SqlFragment)>, keep_all: bool },
    Count,
}

/// State threaded through one render: the alias counter is shared by the
/// whole statement so nested and joined subqueries never collide
#[derive(Debug, Default)]
pub struct RenderState {
    alias_counter: usize,
}

impl RenderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps SQL as an aliased subquery
    pub fn subquery(&mut self, source: &str) -> String {
        self.alias_counter += 1;
        format!("({}) qry_alias_{}", source, self.alias_counter)
    }
}

fn named_list(items: &[(String, SqlFragment)]) -> Vec<String> {
    items.iter().map(|(name, frag)| format!("{} as {}", frag.sql, name)).collect()
}

impl QueryStep {
    /// The columns this step outputs given the columns it receives
    fn output_columns(&self, input: &ColumnMap) -> ColumnMap {
        match self {
            QueryStep::From { columns, .. } => columns.clone(),
            QueryStep::Filter { .. } => input.clone(),
            QueryStep::Join { rhs, .. } => {
                let mut columns = input.clone();
                columns.merge_renaming(rhs.columns());
                columns
            }
            QueryStep::Aggregate { keys, computed_keys, aggregations } => keys
                .iter()
                .map(|k| (k.sql.clone(), k.ty))
                .chain(computed_keys.iter().chain(aggregations).map(|(n, f)| (n.clone(), f.ty)))
                .collect(),
            QueryStep::Select { columns, computed, keep_all } => {
                let mut out = if *keep_all {
                    input.clone()
                } else {
                    columns.iter().map(|c| (c.sql.clone(), c.ty)).collect()
                };
                for (name, frag) in computed {
                    out.insert(name.clone(), frag.ty);
                }
                out
            }
            QueryStep::Count => std::iter::once(("count".to_string(), type_names::INT)).collect(),
        }
    }

    fn render(&self, source: &str, state: &mut RenderState) -> String {
        match self {
            QueryStep::From { table, .. } => format!("select * from {}", table),
            QueryStep::Filter { conditions } => {
                let cond: Vec<&str> = conditions.iter().map(|c| c.sql.as_str()).collect();
                format!("select * from {} where {}", state.subquery(source), cond.join(" and "))
            }
            QueryStep::Join { kind, rhs, on, renames } => {
                let lhs = state.subquery(source);
                let mut rhs_sql = rhs.render_with(state);
                if !renames.is_empty() {
                    let projection: Vec<String> = rhs
                        .columns()
                        .names()
                        .into_iter()
                        .map(|name| match renames.iter().find(|(old, _)| old == name) {
                            Some((_, new)) => format!("{} as {}", name, new),
                            None => name.to_string(),
                        })
                        .collect();
                    rhs_sql = format!("select {} from {}", projection.join(", "), state.subquery(&rhs_sql));
                }
                let rhs = state.subquery(&rhs_sql);
                let mut sql = format!("select * from {} {} join {}", lhs, kind.keyword(), rhs);
                if let Some(on) = on {
                    sql.push_str(&format!(" on {}", on.sql));
                }
                sql
            }
            QueryStep::Aggregate { keys, computed_keys, aggregations } => {
                let key_names: Vec<String> = keys
                    .iter()
                    .map(|k| k.sql.clone())
                    .chain(computed_keys.iter().map(|(name, _)| name.clone()))
                    .collect();
                let mut select: Vec<String> = keys.iter().map(|k| k.sql.clone()).collect();
                select.extend(named_list(computed_keys));
                select.extend(named_list(aggregations));
                format!(
                    "select {} from {} group by {}",
                    select.join(", "),
                    state.subquery(source),
                    key_names.join(", ")
                )
            }
            QueryStep::Select { columns, computed, keep_all } => {
                let mut select: Vec<String> = if *keep_all {
                    vec!["*".to_string()]
                } else {
                    columns.iter().map(|c| c.sql.clone()).collect()
                };
                select.extend(named_list(computed));
                format!("select {} from {}", select.join(", "), state.subquery(source))
            }
            QueryStep::Count => format!("select count(*) as count from {}", state.subquery(source)),
        }
    }
}

/// SQL text plus the columns it produces
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub sql: String,
    pub columns: ColumnMap,
}

/// An append-only chain of query steps over one connection
#[derive(Clone)]
pub struct QueryPipeline {
    pub connection: Connection,
    steps: Vec<QueryStep>,
    columns: ColumnMap,
}

impl fmt::Debug for QueryPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryPipeline({})", self.render().sql)
    }
}

impl Exported for QueryPipeline {
    const TYPE_NAME: &'static str = "QueryPipeline";
}

impl QueryPipeline {
    /// A pipeline reading every row of `table`
    pub fn from_table(connection: Connection, table: impl Into<String>, columns: ColumnMap) -> Self {
        let step = QueryStep::From { table: table.into(), columns: columns.clone() };
        QueryPipeline { connection, steps: vec![step], columns }
    }

    /// A new pipeline with `step` appended; `self` is unchanged
    pub fn chain(&self, step: QueryStep) -> QueryPipeline {
        let columns = step.output_columns(&self.columns);
        let mut steps = self.steps.clone();
        steps.push(step);
        QueryPipeline { connection: self.connection.clone(), steps, columns }
    }

    /// A join of `rhs` onto this pipeline, with clashing right-hand columns
    /// renamed. `on` is built against the returned column map.
    pub fn join_columns(&self, rhs: &QueryPipeline) -> (ColumnMap, Vec<(String, String)>) {
        let mut columns = self.columns.clone();
        let renames = columns.merge_renaming(rhs.columns());
        (columns, renames)
    }

    pub fn steps(&self) -> &[QueryStep] {
        &self.steps
    }

    /// Columns available to the next step
    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    fn render_with(&self, state: &mut RenderState) -> String {
        self.steps.iter().fold(String::new(), |sql, step| step.render(&sql, state))
    }

    #[tracing::instrument(level = "debug", skip_all)]
    pub fn render(&self) -> Rendered {
        let mut state = RenderState::new();
        let sql = self.render_with(&mut state);
        tracing::debug!(%sql, "rendered query");
        Rendered { sql, columns: self.columns.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::sqlite::SqliteDriver;
    use pretty_assertions::assert_eq;

    fn people() -> QueryPipeline {
        let columns: ColumnMap =
            vec![("name".to_string(), type_names::STRING), ("age".to_string(), type_names::INT)]
                .into_iter()
                .collect();
        let conn = Connection::new(SqliteDriver::in_memory().unwrap());
        QueryPipeline::from_table(conn, "people", columns)
    }

    fn cond(sql: &str) -> SqlFragment {
        SqlFragment::new(type_names::BOOL, sql)
    }

    #[test]
    fn test_filter_wraps_subquery() {
        let q = people().chain(QueryStep::Filter { conditions: vec![cond("(age <= 26)"), cond("(age > 1)")] });
        assert_eq!(
            q.render().sql,
            "select * from (select * from people) qry_alias_1 where (age <= 26) and (age > 1)"
        );
    }

    #[test]
    fn test_join_without_clashes_selects_both_sides() {
        let base = people();
        let pets: ColumnMap = vec![("owner".to_string(), type_names::STRING)].into_iter().collect();
        let rhs = QueryPipeline::from_table(base.connection.clone(), "pets", pets);
        let (columns, renames) = base.join_columns(&rhs);
        assert!(renames.is_empty());
        let q = base.chain(QueryStep::Join { kind: JoinKind::Cross, rhs, on: None, renames });
        assert_eq!(
            q.render().sql,
            "select * from (select * from people) qry_alias_1 cross join (select * from pets) qry_alias_2"
        );
        assert_eq!(q.columns(), &columns);
        assert_eq!(q.columns().names(), vec!["name", "age", "owner"]);
    }

    #[test]
    fn test_self_join_renames_right_hand_columns() {
        let base = people();
        let (_, renames) = base.join_columns(&base);
        let q = base.chain(QueryStep::Join { kind: JoinKind::Cross, rhs: base.clone(), on: None, renames });
        assert_eq!(
            q.render().sql,
            "select * from (select * from people) qry_alias_1 cross join \
             (select name as name_rhs, age as age_rhs from (select * from people) qry_alias_2) qry_alias_3"
        );
        assert_eq!(q.columns().names(), vec!["name", "age", "name_rhs", "age_rhs"]);
    }

    #[test]
    fn test_rename_skips_names_already_on_the_right() {
        let mut lhs: ColumnMap = vec![("a".to_string(), type_names::INT)].into_iter().collect();
        let rhs: ColumnMap =
            vec![("a".to_string(), type_names::INT), ("a_rhs".to_string(), type_names::STRING)]
                .into_iter()
                .collect();
        let renames = lhs.merge_renaming(&rhs);
        assert_eq!(renames, vec![("a".to_string(), "a_rhs_rhs".to_string())]);
        assert_eq!(lhs.names(), vec!["a", "a_rhs_rhs", "a_rhs"]);
        assert_eq!(lhs.get("a_rhs"), Some(type_names::STRING));
    }

    #[test]
    fn test_chain_leaves_original_untouched() {
        let base = people();
        let filtered = base.chain(QueryStep::Filter { conditions: vec![cond("(age > 1)")] });
        let counted = base.chain(QueryStep::Count);
        assert_eq!(base.steps().len(), 1);
        assert_eq!(filtered.steps().len(), 2);
        assert_eq!(base.render().sql, "select * from people");
        assert_eq!(counted.columns().names(), vec!["count"]);
    }

    #[test]
    fn test_aggregate_columns_and_sql() {
        let q = people().chain(QueryStep::Aggregate {
            keys: vec![SqlFragment::new(type_names::INT, "age")],
            computed_keys: vec![],
            aggregations: vec![("total".to_string(), SqlFragment::new(type_names::INT, "sum(age)"))],
        });
        assert_eq!(
            q.render().sql,
            "select age, sum(age) as total from (select * from people) qry_alias_1 group by age"
        );
        assert_eq!(q.columns().names(), vec!["age", "total"]);
    }

    #[test]
    fn test_select_keep_all_adds_columns() {
        let q = people().chain(QueryStep::Select {
            columns: vec![],
            computed: vec![("next".to_string(), SqlFragment::new(type_names::INT, "(age + 1)"))],
            keep_all: true,
        });
        assert_eq!(q.render().sql, "select *, (age + 1) as next from (select * from people) qry_alias_1");
        assert_eq!(q.columns().names(), vec!["name", "age", "next"]);
    }
}
