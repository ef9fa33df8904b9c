// File: src/interpreter/native_functions/sql.rs
//
// The `data::sql` library: database connections and the query pipeline
// verbs. Verbs taking expressions declare them as `Expr` parameters, so
// they receive syntax and translate it to SQL against the columns the
// pipeline has at that point. Nothing runs against the database until
// `collect`, `count_rows` or `execute`.

use super::frame::DataFrame;
use crate::ast::Expr;
use crate::errors::QryError;
use crate::interpreter::environment::Environment;
use crate::interpreter::function::{Argument, BuiltinFunction, Call, Dispatch};
use crate::interpreter::library::LibraryDef;
use crate::interpreter::value::{type_names, Exported, Value};
use crate::interpreter::Runtime;
use crate::query::mysql::MysqlDriver;
use crate::query::postgres::PostgresDriver;
use crate::query::sqlite::SqliteDriver;
use crate::query::{
    translate, ColumnMap, Connection, Constraint, JoinKind, QueryPipeline, QueryStep, SqlFragment,
    TranslateContext,
};
use std::sync::Arc;
use tracing::debug;

const PIPELINE: &str = QueryPipeline::TYPE_NAME;
const CONNECTION: &str = Connection::TYPE_NAME;

/// Grouping keys captured by `group(..)` for a later `aggregate(..)`
#[derive(Debug, Clone)]
pub struct Grouping {
    pub by: Vec<Arc<Expr>>,
    pub named: Vec<(String, Arc<Expr>)>,
    /// Where interpolations inside the keys are evaluated
    pub env: Environment,
}

impl Exported for Grouping {
    const TYPE_NAME: &'static str = "Grouping";
}

fn syntax_from(call: &Call<'_>, index: usize) -> Result<Vec<Arc<Expr>>, QryError> {
    (index..call.args.len()).map(|i| call.syntax(i)).collect()
}

fn named_syntax(call: &Call<'_>) -> Result<Vec<(String, Arc<Expr>)>, QryError> {
    call.kwargs
        .iter()
        .map(|(name, value)| match value {
            Value::Syntax(expr) => Ok((name.clone(), expr.clone())),
            other => Err(QryError::type_mismatch(format!(
                "{}: argument '{}' expected {}, found {}",
                call.function,
                name,
                type_names::EXPR,
                other.type_name()
            ))),
        })
        .collect()
}

fn context<'a>(
    runtime: &'a Runtime,
    env: &'a Environment,
    columns: &'a ColumnMap,
    query: &'a QueryPipeline,
) -> TranslateContext<'a> {
    TranslateContext { runtime, env, columns, driver: query.connection.driver() }
}

fn translate_named(
    ctx: &TranslateContext<'_>,
    items: &[(String, Arc<Expr>)],
) -> Result<Vec<(String, SqlFragment)>, QryError> {
    items.iter().map(|(name, expr)| Ok((name.clone(), translate(ctx, expr, Constraint::Any)?))).collect()
}

fn expect_bool(function: &str, expr: &Expr, frag: SqlFragment) -> Result<SqlFragment, QryError> {
    if frag.ty == type_names::BOOL {
        Ok(frag)
    } else {
        Err(QryError::sql(format!("{}: condition {} must be Bool, found {}", function, expr, frag.ty)).or_line(expr.line))
    }
}

fn pipeline(query: QueryPipeline) -> Result<Dispatch, QryError> {
    Dispatch::resolved(Value::host(query))
}

fn port(call: &Call<'_>, index: usize) -> Result<u16, QryError> {
    let port = call.int(index)?;
    u16::try_from(port).map_err(|_| QryError::type_mismatch(format!("{}: invalid port {}", call.function, port)))
}

fn connect_sqlite(call: &mut Call<'_>) -> Result<Dispatch, QryError> {
    let path = call.string(0)?;
    let driver = if path == ":memory:" { SqliteDriver::in_memory()? } else { SqliteDriver::open(path)? };
    debug!(path, "connected to sqlite");
    Dispatch::resolved(Value::host(Connection::new(driver)))
}

fn connect_postgres(call: &mut Call<'_>) -> Result<Dispatch, QryError> {
    let driver = PostgresDriver::connect(call.string(0)?, port(call, 1)?, call.string(2)?, call.string(3)?, call.string(4)?)?;
    Dispatch::resolved(Value::host(Connection::new(driver)))
}

fn connect_mysql(call: &mut Call<'_>) -> Result<Dispatch, QryError> {
    let driver = MysqlDriver::connect(call.string(0)?, port(call, 1)?, call.string(2)?, call.string(3)?, call.string(4)?)?;
    Dispatch::resolved(Value::host(Connection::new(driver)))
}

fn execute(call: &mut Call<'_>) -> Result<Dispatch, QryError> {
    let affected = call.host::<Connection>(0)?.driver().execute(call.string(1)?)?;
    let affected = i64::try_from(affected).map_err(|_| QryError::runtime("execute: row count out of range"))?;
    Dispatch::resolved(affected)
}

fn get_table(call: &mut Call<'_>) -> Result<Dispatch, QryError> {
    let conn = call.host::<Connection>(0)?.clone();
    let table = call.string(1)?;
    let columns = conn.driver().table_metadata(table)?;
    debug!(table, columns = ?columns.names(), "loaded table metadata");
    pipeline(QueryPipeline::from_table(conn, table, columns))
}

fn filter(call: &mut Call<'_>) -> Result<Dispatch, QryError> {
    let query = call.host::<QueryPipeline>(0)?.clone();
    let exprs = syntax_from(call, 1)?;
    if exprs.is_empty() {
        return Err(QryError::type_mismatch("filter: expected at least one condition"));
    }
    let runtime = call.runtime;
    let env = call.env()?;
    let ctx = context(runtime, env, query.columns(), &query);

    let conditions = exprs
        .iter()
        .map(|expr| expect_bool("filter", expr, translate(&ctx, expr, Constraint::Any)?))
        .collect::<Result<Vec<_>, _>>()?;
    pipeline(query.chain(QueryStep::Filter { conditions }))
}

fn select(call: &mut Call<'_>) -> Result<Dispatch, QryError> {
    let query = call.host::<QueryPipeline>(0)?.clone();
    let exprs = syntax_from(call, 1)?;
    let named = named_syntax(call)?;
    if exprs.is_empty() && named.is_empty() {
        return Err(QryError::type_mismatch("select: expected at least one column"));
    }
    let runtime = call.runtime;
    let env = call.env()?;
    let ctx = context(runtime, env, query.columns(), &query);

    let columns = exprs
        .iter()
        .map(|expr| translate(&ctx, expr, Constraint::Column))
        .collect::<Result<Vec<_>, _>>()?;
    let computed = translate_named(&ctx, &named)?;
    pipeline(query.chain(QueryStep::Select { columns, computed, keep_all: false }))
}

fn mutate(call: &mut Call<'_>) -> Result<Dispatch, QryError> {
    let query = call.host::<QueryPipeline>(0)?.clone();
    let named = named_syntax(call)?;
    let runtime = call.runtime;
    let env = call.env()?;
    let ctx = context(runtime, env, query.columns(), &query);

    let computed = translate_named(&ctx, &named)?;
    pipeline(query.chain(QueryStep::Select { columns: Vec::new(), computed, keep_all: true }))
}

fn group(call: &mut Call<'_>) -> Result<Dispatch, QryError> {
    let by = syntax_from(call, 0)?;
    let named = named_syntax(call)?;
    if by.is_empty() && named.is_empty() {
        return Err(QryError::type_mismatch("group: expected at least one key"));
    }
    let env = call.env()?.child("group");
    Dispatch::resolved(Value::host(Grouping { by, named, env }))
}

fn aggregate(call: &mut Call<'_>) -> Result<Dispatch, QryError> {
    let query = call.host::<QueryPipeline>(0)?.clone();
    let grouping = call.host::<Grouping>(1)?.clone();
    let named = named_syntax(call)?;
    let runtime = call.runtime;

    let key_ctx = context(runtime, &grouping.env, query.columns(), &query);
    let keys = grouping
        .by
        .iter()
        .map(|expr| translate(&key_ctx, expr, Constraint::Column))
        .collect::<Result<Vec<_>, _>>()?;
    let computed_keys = translate_named(&key_ctx, &grouping.named)?;

    let env = call.env()?;
    let ctx = context(runtime, env, query.columns(), &query);
    let aggregations = translate_named(&ctx, &named)?;
    pipeline(query.chain(QueryStep::Aggregate { keys, computed_keys, aggregations }))
}

fn cross_join(call: &mut Call<'_>) -> Result<Dispatch, QryError> {
    let query = call.host::<QueryPipeline>(0)?;
    let rhs = call.host::<QueryPipeline>(1)?.clone();
    let (_, renames) = query.join_columns(&rhs);
    pipeline(query.chain(QueryStep::Join { kind: JoinKind::Cross, rhs, on: None, renames }))
}

fn left_join(call: &mut Call<'_>) -> Result<Dispatch, QryError> {
    let query = call.host::<QueryPipeline>(0)?.clone();
    let rhs = call.host::<QueryPipeline>(1)?.clone();
    let on_expr = call.syntax(2)?;
    let (columns, renames) = query.join_columns(&rhs);

    let runtime = call.runtime;
    let env = call.env()?;
    let ctx = context(runtime, env, &columns, &query);
    let on = expect_bool("left_join", &on_expr, translate(&ctx, &on_expr, Constraint::Any)?)?;
    pipeline(query.chain(QueryStep::Join { kind: JoinKind::Left, rhs, on: Some(on), renames }))
}

fn count_rows(call: &mut Call<'_>) -> Result<Dispatch, QryError> {
    let counted = call.host::<QueryPipeline>(0)?.chain(QueryStep::Count);
    let result = counted.connection.driver().query(&counted.render().sql)?;
    match result.rows.first().and_then(|row| row.first()) {
        Some(Value::Int(n)) => Dispatch::resolved(*n),
        other => Err(QryError::database(format!("count_rows: unexpected result {:?}", other))),
    }
}

fn collect(call: &mut Call<'_>) -> Result<Dispatch, QryError> {
    let query = call.host::<QueryPipeline>(0)?;
    let rendered = query.render();
    let result = query.connection.driver().query(&rendered.sql)?;
    debug!(rows = result.rows.len(), "collected query");
    let frame = DataFrame::from_result_set(result, &rendered.columns.names());
    Dispatch::resolved(Value::host(frame))
}

fn to_sql(call: &mut Call<'_>) -> Result<Dispatch, QryError> {
    Dispatch::resolved(call.host::<QueryPipeline>(0)?.render().sql)
}

fn connect_fn(name: &str, f: fn(&mut Call<'_>) -> Result<Dispatch, QryError>) -> BuiltinFunction {
    BuiltinFunction::new(name, f)
        .arg(Argument::new("host", type_names::STRING))
        .arg(Argument::new("port", type_names::INT))
        .arg(Argument::new("database", type_names::STRING))
        .arg(Argument::new("user", type_names::STRING))
        .arg(Argument::new("password", type_names::STRING))
        .returns(CONNECTION)
}

pub fn library() -> LibraryDef {
    LibraryDef::new("sql")
        .function(
            BuiltinFunction::new("connect_sqlite", connect_sqlite)
                .arg(Argument::new("path", type_names::STRING))
                .returns(CONNECTION),
        )
        .function(connect_fn("connect_postgres", connect_postgres))
        .function(connect_fn("connect_mysql", connect_mysql))
        .function(
            BuiltinFunction::new("execute", execute)
                .arg(Argument::new("conn", CONNECTION))
                .arg(Argument::new("sql", type_names::STRING))
                .returns(type_names::INT),
        )
        .function(
            BuiltinFunction::new("get_table", get_table)
                .arg(Argument::new("conn", CONNECTION))
                .arg(Argument::new("table", type_names::STRING))
                .returns(PIPELINE),
        )
        .function(
            BuiltinFunction::new("filter", filter)
                .with_caller_env()
                .arg(Argument::new("query", PIPELINE))
                .arg(Argument::new("conditions", type_names::EXPR).variadic())
                .returns(PIPELINE),
        )
        .function(
            BuiltinFunction::new("select", select)
                .with_caller_env()
                .arg(Argument::new("query", PIPELINE))
                .arg(Argument::new("columns", type_names::EXPR).variadic())
                .arg(Argument::new("computed", type_names::EXPR).keywords())
                .returns(PIPELINE),
        )
        .function(
            BuiltinFunction::new("mutate", mutate)
                .with_caller_env()
                .arg(Argument::new("query", PIPELINE))
                .arg(Argument::new("computed", type_names::EXPR).keywords())
                .returns(PIPELINE),
        )
        .function(
            BuiltinFunction::new("group", group)
                .with_caller_env()
                .arg(Argument::new("keys", type_names::EXPR).variadic())
                .arg(Argument::new("named", type_names::EXPR).keywords())
                .returns(Grouping::TYPE_NAME),
        )
        .function(
            BuiltinFunction::new("aggregate", aggregate)
                .with_caller_env()
                .arg(Argument::new("query", PIPELINE))
                .arg(Argument::new("grouping", Grouping::TYPE_NAME))
                .arg(Argument::new("aggregations", type_names::EXPR).keywords())
                .returns(PIPELINE),
        )
        .function(
            BuiltinFunction::new("cross_join", cross_join)
                .arg(Argument::new("query", PIPELINE))
                .arg(Argument::new("other", PIPELINE))
                .returns(PIPELINE),
        )
        .function(
            BuiltinFunction::new("left_join", left_join)
                .with_caller_env()
                .arg(Argument::new("query", PIPELINE))
                .arg(Argument::new("other", PIPELINE))
                .arg(Argument::new("on", type_names::EXPR))
                .returns(PIPELINE),
        )
        .function(
            BuiltinFunction::new("count_rows", count_rows)
                .arg(Argument::new("query", PIPELINE))
                .returns(type_names::INT),
        )
        .function(
            BuiltinFunction::new("collect", collect)
                .arg(Argument::new("query", PIPELINE))
                .returns(DataFrame::TYPE_NAME),
        )
        .function(
            BuiltinFunction::new("to_sql", to_sql)
                .arg(Argument::new("query", PIPELINE))
                .returns(type_names::STRING),
        )
        .specialize(
            "to_string",
            BuiltinFunction::new("to_string", to_sql)
                .arg(Argument::new("query", PIPELINE))
                .returns(type_names::STRING),
        )
}

#[cfg(test)]
mod tests {
    use crate::errors::ErrorKind;
    use crate::interpreter::{Interpreter, Value};
    use pretty_assertions::assert_eq;

    const SETUP: &str = r#"use data::*
conn <- connect_sqlite(":memory:")
execute(conn, "create table people (name text, age integer)")
execute(conn, "insert into people (name, age) values ('ruan', 26), ('ruanlater', 27), ('thirdperson', 27)")
people <- get_table(conn, "people")
"#;

    fn run(source: &str) -> Result<Value, crate::errors::QryError> {
        let mut interp = Interpreter::new().unwrap();
        interp.run(SETUP)?;
        interp.run(source)
    }

    #[test]
    fn test_to_sql_filter() {
        assert_eq!(
            run("people |> filter(age <= 26) |> to_sql()").unwrap(),
            Value::str("select * from (select * from people) qry_alias_1 where (age <= 26)")
        );
    }

    #[test]
    fn test_count_rows() {
        assert_eq!(run("people |> count_rows()").unwrap(), Value::Int(3));
        assert_eq!(run("people |> filter(age > 26) |> count_rows()").unwrap(), Value::Int(2));
    }

    #[test]
    fn test_filter_requires_bool() {
        let err = run("people |> filter(age + 1)").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SqlTranslation);
    }

    #[test]
    fn test_select_and_mutate_sql() {
        assert_eq!(
            run("people |> select(name, next = age + 1) |> to_sql()").unwrap(),
            Value::str("select name, (age + 1) as next from (select * from people) qry_alias_1")
        );
        assert_eq!(
            run("people |> mutate(twice = age * 2) |> to_sql()").unwrap(),
            Value::str("select *, (age * 2) as twice from (select * from people) qry_alias_1")
        );
        assert_eq!(run("people |> mutate(twice = age * 2) |> collect() |> num_cols()").unwrap(), Value::Int(3));
    }

    #[test]
    fn test_left_join_translates_on_merged_columns() {
        let source = r#"execute(conn, "create table pets (owner text, pet text)")
pets <- get_table(conn, "pets")
people |> left_join(pets, name == owner) |> to_sql()"#;
        assert_eq!(
            run(source).unwrap(),
            Value::str(
                "select * from (select * from people) qry_alias_1 left join (select * from pets) qry_alias_2 on (name = owner)"
            )
        );
    }

    #[test]
    fn test_unknown_table() {
        assert_eq!(run("get_table(conn, \"nope\")").unwrap_err().kind, ErrorKind::Database);
    }
}
