// File: src/query/codegen.rs
//
// Lowers qry expressions to SQL text.
//
// Every translated node carries the qry type it evaluates to. Identifiers are
// typed by the pipeline's current columns; operators are typed by the method
// implementation registered for the exact operand types, so an expression
// that would fail to dispatch in the interpreter also fails to translate.

use super::connection::Driver;
use super::{ColumnMap, SqlFragment};
use crate::ast::{BinaryOp, CallExpr, Expr, ExprKind, UnaryOp};
use crate::errors::{find_closest_match, QryError};
use crate::interpreter::{type_names, Environment, Runtime, Value};
use ahash::AHashMap;
use once_cell::sync::Lazy;

/// Operators whose SQL spelling differs from the qry one
static SQL_SYMBOLS: Lazy<AHashMap<BinaryOp, &'static str>> = Lazy::new(|| {
    [(BinaryOp::Equal, "="), (BinaryOp::NotEqual, "<>"), (BinaryOp::And, "and"), (BinaryOp::Or, "or")]
        .into_iter()
        .collect()
});

/// What a translated expression is allowed to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    Any,
    /// A bare column name
    Column,
}

/// Everything translation reads: the runtime for operator typing and
/// interpolation, the environment interpolations evaluate in, the columns in
/// scope and the backend for operator rewrites
pub struct TranslateContext<'a> {
    pub runtime: &'a Runtime,
    pub env: &'a Environment,
    pub columns: &'a ColumnMap,
    pub driver: &'a dyn Driver,
}

impl<'a> TranslateContext<'a> {
    /// The same context with a different set of columns in scope
    pub fn with_columns(&self, columns: &'a ColumnMap) -> TranslateContext<'a> {
        TranslateContext { runtime: self.runtime, env: self.env, columns, driver: self.driver }
    }
}

/// Translates `expr` to SQL, typed against the columns in `ctx`
pub fn translate(ctx: &TranslateContext<'_>, expr: &Expr, constraint: Constraint) -> Result<SqlFragment, QryError> {
    if constraint == Constraint::Column && expr.as_ident().is_none() {
        return Err(QryError::sql(format!("expected a column name, found {}", expr.kind_name())).or_line(expr.line));
    }
    translate_node(ctx, expr).map_err(|e| e.or_line(expr.line))
}

fn translate_node(ctx: &TranslateContext<'_>, expr: &Expr) -> Result<SqlFragment, QryError> {
    match &expr.kind {
        ExprKind::Ident(name) => column(ctx.columns, name),
        ExprKind::Binary { op, lhs, rhs } => binary(ctx, *op, lhs, rhs),
        ExprKind::Unary { op, arg } => unary(ctx, *op, arg),
        ExprKind::Call(call) => function_call(ctx, call),
        ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Str(_) | ExprKind::Bool(_) | ExprKind::Null => {
            literal_expr(expr)
        }
        ExprKind::Interpolate(inner) => {
            let mut env = ctx.env.child("sql_interpolation");
            let value = ctx.runtime.eval_in_env(inner, &mut env)?;
            literal(&value)
        }
        ExprKind::Func(_) | ExprKind::Use { .. } => {
            Err(QryError::sql(format!("a {} cannot be translated to SQL", expr.kind_name())))
        }
    }
}

fn column(columns: &ColumnMap, name: &str) -> Result<SqlFragment, QryError> {
    match columns.get(name) {
        Some(ty) => Ok(SqlFragment::new(ty, name)),
        None => {
            let names = columns.names();
            let mut err = QryError::sql(format!("unknown column: {}", name))
                .with_note(format!("columns available: {}", names.join(", ")));
            if let Some(closest) = find_closest_match(name, names.iter().copied()) {
                err = err.with_suggestion(closest);
            }
            Err(err)
        }
    }
}

fn binary(ctx: &TranslateContext<'_>, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<SqlFragment, QryError> {
    let method_name = op
        .method_name()
        .ok_or_else(|| QryError::sql(format!("operator '{}' cannot be translated to SQL", op.symbol())))?;

    let lhs = translate(ctx, lhs, Constraint::Any)?;
    let rhs = translate(ctx, rhs, Constraint::Any)?;
    if let Some(rewritten) = ctx.driver.rewrite_binop(op, &lhs, &rhs) {
        return Ok(rewritten);
    }

    let imp = ctx
        .runtime
        .methods
        .lookup(method_name)?
        .resolve_exact(&[lhs.ty, rhs.ty], &[])
        .ok_or_else(|| {
            QryError::sql(format!("no SQL translation for {} {} {}", lhs.ty, op.symbol(), rhs.ty))
        })?;
    let symbol = SQL_SYMBOLS.get(&op).copied().unwrap_or_else(|| op.symbol());
    Ok(SqlFragment::new(imp.returns, format!("({} {} {})", lhs.sql, symbol, rhs.sql)))
}

fn unary(ctx: &TranslateContext<'_>, op: UnaryOp, arg: &Expr) -> Result<SqlFragment, QryError> {
    let arg = translate(ctx, arg, Constraint::Any)?;
    let imp = ctx
        .runtime
        .methods
        .lookup(op.method_name())?
        .resolve_exact(&[arg.ty], &[])
        .ok_or_else(|| QryError::sql(format!("no SQL translation for {}{}", op.symbol(), arg.ty)))?;
    let sql = match op {
        UnaryOp::NegateArith => format!("(-{})", arg.sql),
        UnaryOp::NegateLogical => format!("(not {})", arg.sql),
    };
    Ok(SqlFragment::new(imp.returns, sql))
}

/// Result type of a SQL function call
fn call_type(name: &str, args: &[SqlFragment]) -> &'static str {
    match name.to_ascii_lowercase().as_str() {
        "count" => type_names::INT,
        "avg" | "mean" => type_names::FLOAT,
        "sum" | "min" | "max" | "abs" => args.first().map(|a| a.ty).unwrap_or(type_names::ANY),
        "lower" | "upper" | "trim" => type_names::STRING,
        _ => type_names::ANY,
    }
}

fn function_call(ctx: &TranslateContext<'_>, call: &CallExpr) -> Result<SqlFragment, QryError> {
    let name = call.func.as_ident().ok_or_else(|| {
        QryError::sql(format!("SQL function name must be an identifier, found {}", call.func.kind_name()))
    })?;
    if let Some((arg, _)) = call.named.first() {
        return Err(QryError::sql(format!("{}: named argument '{}' cannot be translated to SQL", name, arg)));
    }

    let args = call
        .positional
        .iter()
        .map(|arg| translate(ctx, arg, Constraint::Any))
        .collect::<Result<Vec<_>, _>>()?;
    let rendered = if args.is_empty() && name.eq_ignore_ascii_case("count") {
        "*".to_string()
    } else {
        args.iter().map(|a| a.sql.as_str()).collect::<Vec<_>>().join(", ")
    };
    Ok(SqlFragment::new(call_type(name, &args), format!("{}({})", name, rendered)))
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn literal_expr(expr: &Expr) -> Result<SqlFragment, QryError> {
    let value = match &expr.kind {
        ExprKind::Int(n) => Value::Int(*n),
        ExprKind::Float(n) => Value::Float(*n),
        ExprKind::Str(s) => Value::str(s.clone()),
        ExprKind::Bool(b) => Value::Bool(*b),
        _ => Value::Null,
    };
    literal(&value)
}

/// Renders a scalar as a SQL literal
pub fn literal(value: &Value) -> Result<SqlFragment, QryError> {
    match value {
        Value::Int(n) => Ok(SqlFragment::new(type_names::INT, n.to_string())),
        Value::Float(n) if !n.is_finite() => {
            Err(QryError::sql(format!("the non-finite float {} cannot be used as a SQL literal", n)))
        }
        Value::Float(n) => Ok(SqlFragment::new(type_names::FLOAT, format!("{:?}", n))),
        Value::Str(s) => Ok(SqlFragment::new(type_names::STRING, quote(s))),
        Value::Bool(b) => Ok(SqlFragment::new(type_names::BOOL, b.to_string())),
        Value::Null => Err(QryError::sql("null literals cannot be translated to SQL")),
        other => Err(QryError::sql(format!("a {} value cannot be used as a SQL literal", other.type_name()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::interpreter::Interpreter;
    use crate::parser::parse_source;
    use crate::query::sqlite::SqliteDriver;
    use pretty_assertions::assert_eq;

    struct Fixture {
        interp: Interpreter,
        columns: ColumnMap,
        driver: SqliteDriver,
    }

    impl Fixture {
        fn new(setup: &str) -> Self {
            let mut interp = Interpreter::new().unwrap();
            interp.run(setup).unwrap();
            let columns = vec![("name".to_string(), type_names::STRING), ("age".to_string(), type_names::INT)]
                .into_iter()
                .collect();
            Fixture { interp, columns, driver: SqliteDriver::in_memory().unwrap() }
        }

        fn translate(&self, source: &str, constraint: Constraint) -> Result<SqlFragment, QryError> {
            let ctx = TranslateContext {
                runtime: self.interp.runtime(),
                env: self.interp.global_env(),
                columns: &self.columns,
                driver: &self.driver,
            };
            let exprs = parse_source(source).unwrap();
            translate(&ctx, &exprs[0], constraint)
        }
    }

    #[test]
    fn test_comparison_uses_sql_symbols() {
        let fx = Fixture::new("null");
        let frag = fx.translate("name != \"ruan\" && age == 26", Constraint::Any).unwrap();
        assert_eq!(frag, SqlFragment::new(type_names::BOOL, "((name <> 'ruan') and (age = 26))"));
    }

    #[test]
    fn test_arithmetic_is_typed_by_dispatch() {
        let fx = Fixture::new("null");
        assert_eq!(fx.translate("age * 2", Constraint::Any).unwrap().ty, type_names::INT);
        assert_eq!(fx.translate("-age", Constraint::Any).unwrap().sql, "(-age)");
    }

    #[test]
    fn test_mixed_types_have_no_translation() {
        let fx = Fixture::new("null");
        let err = fx.translate("age + name", Constraint::Any).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SqlTranslation);
        assert_eq!(err.message, "no SQL translation for Int + String");
    }

    #[test]
    fn test_string_concat_is_rewritten_by_driver() {
        let fx = Fixture::new("null");
        assert_eq!(fx.translate("name + \"!\"", Constraint::Any).unwrap().sql, "(name || '!')");
    }

    #[test]
    fn test_unknown_column_suggests_closest() {
        let fx = Fixture::new("null");
        let err = fx.translate("agee > 1", Constraint::Any).unwrap_err();
        assert_eq!(err.message, "unknown column: agee");
        assert_eq!(err.suggestion.as_deref(), Some("age"));
    }

    #[test]
    fn test_column_constraint() {
        let fx = Fixture::new("null");
        assert!(fx.translate("age", Constraint::Column).is_ok());
        let err = fx.translate("1 + 1", Constraint::Column).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SqlTranslation);
    }

    #[test]
    fn test_interpolation_reads_host_environment() {
        let fx = Fixture::new("max_age <- 30\nwho <- \"o'neil\"");
        assert_eq!(fx.translate("age <= {{max_age}}", Constraint::Any).unwrap().sql, "(age <= 30)");
        assert_eq!(fx.translate("name == {{who}}", Constraint::Any).unwrap().sql, "(name = 'o''neil')");
    }

    #[test]
    fn test_aggregate_call_types() {
        let fx = Fixture::new("null");
        assert_eq!(fx.translate("sum(age)", Constraint::Any).unwrap(), SqlFragment::new(type_names::INT, "sum(age)"));
        assert_eq!(fx.translate("count()", Constraint::Any).unwrap().sql, "count(*)");
        assert_eq!(fx.translate("avg(age)", Constraint::Any).unwrap().ty, type_names::FLOAT);
    }

    #[test]
    fn test_non_finite_floats_are_rejected() {
        let fx = Fixture::new("big <- cast(Float, \"inf\")");
        let err = fx.translate("age > {{big}}", Constraint::Any).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SqlTranslation);
        assert_eq!(literal(&Value::Float(f64::NAN)).unwrap_err().kind, ErrorKind::SqlTranslation);
        assert_eq!(literal(&Value::Float(f64::NEG_INFINITY)).unwrap_err().kind, ErrorKind::SqlTranslation);
        assert_eq!(literal(&Value::Float(2.5)).unwrap().sql, "2.5");
    }

    #[test]
    fn test_null_literal_is_rejected() {
        let fx = Fixture::new("null");
        assert_eq!(fx.translate("age == null", Constraint::Any).unwrap_err().kind, ErrorKind::SqlTranslation);
    }
}
