// File: src/query/connection.rs
//
// The boundary between query pipelines and database drivers.

use super::{ColumnMap, SqlFragment};
use crate::ast::BinaryOp;
use crate::errors::QryError;
use crate::interpreter::{type_names, Exported, Value};
use std::fmt;
use std::sync::Arc;

/// Rows returned by a query, cells already converted to scalar values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// A database backend
pub trait Driver: fmt::Debug {
    fn name(&self) -> &'static str;

    /// Runs a statement, returning the number of rows it affected
    fn execute(&self, sql: &str) -> Result<u64, QryError>;

    fn query(&self, sql: &str) -> Result<ResultSet, QryError>;

    /// Column names and qry types of a table, in declaration order
    fn table_metadata(&self, table: &str) -> Result<ColumnMap, QryError>;

    /// Backend-specific translation of a binary operator, tried before the
    /// generic one
    fn rewrite_binop(&self, _op: BinaryOp, _lhs: &SqlFragment, _rhs: &SqlFragment) -> Option<SqlFragment> {
        None
    }
}

/// Rewrites string `+` with `render`, the backend's concatenation syntax
pub fn rewrite_string_concat(
    op: BinaryOp,
    lhs: &SqlFragment,
    rhs: &SqlFragment,
    render: fn(&str, &str) -> String,
) -> Option<SqlFragment> {
    if op == BinaryOp::Add && lhs.ty == type_names::STRING && rhs.ty == type_names::STRING {
        Some(SqlFragment::new(type_names::STRING, render(&lhs.sql, &rhs.sql)))
    } else {
        None
    }
}

/// Maps a declared SQL column type to a qry type by affinity
pub fn type_for_declared(declared: &str) -> &'static str {
    let declared = declared.to_ascii_lowercase();
    if declared.contains("bool") {
        type_names::BOOL
    } else if declared.contains("int") || declared == "serial" || declared == "bigserial" {
        type_names::INT
    } else if ["real", "floa", "doub", "numeric", "decimal"].iter().any(|t| declared.contains(t)) {
        type_names::FLOAT
    } else {
        type_names::STRING
    }
}

pub(crate) fn db_error(driver: &str, err: impl fmt::Display) -> QryError {
    QryError::database(format!("{}: {}", driver, err))
}

/// A shared handle to a driver, exposed to qry as `Connection`
#[derive(Clone)]
pub struct Connection {
    driver: Arc<dyn Driver>,
}

impl Connection {
    pub fn new(driver: impl Driver + 'static) -> Self {
        Connection { driver: Arc::new(driver) }
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connection({})", self.driver.name())
    }
}

impl Exported for Connection {
    const TYPE_NAME: &'static str = "Connection";
}
