// File: src/query/sqlite.rs
//
// SQLite driver backed by rusqlite.

use super::connection::{db_error, rewrite_string_concat, type_for_declared, Driver, ResultSet};
use super::{ColumnMap, SqlFragment};
use crate::ast::BinaryOp;
use crate::errors::QryError;
use crate::interpreter::Value;
use std::sync::{Arc, Mutex, MutexGuard};

fn map_sqlite_value(value: rusqlite::types::Value) -> Value {
    match value {
        rusqlite::types::Value::Integer(number) => Value::Int(number),
        rusqlite::types::Value::Real(number) => Value::Float(number),
        rusqlite::types::Value::Text(text) => Value::Str(Arc::new(text)),
        rusqlite::types::Value::Null => Value::Null,
        rusqlite::types::Value::Blob(bytes) => Value::str(format!("[blob {} bytes]", bytes.len())),
    }
}

#[derive(Debug)]
pub struct SqliteDriver {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteDriver {
    pub fn open(path: &str) -> Result<Self, QryError> {
        let conn = rusqlite::Connection::open(path).map_err(|e| db_error("sqlite", e))?;
        Ok(SqliteDriver { conn: Mutex::new(conn) })
    }

    pub fn in_memory() -> Result<Self, QryError> {
        let conn = rusqlite::Connection::open_in_memory().map_err(|e| db_error("sqlite", e))?;
        Ok(SqliteDriver { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, rusqlite::Connection>, QryError> {
        self.conn.lock().map_err(|_| QryError::database("sqlite: connection lock poisoned"))
    }
}

impl Driver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn execute(&self, sql: &str) -> Result<u64, QryError> {
        let conn = self.lock()?;
        let affected = conn.execute(sql, []).map_err(|e| db_error("sqlite", e))?;
        Ok(affected as u64)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn query(&self, sql: &str) -> Result<ResultSet, QryError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql).map_err(|e| db_error("sqlite", e))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();

        let mut rows = stmt.query([]).map_err(|e| db_error("sqlite", e))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|e| db_error("sqlite", e))? {
            let mut cells = Vec::with_capacity(width);
            for index in 0..width {
                let value: rusqlite::types::Value = row.get(index).map_err(|e| db_error("sqlite", e))?;
                cells.push(map_sqlite_value(value));
            }
            out.push(cells);
        }

        Ok(ResultSet { columns, rows: out })
    }

    fn table_metadata(&self, table: &str) -> Result<ColumnMap, QryError> {
        let conn = self.lock()?;
        let pragma = format!("PRAGMA table_info(\"{}\")", table.replace('"', "\"\""));
        let mut stmt = conn.prepare(&pragma).map_err(|e| db_error("sqlite", e))?;
        let columns = stmt
            .query_map([], |row| {
                let name: String = row.get(1)?;
                let declared: String = row.get(2)?;
                Ok((name, type_for_declared(&declared)))
            })
            .map_err(|e| db_error("sqlite", e))?
            .collect::<Result<ColumnMap, _>>()
            .map_err(|e| db_error("sqlite", e))?;

        if columns.is_empty() {
            return Err(QryError::database(format!("sqlite: no such table: {}", table)));
        }
        Ok(columns)
    }

    fn rewrite_binop(&self, op: BinaryOp, lhs: &SqlFragment, rhs: &SqlFragment) -> Option<SqlFragment> {
        rewrite_string_concat(op, lhs, rhs, |l, r| format!("({} || {})", l, r))
    }
}
