// File: src/query/mysql.rs
//
// MySQL driver. mysql_async is driven from a private current-thread tokio
// runtime so the driver presents the same blocking interface as the others.

use super::connection::{db_error, rewrite_string_concat, type_for_declared, Driver, ResultSet};
use super::{ColumnMap, SqlFragment};
use crate::ast::BinaryOp;
use crate::errors::QryError;
use crate::interpreter::Value;
use mysql_async::prelude::Queryable;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

fn map_mysql_value(value: mysql_async::Value) -> Value {
    match value {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => Value::Str(Arc::new(text)),
            Err(e) => Value::str(format!("[blob {} bytes]", e.as_bytes().len())),
        },
        mysql_async::Value::Int(number) => Value::Int(number),
        mysql_async::Value::UInt(number) => match i64::try_from(number) {
            Ok(number) => Value::Int(number),
            Err(_) => Value::Float(number as f64),
        },
        mysql_async::Value::Float(number) => Value::Float(number as f64),
        mysql_async::Value::Double(number) => Value::Float(number),
        mysql_async::Value::Date(year, month, day, hour, minute, second, micro) => Value::str(format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06}",
            year, month, day, hour, minute, second, micro
        )),
        mysql_async::Value::Time(is_negative, days, hours, minutes, seconds, micros) => {
            let sign = if is_negative { "-" } else { "" };
            Value::str(format!("{}{}d {:02}:{:02}:{:02}.{:06}", sign, days, hours, minutes, seconds, micros))
        }
    }
}

/// Renders string `+` as MySQL's `concat()`
pub fn mysql_concat(lhs: &str, rhs: &str) -> String {
    format!("concat({}, {})", lhs, rhs)
}

pub struct MysqlDriver {
    runtime: tokio::runtime::Runtime,
    conn: Mutex<mysql_async::Conn>,
    description: String,
}

impl fmt::Debug for MysqlDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MysqlDriver({})", self.description)
    }
}

impl MysqlDriver {
    pub fn connect(host: &str, port: u16, database: &str, user: &str, password: &str) -> Result<Self, QryError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| db_error("mysql", format!("failed to create async runtime: {}", e)))?;
        let opts = mysql_async::OptsBuilder::default()
            .ip_or_hostname(host)
            .tcp_port(port)
            .db_name(Some(database))
            .user(Some(user))
            .pass(Some(password));
        let conn = runtime
            .block_on(async { mysql_async::Conn::new(opts).await })
            .map_err(|e| db_error("mysql", e))?;
        Ok(MysqlDriver {
            runtime,
            conn: Mutex::new(conn),
            description: format!("{}@{}:{}/{}", user, host, port, database),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, mysql_async::Conn>, QryError> {
        self.conn.lock().map_err(|_| QryError::database("mysql: connection lock poisoned"))
    }
}

impl Driver for MysqlDriver {
    fn name(&self) -> &'static str {
        "mysql"
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn execute(&self, sql: &str) -> Result<u64, QryError> {
        let mut conn = self.lock()?;
        self.runtime
            .block_on(async {
                conn.query_drop(sql).await?;
                Ok::<_, mysql_async::Error>(conn.affected_rows())
            })
            .map_err(|e| db_error("mysql", e))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn query(&self, sql: &str) -> Result<ResultSet, QryError> {
        let mut conn = self.lock()?;
        let rows: Vec<mysql_async::Row> = self
            .runtime
            .block_on(async { conn.query(sql).await })
            .map_err(|e| db_error("mysql", e))?;

        // Column names come from the rows themselves; an empty result leaves
        // them for the caller to fill in
        let columns: Vec<String> = rows
            .first()
            .map(|row| row.columns_ref().iter().map(|c| c.name_str().to_string()).collect())
            .unwrap_or_default();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                (0..row.len())
                    .map(|index| row.take::<mysql_async::Value, _>(index).map(map_mysql_value).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Ok(ResultSet { columns, rows })
    }

    fn table_metadata(&self, table: &str) -> Result<ColumnMap, QryError> {
        let mut conn = self.lock()?;
        let rows: Vec<(String, String)> = self
            .runtime
            .block_on(async {
                conn.exec(
                    "select column_name, data_type from information_schema.columns \
                     where table_schema = database() and table_name = ? order by ordinal_position",
                    (table.to_string(),),
                )
                .await
            })
            .map_err(|e| db_error("mysql", e))?;
        if rows.is_empty() {
            return Err(QryError::database(format!("mysql: no such table: {}", table)));
        }
        Ok(rows.into_iter().map(|(name, ty)| (name, type_for_declared(&ty))).collect())
    }

    fn rewrite_binop(&self, op: BinaryOp, lhs: &SqlFragment, rhs: &SqlFragment) -> Option<SqlFragment> {
        rewrite_string_concat(op, lhs, rhs, mysql_concat)
    }
}
