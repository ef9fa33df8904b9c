// File: src/query/postgres.rs
//
// PostgreSQL driver backed by the synchronous `postgres` client.

use super::connection::{db_error, rewrite_string_concat, Driver, ResultSet};
use super::{ColumnMap, SqlFragment};
use crate::ast::BinaryOp;
use crate::errors::QryError;
use crate::interpreter::{type_names, Value};
use postgres::NoTls;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Maps a Postgres `udt_name` to a qry type
pub fn pg_type(udt_name: &str) -> &'static str {
    match udt_name {
        "int2" | "int4" | "int8" | "serial" | "bigserial" => type_names::INT,
        "float4" | "float8" | "numeric" => type_names::FLOAT,
        "bool" => type_names::BOOL,
        _ => type_names::STRING,
    }
}

fn map_postgres_cell(row: &postgres::Row, index: usize) -> Value {
    if let Ok(v) = row.try_get::<_, i32>(index) {
        Value::Int(i64::from(v))
    } else if let Ok(v) = row.try_get::<_, i64>(index) {
        Value::Int(v)
    } else if let Ok(v) = row.try_get::<_, i16>(index) {
        Value::Int(i64::from(v))
    } else if let Ok(v) = row.try_get::<_, f64>(index) {
        Value::Float(v)
    } else if let Ok(v) = row.try_get::<_, f32>(index) {
        Value::Float(v as f64)
    } else if let Ok(v) = row.try_get::<_, String>(index) {
        Value::Str(Arc::new(v))
    } else if let Ok(v) = row.try_get::<_, bool>(index) {
        Value::Bool(v)
    } else {
        Value::Null
    }
}

pub struct PostgresDriver {
    client: Mutex<postgres::Client>,
    description: String,
}

impl fmt::Debug for PostgresDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PostgresDriver({})", self.description)
    }
}

impl PostgresDriver {
    pub fn connect(host: &str, port: u16, database: &str, user: &str, password: &str) -> Result<Self, QryError> {
        let client = postgres::Config::new()
            .host(host)
            .port(port)
            .dbname(database)
            .user(user)
            .password(password)
            .connect(NoTls)
            .map_err(|e| db_error("postgres", e))?;
        Ok(PostgresDriver {
            client: Mutex::new(client),
            description: format!("{}@{}:{}/{}", user, host, port, database),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, postgres::Client>, QryError> {
        self.client.lock().map_err(|_| QryError::database("postgres: connection lock poisoned"))
    }
}

impl Driver for PostgresDriver {
    fn name(&self) -> &'static str {
        "postgres"
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn execute(&self, sql: &str) -> Result<u64, QryError> {
        self.lock()?.execute(sql, &[]).map_err(|e| db_error("postgres", e))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn query(&self, sql: &str) -> Result<ResultSet, QryError> {
        let mut client = self.lock()?;
        let statement = client.prepare(sql).map_err(|e| db_error("postgres", e))?;
        let columns: Vec<String> = statement.columns().iter().map(|c| c.name().to_string()).collect();
        let rows = client.query(&statement, &[]).map_err(|e| db_error("postgres", e))?;

        let rows = rows
            .iter()
            .map(|row| (0..columns.len()).map(|index| map_postgres_cell(row, index)).collect())
            .collect();
        Ok(ResultSet { columns, rows })
    }

    fn table_metadata(&self, table: &str) -> Result<ColumnMap, QryError> {
        let rows = self
            .lock()?
            .query(
                "select column_name, udt_name from information_schema.columns \
                 where table_name = $1 order by ordinal_position",
                &[&table],
            )
            .map_err(|e| db_error("postgres", e))?;
        if rows.is_empty() {
            return Err(QryError::database(format!("postgres: no such table: {}", table)));
        }

        let mut columns = ColumnMap::new();
        for row in rows {
            let name: String = row.try_get(0).map_err(|e| db_error("postgres", e))?;
            let udt: String = row.try_get(1).map_err(|e| db_error("postgres", e))?;
            columns.insert(name, pg_type(&udt));
        }
        Ok(columns)
    }

    fn rewrite_binop(&self, op: BinaryOp, lhs: &SqlFragment, rhs: &SqlFragment) -> Option<SqlFragment> {
        rewrite_string_concat(op, lhs, rhs, |l, r| format!("({} || {})", l, r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pg_type_names() {
        assert_eq!(pg_type("int4"), type_names::INT);
        assert_eq!(pg_type("int8"), type_names::INT);
        assert_eq!(pg_type("float8"), type_names::FLOAT);
        assert_eq!(pg_type("numeric"), type_names::FLOAT);
        assert_eq!(pg_type("bool"), type_names::BOOL);
        assert_eq!(pg_type("varchar"), type_names::STRING);
        assert_eq!(pg_type("bpchar"), type_names::STRING);
    }
}
