// File: src/interpreter/native_functions/frame.rs
//
// The `data::frame` library: a row-oriented table of scalar cells, loaded
// from CSV files or materialised from query results.

use super::ops::{NUM_COLS, NUM_ROWS};
use super::vector::{FloatVector, IntVector};
use crate::errors::{ErrorKind, QryError};
use crate::interpreter::function::{Argument, BuiltinFunction, Call, Dispatch};
use crate::interpreter::library::LibraryDef;
use crate::interpreter::value::{type_names, Exported, Value};
use crate::query::ResultSet;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataFrame {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Exported for DataFrame {
    const TYPE_NAME: &'static str = "DataFrame";
}

impl DataFrame {
    /// Builds a frame from query results. Drivers that cannot report column
    /// names for an empty result leave `fallback` to name them.
    pub fn from_result_set(result: ResultSet, fallback: &[&str]) -> Self {
        let columns = if result.columns.is_empty() {
            fallback.iter().map(|c| c.to_string()).collect()
        } else {
            result.columns
        };
        DataFrame { columns, rows: result.rows }
    }

    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self, QryError> {
        let path = path.as_ref();
        let io_error = |e: csv::Error| QryError::new(ErrorKind::Io, format!("{}: {}", path.display(), e));

        let mut reader = csv::Reader::from_path(path).map_err(io_error)?;
        let columns: Vec<String> = reader.headers().map_err(io_error)?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(io_error)?;
            rows.push(record.iter().map(parse_cell).collect());
        }
        Ok(DataFrame { columns, rows })
    }

    fn column_index(&self, name: &str) -> Result<usize, QryError> {
        self.columns.iter().position(|c| c == name).ok_or_else(|| {
            QryError::name_not_found(name).with_note(format!("columns available: {}", self.columns.join(", ")))
        })
    }

    /// A numeric column as a vector: Int cells give an IntVector, any Float
    /// cell widens the whole column to a FloatVector
    pub fn column(&self, name: &str) -> Result<Value, QryError> {
        let index = self.column_index(name)?;
        let cells: Vec<&Value> = self.rows.iter().filter_map(|row| row.get(index)).collect();

        if let Some(ints) = cells.iter().map(|v| if let Value::Int(n) = v { Some(*n) } else { None }).collect() {
            return Ok(Value::host(IntVector(ints)));
        }
        let floats: Option<Vec<f64>> = cells
            .iter()
            .map(|v| match v {
                Value::Int(n) => Some(*n as f64),
                Value::Float(n) => Some(*n),
                _ => None,
            })
            .collect();
        match floats {
            Some(floats) => Ok(Value::host(FloatVector(floats))),
            None => Err(QryError::type_mismatch(format!("column '{}' is not numeric", name))),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let rows: Vec<serde_json::Value> = self
            .rows
            .iter()
            .map(|row| serde_json::Value::Array(row.iter().map(cell_json).collect()))
            .collect();
        serde_json::json!({ "columns": self.columns, "rows": rows })
    }
}

/// Infers a cell's type: Int, then Float, then String; empty cells are null
fn parse_cell(text: &str) -> Value {
    if text.is_empty() {
        Value::Null
    } else if let Ok(n) = text.parse::<i64>() {
        Value::Int(n)
    } else if let Ok(n) = text.parse::<f64>() {
        Value::Float(n)
    } else {
        Value::str(text)
    }
}

fn cell_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Int(n) => serde_json::Value::from(*n),
        Value::Float(n) => serde_json::Number::from_f64(*n).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null),
        Value::Str(s) => serde_json::Value::String(s.as_ref().clone()),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Null => serde_json::Value::Null,
        other => serde_json::Value::String(format!("{:?}", other)),
    }
}

fn frame_fn(name: &'static str, returns: &'static str, f: fn(&DataFrame) -> Value) -> BuiltinFunction {
    BuiltinFunction::new(name, move |call| Ok(Dispatch::Resolved(f(call.host::<DataFrame>(0)?))))
        .arg(Argument::new("frame", DataFrame::TYPE_NAME))
        .returns(returns)
}

fn read_csv(call: &mut Call<'_>) -> Result<Dispatch, QryError> {
    let frame = DataFrame::read_csv(call.string(0)?)?;
    tracing::debug!(rows = frame.rows.len(), columns = frame.columns.len(), "read csv");
    Dispatch::resolved(Value::host(frame))
}

fn column(call: &mut Call<'_>) -> Result<Dispatch, QryError> {
    let frame = call.host::<DataFrame>(0)?;
    Ok(Dispatch::Resolved(frame.column(call.string(1)?)?))
}

pub fn library() -> LibraryDef {
    LibraryDef::new("frame")
        .function(
            BuiltinFunction::new("read_csv", read_csv)
                .arg(Argument::new("path", type_names::STRING))
                .returns(DataFrame::TYPE_NAME),
        )
        .function(
            BuiltinFunction::new("column", column)
                .arg(Argument::new("frame", DataFrame::TYPE_NAME))
                .arg(Argument::new("name", type_names::STRING)),
        )
        .specialize(NUM_ROWS, frame_fn(NUM_ROWS, type_names::INT, |df| Value::Int(df.rows.len() as i64)))
        .specialize(NUM_COLS, frame_fn(NUM_COLS, type_names::INT, |df| Value::Int(df.columns.len() as i64)))
        .specialize("to_string", frame_fn("to_string", type_names::STRING, |df| Value::str(df.to_json().to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        DataFrame {
            columns: vec!["name".into(), "age".into(), "score".into()],
            rows: vec![
                vec![Value::str("a"), Value::Int(1), Value::Float(0.5)],
                vec![Value::str("b"), Value::Int(2), Value::Int(3)],
            ],
        }
    }

    #[test]
    fn test_parse_cell_inference() {
        assert_eq!(parse_cell("42"), Value::Int(42));
        assert_eq!(parse_cell("4.5"), Value::Float(4.5));
        assert_eq!(parse_cell("abc"), Value::str("abc"));
        assert_eq!(parse_cell(""), Value::Null);
    }

    #[test]
    fn test_column_vectors() {
        let df = frame();
        assert_eq!(df.column("age").unwrap().as_host::<IntVector>(), Some(&IntVector(vec![1, 2])));
        assert_eq!(df.column("score").unwrap().as_host::<FloatVector>(), Some(&FloatVector(vec![0.5, 3.0])));
        assert_eq!(df.column("name").unwrap_err().kind, ErrorKind::TypeMismatch);
        assert_eq!(df.column("nope").unwrap_err().kind, ErrorKind::NameNotFound);
    }

    #[test]
    fn test_json_rendering() {
        assert_eq!(
            frame().to_json().to_string(),
            r#"{"columns":["name","age","score"],"rows":[["a",1,0.5],["b",2,3]]}"#
        );
    }

    #[test]
    fn test_result_set_fallback_columns() {
        let df = DataFrame::from_result_set(ResultSet::default(), &["count"]);
        assert_eq!(df.columns, vec!["count"]);
        assert!(df.rows.is_empty());
    }

    #[test]
    fn test_missing_csv_is_io_error() {
        let err = DataFrame::read_csv("/definitely/not/here.csv").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Io);
    }
}
