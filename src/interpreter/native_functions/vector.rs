// File: src/interpreter/native_functions/vector.rs
//
// The `data::vector` library: homogeneous numeric vectors and their
// reductions.

use super::abstract_method;
use super::ops::LENGTH;
use crate::errors::QryError;
use crate::interpreter::function::{Argument, BuiltinFunction, Call, Dispatch};
use crate::interpreter::library::LibraryDef;
use crate::interpreter::value::{type_names, Exported, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct IntVector(pub Vec<i64>);

impl Exported for IntVector {
    const TYPE_NAME: &'static str = "IntVector";
}

#[derive(Debug, Clone, PartialEq)]
pub struct FloatVector(pub Vec<f64>);

impl Exported for FloatVector {
    const TYPE_NAME: &'static str = "FloatVector";
}

fn intvec(call: &mut Call<'_>) -> Result<Dispatch, QryError> {
    let items = (0..call.args.len()).map(|i| call.int(i)).collect::<Result<Vec<_>, _>>()?;
    Dispatch::resolved(Value::host(IntVector(items)))
}

/// Accepts Int and Float elements alike
fn floatvec(call: &mut Call<'_>) -> Result<Dispatch, QryError> {
    let mut items = Vec::with_capacity(call.args.len());
    for (i, value) in call.args.iter().enumerate() {
        match value {
            Value::Int(n) => items.push(*n as f64),
            Value::Float(n) => items.push(*n),
            other => {
                return Err(QryError::type_mismatch(format!(
                    "floatvec: element {} expected a number, found {}",
                    i + 1,
                    other.type_name()
                )))
            }
        }
    }
    Dispatch::resolved(Value::host(FloatVector(items)))
}

fn mean(values: &[f64]) -> Result<f64, QryError> {
    if values.is_empty() {
        return Err(QryError::runtime("mean of an empty vector"));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

fn render<T: std::fmt::Debug>(items: &[T]) -> String {
    let parts: Vec<String> = items.iter().map(|n| format!("{:?}", n)).collect();
    format!("[{}]", parts.join(", "))
}

fn on_ints(name: &'static str, returns: &'static str, f: fn(&[i64]) -> Result<Value, QryError>) -> BuiltinFunction {
    BuiltinFunction::new(name, move |call| Ok(Dispatch::Resolved(f(&call.host::<IntVector>(0)?.0)?)))
        .arg(Argument::new("vector", IntVector::TYPE_NAME))
        .returns(returns)
}

fn on_floats(name: &'static str, returns: &'static str, f: fn(&[f64]) -> Result<Value, QryError>) -> BuiltinFunction {
    BuiltinFunction::new(name, move |call| Ok(Dispatch::Resolved(f(&call.host::<FloatVector>(0)?.0)?)))
        .arg(Argument::new("vector", FloatVector::TYPE_NAME))
        .returns(returns)
}

pub fn library() -> LibraryDef {
    LibraryDef::new("vector")
        .function(
            BuiltinFunction::new("intvec", intvec)
                .arg(Argument::new("items", type_names::INT).variadic())
                .returns(IntVector::TYPE_NAME),
        )
        .function(
            BuiltinFunction::new("floatvec", floatvec)
                .arg(Argument::new("items", type_names::ANY).variadic())
                .returns(FloatVector::TYPE_NAME),
        )
        .method(abstract_method("sum", 1))
        .method(abstract_method("mean", 1))
        .specialize(
            "sum",
            on_ints("sum", type_names::INT, |v| {
                v.iter()
                    .try_fold(0i64, |acc, n| acc.checked_add(*n))
                    .map(Value::Int)
                    .ok_or_else(|| QryError::runtime("integer overflow in sum"))
            }),
        )
        .specialize("sum", on_floats("sum", type_names::FLOAT, |v| Ok(Value::Float(v.iter().sum()))))
        .specialize(
            "mean",
            on_ints("mean", type_names::FLOAT, |v| {
                let floats: Vec<f64> = v.iter().map(|n| *n as f64).collect();
                mean(&floats).map(Value::Float)
            }),
        )
        .specialize("mean", on_floats("mean", type_names::FLOAT, |v| mean(v).map(Value::Float)))
        .specialize(LENGTH, on_ints(LENGTH, type_names::INT, |v| Ok(Value::Int(v.len() as i64))))
        .specialize(LENGTH, on_floats(LENGTH, type_names::INT, |v| Ok(Value::Int(v.len() as i64))))
        .specialize("to_string", on_ints("to_string", type_names::STRING, |v| Ok(Value::str(render(v)))))
        .specialize("to_string", on_floats("to_string", type_names::STRING, |v| Ok(Value::str(render(v)))))
}

#[cfg(test)]
mod tests {
    use crate::errors::ErrorKind;
    use crate::interpreter::{Interpreter, Value};

    fn run(source: &str) -> Result<Value, crate::errors::QryError> {
        Interpreter::new().unwrap().run(&format!("use data::*\n{}", source))
    }

    #[test]
    fn test_reductions() {
        assert_eq!(run("intvec(1, 2, 3) |> sum()").unwrap(), Value::Int(6));
        assert_eq!(run("floatvec(1.5, 1.5, 3.5) |> sum()").unwrap(), Value::Float(6.5));
        assert_eq!(run("intvec(1, 2) |> mean()").unwrap(), Value::Float(1.5));
        assert_eq!(run("floatvec(0, 0) |> length()").unwrap(), Value::Int(2));
    }

    #[test]
    fn test_intvec_rejects_floats() {
        assert_eq!(run("intvec(1, 2.5)").unwrap_err().kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_empty_mean_is_an_error() {
        assert_eq!(run("intvec() |> mean()").unwrap_err().kind, ErrorKind::Runtime);
    }

    #[test]
    fn test_to_string() {
        assert_eq!(run("to_string(intvec(1, 2))").unwrap(), Value::str("[1, 2]"));
        assert_eq!(run("to_string(floatvec(1, 2.5))").unwrap(), Value::str("[1.0, 2.5]"));
    }
}
