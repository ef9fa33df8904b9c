// File: src/interpreter/native_functions/ops.rs
//
// The `ops` library: the methods operators dispatch to, specialised for the
// scalar types. Implementations declare accurate return types because the
// SQL compiler reads them to type translated expressions.

use super::abstract_method;
use crate::ast::operator_methods::*;
use crate::errors::QryError;
use crate::interpreter::function::{Argument, BuiltinFunction, Dispatch};
use crate::interpreter::library::LibraryDef;
use crate::interpreter::value::{type_names, Value};

pub const LENGTH: &str = "length";
pub const NUM_ROWS: &str = "num_rows";
pub const NUM_COLS: &str = "num_cols";

type IntOp = fn(i64, i64) -> Result<Value, QryError>;
type FloatOp = fn(f64, f64) -> Result<Value, QryError>;

fn int_op(name: &'static str, returns: &'static str, op: IntOp) -> BuiltinFunction {
    BuiltinFunction::new(name, move |call| Ok(Dispatch::Resolved(op(call.int(0)?, call.int(1)?)?)))
        .arg(Argument::new("lhs", type_names::INT))
        .arg(Argument::new("rhs", type_names::INT))
        .returns(returns)
}

fn float_op(name: &'static str, returns: &'static str, op: FloatOp) -> BuiltinFunction {
    BuiltinFunction::new(name, move |call| Ok(Dispatch::Resolved(op(call.float(0)?, call.float(1)?)?)))
        .arg(Argument::new("lhs", type_names::FLOAT))
        .arg(Argument::new("rhs", type_names::FLOAT))
        .returns(returns)
}

fn string_op(name: &'static str, returns: &'static str, op: fn(&str, &str) -> Value) -> BuiltinFunction {
    BuiltinFunction::new(name, move |call| Ok(Dispatch::Resolved(op(call.string(0)?, call.string(1)?))))
        .arg(Argument::new("lhs", type_names::STRING))
        .arg(Argument::new("rhs", type_names::STRING))
        .returns(returns)
}

fn bool_op(name: &'static str, op: fn(bool, bool) -> bool) -> BuiltinFunction {
    BuiltinFunction::new(name, move |call| Dispatch::resolved(op(call.bool(0)?, call.bool(1)?)))
        .arg(Argument::new("lhs", type_names::BOOL))
        .arg(Argument::new("rhs", type_names::BOOL))
        .returns(type_names::BOOL)
}

fn null_op(name: &'static str, result: bool) -> BuiltinFunction {
    BuiltinFunction::new(name, move |_| Dispatch::resolved(result))
        .arg(Argument::new("lhs", type_names::NULL))
        .arg(Argument::new("rhs", type_names::NULL))
        .returns(type_names::BOOL)
}

fn overflow(method: &str) -> QryError {
    QryError::runtime(format!("integer overflow in {}", method))
}

fn checked(result: Option<i64>, method: &str) -> Result<Value, QryError> {
    result.map(Value::Int).ok_or_else(|| overflow(method))
}

pub fn library() -> LibraryDef {
    let mut lib = LibraryDef::new("ops").attached();
    for name in [
        ADD,
        SUBTRACT,
        MULTIPLY,
        DIVIDE,
        EQUAL,
        NOT_EQUAL,
        GREATER_THAN,
        GREATER_THAN_OR_EQUAL,
        LESS_THAN,
        LESS_THAN_OR_EQUAL,
        LOGICAL_AND,
        LOGICAL_OR,
    ] {
        lib = lib.method(abstract_method(name, 2));
    }
    for name in [NEGATE_ARITHMETIC, NEGATE_LOGICAL, LENGTH, NUM_ROWS, NUM_COLS] {
        lib = lib.method(abstract_method(name, 1));
    }

    // Arithmetic
    let lib = lib
        .specialize(ADD, int_op(ADD, type_names::INT, |a, b| checked(a.checked_add(b), ADD)))
        .specialize(SUBTRACT, int_op(SUBTRACT, type_names::INT, |a, b| checked(a.checked_sub(b), SUBTRACT)))
        .specialize(MULTIPLY, int_op(MULTIPLY, type_names::INT, |a, b| checked(a.checked_mul(b), MULTIPLY)))
        .specialize(
            DIVIDE,
            int_op(DIVIDE, type_names::INT, |a, b| {
                if b == 0 {
                    return Err(QryError::division_by_zero());
                }
                checked(a.checked_div(b), DIVIDE)
            }),
        )
        .specialize(ADD, float_op(ADD, type_names::FLOAT, |a, b| Ok(Value::Float(a + b))))
        .specialize(SUBTRACT, float_op(SUBTRACT, type_names::FLOAT, |a, b| Ok(Value::Float(a - b))))
        .specialize(MULTIPLY, float_op(MULTIPLY, type_names::FLOAT, |a, b| Ok(Value::Float(a * b))))
        .specialize(
            DIVIDE,
            float_op(DIVIDE, type_names::FLOAT, |a, b| {
                if b == 0.0 {
                    return Err(QryError::division_by_zero());
                }
                Ok(Value::Float(a / b))
            }),
        )
        .specialize(ADD, string_op(ADD, type_names::STRING, |a, b| Value::str(format!("{}{}", a, b))));

    // Comparison
    let lib = lib
        .specialize(EQUAL, int_op(EQUAL, type_names::BOOL, |a, b| Ok(Value::Bool(a == b))))
        .specialize(NOT_EQUAL, int_op(NOT_EQUAL, type_names::BOOL, |a, b| Ok(Value::Bool(a != b))))
        .specialize(GREATER_THAN, int_op(GREATER_THAN, type_names::BOOL, |a, b| Ok(Value::Bool(a > b))))
        .specialize(
            GREATER_THAN_OR_EQUAL,
            int_op(GREATER_THAN_OR_EQUAL, type_names::BOOL, |a, b| Ok(Value::Bool(a >= b))),
        )
        .specialize(LESS_THAN, int_op(LESS_THAN, type_names::BOOL, |a, b| Ok(Value::Bool(a < b))))
        .specialize(
            LESS_THAN_OR_EQUAL,
            int_op(LESS_THAN_OR_EQUAL, type_names::BOOL, |a, b| Ok(Value::Bool(a <= b))),
        )
        .specialize(EQUAL, float_op(EQUAL, type_names::BOOL, |a, b| Ok(Value::Bool(a == b))))
        .specialize(NOT_EQUAL, float_op(NOT_EQUAL, type_names::BOOL, |a, b| Ok(Value::Bool(a != b))))
        .specialize(GREATER_THAN, float_op(GREATER_THAN, type_names::BOOL, |a, b| Ok(Value::Bool(a > b))))
        .specialize(
            GREATER_THAN_OR_EQUAL,
            float_op(GREATER_THAN_OR_EQUAL, type_names::BOOL, |a, b| Ok(Value::Bool(a >= b))),
        )
        .specialize(LESS_THAN, float_op(LESS_THAN, type_names::BOOL, |a, b| Ok(Value::Bool(a < b))))
        .specialize(
            LESS_THAN_OR_EQUAL,
            float_op(LESS_THAN_OR_EQUAL, type_names::BOOL, |a, b| Ok(Value::Bool(a <= b))),
        )
        .specialize(EQUAL, string_op(EQUAL, type_names::BOOL, |a, b| Value::Bool(a == b)))
        .specialize(NOT_EQUAL, string_op(NOT_EQUAL, type_names::BOOL, |a, b| Value::Bool(a != b)))
        .specialize(GREATER_THAN, string_op(GREATER_THAN, type_names::BOOL, |a, b| Value::Bool(a > b)))
        .specialize(
            GREATER_THAN_OR_EQUAL,
            string_op(GREATER_THAN_OR_EQUAL, type_names::BOOL, |a, b| Value::Bool(a >= b)),
        )
        .specialize(LESS_THAN, string_op(LESS_THAN, type_names::BOOL, |a, b| Value::Bool(a < b)))
        .specialize(
            LESS_THAN_OR_EQUAL,
            string_op(LESS_THAN_OR_EQUAL, type_names::BOOL, |a, b| Value::Bool(a <= b)),
        )
        .specialize(EQUAL, bool_op(EQUAL, |a, b| a == b))
        .specialize(NOT_EQUAL, bool_op(NOT_EQUAL, |a, b| a != b))
        .specialize(EQUAL, null_op(EQUAL, true))
        .specialize(NOT_EQUAL, null_op(NOT_EQUAL, false));

    // Logical and unary
    lib.specialize(LOGICAL_AND, bool_op(LOGICAL_AND, |a, b| a && b))
        .specialize(LOGICAL_OR, bool_op(LOGICAL_OR, |a, b| a || b))
        .specialize(
            NEGATE_LOGICAL,
            BuiltinFunction::new(NEGATE_LOGICAL, |call| Dispatch::resolved(!call.bool(0)?))
                .arg(Argument::new("value", type_names::BOOL))
                .returns(type_names::BOOL),
        )
        .specialize(
            NEGATE_ARITHMETIC,
            BuiltinFunction::new(NEGATE_ARITHMETIC, |call| {
                let n = call.int(0)?;
                Ok(Dispatch::Resolved(checked(n.checked_neg(), NEGATE_ARITHMETIC)?))
            })
            .arg(Argument::new("value", type_names::INT))
            .returns(type_names::INT),
        )
        .specialize(
            NEGATE_ARITHMETIC,
            BuiltinFunction::new(NEGATE_ARITHMETIC, |call| Dispatch::resolved(-call.float(0)?))
                .arg(Argument::new("value", type_names::FLOAT))
                .returns(type_names::FLOAT),
        )
        .specialize(
            LENGTH,
            BuiltinFunction::new(LENGTH, |call| Dispatch::resolved(call.string(0)?.chars().count() as i64))
                .arg(Argument::new("value", type_names::STRING))
                .returns(type_names::INT),
        )
}

#[cfg(test)]
mod tests {
    use crate::errors::ErrorKind;
    use crate::interpreter::{Interpreter, Value};

    fn run(source: &str) -> Result<Value, crate::errors::QryError> {
        Interpreter::new().unwrap().run(source)
    }

    #[test]
    fn test_integer_division_truncates() {
        assert_eq!(run("7 / 2").unwrap(), Value::Int(3));
        assert_eq!(run("-7 / 2").unwrap(), Value::Int(-3));
        assert_eq!(run("7.0 / 2.0").unwrap(), Value::Float(3.5));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(run("1 / 0").unwrap_err().kind, ErrorKind::DivisionByZero);
        assert_eq!(run("1.0 / 0.0").unwrap_err().kind, ErrorKind::DivisionByZero);
    }

    #[test]
    fn test_overflow_is_an_error() {
        let err = run("9223372036854775807 + 1").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Runtime);
    }

    #[test]
    fn test_mixed_numeric_types_are_unimplemented() {
        let err = run("1 + 1.5").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnimplementedMethod);
        assert_eq!(err.message, "unimplemented method \"add\" for signature: Int|Float");
    }

    #[test]
    fn test_string_comparison_and_length() {
        assert_eq!(run("\"abc\" < \"abd\"").unwrap(), Value::Bool(true));
        assert_eq!(run("length(\"héllo\")").unwrap(), Value::Int(5));
        assert_eq!(run("null == null").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_logical_operators_evaluate_both_sides() {
        assert_eq!(run("true && false").unwrap(), Value::Bool(false));
        assert_eq!(run("false || true").unwrap(), Value::Bool(true));
        let err = run("false && missing_name").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NameNotFound);
    }
}
