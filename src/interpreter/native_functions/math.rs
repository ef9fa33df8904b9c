// File: src/interpreter/native_functions/math.rs
//
// The `math` library: min, max and abs over Int and Float.
// Not attached by default; import it with `use math::*`.

use super::abstract_method;
use crate::interpreter::function::{Argument, BuiltinFunction, Dispatch};
use crate::interpreter::library::LibraryDef;
use crate::interpreter::value::type_names;

fn int_pair(name: &'static str, op: fn(i64, i64) -> i64) -> BuiltinFunction {
    BuiltinFunction::new(name, move |call| Dispatch::resolved(op(call.int(0)?, call.int(1)?)))
        .arg(Argument::new("a", type_names::INT))
        .arg(Argument::new("b", type_names::INT))
        .returns(type_names::INT)
}

fn float_pair(name: &'static str, op: fn(f64, f64) -> f64) -> BuiltinFunction {
    BuiltinFunction::new(name, move |call| Dispatch::resolved(op(call.float(0)?, call.float(1)?)))
        .arg(Argument::new("a", type_names::FLOAT))
        .arg(Argument::new("b", type_names::FLOAT))
        .returns(type_names::FLOAT)
}

pub fn library() -> LibraryDef {
    LibraryDef::new("math")
        .method(abstract_method("min", 2))
        .method(abstract_method("max", 2))
        .method(abstract_method("abs", 1))
        .specialize("min", int_pair("min", i64::min))
        .specialize("max", int_pair("max", i64::max))
        .specialize("min", float_pair("min", f64::min))
        .specialize("max", float_pair("max", f64::max))
        .specialize(
            "abs",
            BuiltinFunction::new("abs", |call| Dispatch::resolved(call.int(0)?.saturating_abs()))
                .arg(Argument::new("n", type_names::INT))
                .returns(type_names::INT),
        )
        .specialize(
            "abs",
            BuiltinFunction::new("abs", |call| Dispatch::resolved(call.float(0)?.abs()))
                .arg(Argument::new("n", type_names::FLOAT))
                .returns(type_names::FLOAT),
        )
}

#[cfg(test)]
mod tests {
    use crate::interpreter::{Interpreter, Value};

    fn run(source: &str) -> Value {
        Interpreter::new().unwrap().run(source).unwrap()
    }

    #[test]
    fn test_min_max() {
        assert_eq!(run("use math::*\nmin(3, 7)"), Value::Int(3));
        assert_eq!(run("use math::*\nmax(1.5, -2.0)"), Value::Float(1.5));
    }

    #[test]
    fn test_abs_through_library_access() {
        assert_eq!(run("use math\nmath::abs(-4)"), Value::Int(4));
    }

    #[test]
    fn test_math_is_not_attached() {
        assert!(Interpreter::new().unwrap().run("min(1, 2)").is_err());
    }
}
