//! Property-based tests for the qry evaluator.
//!
//! These tests use proptest to generate values and identifiers and check
//! that evaluation laws hold for all of them:
//! 1. Closures see bindings as they were when the function was defined
//! 2. `a |> f(b)` is the same call as `f(a, b)`
//! 3. Host conversion round-trips every scalar
//! 4. Integer arithmetic is checked, never wrapping

use proptest::prelude::*;
use qry::errors::ErrorKind;
use qry::interpreter::{from_host, to_host, Interpreter, Value};
use qry::query::codegen::literal;

// -- Strategies --

/// Identifiers the lexer will not read as keywords or literals
fn identifier_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,12}")
        .expect("valid regex")
        .prop_filter("not a keyword", |s| !matches!(s.as_str(), "fn" | "use" | "true" | "false" | "null"))
}

fn small_int() -> impl Strategy<Value = i64> {
    -1_000_000i64..1_000_000
}

fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::Int),
        any::<f64>().prop_filter("NaN never equals itself", |f| !f.is_nan()).prop_map(Value::Float),
        ".{0,20}".prop_map(|s: String| Value::str(s)),
        any::<bool>().prop_map(Value::Bool),
        Just(Value::Null),
    ]
}

fn eval(source: &str) -> Value {
    let mut interp = Interpreter::new().expect("standard libraries load");
    match interp.run(source) {
        Ok(value) => value,
        Err(err) => panic!("{} failed: {}", source, err.render()),
    }
}

// -- Properties --

proptest! {
    #[test]
    fn closure_captures_definition_time_binding(before in small_int(), after in small_int()) {
        let source = format!("x <- {}\nf <- fn() {{ x }}\nx <- {}\nf()", before, after);
        prop_assert_eq!(eval(&source), Value::Int(before));
    }

    #[test]
    fn rebinding_is_visible_at_top_level(name in identifier_strategy(), first in small_int(), second in small_int()) {
        let source = format!("{name} <- {first}\n{name} <- {second}\n{name}");
        prop_assert_eq!(eval(&source), Value::Int(second));
    }

    #[test]
    fn pipe_matches_direct_call(a in small_int(), b in small_int()) {
        let direct = eval(&format!("sub <- fn(x, y) {{ x - y }}\nsub({}, {})", a, b));
        let piped = eval(&format!("sub <- fn(x, y) {{ x - y }}\n{} |> sub({})", a, b));
        prop_assert_eq!(direct, piped);
    }

    #[test]
    fn scalar_host_round_trip(value in scalar_strategy()) {
        prop_assert_eq!(from_host(to_host(&value)).unwrap(), value);
    }

    #[test]
    fn int_addition_is_checked(a in 0i64..=i64::MAX, b in 0i64..=i64::MAX) {
        let mut interp = Interpreter::new().unwrap();
        let result = interp.run(&format!("{} + {}", a, b));
        match a.checked_add(b) {
            Some(sum) => prop_assert_eq!(result.unwrap(), Value::Int(sum)),
            None => prop_assert_eq!(result.unwrap_err().kind, ErrorKind::Runtime),
        }
    }

    #[test]
    fn int_division_truncates_toward_zero(a in small_int(), b in small_int()) {
        prop_assume!(b != 0);
        let value = eval(&format!("({}) / ({})", a, b));
        prop_assert_eq!(value, Value::Int(a / b));
    }

    #[test]
    fn sql_string_literals_are_quoted(text in ".{0,30}") {
        let fragment = literal(&Value::str(text.clone())).unwrap();
        prop_assert!(fragment.sql.starts_with('\''));
        prop_assert!(fragment.sql.ends_with('\''));
        let inner = &fragment.sql[1..fragment.sql.len() - 1];
        prop_assert_eq!(inner.replace("''", "'"), text);
    }
}
