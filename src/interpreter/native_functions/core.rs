// File: src/interpreter/native_functions/core.rs
//
// The `core` library: type values, printing, assertions, library
// attachment, and the `to_string` and `cast` methods.

use super::abstract_method;
use crate::errors::QryError;
use crate::interpreter::function::{Argument, BuiltinFunction, Call, Dispatch};
use crate::interpreter::library::LibraryDef;
use crate::interpreter::value::{type_names, Value};

fn print(call: &mut Call<'_>) -> Result<Dispatch, QryError> {
    let text = call.runtime.stringify(call.arg(0)?);
    println!("{}", text);
    Dispatch::resolved(())
}

fn attach(call: &mut Call<'_>) -> Result<Dispatch, QryError> {
    let lib = call.library(0)?;
    call.env()?.attach(&lib);
    Dispatch::resolved(())
}

fn assert(call: &mut Call<'_>) -> Result<Dispatch, QryError> {
    let expr = call.syntax(0)?;
    let runtime = call.runtime;
    match runtime.eval_in_env(&expr, call.env()?)? {
        Value::Bool(true) => Dispatch::resolved(()),
        Value::Bool(false) => Err(QryError::assertion_failed(format!("assertion failed: {}", expr))),
        other => Err(QryError::assertion_failed("assert requires a boolean expression")
            .with_note(format!("{} evaluated to {}", expr, other.type_name()))),
    }
}

fn type_of(call: &mut Call<'_>) -> Result<Dispatch, QryError> {
    let name = call.arg(0)?.type_name();
    Ok(Dispatch::Resolved(Value::Type(name)))
}

fn to_string_impl(ty: &'static str, render: fn(&Value) -> String) -> BuiltinFunction {
    BuiltinFunction::new("to_string", move |call| Dispatch::resolved(render(call.arg(0)?)))
        .arg(Argument::new("value", ty))
        .returns(type_names::STRING)
}

/// Default for `cast`: the type parameter arrives as a leading type value.
/// Casting to the value's own type is the identity.
fn cast_default(call: &mut Call<'_>) -> Result<Dispatch, QryError> {
    let target = call.type_value(0)?;
    let value = call.arg(1)?;
    if value.type_name() == target {
        Ok(Dispatch::Resolved(value.clone()))
    } else {
        Ok(Dispatch::Unimplemented)
    }
}

fn cast_impl(
    from: &'static str,
    to: &'static str,
    convert: fn(&Value) -> Result<Value, QryError>,
) -> BuiltinFunction {
    BuiltinFunction::new("cast", move |call| Ok(Dispatch::Resolved(convert(call.arg(0)?)?)))
        .arg(Argument::new("value", from))
        .returns(to)
}

fn parse_failure(text: &str, target: &str) -> QryError {
    QryError::unsupported_conversion(format!("cannot cast \"{}\" to {}", text, target))
}

pub fn library() -> LibraryDef {
    let mut lib = LibraryDef::new("core").attached();
    for ty in [
        type_names::INT,
        type_names::FLOAT,
        type_names::STRING,
        type_names::BOOL,
        type_names::NULL,
        type_names::EXPR,
        type_names::ANY,
    ] {
        lib = lib.value(ty, Value::Type(ty));
    }

    lib.function(
        BuiltinFunction::new("print", print)
            .arg(Argument::new("value", type_names::ANY))
            .returns(type_names::NULL),
    )
    .function(
        BuiltinFunction::new("attach", attach)
            .with_caller_env()
            .arg(Argument::new("library", type_names::LIBRARY))
            .returns(type_names::NULL),
    )
    .function(
        BuiltinFunction::new("assert", assert)
            .with_caller_env()
            .arg(Argument::new("expr", type_names::EXPR))
            .returns(type_names::NULL),
    )
    .function(
        BuiltinFunction::new("type_of", type_of)
            .arg(Argument::new("value", type_names::ANY))
            .returns(type_names::TYPE),
    )
    .method(abstract_method("to_string", 1))
    .specialize("to_string", to_string_impl(type_names::INT, |v| format!("{:?}", v)))
    .specialize("to_string", to_string_impl(type_names::FLOAT, |v| format!("{:?}", v)))
    .specialize(
        "to_string",
        to_string_impl(type_names::STRING, |v| match v {
            Value::Str(s) => s.as_ref().clone(),
            other => format!("{:?}", other),
        }),
    )
    .specialize("to_string", to_string_impl(type_names::BOOL, |v| format!("{:?}", v)))
    .specialize("to_string", to_string_impl(type_names::NULL, |_| "null".to_string()))
    .specialize("to_string", to_string_impl(type_names::TYPE, |v| format!("{:?}", v)))
    .method(
        BuiltinFunction::new("cast", cast_default)
            .arg(Argument::type_param("T"))
            .arg(Argument::new("value", type_names::ANY)),
    )
    .generic(
        "cast",
        &[type_names::INT],
        cast_impl(type_names::FLOAT, type_names::INT, |v| match v {
            // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
            Value::Float(f) if f.is_finite() && f.trunc() >= i64::MIN as f64 && f.trunc() < i64::MAX as f64 => {
                Ok(Value::Int(f.trunc() as i64))
            }
            other => Err(QryError::unsupported_conversion(format!("cannot cast {:?} to Int", other))),
        }),
    )
    .generic(
        "cast",
        &[type_names::INT],
        cast_impl(type_names::STRING, type_names::INT, |v| match v {
            Value::Str(s) => s.trim().parse().map(Value::Int).map_err(|_| parse_failure(s, type_names::INT)),
            other => Err(QryError::unsupported_conversion(format!("cannot cast {:?} to Int", other))),
        }),
    )
    .generic(
        "cast",
        &[type_names::INT],
        cast_impl(type_names::BOOL, type_names::INT, |v| {
            Ok(Value::Int(matches!(v, Value::Bool(true)) as i64))
        }),
    )
    .generic(
        "cast",
        &[type_names::FLOAT],
        cast_impl(type_names::INT, type_names::FLOAT, |v| match v {
            Value::Int(n) => Ok(Value::Float(*n as f64)),
            other => Err(QryError::unsupported_conversion(format!("cannot cast {:?} to Float", other))),
        }),
    )
    .generic(
        "cast",
        &[type_names::FLOAT],
        cast_impl(type_names::STRING, type_names::FLOAT, |v| match v {
            Value::Str(s) => s.trim().parse().map(Value::Float).map_err(|_| parse_failure(s, type_names::FLOAT)),
            other => Err(QryError::unsupported_conversion(format!("cannot cast {:?} to Float", other))),
        }),
    )
    .generic("cast", &[type_names::STRING], cast_impl(type_names::INT, type_names::STRING, |v| {
        Ok(Value::str(format!("{:?}", v)))
    }))
    .generic("cast", &[type_names::STRING], cast_impl(type_names::FLOAT, type_names::STRING, |v| {
        Ok(Value::str(format!("{:?}", v)))
    }))
    .generic("cast", &[type_names::STRING], cast_impl(type_names::BOOL, type_names::STRING, |v| {
        Ok(Value::str(format!("{:?}", v)))
    }))
    .generic("cast", &[type_names::BOOL], cast_impl(type_names::INT, type_names::BOOL, |v| {
        Ok(Value::Bool(!matches!(v, Value::Int(0))))
    }))
}
