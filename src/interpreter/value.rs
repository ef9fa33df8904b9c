// File: src/interpreter/value.rs
//
// Runtime value types for the qry language.
// Defines the boxed values the evaluator manipulates, the host-object escape
// hatch library code uses to expose its own types, and the conversion between
// boxed values and plain host scalars.

use super::function::{BuiltinFunction, Function};
use super::library::Library;
use crate::ast::Expr;
use crate::errors::QryError;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Names of the built-in types. Type values, dispatch signatures and error
/// messages all use these spellings.
pub mod type_names {
    pub const INT: &str = "Int";
    pub const FLOAT: &str = "Float";
    pub const STRING: &str = "String";
    pub const BOOL: &str = "Bool";
    pub const NULL: &str = "Null";
    pub const ANY: &str = "Any";
    pub const EXPR: &str = "Expr";
    pub const TYPE: &str = "Type";
    pub const LIBRARY: &str = "Library";
    pub const FUNCTION: &str = "Function";
    pub const BUILTIN: &str = "BuiltinFunction";
    pub const METHOD: &str = "Method";
}

/// A value owned by library code rather than by the language core.
///
/// Implemented automatically for every [`Exported`] type.
pub trait HostObject: fmt::Debug + 'static {
    fn type_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
}

/// Marks a Rust type as a qry value with a fixed type name.
pub trait Exported: fmt::Debug + 'static {
    const TYPE_NAME: &'static str;
}

impl<T: Exported> HostObject for T {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(Arc<String>),
    Bool(bool),
    Null,
    /// A type used as a value: annotations, `cast(Int, ..)`, signatures
    Type(&'static str),
    /// An unevaluated expression handed to a deferred parameter
    Syntax(Arc<Expr>),
    Library(Arc<Library>),
    Function(Arc<Function>),
    Builtin(Arc<BuiltinFunction>),
    /// A multiple-dispatch method, resolved by name in the runtime registry
    Method(Arc<str>),
    Host(Arc<dyn HostObject>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(Arc::new(s.into()))
    }

    pub fn host<T: Exported>(object: T) -> Self {
        Value::Host(Arc::new(object))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => type_names::INT,
            Value::Float(_) => type_names::FLOAT,
            Value::Str(_) => type_names::STRING,
            Value::Bool(_) => type_names::BOOL,
            Value::Null => type_names::NULL,
            Value::Type(_) => type_names::TYPE,
            Value::Syntax(_) => type_names::EXPR,
            Value::Library(_) => type_names::LIBRARY,
            Value::Function(_) => type_names::FUNCTION,
            Value::Builtin(_) => type_names::BUILTIN,
            Value::Method(_) => type_names::METHOD,
            Value::Host(obj) => obj.type_name(),
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_) | Value::Str(_) | Value::Bool(_) | Value::Null)
    }

    /// Downcasts a host value to its concrete type
    pub fn as_host<T: Exported>(&self) -> Option<&T> {
        match self {
            Value::Host(obj) => obj.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }
}

// Manual Debug implementation for Value
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{:?}", n),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
            Value::Type(name) => write!(f, "{}", name),
            Value::Syntax(expr) => write!(f, "{}", expr),
            Value::Library(lib) => write!(f, "<library {}>", lib.name),
            Value::Function(func) => write!(f, "<fn {}>", func.name.as_deref().unwrap_or("anonymous")),
            Value::Builtin(func) => write!(f, "<builtin {}>", func.name),
            Value::Method(name) => write!(f, "<method {}>", name),
            Value::Host(obj) => write!(f, "{:?}", obj),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Syntax(a), Value::Syntax(b)) => a == b,
            (Value::Library(a), Value::Library(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Arc::ptr_eq(a, b),
            (Value::Method(a), Value::Method(b)) => a == b,
            (Value::Host(a), Value::Host(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A value as host code sees it: scalars unboxed, everything else opaque.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
    Exported(Value),
}

/// Unboxes scalars; other values pass through untouched.
pub fn to_host(value: &Value) -> HostValue {
    match value {
        Value::Int(n) => HostValue::Int(*n),
        Value::Float(n) => HostValue::Float(*n),
        Value::Str(s) => HostValue::Str(s.as_ref().clone()),
        Value::Bool(b) => HostValue::Bool(*b),
        Value::Null => HostValue::Null,
        other => HostValue::Exported(other.clone()),
    }
}

/// Boxes host scalars back into values.
///
/// An `Exported` wrapper is only valid around non-scalar values; wrapping a
/// scalar means the host produced something the language cannot represent.
pub fn from_host(value: HostValue) -> Result<Value, QryError> {
    Ok(match value {
        HostValue::Int(n) => Value::Int(n),
        HostValue::Float(n) => Value::Float(n),
        HostValue::Str(s) => Value::str(s),
        HostValue::Bool(b) => Value::Bool(b),
        HostValue::Null => Value::Null,
        HostValue::Exported(v) if v.is_scalar() => {
            return Err(QryError::unsupported_conversion(format!(
                "unrecognised host value: exported {} must be passed as a plain scalar",
                v.type_name()
            )))
        }
        HostValue::Exported(v) => v,
    })
}

impl From<i64> for HostValue {
    fn from(n: i64) -> Self {
        HostValue::Int(n)
    }
}

impl From<f64> for HostValue {
    fn from(n: f64) -> Self {
        HostValue::Float(n)
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::Str(s)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::Str(s.to_string())
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}

impl From<()> for HostValue {
    fn from(_: ()) -> Self {
        HostValue::Null
    }
}

impl From<Value> for HostValue {
    fn from(value: Value) -> Self {
        to_host(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[derive(Debug)]
    struct Marker;

    impl Exported for Marker {
        const TYPE_NAME: &'static str = "Marker";
    }

    #[test]
    fn test_scalar_round_trip() {
        for value in [Value::Int(3), Value::Float(1.5), Value::str("x"), Value::Bool(true), Value::Null] {
            assert_eq!(from_host(to_host(&value)).unwrap(), value);
        }
    }

    #[test]
    fn test_host_objects_pass_through() {
        let value = Value::host(Marker);
        assert_eq!(value.type_name(), "Marker");
        let host = to_host(&value);
        assert!(matches!(host, HostValue::Exported(_)));
        let back = from_host(host).unwrap();
        assert_eq!(back, value);
        assert!(back.as_host::<Marker>().is_some());
    }

    #[test]
    fn test_exported_scalar_is_rejected() {
        let err = from_host(HostValue::Exported(Value::Int(1))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedConversion);
    }
}
