// File: src/interpreter/function.rs
//
// Callables for the qry interpreter: user-defined functions with captured
// closures, host-implemented builtins, and the calling-convention metadata
// (argument modes, eager vs deferred evaluation) both share.

use super::environment::Environment;
use super::library::Library;
use super::value::{from_host, type_names, Exported, HostValue, Value};
use super::Runtime;
use crate::ast::Expr;
use crate::errors::QryError;
use std::fmt;
use std::sync::Arc;

/// How a declared parameter consumes call-site arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgMode {
    /// One positional argument
    Standard,
    /// Every remaining positional argument
    Varargs,
    /// Every named argument; only valid as the last parameter
    Kwargs,
    /// A type selector used for generic dispatch rather than as a value
    TypeParam,
}

#[derive(Debug, Clone)]
pub struct Argument {
    pub name: String,
    pub ty: &'static str,
    pub mode: ArgMode,
    /// `false` for parameters declared `Expr`: they receive the unevaluated syntax
    pub eval_immediate: bool,
    /// Scalar-typed parameters are checked against their declared type
    pub convert: bool,
}

impl Argument {
    pub fn new(name: impl Into<String>, ty: &'static str) -> Self {
        let convert = matches!(
            ty,
            type_names::INT | type_names::FLOAT | type_names::STRING | type_names::BOOL
        );
        Argument {
            name: name.into(),
            ty,
            mode: ArgMode::Standard,
            eval_immediate: ty != type_names::EXPR,
            convert,
        }
    }

    pub fn variadic(mut self) -> Self {
        self.mode = ArgMode::Varargs;
        self
    }

    pub fn keywords(mut self) -> Self {
        self.mode = ArgMode::Kwargs;
        self
    }

    pub fn type_param(name: impl Into<String>) -> Self {
        Argument {
            name: name.into(),
            ty: type_names::TYPE,
            mode: ArgMode::TypeParam,
            eval_immediate: true,
            convert: false,
        }
    }
}

/// A function defined in qry source
pub struct Function {
    /// Named functions can refer to themselves from their body
    pub name: Option<String>,
    pub args: Vec<Argument>,
    pub return_type: &'static str,
    pub body: Arc<Vec<Expr>>,
    pub closure: Environment,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("return_type", &self.return_type)
            .finish()
    }
}

/// Result of invoking a host implementation
#[derive(Debug, Clone)]
pub enum Dispatch {
    Resolved(Value),
    /// The implementation declines these arguments
    Unimplemented,
}

impl Dispatch {
    /// Boxes a host result into a resolved dispatch
    pub fn resolved(value: impl Into<HostValue>) -> Result<Self, QryError> {
        Ok(Dispatch::Resolved(from_host(value.into())?))
    }
}

pub type NativeFn = dyn Fn(&mut Call<'_>) -> Result<Dispatch, QryError>;

/// A function implemented in Rust
pub struct BuiltinFunction {
    pub name: String,
    pub args: Vec<Argument>,
    pub returns: &'static str,
    /// Receives the caller's environment as an implicit first argument
    pub implicit_caller_env: bool,
    func: Arc<NativeFn>,
}

impl BuiltinFunction {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut Call<'_>) -> Result<Dispatch, QryError> + 'static,
    {
        BuiltinFunction {
            name: name.into(),
            args: Vec::new(),
            returns: type_names::ANY,
            implicit_caller_env: false,
            func: Arc::new(func),
        }
    }

    pub fn arg(mut self, argument: Argument) -> Self {
        self.args.push(argument);
        self
    }

    pub fn returns(mut self, ty: &'static str) -> Self {
        self.returns = ty;
        self
    }

    pub fn with_caller_env(mut self) -> Self {
        self.implicit_caller_env = true;
        self
    }

    /// Declared types of the value parameters, as used in dispatch signatures
    pub fn arg_types(&self) -> Vec<&'static str> {
        self.args
            .iter()
            .filter(|a| !matches!(a.mode, ArgMode::TypeParam | ArgMode::Kwargs))
            .map(|a| a.ty)
            .collect()
    }

    pub fn invoke(&self, call: &mut Call<'_>) -> Result<Dispatch, QryError> {
        (self.func)(call)
    }
}

impl fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinFunction")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("returns", &self.returns)
            .finish()
    }
}

/// Arguments and context handed to a builtin
pub struct Call<'a> {
    pub runtime: &'a Runtime,
    pub env: Option<&'a mut Environment>,
    pub function: String,
    pub args: Vec<Value>,
    pub kwargs: Vec<(String, Value)>,
}

impl<'a> Call<'a> {
    pub fn new(runtime: &'a Runtime, function: impl Into<String>, args: Vec<Value>) -> Self {
        Call { runtime, env: None, function: function.into(), args, kwargs: Vec::new() }
    }

    fn mismatch(&self, index: usize, expected: &str, actual: &Value) -> QryError {
        QryError::type_mismatch(format!(
            "{}: argument {} expected {}, found {}",
            self.function,
            index + 1,
            expected,
            actual.type_name()
        ))
    }

    pub fn arg(&self, index: usize) -> Result<&Value, QryError> {
        self.args.get(index).ok_or_else(|| {
            QryError::type_mismatch(format!(
                "{}: missing argument {} (got {})",
                self.function,
                index + 1,
                self.args.len()
            ))
        })
    }

    /// Positional arguments from `index` on
    pub fn rest(&self, index: usize) -> &[Value] {
        self.args.get(index..).unwrap_or(&[])
    }

    pub fn int(&self, index: usize) -> Result<i64, QryError> {
        match self.arg(index)? {
            Value::Int(n) => Ok(*n),
            other => Err(self.mismatch(index, type_names::INT, other)),
        }
    }

    pub fn float(&self, index: usize) -> Result<f64, QryError> {
        match self.arg(index)? {
            Value::Float(n) => Ok(*n),
            other => Err(self.mismatch(index, type_names::FLOAT, other)),
        }
    }

    pub fn string(&self, index: usize) -> Result<&str, QryError> {
        match self.arg(index)? {
            Value::Str(s) => Ok(s.as_str()),
            other => Err(self.mismatch(index, type_names::STRING, other)),
        }
    }

    pub fn bool(&self, index: usize) -> Result<bool, QryError> {
        match self.arg(index)? {
            Value::Bool(b) => Ok(*b),
            other => Err(self.mismatch(index, type_names::BOOL, other)),
        }
    }

    pub fn syntax(&self, index: usize) -> Result<Arc<Expr>, QryError> {
        match self.arg(index)? {
            Value::Syntax(expr) => Ok(expr.clone()),
            other => Err(self.mismatch(index, type_names::EXPR, other)),
        }
    }

    pub fn library(&self, index: usize) -> Result<Arc<Library>, QryError> {
        match self.arg(index)? {
            Value::Library(lib) => Ok(lib.clone()),
            other => Err(self.mismatch(index, type_names::LIBRARY, other)),
        }
    }

    pub fn type_value(&self, index: usize) -> Result<&'static str, QryError> {
        match self.arg(index)? {
            Value::Type(name) => Ok(name),
            other => Err(self.mismatch(index, type_names::TYPE, other)),
        }
    }

    pub fn host<T: Exported>(&self, index: usize) -> Result<&T, QryError> {
        let value = self.arg(index)?;
        value.as_host::<T>().ok_or_else(|| self.mismatch(index, T::TYPE_NAME, value))
    }

    /// The caller's environment; only present for builtins declared with one
    pub fn env(&mut self) -> Result<&mut Environment, QryError> {
        let function = &self.function;
        self.env
            .as_deref_mut()
            .ok_or_else(|| QryError::runtime(format!("{}: no caller environment available", function)))
    }
}
