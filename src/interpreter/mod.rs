// File: src/interpreter/mod.rs
//
// Tree-walking interpreter for the qry language.
// Evaluates qry programs by traversing the Abstract Syntax Tree (AST).
//
// The interpreter owns a Runtime (the method registry and the root
// environment holding every loaded library) and the global environment user
// code runs in. It supports:
// - Snapshot environments: closures capture bindings at definition time
// - Eager and deferred (syntax) parameters
// - Builtin calling conventions: varargs, kwargs, type parameters
// - Operators resolved by multiple dispatch on runtime types
// - The pipe operator and library imports with `use`
//
// Evaluation is synchronous and depth-first. A failure aborts the current
// top-level expression; bindings made by earlier ones are kept.

mod environment;
mod function;
mod library;
mod method;
pub mod native_functions;
mod value;

pub use environment::Environment;
pub use function::{ArgMode, Argument, BuiltinFunction, Call, Dispatch, Function};
pub use library::{Library, LibraryDef, Specialization};
pub use method::{signature, Method, MethodRegistry};
pub use value::{from_host, to_host, type_names, Exported, HostObject, HostValue, Value};

use crate::ast::{BinaryOp, Expr, ExprKind, FuncExpr, UseImports};
use crate::errors::QryError;
use crate::parser::parse_source;
use std::sync::Arc;
use tracing::{debug, trace};

/// Evaluated arguments for a builtin or method call
struct PreparedArgs {
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
    type_params: Vec<&'static str>,
}

/// Shared evaluation context threaded through the evaluator and every
/// builtin call
#[derive(Debug)]
pub struct Runtime {
    pub methods: MethodRegistry,
    root: Environment,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Runtime { methods: MethodRegistry::new(), root: Environment::new("root") }
    }

    /// The environment holding every loaded library by name
    pub fn root(&self) -> &Environment {
        &self.root
    }

    /// Evaluates one expression in `env`
    pub fn eval_in_env(&self, expr: &Expr, env: &mut Environment) -> Result<Value, QryError> {
        trace!(line = expr.line, node = expr.kind_name(), scope = %env.name, "eval");
        self.eval_expr(expr, env).map_err(|e| e.or_line(expr.line))
    }

    /// Evaluates expressions in order, returning the last value
    pub fn eval_sequence(&self, exprs: &[Expr], env: &mut Environment) -> Result<Value, QryError> {
        let mut result = Value::Null;
        for expr in exprs {
            result = self.eval_in_env(expr, env)?;
        }
        Ok(result)
    }

    fn eval_expr(&self, expr: &Expr, env: &mut Environment) -> Result<Value, QryError> {
        match &expr.kind {
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Float(n) => Ok(Value::Float(*n)),
            ExprKind::Str(s) => Ok(Value::str(s.clone())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Ident(name) => env.lookup(name),
            ExprKind::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs, env),
            ExprKind::Unary { op, arg } => {
                let value = self.eval_in_env(arg, env)?;
                self.call_method(op.method_name(), vec![value])
            }
            ExprKind::Func(func) => self.eval_func_literal(func, env),
            ExprKind::Call(call) => self.eval_call(&call.func, &call.positional, &call.named, env),
            ExprKind::Interpolate(inner) => self.eval_in_env(inner, env),
            ExprKind::Use { path, imports } => self.eval_use(path, imports, env),
        }
    }

    fn assign_target(target: &Expr) -> Result<&str, QryError> {
        target.as_ident().ok_or_else(|| {
            QryError::invalid_syntax(format!("can only assign to idents, found {}", target.kind_name()))
        })
    }

    fn eval_binary(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr, env: &mut Environment) -> Result<Value, QryError> {
        match op {
            BinaryOp::LAssign => {
                let name = Self::assign_target(lhs)?;
                let value = self.eval_in_env(rhs, env)?;
                env.bind(name, value.clone());
                Ok(value)
            }
            BinaryOp::RAssign => {
                let name = Self::assign_target(rhs)?;
                let value = self.eval_in_env(lhs, env)?;
                env.bind(name, value.clone());
                Ok(value)
            }
            BinaryOp::Access => {
                let target = self.eval_in_env(lhs, env)?;
                let member = rhs.as_ident().ok_or_else(|| {
                    QryError::invalid_syntax(format!("expected a member name after '::', found {}", rhs.kind_name()))
                })?;
                match target {
                    Value::Library(lib) => lib.environment.lookup(member).map_err(|e| {
                        QryError { message: format!("not found: {}::{}", lib.name, member), ..e }
                    }),
                    other => Err(QryError::type_mismatch(format!(
                        "cannot access member '{}' of {}, expected a library",
                        member,
                        other.type_name()
                    ))),
                }
            }
            BinaryOp::Pipe => match &rhs.kind {
                ExprKind::Call(call) => {
                    let mut positional = Vec::with_capacity(call.positional.len() + 1);
                    positional.push(lhs.clone());
                    positional.extend(call.positional.iter().cloned());
                    self.eval_call(&call.func, &positional, &call.named, env)
                }
                _ => Err(QryError::invalid_syntax(format!(
                    "the right side of '|>' must be a call, found {}",
                    rhs.kind_name()
                ))),
            },
            _ => {
                let left = self.eval_in_env(lhs, env)?;
                let right = self.eval_in_env(rhs, env)?;
                match op.method_name() {
                    Some(method) => self.call_method(method, vec![left, right]),
                    None => Err(QryError::invalid_syntax(format!("unsupported operator '{}'", op.symbol()))),
                }
            }
        }
    }

    fn eval_type_annotation(&self, expr: &Expr, what: &str, env: &mut Environment) -> Result<&'static str, QryError> {
        match self.eval_in_env(expr, env)? {
            Value::Type(ty) => Ok(ty),
            other => Err(QryError::type_mismatch(format!(
                "type annotation for {} must be a type, found {}",
                what,
                other.type_name()
            ))),
        }
    }

    fn eval_func_literal(&self, func: &FuncExpr, env: &mut Environment) -> Result<Value, QryError> {
        let mut args = Vec::with_capacity(func.params.len());
        for param in &func.params {
            let ty = match &param.ty {
                Some(expr) => self.eval_type_annotation(expr, &format!("'{}'", param.name), env)?,
                None => type_names::ANY,
            };
            args.push(Argument::new(param.name.clone(), ty));
        }
        let return_type = match &func.return_type {
            Some(expr) => self.eval_type_annotation(expr, "the return value", env)?,
            None => type_names::NULL,
        };

        let function = Value::Function(Arc::new(Function {
            name: func.name.clone(),
            args,
            return_type,
            body: func.body.clone(),
            closure: env.child("func_closure"),
        }));
        if let Some(name) = &func.name {
            env.bind(name.clone(), function.clone());
        }
        Ok(function)
    }

    /// Evaluates an argument for a parameter, or captures its syntax when the
    /// parameter is deferred
    fn argument_value(
        &self,
        function: &str,
        param: &Argument,
        expr: &Expr,
        env: &mut Environment,
    ) -> Result<Value, QryError> {
        if !param.eval_immediate {
            return Ok(Value::Syntax(Arc::new(expr.clone())));
        }
        let value = self.eval_in_env(expr, env)?;
        if param.convert && value.type_name() != param.ty {
            return Err(QryError::type_mismatch(format!(
                "{}: parameter '{}' expected {}, found {}",
                function,
                param.name,
                param.ty,
                value.type_name()
            ))
            .or_line(expr.line));
        }
        Ok(value)
    }

    fn eval_call(
        &self,
        func: &Expr,
        positional: &[Expr],
        named: &[(String, Expr)],
        env: &mut Environment,
    ) -> Result<Value, QryError> {
        match self.eval_in_env(func, env)? {
            Value::Function(function) => self.call_function(&function, positional, named, env),
            Value::Builtin(builtin) => {
                let prepared = self.prepare_args(&builtin, positional, named, env)?;
                let sig = signature(&prepared.args.iter().map(Value::type_name).collect::<Vec<_>>());
                let mut call = Call {
                    runtime: self,
                    env: if builtin.implicit_caller_env { Some(env) } else { None },
                    function: builtin.name.clone(),
                    args: prepared.args,
                    kwargs: prepared.kwargs,
                };
                match builtin.invoke(&mut call)? {
                    Dispatch::Resolved(value) => Ok(value),
                    Dispatch::Unimplemented => Err(QryError::unimplemented_method(&builtin.name, &sig)),
                }
            }
            Value::Method(name) => {
                let method = self.methods.lookup(&name)?;
                let prepared = self.prepare_args(&method.default, positional, named, env)?;
                let call = Call {
                    runtime: self,
                    env: Some(env),
                    function: method.name.clone(),
                    args: prepared.args,
                    kwargs: prepared.kwargs,
                };
                method.call(call, &prepared.type_params, None)
            }
            other => Err(QryError::type_mismatch(format!(
                "invalid function: {:?} ({}) is not callable",
                other,
                other.type_name()
            ))),
        }
    }

    /// Calls a user function: a fresh child of the closure, parameters bound
    /// eagerly or as syntax, body evaluated in order
    fn call_function(
        &self,
        function: &Arc<Function>,
        positional: &[Expr],
        named: &[(String, Expr)],
        env: &mut Environment,
    ) -> Result<Value, QryError> {
        let display_name = function.name.as_deref().unwrap_or("anonymous function");
        let given = positional.len() + named.len();
        if given != function.args.len() {
            return Err(QryError::type_mismatch(format!(
                "{} expects {} argument(s), got {}",
                display_name,
                function.args.len(),
                given
            )));
        }

        let mut slots: Vec<Option<&Expr>> = vec![None; function.args.len()];
        for (slot, expr) in slots.iter_mut().zip(positional) {
            *slot = Some(expr);
        }
        for (name, expr) in named {
            let index = function.args.iter().position(|a| &a.name == name).ok_or_else(|| {
                QryError::type_mismatch(format!("{}: unexpected named argument '{}'", display_name, name))
            })?;
            if slots[index].replace(expr).is_some() {
                return Err(QryError::type_mismatch(format!(
                    "{}: argument '{}' given more than once",
                    display_name, name
                )));
            }
        }

        let mut exec = function.closure.child("exec");
        if let Some(name) = &function.name {
            exec.bind(name.clone(), Value::Function(function.clone()));
        }
        for (param, slot) in function.args.iter().zip(slots) {
            let expr = slot.ok_or_else(|| {
                QryError::type_mismatch(format!("{}: missing argument '{}'", display_name, param.name))
            })?;
            let value = self.argument_value(display_name, param, expr, env)?;
            exec.bind(param.name.clone(), value);
        }

        self.eval_sequence(&function.body, &mut exec)
    }

    /// Matches call-site arguments against a builtin's declared parameters
    fn prepare_args(
        &self,
        builtin: &BuiltinFunction,
        positional: &[Expr],
        named: &[(String, Expr)],
        env: &mut Environment,
    ) -> Result<PreparedArgs, QryError> {
        let function = builtin.name.as_str();
        let mut prepared = PreparedArgs { args: Vec::new(), kwargs: Vec::new(), type_params: Vec::new() };
        let mut remaining = positional.iter();
        let mut named_used = vec![false; named.len()];

        for (index, param) in builtin.args.iter().enumerate() {
            match param.mode {
                ArgMode::Standard => {
                    let expr = match remaining.next() {
                        Some(expr) => expr,
                        None => {
                            let found = named.iter().position(|(name, _)| name == &param.name);
                            match found {
                                Some(i) => {
                                    named_used[i] = true;
                                    &named[i].1
                                }
                                None => {
                                    return Err(QryError::type_mismatch(format!(
                                        "{}: missing argument '{}'",
                                        function, param.name
                                    )))
                                }
                            }
                        }
                    };
                    prepared.args.push(self.argument_value(function, param, expr, env)?);
                }
                ArgMode::Varargs => {
                    for expr in remaining.by_ref() {
                        prepared.args.push(self.argument_value(function, param, expr, env)?);
                    }
                }
                ArgMode::TypeParam => {
                    let expr = remaining.next().ok_or_else(|| {
                        QryError::type_mismatch(format!("{}: missing type parameter '{}'", function, param.name))
                    })?;
                    match self.eval_in_env(expr, env)? {
                        Value::Type(ty) => prepared.type_params.push(ty),
                        other => {
                            return Err(QryError::type_mismatch(format!(
                                "{}: type parameter '{}' expected a type, found {}",
                                function,
                                param.name,
                                other.type_name()
                            )))
                        }
                    }
                }
                ArgMode::Kwargs => {
                    if index + 1 != builtin.args.len() {
                        return Err(QryError::runtime(format!(
                            "{}: keyword parameter '{}' must be the last parameter",
                            function, param.name
                        )));
                    }
                    for (i, (name, expr)) in named.iter().enumerate() {
                        if !named_used[i] {
                            named_used[i] = true;
                            let value = self.argument_value(function, param, expr, env)?;
                            prepared.kwargs.push((name.clone(), value));
                        }
                    }
                }
            }
        }

        let extra = remaining.count();
        if extra > 0 {
            return Err(QryError::type_mismatch(format!(
                "{}: expected {} argument(s), got {}",
                function,
                positional.len() - extra,
                positional.len()
            )));
        }
        if let Some(i) = named_used.iter().position(|used| !used) {
            return Err(QryError::type_mismatch(format!(
                "{}: unexpected named argument '{}'",
                function, named[i].0
            )));
        }

        Ok(prepared)
    }

    fn resolve_library(&self, path: &[String], env: &Environment) -> Result<Arc<Library>, QryError> {
        let mut current: Option<Arc<Library>> = None;
        for segment in path {
            let found = match &current {
                Some(lib) => lib.environment.get(segment).cloned(),
                None => env.get(segment).or_else(|| self.root.get(segment)).cloned(),
            };
            current = match found {
                Some(Value::Library(lib)) => Some(lib),
                Some(other) => {
                    return Err(QryError::type_mismatch(format!(
                        "cannot use {}: expected a library, found {}",
                        segment,
                        other.type_name()
                    )))
                }
                None => return Err(QryError::name_not_found(&path.join("::"))),
            };
        }
        current.ok_or_else(|| QryError::invalid_syntax("use requires a library path"))
    }

    fn eval_use(&self, path: &[String], imports: &UseImports, env: &mut Environment) -> Result<Value, QryError> {
        match imports {
            UseImports::Wildcard => {
                let lib = self.resolve_library(path, env)?;
                env.attach(&lib);
            }
            UseImports::Names(names) if path.is_empty() => {
                for name in names {
                    let lib = self.resolve_library(std::slice::from_ref(name), env)?;
                    env.bind(name.clone(), Value::Library(lib));
                }
            }
            UseImports::Names(names) => {
                let lib = self.resolve_library(path, env)?;
                for name in names {
                    let value = lib.environment.lookup(name)?;
                    env.bind(name.clone(), value);
                }
            }
        }
        Ok(Value::Null)
    }

    /// Calls a method by name with already evaluated arguments
    pub fn call_method(&self, name: &str, args: Vec<Value>) -> Result<Value, QryError> {
        let method = self.methods.lookup(name)?;
        method.call(Call::new(self, name, args), &[], None)
    }

    /// Like [`Runtime::call_method`], but returns `fallback` when no
    /// implementation accepts the arguments
    pub fn call_method_or(&self, name: &str, args: Vec<Value>, fallback: Value) -> Result<Value, QryError> {
        match self.methods.get(name) {
            Some(method) => method.call(Call::new(self, name, args), &[], Some(fallback)),
            None => Ok(fallback),
        }
    }

    /// Calls any callable value with already evaluated arguments
    pub fn apply(&self, callee: &Value, args: Vec<Value>) -> Result<Value, QryError> {
        match callee {
            Value::Method(name) => self.call_method(name, args),
            Value::Builtin(builtin) => {
                let sig = signature(&args.iter().map(Value::type_name).collect::<Vec<_>>());
                let mut call = Call::new(self, builtin.name.clone(), args);
                match builtin.invoke(&mut call)? {
                    Dispatch::Resolved(value) => Ok(value),
                    Dispatch::Unimplemented => Err(QryError::unimplemented_method(&builtin.name, &sig)),
                }
            }
            Value::Function(function) => {
                // Bind already evaluated values through literal placeholders
                let mut scratch = Environment::new("apply");
                let mut positional = Vec::with_capacity(args.len());
                for (i, value) in args.into_iter().enumerate() {
                    let name = format!("__arg{}", i);
                    scratch.bind(name.clone(), value);
                    positional.push(Expr::ident(name, 0));
                }
                self.call_function(function, &positional, &[], &mut scratch)
            }
            other => Err(QryError::type_mismatch(format!(
                "invalid function: {:?} ({}) is not callable",
                other,
                other.type_name()
            ))),
        }
    }

    /// Text for a value, via the `to_string` method when it applies
    pub fn stringify(&self, value: &Value) -> String {
        let fallback = Value::str(format!("{:?}", value));
        match self.call_method_or("to_string", vec![value.clone()], fallback) {
            Ok(Value::Str(s)) => s.as_ref().clone(),
            _ => format!("{:?}", value),
        }
    }
}

/// Interpreter maintains the runtime and the global environment of a session
pub struct Interpreter {
    runtime: Runtime,
    global_env: Environment,
    source_lines: Vec<String>,
}

impl Interpreter {
    /// An interpreter with the standard libraries loaded
    pub fn new() -> Result<Self, QryError> {
        let mut interp = Self::bare();
        for def in native_functions::standard_libraries() {
            interp.load_library(def)?;
        }
        Ok(interp)
    }

    /// An interpreter with no libraries loaded
    pub fn bare() -> Self {
        let runtime = Runtime::new();
        // Snapshot the root before any library is loaded: only attached
        // libraries and explicit `use` make library names visible
        let global_env = runtime.root.child("global");
        Interpreter { runtime, global_env, source_lines: Vec::new() }
    }

    /// Builds a library, registers it with the runtime and, when attached,
    /// merges its bindings into the global environment
    pub fn load_library(&mut self, def: LibraryDef) -> Result<Arc<Library>, QryError> {
        let attached = def.attached;
        let lib = def.build(&mut self.runtime.methods)?;
        self.runtime.root.bind(lib.name.clone(), Value::Library(lib.clone()));
        if attached {
            self.global_env.bind(lib.name.clone(), Value::Library(lib.clone()));
            self.global_env.attach(&lib);
        }
        debug!(library = %lib.name, attached, "loaded library");
        Ok(lib)
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn global_env(&self) -> &Environment {
        &self.global_env
    }

    /// Evaluates one top-level expression in the global environment
    pub fn eval(&mut self, expr: &Expr) -> Result<Value, QryError> {
        self.runtime.eval_in_env(expr, &mut self.global_env).map_err(|e| self.with_source_line(e))
    }

    /// Parses and evaluates `source`, returning the value of every top-level
    /// expression. Stops at the first failure.
    pub fn eval_source(&mut self, source: &str) -> Result<Vec<Value>, QryError> {
        self.source_lines = source.lines().map(str::to_string).collect();
        let exprs = parse_source(source).map_err(|e| self.with_source_line(e))?;
        let mut values = Vec::with_capacity(exprs.len());
        for expr in &exprs {
            values.push(self.eval(expr)?);
        }
        Ok(values)
    }

    /// Parses and evaluates `source`, returning the last value
    pub fn run(&mut self, source: &str) -> Result<Value, QryError> {
        Ok(self.eval_source(source)?.pop().unwrap_or(Value::Null))
    }

    pub fn stringify(&self, value: &Value) -> String {
        self.runtime.stringify(value)
    }

    fn with_source_line(&self, err: QryError) -> QryError {
        if err.source_line.is_some() || !err.location.is_known() {
            return err;
        }
        match self.source_lines.get(err.location.line - 1) {
            Some(line) => {
                let line = line.clone();
                err.with_source(line)
            }
            None => err,
        }
    }
}
