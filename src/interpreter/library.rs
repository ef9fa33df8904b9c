// File: src/interpreter/library.rs
//
// Libraries: named bundles of bindings that host code exports to qry.
// A LibraryDef describes the members; building it registers any methods and
// specialisations with the runtime and yields the library's environment.

use super::environment::Environment;
use super::function::BuiltinFunction;
use super::method::MethodRegistry;
use super::value::Value;
use crate::errors::QryError;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub struct Library {
    pub name: String,
    pub environment: Environment,
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Library({}: {})", self.name, self.environment.names().join(", "))
    }
}

/// A method implementation waiting to be registered
pub struct Specialization {
    pub method: String,
    pub type_params: Vec<&'static str>,
    pub imp: BuiltinFunction,
}

enum Member {
    Value(String, Value),
    Function(BuiltinFunction),
    Method(BuiltinFunction),
    Specialize(Specialization),
    Nested(LibraryDef),
}

/// Builder for a library's exported members
pub struct LibraryDef {
    pub name: String,
    /// Attached libraries are merged into the global environment on load
    pub attached: bool,
    members: Vec<Member>,
}

impl LibraryDef {
    pub fn new(name: impl Into<String>) -> Self {
        LibraryDef { name: name.into(), attached: false, members: Vec::new() }
    }

    pub fn attached(mut self) -> Self {
        self.attached = true;
        self
    }

    pub fn value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.members.push(Member::Value(name.into(), value));
        self
    }

    pub fn function(mut self, func: BuiltinFunction) -> Self {
        self.members.push(Member::Function(func));
        self
    }

    /// Declares a method whose default implementation is `default`
    pub fn method(mut self, default: BuiltinFunction) -> Self {
        self.members.push(Member::Method(default));
        self
    }

    /// Adds an implementation of `method` keyed by the implementation's own
    /// argument types
    pub fn specialize(self, method: impl Into<String>, imp: BuiltinFunction) -> Self {
        self.generic(method, &[], imp)
    }

    /// Adds an implementation selected by explicit type parameters as well
    /// as argument types, e.g. `cast(Int, 2.5)`
    pub fn generic(mut self, method: impl Into<String>, type_params: &[&'static str], imp: BuiltinFunction) -> Self {
        self.members.push(Member::Specialize(Specialization {
            method: method.into(),
            type_params: type_params.to_vec(),
            imp,
        }));
        self
    }

    /// Adds a sub-library. Its members are also re-exported from this one.
    pub fn nested(mut self, def: LibraryDef) -> Self {
        self.members.push(Member::Nested(def));
        self
    }

    pub fn build(self, methods: &mut MethodRegistry) -> Result<Arc<Library>, QryError> {
        let mut environment = Environment::new(self.name.clone());

        for member in self.members {
            match member {
                Member::Value(name, value) => environment.bind(name, value),
                Member::Function(func) => {
                    environment.bind(func.name.clone(), Value::Builtin(Arc::new(func)));
                }
                Member::Method(default) => {
                    let name = methods.declare(default);
                    environment.bind(name.to_string(), Value::Method(name));
                }
                Member::Specialize(spec) => {
                    let name = methods.specialize(&spec.method, spec.imp, &spec.type_params)?;
                    environment.bind(name.to_string(), Value::Method(name));
                }
                Member::Nested(def) => {
                    let nested = def.build(methods)?;
                    environment.attach(&nested);
                    environment.bind(nested.name.clone(), Value::Library(nested));
                }
            }
        }

        debug!(library = %self.name, members = environment.names().len(), "built library");
        Ok(Arc::new(Library { name: self.name, environment }))
    }
}
