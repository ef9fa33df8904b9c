// File: src/interpreter/method.rs
//
// Multiple dispatch for the qry interpreter.
// A Method owns a default implementation plus implementations keyed by the
// exact runtime types of their arguments. Operators, conversions and the
// data-library reductions all go through here.

use super::function::{BuiltinFunction, Call, Dispatch};
use super::value::Value;
use crate::errors::QryError;
use ahash::AHashMap;
use std::sync::Arc;
use tracing::debug;

/// Joins argument types into the registry key for one implementation
pub fn signature<S: AsRef<str>>(types: &[S]) -> String {
    types.iter().map(|t| t.as_ref()).collect::<Vec<_>>().join("|")
}

#[derive(Debug)]
pub struct Method {
    pub name: String,
    pub default: Arc<BuiltinFunction>,
    impls: AHashMap<String, Arc<BuiltinFunction>>,
}

impl Method {
    pub fn new(default: BuiltinFunction) -> Self {
        Method { name: default.name.clone(), default: Arc::new(default), impls: AHashMap::new() }
    }

    /// Stores an implementation under its explicit type parameters followed
    /// by its declared argument types
    pub fn register(&mut self, imp: BuiltinFunction, type_params: &[&'static str]) {
        let mut types: Vec<&'static str> = type_params.to_vec();
        types.extend(imp.arg_types());
        let key = signature(&types);
        debug!(method = %self.name, signature = %key, "registering implementation");
        self.impls.insert(key, Arc::new(imp));
    }

    fn call_signature(arg_types: &[&str], type_params: &[&str]) -> String {
        let mut types: Vec<&str> = type_params.to_vec();
        types.extend_from_slice(arg_types);
        signature(&types)
    }

    /// The implementation for these exact types, if one was registered
    pub fn resolve_exact(&self, arg_types: &[&str], type_params: &[&str]) -> Option<Arc<BuiltinFunction>> {
        self.impls.get(&Self::call_signature(arg_types, type_params)).cloned()
    }

    /// The implementation for these types, or the default on a miss
    pub fn resolve(&self, arg_types: &[&str], type_params: &[&str]) -> Arc<BuiltinFunction> {
        match self.resolve_exact(arg_types, type_params) {
            Some(imp) => imp,
            None => {
                debug!(
                    method = %self.name,
                    signature = %Self::call_signature(arg_types, type_params),
                    "no implementation registered, using default"
                );
                self.default.clone()
            }
        }
    }

    pub fn implemented_signatures(&self) -> Vec<&str> {
        let mut sigs: Vec<&str> = self.impls.keys().map(String::as_str).collect();
        sigs.sort_unstable();
        sigs
    }

    /// Resolves by runtime argument types and invokes.
    ///
    /// When the default is chosen and type parameters were given, they are
    /// passed to it as leading `Type` values. If the chosen implementation
    /// declines, `fallback` is returned when present.
    pub fn call(
        &self,
        mut call: Call<'_>,
        type_params: &[&'static str],
        fallback: Option<Value>,
    ) -> Result<Value, QryError> {
        let arg_types: Vec<&str> = call.args.iter().map(Value::type_name).collect();
        let sig = Self::call_signature(&arg_types, type_params);
        let imp = self.resolve(&arg_types, type_params);

        if Arc::ptr_eq(&imp, &self.default) && !type_params.is_empty() {
            let mut args: Vec<Value> = type_params.iter().copied().map(Value::Type).collect();
            args.append(&mut call.args);
            call.args = args;
        }
        if !imp.implicit_caller_env {
            call.env = None;
        }

        match imp.invoke(&mut call)? {
            Dispatch::Resolved(value) => Ok(value),
            Dispatch::Unimplemented => match fallback {
                Some(value) => Ok(value),
                None => Err(QryError::unimplemented_method(&self.name, &sig)),
            },
        }
    }
}

/// All methods known to a runtime, by name
#[derive(Debug, Default)]
pub struct MethodRegistry {
    methods: AHashMap<String, Method>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a method; an existing declaration with the same name is kept
    pub fn declare(&mut self, default: BuiltinFunction) -> Arc<str> {
        let name: Arc<str> = Arc::from(default.name.as_str());
        if self.methods.contains_key(&default.name) {
            debug!(method = %name, "method already declared, keeping existing default");
        } else {
            self.methods.insert(default.name.clone(), Method::new(default));
        }
        name
    }

    pub fn specialize(
        &mut self,
        method: &str,
        imp: BuiltinFunction,
        type_params: &[&'static str],
    ) -> Result<Arc<str>, QryError> {
        match self.methods.get_mut(method) {
            Some(m) => {
                m.register(imp, type_params);
                Ok(Arc::from(method))
            }
            None => Err(QryError::name_not_found(method)
                .with_note("a method must be declared before it can be specialized")),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    pub fn lookup(&self, name: &str) -> Result<&Method, QryError> {
        self.get(name).ok_or_else(|| QryError::name_not_found(name))
    }
}
