// File: src/interpreter/environment.rs
//
// Snapshot environments for the qry interpreter.
// A child environment starts as a copy of its parent's bindings. Later
// bindings on either side are invisible to the other, which is what gives
// closures their capture-at-definition semantics.

use super::library::Library;
use super::value::Value;
use crate::errors::{find_closest_match, QryError};
use ahash::AHashMap;

/// Variable storage for one logical scope
///
/// # Examples
///
/// ```ignore
/// let mut global = Environment::new("global");
/// global.bind("x", Value::Int(1));
///
/// let closure = global.child("func_closure");   // snapshot: x = 1
/// global.bind("x", Value::Int(2));
/// assert_eq!(closure.get("x"), Some(&Value::Int(1)));
/// ```
#[derive(Clone, Debug)]
pub struct Environment {
    pub name: String,
    lineage: Vec<String>,
    state: AHashMap<String, Value>,
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Environment { name: name.into(), lineage: Vec::new(), state: AHashMap::new() }
    }

    /// Creates a child holding a copy of every binding visible here
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut lineage = self.lineage.clone();
        lineage.push(self.name.clone());
        Environment { name: name.into(), lineage, state: self.state.clone() }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.state.get(name)
    }

    /// Looks a name up, suggesting a close match when it is missing
    pub fn lookup(&self, name: &str) -> Result<Value, QryError> {
        match self.state.get(name) {
            Some(value) => Ok(value.clone()),
            None => {
                let mut err = QryError::name_not_found(name);
                if let Some(suggestion) = find_closest_match(name, self.state.keys().map(String::as_str)) {
                    err = err.with_suggestion(suggestion);
                }
                Err(err)
            }
        }
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.state.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state.contains_key(name)
    }

    /// Copies every binding a library exports into this environment
    pub fn attach(&mut self, library: &Library) {
        for (name, value) in library.environment.state.iter() {
            self.state.insert(name.clone(), value.clone());
        }
    }

    /// Bound names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.state.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.state.iter()
    }

    /// Names of the scopes this environment descends from, outermost first,
    /// ending with its own name
    pub fn chain(&self) -> String {
        let mut chain = self.lineage.clone();
        chain.push(self.name.clone());
        chain.join(" > ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_child_is_a_snapshot() {
        let mut parent = Environment::new("global");
        parent.bind("x", Value::Int(1));
        let mut child = parent.child("inner");

        parent.bind("x", Value::Int(2));
        parent.bind("y", Value::Int(3));
        child.bind("z", Value::Int(4));

        assert_eq!(child.get("x"), Some(&Value::Int(1)));
        assert!(child.get("y").is_none());
        assert!(parent.get("z").is_none());
    }

    #[test]
    fn test_lookup_missing_name_suggests() {
        let mut env = Environment::new("global");
        env.bind("counter", Value::Int(1));
        let err = env.lookup("countr").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NameNotFound);
        assert_eq!(err.to_string(), "not found: countr");
        assert_eq!(err.suggestion.as_deref(), Some("counter"));
    }

    #[test]
    fn test_chain_names_lineage() {
        let root = Environment::new("root");
        let exec = root.child("global").child("exec");
        assert_eq!(exec.chain(), "root > global > exec");
    }
}
