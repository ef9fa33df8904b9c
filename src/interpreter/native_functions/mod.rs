// File: src/interpreter/native_functions/mod.rs
//
// Module organization for the standard libraries.
// Each module builds one LibraryDef; the interpreter loads them in the order
// returned by `standard_libraries`, so methods are declared before other
// libraries specialise them.

pub mod core;
pub mod data;
pub mod frame;
pub mod math;
pub mod meta;
pub mod ops;
pub mod sql;
pub mod vector;

use super::function::{Argument, BuiltinFunction, Dispatch};
use super::library::LibraryDef;
use super::value::type_names;

/// The libraries every interpreter starts with
pub fn standard_libraries() -> Vec<LibraryDef> {
    vec![core::library(), ops::library(), math::library(), meta::library(), data::library()]
}

/// A method default that declines every argument list, so dispatch misses
/// surface as unimplemented-method errors
pub(crate) fn abstract_method(name: &str, arity: usize) -> BuiltinFunction {
    (0..arity).fold(
        BuiltinFunction::new(name, |_| Ok(Dispatch::Unimplemented)),
        |func, i| func.arg(Argument::new(format!("arg{}", i), type_names::ANY)),
    )
}
