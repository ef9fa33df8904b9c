// File: src/interpreter/native_functions/data.rs
//
// The `data` library groups the vector, frame and sql libraries. Their
// members are re-exported flat, so `use data::*` brings in everything and
// `data::vector::intvec` and `data::intvec` name the same function.

use super::{frame, sql, vector};
use crate::interpreter::library::LibraryDef;

pub fn library() -> LibraryDef {
    LibraryDef::new("data").nested(vector::library()).nested(frame::library()).nested(sql::library())
}
