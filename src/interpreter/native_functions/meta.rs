// File: src/interpreter/native_functions/meta.rs
//
// The `meta` library: capture an expression together with the environment
// it was written in, render it, and evaluate it later.

use crate::ast::Expr;
use crate::interpreter::environment::Environment;
use crate::interpreter::function::{Argument, BuiltinFunction, Dispatch};
use crate::interpreter::library::LibraryDef;
use crate::interpreter::value::{type_names, Exported, Value};
use std::sync::Arc;

/// A captured expression and a snapshot of its environment
#[derive(Debug)]
pub struct Ast {
    pub root: Arc<Expr>,
    pub env: Environment,
}

impl Exported for Ast {
    const TYPE_NAME: &'static str = "AST";
}

pub fn library() -> LibraryDef {
    LibraryDef::new("meta")
        .function(
            BuiltinFunction::new("get_ast", |call| {
                let root = call.syntax(0)?;
                let env = call.env()?.child("ast");
                Dispatch::resolved(Value::host(Ast { root, env }))
            })
            .with_caller_env()
            .arg(Argument::new("expr", type_names::EXPR))
            .returns(Ast::TYPE_NAME),
        )
        .function(
            BuiltinFunction::new("eval_ast", |call| {
                let ast = call.host::<Ast>(0)?;
                let mut env = ast.env.clone();
                Ok(Dispatch::Resolved(call.runtime.eval_in_env(&ast.root, &mut env)?))
            })
            .arg(Argument::new("ast", Ast::TYPE_NAME)),
        )
        .specialize(
            "to_string",
            BuiltinFunction::new("to_string", |call| Dispatch::resolved(call.host::<Ast>(0)?.root.to_string()))
                .arg(Argument::new("ast", Ast::TYPE_NAME))
                .returns(type_names::STRING),
        )
}

#[cfg(test)]
mod tests {
    use crate::interpreter::{Interpreter, Value};

    fn run(source: &str) -> Value {
        let mut interp = Interpreter::new().unwrap();
        interp.run(&format!("use meta::*\n{}", source)).unwrap()
    }

    #[test]
    fn test_eval_ast_uses_captured_environment() {
        assert_eq!(run("x <- 1\nast <- get_ast(1 + 1 + x)\nx <- 100\neval_ast(ast)"), Value::Int(3));
    }

    #[test]
    fn test_render_captured_function() {
        assert_eq!(
            run("to_string(get_ast(fn(x: Int, y: Int) -> Int { x + y }))"),
            Value::str("fn(x: Int, y: Int) -> Int { (x + y) }")
        );
    }
}
