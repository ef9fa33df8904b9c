// File: src/ast.rs
//
// Abstract Syntax Tree (AST) definitions for the qry language.
//
// qry programs are a sequence of expressions; there are no statements.
// Every node records the source line it came from so runtime errors can
// point back at the script. Expressions render back to source-like text,
// which assertions, the meta library and the REPL rely on.

use crate::errors::{QryError, SourceLocation};
use std::fmt;
use std::sync::Arc;

/// Method names the evaluator dispatches operators to.
/// These methods are declared by the `ops` library and specialised per type.
pub mod operator_methods {
    // Arithmetic operators
    pub const ADD: &str = "add";
    pub const SUBTRACT: &str = "subtract";
    pub const MULTIPLY: &str = "multiply";
    pub const DIVIDE: &str = "divide";

    // Comparison operators
    pub const EQUAL: &str = "equal";
    pub const NOT_EQUAL: &str = "not_equal";
    pub const GREATER_THAN: &str = "greater_than";
    pub const GREATER_THAN_OR_EQUAL: &str = "greater_than_or_equal";
    pub const LESS_THAN: &str = "less_than";
    pub const LESS_THAN_OR_EQUAL: &str = "less_than_or_equal";

    // Logical operators (not short-circuiting)
    pub const LOGICAL_AND: &str = "logical_and";
    pub const LOGICAL_OR: &str = "logical_or";

    // Unary operators
    pub const NEGATE_ARITHMETIC: &str = "negate_arithmetic";
    pub const NEGATE_LOGICAL: &str = "negate_logical";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,

    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,

    And,
    Or,

    Access,
    LAssign,
    RAssign,
    Pipe,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Access => "::",
            BinaryOp::LAssign => "<-",
            BinaryOp::RAssign => "->",
            BinaryOp::Pipe => "|>",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Subtract,
            "*" => BinaryOp::Multiply,
            "/" => BinaryOp::Divide,
            "==" => BinaryOp::Equal,
            "!=" => BinaryOp::NotEqual,
            ">" => BinaryOp::GreaterThan,
            ">=" => BinaryOp::GreaterThanOrEqual,
            "<" => BinaryOp::LessThan,
            "<=" => BinaryOp::LessThanOrEqual,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            "::" => BinaryOp::Access,
            "<-" => BinaryOp::LAssign,
            "->" => BinaryOp::RAssign,
            "|>" => BinaryOp::Pipe,
            _ => return None,
        };
        Some(op)
    }

    /// The dispatch method for eagerly evaluated operators; `None` for the
    /// structural operators the evaluator handles itself.
    pub fn method_name(&self) -> Option<&'static str> {
        use operator_methods::*;
        let name = match self {
            BinaryOp::Add => ADD,
            BinaryOp::Subtract => SUBTRACT,
            BinaryOp::Multiply => MULTIPLY,
            BinaryOp::Divide => DIVIDE,
            BinaryOp::Equal => EQUAL,
            BinaryOp::NotEqual => NOT_EQUAL,
            BinaryOp::GreaterThan => GREATER_THAN,
            BinaryOp::GreaterThanOrEqual => GREATER_THAN_OR_EQUAL,
            BinaryOp::LessThan => LESS_THAN,
            BinaryOp::LessThanOrEqual => LESS_THAN_OR_EQUAL,
            BinaryOp::And => LOGICAL_AND,
            BinaryOp::Or => LOGICAL_OR,
            BinaryOp::Access | BinaryOp::LAssign | BinaryOp::RAssign | BinaryOp::Pipe => {
                return None
            }
        };
        Some(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    NegateArith,
    NegateLogical,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::NegateArith => "-",
            UnaryOp::NegateLogical => "!",
        }
    }

    pub fn method_name(&self) -> &'static str {
        match self {
            UnaryOp::NegateArith => operator_methods::NEGATE_ARITHMETIC,
            UnaryOp::NegateLogical => operator_methods::NEGATE_LOGICAL,
        }
    }
}

/// A parameter in a function literal: `name` or `name: Type`
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncExpr {
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub return_type: Option<Box<Expr>>,
    pub body: Arc<Vec<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub func: Box<Expr>,
    pub positional: Vec<Expr>,
    pub named: Vec<(String, Expr)>,
}

/// What a `use` declaration imports from its library path
#[derive(Debug, Clone, PartialEq)]
pub enum UseImports {
    Wildcard,
    Names(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
    Ident(String),
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Unary { op: UnaryOp, arg: Box<Expr> },
    Func(FuncExpr),
    Call(CallExpr),
    Interpolate(Box<Expr>),
    Use { path: Vec<String>, imports: UseImports },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: usize,
}

impl Expr {
    pub fn new(kind: ExprKind, line: usize) -> Self {
        Expr { kind, line }
    }

    pub fn ident(name: impl Into<String>, line: usize) -> Self {
        Expr::new(ExprKind::Ident(name.into()), line)
    }

    /// Builds a binary operation, enforcing that assignment targets are identifiers.
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, line: usize) -> Result<Self, QryError> {
        let target = match op {
            BinaryOp::LAssign => Some(&lhs),
            BinaryOp::RAssign => Some(&rhs),
            _ => None,
        };
        if let Some(target) = target {
            if target.as_ident().is_none() {
                return Err(QryError::invalid_syntax(format!(
                    "can only assign to idents, found {}",
                    target.kind_name()
                ))
                .with_location(SourceLocation::line(line)));
            }
        }

        Ok(Expr::new(ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, line))
    }

    pub fn call(func: Expr, positional: Vec<Expr>, named: Vec<(String, Expr)>, line: usize) -> Self {
        Expr::new(ExprKind::Call(CallExpr { func: Box::new(func), positional, named }), line)
    }

    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// Human-readable node kind, used in error messages about syntax constraints
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ExprKind::Int(_) => "integer literal",
            ExprKind::Float(_) => "float literal",
            ExprKind::Str(_) => "string literal",
            ExprKind::Bool(_) => "boolean literal",
            ExprKind::Null => "null literal",
            ExprKind::Ident(_) => "identifier",
            ExprKind::Binary { .. } => "binary operation",
            ExprKind::Unary { .. } => "unary operation",
            ExprKind::Func(_) => "function literal",
            ExprKind::Call(_) => "call",
            ExprKind::Interpolate(_) => "interpolation",
            ExprKind::Use { .. } => "use declaration",
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            ExprKind::Int(n) => write!(f, "{}", n),
            ExprKind::Float(n) => write!(f, "{:?}", n),
            ExprKind::Str(s) => write!(f, "\"{}\"", s),
            ExprKind::Bool(b) => write!(f, "{}", b),
            ExprKind::Null => write!(f, "null"),
            ExprKind::Ident(name) => write!(f, "{}", name),
            ExprKind::Binary { op: BinaryOp::Access, lhs, rhs } => write!(f, "({}::{})", lhs, rhs),
            ExprKind::Binary { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
            ExprKind::Unary { op, arg } => write!(f, "{}{}", op.symbol(), arg),
            ExprKind::Func(func) => {
                write!(f, "fn")?;
                if let Some(name) = &func.name {
                    write!(f, " {}", name)?;
                }
                let params: Vec<String> = func
                    .params
                    .iter()
                    .map(|p| match &p.ty {
                        Some(ty) => format!("{}: {}", p.name, ty),
                        None => p.name.clone(),
                    })
                    .collect();
                write!(f, "({}) -> ", params.join(", "))?;
                match &func.return_type {
                    Some(ty) => write!(f, "{}", ty)?,
                    None => write!(f, "Null")?,
                }
                let body: Vec<String> = func.body.iter().map(|e| e.to_string()).collect();
                write!(f, " {{ {} }}", body.join(" "))
            }
            ExprKind::Call(call) => {
                let mut args: Vec<String> = call.positional.iter().map(|a| a.to_string()).collect();
                args.extend(call.named.iter().map(|(name, a)| format!("{} = {}", name, a)));
                write!(f, "{}({})", call.func, args.join(", "))
            }
            ExprKind::Interpolate(inner) => write!(f, "{{{{{}}}}}", inner),
            ExprKind::Use { path, imports } => {
                let lib_path = path.join("::");
                match imports {
                    UseImports::Wildcard => write!(f, "use {}::*", lib_path),
                    UseImports::Names(names) if !path.is_empty() => {
                        write!(f, "use {}::{{{}}}", lib_path, names.join(", "))
                    }
                    UseImports::Names(names) => write!(f, "use {}", names.join("::")),
                }
            }
        }
    }
}
