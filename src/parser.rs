// File: src/parser.rs
//
// Recursive descent parser for the qry language.
// Transforms a sequence of tokens into a list of top-level expressions.
//
// Precedence, from loosest to tightest binding:
// - `<-` (right associative), `->` (left associative)
// - `|>`
// - `||`, then `&&`
// - comparisons: == != < <= > >=
// - additive: + -
// - multiplicative: * /
// - unary: - !
// - postfix: `::` access and calls
//
// The parser uses a single-token lookahead. Expressions may be separated by
// newlines or semicolons; a call's opening parenthesis must sit on the same
// line as its callee so that a parenthesised expression on the next line
// starts a new expression.

use crate::ast::{BinaryOp, Expr, ExprKind, FuncExpr, Param, UnaryOp, UseImports};
use crate::errors::{QryError, SourceLocation};
use crate::lexer::{tokenize, Token, TokenKind};
use std::sync::Arc;

/// Parses source text into top-level expressions.
pub fn parse_source(source: &str) -> Result<Vec<Expr>, QryError> {
    let tokens = tokenize(source)?;
    Parser::new(tokens).parse()
}

/// Parser maintains position in token stream and provides methods to parse expressions
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Creates a new parser from a vector of tokens
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    /// Peek at the current token without consuming it
    fn peek(&self) -> &TokenKind {
        self.tokens.get(self.pos).map(|t| &t.kind).unwrap_or(&TokenKind::Eof)
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        self.tokens.get(self.pos + offset).map(|t| &t.kind).unwrap_or(&TokenKind::Eof)
    }

    /// Consume and return the current token, then advance to the next
    fn advance(&mut self) -> TokenKind {
        let tok = self.peek().clone();
        self.pos += 1;
        tok
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn previous_line(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|p| self.tokens.get(p))
            .map(|t| t.line)
            .unwrap_or(0)
    }

    fn location(&self) -> SourceLocation {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(Token::location)
            .unwrap_or_default()
    }

    fn is_operator(&self, op: &str) -> bool {
        matches!(self.peek(), TokenKind::Operator(o) if o == op)
    }

    fn is_punct(&self, c: char) -> bool {
        matches!(self.peek(), TokenKind::Punctuation(p) if *p == c)
    }

    fn unexpected(&self, expected: &str) -> QryError {
        let found = match self.peek() {
            TokenKind::Identifier(name) => format!("identifier '{}'", name),
            TokenKind::Int(n) => format!("number {}", n),
            TokenKind::Float(n) => format!("number {:?}", n),
            TokenKind::String(s) => format!("string \"{}\"", s),
            TokenKind::Bool(b) => format!("'{}'", b),
            TokenKind::Null => "'null'".to_string(),
            TokenKind::Operator(op) => format!("'{}'", op),
            TokenKind::Punctuation(c) => format!("'{}'", c),
            TokenKind::Keyword(k) => format!("keyword '{}'", k),
            TokenKind::Eof => "end of input".to_string(),
        };
        QryError::parse_error(format!("expected {}, found {}", expected, found), self.location())
    }

    fn expect_punct(&mut self, c: char) -> Result<(), QryError> {
        if self.is_punct(c) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", c)))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, QryError> {
        match self.peek() {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn skip_separators(&mut self) {
        while self.is_punct(';') {
            self.advance();
        }
    }

    /// Parse the entire token stream into a vector of expressions
    pub fn parse(&mut self) -> Result<Vec<Expr>, QryError> {
        let mut exprs = Vec::new();
        self.skip_separators();
        while !matches!(self.peek(), TokenKind::Eof) {
            exprs.push(self.parse_expr()?);
            self.skip_separators();
        }
        Ok(exprs)
    }

    pub fn parse_expr(&mut self) -> Result<Expr, QryError> {
        self.parse_left_assign()
    }

    fn parse_left_assign(&mut self) -> Result<Expr, QryError> {
        let left = self.parse_right_assign()?;
        if self.is_operator("<-") {
            let line = self.line();
            self.advance();
            let right = self.parse_left_assign()?;
            return Expr::binary(BinaryOp::LAssign, left, right, line);
        }
        Ok(left)
    }

    fn parse_right_assign(&mut self) -> Result<Expr, QryError> {
        let mut left = self.parse_pipe()?;
        while self.is_operator("->") {
            let line = self.line();
            self.advance();
            let right = self.parse_pipe()?;
            left = Expr::binary(BinaryOp::RAssign, left, right, line)?;
        }
        Ok(left)
    }

    /// Parses one left-associative precedence level.
    fn parse_level(
        &mut self,
        ops: &[&str],
        next: fn(&mut Self) -> Result<Expr, QryError>,
    ) -> Result<Expr, QryError> {
        let mut left = next(self)?;
        loop {
            let op = match self.peek() {
                TokenKind::Operator(o) if ops.contains(&o.as_str()) => o.clone(),
                _ => break,
            };
            let line = self.line();
            self.advance();
            let right = next(self)?;
            let op = BinaryOp::from_symbol(&op)
                .ok_or_else(|| QryError::parse_error(format!("unknown operator '{}'", op), self.location()))?;
            left = Expr::binary(op, left, right, line)?;
        }
        Ok(left)
    }

    fn parse_pipe(&mut self) -> Result<Expr, QryError> {
        self.parse_level(&["|>"], Self::parse_or)
    }

    fn parse_or(&mut self) -> Result<Expr, QryError> {
        self.parse_level(&["||"], Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, QryError> {
        self.parse_level(&["&&"], Self::parse_comparison)
    }

    fn parse_comparison(&mut self) -> Result<Expr, QryError> {
        self.parse_level(&["==", "!=", "<", "<=", ">", ">="], Self::parse_additive)
    }

    fn parse_additive(&mut self) -> Result<Expr, QryError> {
        self.parse_level(&["+", "-"], Self::parse_multiplicative)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, QryError> {
        self.parse_level(&["*", "/"], Self::parse_unary)
    }

    fn parse_unary(&mut self) -> Result<Expr, QryError> {
        let op = if self.is_operator("-") {
            Some(UnaryOp::NegateArith)
        } else if self.is_operator("!") {
            Some(UnaryOp::NegateLogical)
        } else {
            None
        };
        match op {
            Some(op) => {
                let line = self.line();
                self.advance();
                let arg = self.parse_unary()?;
                Ok(Expr::new(ExprKind::Unary { op, arg: Box::new(arg) }, line))
            }
            None => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, QryError> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.is_operator("::") {
                let line = self.line();
                self.advance();
                let name = self.expect_identifier()?;
                expr = Expr::binary(BinaryOp::Access, expr, Expr::ident(name, line), line)?;
            } else if self.is_punct('(') && self.line() == self.previous_line() {
                let line = self.line();
                self.advance();
                let (positional, named) = self.parse_call_args()?;
                expr = Expr::call(expr, positional, named, line);
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_call_args(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>), QryError> {
        let mut positional = Vec::new();
        let mut named = Vec::new();

        while !self.is_punct(')') {
            let is_named = matches!(self.peek(), TokenKind::Identifier(_))
                && matches!(self.peek_at(1), TokenKind::Operator(op) if op == "=");
            if is_named {
                let name = self.expect_identifier()?;
                self.advance(); // =
                named.push((name, self.parse_expr()?));
            } else if !named.is_empty() {
                return Err(QryError::parse_error(
                    "positional argument follows named argument",
                    self.location(),
                ));
            } else {
                positional.push(self.parse_expr()?);
            }

            if self.is_punct(',') {
                self.advance();
            } else {
                break;
            }
        }
        self.expect_punct(')')?;

        Ok((positional, named))
    }

    fn parse_primary(&mut self) -> Result<Expr, QryError> {
        let line = self.line();
        let kind = match self.peek().clone() {
            TokenKind::Int(n) => ExprKind::Int(n),
            TokenKind::Float(n) => ExprKind::Float(n),
            TokenKind::String(s) => ExprKind::Str(s),
            TokenKind::Bool(b) => ExprKind::Bool(b),
            TokenKind::Null => ExprKind::Null,
            TokenKind::Identifier(name) => ExprKind::Ident(name),
            TokenKind::Punctuation('(') => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect_punct(')')?;
                return Ok(inner);
            }
            TokenKind::Punctuation('{') if matches!(self.peek_at(1), TokenKind::Punctuation('{')) => {
                self.advance();
                self.advance();
                let inner = self.parse_expr()?;
                self.expect_punct('}')?;
                self.expect_punct('}')?;
                return Ok(Expr::new(ExprKind::Interpolate(Box::new(inner)), line));
            }
            TokenKind::Keyword(k) if k == "fn" => return self.parse_func(),
            TokenKind::Keyword(k) if k == "use" => return self.parse_use(),
            _ => return Err(self.unexpected("expression")),
        };
        self.advance();
        Ok(Expr::new(kind, line))
    }

    /// Type annotations are ordinary expressions evaluated to type values
    fn parse_type(&mut self) -> Result<Expr, QryError> {
        self.parse_postfix()
    }

    fn parse_func(&mut self) -> Result<Expr, QryError> {
        let line = self.line();
        self.advance(); // fn

        let name = match self.peek() {
            TokenKind::Identifier(_) => Some(self.expect_identifier()?),
            _ => None,
        };

        self.expect_punct('(')?;
        let mut params = Vec::new();
        while !self.is_punct(')') {
            let param_name = self.expect_identifier()?;
            let ty = if self.is_punct(':') {
                self.advance();
                Some(self.parse_type()?)
            } else {
                None
            };
            params.push(Param { name: param_name, ty });

            if self.is_punct(',') {
                self.advance();
            } else {
                break;
            }
        }
        self.expect_punct(')')?;

        let return_type = if self.is_operator("->") {
            self.advance();
            Some(Box::new(self.parse_type()?))
        } else {
            None
        };

        self.expect_punct('{')?;
        let mut body = Vec::new();
        self.skip_separators();
        while !self.is_punct('}') {
            if matches!(self.peek(), TokenKind::Eof) {
                return Err(self.unexpected("'}'"));
            }
            body.push(self.parse_expr()?);
            self.skip_separators();
        }
        self.expect_punct('}')?;

        Ok(Expr::new(
            ExprKind::Func(FuncExpr { name, params, return_type, body: Arc::new(body) }),
            line,
        ))
    }

    fn parse_use(&mut self) -> Result<Expr, QryError> {
        let line = self.line();
        self.advance(); // use

        let mut path = vec![self.expect_identifier()?];
        let imports = loop {
            if !self.is_operator("::") {
                // `use a::b` imports the last segment from the path before it
                let last = path.pop().unwrap_or_default();
                break UseImports::Names(vec![last]);
            }
            self.advance();
            match self.peek() {
                TokenKind::Operator(op) if op == "*" => {
                    self.advance();
                    break UseImports::Wildcard;
                }
                TokenKind::Punctuation('{') => {
                    self.advance();
                    let mut names = Vec::new();
                    while !self.is_punct('}') {
                        names.push(self.expect_identifier()?);
                        if self.is_punct(',') {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                    self.expect_punct('}')?;
                    break UseImports::Names(names);
                }
                _ => path.push(self.expect_identifier()?),
            }
        };

        Ok(Expr::new(ExprKind::Use { path, imports }, line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn parse_one(source: &str) -> Expr {
        let mut exprs = parse_source(source).unwrap();
        assert_eq!(exprs.len(), 1, "expected one expression in {:?}", source);
        exprs.remove(0)
    }

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(parse_one("1 + 2 * 3").to_string(), "(1 + (2 * 3))");
        assert_eq!(parse_one("(1 + 1) + 3").to_string(), "((1 + 1) + 3)");
    }

    #[test]
    fn test_left_assign_is_right_associative() {
        assert_eq!(parse_one("x <- y <- 1").to_string(), "(x <- (y <- 1))");
    }

    #[test]
    fn test_right_assign_chains() {
        assert_eq!(parse_one("1 -> x -> y").to_string(), "((1 -> x) -> y)");
    }

    #[test]
    fn test_assign_to_literal_is_error() {
        let err = parse_source("1 <- x").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidSyntaxKind);
    }

    #[test]
    fn test_pipe_binds_looser_than_arithmetic() {
        assert_eq!(parse_one("1 + 1 |> f(2)").to_string(), "((1 + 1) |> f(2))");
    }

    #[test]
    fn test_access_then_call() {
        assert_eq!(parse_one("data::intvec(1, 2)").to_string(), "(data::intvec)(1, 2)");
    }

    #[test]
    fn test_named_arguments() {
        assert_eq!(parse_one("f(1, k = x + 1)").to_string(), "f(1, k = (x + 1))");
    }

    #[test]
    fn test_positional_after_named_is_error() {
        assert!(parse_source("f(k = 1, 2)").is_err());
    }

    #[test]
    fn test_function_literal() {
        assert_eq!(
            parse_one("fn(x: Int, y: Int) -> Int { x + y }").to_string(),
            "fn(x: Int, y: Int) -> Int { (x + y) }"
        );
        assert_eq!(parse_one("fn inc(x) { x + 1 }").to_string(), "fn inc(x) -> Null { (x + 1) }");
    }

    #[test]
    fn test_unary() {
        assert_eq!(parse_one("!true").to_string(), "!true");
        assert_eq!(parse_one("1 - -2").to_string(), "(1 - -2)");
    }

    #[test]
    fn test_interpolation() {
        assert_eq!(parse_one("age > {{ limit }}").to_string(), "(age > {{limit}})");
    }

    #[test]
    fn test_use_forms() {
        assert_eq!(parse_one("use data").to_string(), "use data");
        assert_eq!(parse_one("use data::*").to_string(), "use data::*");
        assert_eq!(parse_one("use data::{intvec, sum}").to_string(), "use data::{intvec, sum}");
        match parse_one("use data::sql::collect").kind {
            ExprKind::Use { path, imports } => {
                assert_eq!(path, vec!["data".to_string(), "sql".to_string()]);
                assert_eq!(imports, UseImports::Names(vec!["collect".into()]));
            }
            other => panic!("expected use, got {:?}", other),
        }
    }

    #[test]
    fn test_newline_separates_parenthesised_expression() {
        let exprs = parse_source("x <- f\n(1 + 2)").unwrap();
        assert_eq!(exprs.len(), 2);
    }

    #[test]
    fn test_semicolons_separate_expressions() {
        let exprs = parse_source("1; 2;; 3").unwrap();
        assert_eq!(exprs.len(), 3);
    }

    #[test]
    fn test_parse_error_has_location() {
        let err = parse_source("f(1,\n  ;)").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
        assert_eq!(err.location.line, 2);
    }
}
