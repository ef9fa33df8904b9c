// File: src/lexer.rs
//
// Lexical analyzer (tokenizer) for the qry language.
// Converts source code text into a stream of tokens for parsing.
//
// Supports:
// - Keywords: fn, use
// - Literals: integers, floats, strings with escapes, true/false, null
// - Operators: + - * / == != < <= > >= ! && || = <- -> |> ::
// - Punctuation: ( ) { } , : ;
// - Comments starting with #

use crate::errors::{QryError, SourceLocation};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
    Operator(String),
    Punctuation(char),
    Keyword(String),
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }
}

const TWO_CHAR_OPERATORS: [&str; 10] = ["==", "!=", "<=", ">=", "&&", "||", "<-", "->", "|>", "::"];

/// Tokenizes qry source code into a vector of tokens.
///
/// Processes the input character by character, recognizing keywords,
/// identifiers, numbers, strings, operators, and punctuation. Comments starting
/// with # are skipped until end of line. The returned vector always ends with
/// an `Eof` token.
pub fn tokenize(source: &str) -> Result<Vec<Token>, QryError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut pos = 0;
    let mut line = 1;
    let mut col = 1;

    while pos < chars.len() {
        let c = chars[pos];
        let start_col = col;
        match c {
            ' ' | '\t' | '\r' => {
                pos += 1;
                col += 1;
            }
            '\n' => {
                pos += 1;
                line += 1;
                col = 1;
            }
            '#' => {
                while pos < chars.len() && chars[pos] != '\n' {
                    pos += 1;
                }
            }
            '"' => {
                pos += 1;
                col += 1;
                let mut s = String::new();
                let mut terminated = false;
                while pos < chars.len() {
                    let ch = chars[pos];
                    pos += 1;
                    col += 1;
                    match ch {
                        '"' => {
                            terminated = true;
                            break;
                        }
                        '\\' if pos < chars.len() => {
                            let esc = chars[pos];
                            pos += 1;
                            col += 1;
                            match esc {
                                'n' => s.push('\n'),
                                't' => s.push('\t'),
                                '\\' => s.push('\\'),
                                '"' => s.push('"'),
                                _ => s.push(esc),
                            }
                        }
                        '\n' => {
                            line += 1;
                            col = 1;
                            s.push(ch);
                        }
                        _ => s.push(ch),
                    }
                }
                if !terminated {
                    return Err(QryError::parse_error(
                        "unterminated string literal",
                        SourceLocation::new(line, start_col),
                    ));
                }
                tokens.push(Token { kind: TokenKind::String(s), line, column: start_col });
            }
            '0'..='9' => {
                let mut num = String::new();
                let mut is_float = false;
                while pos < chars.len() {
                    let ch = chars[pos];
                    let next_is_digit = chars.get(pos + 1).map_or(false, |n| n.is_ascii_digit());
                    if ch.is_ascii_digit() {
                        num.push(ch);
                    } else if ch == '.' && !is_float && next_is_digit {
                        is_float = true;
                        num.push(ch);
                    } else {
                        break;
                    }
                    pos += 1;
                    col += 1;
                }
                let location = SourceLocation::new(line, start_col);
                let kind = if is_float {
                    num.parse()
                        .map(TokenKind::Float)
                        .map_err(|_| QryError::parse_error(format!("invalid float: {}", num), location))?
                } else {
                    num.parse().map(TokenKind::Int).map_err(|_| {
                        QryError::parse_error(format!("integer literal out of range: {}", num), location)
                    })?
                };
                tokens.push(Token { kind, line, column: start_col });
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let mut ident = String::new();
                while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
                    ident.push(chars[pos]);
                    pos += 1;
                    col += 1;
                }

                let kind = match ident.as_str() {
                    "fn" | "use" => TokenKind::Keyword(ident),
                    "true" => TokenKind::Bool(true),
                    "false" => TokenKind::Bool(false),
                    "null" => TokenKind::Null,
                    _ => TokenKind::Identifier(ident),
                };

                tokens.push(Token { kind, line, column: start_col });
            }
            '(' | ')' | '{' | '}' | ',' | ':' | ';' => {
                let pair: String = chars[pos..(pos + 2).min(chars.len())].iter().collect();
                if pair == "::" {
                    tokens.push(Token { kind: TokenKind::Operator(pair), line, column: start_col });
                    pos += 2;
                    col += 2;
                } else {
                    tokens.push(Token { kind: TokenKind::Punctuation(c), line, column: start_col });
                    pos += 1;
                    col += 1;
                }
            }
            '=' | '!' | '<' | '>' | '+' | '-' | '*' | '/' | '&' | '|' => {
                let pair: String = chars[pos..(pos + 2).min(chars.len())].iter().collect();
                let op = if TWO_CHAR_OPERATORS.contains(&pair.as_str()) {
                    pair
                } else if c == '&' || c == '|' {
                    return Err(QryError::parse_error(
                        format!("unexpected character '{}' (did you mean '{}{}'?)", c, c, c),
                        SourceLocation::new(line, start_col),
                    ));
                } else {
                    c.to_string()
                };
                pos += op.chars().count();
                col += op.chars().count();
                tokens.push(Token { kind: TokenKind::Operator(op), line, column: start_col });
            }
            _ => {
                return Err(QryError::parse_error(
                    format!("unexpected character '{}'", c),
                    SourceLocation::new(line, start_col),
                ));
            }
        }
    }

    tokens.push(Token { kind: TokenKind::Eof, line, column: col });

    Ok(tokens)
}
