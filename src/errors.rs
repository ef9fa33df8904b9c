// File: src/errors.rs
//
// Error handling and reporting for the qry language.
// Every evaluator, parser and SQL compiler failure is a QryError carrying an
// ErrorKind from the language's error taxonomy, a message, and the source
// location it was raised at. The CLI and REPL print errors through render(),
// which adds colour and source context.

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Source location information for tracking where code appears in a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    pub fn line(line: usize) -> Self {
        Self { line, column: 0 }
    }

    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_known(&self) -> bool {
        self.line > 0
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.line, self.column) {
            (0, _) => write!(f, "<unknown>"),
            (line, 0) => write!(f, "line {}", line),
            (line, column) => write!(f, "{}:{}", line, column),
        }
    }
}

/// Types of errors that can occur in qry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    NameNotFound,
    TypeMismatch,
    UnsupportedConversion,
    UnimplementedMethod,
    InvalidSyntaxKind,
    AssertionFailed,
    SqlTranslation,
    DivisionByZero,
    Database,
    Io,
    Runtime,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            ErrorKind::Parse => "Parse Error",
            ErrorKind::NameNotFound => "Name Not Found",
            ErrorKind::TypeMismatch => "Type Mismatch",
            ErrorKind::UnsupportedConversion => "Unsupported Conversion",
            ErrorKind::UnimplementedMethod => "Unimplemented Method",
            ErrorKind::InvalidSyntaxKind => "Invalid Syntax Kind",
            ErrorKind::AssertionFailed => "Assertion Failed",
            ErrorKind::SqlTranslation => "SQL Translation Error",
            ErrorKind::DivisionByZero => "Division By Zero",
            ErrorKind::Database => "Database Error",
            ErrorKind::Io => "I/O Error",
            ErrorKind::Runtime => "Runtime Error",
        };
        write!(f, "{}", label)
    }
}

/// A structured error with location information.
///
/// `to_string()` yields the bare message; use [`QryError::render`] for the
/// decorated form shown to users.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct QryError {
    pub kind: ErrorKind,
    pub message: String,
    pub location: SourceLocation,
    pub source_line: Option<String>,
    pub suggestion: Option<String>,
    pub note: Option<String>,
}

impl QryError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: SourceLocation::unknown(),
            source_line: None,
            suggestion: None,
            note: None,
        }
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }

    /// Attaches a line number unless a more precise location is already known.
    pub fn or_line(mut self, line: usize) -> Self {
        if !self.location.is_known() {
            self.location = SourceLocation::line(line);
        }
        self
    }

    pub fn with_source(mut self, source_line: impl Into<String>) -> Self {
        self.source_line = Some(source_line.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn parse_error(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(ErrorKind::Parse, message).with_location(location)
    }

    pub fn name_not_found(name: &str) -> Self {
        Self::new(ErrorKind::NameNotFound, format!("not found: {}", name))
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, message)
    }

    pub fn unsupported_conversion(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedConversion, message)
    }

    pub fn unimplemented_method(method: &str, signature: &str) -> Self {
        Self::new(
            ErrorKind::UnimplementedMethod,
            format!("unimplemented method \"{}\" for signature: {}", method, signature),
        )
    }

    pub fn invalid_syntax(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidSyntaxKind, message)
    }

    pub fn assertion_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AssertionFailed, message)
    }

    pub fn sql(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SqlTranslation, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, message)
    }

    pub fn division_by_zero() -> Self {
        Self::new(ErrorKind::DivisionByZero, "division by zero")
    }

    /// Formats the error the way the CLI and REPL print it.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{}: {}\n",
            self.kind.to_string().red().bold(),
            self.message.bold()
        ));

        if self.location.is_known() {
            out.push_str(&format!("{}\n", format!("  --> {}", self.location).bright_blue()));
        }

        if let Some(ref source) = self.source_line {
            let line_num = self.location.line;
            out.push_str(&format!("   {}\n", "|".bright_blue()));
            out.push_str(&format!(
                "{} {} {}\n",
                format!("{:3}", line_num).bright_blue(),
                "|".bright_blue(),
                source
            ));
            if self.location.column > 0 {
                out.push_str(&format!(
                    "   {} {}{}\n",
                    "|".bright_blue(),
                    " ".repeat(self.location.column.saturating_sub(1)),
                    "^".red().bold()
                ));
            }
        }

        if let Some(ref suggestion) = self.suggestion {
            out.push_str(&format!(
                "   {} {}\n",
                "=".bright_green(),
                format!("Did you mean '{}'?", suggestion).bright_green()
            ));
        }

        if let Some(ref note) = self.note {
            out.push_str(&format!(
                "   {} {}\n",
                "=".bright_cyan(),
                format!("note: {}", note).bright_cyan()
            ));
        }

        out
    }
}

/// Computes the Levenshtein distance between two strings
/// Used for "Did you mean?" suggestions
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            current[j + 1] = (previous[j + 1] + 1).min(current[j] + 1).min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

/// Find the closest match from a list of candidates using Levenshtein distance
/// Returns None if no good match is found (distance > 3)
pub fn find_closest_match<'a, I>(target: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best_match = None;
    let mut best_distance = usize::MAX;

    for candidate in candidates {
        let distance = levenshtein_distance(target, candidate);
        if distance <= 3 && distance < best_distance {
            best_distance = distance;
            best_match = Some(candidate);
        }
    }

    best_match
}
