//! Cell-level error values.
//!
//! These are values a cell can hold (`#REF!`, `#DIV/0!`, ...), not failures
//! of an API call. API failures live in [`crate::error::WorkbookError`].

use std::fmt;

/// The closed set of error kinds a cell value can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ParseError,
    CircularReference,
    BadReference,
    BadName,
    TypeError,
    DivideByZero,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::ParseError,
        ErrorKind::CircularReference,
        ErrorKind::BadReference,
        ErrorKind::BadName,
        ErrorKind::TypeError,
        ErrorKind::DivideByZero,
    ];

    /// Canonical spreadsheet spelling, e.g. `#REF!`.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ParseError => "#ERROR!",
            ErrorKind::CircularReference => "#CIRCREF!",
            ErrorKind::BadReference => "#REF!",
            ErrorKind::BadName => "#NAME?",
            ErrorKind::TypeError => "#VALUE!",
            ErrorKind::DivideByZero => "#DIV/0!",
        }
    }

    /// Standard detail text attached by the evaluator.
    pub fn detail(self) -> &'static str {
        match self {
            ErrorKind::ParseError => "Parsing error",
            ErrorKind::CircularReference => "Circular reference detected",
            ErrorKind::BadReference => "Invalid reference",
            ErrorKind::BadName => "Invalid function name",
            ErrorKind::TypeError => "Type mismatch",
            ErrorKind::DivideByZero => "Divide by zero",
        }
    }

    /// Exact match against the canonical spelling.
    pub fn from_canonical(text: &str) -> Option<ErrorKind> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == text)
    }

    /// Case-insensitive match, used for literals typed into cells and formulas.
    pub fn from_literal(text: &str) -> Option<ErrorKind> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(text))
    }

    /// Kind whose canonical spelling prefixes `text`, if any.
    pub fn from_prefix(text: &str) -> Option<ErrorKind> {
        Self::ALL
            .into_iter()
            .find(|kind| text.starts_with(kind.as_str()))
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error value held by a cell: a kind plus free-form detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl CellError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Error carrying the kind's standard detail text.
    pub fn standard(kind: ErrorKind) -> Self {
        Self::new(kind, kind.detail())
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_matching_is_case_insensitive() {
        assert_eq!(ErrorKind::from_literal("#ref!"), Some(ErrorKind::BadReference));
        assert_eq!(ErrorKind::from_literal("#Div/0!"), Some(ErrorKind::DivideByZero));
        assert_eq!(ErrorKind::from_literal("#name?"), Some(ErrorKind::BadName));
        assert_eq!(ErrorKind::from_literal("#REF"), None);
    }

    #[test]
    fn test_canonical_matching_is_exact() {
        assert_eq!(ErrorKind::from_canonical("#VALUE!"), Some(ErrorKind::TypeError));
        assert_eq!(ErrorKind::from_canonical("#value!"), None);
    }

    #[test]
    fn test_prefix_matching() {
        assert_eq!(ErrorKind::from_prefix("#CIRCREF!abc"), Some(ErrorKind::CircularReference));
        assert_eq!(ErrorKind::from_prefix("x#CIRCREF!"), None);
    }

    #[test]
    fn test_standard_detail() {
        let err = CellError::standard(ErrorKind::DivideByZero);
        assert_eq!(err.detail, "Divide by zero");
        assert_eq!(err.to_string(), "#DIV/0!");
    }
}
