use std::fmt;

use bigdecimal::BigDecimal;

use crate::cell_error::{CellError, ErrorKind};
use crate::formula::parser::{self, Expr, ParsedFormula, Reference};
use crate::number::{self, format_decimal};

/// What kind of content a cell holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellType {
    #[default]
    Empty,
    Number,
    String,
    Formula,
    Error,
}

/// A computed or literal cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(BigDecimal),
    Text(String),
    Error(CellError),
}

impl CellValue {
    pub fn as_number(&self) -> Option<BigDecimal> {
        match self {
            CellValue::Number(n) => Some(n.clone()),
            _ => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            CellValue::Error(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Equality used for change detection: errors of the same kind are equal
    /// regardless of detail text.
    pub fn same_as(&self, other: &CellValue) -> bool {
        match (self, other) {
            (CellValue::Error(a), CellValue::Error(b)) => a.kind == b.kind,
            _ => self == other,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => f.write_str(&format_decimal(n)),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Error(e) => write!(f, "{}", e),
        }
    }
}

/// Kind-aware comparison of optional values.
pub fn values_match(a: Option<&CellValue>, b: Option<&CellValue>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.same_as(b),
        _ => false,
    }
}

/// One grid location.
///
/// A cell created only because a formula referenced it has no content and
/// no value until something is written to it.
#[derive(Debug, Clone, Default)]
pub struct Cell {
    content: Option<String>,
    cell_type: CellType,
    value: Option<CellValue>,
    formula: Option<ParsedFormula>,
}

impl Cell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cell from raw content.
    pub fn from_content(content: &str) -> Self {
        let mut cell = Self::new();
        cell.update(Some(content));
        cell
    }

    /// Replace the cell's content and derive type, value and references.
    ///
    /// Formula cells are left without a value; the workbook evaluates them.
    pub fn update(&mut self, content: Option<&str>) {
        *self = Self::new();

        let trimmed = match content.map(str::trim) {
            None | Some("") | Some("'") => return,
            Some(trimmed) => trimmed,
        };
        self.content = Some(trimmed.to_string());

        if let Some(rest) = trimmed.strip_prefix('\'') {
            self.cell_type = CellType::String;
            self.value = Some(CellValue::Text(rest.to_string()));
            return;
        }

        if trimmed.starts_with('=') {
            match parser::parse(trimmed) {
                Ok(parsed) => {
                    self.cell_type = CellType::Formula;
                    self.formula = Some(parsed);
                }
                Err(message) => {
                    self.cell_type = CellType::Error;
                    self.value = Some(CellValue::Error(CellError::new(
                        ErrorKind::ParseError,
                        message,
                    )));
                }
            }
            return;
        }

        if let Some(n) = number::parse_decimal(trimmed) {
            self.cell_type = CellType::Number;
            self.value = Some(CellValue::Number(n));
            return;
        }

        if let Some(kind) = ErrorKind::from_literal(trimmed) {
            self.cell_type = CellType::Error;
            self.content = Some(kind.as_str().to_string());
            self.value = Some(CellValue::Error(CellError::new(kind, kind.as_str())));
            return;
        }

        self.cell_type = CellType::String;
        self.value = Some(CellValue::Text(trimmed.to_string()));
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    pub fn value(&self) -> Option<&CellValue> {
        self.value.as_ref()
    }

    pub fn set_value(&mut self, value: Option<CellValue>) {
        self.value = value;
    }

    pub fn is_formula(&self) -> bool {
        self.formula.is_some()
    }

    /// Parsed expression of a well-formed formula.
    pub fn expr(&self) -> Option<&Expr> {
        self.formula.as_ref().map(|f| &f.expr)
    }

    /// References of a well-formed formula, in source order.
    pub fn references(&self) -> &[Reference] {
        self.formula
            .as_ref()
            .map(|f| f.refs.as_slice())
            .unwrap_or_default()
    }
}
