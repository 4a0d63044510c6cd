// Formula evaluator - walks a parsed expression against a cell lookup

use bigdecimal::{BigDecimal, Zero};

use crate::cell::CellValue;
use crate::cell_error::{CellError, ErrorKind};
use crate::cell_id::{is_valid_location, parse_address};
use crate::number::{format_decimal, in_range, normalize, parse_decimal, DIVISION_PRECISION};

use super::parser::{CellRef, Expr, Op, UnaryOp};

/// Read access to cell values while a formula is evaluated.
///
/// The lookup is bound to the sheet the formula lives on; unqualified
/// references go through `get_value`.
pub trait CellLookup {
    /// Value of a cell on the formula's own sheet.
    fn get_value(&self, row: usize, col: usize) -> Value;

    /// Value of a cell on a named sheet.
    /// Returns `Value::Error(BadReference)` if the sheet doesn't exist.
    fn get_value_sheet(&self, sheet: &str, row: usize, col: usize) -> Value;
}

// =============================================================================
// Value: the scalar flowing between operators
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Empty,
    Number(BigDecimal),
    Text(String),
    Error(ErrorKind),
}

impl Default for Value {
    fn default() -> Self {
        Value::Empty
    }
}

impl Value {
    /// Lift a stored cell value into the evaluator's scalar.
    pub fn from_cell(value: Option<&CellValue>) -> Value {
        match value {
            None => Value::Empty,
            Some(CellValue::Number(n)) => Value::Number(n.clone()),
            Some(CellValue::Text(s)) => Value::Text(s.clone()),
            Some(CellValue::Error(e)) => Value::Error(e.kind),
        }
    }

    /// Error carried by this operand. Text spelled exactly like an error
    /// literal counts as that error.
    fn as_error(&self) -> Option<ErrorKind> {
        match self {
            Value::Error(kind) => Some(*kind),
            Value::Text(s) => ErrorKind::from_canonical(s),
            Value::Empty | Value::Number(_) => None,
        }
    }

    fn to_number(&self) -> Result<BigDecimal, ErrorKind> {
        match self {
            Value::Empty => Ok(BigDecimal::zero()),
            Value::Number(n) => Ok(n.clone()),
            Value::Text(s) => parse_decimal(s).ok_or(ErrorKind::TypeError),
            Value::Error(kind) => Err(*kind),
        }
    }

    fn to_text(&self) -> String {
        match self {
            Value::Empty => String::new(),
            Value::Number(n) => format_decimal(n),
            Value::Text(s) => s.clone(),
            Value::Error(kind) => kind.as_str().to_string(),
        }
    }
}

/// First error among `operands`, scanning left to right.
fn first_error(operands: &[&Value]) -> Option<ErrorKind> {
    operands.iter().find_map(|v| v.as_error())
}

/// Evaluate a formula expression to the value stored in its cell.
///
/// An empty result (a bare reference to an empty cell) becomes zero, and text
/// beginning with an error literal becomes that error.
pub fn evaluate<L: CellLookup>(expr: &Expr, lookup: &L) -> CellValue {
    match evaluate_expr(expr, lookup) {
        Value::Empty => CellValue::Number(BigDecimal::zero()),
        Value::Number(n) => CellValue::Number(normalize(&n)),
        Value::Text(s) => match ErrorKind::from_prefix(&s) {
            Some(kind) => CellValue::Error(CellError::standard(kind)),
            None => CellValue::Text(s),
        },
        Value::Error(kind) => CellValue::Error(CellError::standard(kind)),
    }
}

/// Evaluate an expression to a raw scalar.
pub fn evaluate_expr<L: CellLookup>(expr: &Expr, lookup: &L) -> Value {
    match expr {
        Expr::Number { value, .. } => Value::Number(value.clone()),
        Expr::Text(s) => Value::Text(s.clone()),
        Expr::Error(kind) => Value::Error(*kind),
        Expr::CellRef(cell_ref) => resolve_ref(cell_ref, lookup),
        Expr::Paren(inner) => evaluate_expr(inner, lookup),
        Expr::Unary { op, operand } => {
            let value = evaluate_expr(operand, lookup);
            match value.to_number() {
                Ok(n) => Value::Number(match op {
                    UnaryOp::Plus => n,
                    UnaryOp::Minus => normalize(&-n),
                }),
                Err(kind) => Value::Error(value.as_error().unwrap_or(kind)),
            }
        }
        Expr::BinaryOp { op, left, right } => {
            let left = evaluate_expr(left, lookup);
            let right = evaluate_expr(right, lookup);
            if let Some(kind) = first_error(&[&left, &right]) {
                return Value::Error(kind);
            }
            let result = match op {
                Op::Concat => return Value::Text(left.to_text() + &right.to_text()),
                Op::Add => numeric(&left, &right, |l, r| Ok(l + r)),
                Op::Sub => numeric(&left, &right, |l, r| Ok(l - r)),
                Op::Mul => numeric(&left, &right, |l, r| Ok(l * r)),
                Op::Div => numeric(&left, &right, divide),
            };
            match result {
                // Results past the exponent range surface as a type error
                Ok(n) if !in_range(&n) => Value::Error(ErrorKind::TypeError),
                Ok(n) => Value::Number(normalize(&n)),
                Err(kind) => Value::Error(kind),
            }
        }
    }
}

/// Coerce both operands to numbers and combine them.
fn numeric<F>(left: &Value, right: &Value, combine: F) -> Result<BigDecimal, ErrorKind>
where
    F: FnOnce(BigDecimal, BigDecimal) -> Result<BigDecimal, ErrorKind>,
{
    combine(left.to_number()?, right.to_number()?)
}

fn divide(l: BigDecimal, r: BigDecimal) -> Result<BigDecimal, ErrorKind> {
    if r.is_zero() {
        return Err(ErrorKind::DivideByZero);
    }
    Ok((l / r).with_prec(DIVISION_PRECISION))
}

fn resolve_ref<L: CellLookup>(cell_ref: &CellRef, lookup: &L) -> Value {
    let (row, col) = match parse_address(&cell_ref.addr) {
        Ok((row, col)) if is_valid_location(row, col) => (row, col),
        _ => return Value::Error(ErrorKind::BadReference),
    };
    match &cell_ref.sheet {
        Some(sheet) => lookup.get_value_sheet(&sheet.name, row, col),
        None => lookup.get_value(row, col),
    }
}
