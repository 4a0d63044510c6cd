//! Decimal parsing and canonicalization.
//!
//! Numbers are exact decimals. Every number stored in a cell or produced by
//! the evaluator goes through [`normalize`], so `5.000` and `5` compare and
//! print identically.

use std::str::FromStr;

use bigdecimal::{BigDecimal, Zero};

/// Largest adjusted exponent a number may carry, in either direction.
/// Literals and results outside it are not numbers.
pub const MAX_EXPONENT: i64 = 999_999;

/// Significant digits kept by division.
pub const DIVISION_PRECISION: u64 = 28;

/// Strip trailing zeros and fold `-0` into `0`.
#[inline]
pub fn normalize(value: &BigDecimal) -> BigDecimal {
    if value.is_zero() {
        return BigDecimal::zero();
    }
    value.normalized()
}

/// True if `value` lies within the supported exponent range.
pub fn in_range(value: &BigDecimal) -> bool {
    if value.is_zero() {
        return true;
    }
    let (int, scale) = value.as_bigint_and_exponent();
    let digits = int.to_string().trim_start_matches('-').len() as i64;
    let adjusted = digits - 1 - scale;
    adjusted.abs() <= MAX_EXPONENT
}

/// Parse finite decimal text: `[+-]?(d+[.d*]|.d+)([eE][+-]?d+)?`.
///
/// Surrounding whitespace is ignored. Non-finite spellings (`NaN`, `inf`)
/// are rejected. The value is exact: no digits are rounded away.
pub fn parse_decimal(text: &str) -> Option<BigDecimal> {
    let text = text.trim();
    let bytes = text.as_bytes();
    let mut pos = 0;

    let negative = match bytes.first() {
        Some(b'-') => {
            pos += 1;
            true
        }
        Some(b'+') => {
            pos += 1;
            false
        }
        _ => false,
    };

    let int_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    let int_digits = &text[int_start..pos];

    let mut frac_digits = "";
    if pos < bytes.len() && bytes[pos] == b'.' {
        pos += 1;
        let frac_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        frac_digits = &text[frac_start..pos];
    }

    if int_digits.is_empty() && frac_digits.is_empty() {
        return None;
    }

    let mut exponent: Option<&str> = None;
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let exp_start = pos + 1;
        pos = exp_start;
        if pos < bytes.len() && (bytes[pos] == b'+' || bytes[pos] == b'-') {
            pos += 1;
        }
        let digits_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        if digits_start == pos {
            return None;
        }
        exponent = Some(&text[exp_start..pos]);
    }

    if pos != bytes.len() {
        return None;
    }

    let mut canonical = String::with_capacity(text.len() + 2);
    if negative {
        canonical.push('-');
    }
    canonical.push_str(if int_digits.is_empty() { "0" } else { int_digits });
    if !frac_digits.is_empty() {
        canonical.push('.');
        canonical.push_str(frac_digits);
    }
    if let Some(exp) = exponent {
        // Past this bound no mantissa of this length can bring the value back in range
        let limit = MAX_EXPONENT as u64 + (int_digits.len() + frac_digits.len()) as u64;
        match exp.parse::<i64>() {
            Ok(exp) if exp.unsigned_abs() <= limit => {
                canonical.push('e');
                canonical.push_str(&exp.to_string());
            }
            _ => {
                let zero = int_digits.bytes().chain(frac_digits.bytes()).all(|b| b == b'0');
                return zero.then(BigDecimal::zero);
            }
        }
    }

    let value = normalize(&BigDecimal::from_str(&canonical).ok()?);
    in_range(&value).then_some(value)
}

/// Canonical text for a number: plain notation, no trailing zeros.
pub fn format_decimal(value: &BigDecimal) -> String {
    let (int, scale) = normalize(value).as_bigint_and_exponent();
    let text = int.to_string();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(digits) => ("-", digits),
        None => ("", text.as_str()),
    };

    let body = if scale <= 0 {
        format!("{}{}", digits, "0".repeat(scale.unsigned_abs() as usize))
    } else {
        let scale = scale as usize;
        if digits.len() > scale {
            let (whole, frac) = digits.split_at(digits.len() - scale);
            format!("{}.{}", whole, frac)
        } else {
            format!("0.{}{}", "0".repeat(scale - digits.len()), digits)
        }
    };
    format!("{}{}", sign, body)
}
