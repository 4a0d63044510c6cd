//! Cell identity for the dependency graph and sheet storage.
//!
//! A `CellId` uniquely identifies a cell across all sheets in a workbook.
//! Sheet names are case-insensitive, so the identity carries the uppercased
//! name; the original spelling lives on the `Sheet` itself.

/// Number of addressable rows (`1..=9999` in A1 notation).
pub const MAX_ROWS: usize = 9999;

/// Number of addressable columns (`A..=ZZZZ` in A1 notation).
pub const MAX_COLS: usize = 475_254;

/// Unique identifier for a cell in a workbook.
///
/// Used as graph nodes in the dependency graph.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId {
    /// Uppercased sheet name
    pub sheet: String,
    /// Row index (0-based)
    pub row: usize,
    /// Column index (0-based)
    pub col: usize,
}

impl CellId {
    /// Create a new CellId. The sheet name is uppercased.
    pub fn new(sheet: &str, row: usize, col: usize) -> Self {
        Self {
            sheet: sheet.to_uppercase(),
            row,
            col,
        }
    }

    /// True if the coordinate lies inside the addressable grid.
    #[inline]
    pub fn is_valid(&self) -> bool {
        is_valid_location(self.row, self.col)
    }

    /// A1-style address without the sheet prefix.
    pub fn address(&self) -> String {
        format_address(self.row, self.col)
    }

    /// True if this cell lives on the given (case-insensitive) sheet.
    pub fn on_sheet(&self, sheet: &str) -> bool {
        self.sheet == sheet.to_uppercase()
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}!{}", self.sheet, self.address())
    }
}

#[inline]
pub fn is_valid_location(row: usize, col: usize) -> bool {
    row < MAX_ROWS && col < MAX_COLS
}

/// Convert 0-based column index to letter(s): 0=A, 25=Z, 26=AA.
pub fn col_to_letters(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Format a 0-based (row, col) pair as `A1` text.
pub fn format_address(row: usize, col: usize) -> String {
    format!("{}{}", col_to_letters(col), row + 1)
}

/// Parse `[A-Za-z]+[0-9]+` into a 0-based (row, col) pair.
///
/// Only the shape is checked here; the result may still lie outside the
/// grid. Use [`parse_location`] when the address must be addressable.
pub fn parse_address(text: &str) -> Result<(usize, usize), String> {
    let split = text
        .find(|c: char| !c.is_ascii_alphabetic())
        .ok_or_else(|| format!("Invalid cell location: {}", text))?;
    let (letters, digits) = text.split_at(split);
    if letters.is_empty() || digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("Invalid cell location: {}", text));
    }

    let mut col: usize = 0;
    for c in letters.chars() {
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        col = col
            .checked_mul(26)
            .and_then(|n| n.checked_add(digit))
            .ok_or_else(|| format!("Column out of range: {}", text))?;
    }

    let row: usize = digits
        .parse()
        .map_err(|_| format!("Row out of range: {}", text))?;
    if row == 0 {
        return Err(format!("Invalid row number: {}", text));
    }

    Ok((row - 1, col - 1))
}

/// Parse an A1 address and require it to lie inside the grid.
pub fn parse_location(text: &str) -> Result<(usize, usize), String> {
    let (row, col) = parse_address(text.trim())?;
    if !is_valid_location(row, col) {
        return Err(format!("Cell location out of range: {}", text));
    }
    Ok((row, col))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_id_case_insensitive() {
        let a = CellId::new("Sheet1", 0, 0);
        let b = CellId::new("SHEET1", 0, 0);
        let c = CellId::new("Sheet2", 0, 0);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.on_sheet("sheet1"));
    }

    #[test]
    fn test_col_to_letters() {
        assert_eq!(col_to_letters(0), "A");
        assert_eq!(col_to_letters(25), "Z");
        assert_eq!(col_to_letters(26), "AA");
        assert_eq!(col_to_letters(701), "ZZ");
        assert_eq!(col_to_letters(MAX_COLS - 1), "ZZZZ");
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("A1"), Ok((0, 0)));
        assert_eq!(parse_address("b3"), Ok((2, 1)));
        assert_eq!(parse_address("AA10"), Ok((9, 26)));
        assert_eq!(parse_address("ZZZZ9999"), Ok((9998, MAX_COLS - 1)));
        assert!(parse_address("A0").is_err());
        assert!(parse_address("1A").is_err());
        assert!(parse_address("A").is_err());
        assert!(parse_address("A1B").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn test_parse_location_bounds() {
        assert!(parse_location("ZZZZ9999").is_ok());
        assert!(parse_location("AAAAA1").is_err());
        assert!(parse_location("A10000").is_err());
        assert!(parse_location("A99999999999999999999999").is_err());
    }

    #[test]
    fn test_display() {
        let id = CellId::new("Data", 4, 27);
        assert_eq!(id.address(), "AB5");
        assert_eq!(id.to_string(), "DATA!AB5");
        assert_eq!(format_address(0, 0), "A1");
    }
}
