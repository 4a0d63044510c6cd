// Workbook-level scenarios: edits, cycles, cross-sheet references and
// sheet management, exercised through the public API only.

use std::str::FromStr;

use bigdecimal::{BigDecimal, Zero};
use sheetcore_engine::{CellValue, ErrorKind, Workbook, WorkbookError, MAX_COLS, MAX_ROWS};

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

fn value(wb: &Workbook, sheet: &str, loc: &str) -> Option<CellValue> {
    wb.get_cell_value(sheet, loc).unwrap()
}

fn number(wb: &Workbook, sheet: &str, loc: &str) -> BigDecimal {
    match value(wb, sheet, loc) {
        Some(CellValue::Number(n)) => n,
        other => panic!("{}!{} is not a number: {:?}", sheet, loc, other),
    }
}

fn error(wb: &Workbook, sheet: &str, loc: &str) -> ErrorKind {
    match value(wb, sheet, loc) {
        Some(CellValue::Error(e)) => e.kind,
        other => panic!("{}!{} is not an error: {:?}", sheet, loc, other),
    }
}

fn one_sheet() -> Workbook {
    let mut wb = Workbook::new();
    wb.new_sheet(Some("Sheet1")).unwrap();
    wb
}

// =============================================================================
// Values
// =============================================================================

#[test]
fn test_multiply_reference() {
    let mut wb = one_sheet();
    wb.set_cell_contents("Sheet1", "A1", Some("5")).unwrap();
    wb.set_cell_contents("Sheet1", "B1", Some("=A1*2")).unwrap();
    assert_eq!(number(&wb, "Sheet1", "B1"), dec("10"));
}

#[test]
fn test_numeric_string_coercion() {
    let mut wb = one_sheet();
    wb.set_cell_contents("Sheet1", "A1", Some("'  123")).unwrap();
    wb.set_cell_contents("Sheet1", "B1", Some("5.3")).unwrap();
    wb.set_cell_contents("Sheet1", "C1", Some("=A1*B1")).unwrap();
    assert_eq!(value(&wb, "Sheet1", "A1"), Some(CellValue::Text("  123".to_string())));
    assert_eq!(number(&wb, "Sheet1", "C1"), dec("651.9"));
}

#[test]
fn test_non_numeric_string_is_type_error() {
    let mut wb = one_sheet();
    wb.set_cell_contents("Sheet1", "A1", Some("apple")).unwrap();
    wb.set_cell_contents("Sheet1", "B1", Some("=A1+1")).unwrap();
    assert_eq!(error(&wb, "Sheet1", "B1"), ErrorKind::TypeError);
}

#[test]
fn test_concat_and_text() {
    let mut wb = one_sheet();
    wb.set_cell_contents("Sheet1", "A1", Some("2.50")).unwrap();
    wb.set_cell_contents("Sheet1", "B1", Some("=\"total: \" & A1")).unwrap();
    assert_eq!(value(&wb, "Sheet1", "B1"), Some(CellValue::Text("total: 2.5".to_string())));
}

#[test]
fn test_division_by_zero_propagates() {
    let mut wb = one_sheet();
    wb.set_cell_contents("Sheet1", "A1", Some("=1/0")).unwrap();
    wb.set_cell_contents("Sheet1", "B1", Some("=A1 + 5")).unwrap();
    assert_eq!(error(&wb, "Sheet1", "A1"), ErrorKind::DivideByZero);
    assert_eq!(error(&wb, "Sheet1", "B1"), ErrorKind::DivideByZero);
}

#[test]
fn test_parse_error_cell() {
    let mut wb = one_sheet();
    wb.set_cell_contents("Sheet1", "A1", Some("=1+")).unwrap();
    wb.set_cell_contents("Sheet1", "B1", Some("=A1")).unwrap();
    assert_eq!(error(&wb, "Sheet1", "A1"), ErrorKind::ParseError);
    assert_eq!(error(&wb, "Sheet1", "B1"), ErrorKind::ParseError);
    assert_eq!(wb.get_cell_contents("Sheet1", "A1").unwrap().as_deref(), Some("=1+"));
}

#[test]
fn test_oversized_formula_is_parse_error() {
    std::thread::Builder::new()
        .stack_size(8 * 1024 * 1024)
        .spawn(|| {
            let mut wb = one_sheet();
            let long = format!("={}1", "1+".repeat(1000));
            wb.set_cell_contents("Sheet1", "A1", Some(&long)).unwrap();
            assert_eq!(number(&wb, "Sheet1", "A1"), dec("1001"));

            let huge = format!("={}1", "1+".repeat(100_000));
            wb.set_cell_contents("Sheet1", "A2", Some(&huge)).unwrap();
            assert_eq!(error(&wb, "Sheet1", "A2"), ErrorKind::ParseError);

            let nested = format!("={}1{}", "(".repeat(100_000), ")".repeat(100_000));
            wb.set_cell_contents("Sheet1", "A3", Some(&nested)).unwrap();
            assert_eq!(error(&wb, "Sheet1", "A3"), ErrorKind::ParseError);
            assert_eq!(wb.get_cell_contents("Sheet1", "A3").unwrap(), Some(nested));
        })
        .unwrap()
        .join()
        .unwrap();
}

#[test]
fn test_error_literal_content() {
    let mut wb = one_sheet();
    wb.set_cell_contents("Sheet1", "A1", Some("#div/0!")).unwrap();
    assert_eq!(wb.get_cell_contents("Sheet1", "A1").unwrap().as_deref(), Some("#DIV/0!"));
    assert_eq!(error(&wb, "Sheet1", "A1"), ErrorKind::DivideByZero);
}

#[test]
fn test_out_of_range_reference() {
    let mut wb = one_sheet();
    wb.set_cell_contents("Sheet1", "A1", Some("=ZZZZZ1")).unwrap();
    assert_eq!(error(&wb, "Sheet1", "A1"), ErrorKind::BadReference);
}

#[test]
fn test_grid_bounds() {
    let mut wb = one_sheet();
    assert_eq!(MAX_ROWS, 9999);
    assert_eq!(MAX_COLS, 475_254);
    wb.set_cell_contents("Sheet1", "ZZZZ9999", Some("1")).unwrap();
    assert_eq!(wb.get_sheet_extent("Sheet1").unwrap(), (9999, 475_254));
    assert!(matches!(
        wb.set_cell_contents("Sheet1", "A10000", Some("1")),
        Err(WorkbookError::InvalidLocation(_))
    ));
    assert!(matches!(
        wb.set_cell_contents("Sheet1", "AAAAA1", Some("1")),
        Err(WorkbookError::InvalidLocation(_))
    ));
}

#[test]
fn test_clearing_a_cell_zeroes_dependents() {
    let mut wb = one_sheet();
    wb.set_cell_contents("Sheet1", "A1", Some("8")).unwrap();
    wb.set_cell_contents("Sheet1", "B1", Some("=A1")).unwrap();
    wb.set_cell_contents("Sheet1", "C1", Some("=A1 * 1")).unwrap();
    wb.set_cell_contents("Sheet1", "A1", None).unwrap();
    assert_eq!(number(&wb, "Sheet1", "B1"), BigDecimal::zero());
    assert_eq!(number(&wb, "Sheet1", "C1"), BigDecimal::zero());
    assert_eq!(wb.get_cell_contents("Sheet1", "A1").unwrap(), None);
}

#[test]
fn test_long_chain_updates() {
    let mut wb = one_sheet();
    wb.set_cell_contents("Sheet1", "A1", Some("1")).unwrap();
    for row in 2..=500 {
        let formula = format!("=A{}+1", row - 1);
        wb.set_cell_contents("Sheet1", &format!("A{}", row), Some(&formula)).unwrap();
    }
    assert_eq!(number(&wb, "Sheet1", "A500"), dec("500"));

    wb.set_cell_contents("Sheet1", "A1", Some("101")).unwrap();
    assert_eq!(number(&wb, "Sheet1", "A500"), dec("600"));
}

// =============================================================================
// Cycles
// =============================================================================

#[test]
fn test_mutual_cycle_then_break() {
    let mut wb = one_sheet();
    wb.set_cell_contents("Sheet1", "A1", Some("=B1")).unwrap();
    wb.set_cell_contents("Sheet1", "B1", Some("=A1")).unwrap();
    assert_eq!(error(&wb, "Sheet1", "A1"), ErrorKind::CircularReference);
    assert_eq!(error(&wb, "Sheet1", "B1"), ErrorKind::CircularReference);

    wb.set_cell_contents("Sheet1", "A1", Some("3")).unwrap();
    assert_eq!(number(&wb, "Sheet1", "A1"), dec("3"));
    assert_eq!(number(&wb, "Sheet1", "B1"), dec("3"));
}

#[test]
fn test_cross_sheet_cycle() {
    let mut wb = one_sheet();
    wb.new_sheet(Some("Other")).unwrap();
    wb.set_cell_contents("Sheet1", "A1", Some("=Other!A1 + 1")).unwrap();
    wb.set_cell_contents("Other", "A1", Some("=Sheet1!B1")).unwrap();
    wb.set_cell_contents("Sheet1", "B1", Some("=A1")).unwrap();
    for (sheet, loc) in [("Sheet1", "A1"), ("Other", "A1"), ("Sheet1", "B1")] {
        assert_eq!(error(&wb, sheet, loc), ErrorKind::CircularReference, "{}!{}", sheet, loc);
    }
}

#[test]
fn test_cycle_beats_divide_by_zero() {
    let mut wb = one_sheet();
    wb.set_cell_contents("Sheet1", "A1", Some("=B1/0")).unwrap();
    wb.set_cell_contents("Sheet1", "B1", Some("=C1")).unwrap();
    wb.set_cell_contents("Sheet1", "C1", Some("=A1")).unwrap();
    assert_eq!(error(&wb, "Sheet1", "A1"), ErrorKind::CircularReference);
}

#[test]
fn test_cycle_detail_text() {
    let mut wb = one_sheet();
    wb.set_cell_contents("Sheet1", "A1", Some("=A1")).unwrap();
    match value(&wb, "Sheet1", "A1") {
        Some(CellValue::Error(e)) => {
            assert_eq!(e.to_string(), "#CIRCREF!");
            assert!(!e.detail.is_empty());
        }
        other => panic!("expected error, got {:?}", other),
    }
}

// =============================================================================
// Sheets
// =============================================================================

#[test]
fn test_missing_sheet_heals_on_create() {
    let mut wb = one_sheet();
    wb.set_cell_contents("Sheet1", "A1", Some("=Sheet2!A1")).unwrap();
    assert_eq!(error(&wb, "Sheet1", "A1"), ErrorKind::BadReference);
    wb.new_sheet(Some("Sheet2")).unwrap();
    assert_eq!(number(&wb, "Sheet1", "A1"), BigDecimal::zero());
}

#[test]
fn test_rename_quotes_new_name() {
    let mut wb = one_sheet();
    wb.new_sheet(Some("Sheet2")).unwrap();
    wb.set_cell_contents("Sheet1", "A1", Some("=Sheet2!A1 * (sheet2!B1 + 1)")).unwrap();
    wb.rename_sheet("Sheet2", "Sheet-2").unwrap();
    assert_eq!(
        wb.get_cell_contents("Sheet1", "A1").unwrap().as_deref(),
        Some("='Sheet-2'!A1*('Sheet-2'!B1+1)")
    );
}

#[test]
fn test_rename_drops_unneeded_quotes() {
    let mut wb = one_sheet();
    wb.new_sheet(Some("Old Name")).unwrap();
    wb.set_cell_contents("Old Name", "A1", Some("4")).unwrap();
    wb.set_cell_contents("Sheet1", "A1", Some("='Old Name'!A1 + 'Sheet1'!B1")).unwrap();
    wb.rename_sheet("old name", "Renamed").unwrap();
    assert_eq!(
        wb.get_cell_contents("Sheet1", "A1").unwrap().as_deref(),
        Some("=Renamed!A1+Sheet1!B1")
    );
    assert_eq!(number(&wb, "Sheet1", "A1"), dec("4"));
}

#[test]
fn test_rename_local_references_follow() {
    let mut wb = one_sheet();
    wb.set_cell_contents("Sheet1", "A1", Some("2")).unwrap();
    wb.set_cell_contents("Sheet1", "B1", Some("=A1 * 3")).unwrap();
    wb.rename_sheet("Sheet1", "Inputs").unwrap();

    wb.set_cell_contents("Inputs", "A1", Some("5")).unwrap();
    assert_eq!(number(&wb, "Inputs", "B1"), dec("15"));
    assert!(matches!(wb.get_cell_value("Sheet1", "B1"), Err(WorkbookError::SheetNotFound(_))));
}

#[test]
fn test_copy_then_move_and_delete() {
    let mut wb = one_sheet();
    wb.set_cell_contents("Sheet1", "A1", Some("1")).unwrap();
    wb.set_cell_contents("Sheet1", "A2", Some("=A1 + Sheet1!A1")).unwrap();

    let (index, name) = wb.copy_sheet("Sheet1").unwrap();
    assert_eq!((index, name.as_str()), (1, "Sheet1_1"));
    assert_eq!(wb.get_sheet_extent("Sheet1_1").unwrap(), (2, 1));
    // Qualified references still point at the source sheet
    wb.set_cell_contents("Sheet1", "A1", Some("10")).unwrap();
    assert_eq!(number(&wb, "Sheet1_1", "A2"), dec("11"));

    wb.move_sheet("Sheet1_1", 0).unwrap();
    assert_eq!(wb.list_sheets(), vec!["Sheet1_1", "Sheet1"]);

    wb.del_sheet("Sheet1").unwrap();
    assert_eq!(error(&wb, "Sheet1_1", "A2"), ErrorKind::BadReference);
    assert_eq!(wb.num_sheets(), 1);
}
