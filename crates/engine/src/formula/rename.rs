//! Sheet-rename rewriting of formula ASTs.
//!
//! When a sheet is renamed, every qualified reference to it is repointed at
//! the new name. Quoting is normalized on every qualified reference in the
//! rewritten formula: a name is quoted iff it is not a bare identifier.

use super::parser::Expr;

/// True if `name` must be written as `'name'` inside a formula.
pub fn needs_quotes(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => true,
    }
}

fn same_sheet(a: &str, b: &str) -> bool {
    a.to_uppercase() == b.to_uppercase()
}

/// True if the expression has a qualified reference to `sheet` (case-insensitive).
pub fn references_sheet(expr: &Expr, sheet: &str) -> bool {
    match expr {
        Expr::Number { .. } | Expr::Text(_) | Expr::Error(_) => false,
        Expr::CellRef(cell_ref) => cell_ref
            .sheet
            .as_ref()
            .is_some_and(|s| same_sheet(&s.name, sheet)),
        Expr::Unary { operand, .. } => references_sheet(operand, sheet),
        Expr::BinaryOp { left, right, .. } => {
            references_sheet(left, sheet) || references_sheet(right, sheet)
        }
        Expr::Paren(inner) => references_sheet(inner, sheet),
    }
}

/// Repoint qualified references from `old` to `new` in place.
pub fn rename_sheet_refs(expr: &mut Expr, old: &str, new: &str) {
    match expr {
        Expr::Number { .. } | Expr::Text(_) | Expr::Error(_) => {}
        Expr::CellRef(cell_ref) => {
            if let Some(sheet) = cell_ref.sheet.as_mut() {
                if same_sheet(&sheet.name, old) {
                    sheet.name = new.to_string();
                }
                sheet.quoted = needs_quotes(&sheet.name);
            }
        }
        Expr::Unary { operand, .. } => rename_sheet_refs(operand, old, new),
        Expr::BinaryOp { left, right, .. } => {
            rename_sheet_refs(left, old, new);
            rename_sheet_refs(right, old, new);
        }
        Expr::Paren(inner) => rename_sheet_refs(inner, old, new),
    }
}
