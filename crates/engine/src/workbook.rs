use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use bigdecimal::{BigDecimal, Zero};
use rustc_hash::FxHashMap;

use crate::cell::{Cell, CellValue};
use crate::cell_error::{CellError, ErrorKind};
use crate::cell_id::{parse_location, CellId};
use crate::dep_graph::DepGraph;
use crate::error::{Result, WorkbookError};
use crate::events::{ChangeCallback, ChangeTracker, ChangedCell};
use crate::formula::eval::{self, CellLookup, Value};
use crate::formula::parser::{format_formula, Expr, Reference};
use crate::formula::rename::{references_sheet, rename_sheet_refs};
use crate::recalc::RecalcReport;
use crate::sheet::Sheet;

/// Characters allowed in sheet names besides letters, digits and space.
const SHEET_NAME_PUNCTUATION: &str = ".?!,:;@#$%^&*()-_";

/// A workbook: ordered sheets, the dependency graph spanning them, and the
/// listeners told about value changes.
///
/// Every mutation runs to completion (re-parse, graph rewiring, cycle check,
/// full recompute) and then delivers one batch of net changes to each
/// registered listener.
pub struct Workbook {
    sheets: Vec<Sheet>,
    /// Uppercased sheet name -> position in `sheets`
    sheet_index: FxHashMap<String, usize>,
    dep_graph: DepGraph,
    listeners: Vec<ChangeCallback>,
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Workbook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workbook")
            .field("sheets", &self.sheets)
            .field("dep_graph", &self.dep_graph)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Workbook {
    pub fn new() -> Self {
        Self {
            sheets: Vec::new(),
            sheet_index: FxHashMap::default(),
            dep_graph: DepGraph::new(),
            listeners: Vec::new(),
        }
    }

    pub fn num_sheets(&self) -> usize {
        self.sheets.len()
    }

    /// Sheet names in order, with their original capitalization.
    pub fn list_sheets(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    /// Look up a sheet by case-insensitive name.
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheet_index
            .get(&name.to_uppercase())
            .map(|&pos| &self.sheets[pos])
    }

    pub fn dep_graph(&self) -> &DepGraph {
        &self.dep_graph
    }

    /// Register a listener. The same callback may be registered repeatedly
    /// and then fires once per registration.
    pub fn notify_cells_changed(&mut self, callback: ChangeCallback) {
        self.listeners.push(callback);
    }

    // =========================================================================
    // Sheet Management
    // =========================================================================

    /// Append a new sheet. Without a name, the first free `SheetN` is used.
    ///
    /// Formulas that already referenced the name start resolving again.
    pub fn new_sheet(&mut self, name: Option<&str>) -> Result<(usize, String)> {
        let name = match name {
            Some(name) => {
                self.validate_sheet_name(name)?;
                name.to_string()
            }
            None => self.generate_sheet_name(),
        };

        let pos = self.sheets.len();
        self.sheets.push(Sheet::new(&name));
        self.sheet_index.insert(name.to_uppercase(), pos);
        log::debug!("new sheet '{}' at {}", name, pos);

        let mut tracker = ChangeTracker::new();
        self.recompute(&mut tracker);
        self.notify(tracker);
        Ok((pos, name))
    }

    /// Delete a sheet. References to it from other sheets become `#REF!`
    /// until a sheet with the same name exists again.
    pub fn del_sheet(&mut self, name: &str) -> Result<()> {
        let pos = self.sheet_position(name)?;
        let sheet_name = self.sheets[pos].name().to_string();

        self.dep_graph.clear_refs_where(|cell| cell.on_sheet(&sheet_name));
        let removed = self.sheets.remove(pos);
        self.reindex();
        log::debug!("deleted sheet '{}'", removed.name());

        let mut tracker = ChangeTracker::new();
        self.recompute(&mut tracker);
        self.notify(tracker);
        Ok(())
    }

    /// Rename a sheet in place, rewriting every formula that names it.
    pub fn rename_sheet(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        let pos = self.sheet_position(old_name)?;
        self.validate_sheet_name(new_name)?;

        let old_display = self.sheets[pos].name().to_string();
        let old_upper = old_display.to_uppercase();
        let new_upper = new_name.to_uppercase();

        self.sheets[pos].set_name(new_name);
        self.sheet_index.remove(&old_upper);
        self.sheet_index.insert(new_upper.clone(), pos);
        log::debug!("renamed sheet '{}' to '{}'", old_display, new_name);

        let moved: Vec<CellId> = self
            .dep_graph
            .nodes()
            .filter(|cell| cell.sheet == old_upper)
            .cloned()
            .collect();
        for cell in &moved {
            let target = CellId {
                sheet: new_upper.clone(),
                row: cell.row,
                col: cell.col,
            };
            self.dep_graph.rename_cell(cell, &target);
        }

        let mut tracker = ChangeTracker::new();

        // Rewrite formulas naming the old sheet
        let mut rewrites: Vec<(usize, usize, usize, String)> = Vec::new();
        for (sheet_pos, sheet) in self.sheets.iter().enumerate() {
            for (&(row, col), cell) in sheet.cells_iter() {
                if let Some(expr) = cell.expr() {
                    if references_sheet(expr, &old_display) {
                        let mut expr = expr.clone();
                        rename_sheet_refs(&mut expr, &old_display, new_name);
                        rewrites.push((sheet_pos, row, col, format_formula(&expr)));
                    }
                }
            }
        }
        for (sheet_pos, row, col, text) in rewrites {
            let id = CellId::new(self.sheets[sheet_pos].name(), row, col);
            tracker.touch(&id, self.sheets[sheet_pos].get(row, col).and_then(Cell::value));
            self.sheets[sheet_pos].set_content(row, col, Some(&text));
        }

        // Coordinates under the new name may have existed only as dangling
        // references; link them to real cells now
        let relink: Vec<CellId> = self
            .dep_graph
            .nodes()
            .filter(|cell| cell.sheet == new_upper && cell.is_valid())
            .cloned()
            .collect();
        for id in &relink {
            self.sheets[pos].ensure(id.row, id.col);
            self.link_cell(id, pos);
        }
        for id in &relink {
            self.check_cycle(id, &mut tracker);
        }

        self.recompute(&mut tracker);
        self.notify(tracker);
        Ok(())
    }

    /// Move a sheet to `index`. Values and dependencies are untouched.
    pub fn move_sheet(&mut self, name: &str, index: usize) -> Result<()> {
        let pos = self.sheet_position(name)?;
        if index >= self.sheets.len() {
            return Err(WorkbookError::IndexOutOfRange {
                index,
                len: self.sheets.len(),
            });
        }

        let sheet = self.sheets.remove(pos);
        self.sheets.insert(index, sheet);
        self.reindex();
        Ok(())
    }

    /// Copy a sheet to the end of the workbook as `<name>_1`, `<name>_2`, ...
    ///
    /// Raw contents are replayed cell by cell in storage order, so listeners
    /// may see intermediate values before the copy settles.
    pub fn copy_sheet(&mut self, name: &str) -> Result<(usize, String)> {
        let pos = self.sheet_position(name)?;
        let original = self.sheets[pos].name().to_string();

        let mut suffix = 1;
        let copy_name = loop {
            let candidate = format!("{}_{}", original, suffix);
            if !self.sheet_index.contains_key(&candidate.to_uppercase()) {
                break candidate;
            }
            suffix += 1;
        };

        let contents: Vec<(usize, usize, String)> = self.sheets[pos]
            .cells_iter()
            .filter_map(|(&(row, col), cell)| cell.content().map(|c| (row, col, c.to_string())))
            .collect();

        let (copy_pos, copy_name) = self.new_sheet(Some(&copy_name))?;
        for (row, col, content) in contents {
            self.set_cell_at(copy_pos, row, col, Some(&content));
        }
        Ok((copy_pos, copy_name))
    }

    /// (rows, cols) spanned by cells with content.
    pub fn get_sheet_extent(&self, name: &str) -> Result<(usize, usize)> {
        let pos = self.sheet_position(name)?;
        Ok(self.sheets[pos].extent())
    }

    // =========================================================================
    // Cell Access
    // =========================================================================

    /// Set (or clear, with `None`) the raw content of a cell.
    pub fn set_cell_contents(&mut self, sheet: &str, location: &str, content: Option<&str>) -> Result<()> {
        let pos = self.sheet_position(sheet)?;
        let (row, col) = parse_location(location)
            .map_err(|_| WorkbookError::InvalidLocation(location.to_string()))?;
        self.set_cell_at(pos, row, col, content);
        Ok(())
    }

    /// Raw content as stored (trimmed; error literals uppercased).
    pub fn get_cell_contents(&self, sheet: &str, location: &str) -> Result<Option<String>> {
        Ok(self
            .cell(sheet, location)?
            .and_then(|cell| cell.content().map(str::to_string)))
    }

    pub fn get_cell_value(&self, sheet: &str, location: &str) -> Result<Option<CellValue>> {
        Ok(self.cell(sheet, location)?.and_then(|cell| cell.value().cloned()))
    }

    fn cell(&self, sheet: &str, location: &str) -> Result<Option<&Cell>> {
        let pos = self.sheet_position(sheet)?;
        let (row, col) = parse_location(location)
            .map_err(|_| WorkbookError::InvalidLocation(location.to_string()))?;
        Ok(self.sheets[pos].get(row, col))
    }

    fn set_cell_at(&mut self, pos: usize, row: usize, col: usize, content: Option<&str>) {
        let id = CellId::new(self.sheets[pos].name(), row, col);
        log::trace!("set {} = {:?}", id, content);

        let mut tracker = ChangeTracker::new();
        tracker.touch(&id, self.sheets[pos].get(row, col).and_then(Cell::value));
        self.sheets[pos].set_content(row, col, content);
        self.dep_graph.add_node(&id);
        self.link_cell(&id, pos);

        self.check_cycle(&id, &mut tracker);
        self.recompute(&mut tracker);
        self.notify(tracker);
    }

    // =========================================================================
    // Dependency Wiring
    // =========================================================================

    /// Replace the inbound edges of `id` with edges from its current
    /// references, materializing referenced cells on existing sheets.
    fn link_cell(&mut self, id: &CellId, pos: usize) {
        self.dep_graph.clear_refs(id);

        let refs: Vec<CellId> = match self.sheets[pos].get(id.row, id.col) {
            Some(cell) => cell
                .references()
                .iter()
                .filter_map(|r| resolve_reference(r, &id.sheet))
                .collect(),
            None => Vec::new(),
        };

        for target in refs {
            if let Some(&target_pos) = self.sheet_index.get(&target.sheet) {
                self.sheets[target_pos].ensure(target.row, target.col);
            }
            self.dep_graph.add_edge(&target, id);
        }
    }

    /// If `id` sits on a cycle, mark every formula in its component.
    fn check_cycle(&mut self, id: &CellId, tracker: &mut ChangeTracker) {
        if !self.dep_graph.in_cycle(id) {
            return;
        }
        let members: Vec<CellId> = self
            .dep_graph
            .component_of(id)
            .into_iter()
            .cloned()
            .collect();
        log::debug!("circular reference through {} ({} cells)", id, members.len());
        for member in members {
            let Some(&pos) = self.sheet_index.get(&member.sheet) else {
                continue;
            };
            if let Some(cell) = self.sheets[pos].get_mut(member.row, member.col) {
                if cell.is_formula() {
                    tracker.touch(&member, cell.value());
                    cell.set_value(Some(circular_reference()));
                }
            }
        }
    }

    // =========================================================================
    // Ordered Recompute
    // =========================================================================

    /// Evaluate every formula in topological order.
    ///
    /// Cells on a cycle are set to `#CIRCREF!` regardless of what their
    /// formula would produce. Nodes on missing sheets or outside the grid
    /// are skipped; other nodes without a cell get an implicit one.
    fn recompute(&mut self, tracker: &mut ChangeTracker) -> RecalcReport {
        let start = Instant::now();
        let mut report = RecalcReport::default();

        let order: Vec<CellId> = self.dep_graph.topo_order().into_iter().cloned().collect();
        for id in order {
            report.nodes_visited += 1;
            let pos = match self.sheet_index.get(&id.sheet) {
                Some(&pos) if id.is_valid() => pos,
                _ => {
                    report.skipped += 1;
                    continue;
                }
            };

            let cell = self.sheets[pos].ensure(id.row, id.col);
            if !cell.is_formula() {
                continue;
            }

            let value = if self.dep_graph.in_cycle(&id) {
                report.cycle_cells += 1;
                circular_reference()
            } else {
                self.evaluate_cell(&id, pos)
            };
            report.cells_recomputed += 1;

            if let Some(cell) = self.sheets[pos].get_mut(id.row, id.col) {
                tracker.touch(&id, cell.value());
                cell.set_value(Some(value));
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        log::debug!("{}", report.log_line());
        report
    }

    fn evaluate_cell(&self, id: &CellId, pos: usize) -> CellValue {
        let Some(cell) = self.sheets[pos].get(id.row, id.col) else {
            return CellValue::Number(BigDecimal::zero());
        };
        let Some(expr) = cell.expr() else {
            return cell.value().cloned().unwrap_or(CellValue::Number(BigDecimal::zero()));
        };

        // A formula that is nothing but one reference
        if let (Expr::CellRef(_), [reference]) = (expr, cell.references()) {
            if let Some(target) = resolve_reference(reference, &id.sheet) {
                if &target == id {
                    return circular_reference();
                }
                if let Some(&target_pos) = self.sheet_index.get(&target.sheet) {
                    let has_content = self.sheets[target_pos]
                        .get(target.row, target.col)
                        .is_some_and(Cell::has_content);
                    if !has_content {
                        return CellValue::Number(BigDecimal::zero());
                    }
                }
            }
        }

        eval::evaluate(expr, &WorkbookLookup::new(self, pos))
    }

    fn notify(&self, tracker: ChangeTracker) {
        log::trace!("{} cells touched", tracker.touched());
        let changes = tracker.into_changes(|id| self.value_at(id));
        let changed: Vec<ChangedCell> = changes
            .iter()
            .filter_map(|id| {
                let &pos = self.sheet_index.get(&id.sheet)?;
                Some((self.sheets[pos].name().to_string(), id.address()))
            })
            .collect();
        if changed.is_empty() {
            return;
        }

        log::debug!(
            "{} cells changed, notifying {} listeners",
            changed.len(),
            self.listeners.len()
        );
        for listener in &self.listeners {
            let result = panic::catch_unwind(AssertUnwindSafe(|| listener(self, &changed)));
            if result.is_err() {
                log::warn!("change listener panicked; ignoring");
            }
        }
    }

    fn value_at(&self, id: &CellId) -> Option<&CellValue> {
        let &pos = self.sheet_index.get(&id.sheet)?;
        self.sheets[pos].get(id.row, id.col)?.value()
    }

    // =========================================================================
    // Sheet Names
    // =========================================================================

    fn sheet_position(&self, name: &str) -> Result<usize> {
        self.sheet_index
            .get(&name.to_uppercase())
            .copied()
            .ok_or_else(|| WorkbookError::SheetNotFound(name.to_string()))
    }

    fn reindex(&mut self) {
        self.sheet_index = self
            .sheets
            .iter()
            .enumerate()
            .map(|(pos, sheet)| (sheet.name().to_uppercase(), pos))
            .collect();
    }

    fn generate_sheet_name(&self) -> String {
        let mut n = 1;
        loop {
            let candidate = format!("Sheet{}", n);
            if !self.sheet_index.contains_key(&candidate.to_uppercase()) {
                return candidate;
            }
            n += 1;
        }
    }

    fn validate_sheet_name(&self, name: &str) -> Result<()> {
        let invalid = |reason| WorkbookError::InvalidSheetName {
            name: name.to_string(),
            reason,
        };

        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if name.trim() != name {
            return Err(invalid("name has leading or trailing whitespace"));
        }
        if name.contains(['\'', '"']) {
            return Err(invalid("name contains a quote character"));
        }
        let allowed = |c: char| c.is_ascii_alphanumeric() || c == ' ' || SHEET_NAME_PUNCTUATION.contains(c);
        if !name.chars().all(allowed) {
            return Err(invalid("name contains an invalid character"));
        }
        if self.sheet_index.contains_key(&name.to_uppercase()) {
            return Err(WorkbookError::DuplicateSheetName(name.to_string()));
        }
        Ok(())
    }
}

fn circular_reference() -> CellValue {
    CellValue::Error(CellError::standard(ErrorKind::CircularReference))
}

/// Coordinate a reference points at, with unqualified references resolved
/// against `home_sheet`. `None` for addresses outside the grid.
fn resolve_reference(reference: &Reference, home_sheet: &str) -> Option<CellId> {
    let (sheet, addr) = match reference {
        Reference::Local(addr) => (home_sheet, addr),
        Reference::Sheet(sheet, addr) => (sheet.as_str(), addr),
    };
    let (row, col) = parse_location(addr).ok()?;
    Some(CellId::new(sheet, row, col))
}

// =============================================================================
// WorkbookLookup: cell access for the evaluator
// =============================================================================

/// Evaluator view of the workbook, bound to the sheet a formula lives on.
pub struct WorkbookLookup<'a> {
    workbook: &'a Workbook,
    sheet_pos: usize,
}

impl<'a> WorkbookLookup<'a> {
    pub fn new(workbook: &'a Workbook, sheet_pos: usize) -> Self {
        Self {
            workbook,
            sheet_pos,
        }
    }
}

impl<'a> CellLookup for WorkbookLookup<'a> {
    fn get_value(&self, row: usize, col: usize) -> Value {
        let sheet = &self.workbook.sheets[self.sheet_pos];
        Value::from_cell(sheet.get(row, col).and_then(Cell::value))
    }

    fn get_value_sheet(&self, sheet: &str, row: usize, col: usize) -> Value {
        match self.workbook.sheet(sheet) {
            Some(sheet) => Value::from_cell(sheet.get(row, col).and_then(Cell::value)),
            None => Value::Error(ErrorKind::BadReference),
        }
    }
}
