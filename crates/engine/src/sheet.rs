use std::collections::{BTreeMap, BinaryHeap};

use rustc_hash::FxHashMap;

use super::cell::Cell;

/// Max-heap over row or column indices with per-index occupancy counts.
///
/// Removals only decrement the count; stale heap entries are dropped when
/// they reach the top.
#[derive(Debug, Clone, Default)]
struct MaxTracker {
    heap: BinaryHeap<usize>,
    counts: FxHashMap<usize, usize>,
}

impl MaxTracker {
    fn add(&mut self, index: usize) {
        let count = self.counts.entry(index).or_insert(0);
        *count += 1;
        if *count == 1 {
            self.heap.push(index);
        }
    }

    fn remove(&mut self, index: usize) {
        if let Some(count) = self.counts.get_mut(&index) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(&index);
            }
        }
        self.prune();
    }

    fn prune(&mut self) {
        while let Some(&top) = self.heap.peek() {
            if self.counts.contains_key(&top) {
                break;
            }
            self.heap.pop();
        }
    }

    fn max(&self) -> Option<usize> {
        self.heap.peek().copied()
    }
}

#[derive(Debug, Clone)]
pub struct Sheet {
    name: String,
    /// Row-major storage; iteration order is the sheet's storage order
    cells: BTreeMap<(usize, usize), Cell>,
    rows: MaxTracker,
    cols: MaxTracker,
}

impl Sheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cells: BTreeMap::new(),
            rows: MaxTracker::default(),
            cols: MaxTracker::default(),
        }
    }

    /// Name with its original capitalization.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    pub(crate) fn get_mut(&mut self, row: usize, col: usize) -> Option<&mut Cell> {
        self.cells.get_mut(&(row, col))
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.cells.contains_key(&(row, col))
    }

    /// Materialize an implicit cell if nothing is stored at (row, col).
    /// Implicit cells have no content and do not affect the extent.
    pub(crate) fn ensure(&mut self, row: usize, col: usize) -> &mut Cell {
        self.cells.entry((row, col)).or_default()
    }

    /// Write raw content, keeping the extent in step with occupancy.
    pub(crate) fn set_content(&mut self, row: usize, col: usize, content: Option<&str>) -> &mut Cell {
        let cell = self.cells.entry((row, col)).or_default();
        let had_content = cell.has_content();
        cell.update(content);
        let has_content = cell.has_content();

        if had_content && !has_content {
            self.rows.remove(row);
            self.cols.remove(col);
        } else if !had_content && has_content {
            self.rows.add(row);
            self.cols.add(col);
        }

        // Re-borrow after the extent bookkeeping
        self.cells.entry((row, col)).or_default()
    }

    /// Cells in storage order.
    pub fn cells_iter(&self) -> impl Iterator<Item = (&(usize, usize), &Cell)> {
        self.cells.iter()
    }

    /// (rows, cols) spanned by cells with content, or (0, 0) for an empty sheet.
    pub fn extent(&self) -> (usize, usize) {
        match (self.rows.max(), self.cols.max()) {
            (Some(row), Some(col)) => (row + 1, col + 1),
            _ => (0, 0),
        }
    }
}
