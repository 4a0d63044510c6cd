//! Change notification for workbook mutations.
//!
//! Every mutating call reports the cells whose value it changed, as one
//! batch of `(sheet name, A1 address)` pairs delivered to each registered
//! callback. Sheet names keep the capitalization the sheet was created with.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::cell::{values_match, CellValue};
use crate::cell_id::CellId;
use crate::workbook::Workbook;

/// A changed cell: (sheet name, uppercase A1 address).
pub type ChangedCell = (String, String);

/// Callback invoked after each mutation that changed at least one value.
///
/// Callbacks get a shared borrow of the workbook and must not assume they
/// run in any particular relation to other callbacks beyond registration
/// order. The same `Rc` may be registered more than once.
pub type ChangeCallback = Rc<dyn Fn(&Workbook, &[ChangedCell])>;

/// Records the value each cell had the first time a mutation touched it.
///
/// At the end of the mutation the cells whose final value differs from that
/// first snapshot are the net changes, in first-touch order.
#[derive(Debug, Default)]
pub(crate) struct ChangeTracker {
    order: Vec<CellId>,
    before: FxHashMap<CellId, Option<CellValue>>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot `value` unless `cell` was already touched.
    pub fn touch(&mut self, cell: &CellId, value: Option<&CellValue>) {
        if !self.before.contains_key(cell) {
            self.before.insert(cell.clone(), value.cloned());
            self.order.push(cell.clone());
        }
    }

    pub fn touched(&self) -> usize {
        self.order.len()
    }

    /// Cells whose current value differs from their first snapshot.
    pub fn into_changes<'w, F>(self, current: F) -> Vec<CellId>
    where
        F: Fn(&CellId) -> Option<&'w CellValue>,
    {
        let ChangeTracker { order, before } = self;
        order
            .into_iter()
            .filter(|cell| {
                let old = before.get(cell).and_then(Option::as_ref);
                !values_match(old, current(cell))
            })
            .collect()
    }
}

/// Collects notification batches; handy for tests and simple listeners.
#[derive(Debug, Clone, Default)]
pub struct ChangeCollector {
    batches: Rc<RefCell<Vec<Vec<ChangedCell>>>>,
}

impl ChangeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback that appends every batch to this collector.
    pub fn callback(&self) -> ChangeCallback {
        let batches = Rc::clone(&self.batches);
        Rc::new(move |_: &Workbook, changed: &[ChangedCell]| {
            batches.borrow_mut().push(changed.to_vec());
        })
    }

    pub fn batches(&self) -> Vec<Vec<ChangedCell>> {
        self.batches.borrow().clone()
    }

    /// Every notified cell across batches, in delivery order.
    pub fn all(&self) -> Vec<ChangedCell> {
        self.batches.borrow().iter().flatten().cloned().collect()
    }

    /// How many times (sheet, address) was notified.
    pub fn count_for(&self, sheet: &str, address: &str) -> usize {
        self.batches
            .borrow()
            .iter()
            .flatten()
            .filter(|(s, a)| s == sheet && a == address)
            .count()
    }

    pub fn clear(&self) {
        self.batches.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.batches.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;

    use crate::cell_error::{CellError, ErrorKind};

    fn id(row: usize) -> CellId {
        CellId::new("Sheet1", row, 0)
    }

    #[test]
    fn test_tracker_keeps_first_snapshot() {
        let one = CellValue::Number(BigDecimal::from(1));
        let two = CellValue::Number(BigDecimal::from(2));

        let mut tracker = ChangeTracker::new();
        tracker.touch(&id(0), Some(&one));
        tracker.touch(&id(0), Some(&two));
        assert_eq!(tracker.touched(), 1);

        // Went 1 → 2 → 1: no net change
        let changes = tracker.into_changes(|_| Some(&one));
        assert!(changes.is_empty());
    }

    #[test]
    fn test_tracker_reports_in_first_touch_order() {
        let one = CellValue::Number(BigDecimal::from(1));
        let mut tracker = ChangeTracker::new();
        tracker.touch(&id(2), None);
        tracker.touch(&id(0), None);
        tracker.touch(&id(1), Some(&one));

        let changes = tracker.into_changes(|_| Some(&one));
        assert_eq!(changes, vec![id(2), id(0)]);
    }

    #[test]
    fn test_tracker_error_kinds() {
        let circ_a = CellValue::Error(CellError::new(ErrorKind::CircularReference, "a"));
        let circ_b = CellValue::Error(CellError::new(ErrorKind::CircularReference, "b"));
        let bad_ref = CellValue::Error(CellError::standard(ErrorKind::BadReference));

        let mut tracker = ChangeTracker::new();
        tracker.touch(&id(0), Some(&circ_a));
        tracker.touch(&id(1), Some(&circ_a));
        let changes = tracker.into_changes(|cell| {
            if cell.row == 0 {
                Some(&circ_b)
            } else {
                Some(&bad_ref)
            }
        });
        assert_eq!(changes, vec![id(1)]);
    }

    #[test]
    fn test_collector_counts() {
        let collector = ChangeCollector::new();
        let wb = Workbook::new();
        let callback = collector.callback();
        callback(&wb, &[("Sheet1".to_string(), "A1".to_string())]);
        callback(
            &wb,
            &[
                ("Sheet1".to_string(), "A1".to_string()),
                ("Sheet1".to_string(), "B1".to_string()),
            ],
        );
        assert_eq!(collector.len(), 2);
        assert_eq!(collector.count_for("Sheet1", "A1"), 2);
        assert_eq!(collector.all().len(), 3);
        collector.clear();
        assert!(collector.is_empty());
    }
}
