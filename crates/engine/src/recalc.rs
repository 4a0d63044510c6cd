//! Recalculation reporting.
//!
//! Every full recompute produces a `RecalcReport`, which the workbook logs at
//! debug level.

/// Report from a full ordered recompute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecalcReport {
    /// Time taken for the recompute in milliseconds.
    pub duration_ms: u64,

    /// Graph nodes visited in topological order.
    pub nodes_visited: usize,

    /// Formula cells that were evaluated (including shortcut results).
    pub cells_recomputed: usize,

    /// Formula cells forced to a circular-reference error.
    pub cycle_cells: usize,

    /// Nodes skipped because their sheet is gone or their location is
    /// outside the grid.
    pub skipped: usize,
}

impl RecalcReport {
    pub fn had_cycles(&self) -> bool {
        self.cycle_cells > 0
    }

    /// Format as a single log line.
    pub fn log_line(&self) -> String {
        format!(
            "[recalc/full] {:>4}ms  {} nodes  {} cells  cycles={}  skipped={}",
            self.duration_ms,
            self.nodes_visited,
            self.cells_recomputed,
            self.cycle_cells,
            self.skipped,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recalc_report_default() {
        let report = RecalcReport::default();
        assert_eq!(report.duration_ms, 0);
        assert_eq!(report.cells_recomputed, 0);
        assert!(!report.had_cycles());
    }

    #[test]
    fn test_log_line() {
        let report = RecalcReport {
            duration_ms: 3,
            nodes_visited: 12,
            cells_recomputed: 7,
            cycle_cells: 2,
            skipped: 1,
        };
        assert!(report.had_cycles());
        assert_eq!(
            report.log_line(),
            "[recalc/full]    3ms  12 nodes  7 cells  cycles=2  skipped=1"
        );
    }
}
