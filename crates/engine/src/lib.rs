//! In-memory spreadsheet engine.
//!
//! A [`Workbook`] holds named sheets of cells. Cells hold numbers, strings,
//! error literals or formulas; formulas are parsed once, wired into a
//! cross-sheet dependency graph and recomputed in topological order after
//! every edit. Circular references are detected through strongly connected
//! components and reported as `#CIRCREF!` values.

pub mod cell;
pub mod cell_error;
pub mod cell_id;
pub mod dep_graph;
pub mod error;
pub mod events;
pub mod formula;
pub mod number;
pub mod recalc;
pub mod sheet;
pub mod workbook;

pub use cell::{CellType, CellValue};
pub use cell_error::{CellError, ErrorKind};
pub use cell_id::{MAX_COLS, MAX_ROWS};
pub use error::{Result, WorkbookError};
pub use events::{ChangeCallback, ChangeCollector, ChangedCell};
pub use workbook::Workbook;
