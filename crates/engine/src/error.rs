//! Failures of workbook API calls.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkbookError {
    #[error("sheet '{0}' not found")]
    SheetNotFound(String),

    #[error("invalid sheet name '{name}': {reason}")]
    InvalidSheetName { name: String, reason: &'static str },

    #[error("sheet name '{0}' is already in use")]
    DuplicateSheetName(String),

    #[error("invalid cell location '{0}'")]
    InvalidLocation(String),

    #[error("sheet index {index} out of range for {len} sheets")]
    IndexOutOfRange { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, WorkbookError>;
