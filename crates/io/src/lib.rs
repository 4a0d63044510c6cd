// Workbook persistence

pub mod json;

pub use json::{load_from_path, load_workbook, save_to_path, save_workbook, PersistError};
