// JSON workbook format
//
// {"sheets": [{"name": "Sheet1", "cell-contents": {"A1": "5", "B1": "=A1*2"}}]}
//
// Only cells with content are written. Loading replays every entry through
// the workbook's edit path, so values, dependencies and validation behave
// exactly as if the contents had been typed in.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use sheetcore_engine::cell_id::format_address;
use sheetcore_engine::{Workbook, WorkbookError};

const SHEETS_KEY: &str = "sheets";
const NAME_KEY: &str = "name";
const CONTENTS_KEY: &str = "cell-contents";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("missing required key: {0}")]
    MissingKey(String),

    #[error("unexpected type: {0}")]
    TypeMismatch(String),

    #[error(transparent)]
    Workbook(#[from] WorkbookError),
}

#[derive(Serialize)]
struct WorkbookDoc<'a> {
    sheets: Vec<SheetDoc<'a>>,
}

#[derive(Serialize)]
struct SheetDoc<'a> {
    name: &'a str,
    #[serde(rename = "cell-contents")]
    cell_contents: Map<String, Value>,
}

/// Write `workbook` as pretty-printed JSON.
pub fn save_workbook<W: Write>(workbook: &Workbook, mut writer: W) -> Result<(), PersistError> {
    let sheets = workbook
        .sheets()
        .iter()
        .map(|sheet| {
            let cell_contents = sheet
                .cells_iter()
                .filter_map(|(&(row, col), cell)| {
                    cell.content()
                        .map(|content| (format_address(row, col), Value::String(content.to_string())))
                })
                .collect();
            SheetDoc {
                name: sheet.name(),
                cell_contents,
            }
        })
        .collect();

    serde_json::to_writer_pretty(&mut writer, &WorkbookDoc { sheets })?;
    writer.flush()?;
    Ok(())
}

/// Read a workbook written by [`save_workbook`].
pub fn load_workbook<R: Read>(reader: R) -> Result<Workbook, PersistError> {
    let doc: Value = serde_json::from_reader(reader)?;
    let root = doc
        .as_object()
        .ok_or_else(|| PersistError::TypeMismatch("top level must be an object".to_string()))?;
    let sheets = root
        .get(SHEETS_KEY)
        .ok_or_else(|| PersistError::MissingKey(SHEETS_KEY.to_string()))?
        .as_array()
        .ok_or_else(|| PersistError::TypeMismatch(format!("\"{}\" must be a list", SHEETS_KEY)))?;

    let mut entries: Vec<(&str, &Map<String, Value>)> = Vec::with_capacity(sheets.len());
    for (i, sheet) in sheets.iter().enumerate() {
        let sheet = sheet
            .as_object()
            .ok_or_else(|| PersistError::TypeMismatch(format!("sheet {} must be an object", i)))?;
        let name = sheet
            .get(NAME_KEY)
            .ok_or_else(|| PersistError::MissingKey(format!("sheet {}: \"{}\"", i, NAME_KEY)))?
            .as_str()
            .ok_or_else(|| PersistError::TypeMismatch(format!("sheet {}: name must be a string", i)))?;
        let contents = sheet
            .get(CONTENTS_KEY)
            .ok_or_else(|| PersistError::MissingKey(format!("sheet '{}': \"{}\"", name, CONTENTS_KEY)))?
            .as_object()
            .ok_or_else(|| {
                PersistError::TypeMismatch(format!("sheet '{}': \"{}\" must be an object", name, CONTENTS_KEY))
            })?;
        entries.push((name, contents));
    }

    let mut workbook = Workbook::new();
    for &(name, _) in &entries {
        workbook.new_sheet(Some(name))?;
    }
    for (name, contents) in &entries {
        for (location, content) in contents.iter() {
            let content = content.as_str().ok_or_else(|| {
                PersistError::TypeMismatch(format!("sheet '{}': contents of {} must be a string", name, location))
            })?;
            workbook.set_cell_contents(name, location, Some(content))?;
        }
    }

    log::debug!("loaded workbook with {} sheets", workbook.num_sheets());
    Ok(workbook)
}

pub fn save_to_path(workbook: &Workbook, path: &Path) -> Result<(), PersistError> {
    let file = File::create(path)?;
    save_workbook(workbook, BufWriter::new(file))
}

pub fn load_from_path(path: &Path) -> Result<Workbook, PersistError> {
    let file = File::open(path)?;
    load_workbook(BufReader::new(file))
}
