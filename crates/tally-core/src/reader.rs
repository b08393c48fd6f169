//! Tabular reader: raw upload bytes into a grid of text cells
//!
//! Supported formats:
//! - Delimited text (`csv`): ragged rows allowed, invalid UTF-8 replaced
//! - Spreadsheets (`xlsx`, `xlsm`, `xls`): first worksheet only
//!
//! Spreadsheet cells are rendered as display text and positioned at their
//! absolute sheet coordinates, so a sheet whose data starts at C3 still
//! yields two leading empty rows and two leading empty cells per row.
//! Trailing empty cells are dropped from every row.

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use csv::ReaderBuilder;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::Grid;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Spreadsheet,
}

impl TableFormat {
    /// Resolve a format from a file extension (with or without leading dot)
    pub fn from_extension(ext: &str) -> Result<Self> {
        let ext = ext.trim().trim_start_matches('.').to_lowercase();
        match ext.as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" | "xlsm" | "xls" => Ok(Self::Spreadsheet),
            "" => Err(Error::UnsupportedFormat("missing file extension".into())),
            other => Err(Error::UnsupportedFormat(format!(
                ".{} (expected .csv, .xlsx, .xlsm or .xls)",
                other
            ))),
        }
    }
}

/// Read raw upload bytes into a grid
pub fn read_grid(bytes: &[u8], extension: &str) -> Result<Grid> {
    let grid = match TableFormat::from_extension(extension)? {
        TableFormat::Csv => read_csv(bytes)?,
        TableFormat::Spreadsheet => read_spreadsheet(bytes)?,
    };
    debug!(rows = grid.len(), extension, "Read upload grid");
    Ok(grid)
}

/// Read a file from disk, using its extension to pick the format
pub fn read_path(path: &Path) -> Result<Grid> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_string();
    // Check the extension before touching the file
    TableFormat::from_extension(&extension)?;
    let bytes = std::fs::read(path)?;
    read_grid(&bytes, &extension)
}

fn read_csv(bytes: &[u8]) -> Result<Grid> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for result in rdr.byte_records() {
        let record = result?;
        rows.push(
            record
                .iter()
                .map(|field| String::from_utf8_lossy(field).into_owned())
                .collect(),
        );
    }

    Ok(Grid::new(rows))
}

fn read_spreadsheet(bytes: &[u8]) -> Result<Grid> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => return Ok(Grid::default()),
    };

    let (start_row, start_col) = match range.start() {
        Some((r, c)) => (r as usize, c as usize),
        None => return Ok(Grid::default()),
    };

    let mut rows: Vec<Vec<String>> = vec![Vec::new(); start_row];
    for sheet_row in range.rows() {
        let mut row = vec![String::new(); start_col];
        row.extend(sheet_row.iter().map(cell_text));
        while row.last().is_some_and(|c| c.is_empty()) {
            row.pop();
        }
        rows.push(row);
    }

    Ok(Grid::new(rows))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Error(e) => format!("{:?}", e),
        other => other.to_string(),
    }
}
