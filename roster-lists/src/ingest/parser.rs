//! Row parser: uploaded file bytes to raw records
//!
//! CSV rows are keyed by the header row exactly as written. Spreadsheets
//! (`.xlsx`, `.xls`) read only the first sheet, whose top row is the header.
//! The whole file is parsed before anything is returned.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use super::IngestError;

/// Accepted upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Xlsx,
    Xls,
}

impl FileFormat {
    /// Match a declared extension (`.csv`, `CSV`, ...) case-insensitively
    pub fn from_extension(extension: &str) -> Result<Self, IngestError> {
        let normalized = extension.trim().trim_start_matches('.').to_ascii_lowercase();
        match normalized.as_str() {
            "csv" => Ok(FileFormat::Csv),
            "xlsx" => Ok(FileFormat::Xlsx),
            "xls" => Ok(FileFormat::Xls),
            _ => Err(IngestError::UnsupportedFormat(extension.to_string())),
        }
    }

    /// Extension of an original file name, with the leading dot (empty if none)
    pub fn extension_of(file_name: &str) -> String {
        std::path::Path::new(file_name)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_ascii_lowercase()))
            .unwrap_or_default()
    }
}

/// One file row: column name to cell text, in column order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    fields: Vec<(String, String)>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.fields.push((column.into(), value.into()));
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = RawRecord::new();
        for (column, value) in iter {
            record.push(column, value);
        }
        record
    }
}

/// Parse a complete file into raw records
pub fn parse_rows(bytes: &[u8], format: FileFormat) -> Result<Vec<RawRecord>, IngestError> {
    match format {
        FileFormat::Csv => parse_csv(bytes),
        FileFormat::Xlsx | FileFormat::Xls => parse_spreadsheet(bytes),
    }
}

fn parse_csv(bytes: &[u8]) -> Result<Vec<RawRecord>, IngestError> {
    // Excel exports often carry a UTF-8 BOM in front of the first header
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| IngestError::ParseFailure(format!("CSV header: {}", e)))?
        .clone();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| IngestError::ParseFailure(format!("CSV: {}", e)))?;
        // Short rows simply omit the trailing columns
        let row: RawRecord = headers
            .iter()
            .zip(record.iter())
            .map(|(column, value)| (column.to_string(), value.to_string()))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

fn parse_spreadsheet(bytes: &[u8]) -> Result<Vec<RawRecord>, IngestError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| IngestError::ParseFailure(format!("Spreadsheet: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| IngestError::ParseFailure("Spreadsheet has no sheets".to_string()))?
        .map_err(|e| IngestError::ParseFailure(format!("Spreadsheet: {}", e)))?;

    let mut sheet_rows = range.rows();
    let headers: Vec<String> = match sheet_rows.next() {
        Some(header_row) => header_row.iter().map(cell_text).collect(),
        None => return Ok(Vec::new()),
    };

    let mut rows = Vec::new();
    for sheet_row in sheet_rows {
        let row: RawRecord = headers
            .iter()
            .zip(sheet_row.iter())
            .filter(|(column, _)| !column.is_empty())
            .map(|(column, cell)| (column.clone(), cell_text(cell)))
            .filter(|(_, value)| !value.is_empty())
            .collect();

        if !row.is_empty() {
            rows.push(row);
        }
    }

    Ok(rows)
}

/// Render a cell the way it reads in the sheet
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        // Phone numbers typed into a sheet come back as floats
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}
