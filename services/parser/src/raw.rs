//! Raw tabular input, before any schema reconciliation.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use crate::error::NormalizeError;

/// Header row plus data rows, as strings. Every row has exactly
/// `headers.len()` cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    DelimitedText,
    /// xls / xlsx / ods, read through calamine.
    Workbook,
}

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

impl SourceFormat {
    /// Detect the container from its leading bytes.
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) {
            SourceFormat::Workbook
        } else {
            SourceFormat::DelimitedText
        }
    }
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let headers: Vec<String> = headers.into_iter().map(|h| h.trim().to_string()).collect();
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { headers, rows }
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    /// Parse comma-delimited text. Short rows are padded, long rows truncated.
    pub fn from_csv_text(text: &str) -> Result<Self, NormalizeError> {
        let head = text.trim_start();
        if head.is_empty() {
            return Err(NormalizeError::EmptySource);
        }
        let lowered: String = head.chars().take(64).collect::<String>().to_lowercase();
        if lowered.starts_with("<!doctype html") || lowered.starts_with("<html") {
            return Err(NormalizeError::NotTabular("received an HTML document".to_string()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b',')
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(NormalizeError::EmptySource);
        }
        if let [only] = headers.as_slice() {
            for (needle, delimiter) in [(';', "semicolon"), ('\t', "tab")] {
                if only.contains(needle) {
                    return Err(NormalizeError::WrongDelimiter {
                        header: only.clone(),
                        delimiter,
                    });
                }
            }
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(|cell| cell.to_string()).collect());
        }

        Ok(Self::new(headers, rows))
    }

    /// Read the first sheet of a workbook; the first row is the header.
    pub fn from_workbook(bytes: &[u8]) -> Result<Self, NormalizeError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

        let sheet_names = workbook.sheet_names().to_vec();
        let sheet_name = sheet_names
            .first()
            .ok_or_else(|| NormalizeError::Workbook("workbook has no sheets".to_string()))?;
        tracing::debug!(sheet = %sheet_name, sheets = sheet_names.len(), "reading first sheet");

        let range = workbook.worksheet_range(sheet_name)?;
        let mut rows = range.rows().map(|row| row.iter().map(cell_text).collect::<Vec<_>>());

        let headers = rows.next().ok_or(NormalizeError::EmptySource)?;
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(NormalizeError::EmptySource);
        }

        Ok(Self::new(headers, rows.collect()))
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        other => format!("{}", other),
    }
}
