use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{CellValue, RawTable};

#[derive(Error, Debug)]
pub enum SpreadsheetImportError {
    #[error("Unsupported file type: {0} (expected .xlsx, .xlsm, .xlsb, .xls, .ods or .csv)")]
    UnsupportedFormat(String),

    #[error("Failed to open workbook: {0}")]
    WorkbookOpen(String),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Sheet has no header row")]
    EmptySheet,

    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Workbook,
    Csv,
}

impl FileKind {
    fn from_name(file_name: &str) -> Result<Self, SpreadsheetImportError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if extension == "csv" {
            Ok(Self::Csv)
        } else if WORKBOOK_EXTENSIONS.contains(&extension.as_str()) {
            Ok(Self::Workbook)
        } else {
            Err(SpreadsheetImportError::UnsupportedFormat(
                file_name.to_string(),
            ))
        }
    }
}

#[derive(Debug, Clone)]
enum Source {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// Reader for uploaded rainfall sheets
///
/// Workbooks are read from the first worksheet unless a name is given; the
/// first row holds the column names. CSV files are read as text cells.
#[derive(Debug, Clone)]
pub struct SpreadsheetImporter {
    file_name: String,
    source: Source,
    worksheet: Option<String>,
}

impl SpreadsheetImporter {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            file_name: path.to_string_lossy().to_string(),
            source: Source::Path(path),
            worksheet: None,
        }
    }

    /// In-memory upload; `file_name` decides the format
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            source: Source::Bytes(bytes),
            worksheet: None,
        }
    }

    pub fn with_worksheet(mut self, worksheet: Option<String>) -> Self {
        self.worksheet = worksheet;
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Read the header row and all data rows
    ///
    /// Synchronous; async callers should use spawn_blocking.
    pub fn read_table(self) -> Result<RawTable, SpreadsheetImportError> {
        let kind = FileKind::from_name(&self.file_name)?;
        info!("Reading {:?} file: {}", kind, self.file_name);

        let table = match (kind, self.source) {
            (FileKind::Csv, Source::Path(path)) => read_csv(std::fs::File::open(path)?)?,
            (FileKind::Csv, Source::Bytes(bytes)) => read_csv(Cursor::new(bytes))?,
            (FileKind::Workbook, Source::Path(path)) => {
                let workbook = open_workbook_auto(&path)
                    .map_err(|e| SpreadsheetImportError::WorkbookOpen(e.to_string()))?;
                read_workbook(workbook, self.worksheet.as_deref())?
            }
            (FileKind::Workbook, Source::Bytes(bytes)) => {
                let workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
                    .map_err(|e| SpreadsheetImportError::WorkbookOpen(e.to_string()))?;
                read_workbook(workbook, self.worksheet.as_deref())?
            }
        };

        info!(
            "Read {} rows with columns {:?} from {}",
            table.rows.len(),
            table.headers,
            self.file_name
        );
        Ok(table)
    }
}

fn read_workbook<RS: Read + Seek>(
    mut workbook: Sheets<RS>,
    worksheet: Option<&str>,
) -> Result<RawTable, SpreadsheetImportError> {
    let range = match worksheet {
        Some(name) => workbook
            .worksheet_range(name)
            .map_err(|_| SpreadsheetImportError::SheetNotFound(name.to_string()))?,
        None => {
            let first = workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or(SpreadsheetImportError::EmptySheet)?;
            debug!("No worksheet given, using first sheet '{}'", first);
            workbook
                .worksheet_range(&first)
                .map_err(|e| SpreadsheetImportError::WorkbookOpen(e.to_string()))?
        }
    };

    range_to_table(&range)
}

fn range_to_table(range: &Range<Data>) -> Result<RawTable, SpreadsheetImportError> {
    let mut rows = range.rows();
    let header = rows.next().ok_or(SpreadsheetImportError::EmptySheet)?;
    let headers: Vec<String> = header.iter().map(header_name).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(SpreadsheetImportError::EmptySheet);
    }
    debug!("Header row: {:?}", headers);

    let rows = rows
        .map(|row| row.iter().map(cell_value).collect())
        .collect();
    Ok(RawTable::new(headers, rows))
}

fn header_name(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{f:.0}"),
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

/// Map a workbook cell to a typed cell; error cells read as empty
fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::Float(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => {
            debug!("Cell error {:?}, reading as empty", e);
            CellValue::Empty
        }
        Data::Empty => CellValue::Empty,
    }
}

fn read_csv<R: Read>(reader: R) -> Result<RawTable, SpreadsheetImportError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(SpreadsheetImportError::EmptySheet);
    }

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(RawTable::new(headers, rows))
}
