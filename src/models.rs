use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;
use utoipa::ToSchema;

/// RF value written for a day that has no observation
pub const MISSING_RF_SENTINEL: f64 = -99.9;

// Column names expected in uploaded rainfall sheets
pub const PLACE_COLUMN: &str = "Place";
pub const DATE_COLUMN: &str = "Date";
pub const RF_COLUMN: &str = "RF";
pub const LNG_COLUMN: &str = "Lng";
pub const LAT_COLUMN: &str = "Lat";
pub const YEAR_COLUMN: &str = "Year";
pub const MONTH_COLUMN: &str = "Mth";
pub const DAY_COLUMN: &str = "Day";
pub const TEMP_COLUMN: &str = "temp";

static EMPTY_CELL: CellValue = CellValue::Empty;

/// A single cell read from a workbook or CSV file
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// True for empty cells and whitespace-only text
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Int(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Header row plus data rows, as read from the first (or a named) worksheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { headers, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell at (row, col); short rows read as empty
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    /// Remove a column by name, returning whether it existed
    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(idx) = self.column_index(name) else {
            return false;
        };
        self.headers.remove(idx);
        for row in &mut self.rows {
            if idx < row.len() {
                row.remove(idx);
            }
        }
        true
    }
}

/// One daily rainfall record for a place, real or synthesized
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRecord {
    pub place: String,
    pub date: NaiveDate,
    pub rf: Option<f64>,
    pub lng: Option<f64>,
    pub lat: Option<f64>,
    /// Values of pass-through columns, aligned with `ObservationSet::extra_columns`
    pub extra: Vec<CellValue>,
}

/// Synthesized records share the observation shape
pub type MissingRecord = ObservationRecord;

impl ObservationRecord {
    /// Sentinel record for a day with no observation
    pub fn missing(
        place: impl Into<String>,
        date: NaiveDate,
        lng: Option<f64>,
        lat: Option<f64>,
        extra_width: usize,
    ) -> MissingRecord {
        Self {
            place: place.into(),
            date,
            rf: Some(MISSING_RF_SENTINEL),
            lng,
            lat,
            extra: vec![CellValue::Empty; extra_width],
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.rf == Some(MISSING_RF_SENTINEL)
    }
}

/// Normalized observations plus the names of the columns passed through untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationSet {
    pub extra_columns: Vec<String>,
    pub records: Vec<ObservationRecord>,
    /// Rows dropped because their Place cell was blank
    pub skipped_rows: usize,
}

/// Completeness summary for one place
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PlaceGaps {
    pub place: String,
    pub observed_days: usize,
    pub missing_days: usize,
}

/// Date x place matrix of mean RF values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PivotMatrix {
    pub dates: Vec<NaiveDate>,
    pub places: Vec<String>,
    /// One row per entry of `dates`, one column per entry of `places`
    pub values: Vec<Vec<Option<f64>>>,
}

impl PivotMatrix {
    pub fn get(&self, date: NaiveDate, place: &str) -> Option<f64> {
        let row = self.dates.binary_search(&date).ok()?;
        let col = self.places.iter().position(|p| p == place)?;
        self.values[row][col]
    }
}
