//! Raw sheet normalization
//!
//! Resolves Year/Mth/Day defaults per row, builds the calendar date and keeps
//! every other column except the legacy "temp" column. Input columns named
//! like an output column (an old `Date`, a second `Place`) are replaced by the
//! normalized values rather than passed through.
use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::gap_fill::GapFillError;
use crate::models::{
    CellValue, ObservationRecord, ObservationSet, RawTable, DATE_COLUMN, DAY_COLUMN, LAT_COLUMN,
    LNG_COLUMN, MONTH_COLUMN, PLACE_COLUMN, RF_COLUMN, TEMP_COLUMN, YEAR_COLUMN,
};

// Data rows start on spreadsheet row 2, below the header
const FIRST_DATA_ROW: usize = 2;

// Headers written for every record; extra columns may not reuse them
const OUTPUT_COLUMNS: [&str; 5] = [PLACE_COLUMN, DATE_COLUMN, RF_COLUMN, LNG_COLUMN, LAT_COLUMN];

/// Column positions resolved once per table
struct ColumnLayout {
    place: usize,
    rf: usize,
    lng: usize,
    lat: usize,
    year: Option<usize>,
    month: Option<usize>,
    day: Option<usize>,
    extra: Vec<usize>,
}

impl ColumnLayout {
    fn resolve(table: &RawTable) -> Result<Self, GapFillError> {
        let required = |name: &str| {
            table
                .column_index(name)
                .ok_or_else(|| GapFillError::MissingColumn(name.to_string()))
        };

        let place = required(PLACE_COLUMN)?;
        let rf = required(RF_COLUMN)?;
        let lng = required(LNG_COLUMN)?;
        let lat = required(LAT_COLUMN)?;
        let year = table.column_index(YEAR_COLUMN);
        let month = table.column_index(MONTH_COLUMN);
        let day = table.column_index(DAY_COLUMN);

        let used = [Some(place), Some(rf), Some(lng), Some(lat), year, month, day];
        let extra = (0..table.headers.len())
            .filter(|idx| !used.contains(&Some(*idx)))
            .filter(|idx| {
                let name = table.headers[*idx].as_str();
                let shadowed = OUTPUT_COLUMNS.contains(&name);
                if shadowed {
                    debug!("Dropping input column '{}' in favour of the normalized one", name);
                }
                !shadowed
            })
            .collect();

        Ok(Self {
            place,
            rf,
            lng,
            lat,
            year,
            month,
            day,
            extra,
        })
    }
}

/// Normalize a raw rainfall table for the target `year`
pub fn normalize(mut table: RawTable, year: i32) -> Result<ObservationSet, GapFillError> {
    if table.drop_column(TEMP_COLUMN) {
        debug!("Dropped legacy '{}' column", TEMP_COLUMN);
    }

    let layout = ColumnLayout::resolve(&table)?;
    let extra_columns: Vec<String> = layout
        .extra
        .iter()
        .map(|idx| table.headers[*idx].clone())
        .collect();
    if !extra_columns.is_empty() {
        debug!("Passing through extra columns: {:?}", extra_columns);
    }

    let mut records = Vec::with_capacity(table.rows.len());
    let mut skipped_rows = 0;
    for (idx, row) in table.rows.iter().enumerate() {
        let row_number = idx + FIRST_DATA_ROW;

        if row.iter().all(CellValue::is_blank) {
            debug!("Blank row {}, skipping", row_number);
            continue;
        }

        let Some(place) = place_name(table.cell(idx, layout.place)) else {
            warn!("Row {} has no Place, skipping", row_number);
            skipped_rows += 1;
            continue;
        };

        let component = |col: Option<usize>, name: &str, default: i64| match col {
            Some(c) => date_component(table.cell(idx, c), row_number, name, default),
            None => Ok(default),
        };
        let y = component(layout.year, YEAR_COLUMN, i64::from(year))?;
        let m = component(layout.month, MONTH_COLUMN, 1)?;
        let d = component(layout.day, DAY_COLUMN, 1)?;
        let date = build_date(y, m, d).ok_or(GapFillError::InvalidDate {
            row: row_number,
            year: y,
            month: m,
            day: d,
        })?;

        let number = |col: usize, name: &str| numeric_cell(table.cell(idx, col), row_number, name);

        records.push(ObservationRecord {
            place,
            date,
            rf: number(layout.rf, RF_COLUMN)?,
            lng: number(layout.lng, LNG_COLUMN)?,
            lat: number(layout.lat, LAT_COLUMN)?,
            extra: layout
                .extra
                .iter()
                .map(|c| table.cell(idx, *c).clone())
                .collect(),
        });
    }

    if records.is_empty() {
        return Err(GapFillError::NoObservations);
    }

    info!(
        "Normalized {} observation rows for year {} ({} rows without Place skipped)",
        records.len(),
        year,
        skipped_rows
    );

    Ok(ObservationSet {
        extra_columns,
        records,
        skipped_rows,
    })
}

/// Station name from a Place cell; numeric ids are rendered without a fraction
fn place_name(cell: &CellValue) -> Option<String> {
    match cell {
        CellValue::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        CellValue::Int(i) => Some(i.to_string()),
        CellValue::Float(f) if f.fract() == 0.0 => Some(format!("{f:.0}")),
        CellValue::Float(f) => Some(f.to_string()),
        CellValue::Bool(b) => Some(b.to_string()),
        CellValue::DateTime(dt) => Some(dt.to_string()),
        _ => None,
    }
}

/// Integer Year/Mth/Day value; blank cells take the default
fn date_component(
    cell: &CellValue,
    row: usize,
    column: &str,
    default: i64,
) -> Result<i64, GapFillError> {
    let invalid = || GapFillError::InvalidValue {
        row,
        column: column.to_string(),
        value: cell.to_string(),
    };

    match cell {
        CellValue::Empty => Ok(default),
        CellValue::Int(i) => Ok(*i),
        CellValue::Float(f) if f.is_finite() => Ok(f.trunc() as i64),
        CellValue::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(default);
            }
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| {
                    trimmed
                        .parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.trunc() as i64)
                })
                .ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}

fn build_date(year: i64, month: i64, day: i64) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(
        i32::try_from(year).ok()?,
        u32::try_from(month).ok()?,
        u32::try_from(day).ok()?,
    )
}

/// Numeric RF/Lng/Lat value; blank cells carry no value
fn numeric_cell(cell: &CellValue, row: usize, column: &str) -> Result<Option<f64>, GapFillError> {
    match cell {
        CellValue::Empty => Ok(None),
        CellValue::Int(i) => Ok(Some(*i as f64)),
        CellValue::Float(f) => Ok(Some(*f)),
        CellValue::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .map(Some)
                .map_err(|_| GapFillError::InvalidValue {
                    row,
                    column: column.to_string(),
                    value: s.clone(),
                })
        }
        other => Err(GapFillError::InvalidValue {
            row,
            column: column.to_string(),
            value: other.to_string(),
        }),
    }
}
