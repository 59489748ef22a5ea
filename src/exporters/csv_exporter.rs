use csv::Writer;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

use crate::models::{
    ObservationRecord, PivotMatrix, DATE_COLUMN, LAT_COLUMN, LNG_COLUMN, PLACE_COLUMN, RF_COLUMN,
};

pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to flush CSV writer: {0}")]
    Flush(String),

    #[error("CSV output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// The three downloadable tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Observed and synthesized records, sorted by place and date
    Combined,
    /// Synthesized records only
    Missing,
    /// Date x place pivot
    Output,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [Self::Combined, Self::Missing, Self::Output];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Combined => "combined",
            Self::Missing => "missing",
            Self::Output => "output",
        }
    }

    /// e.g. `combined_data_2020.csv`
    pub fn file_name(&self, year: i32) -> String {
        format!("{}_data_{}.csv", self.as_str(), year)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "combined" => Ok(Self::Combined),
            "missing" => Ok(Self::Missing),
            "output" => Ok(Self::Output),
            other => Err(format!("unknown artifact '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvArtifact {
    pub kind: ArtifactKind,
    pub file_name: String,
    pub content: String,
}

/// Serialize records as `Place,Date,RF,Lng,Lat` plus pass-through columns
pub fn records_to_csv(
    extra_columns: &[String],
    records: &[ObservationRecord],
) -> Result<String, ExportError> {
    let mut writer = Writer::from_writer(vec![]);

    let mut header = vec![PLACE_COLUMN, DATE_COLUMN, RF_COLUMN, LNG_COLUMN, LAT_COLUMN];
    header.extend(extra_columns.iter().map(String::as_str));
    writer.write_record(&header)?;

    for record in records {
        let mut row = vec![
            record.place.clone(),
            record.date.format(DATE_FORMAT).to_string(),
            optional_number(record.rf),
            optional_number(record.lng),
            optional_number(record.lat),
        ];
        row.extend(record.extra.iter().map(|c| c.to_string()));
        writer.write_record(&row)?;
    }

    into_string(writer)
}

/// Serialize the pivot as `Date,<place>...`, blank where a cell has no value
pub fn pivot_to_csv(pivot: &PivotMatrix) -> Result<String, ExportError> {
    let mut writer = Writer::from_writer(vec![]);

    let mut header = vec![DATE_COLUMN];
    header.extend(pivot.places.iter().map(String::as_str));
    writer.write_record(&header)?;

    for (date, values) in pivot.dates.iter().zip(&pivot.values) {
        let mut row = vec![date.format(DATE_FORMAT).to_string()];
        row.extend(values.iter().map(|v| optional_number(*v)));
        writer.write_record(&row)?;
    }

    into_string(writer)
}

fn optional_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn into_string(writer: Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Flush(e.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}
