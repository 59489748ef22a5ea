use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::exporters::{pivot_to_csv, records_to_csv, ArtifactKind, CsvArtifact, ExportError};
use crate::gap_fill::{fill_gaps, normalize, reshape, GapFillError, GapFillOptions};
use crate::importers::{SpreadsheetImportError, SpreadsheetImporter};
use crate::models::{ObservationRecord, PivotMatrix, PlaceGaps, RawTable};
use crate::utils::extract_year_from_filename;

/// Error types for processing one uploaded sheet
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error(transparent)]
    GapFill(#[from] GapFillError),

    #[error("Import failed: {0}")]
    Import(#[from] SpreadsheetImportError),

    #[error("Export failed: {0}")]
    Export(#[from] ExportError),
}

/// Everything produced for one sheet
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingReport {
    pub year: i32,
    pub extra_columns: Vec<String>,
    pub combined: Vec<ObservationRecord>,
    pub missing: Vec<ObservationRecord>,
    pub pivot: PivotMatrix,
    pub places: Vec<PlaceGaps>,
    pub skipped_places: Vec<String>,
    /// Input rows dropped because their Place cell was blank
    pub skipped_rows: usize,
    pub total_missing_days: usize,
    pub missing_percentage: f64,
}

impl ProcessingReport {
    /// Percentage as shown to users, two decimals
    pub fn missing_percentage_display(&self) -> String {
        format!("{:.2}", self.missing_percentage)
    }

    pub fn artifact(&self, kind: ArtifactKind) -> Result<CsvArtifact, ExportError> {
        let content = match kind {
            ArtifactKind::Combined => records_to_csv(&self.extra_columns, &self.combined)?,
            ArtifactKind::Missing => records_to_csv(&self.extra_columns, &self.missing)?,
            ArtifactKind::Output => pivot_to_csv(&self.pivot)?,
        };
        Ok(CsvArtifact {
            kind,
            file_name: kind.file_name(self.year),
            content,
        })
    }

    pub fn artifacts(&self) -> Result<Vec<CsvArtifact>, ExportError> {
        ArtifactKind::ALL
            .iter()
            .map(|kind| self.artifact(*kind))
            .collect()
    }
}

/// Stateless gap filling pipeline; cheap to clone per request
#[derive(Debug, Clone, Default)]
pub struct RainfallGapFiller {
    options: GapFillOptions,
}

impl RainfallGapFiller {
    pub fn new(options: GapFillOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &GapFillOptions {
        &self.options
    }

    /// Run normalize -> fill gaps -> reshape on an already imported table
    #[instrument(skip(self, table), fields(rows = table.rows.len()))]
    pub fn process_table(
        &self,
        table: RawTable,
        year: i32,
    ) -> Result<ProcessingReport, ProcessingError> {
        let start_time = Instant::now();

        let observations = normalize(table, year)?;
        let extra_columns = observations.extra_columns.clone();
        let skipped_rows = observations.skipped_rows;
        let gaps = fill_gaps(&observations, year, &self.options)?;
        let reshaped = reshape(observations, &gaps);

        info!(
            "Processed year {} in {:?}: {} places, {} missing days ({:.2}%)",
            year,
            start_time.elapsed(),
            gaps.places.len(),
            gaps.total_missing_days,
            reshaped.missing_percentage
        );

        Ok(ProcessingReport {
            year,
            extra_columns,
            combined: reshaped.combined,
            missing: gaps.missing,
            pivot: reshaped.pivot,
            places: gaps.places,
            skipped_places: gaps.skipped_places,
            skipped_rows,
            total_missing_days: gaps.total_missing_days,
            missing_percentage: reshaped.missing_percentage,
        })
    }

    /// Process an uploaded file; the target year comes from its name
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub fn process_upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        worksheet: Option<String>,
    ) -> Result<ProcessingReport, ProcessingError> {
        let year = extract_year_from_filename(file_name)?;
        debug!("Extracted year {} from {}", year, file_name);

        let table = SpreadsheetImporter::from_bytes(file_name, bytes)
            .with_worksheet(worksheet)
            .read_table()?;
        self.process_table(table, year)
    }

    /// Process a local file; the year comes from the override or the file name
    #[instrument(skip(self))]
    pub fn process_file(
        &self,
        path: &Path,
        year_override: Option<i32>,
        worksheet: Option<String>,
    ) -> Result<ProcessingReport, ProcessingError> {
        let year = match year_override {
            Some(year) => year,
            None => {
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                extract_year_from_filename(&file_name)?
            }
        };

        let table = SpreadsheetImporter::from_path(path)
            .with_worksheet(worksheet)
            .read_table()?;
        self.process_table(table, year)
    }
}
