// Output adapters: the three downloadable CSV artifacts

pub mod csv_exporter;

pub use csv_exporter::{pivot_to_csv, records_to_csv, ArtifactKind, CsvArtifact, ExportError};
