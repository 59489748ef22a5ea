pub mod gap_fill_service;

pub use gap_fill_service::{ProcessingError, ProcessingReport, RainfallGapFiller};
