// Input adapters: uploaded workbooks and CSV files into raw tables

pub mod spreadsheet_importer;

pub use spreadsheet_importer::{SpreadsheetImportError, SpreadsheetImporter};
