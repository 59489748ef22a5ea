use thiserror::Error;

/// Problems with an uploaded rainfall sheet, reported back to the user
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GapFillError {
    #[error("Year not found in file name '{0}': rename the file so it contains a 4-digit year")]
    YearNotFound(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Invalid date at row {row}: {year}-{month}-{day} is not a calendar date")]
    InvalidDate {
        row: usize,
        year: i64,
        month: i64,
        day: i64,
    },

    #[error("Invalid value at row {row}, column {column}: {value}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Place {0} has no observations to take Lng/Lat from")]
    EmptyPlace(String),

    #[error("Year {0} is out of range")]
    InvalidYear(i32),

    #[error("No observation rows found in sheet")]
    NoObservations,
}
