// Gap filling pipeline
//
// Turns a raw rainfall sheet into a complete daily calendar per place:
// - normalizer: raw rows -> (Place, Date, RF, Lng, Lat) observations
// - gap_filler: sentinel records for every day a place did not report
// - reshaper: combined, deduplicated records, the date x place pivot and the
//   missing-data percentage

pub mod error;
pub mod gap_filler;
pub mod normalizer;
pub mod reshaper;

pub use error::GapFillError;
pub use gap_filler::{fill_gaps, EmptyPlacePolicy, GapFill, GapFillOptions};
pub use normalizer::normalize;
pub use reshaper::{reshape, Reshaped};
