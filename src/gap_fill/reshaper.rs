//! Merge, deduplicate and pivot
//!
//! Duplicate (Place, Date) rows are always resolved by averaging RF, both when
//! building the combined records and in the pivot cells.
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use crate::gap_fill::GapFill;
use crate::models::{ObservationRecord, ObservationSet, PivotMatrix};
use crate::utils::missing_percentage;

#[derive(Debug, Clone, PartialEq)]
pub struct Reshaped {
    /// Observed and synthesized records, one per (Place, Date), sorted by both
    pub combined: Vec<ObservationRecord>,
    pub pivot: PivotMatrix,
    pub missing_percentage: f64,
    /// Number of duplicate rows folded into another row
    pub merged_duplicates: usize,
}

/// Running mean of the RF values seen for one key
#[derive(Debug, Default, Clone, Copy)]
struct MeanAccumulator {
    sum: f64,
    count: usize,
}

impl MeanAccumulator {
    fn add(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

pub fn reshape(observations: ObservationSet, gaps: &GapFill) -> Reshaped {
    let (combined, merged_duplicates) = combine(
        observations
            .records
            .into_iter()
            .chain(gaps.missing.iter().cloned()),
    );
    if merged_duplicates > 0 {
        warn!(
            "Merged {} duplicate (Place, Date) rows by averaging RF",
            merged_duplicates
        );
    }

    let pivot = pivot(&combined);
    let missing_percentage =
        missing_percentage(gaps.total_missing_days, gaps.places.len(), gaps.year);

    info!(
        "Combined {} records into a {}x{} pivot, {:.2}% missing",
        combined.len(),
        pivot.dates.len(),
        pivot.places.len(),
        missing_percentage
    );

    Reshaped {
        combined,
        pivot,
        missing_percentage,
        merged_duplicates,
    }
}

/// Keep the first record per (Place, Date) with RF replaced by the mean over
/// all records sharing the key; output is sorted by (Place, Date)
fn combine(
    records: impl Iterator<Item = ObservationRecord>,
) -> (Vec<ObservationRecord>, usize) {
    let mut by_key: BTreeMap<(String, NaiveDate), (ObservationRecord, MeanAccumulator)> =
        BTreeMap::new();
    let mut merged = 0;

    for record in records {
        match by_key.get_mut(&(record.place.clone(), record.date)) {
            Some((_, acc)) => {
                acc.add(record.rf);
                merged += 1;
            }
            None => {
                let mut acc = MeanAccumulator::default();
                acc.add(record.rf);
                by_key.insert((record.place.clone(), record.date), (record, acc));
            }
        }
    }

    let combined = by_key
        .into_values()
        .map(|(mut record, acc)| {
            record.rf = acc.mean();
            record
        })
        .collect();
    (combined, merged)
}

fn pivot(records: &[ObservationRecord]) -> PivotMatrix {
    let dates: Vec<NaiveDate> = records
        .iter()
        .map(|r| r.date)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let places: Vec<String> = records
        .iter()
        .map(|r| r.place.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut cells: BTreeMap<(NaiveDate, &str), MeanAccumulator> = BTreeMap::new();
    for record in records {
        cells
            .entry((record.date, record.place.as_str()))
            .or_default()
            .add(record.rf);
    }

    let values = dates
        .iter()
        .map(|date| {
            places
                .iter()
                .map(|place| {
                    cells
                        .get(&(*date, place.as_str()))
                        .and_then(MeanAccumulator::mean)
                })
                .collect()
        })
        .collect();

    debug!("Pivot has {} dates and {} places", dates.len(), places.len());

    PivotMatrix {
        dates,
        places,
        values,
    }
}
