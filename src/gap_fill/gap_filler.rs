//! Calendar gap filling
//!
//! For each place, every day of the target year without an observation gets a
//! sentinel record carrying the coordinates of the place's first observation.
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::gap_fill::GapFillError;
use crate::models::{MissingRecord, ObservationRecord, ObservationSet, PlaceGaps};
use crate::utils::calendar_year_dates;

/// What to do with an expected place that has no observation rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptyPlacePolicy {
    /// Fail the whole file
    #[default]
    Reject,
    /// Log a warning and leave the place out of the results
    Skip,
}

impl FromStr for EmptyPlacePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "skip" => Ok(Self::Skip),
            other => Err(format!(
                "unknown empty place policy '{other}' (expected 'reject' or 'skip')"
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GapFillOptions {
    /// Stations that must appear in the file, in addition to those found in it
    pub expected_places: Vec<String>,
    pub empty_place_policy: EmptyPlacePolicy,
}

/// Result of gap filling one sheet
#[derive(Debug, Clone, PartialEq)]
pub struct GapFill {
    pub year: i32,
    pub missing: Vec<MissingRecord>,
    /// Places counted towards the missing percentage, in first-seen order
    pub places: Vec<PlaceGaps>,
    /// Expected places dropped under `EmptyPlacePolicy::Skip`
    pub skipped_places: Vec<String>,
    pub total_missing_days: usize,
}

/// Observations of one place, in original row order
struct PlaceRows<'a> {
    place: &'a str,
    rows: Vec<&'a ObservationRecord>,
}

pub fn fill_gaps(
    observations: &ObservationSet,
    year: i32,
    options: &GapFillOptions,
) -> Result<GapFill, GapFillError> {
    let full_range = calendar_year_dates(year)?;
    let extra_width = observations.extra_columns.len();
    let partitions = partition_by_place(observations, &options.expected_places);
    debug!(
        "Gap filling {} places against {} calendar days",
        partitions.len(),
        full_range.len()
    );

    let (per_place, skipped_places) = partitions.into_iter().try_fold(
        (Vec::new(), Vec::new()),
        |(mut filled, mut skipped), partition| {
            match fill_place(&partition, &full_range, extra_width) {
                Ok(result) => filled.push(result),
                Err(GapFillError::EmptyPlace(place))
                    if options.empty_place_policy == EmptyPlacePolicy::Skip =>
                {
                    warn!("Place {} has no observations, skipping", place);
                    skipped.push(place);
                }
                Err(e) => return Err(e),
            }
            Ok((filled, skipped))
        },
    )?;

    let total_missing_days = per_place.iter().map(|(gaps, _)| gaps.missing_days).sum();
    let (places, missing): (Vec<PlaceGaps>, Vec<Vec<MissingRecord>>) =
        per_place.into_iter().unzip();
    let missing: Vec<MissingRecord> = missing.into_iter().flatten().collect();

    info!(
        "Synthesized {} missing records across {} places for year {}",
        missing.len(),
        places.len(),
        year
    );

    Ok(GapFill {
        year,
        missing,
        places,
        skipped_places,
        total_missing_days,
    })
}

/// Group observations by place in order of first appearance, then append
/// expected places that never appeared
fn partition_by_place<'a>(
    observations: &'a ObservationSet,
    expected_places: &'a [String],
) -> Vec<PlaceRows<'a>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut partitions: Vec<PlaceRows<'a>> = Vec::new();

    for record in &observations.records {
        let slot = *index.entry(record.place.as_str()).or_insert_with(|| {
            partitions.push(PlaceRows {
                place: record.place.as_str(),
                rows: Vec::new(),
            });
            partitions.len() - 1
        });
        partitions[slot].rows.push(record);
    }

    for place in expected_places {
        if !index.contains_key(place.as_str()) {
            index.insert(place.as_str(), partitions.len());
            partitions.push(PlaceRows {
                place: place.as_str(),
                rows: Vec::new(),
            });
        }
    }

    partitions
}

fn fill_place(
    partition: &PlaceRows<'_>,
    full_range: &[NaiveDate],
    extra_width: usize,
) -> Result<(PlaceGaps, Vec<MissingRecord>), GapFillError> {
    let first = partition
        .rows
        .first()
        .ok_or_else(|| GapFillError::EmptyPlace(partition.place.to_string()))?;

    let present: HashSet<NaiveDate> = partition.rows.iter().map(|r| r.date).collect();
    let missing: Vec<MissingRecord> = full_range
        .iter()
        .filter(|date| !present.contains(*date))
        .map(|date| {
            ObservationRecord::missing(partition.place, *date, first.lng, first.lat, extra_width)
        })
        .collect();

    let observed_days = full_range.len() - missing.len();
    debug!(
        "Place {}: {} observed days, {} missing",
        partition.place,
        observed_days,
        missing.len()
    );

    Ok((
        PlaceGaps {
            place: partition.place.to_string(),
            observed_days,
            missing_days: missing.len(),
        },
        missing,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MISSING_RF_SENTINEL;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn obs(place: &str, d: NaiveDate, rf: f64, lng: f64, lat: f64) -> ObservationRecord {
        ObservationRecord {
            place: place.to_string(),
            date: d,
            rf: Some(rf),
            lng: Some(lng),
            lat: Some(lat),
            extra: vec![],
        }
    }

    fn set(records: Vec<ObservationRecord>) -> ObservationSet {
        ObservationSet {
            records,
            ..Default::default()
        }
    }

    #[test]
    fn test_fill_gaps_single_place_leap_year() {
        let observations = set(vec![
            obs("A", date(2020, 1, 1), 5.0, 120.0, 14.0),
            obs("A", date(2020, 1, 3), 7.0, 121.0, 15.0),
        ]);

        let gaps = fill_gaps(&observations, 2020, &GapFillOptions::default()).unwrap();
        assert_eq!(gaps.total_missing_days, 364);
        assert_eq!(gaps.missing.len(), 364);
        assert_eq!(
            gaps.places,
            vec![PlaceGaps {
                place: "A".to_string(),
                observed_days: 2,
                missing_days: 364
            }]
        );

        let jan2 = &gaps.missing[0];
        assert_eq!(jan2.date, date(2020, 1, 2));
        assert_eq!(jan2.rf, Some(MISSING_RF_SENTINEL));
        // Coordinates come from the first observation row
        assert_eq!(jan2.lng, Some(120.0));
        assert_eq!(jan2.lat, Some(14.0));
    }

    #[test]
    fn test_fill_gaps_present_and_missing_are_disjoint() {
        let observations = set(vec![
            obs("A", date(2019, 6, 1), 1.0, 0.0, 0.0),
            obs("A", date(2019, 6, 1), 2.0, 0.0, 0.0),
            obs("A", date(2019, 12, 31), 3.0, 0.0, 0.0),
        ]);

        let gaps = fill_gaps(&observations, 2019, &GapFillOptions::default()).unwrap();
        assert_eq!(gaps.total_missing_days, 363);
        assert!(gaps
            .missing
            .iter()
            .all(|r| r.date != date(2019, 6, 1) && r.date != date(2019, 12, 31)));
    }

    #[test]
    fn test_fill_gaps_places_in_first_seen_order() {
        let observations = set(vec![
            obs("Zeta", date(2019, 1, 1), 1.0, 0.0, 0.0),
            obs("Alpha", date(2019, 1, 1), 1.0, 0.0, 0.0),
            obs("Zeta", date(2019, 1, 2), 1.0, 0.0, 0.0),
        ]);

        let gaps = fill_gaps(&observations, 2019, &GapFillOptions::default()).unwrap();
        let names: Vec<&str> = gaps.places.iter().map(|p| p.place.as_str()).collect();
        assert_eq!(names, vec!["Zeta", "Alpha"]);
        assert_eq!(gaps.total_missing_days, 363 + 364);
    }

    #[test]
    fn test_fill_gaps_ignores_dates_outside_year() {
        let observations = set(vec![
            obs("A", date(2018, 12, 31), 1.0, 0.0, 0.0),
            obs("A", date(2019, 1, 1), 1.0, 0.0, 0.0),
        ]);

        let gaps = fill_gaps(&observations, 2019, &GapFillOptions::default()).unwrap();
        assert_eq!(gaps.total_missing_days, 364);
    }

    #[test]
    fn test_fill_gaps_empty_place_rejected() {
        let observations = set(vec![obs("A", date(2019, 1, 1), 1.0, 0.0, 0.0)]);
        let options = GapFillOptions {
            expected_places: vec!["B".to_string()],
            empty_place_policy: EmptyPlacePolicy::Reject,
        };

        assert_eq!(
            fill_gaps(&observations, 2019, &options),
            Err(GapFillError::EmptyPlace("B".to_string()))
        );
    }

    #[test]
    fn test_fill_gaps_empty_place_skipped() {
        let observations = set(vec![obs("A", date(2019, 1, 1), 1.0, 0.0, 0.0)]);
        let options = GapFillOptions {
            expected_places: vec!["A".to_string(), "B".to_string()],
            empty_place_policy: EmptyPlacePolicy::Skip,
        };

        let gaps = fill_gaps(&observations, 2019, &options).unwrap();
        assert_eq!(gaps.skipped_places, vec!["B"]);
        assert_eq!(gaps.places.len(), 1);
        assert_eq!(gaps.total_missing_days, 364);
        assert!(gaps.missing.iter().all(|r| r.place == "A"));
    }

    #[test]
    fn test_fill_gaps_pads_extra_columns() {
        let mut record = obs("A", date(2019, 1, 1), 1.0, 0.0, 0.0);
        record.extra = vec![crate::models::CellValue::Text("gauge".into())];
        let observations = ObservationSet {
            extra_columns: vec!["Source".to_string()],
            records: vec![record],
            ..Default::default()
        };

        let gaps = fill_gaps(&observations, 2019, &GapFillOptions::default()).unwrap();
        assert!(gaps
            .missing
            .iter()
            .all(|r| r.extra == vec![crate::models::CellValue::Empty]));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("skip".parse::<EmptyPlacePolicy>(), Ok(EmptyPlacePolicy::Skip));
        assert_eq!(
            " Reject ".parse::<EmptyPlacePolicy>(),
            Ok(EmptyPlacePolicy::Reject)
        );
        assert!("ignore".parse::<EmptyPlacePolicy>().is_err());
    }
}
