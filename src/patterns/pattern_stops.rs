use std::time::Instant;

use crate::gtfs::raw_gtfs::GtfsTables;
use crate::gtfs::table::{Record, Table, Value};
use crate::patterns::error::Error;
use crate::patterns::sample_trips::sample_trips;

/// Lists, for every sample trip, its stop_times rows in their original order,
/// each augmented with the attributes of its stop and of its sample pattern.
///
/// Lookups are built once: stops by stop_id, patterns by sample_trip_id and
/// stop_times rows by trip_id. On duplicate keys the first row wins.
///
/// Fails on the first stop_id or trip_id without a match, and on a sample
/// trip without any stop_times row.
pub fn pattern_stops(stop_times: &Table, stops: &Table, samples: &Table) -> Result<Table, Error> {
    let stops_lookup = stops.lookup_first("stop_id")?;
    let patterns_lookup = samples.lookup_first("sample_trip_id")?;
    let stop_times_by_trip = stop_times.index_by("trip_id")?;
    stop_times.require_column("stop_id")?;

    let mut pattern_stops: Vec<Record> = Vec::new();
    for sample_trip in samples.distinct("sample_trip_id") {
        let sample_trip_id = match sample_trip.key() {
            Some(id) => id,
            None => {
                log::warn!("Sample pattern without trip_id skipped");
                continue;
            }
        };
        let rows = stop_times_by_trip
            .get(&sample_trip_id)
            .ok_or_else(|| Error::MissingStopTimes(sample_trip_id.clone()))?;
        for &pos in rows {
            let row = match stop_times.row(pos) {
                Some(row) => row,
                None => continue,
            };
            let mut record = row.to_record();

            let stop_id = row.get("stop_id").and_then(Value::key).unwrap_or_default();
            let stop = stops_lookup
                .get(&stop_id)
                .ok_or_else(|| Error::UnknownStop {
                    stop_id: stop_id.clone(),
                    trip_id: sample_trip_id.clone(),
                })?;
            record.update(stop);

            let trip_id = row.get("trip_id").and_then(Value::key).unwrap_or_default();
            let pattern = patterns_lookup
                .get(&trip_id)
                .ok_or_else(|| Error::UnknownTrip(trip_id.clone()))?;
            record.update(pattern);

            pattern_stops.push(record);
        }
    }
    Ok(Table::from_records(pattern_stops))
}

/// Runs sample trip selection then pattern stop resolution on one feed.
pub fn build_pattern_stops(gtfs: &GtfsTables) -> Result<Table, Error> {
    let start = Instant::now();
    let samples = sample_trips(&gtfs.trips, &gtfs.routes)?;
    let table = pattern_stops(&gtfs.stop_times, &gtfs.stops, &samples)?;
    log::debug!(
        "{} pattern stops for {} patterns built in {}ms",
        table.len(),
        samples.len(),
        start.elapsed().as_millis()
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{feed, table};
    use pretty_assertions::assert_eq;

    fn column(table: &Table, name: &str) -> Vec<String> {
        table
            .column_values(name)
            .unwrap()
            .into_iter()
            .map(|v| v.to_string())
            .collect()
    }

    #[test]
    fn two_routes_three_stops_each() {
        let result = build_pattern_stops(&feed()).unwrap();
        assert_eq!(6, result.len());
        assert_eq!(
            vec!["T1", "T1", "T1", "T2", "T2", "T2"],
            column(&result, "trip_id")
        );
        assert_eq!(vec!["A", "B", "C", "D", "C", "A"], column(&result, "stop_id"));
        assert_eq!(vec!["1", "2", "3", "1", "2", "3"], column(&result, "stop_sequence"));
        assert_eq!(
            vec![
                "Main Street",
                "Main Street",
                "Main Street",
                "Harbour Line",
                "Harbour Line",
                "Harbour Line",
            ],
            column(&result, "route_long_name")
        );
        assert_eq!(
            vec!["Alpha", "Bravo", "Charlie", "Delta", "Charlie", "Alpha"],
            column(&result, "stop_name")
        );
        assert!(result.has_column("sample_service_id"));
        assert!(result.has_column("stop_lon"));
        assert!(!result.has_column("sample_trip_id"));
    }

    #[test]
    fn stop_order_follows_source_not_sequence() {
        let stop_times = table(
            &["trip_id", "stop_id", "stop_sequence"],
            &[&["T1", "C", "3"], &["T9", "A", "1"], &["T1", "A", "1"], &["T1", "B", "2"]],
        );
        let stops = table(
            &["stop_id", "stop_lat", "stop_lon"],
            &[&["A", "1", "1"], &["B", "2", "2"], &["C", "3", "3"]],
        );
        let samples = table(&["sample_trip_id", "route_id"], &[&["T1", "R1"]]);
        let result = pattern_stops(&stop_times, &stops, &samples).unwrap();
        assert_eq!(vec!["C", "A", "B"], column(&result, "stop_id"));
        assert_eq!(vec!["R1", "R1", "R1"], column(&result, "route_id"));
    }

    #[test]
    fn unknown_stop_is_a_lookup_error() {
        let stop_times = table(
            &["trip_id", "stop_id", "stop_sequence"],
            &[&["T1", "A", "1"], &["T1", "Z", "2"]],
        );
        let stops = table(&["stop_id", "stop_lat", "stop_lon"], &[&["A", "1", "1"]]);
        let samples = table(&["sample_trip_id", "route_id"], &[&["T1", "R1"]]);
        let err = pattern_stops(&stop_times, &stops, &samples).unwrap_err();
        assert!(err.is_lookup());
        assert_eq!("stop_id 'Z' of trip 'T1' is not known", err.to_string());
    }

    #[test]
    fn sample_trip_without_stop_times_is_a_lookup_error() {
        let stop_times = table(&["trip_id", "stop_id"], &[&["T1", "A"]]);
        let stops = table(&["stop_id"], &[&["A"]]);
        let samples = table(&["sample_trip_id"], &[&["T1"], &["T2"]]);
        let err = pattern_stops(&stop_times, &stops, &samples).unwrap_err();
        assert!(matches!(err, Error::MissingStopTimes(ref t) if t == "T2"));
    }

    #[test]
    fn numeric_ids_join_text_ids() {
        // stop ids are all numeric in stop_times but not in stops
        let stop_times = table(&["trip_id", "stop_id"], &[&["T1", "10"], &["T1", "11"]]);
        let stops = table(
            &["stop_id", "stop_name"],
            &[&["10", "Ten"], &["11", "Eleven"], &["X1", "Other"]],
        );
        let samples = table(&["sample_trip_id"], &[&["T1"]]);
        let result = pattern_stops(&stop_times, &stops, &samples).unwrap();
        assert_eq!(vec!["Ten", "Eleven"], column(&result, "stop_name"));
    }
}
