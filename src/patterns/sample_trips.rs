use crate::gtfs::table::Table;
use crate::patterns::error::Error;

/// Columns identifying a pattern: trips sharing them follow the same stops.
pub const PATTERN_KEYS: [&str; 3] = ["shape_id", "route_id", "direction_id"];

const RENAMES: [(&str, &str); 3] = [
    ("service_id", "sample_service_id"),
    ("trip_id", "sample_trip_id"),
    ("trip_headsign", "sample_headsign"),
];

/// Picks one representative trip for every (shape_id, route_id, direction_id).
///
/// The representative is the first trip of the group in trips.txt order.
/// Route attributes are joined on route_id, trips of an unknown route keep
/// null route attributes. The chosen trip's service_id, trip_id and
/// trip_headsign are renamed to sample_service_id, sample_trip_id and
/// sample_headsign.
pub fn sample_trips(trips: &Table, routes: &Table) -> Result<Table, Error> {
    trips.require_column("trip_id")?;
    let (mut samples, skipped) = trips.group_first(&PATTERN_KEYS)?;
    if skipped > 0 {
        log::warn!(
            "{} trips without shape_id, route_id or direction_id left out of the patterns",
            skipped
        );
    }
    samples.move_to_front(&PATTERN_KEYS);
    let mut samples = samples.left_join_first(routes, "route_id", "_route")?;
    for (from, to) in RENAMES {
        samples.rename_column(from, to);
    }
    log::debug!(
        "{} sample trips selected out of {} trips",
        samples.len(),
        trips.len()
    );
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs::table::Value;
    use crate::test_utils::table;
    use pretty_assertions::assert_eq;

    fn sample_ids(samples: &Table) -> Vec<String> {
        samples
            .column_values("sample_trip_id")
            .unwrap()
            .into_iter()
            .map(|v| v.to_string())
            .collect()
    }

    fn routes() -> Table {
        table(
            &["route_id", "route_short_name", "route_type"],
            &[&["R1", "1", "3"], &["R2", "2", "3"]],
        )
    }

    #[test]
    fn one_sample_per_shape_route_direction() {
        let trips = table(
            &["route_id", "service_id", "trip_id", "trip_headsign", "direction_id", "shape_id"],
            &[
                &["R1", "WK", "T1", "North", "0", "S1"],
                &["R1", "SA", "T2", "North", "0", "S1"],
                &["R1", "WK", "T3", "South", "1", "S1"],
                &["R1", "WK", "T4", "North", "0", "S9"],
                &["R2", "WK", "T5", "East", "0", "S1"],
                &["R1", "WK", "T6", "South", "1", "S1"],
            ],
        );
        let samples = sample_trips(&trips, &routes()).unwrap();
        assert_eq!(vec!["T1", "T3", "T4", "T5"], sample_ids(&samples));
        assert_eq!(
            vec![
                "shape_id",
                "route_id",
                "direction_id",
                "sample_service_id",
                "sample_trip_id",
                "sample_headsign",
                "route_short_name",
                "route_type"
            ],
            samples.column_names()
        );
        // picking again from the same input gives the same samples
        let again = sample_trips(&trips, &routes()).unwrap();
        assert_eq!(samples, again);
    }

    #[test]
    fn unknown_route_keeps_null_attributes() {
        let trips = table(
            &["route_id", "service_id", "trip_id", "direction_id", "shape_id"],
            &[&["R7", "WK", "T1", "0", "S1"]],
        );
        let samples = sample_trips(&trips, &routes()).unwrap();
        assert_eq!(1, samples.len());
        assert_eq!(
            Some(&Value::Null),
            samples.row(0).unwrap().get("route_short_name")
        );
    }

    #[test]
    fn trips_without_shape_are_left_out() {
        let trips = table(
            &["route_id", "service_id", "trip_id", "direction_id", "shape_id"],
            &[&["R1", "WK", "T1", "0", ""], &["R1", "WK", "T2", "0", "S1"]],
        );
        let samples = sample_trips(&trips, &routes()).unwrap();
        assert_eq!(vec!["T2"], sample_ids(&samples));
    }

    #[test]
    fn missing_direction_column_is_an_error() {
        let trips = table(
            &["route_id", "service_id", "trip_id", "shape_id"],
            &[&["R1", "WK", "T1", "S1"]],
        );
        let err = sample_trips(&trips, &routes()).unwrap_err();
        assert_eq!("missing column 'direction_id'", err.to_string());
    }
}
