use std::fs::File;
use std::io::prelude::*;
use std::path::Path;

use crate::gtfs::raw_gtfs::GtfsTables;
use crate::gtfs::table::Table;

/// Builds a table from literal CSV cells, typed like a loaded file.
pub fn table(names: &[&str], rows: &[&[&str]]) -> Table {
    Table::from_text(
        names.iter().map(|s| s.to_string()).collect(),
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect(),
    )
}

pub fn create_file_with_content(path: &Path, file_name: &str, content: &str) {
    let mut f = File::create(path.join(file_name)).unwrap();
    f.write_all(content.as_bytes()).unwrap();
}

pub const ROUTES: &str =
    "route_id,agency_id,route_short_name,route_long_name,route_desc,route_type\n\
                          R1,AG,1,Main Street,,3\n\
                          R2,AG,2,Harbour Line,,3\n";
pub const TRIPS: &str = "route_id,service_id,trip_id,trip_headsign,direction_id,block_id,shape_id\n\
                         R1,WK,T1,Downtown,0,B1,S1\n\
                         R2,WK,T2,Harbour,1,B2,S2\n";
pub const STOPS: &str = "stop_id,stop_name,stop_lat,stop_lon\n\
                         A,Alpha,45.50,-73.60\n\
                         B,Bravo,45.51,-73.61\n\
                         C,Charlie,45.52,-73.62\n\
                         D,Delta,45.53,-73.63\n";
pub const STOP_TIMES: &str = "trip_id,arrival_time,departure_time,stop_id,stop_sequence\n\
                              T1,08:00:00,08:00:00,A,1\n\
                              T1,08:05:00,08:05:00,B,2\n\
                              T1,08:10:00,08:10:00,C,3\n\
                              T2,09:00:00,09:00:00,D,1\n\
                              T2,09:04:00,09:04:00,C,2\n\
                              T2,09:09:00,09:09:00,A,3\n";

/// Two routes with one trip of three stops each.
pub fn write_feed(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    create_file_with_content(dir, "routes.txt", ROUTES);
    create_file_with_content(dir, "trips.txt", TRIPS);
    create_file_with_content(dir, "stops.txt", STOPS);
    create_file_with_content(dir, "stop_times.txt", STOP_TIMES);
}

pub fn feed() -> GtfsTables {
    let read = |content: &str, name: &str| {
        crate::gtfs::raw_gtfs::read_table(content.as_bytes(), name).unwrap()
    };
    GtfsTables {
        routes: read(ROUTES, "routes.txt"),
        trips: read(TRIPS, "trips.txt"),
        stops: read(STOPS, "stops.txt"),
        stop_times: read(STOP_TIMES, "stop_times.txt"),
    }
}
