pub mod error;
pub mod raw_gtfs;
pub mod table;
