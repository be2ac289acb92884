//! Derivation of pattern stops: sample trips per shape, route and direction,
//! their ordered stops, and the aggregation of several feeds.

pub mod aggregate;
pub mod error;
pub mod pattern_stops;
pub mod sample_trips;
