use thiserror::Error;

/// An error that can occur while deriving pattern stops.
#[derive(Error, Debug)]
pub enum Error {
    /// A stop_times row references a stop missing from stops.txt
    #[error("stop_id '{stop_id}' of trip '{trip_id}' is not known")]
    UnknownStop { stop_id: String, trip_id: String },
    /// A stop_times row references a trip with no sample pattern
    #[error("trip_id '{0}' has no sample pattern")]
    UnknownTrip(String),
    /// A sample trip has no row in stop_times.txt
    #[error("sample trip '{0}' has no stop_times")]
    MissingStopTimes(String),
    /// Processing of a whole source failed
    #[error("source '{source_name}' could not be processed")]
    Source {
        source_name: String,
        #[source]
        source: Box<Error>,
    },
    #[error(transparent)]
    Gtfs(#[from] crate::gtfs::error::Error),
    #[error("Cannot read file")]
    IO(#[from] std::io::Error),
    /// The aggregate could not be exported
    #[error("impossible to write csv file '{file_name}'")]
    CsvExport {
        file_name: String,
        #[source]
        source: csv::Error,
    },
}

impl Error {
    /// True for the errors raised when a key of one table has no match in
    /// another, which points at inconsistent input data.
    pub fn is_lookup(&self) -> bool {
        match self {
            Error::UnknownStop { .. } | Error::UnknownTrip(_) | Error::MissingStopTimes(_) => true,
            Error::Source { source, .. } => source.is_lookup(),
            _ => false,
        }
    }
}
