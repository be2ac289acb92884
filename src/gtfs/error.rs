use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error that can occur when loading GTFS tables.
#[derive(Error, Debug)]
pub enum Error {
    /// A mandatory file is not present in the feed
    #[error("Could not find file {0}")]
    MissingFile(String),
    /// A table lacks a column the pipeline needs
    #[error("missing column '{0}'")]
    MissingColumn(String),
    /// The given path to the GTFS is neither a zip archive nor a directory
    #[error("Could not read GTFS: {0} is neither a zip archive nor a directory")]
    NotFileNorDirectory(String),
    /// Generic Input/Output error while reading a file
    #[error("impossible to read file")]
    IO(#[from] std::io::Error),
    /// Impossible to read a file
    #[error("impossible to read '{file_name}'")]
    NamedFileIO {
        /// The file name that could not be read
        file_name: String,
        /// The inital error that caused the unability to read the file
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Impossible to read a CSV file
    #[error("impossible to read csv file '{file_name}'")]
    CSVError {
        /// File name that could not be parsed as CSV
        file_name: String,
        /// The initial error by the csv library
        #[source]
        source: csv::Error,
        /// The line that could not be parsed by the csv library
        line_in_error: Option<LineError>,
    },
    /// A CSV line holds more values than the header has columns
    #[error("line {line} of '{file_name}' has more values than the header")]
    InvalidRow {
        /// File name holding the line
        file_name: String,
        /// Line number, 1-based, header included
        line: u64,
        /// The line that could not be mapped onto the header
        line_in_error: LineError,
    },
    /// Error when trying to unzip the GTFS archive
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

/// Specific line from a CSV file that could not be read
#[derive(Debug, Deserialize, Serialize)]
pub struct LineError {
    /// Headers of the CSV file
    pub headers: Vec<String>,
    /// Values of the line that could not be parsed
    pub values: Vec<String>,
}
