//! One full run: aggregate the feeds of a root directory, then write the
//! pattern stops to a point layer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::error_chain;
use crate::patterns::aggregate::{aggregate_sources, AggregateOptions, SourceSummary};
use crate::store::sqlite::SqliteFeatureStore;
use crate::writer::feature_writer::{write_features, WriteOptions, WriteReport};

#[derive(Error, Debug)]
pub enum Error {
    #[error("GTFS root '{0}' is not a directory")]
    NotADirectory(String),
    #[error(transparent)]
    Patterns(#[from] crate::patterns::error::Error),
    #[error("cannot open feature store")]
    Store(#[from] crate::store::error::Error),
    #[error("cannot write pattern stops")]
    Writer(#[from] crate::writer::error::Error),
    #[error("Cannot read or write file")]
    IO(#[from] std::io::Error),
    #[error("cannot serialize run summary")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub gtfs_root: PathBuf,
    pub store_path: PathBuf,
    pub layer: String,
    pub aggregate: AggregateOptions,
    pub write: WriteOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedSource {
    pub name: String,
    pub error: String,
}

/// What a run did, written out with `--summary-json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generated_at: DateTime<Utc>,
    pub gtfs_root: PathBuf,
    pub store: PathBuf,
    pub sources: Vec<SourceSummary>,
    pub failed_sources: Vec<FailedSource>,
    pub pattern_stops: usize,
    pub csv_path: Option<PathBuf>,
    pub write: WriteReport,
}

impl RunSummary {
    pub fn print_stats(&self) {
        println!("Run of {}", self.generated_at.to_rfc3339());
        println!("  Sources: {}", self.sources.len());
        for failed in &self.failed_sources {
            println!("  {} failed: {}", failed.name, failed.error);
        }
        println!("  Pattern stops: {}", self.pattern_stops);
        self.write.print_stats();
    }
}

/// Aggregates every source under the root then writes the result.
pub fn run(config: &RunConfig) -> Result<RunSummary, Error> {
    if !config.gtfs_root.is_dir() {
        return Err(Error::NotADirectory(format!(
            "{}",
            config.gtfs_root.display()
        )));
    }
    let mut aggregate = aggregate_sources(&config.gtfs_root, &config.aggregate)?;
    aggregate.print_stats();

    log::info!("Writing to {}", config.store_path.display());
    let mut store = SqliteFeatureStore::open(&config.store_path)?;
    let write = write_features(
        &mut store,
        &config.layer,
        &mut aggregate.table,
        &config.write,
    )?;

    Ok(RunSummary {
        generated_at: Utc::now(),
        gtfs_root: config.gtfs_root.clone(),
        store: config.store_path.clone(),
        sources: aggregate.sources,
        failed_sources: aggregate
            .failed_sources
            .iter()
            .map(|(name, e)| FailedSource {
                name: name.clone(),
                error: error_chain(e),
            })
            .collect(),
        pattern_stops: aggregate.table.len(),
        csv_path: aggregate.csv_path,
        write,
    })
}

pub fn write_summary(summary: &RunSummary, path: &Path) -> Result<(), Error> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, summary)?;
    Ok(())
}
