use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error_chain;
use crate::gtfs::raw_gtfs::GtfsTables;
use crate::gtfs::table::{Table, Value};
use crate::patterns::error::Error;
use crate::patterns::pattern_stops::build_pattern_stops;

/// Column holding the name of the source a pattern stop comes from.
pub const SOURCE_COLUMN: &str = "source";

#[derive(Debug, Clone, Default)]
pub struct AggregateOptions {
    /// Write the aggregate to `<export_dir>/<root name>_pattern_stops.csv`
    pub export_csv: bool,
    /// Defaults to the parent of the root directory
    pub export_dir: Option<PathBuf>,
    /// Log and record failing sources instead of aborting the whole run
    pub skip_failed_sources: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub name: String,
    pub rows: usize,
}

/// Pattern stops of every source under a root directory.
#[derive(Debug)]
pub struct Aggregate {
    pub table: Table,
    pub sources: Vec<SourceSummary>,
    pub failed_sources: Vec<(String, Error)>,
    pub csv_path: Option<PathBuf>,
}

impl Aggregate {
    pub fn print_stats(&self) {
        println!("Pattern stops:");
        for source in &self.sources {
            println!("  {}: {} rows", source.name, source.rows);
        }
        for (name, e) in &self.failed_sources {
            println!("  {name}: failed ({e})");
        }
        println!("  Total: {} rows", self.table.len());
        if let Some(path) = &self.csv_path {
            println!("  Exported to {}", path.display());
        }
    }
}

/// Lists the sources of a root directory, sorted by name: every
/// subdirectory, labelled with its name, and every zip archive, labelled
/// with its file stem. Hidden entries are ignored.
pub fn list_sources(root: &Path) -> Result<Vec<(String, PathBuf)>, Error> {
    let mut sources = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) if !name.starts_with('.') => name.to_owned(),
            _ => continue,
        };
        if path.is_dir() {
            sources.push((name, path));
        } else if is_zip(&path) {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(&name)
                .to_owned();
            sources.push((stem, path));
        } else {
            log::debug!("Ignoring {} in GTFS root", path.display());
        }
    }
    sources.sort();
    Ok(sources)
}

fn is_zip(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("zip"))
            .unwrap_or(false)
}

/// Builds the pattern stops of one source, tagged with its name.
pub fn process_source(name: &str, path: &Path) -> Result<Table, Error> {
    let gtfs = GtfsTables::from_path(path)?;
    let mut table = build_pattern_stops(&gtfs)?;
    table.push_column(SOURCE_COLUMN, Value::Text(name.to_owned()));
    Ok(table)
}

/// Builds and concatenates the pattern stops of every source under `root`.
///
/// Rows are ordered by source name, then by their order within the source.
pub fn aggregate_sources(root: &Path, options: &AggregateOptions) -> Result<Aggregate, Error> {
    let start = Instant::now();
    let mut tables = Vec::new();
    let mut sources = Vec::new();
    let mut failed_sources = Vec::new();
    for (name, path) in list_sources(root)? {
        match process_source(&name, &path) {
            Ok(table) => {
                log::info!("{} data successfully processed ({} rows)", name, table.len());
                sources.push(SourceSummary {
                    name,
                    rows: table.len(),
                });
                tables.push(table);
            }
            Err(e) => {
                let e = Error::Source {
                    source_name: name.clone(),
                    source: Box::new(e),
                };
                if !options.skip_failed_sources {
                    return Err(e);
                }
                log::error!("{}", error_chain(&e));
                failed_sources.push((name, e));
            }
        }
    }
    if sources.is_empty() && failed_sources.is_empty() {
        log::warn!("No GTFS source found under {}", root.display());
    }

    let table = Table::concat(tables);
    let csv_path = if options.export_csv {
        let path = csv_export_path(root, options.export_dir.as_deref());
        export_csv(&table, &path)?;
        log::info!("Pattern stops exported to {}", path.display());
        Some(path)
    } else {
        None
    };
    log::debug!(
        "{} sources aggregated in {}ms",
        sources.len(),
        start.elapsed().as_millis()
    );
    Ok(Aggregate {
        table,
        sources,
        failed_sources,
        csv_path,
    })
}

/// `<export_dir>/<root name>_pattern_stops.csv`, export_dir defaulting to the
/// directory holding the root.
pub fn csv_export_path(root: &Path, export_dir: Option<&Path>) -> PathBuf {
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let root_name = root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("gtfs")
        .to_owned();
    let dir = match export_dir {
        Some(dir) => dir.to_path_buf(),
        None => root
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    dir.join(format!("{root_name}_pattern_stops.csv"))
}

pub fn export_csv(table: &Table, path: &Path) -> Result<(), Error> {
    let csv_error = |source: csv::Error| Error::CsvExport {
        file_name: format!("{}", path.display()),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    writer
        .write_record(table.column_names())
        .map_err(csv_error)?;
    for row in table.rows() {
        writer
            .write_record(row.iter().map(|v| v.to_string()))
            .map_err(csv_error)?;
    }
    writer.flush()?;
    Ok(())
}
