use clap::Parser;
use std::io;
use std::path::PathBuf;

use pattern_stops::cli::{confirm, prompt_path, strip_quotes};
use pattern_stops::error_chain;
use pattern_stops::patterns::aggregate::AggregateOptions;
use pattern_stops::run::{run, write_summary, Error, RunConfig};
use pattern_stops::store::SpatialReference;
use pattern_stops::writer::feature_writer::WriteOptions;

/// Builds the stop sequence of one sample trip per GTFS pattern, for every
/// feed under a root directory, and writes it to a point layer.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding one GTFS feed per subdirectory or zip archive
    #[arg(long)]
    gtfs_root: Option<String>,

    /// SQLite feature store, created if missing
    #[arg(long)]
    store: Option<String>,

    #[arg(long, default_value = "pattern_stops")]
    layer: String,

    /// Also export the pattern stops as CSV
    #[arg(long)]
    export_csv: bool,

    /// Directory of the CSV export, defaults to the parent of the GTFS root
    #[arg(long)]
    export_dir: Option<String>,

    /// Write one batch per distinct value of this column, e.g. source
    #[arg(long)]
    partition_by: Option<String>,

    /// Keep going when a feed cannot be processed
    #[arg(long)]
    skip_failed_sources: bool,

    #[arg(long, default_value_t = 4326)]
    srid: u32,

    #[arg(long, default_value = "stop_lon")]
    x_field: String,

    #[arg(long, default_value = "stop_lat")]
    y_field: String,

    /// Write a JSON summary of the run to this file
    #[arg(long)]
    summary_json: Option<String>,

    /// Do not ask for confirmation
    #[arg(short, long)]
    yes: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if let Err(e) = try_main(args) {
        log::error!("{}", error_chain(&e));
        std::process::exit(1);
    }
}

fn try_main(args: Args) -> Result<(), Error> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();

    let gtfs_root = match &args.gtfs_root {
        Some(path) => PathBuf::from(strip_quotes(path)),
        None => prompt_path(&mut input, &mut output, "Path to the GTFS root directory:")?,
    };
    let store_path = match &args.store {
        Some(path) => PathBuf::from(strip_quotes(path)),
        None => prompt_path(&mut input, &mut output, "Path to the feature store:")?,
    };
    let export_csv = args.export_csv
        || (!args.yes && confirm(&mut input, &mut output, "Export CSV?")?);

    let config = RunConfig {
        gtfs_root,
        store_path,
        layer: args.layer,
        aggregate: AggregateOptions {
            export_csv,
            export_dir: args.export_dir.as_deref().map(|d| PathBuf::from(strip_quotes(d))),
            skip_failed_sources: args.skip_failed_sources,
        },
        write: WriteOptions {
            x_field: args.x_field,
            y_field: args.y_field,
            partition_by: args.partition_by,
            spatial_reference: SpatialReference { srid: args.srid },
        },
    };

    println!("GTFS root: {}", config.gtfs_root.display());
    println!("Feature store: {} (layer {})", config.store_path.display(), config.layer);
    if !args.yes && !confirm(&mut input, &mut output, "Run?")? {
        log::info!("Nothing done");
        return Ok(());
    }

    let summary = run(&config)?;
    summary.print_stats();
    if let Some(path) = &args.summary_json {
        let path = PathBuf::from(strip_quotes(path));
        write_summary(&summary, &path)?;
        log::info!("Summary written to {}", path.display());
    }
    Ok(())
}
