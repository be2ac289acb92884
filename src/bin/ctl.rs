use clap::Parser;

use pattern_stops::error_chain;
use pattern_stops::store::error::Error;
use pattern_stops::store::sqlite::SqliteFeatureStore;
use pattern_stops::store::FeatureStore;

/// Inspects the layers of a feature store.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long)]
    store: String,

    /// Only describe this layer
    #[arg(long)]
    layer: Option<String>,

    /// Also print the first features of each layer
    #[arg(long, default_value_t = 0)]
    head: usize,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if let Err(e) = describe(&args) {
        log::error!("{}", error_chain(&e));
        std::process::exit(1);
    }
}

fn describe(args: &Args) -> Result<(), Error> {
    println!("Reading feature store: {}", args.store);
    let store = SqliteFeatureStore::open(&args.store)?;
    let layers = store.layers()?;
    if let Some(name) = &args.layer {
        if !layers.iter().any(|l| &l.name == name) {
            return Err(Error::LayerNotFound(name.clone()));
        }
    }

    for layer in layers
        .iter()
        .filter(|l| args.layer.as_ref().map_or(true, |n| n == &l.name))
    {
        println!(
            "Layer {} ({}, SRID {}): {} features",
            layer.name,
            layer.geometry_kind,
            layer.srid,
            store.row_count(&layer.name)?
        );
        for field in store.list_columns(&layer.name)? {
            println!("  {} {}", field.name, field.field_type);
        }
        if args.head > 0 {
            for feature in store.read_features(&layer.name)?.iter().take(args.head) {
                let attributes: Vec<String> = feature
                    .attributes
                    .iter()
                    .map(|(name, value)| format!("{name}={value}"))
                    .collect();
                println!(
                    "  #{} ({}, {}) {}",
                    feature.fid,
                    feature.point.x(),
                    feature.point.y(),
                    attributes.join(" ")
                );
            }
        }
    }
    Ok(())
}
