use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::time::Instant;

use crate::gtfs::table::{Table, Value};
use crate::store::error::InsertError;
use crate::store::{FeatureStore, GeometryKind, SpatialReference};
use crate::writer::error::Error;
use crate::writer::reconcile::{reconcile, Reconciliation};

#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Column holding the longitude
    pub x_field: String,
    /// Column holding the latitude
    pub y_field: String,
    /// Write one batch per distinct value of this column
    pub partition_by: Option<String>,
    /// Used when the layer has to be created
    pub spatial_reference: SpatialReference,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            x_field: "stop_lon".to_owned(),
            y_field: "stop_lat".to_owned(),
            partition_by: None,
            spatial_reference: SpatialReference::WGS84,
        }
    }
}

/// Result of the insertion of one row. `row` is the position of the row
/// within its batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RowOutcome {
    Inserted {
        row: usize,
        fid: i64,
    },
    Rejected {
        row: usize,
        #[serde(serialize_with = "as_display")]
        reason: InsertError,
    },
}

impl RowOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, RowOutcome::Inserted { .. })
    }
}

fn as_display<S: Serializer>(reason: &InsertError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(reason)
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Value of the partition column, none when not partitioned
    pub label: Option<Value>,
    pub outcomes: Vec<RowOutcome>,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn inserted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_inserted()).count()
    }

    pub fn not_inserted(&self) -> usize {
        self.attempted() - self.inserted()
    }

    pub fn rejected(&self) -> impl Iterator<Item = &RowOutcome> {
        self.outcomes.iter().filter(|o| !o.is_inserted())
    }
}

// Inserted rows are only counted, rejected ones are listed with their reason.
impl Serialize for BatchReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("BatchReport", 4)?;
        state.serialize_field("label", &self.label)?;
        state.serialize_field("attempted", &self.attempted())?;
        state.serialize_field("inserted", &self.inserted())?;
        state.serialize_field("rejected", &self.rejected().collect::<Vec<_>>())?;
        state.end()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WriteReport {
    pub layer: String,
    pub reconciliation: Reconciliation,
    /// Layer fields written, in layer order
    pub matched_fields: Vec<String>,
    /// Table columns without a layer field
    pub dropped_columns: Vec<String>,
    pub batches: Vec<BatchReport>,
}

impl WriteReport {
    pub fn attempted(&self) -> usize {
        self.batches.iter().map(BatchReport::attempted).sum()
    }

    pub fn inserted(&self) -> usize {
        self.batches.iter().map(BatchReport::inserted).sum()
    }

    pub fn not_inserted(&self) -> usize {
        self.batches.iter().map(BatchReport::not_inserted).sum()
    }

    pub fn print_stats(&self) {
        println!("Layer {}:", self.layer);
        for (from, to) in self.reconciliation.renamed() {
            println!("  {from} written to {to}");
        }
        for batch in &self.batches {
            match &batch.label {
                Some(label) => println!(
                    "  {}: {} inserted, {} not inserted",
                    label,
                    batch.inserted(),
                    batch.not_inserted()
                ),
                None => println!(
                    "  {} inserted, {} not inserted",
                    batch.inserted(),
                    batch.not_inserted()
                ),
            }
        }
        println!("  Total: {} of {} rows inserted", self.inserted(), self.attempted());
    }
}

/// Creates the point layer when it does not exist yet.
pub fn ensure_layer<S: FeatureStore>(
    store: &mut S,
    layer: &str,
    spatial_reference: SpatialReference,
) -> Result<(), Error> {
    if !store.exists(layer)? {
        log::info!("Creating layer {} (SRID {})", layer, spatial_reference.srid);
        store.create(layer, GeometryKind::Point, spatial_reference)?;
    }
    Ok(())
}

/// Writes every row of `table` as a point feature of `layer`.
///
/// The layer is created if needed and its schema reconciled with the table,
/// which may rename table columns. Each row is inserted on its own: a row
/// that cannot be stored is reported as rejected and the batch goes on.
/// With `partition_by`, rows are written in one batch per distinct value of
/// that column, in first appearance order.
pub fn write_features<S: FeatureStore>(
    store: &mut S,
    layer: &str,
    table: &mut Table,
    options: &WriteOptions,
) -> Result<WriteReport, Error> {
    let start = Instant::now();
    if table.is_empty() {
        log::warn!("No pattern stops to write to {}", layer);
        return Ok(WriteReport {
            layer: layer.to_owned(),
            reconciliation: Reconciliation::default(),
            matched_fields: Vec::new(),
            dropped_columns: Vec::new(),
            batches: Vec::new(),
        });
    }
    // positions survive the renames done by the reconciliation
    let x = table.require_column(&options.x_field)?;
    let y = table.require_column(&options.y_field)?;

    ensure_layer(store, layer, options.spatial_reference)?;
    let reconciliation = reconcile(store, layer, table)?;

    let mut matched_fields = Vec::new();
    let mut positions = Vec::new();
    for field in store.list_columns(layer)? {
        if !field.field_type.is_attribute() {
            continue;
        }
        if let Some(i) = table.column_index(&field.name) {
            matched_fields.push(field.name);
            positions.push(i);
        }
    }
    let dropped_columns: Vec<String> = table
        .column_names()
        .into_iter()
        .filter(|name| !matched_fields.iter().any(|m| m == name))
        .map(str::to_owned)
        .collect();
    if !dropped_columns.is_empty() {
        log::warn!(
            "Columns not written to {}: {}",
            layer,
            dropped_columns.join(", ")
        );
    }

    // the partition column may have been renamed as well
    let partition_by = options.partition_by.as_ref().map(|column| {
        reconciliation
            .renamed()
            .into_iter()
            .find(|(from, _)| *from == column.as_str())
            .map(|(_, to)| to.to_owned())
            .unwrap_or_else(|| column.clone())
    });
    let partitions = match &partition_by {
        Some(column) if table.has_column(column) => partition(table, column),
        Some(column) => {
            log::warn!(
                "No column {} to partition on, writing all rows at once",
                column
            );
            vec![(None, (0..table.len()).collect())]
        }
        None => vec![(None, (0..table.len()).collect())],
    };

    let mut batches = Vec::with_capacity(partitions.len());
    for (label, rows) in partitions {
        let outcomes = store.insert_session(layer, &matched_fields, |session| {
            rows.iter()
                .enumerate()
                .map(|(n, &pos)| {
                    let row = &table.rows()[pos];
                    let attributes: Vec<Value> =
                        positions.iter().map(|&i| row[i].clone()).collect();
                    match session.insert_row(&attributes, (&row[x], &row[y])) {
                        Ok(fid) => RowOutcome::Inserted { row: n, fid },
                        Err(reason) => {
                            log::warn!("Row {} not inserted: {}", n, reason);
                            RowOutcome::Rejected { row: n, reason }
                        }
                    }
                })
                .collect::<Vec<_>>()
        })?;
        let batch = BatchReport { label, outcomes };
        match &batch.label {
            Some(label) => log::info!(
                "{}: Number of stops: {} Number of rows not inserted: {}",
                label,
                batch.attempted(),
                batch.not_inserted()
            ),
            None => log::info!(
                "Number of stops: {} Number of rows not inserted: {}",
                batch.attempted(),
                batch.not_inserted()
            ),
        }
        batches.push(batch);
    }
    log::debug!(
        "{} rows written to {} in {}ms",
        table.len(),
        layer,
        start.elapsed().as_millis()
    );

    Ok(WriteReport {
        layer: layer.to_owned(),
        reconciliation,
        matched_fields,
        dropped_columns,
        batches,
    })
}

/// Row positions for every distinct value of `column`, in first appearance
/// order. Null values form their own partition.
fn partition(table: &Table, column: &str) -> Vec<(Option<Value>, Vec<usize>)> {
    let i = match table.column_index(column) {
        Some(i) => i,
        None => return Vec::new(),
    };
    let mut slots: HashMap<Option<String>, usize> = HashMap::new();
    let mut partitions: Vec<(Option<Value>, Vec<usize>)> = Vec::new();
    for (pos, row) in table.rows().iter().enumerate() {
        let slot = *slots.entry(row[i].key()).or_insert_with(|| {
            partitions.push((Some(row[i].clone()), Vec::new()));
            partitions.len() - 1
        });
        partitions[slot].1.push(pos);
    }
    partitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::sqlite::SqliteFeatureStore;
    use crate::store::{Field, FieldType};
    use crate::test_utils::table;
    use pretty_assertions::assert_eq;

    fn stops() -> Table {
        table(
            &["stop_id", "stop_lat", "stop_lon", "source"],
            &[
                &["A", "45.50", "-73.60", "STM"],
                &["B", "45.51", "west", "STM"],
                &["C", "45.52", "-73.62", "RTL"],
                &["D", "45.53", "-73.63", "STM"],
            ],
        )
    }

    #[test]
    fn bad_longitude_rejects_one_row() {
        let mut store = SqliteFeatureStore::open_in_memory().unwrap();
        let mut table = stops();
        let report =
            write_features(&mut store, "pattern_stops", &mut table, &WriteOptions::default())
                .unwrap();
        assert_eq!(4, report.attempted());
        assert_eq!(3, report.inserted());
        assert_eq!(1, report.not_inserted());
        assert_eq!(4, report.batches[0].attempted());
        assert_eq!(1, report.batches[0].not_inserted());
        let rejected: Vec<_> = report.batches[0].rejected().collect();
        assert!(matches!(
            rejected[0],
            RowOutcome::Rejected {
                row: 1,
                reason: InsertError::Geometry(_)
            }
        ));
        assert_eq!(3, store.row_count("pattern_stops").unwrap());
        assert_eq!(
            vec!["stop_id", "stop_lat", "stop_lon", "source"],
            report.matched_fields
        );
    }

    #[test]
    fn type_change_between_runs_goes_to_a_new_field() {
        let mut store = SqliteFeatureStore::open_in_memory().unwrap();
        ensure_layer(&mut store, "stops", SpatialReference::WGS84).unwrap();
        store
            .add_columns("stops", &[Field::new("stop_code", FieldType::Long)])
            .unwrap();
        // the column is numeric in the first file, so it stays LONG
        let mut first = table(
            &["stop_code", "stop_lat", "stop_lon"],
            &[&["12", "1.0", "2.0"]],
        );
        write_features(&mut store, "stops", &mut first, &WriteOptions::default()).unwrap();

        let mut mixed = table(
            &["stop_code", "stop_lat", "stop_lon"],
            &[&["13", "1.0", "2.0"], &["14.5", "1.0", "2.0"]],
        );
        let report =
            write_features(&mut store, "stops", &mut mixed, &WriteOptions::default()).unwrap();
        // stop_code is DOUBLE in the second table, so it lands in stop_code_2
        assert_eq!(vec![("stop_code", "stop_code_2")], report.reconciliation.renamed());
        assert_eq!(2, report.inserted());
        assert_eq!(3, store.row_count("stops").unwrap());
    }

    #[test]
    fn partitions_follow_first_appearance() {
        let mut store = SqliteFeatureStore::open_in_memory().unwrap();
        let options = WriteOptions {
            partition_by: Some("source".into()),
            ..Default::default()
        };
        let report = write_features(&mut store, "pattern_stops", &mut stops(), &options).unwrap();
        let labels: Vec<_> = report.batches.iter().map(|b| b.label.clone()).collect();
        assert_eq!(vec![Some(Value::from("STM")), Some(Value::from("RTL"))], labels);
        assert_eq!(vec![3, 1], report.batches.iter().map(|b| b.attempted()).collect::<Vec<_>>());
        assert_eq!(3, report.inserted());
    }

    #[test]
    fn partitioned_write_matches_single_write() {
        let mut single = SqliteFeatureStore::open_in_memory().unwrap();
        write_features(&mut single, "l", &mut stops(), &WriteOptions::default()).unwrap();

        let mut partitioned = SqliteFeatureStore::open_in_memory().unwrap();
        let options = WriteOptions {
            partition_by: Some("source".into()),
            ..Default::default()
        };
        write_features(&mut partitioned, "l", &mut stops(), &options).unwrap();

        let ids = |store: &SqliteFeatureStore| {
            let mut ids: Vec<String> = store
                .read_features("l")
                .unwrap()
                .into_iter()
                .map(|f| f.attributes.get("stop_id").unwrap().to_string())
                .collect();
            ids.sort();
            ids
        };
        assert_eq!(ids(&single), ids(&partitioned));
        assert_eq!(vec!["A", "C", "D"], ids(&single));
    }

    #[test]
    fn renamed_partition_column_still_partitions() {
        let mut store = SqliteFeatureStore::open_in_memory().unwrap();
        ensure_layer(&mut store, "l", SpatialReference::WGS84).unwrap();
        store
            .add_columns("l", &[Field::new("source", FieldType::Long)])
            .unwrap();
        let options = WriteOptions {
            partition_by: Some("source".into()),
            ..Default::default()
        };
        let report = write_features(&mut store, "l", &mut stops(), &options).unwrap();
        assert_eq!(vec![("source", "source_2")], report.reconciliation.renamed());
        assert_eq!(2, report.batches.len());
        assert_eq!(Some(Value::from("STM")), report.batches[0].label);
    }

    #[test]
    fn empty_table_writes_nothing() {
        let mut store = SqliteFeatureStore::open_in_memory().unwrap();
        let mut table = Table::concat(Vec::new());
        let report =
            write_features(&mut store, "l", &mut table, &WriteOptions::default()).unwrap();
        assert_eq!(0, report.attempted());
        assert_eq!(0, report.not_inserted());
        assert!(report.batches.is_empty());
    }

    #[test]
    fn missing_partition_column_writes_one_batch() {
        let mut store = SqliteFeatureStore::open_in_memory().unwrap();
        let options = WriteOptions {
            partition_by: Some("agency".into()),
            ..Default::default()
        };
        let report = write_features(&mut store, "l", &mut stops(), &options).unwrap();
        assert_eq!(1, report.batches.len());
        assert_eq!(None, report.batches[0].label);
    }

    #[test]
    fn missing_coordinates_abort_the_write() {
        let mut store = SqliteFeatureStore::open_in_memory().unwrap();
        let mut table = table(&["stop_id"], &[&["A"]]);
        let err = write_features(&mut store, "l", &mut table, &WriteOptions::default());
        assert!(matches!(err, Err(Error::Gtfs(_))));
        assert!(!store.exists("l").unwrap());
    }

    #[test]
    fn report_serializes_rejections_only() {
        let mut store = SqliteFeatureStore::open_in_memory().unwrap();
        let report =
            write_features(&mut store, "l", &mut stops(), &WriteOptions::default()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(4, json["batches"][0]["attempted"]);
        assert_eq!(1, json["batches"][0]["rejected"].as_array().unwrap().len());
        assert_eq!("rejected", json["batches"][0]["rejected"][0]["outcome"]);
    }
}
