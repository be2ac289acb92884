use serde::Serialize;

use crate::gtfs::table::Table;
use crate::store::error::Error;
use crate::store::{FeatureStore, Field, FieldType};

/// What happened to one column of the table during reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ColumnChange {
    /// The layer already had the column with the same type
    Unchanged { name: String, field_type: FieldType },
    /// The column was missing from the layer and has been added
    Added { name: String, field_type: FieldType },
    /// The layer has a column of that name with another type. The table
    /// column has been renamed to `to`; `added` tells whether `to` had to be
    /// created in the layer.
    Renamed {
        from: String,
        to: String,
        field_type: FieldType,
        added: bool,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reconciliation {
    pub changes: Vec<ColumnChange>,
}

impl Reconciliation {
    /// Fields created in the layer.
    pub fn added_fields(&self) -> Vec<&str> {
        self.changes
            .iter()
            .filter_map(|c| match c {
                ColumnChange::Added { name, .. } => Some(name.as_str()),
                ColumnChange::Renamed {
                    to, added: true, ..
                } => Some(to.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn renamed(&self) -> Vec<(&str, &str)> {
        self.changes
            .iter()
            .filter_map(|c| match c {
                ColumnChange::Renamed { from, to, .. } => Some((from.as_str(), to.as_str())),
                _ => None,
            })
            .collect()
    }

    /// True when neither the layer nor the table was touched.
    pub fn is_noop(&self) -> bool {
        self.changes
            .iter()
            .all(|c| matches!(c, ColumnChange::Unchanged { .. }))
    }
}

/// Fields a table would be stored as.
pub fn table_fields(table: &Table) -> Vec<Field> {
    table
        .columns()
        .iter()
        .map(|c| Field::new(c.name.clone(), FieldType::from_data_type(c.data_type)))
        .collect()
}

/// Aligns the layer schema with the table's.
///
/// Columns missing from the layer are appended to it. A column present in
/// both with different types is never overwritten: the table column is
/// renamed `<name>_2` and that field is added to the layer, unless it already
/// exists there with the table's type. When `<name>_2` is taken by another
/// type, `_3`, `_4`... are tried.
///
/// Running it twice with the same table leaves the layer unchanged.
pub fn reconcile<S: FeatureStore>(
    store: &mut S,
    layer: &str,
    table: &mut Table,
) -> Result<Reconciliation, Error> {
    let mut existing = store.list_columns(layer)?;
    let incoming = table_fields(table);

    let missing: Vec<Field> = incoming
        .iter()
        .filter(|f| !existing.iter().any(|e| e.name == f.name))
        .cloned()
        .collect();
    if !missing.is_empty() {
        store.add_columns(layer, &missing)?;
        log::info!(
            "Fields added to {}: {}",
            layer,
            missing
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        existing.extend(missing.iter().cloned());
    }

    let mut changes = Vec::with_capacity(incoming.len());
    for field in incoming {
        if missing.iter().any(|m| m.name == field.name) {
            changes.push(ColumnChange::Added {
                name: field.name,
                field_type: field.field_type,
            });
            continue;
        }
        let current = existing
            .iter()
            .find(|e| e.name == field.name)
            .map(|e| e.field_type);
        if current == Some(field.field_type) {
            changes.push(ColumnChange::Unchanged {
                name: field.name,
                field_type: field.field_type,
            });
            continue;
        }

        let (to, added) = free_name(&existing, table, &field);
        if added {
            store.add_columns(layer, &[Field::new(to.clone(), field.field_type)])?;
            existing.push(Field::new(to.clone(), field.field_type));
        }
        table.rename_column(&field.name, &to);
        log::warn!(
            "Field {} of {} is {} but the data is {}, written to {} instead",
            field.name,
            layer,
            current.map(|t| t.to_string()).unwrap_or_default(),
            field.field_type,
            to
        );
        changes.push(ColumnChange::Renamed {
            from: field.name,
            to,
            field_type: field.field_type,
            added,
        });
    }
    Ok(Reconciliation { changes })
}

/// First `<name>_<n>` (n >= 2) usable for `field`: either absent from the
/// layer, or present there with the same type. Names already used by another
/// table column are skipped.
fn free_name(existing: &[Field], table: &Table, field: &Field) -> (String, bool) {
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", field.name, n);
        n += 1;
        if table.has_column(&candidate) {
            continue;
        }
        match existing.iter().find(|e| e.name == candidate) {
            None => return (candidate, true),
            Some(e) if e.field_type == field.field_type => return (candidate, false),
            Some(_) => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::sqlite::SqliteFeatureStore;
    use crate::store::{GeometryKind, SpatialReference};
    use crate::test_utils::table;
    use pretty_assertions::assert_eq;

    fn store_with(fields: &[Field]) -> SqliteFeatureStore {
        let mut store = SqliteFeatureStore::open_in_memory().unwrap();
        store
            .create("stops", GeometryKind::Point, SpatialReference::WGS84)
            .unwrap();
        store.add_columns("stops", fields).unwrap();
        store
    }

    fn ratings() -> Table {
        table(
            &["stop_id", "rating"],
            &[&["A", "good"], &["B", "bad"]],
        )
    }

    #[test]
    fn missing_fields_are_added() {
        let mut store = store_with(&[Field::new("stop_id", FieldType::Text)]);
        let mut table = table(&["stop_id", "stop_lat"], &[&["A", "45.5"]]);
        let reconciliation = reconcile(&mut store, "stops", &mut table).unwrap();
        assert_eq!(
            vec![
                ColumnChange::Unchanged {
                    name: "stop_id".into(),
                    field_type: FieldType::Text
                },
                ColumnChange::Added {
                    name: "stop_lat".into(),
                    field_type: FieldType::Double
                },
            ],
            reconciliation.changes
        );
        assert!(store
            .list_columns("stops")
            .unwrap()
            .contains(&Field::new("stop_lat", FieldType::Double)));
    }

    #[test]
    fn type_conflict_renames_the_table_column() {
        let mut store = store_with(&[Field::new("rating", FieldType::Long)]);
        let mut table = ratings();
        let reconciliation = reconcile(&mut store, "stops", &mut table).unwrap();
        assert_eq!(vec![("rating", "rating_2")], reconciliation.renamed());
        assert_eq!(vec!["stop_id", "rating_2"], reconciliation.added_fields());
        assert_eq!(vec!["stop_id", "rating_2"], table.column_names());

        let columns = store.list_columns("stops").unwrap();
        assert!(columns.contains(&Field::new("rating", FieldType::Long)));
        assert!(columns.contains(&Field::new("rating_2", FieldType::Text)));
    }

    #[test]
    fn reconciling_twice_keeps_the_layer_schema() {
        let mut store = store_with(&[Field::new("rating", FieldType::Long)]);
        reconcile(&mut store, "stops", &mut ratings()).unwrap();
        let before = store.list_columns("stops").unwrap();

        let mut table = ratings();
        let reconciliation = reconcile(&mut store, "stops", &mut table).unwrap();
        assert_eq!(before, store.list_columns("stops").unwrap());
        assert!(reconciliation.added_fields().is_empty());
        assert_eq!(
            Some(&ColumnChange::Renamed {
                from: "rating".into(),
                to: "rating_2".into(),
                field_type: FieldType::Text,
                added: false
            }),
            reconciliation.changes.last()
        );
        assert!(table.has_column("rating_2"));
    }

    #[test]
    fn taken_suffix_moves_to_the_next_one() {
        let mut store = store_with(&[
            Field::new("rating", FieldType::Long),
            Field::new("rating_2", FieldType::Double),
        ]);
        let mut table = ratings();
        let reconciliation = reconcile(&mut store, "stops", &mut table).unwrap();
        assert_eq!(vec![("rating", "rating_3")], reconciliation.renamed());
        assert!(store
            .list_columns("stops")
            .unwrap()
            .contains(&Field::new("rating_3", FieldType::Text)));
    }

    #[test]
    fn identical_schema_is_a_noop() {
        let mut store = store_with(&[
            Field::new("stop_id", FieldType::Text),
            Field::new("rating", FieldType::Text),
        ]);
        let reconciliation = reconcile(&mut store, "stops", &mut ratings()).unwrap();
        assert!(reconciliation.is_noop());
    }
}
