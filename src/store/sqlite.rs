use geo_types::Point;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Statement};
use serde::Serialize;
use std::path::Path;

use crate::gtfs::table::{Record, Value};
use crate::store::error::{Error, InsertError};
use crate::store::geometry::{point_from_wkt, point_from_xy, to_wkt};
use crate::store::{
    coerce, FeatureStore, Field, FieldType, GeometryKind, InsertSession, SpatialReference,
};

/// Registry of the layers held by a store file.
const LAYERS_TABLE: &str = "feature_layers";
const FID_COLUMN: &str = "fid";
const GEOMETRY_COLUMN: &str = "geom";

/// A feature store kept in a SQLite database.
///
/// Each layer is a table with an `fid` identifier, a `geom` column holding the
/// point as WKT, and one column per attribute field. Layers are registered
/// in `feature_layers` with their geometry kind and spatial reference.
pub struct SqliteFeatureStore {
    conn: Connection,
}

#[derive(Debug, Clone, Serialize)]
pub struct LayerInfo {
    pub name: String,
    pub geometry_kind: String,
    pub srid: u32,
}

/// A feature read back from a layer.
#[derive(Debug, Clone)]
pub struct Feature {
    pub fid: i64,
    pub point: Point<f64>,
    pub attributes: Record,
}

impl SqliteFeatureStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<SqliteFeatureStore, Error> {
        SqliteFeatureStore::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<SqliteFeatureStore, Error> {
        SqliteFeatureStore::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<SqliteFeatureStore, Error> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {LAYERS_TABLE} (\
                layer_name TEXT PRIMARY KEY, \
                geometry_kind TEXT NOT NULL, \
                srid INTEGER NOT NULL)"
        ))?;
        Ok(SqliteFeatureStore { conn })
    }

    pub fn layers(&self) -> Result<Vec<LayerInfo>, Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT layer_name, geometry_kind, srid FROM {LAYERS_TABLE} ORDER BY layer_name"
        ))?;
        let layers = stmt
            .query_map(params![], |row| {
                Ok(LayerInfo {
                    name: row.get(0)?,
                    geometry_kind: row.get(1)?,
                    srid: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(layers)
    }

    pub fn row_count(&self, layer: &str) -> Result<usize, Error> {
        self.require_layer(layer)?;
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(layer)),
            params![],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Reads every feature of a layer, in insertion order.
    pub fn read_features(&self, layer: &str) -> Result<Vec<Feature>, Error> {
        let attributes: Vec<String> = self
            .list_columns(layer)?
            .into_iter()
            .filter(|f| f.field_type.is_attribute())
            .map(|f| f.name)
            .collect();
        let mut select = vec![quote_ident(FID_COLUMN), quote_ident(GEOMETRY_COLUMN)];
        select.extend(attributes.iter().map(|n| quote_ident(n)));
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY {}",
            select.join(", "),
            quote_ident(layer),
            quote_ident(FID_COLUMN)
        ))?;
        let rows = stmt
            .query_map(params![], |row| {
                let fid: i64 = row.get(0)?;
                let wkt: String = row.get(1)?;
                let mut values = Vec::with_capacity(attributes.len());
                for i in 0..attributes.len() {
                    values.push(from_sql(row.get(i + 2)?));
                }
                Ok((fid, wkt, values))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(fid, wkt, values)| -> Result<Feature, Error> {
                Ok(Feature {
                    fid,
                    point: point_from_wkt(&wkt)?,
                    attributes: attributes.iter().cloned().zip(values).collect(),
                })
            })
            .collect()
    }

    fn require_layer(&self, layer: &str) -> Result<(), Error> {
        if self.exists(layer)? {
            Ok(())
        } else {
            Err(Error::LayerNotFound(layer.to_owned()))
        }
    }
}

impl FeatureStore for SqliteFeatureStore {
    fn exists(&self, layer: &str) -> Result<bool, Error> {
        let found = self
            .conn
            .query_row(
                &format!("SELECT 1 FROM {LAYERS_TABLE} WHERE layer_name = ?1"),
                params![layer],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn create(
        &mut self,
        layer: &str,
        kind: GeometryKind,
        spatial_reference: SpatialReference,
    ) -> Result<(), Error> {
        validate_layer_name(layer)?;
        if self.exists(layer)? {
            return Err(Error::LayerExists(layer.to_owned()));
        }
        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!(
            "CREATE TABLE {} ({} INTEGER PRIMARY KEY AUTOINCREMENT, {} {})",
            quote_ident(layer),
            quote_ident(FID_COLUMN),
            quote_ident(GEOMETRY_COLUMN),
            kind
        ))?;
        tx.execute(
            &format!(
                "INSERT INTO {LAYERS_TABLE} (layer_name, geometry_kind, srid) VALUES (?1, ?2, ?3)"
            ),
            params![layer, kind.to_string(), spatial_reference.srid],
        )?;
        tx.commit()?;
        log::debug!("Layer {} created (SRID {})", layer, spatial_reference.srid);
        Ok(())
    }

    fn list_columns(&self, layer: &str) -> Result<Vec<Field>, Error> {
        self.require_layer(layer)?;
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(layer)))?;
        let fields = stmt
            .query_map(params![], |row| {
                let name: String = row.get(1)?;
                let decl: String = row.get(2)?;
                let pk: i64 = row.get(5)?;
                Ok((name, decl, pk))
            })?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(name, decl, pk)| {
                let field_type = if pk > 0 {
                    FieldType::ObjectId
                } else if name == GEOMETRY_COLUMN {
                    FieldType::Geometry
                } else {
                    field_type_from_decl(&decl)
                };
                Field { name, field_type }
            })
            .collect();
        Ok(fields)
    }

    fn add_columns(&mut self, layer: &str, fields: &[Field]) -> Result<(), Error> {
        self.require_layer(layer)?;
        let tx = self.conn.transaction()?;
        for field in fields {
            let decl = sql_decl(field.field_type).ok_or_else(|| Error::ReservedField {
                name: field.name.clone(),
                field_type: field.field_type,
            })?;
            tx.execute_batch(&format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                quote_ident(layer),
                quote_ident(&field.name),
                decl
            ))?;
        }
        tx.commit()?;
        Ok(())
    }

    fn insert_session<R, F>(&mut self, layer: &str, fields: &[String], f: F) -> Result<R, Error>
    where
        F: FnOnce(&mut dyn InsertSession) -> R,
    {
        let columns = self.list_columns(layer)?;
        let mut targets = Vec::with_capacity(fields.len());
        for name in fields {
            let field = columns
                .iter()
                .find(|c| c.name == *name)
                .ok_or_else(|| Error::UnknownField {
                    layer: layer.to_owned(),
                    field: name.clone(),
                })?;
            if !field.field_type.is_attribute() {
                return Err(Error::ReservedField {
                    name: field.name.clone(),
                    field_type: field.field_type,
                });
            }
            targets.push(field.clone());
        }

        let mut names: Vec<String> = targets.iter().map(|t| quote_ident(&t.name)).collect();
        names.push(quote_ident(GEOMETRY_COLUMN));
        let placeholders = vec!["?"; names.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(layer),
            names.join(", "),
            placeholders
        );

        // Dropping the transaction without commit rolls it back
        let tx = self.conn.transaction()?;
        let result = {
            let stmt = tx.prepare(&sql)?;
            let mut session = SqliteInsertSession {
                stmt,
                fields: targets,
            };
            f(&mut session)
        };
        tx.commit()?;
        Ok(result)
    }
}

struct SqliteInsertSession<'conn> {
    stmt: Statement<'conn>,
    fields: Vec<Field>,
}

impl InsertSession for SqliteInsertSession<'_> {
    fn insert_row(
        &mut self,
        attributes: &[Value],
        xy: (&Value, &Value),
    ) -> Result<i64, InsertError> {
        if attributes.len() != self.fields.len() {
            return Err(InsertError::Arity {
                expected: self.fields.len(),
                got: attributes.len(),
            });
        }
        let mut values = Vec::with_capacity(attributes.len() + 1);
        for (field, value) in self.fields.iter().zip(attributes) {
            values.push(to_sql(coerce(value, &field.name, field.field_type)?));
        }
        let point = point_from_xy(xy.0, xy.1)?;
        values.push(SqlValue::Text(to_wkt(&point)));
        self.stmt
            .insert(params_from_iter(values))
            .map_err(|e| InsertError::Store(e.to_string()))
    }
}

fn to_sql(value: Value) -> SqlValue {
    match value {
        Value::Integer(i) => SqlValue::Integer(i),
        Value::Float(f) => SqlValue::Real(f),
        Value::Text(s) => SqlValue::Text(s),
        Value::Null => SqlValue::Null,
    }
}

fn from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Integer(i) => Value::Integer(i),
        SqlValue::Real(f) => Value::Float(f),
        SqlValue::Text(s) => Value::Text(s),
        SqlValue::Blob(_) | SqlValue::Null => Value::Null,
    }
}

fn sql_decl(field_type: FieldType) -> Option<&'static str> {
    match field_type {
        FieldType::Text => Some("TEXT"),
        FieldType::Long => Some("INTEGER"),
        FieldType::Double => Some("REAL"),
        FieldType::ObjectId | FieldType::Geometry => None,
    }
}

/// Field type of a column declared outside this store, following SQLite's
/// column affinity rules.
fn field_type_from_decl(decl: &str) -> FieldType {
    let decl = decl.to_ascii_uppercase();
    if decl.contains("INT") {
        FieldType::Long
    } else if decl.contains("REAL") || decl.contains("FLOA") || decl.contains("DOUB") {
        FieldType::Double
    } else {
        FieldType::Text
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn validate_layer_name(layer: &str) -> Result<(), Error> {
    let lower = layer.to_ascii_lowercase();
    if layer.trim().is_empty() || lower.starts_with("sqlite_") || lower == LAYERS_TABLE {
        Err(Error::InvalidName(layer.to_owned()))
    } else {
        Ok(())
    }
}
