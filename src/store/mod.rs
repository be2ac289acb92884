//! Persistent point layers: a layer is a table of point features, each with a
//! geometry and typed attribute fields.

pub mod error;
pub mod geometry;
pub mod sqlite;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::gtfs::table::{DataType, Value};
use error::{Error, InsertError};

/// Declared type of a layer field.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
pub enum FieldType {
    /// Feature identifier, assigned by the store
    ObjectId,
    /// Feature geometry, written through the insert coordinates
    Geometry,
    Text,
    Long,
    Double,
}

impl FieldType {
    /// Store type for a table column: text, 64-bit integer and 64-bit float
    /// map to TEXT, LONG and DOUBLE, anything else to TEXT.
    pub fn from_data_type(data_type: DataType) -> FieldType {
        match data_type {
            DataType::Integer => FieldType::Long,
            DataType::Float => FieldType::Double,
            DataType::Text | DataType::Unknown => FieldType::Text,
        }
    }

    /// True for the fields that hold user attributes.
    pub fn is_attribute(self) -> bool {
        matches!(self, FieldType::Text | FieldType::Long | FieldType::Double)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::ObjectId => "OID",
            FieldType::Geometry => "GEOMETRY",
            FieldType::Text => "TEXT",
            FieldType::Long => "LONG",
            FieldType::Double => "DOUBLE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
}

impl Field {
    pub fn new<S: Into<String>>(name: S, field_type: FieldType) -> Field {
        Field {
            name: name.into(),
            field_type,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
pub enum GeometryKind {
    Point,
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryKind::Point => f.write_str("POINT"),
        }
    }
}

/// Spatial reference of a layer, by EPSG code.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
pub struct SpatialReference {
    pub srid: u32,
}

impl SpatialReference {
    pub const WGS84: SpatialReference = SpatialReference { srid: 4326 };
}

impl Default for SpatialReference {
    fn default() -> Self {
        SpatialReference::WGS84
    }
}

/// Open insert session on one layer, for a fixed list of fields.
pub trait InsertSession {
    /// Inserts one feature. `attributes` follow the session's field order,
    /// `xy` is the longitude/latitude pair of the point. Returns the new
    /// feature identifier.
    fn insert_row(
        &mut self,
        attributes: &[Value],
        xy: (&Value, &Value),
    ) -> Result<i64, InsertError>;
}

pub trait FeatureStore {
    fn exists(&self, layer: &str) -> Result<bool, Error>;

    fn create(
        &mut self,
        layer: &str,
        kind: GeometryKind,
        spatial_reference: SpatialReference,
    ) -> Result<(), Error>;

    /// Every field of the layer, identifier and geometry included.
    fn list_columns(&self, layer: &str) -> Result<Vec<Field>, Error>;

    /// Appends attribute fields to the layer.
    fn add_columns(&mut self, layer: &str, fields: &[Field]) -> Result<(), Error>;

    /// Opens an insert session on `fields` for the duration of `f`. The
    /// session is released before returning, whatever the rows did.
    fn insert_session<R, F>(&mut self, layer: &str, fields: &[String], f: F) -> Result<R, Error>
    where
        F: FnOnce(&mut dyn InsertSession) -> R;
}

/// Converts a value so that it can be stored in a field of `field_type`.
pub fn coerce(value: &Value, field: &str, field_type: FieldType) -> Result<Value, InsertError> {
    let fail = || InsertError::Coercion {
        field: field.to_owned(),
        value: value.to_string(),
        expected: field_type,
    };
    match (field_type, value) {
        (_, Value::Null) => Ok(Value::Null),
        (FieldType::Text, v) => Ok(Value::Text(v.to_string())),
        (FieldType::Long, Value::Integer(i)) => Ok(Value::Integer(*i)),
        (FieldType::Long, Value::Float(f))
            if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 =>
        {
            Ok(Value::Integer(*f as i64))
        }
        (FieldType::Long, Value::Text(s)) => {
            s.trim().parse().map(Value::Integer).map_err(|_| fail())
        }
        (FieldType::Double, v) => v.as_f64().map(Value::Float).ok_or_else(fail),
        _ => Err(fail()),
    }
}
