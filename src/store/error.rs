use thiserror::Error;

use crate::store::FieldType;

/// An error that can occur when accessing a feature store.
#[derive(Error, Debug)]
pub enum Error {
    #[error("layer '{0}' does not exist")]
    LayerNotFound(String),
    #[error("layer '{0}' already exists")]
    LayerExists(String),
    #[error("'{0}' is not a valid layer name")]
    InvalidName(String),
    /// An insert names a field the layer does not have
    #[error("field '{field}' does not exist in layer '{layer}'")]
    UnknownField { layer: String, field: String },
    /// Only attribute fields can be added or written to
    #[error("field '{name}' of type {field_type} is managed by the store")]
    ReservedField { name: String, field_type: FieldType },
    #[error("invalid geometry: {0}")]
    Geometry(String),
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),
}

/// Why a single row could not be inserted. Never aborts a batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InsertError {
    #[error("value '{value}' of field '{field}' cannot be stored as {expected}")]
    Coercion {
        field: String,
        value: String,
        expected: FieldType,
    },
    #[error("expected {expected} attributes, got {got}")]
    Arity { expected: usize, got: usize },
    #[error("invalid geometry: {0}")]
    Geometry(String),
    #[error("{0}")]
    Store(String),
}
