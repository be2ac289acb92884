//! Persists a pattern stops table into a point layer: the table schema is
//! first reconciled with the layer's, then rows are inserted one at a time.

pub mod error;
pub mod feature_writer;
pub mod reconcile;
