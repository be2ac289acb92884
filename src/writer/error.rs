use thiserror::Error;

/// An error that aborts a write. Rejected rows are not errors, they are
/// reported in the batch outcomes.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] crate::store::error::Error),
    #[error(transparent)]
    Gtfs(#[from] crate::gtfs::error::Error),
}
