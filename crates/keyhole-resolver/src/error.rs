use keyhole_core::{ShortCode, StorageError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResolveError>;

/// Errors surfaced by the [`Resolver`](crate::Resolver).
///
/// Cache failures never appear here: they are logged and the store is read
/// instead.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("short code not found: {0}")]
    NotFound(ShortCode),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ResolveError {
    pub fn is_not_found(&self) -> bool {
        match self {
            ResolveError::NotFound(_) => true,
            ResolveError::Storage(e) => e.is_not_found(),
        }
    }
}
