//! Storage janitor
//!
//! Manages the shared upload/output directory: collision-free name
//! allocation, atomic persistence of untrusted upload bytes, age-based
//! sweeping, idempotent removal, and flat zip packaging.

pub use janitor::{StagedPath, StorageJanitor};

mod janitor;

/// Errors from the storage janitor.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Invalid filename: {0}")]
    InvalidName(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Storage configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;
