//! Infrastructure services: per-client rate limiting, upload-directory
//! lifecycle management (the storage janitor), and telemetry setup.

pub mod rate_limit;
pub mod storage;
pub mod telemetry;

pub use rate_limit::RateLimiter;
pub use storage::{StorageError, StorageJanitor, StorageResult};
