//! Core types shared across the FlipFile crates: configuration, the unified
//! error type, and the conversion-route model.

pub mod config;
pub mod conversion;
pub mod error;

pub use config::Config;
pub use conversion::ConversionKind;
pub use error::{AppError, ErrorMetadata, LogLevel};
