//! The uniform driver contract.

use async_trait::async_trait;
use flipfile_core::ConversionKind;
use std::path::{Path, PathBuf};

/// Errors from conversion drivers.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// Corrupt, encrypted, empty, or otherwise unreadable input.
    #[error("Unreadable input: {0}")]
    Unreadable(String),

    /// The wrapped codec library failed.
    #[error("Conversion back-end error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConvertResult<T> = Result<T, ConvertError>;

/// What a successful conversion produced.
#[derive(Debug)]
pub enum ConversionOutput {
    /// A single document, built in memory; the caller persists it atomically.
    Document(Vec<u8>),
    /// An ordered set of page images written under the workdir.
    ImageSet { pages: Vec<PathBuf> },
}

impl ConversionOutput {
    pub fn image_count(&self) -> Option<usize> {
        match self {
            ConversionOutput::ImageSet { pages } => Some(pages.len()),
            ConversionOutput::Document(_) => None,
        }
    }
}

/// A conversion back-end for one route.
///
/// `convert` is side-effect-free beyond the workdir: drivers do not delete
/// inputs and never leave a partial artifact behind on failure.
#[async_trait]
pub trait ConversionDriver: Send + Sync {
    fn kind(&self) -> ConversionKind;

    async fn convert(&self, inputs: &[PathBuf], workdir: &Path)
        -> ConvertResult<ConversionOutput>;
}
