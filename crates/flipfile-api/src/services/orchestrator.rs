//! Conversion orchestration.
//!
//! Owns the full request lifecycle: sweep expired artifacts, validate the
//! uploads, stage them to disk, run the route's driver, persist the output
//! atomically, and remove every staged intermediate whether the conversion
//! succeeded or not. Only the final output (served by the download route)
//! survives a request; the periodic sweep reclaims it later.

use crate::error::app_error_from_convert;
use flipfile_convert::{CapabilitySet, ConversionDriver, ConversionOutput};
use flipfile_core::{AppError, ConversionKind};
use flipfile_infra::StorageJanitor;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One uploaded file, fully buffered by the multipart layer.
pub struct UploadedFile {
    pub original_name: String,
    pub data: bytes::Bytes,
}

/// What a successful conversion returns to the handler.
#[derive(Debug, serde::Serialize)]
pub struct ConversionReceipt {
    pub message: String,
    pub filename: String,
    pub download_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_count: Option<usize>,
}

pub struct ConversionService {
    janitor: StorageJanitor,
    capabilities: CapabilitySet,
    drivers: HashMap<ConversionKind, Arc<dyn ConversionDriver>>,
    max_file_size_bytes: usize,
    sweep_max_age: Duration,
}

impl ConversionService {
    pub fn new(
        janitor: StorageJanitor,
        capabilities: CapabilitySet,
        drivers: HashMap<ConversionKind, Arc<dyn ConversionDriver>>,
        max_file_size_bytes: usize,
        sweep_max_age: Duration,
    ) -> Self {
        ConversionService {
            janitor,
            capabilities,
            drivers,
            max_file_size_bytes,
            sweep_max_age,
        }
    }

    /// Run one conversion end to end.
    pub async fn convert(
        &self,
        kind: ConversionKind,
        uploads: Vec<UploadedFile>,
    ) -> Result<ConversionReceipt, AppError> {
        if !self.capabilities.is_available(kind) {
            return Err(AppError::ServiceUnavailable(format!(
                "The {} route requires a back-end that is not installed",
                kind
            )));
        }

        // Reclaim expired artifacts before taking on new work. A failed
        // sweep is not a reason to refuse the request.
        if let Err(e) = self.janitor.sweep(self.sweep_max_age).await {
            warn!(error = %e, "Pre-request sweep failed");
        }

        self.validate(kind, &uploads)?;

        // Everything staged for this request, removed unconditionally at the
        // end. The output itself is persisted outside this list.
        let mut staged_files: Vec<PathBuf> = Vec::new();
        let mut staged_dirs: Vec<PathBuf> = Vec::new();

        let result = self
            .convert_inner(kind, &uploads, &mut staged_files, &mut staged_dirs)
            .await;

        for path in &staged_files {
            if let Err(e) = self.janitor.remove(path).await {
                warn!(path = %path.display(), error = %e, "Failed to remove staged file");
            }
        }
        for dir in &staged_dirs {
            if let Err(e) = self.janitor.remove_tree(dir).await {
                warn!(path = %dir.display(), error = %e, "Failed to remove staged directory");
            }
        }

        result
    }

    fn validate(&self, kind: ConversionKind, uploads: &[UploadedFile]) -> Result<(), AppError> {
        let (min, max) = kind.file_count_bounds();
        if uploads.len() < min || uploads.len() > max {
            return Err(AppError::InvalidInput(if min == max {
                format!("Expected exactly {} file, got {}", min, uploads.len())
            } else {
                format!(
                    "Expected between {} and {} files, got {}",
                    min,
                    max,
                    uploads.len()
                )
            }));
        }

        for upload in uploads {
            // Type problems report before size problems: a wrong upload is
            // a 400 even when it is also oversized.
            let extension = std::path::Path::new(&upload.original_name)
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase())
                .unwrap_or_default();
            if !kind.allowed_extensions().contains(&extension.as_str()) {
                return Err(AppError::InvalidInput(format!(
                    "File '{}' has extension '{}', allowed: {}",
                    upload.original_name,
                    extension,
                    kind.allowed_extensions().join(", ")
                )));
            }

            if upload.data.is_empty() {
                return Err(AppError::InvalidInput(format!(
                    "File '{}' is empty",
                    upload.original_name
                )));
            }

            if upload.data.len() > self.max_file_size_bytes {
                return Err(AppError::PayloadTooLarge(format!(
                    "File '{}' is {} bytes, maximum is {} bytes",
                    upload.original_name,
                    upload.data.len(),
                    self.max_file_size_bytes
                )));
            }
        }

        Ok(())
    }

    async fn convert_inner(
        &self,
        kind: ConversionKind,
        uploads: &[UploadedFile],
        staged_files: &mut Vec<PathBuf>,
        staged_dirs: &mut Vec<PathBuf>,
    ) -> Result<ConversionReceipt, AppError> {
        let driver = self.drivers.get(&kind).ok_or_else(|| {
            AppError::ServiceUnavailable(format!("No driver registered for {}", kind))
        })?;

        // Stage uploads under opaque names so client filenames never touch
        // the filesystem.
        let mut inputs = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let staged = self.janitor.allocate(&upload.original_name, None);
            self.janitor
                .persist(&staged.path, &upload.data)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to stage upload: {}", e)))?;
            staged_files.push(staged.path.clone());
            inputs.push(staged.path);
        }

        let workdir = self
            .janitor
            .allocate_dir(kind.as_str())
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create workdir: {}", e)))?;
        staged_dirs.push(workdir.clone());

        debug!(kind = %kind, files = inputs.len(), "Dispatching conversion");
        let output = driver
            .convert(&inputs, &workdir)
            .await
            .map_err(app_error_from_convert)?;

        let receipt = match output {
            ConversionOutput::Document(bytes) => {
                let staged = self.janitor.allocate("output", Some(kind.output_extension()));
                self.janitor
                    .persist(&staged.path, &bytes)
                    .await
                    .map_err(|e| AppError::Internal(format!("Failed to persist output: {}", e)))?;
                ConversionReceipt {
                    message: if kind == ConversionKind::MergePdf {
                        format!("Successfully merged {} PDF files", uploads.len())
                    } else {
                        "Conversion completed successfully".to_string()
                    },
                    download_url: format!("/download/{}", staged.filename),
                    filename: staged.filename,
                    image_count: None,
                }
            }
            ConversionOutput::ImageSet { pages } => {
                let image_count = pages.len();
                let archive = self
                    .janitor
                    .zip_all(pages)
                    .await
                    .map_err(|e| AppError::Internal(format!("Failed to build archive: {}", e)))?;
                let staged = self.janitor.allocate("output", Some(kind.output_extension()));
                self.janitor
                    .persist(&staged.path, &archive)
                    .await
                    .map_err(|e| AppError::Internal(format!("Failed to persist archive: {}", e)))?;
                ConversionReceipt {
                    message: format!("PDF converted to {} images", image_count),
                    download_url: format!("/download/{}", staged.filename),
                    filename: staged.filename,
                    image_count: Some(image_count),
                }
            }
        };

        info!(kind = %kind, output = %receipt.filename, "Conversion completed");
        Ok(receipt)
    }
}
