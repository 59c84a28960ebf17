//! Conversion endpoints.
//!
//! One handler per route, all funneling through the same multipart parsing
//! and the [`ConversionService`]. File-count and type validation happens in
//! the service so every route reports errors in the same shape.

use crate::error::HttpAppError;
use crate::services::UploadedFile;
use crate::state::AppState;
use axum::{
    extract::{Multipart, State},
    response::IntoResponse,
    Json,
};
use flipfile_core::{AppError, ConversionKind};
use std::sync::Arc;

pub async fn pdf_to_word(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    convert(state, ConversionKind::PdfToWord, multipart).await
}

pub async fn word_to_pdf(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    convert(state, ConversionKind::WordToPdf, multipart).await
}

pub async fn merge_pdf(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    convert(state, ConversionKind::MergePdf, multipart).await
}

pub async fn pdf_to_images(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    convert(state, ConversionKind::PdfToImages, multipart).await
}

async fn convert(
    state: Arc<AppState>,
    kind: ConversionKind,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let uploads = collect_uploads(multipart).await?;

    tracing::debug!(kind = %kind, files = uploads.len(), "Conversion request received");

    let receipt = state.conversions.convert(kind, uploads).await?;
    Ok(Json(receipt))
}

/// Buffer every file field of the multipart body.
///
/// Fields without a filename (plain form values) are skipped; upload order
/// is preserved, which matters for merges.
async fn collect_uploads(mut multipart: Multipart) -> Result<Vec<UploadedFile>, HttpAppError> {
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Malformed multipart body: {}", e)))?
    {
        let Some(original_name) = field.file_name().map(String::from) else {
            continue;
        };

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Failed to read upload: {}", e)))?;

        uploads.push(UploadedFile {
            original_name,
            data,
        });
    }

    if uploads.is_empty() {
        return Err(AppError::InvalidInput("No file uploaded".to_string()).into());
    }

    Ok(uploads)
}
