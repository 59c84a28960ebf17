//! Word to PDF driver.
//!
//! Reads paragraph text out of a DOCX with docx-rs and renders it through
//! the plain-text PDF writer. Layout, styling and embedded media are not
//! carried over. Legacy `.doc` files are not a zip container and fail the
//! read as unreadable input.

use crate::pdf_writer;
use crate::traits::{ConversionDriver, ConversionOutput, ConvertError, ConvertResult};
use async_trait::async_trait;
use docx_rs::{DocumentChild, ParagraphChild, RunChild};
use flipfile_core::ConversionKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const EMPTY_DOCUMENT_PLACEHOLDER: &str = "No content found in document";

pub struct WordToPdfDriver;

#[async_trait]
impl ConversionDriver for WordToPdfDriver {
    fn kind(&self) -> ConversionKind {
        ConversionKind::WordToPdf
    }

    async fn convert(
        &self,
        inputs: &[PathBuf],
        _workdir: &Path,
    ) -> ConvertResult<ConversionOutput> {
        let input = inputs
            .first()
            .ok_or_else(|| ConvertError::Unreadable("No input file".to_string()))?
            .clone();

        let bytes = tokio::task::spawn_blocking(move || -> ConvertResult<Vec<u8>> {
            let data = std::fs::read(&input)?;
            let lines = extract_paragraphs(&data)?;
            debug!(paragraphs = lines.len(), "Extracted text from DOCX");
            pdf_writer::render_text_pdf(&lines)
        })
        .await
        .map_err(|e| ConvertError::Backend(format!("Conversion task panicked: {}", e)))??;

        Ok(ConversionOutput::Document(bytes))
    }
}

/// Paragraph text in document order, or a placeholder when nothing survives.
fn extract_paragraphs(data: &[u8]) -> ConvertResult<Vec<String>> {
    let docx = docx_rs::read_docx(data)
        .map_err(|e| ConvertError::Unreadable(format!("Could not read DOCX: {:?}", e)))?;

    let mut lines = Vec::new();
    for child in &docx.document.children {
        if let DocumentChild::Paragraph(paragraph) = child {
            let mut text = String::new();
            for pc in &paragraph.children {
                if let ParagraphChild::Run(run) = pc {
                    for rc in &run.children {
                        if let RunChild::Text(t) = rc {
                            text.push_str(&t.text);
                        }
                    }
                }
            }
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
        }
    }

    if lines.is_empty() {
        lines.push(EMPTY_DOCUMENT_PLACEHOLDER.to_string());
    }
    Ok(lines)
}
