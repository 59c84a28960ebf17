//! PDF to Word driver.
//!
//! Extracts text page by page with pdf-extract, then rebuilds it as a DOCX
//! with a page-number heading per source page. Pages with no extractable
//! text (scans, pure images) get a placeholder so page numbering in the
//! output still tracks the source document.

use crate::traits::{ConversionDriver, ConversionOutput, ConvertError, ConvertResult};
use async_trait::async_trait;
use docx_rs::{AlignmentType, Docx, Paragraph, Run};
use flipfile_core::ConversionKind;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct PdfToWordDriver;

#[async_trait]
impl ConversionDriver for PdfToWordDriver {
    fn kind(&self) -> ConversionKind {
        ConversionKind::PdfToWord
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

        // pdf-extract and the DOCX packer are both synchronous and
        // CPU-bound, so the whole pipeline stays off the async workers.
        let bytes = tokio::task::spawn_blocking(move || {
            let pages = extract_pages(&input)?;
            debug!(pages = pages.len(), "Extracted text from PDF");
            build_docx(&pages)
        })
        .await
        .map_err(|e| ConvertError::Backend(format!("Conversion task panicked: {}", e)))??;

        Ok(ConversionOutput::Document(bytes))
    }
}

fn extract_pages(path: &Path) -> ConvertResult<Vec<String>> {
    match pdf_extract::extract_text_by_pages(path) {
        Ok(pages) if pages.is_empty() => {
            Err(ConvertError::Unreadable("PDF contains no pages".to_string()))
        }
        Ok(pages) => Ok(pages),
        Err(e) => {
            warn!(error = %e, "PDF text extraction failed");
            Err(ConvertError::Unreadable(format!(
                "Could not read PDF: {}",
                e
            )))
        }
    }
}

fn build_docx(pages: &[String]) -> ConvertResult<Vec<u8>> {
    let mut docx = Docx::new().add_paragraph(
        Paragraph::new()
            .align(AlignmentType::Center)
            .add_run(Run::new().add_text("Converted Document").bold().size(32)),
    );

    for (i, page) in pages.iter().enumerate() {
        let page_no = i + 1;
        docx = docx.add_paragraph(
            Paragraph::new().add_run(Run::new().add_text(format!("Page {}", page_no)).bold()),
        );

        let trimmed = page.trim();
        if trimmed.is_empty() {
            docx = docx.add_paragraph(Paragraph::new().add_run(
                Run::new().add_text(format!("[Page {} - no extractable text]", page_no)),
            ));
            continue;
        }

        for line in trimmed.lines() {
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(line)));
        }
    }

    let mut cursor = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut cursor)
        .map_err(|e| ConvertError::Backend(format!("DOCX packaging failed: {}", e)))?;
    Ok(cursor.into_inner())
}
