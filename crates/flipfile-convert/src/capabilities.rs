//! Back-end availability.
//!
//! Three of the four routes are settled at compile time by cargo features.
//! The rasterizer additionally needs a pdfium shared library at runtime, so
//! it gets a startup probe: an operator-pinned path is tried first, then the
//! system library. The probe result is captured once and reused for every
//! request and for health reporting.

use flipfile_core::{Config, ConversionKind};
use std::path::PathBuf;
use tracing::info;

/// Which conversion back-ends this process can actually serve.
#[derive(Debug, Clone)]
pub struct CapabilitySet {
    text_extract: bool,
    docx: bool,
    pdf_write: bool,
    rasterizer: bool,
    pdfium_library_path: Option<PathBuf>,
}

impl CapabilitySet {
    /// Probe the compiled-in back-ends and the pdfium runtime binding.
    pub fn detect(config: &Config) -> Self {
        let (rasterizer, pdfium_library_path) = probe_rasterizer(config);

        let capabilities = CapabilitySet {
            text_extract: cfg!(feature = "text-extract"),
            docx: cfg!(feature = "docx"),
            pdf_write: cfg!(feature = "pdf-write"),
            rasterizer,
            pdfium_library_path,
        };

        info!(
            text_extract = capabilities.text_extract,
            docx = capabilities.docx,
            pdf_write = capabilities.pdf_write,
            rasterizer = capabilities.rasterizer,
            "Conversion back-ends detected"
        );

        capabilities
    }

    /// Whether every back-end a route depends on is present.
    pub fn is_available(&self, kind: ConversionKind) -> bool {
        match kind {
            ConversionKind::PdfToWord => self.text_extract && self.docx,
            ConversionKind::WordToPdf => self.docx && self.pdf_write,
            ConversionKind::MergePdf => self.pdf_write,
            ConversionKind::PdfToImages => self.rasterizer,
        }
    }

    pub fn text_extract(&self) -> bool {
        self.text_extract
    }

    pub fn docx(&self) -> bool {
        self.docx
    }

    pub fn pdf_write(&self) -> bool {
        self.pdf_write
    }

    pub fn rasterizer(&self) -> bool {
        self.rasterizer
    }

    /// The pdfium library location the probe settled on, if any.
    pub fn pdfium_library_path(&self) -> Option<&PathBuf> {
        self.pdfium_library_path.as_ref()
    }

    /// A set with every back-end marked available. Useful when wiring the
    /// orchestration layer against stub drivers.
    pub fn assume_all() -> Self {
        CapabilitySet {
            text_extract: true,
            docx: true,
            pdf_write: true,
            rasterizer: true,
            pdfium_library_path: None,
        }
    }

    /// The same set with the rasterizer marked unavailable.
    pub fn without_rasterizer(mut self) -> Self {
        self.rasterizer = false;
        self
    }
}

#[cfg(feature = "raster")]
fn probe_rasterizer(config: &Config) -> (bool, Option<PathBuf>) {
    use pdfium_render::prelude::Pdfium;
    use tracing::warn;

    if let Some(path) = config.pdfium_library_path() {
        match Pdfium::bind_to_library(path) {
            Ok(_) => {
                info!(path = %path.display(), "Bound pdfium from configured path");
                return (true, Some(path.clone()));
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Configured pdfium path failed to bind, falling back to system library"
                );
            }
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(_) => {
            info!("Bound pdfium from system library");
            (true, None)
        }
        Err(e) => {
            warn!(error = %e, "No usable pdfium library; PDF-to-images disabled");
            (false, None)
        }
    }
}

#[cfg(not(feature = "raster"))]
fn probe_rasterizer(_config: &Config) -> (bool, Option<PathBuf>) {
    (false, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_availability_maps_to_backends() {
        let capabilities = CapabilitySet {
            text_extract: true,
            docx: true,
            pdf_write: true,
            rasterizer: false,
            pdfium_library_path: None,
        };
        assert!(capabilities.is_available(ConversionKind::PdfToWord));
        assert!(capabilities.is_available(ConversionKind::WordToPdf));
        assert!(capabilities.is_available(ConversionKind::MergePdf));
        assert!(!capabilities.is_available(ConversionKind::PdfToImages));
    }

    #[test]
    fn test_pdf_to_word_needs_both_backends() {
        let capabilities = CapabilitySet {
            text_extract: true,
            docx: false,
            pdf_write: true,
            rasterizer: false,
            pdfium_library_path: None,
        };
        assert!(!capabilities.is_available(ConversionKind::PdfToWord));
    }
}
