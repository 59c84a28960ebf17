//! Conversion drivers.
//!
//! One driver per conversion route, each wrapping an external codec library
//! behind the uniform [`ConversionDriver`] contract. Drivers never touch the
//! request lifecycle: they read their inputs, produce an output (in memory or
//! under the caller-supplied workdir), and report success or failure. Cleanup
//! belongs to the orchestrator.

pub mod capabilities;
pub mod traits;

#[cfg(feature = "pdf-write")]
pub mod merge;
#[cfg(all(feature = "text-extract", feature = "docx"))]
pub mod pdf_to_word;
#[cfg(feature = "pdf-write")]
pub mod pdf_writer;
#[cfg(feature = "raster")]
pub mod raster;
#[cfg(all(feature = "docx", feature = "pdf-write"))]
pub mod word_to_pdf;

pub use capabilities::CapabilitySet;
pub use traits::{ConversionDriver, ConversionOutput, ConvertError, ConvertResult};

use flipfile_core::ConversionKind;
use std::collections::HashMap;
use std::sync::Arc;

/// Assemble the drivers for every route whose back-end was compiled in.
///
/// Routes whose capability probe failed at runtime (the rasterizer) are still
/// registered; the orchestrator consults the [`CapabilitySet`] before ever
/// invoking a driver.
pub fn default_drivers(
    capabilities: &CapabilitySet,
) -> HashMap<ConversionKind, Arc<dyn ConversionDriver>> {
    let mut drivers: HashMap<ConversionKind, Arc<dyn ConversionDriver>> = HashMap::new();

    #[cfg(all(feature = "text-extract", feature = "docx"))]
    drivers.insert(
        ConversionKind::PdfToWord,
        Arc::new(pdf_to_word::PdfToWordDriver),
    );

    #[cfg(all(feature = "docx", feature = "pdf-write"))]
    drivers.insert(
        ConversionKind::WordToPdf,
        Arc::new(word_to_pdf::WordToPdfDriver),
    );

    #[cfg(feature = "pdf-write")]
    drivers.insert(ConversionKind::MergePdf, Arc::new(merge::MergePdfDriver));

    #[cfg(feature = "raster")]
    drivers.insert(
        ConversionKind::PdfToImages,
        Arc::new(raster::PdfToImagesDriver::new(
            capabilities.pdfium_library_path().cloned(),
        )),
    );

    #[cfg(not(feature = "raster"))]
    let _ = capabilities;

    drivers
}
