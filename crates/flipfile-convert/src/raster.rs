//! PDF to images driver.
//!
//! Renders every page to PNG through pdfium, trying a chain of strategies
//! until one succeeds: an operator-pinned library, a whole-document pass,
//! an in-memory load (for files pdfium refuses to open from disk), and
//! finally a page-by-page pass that stops at the first bad page but keeps
//! what rendered before it. Output files are written into the caller's
//! workdir as `page_001.png`, `page_002.png`, ...

use crate::traits::{ConversionDriver, ConversionOutput, ConvertError, ConvertResult};
use async_trait::async_trait;
use flipfile_core::ConversionKind;
use pdfium_render::prelude::{PdfRenderConfig, Pdfium};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Longest-edge bounds roughly matching A4 at 150 DPI.
const TARGET_WIDTH: i32 = 1240;
const MAX_HEIGHT: i32 = 1754;

/// Hard cap on rendered pages per document.
const MAX_PAGES: usize = 1000;

/// How to bind pdfium and load the document, in attempt order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterStrategy {
    /// Bind the operator-configured shared library only, load from disk.
    ExplicitLibrary,
    /// Bind the resolved library or the system one, load from disk.
    SystemLibrary,
    /// Same binding, load from bytes in memory.
    InMemory,
    /// Same binding, render page by page keeping pages before a failure.
    PageByPage,
}

pub const RASTER_STRATEGIES: [RasterStrategy; 4] = [
    RasterStrategy::ExplicitLibrary,
    RasterStrategy::SystemLibrary,
    RasterStrategy::InMemory,
    RasterStrategy::PageByPage,
];

pub struct PdfToImagesDriver {
    library_path: Option<PathBuf>,
}

impl PdfToImagesDriver {
    pub fn new(library_path: Option<PathBuf>) -> Self {
        PdfToImagesDriver { library_path }
    }
}

#[async_trait]
impl ConversionDriver for PdfToImagesDriver {
    fn kind(&self) -> ConversionKind {
        ConversionKind::PdfToImages
    }

    async fn convert(
        &self,
        inputs: &[PathBuf],
        workdir: &Path,
    ) -> ConvertResult<ConversionOutput> {
        let input = inputs
            .first()
            .ok_or_else(|| ConvertError::Unreadable("No input file".to_string()))?
            .clone();

        // Cheap structural check before spinning up pdfium.
        #[cfg(feature = "pdf-write")]
        crate::pdf_writer::page_count(&input)?;

        let workdir = workdir.to_path_buf();
        let library_path = self.library_path.clone();

        // pdfium is a C++ library with thread-local state; keep it off the
        // async workers.
        let pages = tokio::task::spawn_blocking(move || {
            render_with_fallbacks(&input, &workdir, library_path.as_deref())
        })
        .await
        .map_err(|e| ConvertError::Backend(format!("Render task panicked: {}", e)))??;

        Ok(ConversionOutput::ImageSet { pages })
    }
}

fn render_with_fallbacks(
    input: &Path,
    workdir: &Path,
    library_path: Option<&Path>,
) -> ConvertResult<Vec<PathBuf>> {
    let mut last_error = None;

    for strategy in RASTER_STRATEGIES {
        if strategy == RasterStrategy::ExplicitLibrary && library_path.is_none() {
            continue;
        }

        match render_with_strategy(input, workdir, library_path, strategy) {
            Ok(pages) => {
                debug!(?strategy, pages = pages.len(), "Rasterization succeeded");
                return Ok(pages);
            }
            Err(e) => {
                warn!(?strategy, error = %e, "Rasterization strategy failed");
                last_error = Some(e);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| ConvertError::Backend("No rasterization strategy available".to_string())))
}

/// Where a strategy gets its pdfium bindings from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindSource {
    Resolved,
    System,
}

/// Bind attempts for a strategy, in order. Fallback strategies still prefer
/// the resolved library; a host where pdfium exists only at the pinned path
/// keeps its full chain.
fn bind_order(strategy: RasterStrategy, has_resolved: bool) -> &'static [BindSource] {
    match (strategy, has_resolved) {
        (RasterStrategy::ExplicitLibrary, true) => &[BindSource::Resolved],
        (RasterStrategy::ExplicitLibrary, false) => &[],
        (_, true) => &[BindSource::Resolved, BindSource::System],
        (_, false) => &[BindSource::System],
    }
}

fn bind(library_path: Option<&Path>, strategy: RasterStrategy) -> ConvertResult<Pdfium> {
    let mut last_error = None;
    for &source in bind_order(strategy, library_path.is_some()) {
        let attempt = match (source, library_path) {
            (BindSource::Resolved, Some(path)) => Pdfium::bind_to_library(path),
            (BindSource::Resolved, None) => continue,
            (BindSource::System, _) => Pdfium::bind_to_system_library(),
        };
        match attempt {
            Ok(bindings) => return Ok(Pdfium::new(bindings)),
            Err(e) => last_error = Some(e),
        }
    }
    Err(match last_error {
        Some(e) => ConvertError::Backend(format!("pdfium bind failed: {}", e)),
        None => ConvertError::Backend("No explicit pdfium library configured".to_string()),
    })
}

fn render_with_strategy(
    input: &Path,
    workdir: &Path,
    library_path: Option<&Path>,
    strategy: RasterStrategy,
) -> ConvertResult<Vec<PathBuf>> {
    let pdfium = bind(library_path, strategy)?;

    let in_memory;
    let document = match strategy {
        RasterStrategy::InMemory => {
            in_memory = std::fs::read(input)?;
            pdfium
                .load_pdf_from_byte_slice(&in_memory, None)
                .map_err(|e| ConvertError::Unreadable(format!("pdfium rejected PDF: {:?}", e)))?
        }
        _ => pdfium
            .load_pdf_from_file(input, None)
            .map_err(|e| ConvertError::Unreadable(format!("pdfium rejected PDF: {:?}", e)))?,
    };

    let pages = document.pages();
    let total = (pages.len() as usize).min(MAX_PAGES);
    if pages.len() as usize > MAX_PAGES {
        warn!(
            total = pages.len(),
            cap = MAX_PAGES,
            "Page count exceeds cap, truncating output"
        );
    }

    let render_config = PdfRenderConfig::new()
        .set_target_width(TARGET_WIDTH)
        .set_maximum_height(MAX_HEIGHT);

    let rendered = take_until_failure(
        (0..total).map(|index| {
            let page = pages.get(index as u16).map_err(|e| {
                ConvertError::Backend(format!("Page {} load failed: {:?}", index + 1, e))
            })?;
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                ConvertError::Backend(format!("Page {} render failed: {:?}", index + 1, e))
            })?;
            let path = workdir.join(page_file_name(index + 1));
            bitmap
                .as_image()
                .save_with_format(&path, image::ImageFormat::Png)
                .map_err(|e| ConvertError::Backend(format!("PNG encode failed: {}", e)))?;
            Ok(path)
        }),
        strategy == RasterStrategy::PageByPage,
    )?;

    if rendered.is_empty() {
        return Err(ConvertError::Backend(
            "No pages could be rendered".to_string(),
        ));
    }
    Ok(rendered)
}

/// Collect page outputs until the first failure. In tolerant mode the
/// failure ends the loop but the pages already converted are kept;
/// otherwise it aborts the whole pass.
fn take_until_failure<T>(
    results: impl Iterator<Item = ConvertResult<T>>,
    tolerant: bool,
) -> ConvertResult<Vec<T>> {
    let mut kept = Vec::new();
    for result in results {
        match result {
            Ok(item) => kept.push(item),
            Err(e) if tolerant => {
                warn!(error = %e, kept = kept.len(), "Stopping at unrenderable page");
                break;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(kept)
}

fn page_file_name(page_no: usize) -> String {
    format!("page_{:03}.png", page_no)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_order_ends_with_tolerant_pass() {
        assert_eq!(RASTER_STRATEGIES[0], RasterStrategy::ExplicitLibrary);
        assert_eq!(RASTER_STRATEGIES[3], RasterStrategy::PageByPage);
    }

    #[test]
    fn test_fallback_strategies_prefer_the_resolved_library() {
        assert_eq!(
            bind_order(RasterStrategy::ExplicitLibrary, true),
            [BindSource::Resolved]
        );
        assert_eq!(
            bind_order(RasterStrategy::SystemLibrary, true),
            [BindSource::Resolved, BindSource::System]
        );
        assert_eq!(
            bind_order(RasterStrategy::InMemory, true),
            [BindSource::Resolved, BindSource::System]
        );
        assert_eq!(
            bind_order(RasterStrategy::PageByPage, false),
            [BindSource::System]
        );
        assert!(bind_order(RasterStrategy::ExplicitLibrary, false).is_empty());
    }

    #[test]
    fn test_tolerant_pass_keeps_pages_before_a_failure() {
        let results = vec![
            Ok(1),
            Ok(2),
            Err(ConvertError::Backend("bad page".to_string())),
            Ok(3),
        ];
        let kept = take_until_failure(results.into_iter(), true).unwrap();
        assert_eq!(kept, vec![1, 2]);
    }

    #[test]
    fn test_strict_pass_propagates_the_failure() {
        let results: Vec<ConvertResult<i32>> =
            vec![Ok(1), Err(ConvertError::Backend("bad page".to_string()))];
        assert!(take_until_failure(results.into_iter(), false).is_err());
    }

    #[test]
    fn test_page_file_names_are_zero_padded_and_one_based() {
        assert_eq!(page_file_name(1), "page_001.png");
        assert_eq!(page_file_name(42), "page_042.png");
        assert_eq!(page_file_name(1000), "page_1000.png");
    }

    #[cfg(feature = "pdf-write")]
    #[tokio::test]
    async fn test_garbage_input_fails_before_rendering() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.pdf");
        std::fs::write(&path, b"nope").unwrap();

        let err = PdfToImagesDriver::new(None)
            .convert(&[path], dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::Unreadable(_)));
    }
}
