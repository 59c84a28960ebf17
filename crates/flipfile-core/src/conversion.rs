//! Conversion-route model.

use serde::Serialize;
use std::fmt;

/// One conversion route offered by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversionKind {
    PdfToWord,
    WordToPdf,
    MergePdf,
    PdfToImages,
}

impl ConversionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionKind::PdfToWord => "pdf-to-word",
            ConversionKind::WordToPdf => "word-to-pdf",
            ConversionKind::MergePdf => "merge-pdf",
            ConversionKind::PdfToImages => "pdf-to-images",
        }
    }

    /// The route named by a conversion path segment, e.g. `pdf-to-word`.
    pub fn from_route_segment(segment: &str) -> Option<Self> {
        match segment {
            "pdf-to-word" => Some(ConversionKind::PdfToWord),
            "word-to-pdf" => Some(ConversionKind::WordToPdf),
            "merge-pdf" => Some(ConversionKind::MergePdf),
            "pdf-to-images" => Some(ConversionKind::PdfToImages),
            _ => None,
        }
    }

    /// Extensions accepted for uploads on this route (lowercase).
    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            ConversionKind::WordToPdf => &["docx", "doc"],
            _ => &["pdf"],
        }
    }

    /// Extension of the produced artifact.
    pub fn output_extension(&self) -> &'static str {
        match self {
            ConversionKind::PdfToWord => "docx",
            ConversionKind::WordToPdf => "pdf",
            ConversionKind::MergePdf => "pdf",
            ConversionKind::PdfToImages => "zip",
        }
    }

    /// Inclusive bounds on the number of uploaded files.
    pub fn file_count_bounds(&self) -> (usize, usize) {
        match self {
            ConversionKind::MergePdf => (2, 10),
            _ => (1, 1),
        }
    }
}

impl fmt::Display for ConversionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_bounds() {
        assert_eq!(ConversionKind::MergePdf.file_count_bounds(), (2, 10));
        assert_eq!(ConversionKind::PdfToWord.file_count_bounds(), (1, 1));
    }

    #[test]
    fn test_route_segments_round_trip() {
        for kind in [
            ConversionKind::PdfToWord,
            ConversionKind::WordToPdf,
            ConversionKind::MergePdf,
            ConversionKind::PdfToImages,
        ] {
            assert_eq!(ConversionKind::from_route_segment(kind.as_str()), Some(kind));
        }
        assert_eq!(ConversionKind::from_route_segment("pdf-to-html"), None);
    }

    #[test]
    fn test_extensions() {
        assert_eq!(ConversionKind::WordToPdf.allowed_extensions(), ["docx", "doc"]);
        assert_eq!(ConversionKind::PdfToImages.allowed_extensions(), ["pdf"]);
        assert_eq!(ConversionKind::PdfToImages.output_extension(), "zip");
    }
}
