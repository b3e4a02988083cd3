//! Error types for pdfblocks.
//!
//! Two tiers exist: [`Error`] aborts the whole extraction, while
//! [`SkipReason`] drops a single table or image candidate and is tallied in
//! the run summary.

use std::io;
use thiserror::Error;

/// Result type alias for pdfblocks operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors that stop an extraction run.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading the source or writing assets.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file format is not recognized as PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// Error parsing PDF structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// The PDF document is encrypted and requires a password.
    #[error("Document is encrypted")]
    Encrypted,

    /// Error extracting text content.
    #[error("Text extraction error: {0}")]
    TextExtract(String),

    /// The raster backend could not be bound or could not open the document.
    #[error("Raster backend error: {0}")]
    Raster(String),

    /// Error serializing the block list.
    #[error("Rendering error: {0}")]
    Render(String),

    /// Page number is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(u32, u32),

    /// Page range string could not be parsed.
    #[error("Invalid page range: {0}")]
    InvalidPageRange(String),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

impl From<pdf_extract::OutputError> for Error {
    fn from(err: pdf_extract::OutputError) -> Self {
        Error::TextExtract(err.to_string())
    }
}

impl From<pdfium_render::prelude::PdfiumError> for Error {
    fn from(err: pdfium_render::prelude::PdfiumError) -> Self {
        Error::Raster(err.to_string())
    }
}

/// Why a single table or image candidate was dropped.
///
/// Candidate steps return `Result<_, SkipReason>`; the pipeline logs each skip
/// and counts it under [`SkipReason::label`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Tabular page view could not be loaded.
    #[error("page unavailable: {0}")]
    PageUnavailable(String),

    /// Table grid has fewer than two rows.
    #[error("table has {0} row(s)")]
    TooFewRows(usize),

    /// No bounding-box strategy produced a region.
    #[error("no bounding box could be estimated")]
    NoBoundingBox,

    /// Rendering or cropping the region failed.
    #[error("render failed: {0}")]
    Render(String),

    /// Rendered raster is below the minimum pixel size.
    #[error("raster too small: {width}x{height}")]
    RasterTooSmall { width: u32, height: u32 },

    /// Embedded image payload is below the minimum byte size.
    #[error("payload too small: {0} bytes")]
    PayloadTooSmall(usize),

    /// Embedded image could not be decoded to pixels.
    #[error("decode failed: {0}")]
    Decode(String),

    /// Dimensions match the logo/header heuristic.
    #[error("logo or header: {width}x{height}")]
    LogoOrHeader { width: u32, height: u32 },

    /// Brightness or color variety below the strategy's threshold.
    #[error("low quality: brightness {brightness:.1}, {unique_colors} colors")]
    LowQuality { brightness: f64, unique_colors: usize },

    /// Writing the raster asset failed.
    #[error("asset write failed: {0}")]
    AssetWrite(String),
}

impl SkipReason {
    /// Stable label used as the summary key.
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::PageUnavailable(_) => "page_unavailable",
            SkipReason::TooFewRows(_) => "too_few_rows",
            SkipReason::NoBoundingBox => "no_bounding_box",
            SkipReason::Render(_) => "render",
            SkipReason::RasterTooSmall { .. } => "raster_too_small",
            SkipReason::PayloadTooSmall(_) => "payload_too_small",
            SkipReason::Decode(_) => "decode",
            SkipReason::LogoOrHeader { .. } => "logo_or_header",
            SkipReason::LowQuality { .. } => "low_quality",
            SkipReason::AssetWrite(_) => "asset_write",
        }
    }
}

impl From<Error> for SkipReason {
    fn from(err: Error) -> Self {
        SkipReason::Render(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_error_messages() {
        assert_eq!(
            Error::PageOutOfRange(7, 2).to_string(),
            "Page 7 is out of range (document has 2 pages)"
        );
        assert_eq!(
            Error::Raster("no library".into()).to_string(),
            "Raster backend error: no library"
        );
    }

    #[test]
    fn test_lopdf_error_mapping() {
        let missing = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert!(matches!(Error::from(lopdf::Error::IO(missing)), Error::Io(_)));
        assert!(matches!(
            Error::from(lopdf::Error::PageNumberNotFound(4)),
            Error::PdfParse(_)
        ));
    }

    #[test]
    fn test_skip_reason_display_and_label() {
        let skip = SkipReason::RasterTooSmall {
            width: 40,
            height: 60,
        };
        assert_eq!(skip.to_string(), "raster too small: 40x60");
        assert_eq!(skip.label(), "raster_too_small");

        let skip = SkipReason::LowQuality {
            brightness: 42.0,
            unique_colors: 3,
        };
        assert_eq!(skip.to_string(), "low quality: brightness 42.0, 3 colors");
    }

    #[test]
    fn test_error_into_skip_reason() {
        let skip: SkipReason = Error::Raster("page 3 missing".to_string()).into();
        assert_eq!(skip.label(), "render");
    }
}
