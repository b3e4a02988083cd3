//! PDF parsing module.
//!
//! Backends that read a document: the lopdf object and text view with its
//! layout analysis and table detection, and the pdfium raster view.

mod backend;
mod layout;
mod options;
mod raster;
mod table_detector;

pub use backend::{
    check_pdf_header, decode_text_simple, ColorSpace, EmbeddedImage, ImageData, LopdfBackend,
    PageChar, PageContent, PageSource, TextSource, TextUnit, UnitKind,
};
pub use layout::{LayoutAnalyzer, PageScan, Placement, TextBlock, TextLine, TextSpan};
pub use options::{
    normalize_collection_name, ExtractOptions, ImageSettings, PageSelection, TableSettings,
    DEFAULT_COLLECTION_DIR, IMAGE_ROOT,
};
pub use raster::{bind_pdfium, PageRenderer, PdfiumRenderer, POINTS_PER_INCH};
pub use table_detector::{DetectedTable, DetectorConfig, SpanRow, TableDetector};
