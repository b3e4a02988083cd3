//! # pdfblocks
//!
//! PDF structure and visual element extraction into typed content blocks.
//!
//! A document is read through two text backends, a tabular/object view and a
//! raster view. Paragraphs, headings and sections come from the text
//! backends; tables and images are detected, located on the page, filtered
//! for noise, deduplicated and written to an asset directory. The result is
//! an ordered list of [`Block`]s plus an [`ExtractionSummary`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdfblocks::{extract_file, render, ExtractOptions};
//!
//! fn main() -> pdfblocks::Result<()> {
//!     let options = ExtractOptions::new().for_collection("network guide");
//!     let extraction = extract_file("guide.pdf", &options)?;
//!
//!     let json = render::to_json(&extraction.blocks, render::JsonFormat::Pretty)?;
//!     println!("{}", json);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Text blocks**: structured layout parsing with a plain-text fallback
//! - **Tables**: cell grids with estimated page regions and region renders
//! - **Images**: embedded objects and page-render crops, reconciled per page
//! - **Noise filtering**: logo/header and quality heuristics
//! - **Deduplication**: IoU-based removal of overlapping table detections
//!
//! The raster view needs the pdfium shared library, looked up in the working
//! directory and then on the system library path.

pub mod error;
pub mod extract;
pub mod geometry;
pub mod model;
pub mod parser;
pub mod render;

// Re-export commonly used types
pub use error::{Error, Result, SkipReason};
pub use extract::Extraction;
pub use geometry::BoundingBox;
pub use model::{
    Block, BlockContent, BlockMetadata, BlockType, ExtractionMethod, ExtractionSummary,
    ImageBlock, QualityMetrics, TableBlock, TableGrid,
};
pub use parser::{
    ExtractOptions, ImageSettings, LopdfBackend, PageRenderer, PageSelection, PageSource,
    PdfiumRenderer, TableSettings, TextSource,
};
pub use render::JsonFormat;

use std::path::{Path, PathBuf};

/// File name used as `source_file` in block metadata.
fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Extract blocks from a PDF file.
///
/// Fails when the file is missing or not a PDF, when the pdfium library
/// cannot be bound, when both text backends fail or when the asset directory
/// cannot be created. Individual tables and images that fail are skipped and
/// counted in the summary.
///
/// # Example
///
/// ```no_run
/// use pdfblocks::{extract_file, ExtractOptions, PageSelection};
///
/// let options = ExtractOptions::new()
///     .with_image_dir("./assets")
///     .with_pages(PageSelection::Range(1..=10));
/// let extraction = extract_file("report.pdf", &options).unwrap();
/// println!("{} blocks", extraction.summary.total);
/// ```
pub fn extract_file<P: AsRef<Path>>(path: P, options: &ExtractOptions) -> Result<Extraction> {
    let path = path.as_ref();
    log::info!("Extracting blocks from {}", path.display());

    let backend = LopdfBackend::open(path)?;
    let pdfium = parser::bind_pdfium()?;
    let renderer = PdfiumRenderer::open(&pdfium, path)?;

    extract::run(&backend, &backend, &renderer, &source_name(path), options)
}

/// Extract blocks from a PDF file, writing assets to `image_dir`.
///
/// # Example
///
/// ```no_run
/// use pdfblocks::extract_blocks;
///
/// let blocks = extract_blocks("report.pdf", "./assets").unwrap();
/// for block in &blocks {
///     println!("p{} {:?}", block.page(), block.block_type());
/// }
/// ```
pub fn extract_blocks<P: AsRef<Path>>(path: P, image_dir: impl Into<PathBuf>) -> Result<Vec<Block>> {
    let options = ExtractOptions::new().with_image_dir(image_dir);
    Ok(extract_file(path, &options)?.blocks)
}

/// Builder for extraction runs.
///
/// # Example
///
/// ```no_run
/// use pdfblocks::{BlockExtractor, JsonFormat};
///
/// let json = BlockExtractor::new()
///     .for_collection("Security Handbook")
///     .with_recreate(true)
///     .extract("handbook.pdf")?
///     .to_json(JsonFormat::Compact)?;
/// # Ok::<(), pdfblocks::Error>(())
/// ```
pub struct BlockExtractor {
    options: ExtractOptions,
}

impl BlockExtractor {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self {
            options: ExtractOptions::default(),
        }
    }

    /// Set the asset directory.
    pub fn with_image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options = self.options.with_image_dir(dir);
        self
    }

    /// Write assets under the directory derived from a collection name.
    pub fn for_collection(mut self, name: &str) -> Self {
        self.options = self.options.for_collection(name);
        self
    }

    /// Clear earlier assets before extracting.
    pub fn with_recreate(mut self, recreate: bool) -> Self {
        self.options = self.options.with_recreate(recreate);
        self
    }

    /// Set page selection.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.options = self.options.with_pages(pages);
        self
    }

    /// Enable or disable outline sections.
    pub fn with_outline_sections(mut self, include: bool) -> Self {
        self.options = self.options.with_outline_sections(include);
        self
    }

    /// Replace table thresholds.
    pub fn with_table_settings(mut self, settings: TableSettings) -> Self {
        self.options = self.options.with_table_settings(settings);
        self
    }

    /// Replace image thresholds.
    pub fn with_image_settings(mut self, settings: ImageSettings) -> Self {
        self.options = self.options.with_image_settings(settings);
        self
    }

    /// Options the builder will run with.
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Run the extraction on a PDF file.
    pub fn extract<P: AsRef<Path>>(&self, path: P) -> Result<Extraction> {
        extract_file(path, &self.options)
    }
}

impl Default for BlockExtractor {
    fn default() -> Self {
        Self::new()
    }
}
