//! Unified assembly: runs every stage over the selected pages, promotes
//! surviving candidates to blocks and orders the result by page.

use std::path::Path;

use image::ImageFormat;

use super::dedup::deduplicate;
use super::image::{extract_page_images, save_image};
use super::table::extract_page_tables;
use super::text::extract_text_blocks;
use crate::error::{Error, Result, SkipReason};
use crate::model::{
    Block, BlockContent, BlockMetadata, ExtractionMethod, ExtractionSummary, ImageBlock,
    ImageCandidate, SourceStrategy, TableBlock, TableCandidate,
};
use crate::parser::{ExtractOptions, PageRenderer, PageSource, TextSource};
use crate::render::{self, JsonFormat};

/// Asset file prefixes written by the pipeline.
const ASSET_PREFIXES: &[&str] = &["table_", "direct_", "rendered_"];

/// Result of one extraction run.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Blocks ordered by page, extraction order within a page
    pub blocks: Vec<Block>,
    pub summary: ExtractionSummary,
}

impl Extraction {
    /// Blocks on the given 1-indexed page.
    pub fn page_blocks(&self, page: u32) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(move |b| b.page() == page)
    }

    /// Serialize the block list.
    pub fn to_json(&self, format: JsonFormat) -> Result<String> {
        render::to_json(&self.blocks, format)
    }
}

/// Remove assets of earlier runs from `dir`. Other files are left alone.
pub fn clear_assets(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if entry.file_type()?.is_file() && ASSET_PREFIXES.iter().any(|p| name.starts_with(p)) {
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    log::debug!("Removed {} previous assets from {}", removed, dir.display());
    Ok(removed)
}

/// Run the full extraction over a document's views.
///
/// `pages` supplies tables and images, `text` the text units, `renderer` the
/// rasters. Per-candidate failures are tallied in the summary; only input,
/// fallback text and asset-directory failures abort the run.
pub fn run<P, T, R>(
    pages: &P,
    text: &T,
    renderer: &R,
    source_file: &str,
    options: &ExtractOptions,
) -> Result<Extraction>
where
    P: PageSource + ?Sized,
    T: TextSource + ?Sized,
    R: PageRenderer + ?Sized,
{
    let image_dir = options.image_dir.as_path();
    std::fs::create_dir_all(image_dir).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("cannot create {}: {}", image_dir.display(), e),
        ))
    })?;
    if options.recreate {
        clear_assets(image_dir)?;
    }

    let mut summary = ExtractionSummary::new();
    let text_blocks = extract_text_blocks(text, source_file, options)?;

    let mut tables: Vec<TableCandidate> = Vec::new();
    let mut images: Vec<ImageCandidate> = Vec::new();

    for number in pages.page_numbers() {
        if !options.pages.includes(number) {
            continue;
        }
        let page = match pages.page(number) {
            Ok(page) => page,
            Err(e) => {
                let reason = SkipReason::PageUnavailable(e.to_string());
                log::warn!("Page {}: {}", number, reason);
                summary.record_skip(&reason);
                continue;
            }
        };

        log::debug!(
            "Page {}: {} tables, {} images",
            number,
            page.tables.len(),
            page.images.len()
        );
        tables.extend(extract_page_tables(&page, renderer, &options.table, &mut summary));
        images.extend(extract_page_images(&page, renderer, &options.image, &mut summary));
    }

    let (tables, removed) = deduplicate(tables, options.table.dedup_iou);
    summary.duplicates_removed = removed;

    let mut visual = Vec::with_capacity(tables.len() + images.len());
    for table in &tables {
        match promote_table(table, image_dir, source_file) {
            Ok(block) => visual.push(block),
            Err(reason) => {
                log::warn!("Dropping table {} on page {}: {}", table.index, table.page, reason);
                summary.record_skip(&reason);
            }
        }
    }
    for image in &images {
        match promote_image(image, image_dir, source_file) {
            Ok(block) => visual.push(block),
            Err(reason) => {
                log::warn!("Dropping image {} on page {}: {}", image.index, image.page, reason);
                summary.record_skip(&reason);
            }
        }
    }

    let blocks = assemble(text_blocks, visual, &mut summary);

    log::info!(
        "{}: {} blocks ({} text, {} tables, {} images), {} duplicates removed, {} skipped",
        source_file,
        summary.total,
        summary.text_blocks(),
        summary.tables,
        summary.images,
        summary.duplicates_removed,
        summary.skipped_total()
    );

    Ok(Extraction { blocks, summary })
}

/// Concatenate text and visual blocks and stable-sort them by page.
pub fn assemble(
    text_blocks: Vec<Block>,
    visual_blocks: Vec<Block>,
    summary: &mut ExtractionSummary,
) -> Vec<Block> {
    let mut blocks = text_blocks;
    blocks.extend(visual_blocks);
    blocks.sort_by_key(|b| b.page());

    for block in &blocks {
        summary.record(block);
    }
    blocks
}

fn promote_table(
    table: &TableCandidate,
    dir: &Path,
    source_file: &str,
) -> std::result::Result<Block, SkipReason> {
    let name = table.file_name();
    table
        .raster
        .save_with_format(dir.join(&name), ImageFormat::Png)
        .map_err(|e| SkipReason::AssetWrite(e.to_string()))?;

    Ok(Block::new(
        BlockContent::Table(TableBlock {
            grid: table.grid.clone(),
            bbox: table.bbox,
            rendered_image_ref: Some(name),
            width: table.raster.width(),
            height: table.raster.height(),
        }),
        BlockMetadata {
            page: table.page,
            source_file: source_file.to_string(),
            extraction_method: ExtractionMethod::Table,
        },
    ))
}

fn promote_image(
    image: &ImageCandidate,
    dir: &Path,
    source_file: &str,
) -> std::result::Result<Block, SkipReason> {
    let pixel_ref = save_image(image, dir)?;

    let extraction_method = match image.strategy {
        SourceStrategy::Direct => ExtractionMethod::Direct,
        SourceStrategy::Rendered => ExtractionMethod::Rendered,
    };

    Ok(Block::new(
        BlockContent::Image(ImageBlock {
            pixel_ref,
            bbox: image.bbox,
            metrics: image.metrics,
        }),
        BlockMetadata {
            page: image.page,
            source_file: source_file.to_string(),
            extraction_method,
        },
    ))
}
