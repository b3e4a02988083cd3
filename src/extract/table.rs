//! Table candidates: grid filtering, region estimation and region renders.

use crate::error::SkipReason;
use crate::geometry::{anchor_bbox, positional_bbox, BoundingBox};
use crate::model::{ExtractionSummary, TableCandidate, TableGrid};
use crate::parser::{PageContent, PageRenderer, TableSettings};

/// Estimate where a table sits on its page.
///
/// Tries the located bounds for this occurrence index, then a text anchor
/// built from the first non-empty cell, then a positional guess.
pub fn estimate_bbox(
    page: &PageContent,
    index: usize,
    grid: &TableGrid,
    settings: &TableSettings,
) -> Option<BoundingBox> {
    if let Some(located) = page.table_regions.get(index).copied().flatten() {
        return Some(located);
    }

    if let Some(matched) = grid
        .first_non_empty_cell()
        .and_then(|cell| find_anchor(page, cell, settings.anchor_chars))
    {
        log::debug!("Table {} on page {}: anchored on cell text", index, page.number);
        if let Some(region) =
            anchor_bbox(&matched, grid.row_count(), page.width, page.height, settings)
        {
            return Some(region);
        }
    }

    if page.chars.is_empty() {
        return None;
    }
    log::debug!("Table {} on page {}: positional estimate", index, page.number);
    positional_bbox(index, page.width, page.height, settings)
}

/// Union of the page characters spelling the first `max_chars`
/// non-whitespace characters of `cell`.
fn find_anchor(page: &PageContent, cell: &str, max_chars: usize) -> Option<BoundingBox> {
    let needle: Vec<char> = cell
        .chars()
        .filter(|c| !c.is_whitespace())
        .take(max_chars)
        .collect();
    if needle.is_empty() {
        return None;
    }

    let haystack: Vec<_> = page.chars.iter().filter(|c| !c.ch.is_whitespace()).collect();
    let start = haystack
        .windows(needle.len())
        .position(|window| window.iter().zip(&needle).all(|(pc, ch)| pc.ch == *ch))?;

    haystack[start..start + needle.len()]
        .iter()
        .map(|pc| pc.bbox)
        .reduce(|acc, b| acc.union(&b))
}

/// Build the candidate for one grid: estimate, render and size-check.
pub fn table_candidate<R: PageRenderer + ?Sized>(
    page: &PageContent,
    index: usize,
    grid: &TableGrid,
    renderer: &R,
    settings: &TableSettings,
) -> Result<TableCandidate, SkipReason> {
    if grid.row_count() < 2 {
        return Err(SkipReason::TooFewRows(grid.row_count()));
    }

    let bbox = estimate_bbox(page, index, grid, settings).ok_or(SkipReason::NoBoundingBox)?;
    let raster = renderer.render_region(page.number, &bbox, settings.render_dpi)?;

    if raster.width() < settings.min_raster_px || raster.height() < settings.min_raster_px {
        return Err(SkipReason::RasterTooSmall {
            width: raster.width(),
            height: raster.height(),
        });
    }

    Ok(TableCandidate {
        page: page.number,
        index,
        grid: grid.clone(),
        bbox: Some(bbox),
        raster,
    })
}

/// All table candidates of a page; dropped grids are tallied in `summary`.
pub fn extract_page_tables<R: PageRenderer + ?Sized>(
    page: &PageContent,
    renderer: &R,
    settings: &TableSettings,
    summary: &mut ExtractionSummary,
) -> Vec<TableCandidate> {
    let mut candidates = Vec::new();

    for (index, grid) in page.tables.iter().enumerate() {
        match table_candidate(page, index, grid, renderer, settings) {
            Ok(candidate) => candidates.push(candidate),
            Err(reason) => {
                log::warn!("Skipping table {} on page {}: {}", index, page.number, reason);
                summary.record_skip(&reason);
            }
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::parser::PageChar;
    use image::DynamicImage;

    struct BlankRenderer;

    impl PageRenderer for BlankRenderer {
        fn render_page(&self, _page: u32, scale: f32) -> Result<DynamicImage> {
            Ok(DynamicImage::new_rgb8(
                (612.0 * scale).round() as u32,
                (792.0 * scale).round() as u32,
            ))
        }
    }

    struct FailingRenderer;

    impl PageRenderer for FailingRenderer {
        fn render_page(&self, _page: u32, _scale: f32) -> Result<DynamicImage> {
            Err(Error::Raster("no device".into()))
        }
    }

    fn page_with_text(text: &str, x: f32, y: f32) -> PageContent {
        let chars = text
            .chars()
            .enumerate()
            .filter_map(|(i, ch)| {
                let x0 = x + i as f32 * 6.0;
                BoundingBox::new(x0, y, x0 + 6.0, y + 12.0).map(|bbox| PageChar { ch, bbox })
            })
            .collect();
        PageContent {
            number: 1,
            width: 612.0,
            height: 792.0,
            chars,
            ..Default::default()
        }
    }

    fn grid() -> TableGrid {
        TableGrid::from_strs(&[&["", "Quarterly Revenue"], &["Q1", "10"], &["Q2", "12"]])
    }

    #[test]
    fn test_estimate_prefers_located_region() {
        let mut page = page_with_text("Quarterly Revenue", 100.0, 200.0);
        let located = BoundingBox::new(40.0, 40.0, 400.0, 120.0);
        page.table_regions = vec![located];
        assert_eq!(
            estimate_bbox(&page, 0, &grid(), &TableSettings::default()),
            located
        );
    }

    #[test]
    fn test_estimate_from_text_anchor() {
        let page = page_with_text("Quarterly Revenue", 100.0, 200.0);
        let bbox = estimate_bbox(&page, 0, &grid(), &TableSettings::default()).unwrap();

        // Anchor "QuarterlyR" spans 100..166 x 200..212 (space skipped)
        assert_eq!(bbox.x0(), 80.0);
        assert_eq!(bbox.y0(), 190.0);
        assert_eq!(bbox.width(), 300.0);
        assert_eq!(bbox.height(), 60.0);
    }

    #[test]
    fn test_estimate_positional_when_anchor_missing() {
        let page = page_with_text("unrelated body text", 100.0, 200.0);
        let bbox = estimate_bbox(&page, 1, &grid(), &TableSettings::default()).unwrap();
        assert_eq!(bbox.x0(), 50.0);
        assert_eq!(bbox.x1(), 562.0);
        assert!((bbox.y0() - (792.0 * 0.2 + 150.0)).abs() < 1e-3);
    }

    #[test]
    fn test_estimate_none_without_chars() {
        let page = PageContent {
            number: 1,
            width: 612.0,
            height: 792.0,
            ..Default::default()
        };
        assert!(estimate_bbox(&page, 0, &grid(), &TableSettings::default()).is_none());
    }

    #[test]
    fn test_candidate_rejects_single_row() {
        let page = page_with_text("A B", 100.0, 200.0);
        let one_row = TableGrid::from_strs(&[&["A", "B"]]);
        let result = table_candidate(&page, 0, &one_row, &BlankRenderer, &TableSettings::default());
        assert!(matches!(result, Err(SkipReason::TooFewRows(1))));
    }

    #[test]
    fn test_candidate_rejects_small_raster() {
        let mut page = page_with_text("Quarterly Revenue", 100.0, 200.0);
        // 20pt square renders to about 42px at 150 dpi
        page.table_regions = vec![BoundingBox::new(10.0, 10.0, 30.0, 30.0)];
        let result = table_candidate(&page, 0, &grid(), &BlankRenderer, &TableSettings::default());
        assert!(matches!(result, Err(SkipReason::RasterTooSmall { .. })));
    }

    #[test]
    fn test_extract_page_tables_tallies_skips() {
        let mut page = page_with_text("Quarterly Revenue", 100.0, 200.0);
        page.tables = vec![grid(), TableGrid::from_strs(&[&["only", "row"]])];

        let mut summary = ExtractionSummary::new();
        let tables = extract_page_tables(&page, &BlankRenderer, &TableSettings::default(), &mut summary);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].index, 0);
        assert_eq!(tables[0].rows(), 3);
        assert_eq!(summary.skipped["too_few_rows"], 1);

        let mut summary = ExtractionSummary::new();
        let tables =
            extract_page_tables(&page, &FailingRenderer, &TableSettings::default(), &mut summary);
        assert!(tables.is_empty());
        assert_eq!(summary.skipped["render"], 1);
    }
}
