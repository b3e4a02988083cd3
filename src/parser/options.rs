//! Extraction options and configuration.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Root directory for per-collection asset folders.
pub const IMAGE_ROOT: &str = "data/images";

/// Folder used when no collection name is given.
pub const DEFAULT_COLLECTION_DIR: &str = "unified";

const MAX_COLLECTION_NAME_LEN: usize = 50;

/// Options for a block extraction run.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Destination directory for table and image rasters
    pub image_dir: PathBuf,

    /// Clear previously written assets from `image_dir` before extracting
    pub recreate: bool,

    /// Page selection (which pages to extract)
    pub pages: PageSelection,

    /// Emit document outline entries as section blocks
    pub include_outline_sections: bool,

    /// Table extraction thresholds
    pub table: TableSettings,

    /// Image extraction thresholds
    pub image: ImageSettings,
}

impl ExtractOptions {
    /// Create new extract options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the asset directory.
    pub fn with_image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.image_dir = dir.into();
        self
    }

    /// Use the asset directory derived from a collection name.
    pub fn for_collection(mut self, name: &str) -> Self {
        self.image_dir = Path::new(IMAGE_ROOT).join(normalize_collection_name(name));
        self
    }

    /// Enable or disable clearing old assets before the run.
    pub fn with_recreate(mut self, recreate: bool) -> Self {
        self.recreate = recreate;
        self
    }

    /// Set page selection.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.pages = pages;
        self
    }

    /// Enable or disable outline sections.
    pub fn with_outline_sections(mut self, include: bool) -> Self {
        self.include_outline_sections = include;
        self
    }

    /// Replace table thresholds.
    pub fn with_table_settings(mut self, settings: TableSettings) -> Self {
        self.table = settings;
        self
    }

    /// Replace image thresholds.
    pub fn with_image_settings(mut self, settings: ImageSettings) -> Self {
        self.image = settings;
        self
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            image_dir: Path::new(IMAGE_ROOT).join(DEFAULT_COLLECTION_DIR),
            recreate: false,
            pages: PageSelection::All,
            include_outline_sections: true,
            table: TableSettings::default(),
            image: ImageSettings::default(),
        }
    }
}

/// Table detection, bbox estimation and rendering thresholds (points unless noted).
#[derive(Debug, Clone, PartialEq)]
pub struct TableSettings {
    /// Resolution for table region renders
    pub render_dpi: f32,
    /// Minimum rendered width and height in pixels
    pub min_raster_px: u32,
    /// Characters of the first non-empty cell used as text anchor
    pub anchor_chars: usize,
    /// Estimated height per grid row
    pub row_height: f32,
    /// Lower bound for anchor-estimated width
    pub min_table_width: f32,
    /// Added to the matched anchor text width
    pub width_padding: f32,
    /// Left shift applied to the anchor's top-left corner
    pub anchor_margin_x: f32,
    /// Upward shift applied to the anchor's top-left corner
    pub anchor_margin_y: f32,
    /// Fraction of page height where positional guesses start
    pub positional_start_ratio: f32,
    /// Vertical step per table index for positional guesses
    pub positional_step: f32,
    /// Left and right margin for positional guesses
    pub side_margin: f32,
    /// Height of positional guesses
    pub positional_height: f32,
    /// IoU above which two tables are duplicates
    pub dedup_iou: f32,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            render_dpi: 150.0,
            min_raster_px: 50,
            anchor_chars: 10,
            row_height: 20.0,
            min_table_width: 300.0,
            width_padding: 100.0,
            anchor_margin_x: 20.0,
            anchor_margin_y: 10.0,
            positional_start_ratio: 0.2,
            positional_step: 150.0,
            side_margin: 50.0,
            positional_height: 200.0,
            dedup_iou: 0.8,
        }
    }
}

/// Image extraction, noise filtering and reconciliation thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSettings {
    /// Embedded payloads below this many bytes are ignored
    pub min_payload_bytes: usize,
    /// Page render scale for crop extraction
    pub render_scale: f32,
    /// Minimum crop width and height in pixels
    pub min_crop_px: u32,
    /// Both dimensions below this is a logo
    pub logo_max_side: u32,
    /// Both dimensions below this is an icon
    pub icon_max_side: u32,
    /// Aspect ratio above this is a banner
    pub max_aspect: f32,
    /// Aspect ratio below this is a vertical strip
    pub min_aspect: f32,
    /// Height below this combined with a wide aspect is a header
    pub header_max_height: u32,
    pub header_min_aspect: f32,
    /// Near-square images with both sides below this are badges
    pub square_max_side: u32,
    pub square_aspect: RangeInclusive<f32>,
    /// Quality floors for directly extracted images
    pub direct_min_brightness: f64,
    pub direct_min_colors: usize,
    /// Quality floors for rendered crops
    pub rendered_min_brightness: f64,
    pub rendered_min_colors: usize,
    /// Rendered crops need more than this brightness to win a page
    pub prefer_rendered_brightness: f64,
    /// Direct images need more than this brightness when used as fallback
    pub fallback_direct_brightness: f64,
    /// CalGray images darker than this are boosted
    pub calgray_boost_below: f64,
    pub brightness_factor: f32,
    pub contrast_factor: f32,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            min_payload_bytes: 1000,
            render_scale: 2.0,
            min_crop_px: 50,
            logo_max_side: 200,
            icon_max_side: 150,
            max_aspect: 8.0,
            min_aspect: 0.2,
            header_max_height: 100,
            header_min_aspect: 3.0,
            square_max_side: 120,
            square_aspect: 0.8..=1.2,
            direct_min_brightness: 80.0,
            direct_min_colors: 5,
            rendered_min_brightness: 50.0,
            rendered_min_colors: 3,
            prefer_rendered_brightness: 100.0,
            fallback_direct_brightness: 80.0,
            calgray_boost_below: 120.0,
            brightness_factor: 1.5,
            contrast_factor: 1.3,
        }
    }
}

/// Page selection for extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PageSelection {
    /// Extract all pages
    #[default]
    All,
    /// Extract a range of pages (inclusive, 1-indexed)
    Range(RangeInclusive<u32>),
    /// Extract specific pages (1-indexed)
    Pages(Vec<u32>),
    /// Extract several disjoint ranges, ascending
    Ranges(Vec<RangeInclusive<u32>>),
}

impl PageSelection {
    /// Check if a page number should be included.
    pub fn includes(&self, page: u32) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::Range(range) => range.contains(&page),
            PageSelection::Pages(pages) => pages.contains(&page),
            PageSelection::Ranges(ranges) => ranges.iter().any(|r| r.contains(&page)),
        }
    }

    /// Parse a page selection string (e.g., "1-10", "1,3,5,7-10").
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if s.is_empty() || s == "all" {
            return Ok(PageSelection::All);
        }

        let invalid = || Error::InvalidPageRange(s.to_string());

        // Simple range (e.g., "1-10")
        if let Some((start, end)) = s.split_once('-') {
            if !start.contains(',') && !end.contains(',') {
                let start: u32 = start.trim().parse().map_err(|_| invalid())?;
                let end: u32 = end.trim().parse().map_err(|_| invalid())?;
                if start == 0 || end < start {
                    return Err(invalid());
                }
                return Ok(PageSelection::Range(start..=end));
            }
        }

        let mut ranges: Vec<RangeInclusive<u32>> = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            let (start, end) = match part.split_once('-') {
                Some((start, end)) => (
                    start.trim().parse::<u32>().map_err(|_| invalid())?,
                    end.trim().parse::<u32>().map_err(|_| invalid())?,
                ),
                None => {
                    let p = part.parse::<u32>().map_err(|_| invalid())?;
                    (p, p)
                }
            };
            if start == 0 || end < start {
                return Err(invalid());
            }
            ranges.push(start..=end);
        }

        if ranges.iter().all(|r| r.start() == r.end()) {
            let pages: BTreeSet<u32> = ranges.iter().map(|r| *r.start()).collect();
            return Ok(PageSelection::Pages(pages.into_iter().collect()));
        }

        // Overlapping or adjacent ranges are merged
        ranges.sort_by_key(|r| *r.start());
        let mut merged: Vec<RangeInclusive<u32>> = Vec::new();
        for range in ranges {
            match merged.last_mut() {
                Some(last) if *range.start() <= last.end().saturating_add(1) => {
                    if range.end() > last.end() {
                        *last = *last.start()..=*range.end();
                    }
                }
                _ => merged.push(range),
            }
        }
        Ok(PageSelection::Ranges(merged))
    }
}

/// Turn a free-form collection name into a safe directory name.
///
/// Non-alphanumeric characters become `_`, runs of `_` collapse, leading and
/// trailing `_` are trimmed, names that are empty or do not start with an
/// ASCII letter get a `C_` prefix, and the result is capped at 50 characters.
pub fn normalize_collection_name(name: &str) -> String {
    static NON_ALNUM: OnceLock<Regex> = OnceLock::new();
    static UNDERSCORES: OnceLock<Regex> = OnceLock::new();
    let non_alnum = NON_ALNUM.get_or_init(|| Regex::new(r"[^a-zA-Z0-9]").expect("valid regex"));
    let underscores = UNDERSCORES.get_or_init(|| Regex::new(r"_+").expect("valid regex"));

    let replaced = non_alnum.replace_all(name, "_");
    let collapsed = underscores.replace_all(&replaced, "_");
    let mut normalized = collapsed.trim_matches('_').to_string();

    if !normalized
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
    {
        normalized = format!("C_{}", normalized);
    }

    normalized.truncate(MAX_COLLECTION_NAME_LEN);
    normalized
}
