//! Unpromoted extraction results and their measurements.

use std::borrow::Cow;
use std::collections::HashSet;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use super::TableGrid;
use crate::geometry::BoundingBox;

/// Pixel statistics of an image candidate, measured once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Mean over every channel value of every pixel
    pub brightness: f64,
    /// Number of distinct pixel values (gray) or channel tuples (color)
    pub unique_colors: usize,
    pub width: u32,
    pub height: u32,
}

impl QualityMetrics {
    /// Measure an image in its native channel layout.
    ///
    /// 8-bit gray, gray-alpha, RGB and RGBA buffers are read as-is (alpha
    /// counts toward brightness); deeper formats are reduced to 8-bit RGB.
    pub fn measure(image: &DynamicImage) -> Self {
        let (channels, samples): (usize, Cow<'_, [u8]>) = match image {
            DynamicImage::ImageLuma8(buf) => (1, Cow::Borrowed(buf.as_raw().as_slice())),
            DynamicImage::ImageLumaA8(buf) => (2, Cow::Borrowed(buf.as_raw().as_slice())),
            DynamicImage::ImageRgb8(buf) => (3, Cow::Borrowed(buf.as_raw().as_slice())),
            DynamicImage::ImageRgba8(buf) => (4, Cow::Borrowed(buf.as_raw().as_slice())),
            other => (3, Cow::Owned(other.to_rgb8().into_raw())),
        };

        let brightness = if samples.is_empty() {
            0.0
        } else {
            samples.iter().map(|&v| v as u64).sum::<u64>() as f64 / samples.len() as f64
        };
        let unique_colors = samples
            .chunks_exact(channels)
            .collect::<HashSet<&[u8]>>()
            .len();

        Self {
            brightness,
            unique_colors,
            width: image.width(),
            height: image.height(),
        }
    }
}

/// Which image extraction strategy produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceStrategy {
    /// Embedded image object decoded from the document
    Direct,
    /// Placement rectangle cropped from a page render
    Rendered,
}

impl SourceStrategy {
    /// Asset file name tag.
    pub fn tag(&self) -> &'static str {
        match self {
            SourceStrategy::Direct => "direct",
            SourceStrategy::Rendered => "rendered",
        }
    }
}

/// A detected table waiting for deduplication.
#[derive(Debug, Clone)]
pub struct TableCandidate {
    pub page: u32,
    /// Occurrence order of the table on its page
    pub index: usize,
    pub grid: TableGrid,
    pub bbox: Option<BoundingBox>,
    /// Region render, written out on promotion
    pub raster: DynamicImage,
}

impl TableCandidate {
    pub fn rows(&self) -> usize {
        self.grid.row_count()
    }

    pub fn columns(&self) -> usize {
        self.grid.column_count()
    }

    /// Dedup score: cell count plus a small area term.
    pub fn score(&self) -> f64 {
        let area = self.bbox.map(|b| b.area() as f64).unwrap_or(0.0);
        (self.rows() * self.columns()) as f64 + 0.01 * area
    }

    /// Deterministic asset file name of the region render.
    pub fn file_name(&self) -> String {
        format!("table_page{}_{}.png", self.page, self.index)
    }
}

/// An image that passed the size and quality filters of its strategy.
#[derive(Debug, Clone)]
pub struct ImageCandidate {
    pub page: u32,
    /// Object index (direct) or crop index (rendered) on the page
    pub index: usize,
    pub strategy: SourceStrategy,
    pub image: DynamicImage,
    pub metrics: QualityMetrics,
    /// Placement on the page, when known
    pub bbox: Option<BoundingBox>,
    /// Original encoded bytes to write verbatim (JPEG payloads)
    pub encoded: Option<Vec<u8>>,
    /// Asset file extension
    pub extension: &'static str,
}

impl ImageCandidate {
    /// Deterministic asset file name.
    pub fn file_name(&self) -> String {
        format!(
            "{}_page{}_{}.{}",
            self.strategy.tag(),
            self.page,
            self.index,
            self.extension
        )
    }
}
