//! Page-space geometry: bounding boxes, overlap scoring and raster crops.
//!
//! All boxes use top-left origin page coordinates in points, the same space
//! the raster backend renders into (y grows downward).

use image::DynamicImage;
use serde::ser::{Serialize, Serializer};

use crate::parser::TableSettings;

/// Axis-aligned rectangle `(x0, y0, x1, y1)` in page points.
///
/// Constructed only through [`BoundingBox::new`], which enforces
/// `x1 > x0` and `y1 > y0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
}

impl BoundingBox {
    /// Create a box, or `None` when the corners do not describe a
    /// non-empty finite area.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Option<Self> {
        let finite = [x0, y0, x1, y1].iter().all(|v| v.is_finite());
        if finite && x1 > x0 && y1 > y0 {
            Some(Self { x0, y0, x1, y1 })
        } else {
            None
        }
    }

    pub fn x0(&self) -> f32 {
        self.x0
    }

    pub fn y0(&self) -> f32 {
        self.y0
    }

    pub fn x1(&self) -> f32 {
        self.x1
    }

    pub fn y1(&self) -> f32 {
        self.y1
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Overlapping region, if any.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        BoundingBox::new(
            self.x0.max(other.x0),
            self.y0.max(other.y0),
            self.x1.min(other.x1),
            self.y1.min(other.y1),
        )
    }

    /// Intersection over union, in `[0, 1]`.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter = match self.intersection(other) {
            Some(region) => region.area(),
            None => return 0.0,
        };
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    /// Multiply every coordinate by `factor` (points to pixels, 2x renders).
    pub fn scale(&self, factor: f32) -> Option<BoundingBox> {
        BoundingBox::new(
            self.x0 * factor,
            self.y0 * factor,
            self.x1 * factor,
            self.y1 * factor,
        )
    }

    /// Clip to the page rectangle `[0, width] x [0, height]`.
    pub fn clip_to_page(&self, width: f32, height: f32) -> Option<BoundingBox> {
        BoundingBox::new(0.0, 0.0, width, height).and_then(|page| self.intersection(&page))
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.x0, self.y0, self.x1, self.y1]
    }
}

impl Serialize for BoundingBox {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_array().serialize(serializer)
    }
}

/// Extrapolate a table region from the text matched for its first cell.
///
/// The matched text's top-left corner is pushed out by the anchor margins,
/// height comes from the row count and width is at least the configured
/// minimum. The result is clipped to the page.
pub fn anchor_bbox(
    matched: &BoundingBox,
    rows: usize,
    page_width: f32,
    page_height: f32,
    settings: &TableSettings,
) -> Option<BoundingBox> {
    let x0 = matched.x0 - settings.anchor_margin_x;
    let y0 = matched.y0 - settings.anchor_margin_y;
    let width = settings
        .min_table_width
        .max(matched.width() + settings.width_padding);
    let height = rows as f32 * settings.row_height;

    BoundingBox::new(x0, y0, x0 + width, y0 + height)?.clip_to_page(page_width, page_height)
}

/// Guess a table region from its position in the page's table order.
///
/// Boxes start at a fraction of page height and step down per table; the
/// vertical offset is clamped so the box never leaves the page.
pub fn positional_bbox(
    index: usize,
    page_width: f32,
    page_height: f32,
    settings: &TableSettings,
) -> Option<BoundingBox> {
    let height = settings.positional_height.min(page_height);
    let start = page_height * settings.positional_start_ratio
        + index as f32 * settings.positional_step;
    let y0 = start.min(page_height - height).max(0.0);

    BoundingBox::new(
        settings.side_margin,
        y0,
        page_width - settings.side_margin,
        y0 + height,
    )
}

/// Cut the region of a rendered page that corresponds to `region`.
///
/// `scale` converts page points to raster pixels. The crop is clamped to the
/// raster; `None` means nothing of the region lies inside it.
pub fn crop_region(raster: &DynamicImage, region: &BoundingBox, scale: f32) -> Option<DynamicImage> {
    let pixels = region.scale(scale)?;
    let max_w = raster.width() as f32;
    let max_h = raster.height() as f32;

    let x0 = pixels.x0.max(0.0).floor();
    let y0 = pixels.y0.max(0.0).floor();
    let x1 = pixels.x1.min(max_w).ceil();
    let y1 = pixels.y1.min(max_h).ceil();
    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some(raster.crop_imm(
        x0 as u32,
        y0 as u32,
        (x1 - x0) as u32,
        (y1 - y0) as u32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x0: f32, y0: f32, x1: f32, y1: f32) -> BoundingBox {
        BoundingBox::new(x0, y0, x1, y1).unwrap()
    }

    #[test]
    fn test_new_rejects_degenerate() {
        assert!(BoundingBox::new(0.0, 0.0, 10.0, 10.0).is_some());
        assert!(BoundingBox::new(10.0, 0.0, 10.0, 10.0).is_none());
        assert!(BoundingBox::new(0.0, 5.0, 10.0, 1.0).is_none());
        assert!(BoundingBox::new(0.0, 0.0, f32::NAN, 10.0).is_none());
    }

    #[test]
    fn test_iou() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);

        let disjoint = bbox(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&disjoint), 0.0);

        // Touching edges share no area.
        let touching = bbox(10.0, 0.0, 20.0, 10.0);
        assert_eq!(a.iou(&touching), 0.0);

        // Half overlap: 50 / 150
        let half = bbox(5.0, 0.0, 15.0, 10.0);
        assert!((a.iou(&half) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_union_and_clip() {
        let a = bbox(10.0, 10.0, 20.0, 20.0);
        let b = bbox(15.0, 5.0, 30.0, 12.0);
        assert_eq!(a.union(&b), bbox(10.0, 5.0, 30.0, 20.0));

        let spill = bbox(-10.0, 500.0, 700.0, 900.0);
        assert_eq!(
            spill.clip_to_page(612.0, 792.0),
            Some(bbox(0.0, 500.0, 612.0, 792.0))
        );
    }

    #[test]
    fn test_anchor_bbox() {
        let settings = TableSettings::default();
        let matched = bbox(100.0, 200.0, 160.0, 212.0);

        let region = anchor_bbox(&matched, 3, 612.0, 792.0, &settings).unwrap();
        assert_eq!(region, bbox(80.0, 190.0, 380.0, 250.0));

        // Wide anchor text grows the region beyond the minimum width.
        let wide = bbox(50.0, 100.0, 450.0, 110.0);
        let region = anchor_bbox(&wide, 2, 612.0, 792.0, &settings).unwrap();
        assert_eq!(region.width(), 500.0);
        assert_eq!(region.height(), 40.0);
    }

    #[test]
    fn test_positional_bbox() {
        let settings = TableSettings::default();

        let first = positional_bbox(0, 600.0, 800.0, &settings).unwrap();
        assert_eq!(first, bbox(50.0, 160.0, 550.0, 360.0));

        let second = positional_bbox(1, 600.0, 800.0, &settings).unwrap();
        assert_eq!(second.y0(), 310.0);

        // Far down the page order the box is pulled back inside the page.
        let late = positional_bbox(10, 600.0, 800.0, &settings).unwrap();
        assert_eq!(late.y1(), 800.0);
        assert_eq!(late.height(), 200.0);
    }

    #[test]
    fn test_positional_bbox_narrow_page() {
        let settings = TableSettings::default();
        assert!(positional_bbox(0, 90.0, 800.0, &settings).is_none());
    }

    #[test]
    fn test_crop_region() {
        let raster = DynamicImage::new_rgb8(200, 100);
        let region = bbox(10.0, 10.0, 40.0, 30.0);

        let crop = crop_region(&raster, &region, 2.0).unwrap();
        assert_eq!((crop.width(), crop.height()), (60, 40));

        // Clamped to the raster edge.
        let edge = bbox(90.0, 40.0, 150.0, 80.0);
        let crop = crop_region(&raster, &edge, 2.0).unwrap();
        assert_eq!((crop.width(), crop.height()), (20, 20));

        let outside = bbox(150.0, 150.0, 160.0, 160.0);
        assert!(crop_region(&raster, &outside, 2.0).is_none());
    }
}
