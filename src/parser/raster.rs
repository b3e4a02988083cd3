//! Raster view of a document, backed by pdfium.

use std::path::Path;

use image::DynamicImage;
use pdfium_render::prelude::*;

use crate::error::{Error, Result};
use crate::geometry::{crop_region, BoundingBox};

/// PDF points per inch.
pub const POINTS_PER_INCH: f32 = 72.0;

/// Renders pages, or regions of pages, to pixel buffers.
pub trait PageRenderer {
    /// Render a full page; `scale` is pixels per point.
    fn render_page(&self, page: u32, scale: f32) -> Result<DynamicImage>;

    /// Render a top-left page-coordinate region at the given resolution.
    fn render_region(&self, page: u32, region: &BoundingBox, dpi: f32) -> Result<DynamicImage> {
        let scale = dpi / POINTS_PER_INCH;
        let raster = self.render_page(page, scale)?;
        crop_region(&raster, region, scale).ok_or_else(|| {
            Error::Raster(format!(
                "region {:?} lies outside page {}",
                region.to_array(),
                page
            ))
        })
    }
}

/// Bind the pdfium library from the working directory, else from the system.
pub fn bind_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())?;
    Ok(Pdfium::new(bindings))
}

/// A document opened for rendering. Dropping it releases the pdfium handle.
pub struct PdfiumRenderer<'a> {
    document: PdfDocument<'a>,
}

impl<'a> PdfiumRenderer<'a> {
    /// Open a PDF file for rendering.
    pub fn open(pdfium: &'a Pdfium, path: &Path) -> Result<Self> {
        let document = pdfium.load_pdf_from_file(path, None)?;
        Ok(Self { document })
    }

    /// Get the number of pages.
    pub fn page_count(&self) -> u32 {
        self.document.pages().len() as u32
    }
}

impl PageRenderer for PdfiumRenderer<'_> {
    fn render_page(&self, page: u32, scale: f32) -> Result<DynamicImage> {
        let index = page
            .checked_sub(1)
            .and_then(|i| u16::try_from(i).ok())
            .ok_or_else(|| Error::PageOutOfRange(page, self.page_count()))?;

        let pdf_page = self.document.pages().get(index)?;
        let pixel_width = (pdf_page.width().value * scale).round() as i32;
        let pixel_height = (pdf_page.height().value * scale).round() as i32;

        log::debug!(
            "Rendering page {} at {:.2}x ({}x{} px)",
            page,
            scale,
            pixel_width,
            pixel_height
        );

        let bitmap = pdf_page.render_with_config(
            &PdfRenderConfig::new()
                .set_target_width(pixel_width)
                .set_target_height(pixel_height)
                .render_form_data(true)
                .render_annotations(true),
        )?;

        Ok(bitmap.as_image())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Blank page of a fixed size in points.
    struct BlankPage {
        width: f32,
        height: f32,
    }

    impl PageRenderer for BlankPage {
        fn render_page(&self, _page: u32, scale: f32) -> Result<DynamicImage> {
            Ok(DynamicImage::new_rgb8(
                (self.width * scale).round() as u32,
                (self.height * scale).round() as u32,
            ))
        }
    }

    #[test]
    fn test_render_region_at_dpi() {
        let renderer = BlankPage {
            width: 612.0,
            height: 792.0,
        };
        let region = BoundingBox::new(72.0, 72.0, 216.0, 144.0).unwrap();

        // 144 dpi is 2 px per point: 144pt x 72pt -> 288 x 144 px
        let raster = renderer.render_region(1, &region, 144.0).unwrap();
        assert_eq!((raster.width(), raster.height()), (288, 144));
    }

    #[test]
    fn test_render_region_outside_page() {
        let renderer = BlankPage {
            width: 100.0,
            height: 100.0,
        };
        let region = BoundingBox::new(200.0, 200.0, 300.0, 300.0).unwrap();
        assert!(matches!(
            renderer.render_region(1, &region, 72.0),
            Err(Error::Raster(_))
        ));
    }

    #[test]
    #[ignore = "requires the pdfium shared library"]
    fn test_bind_pdfium() {
        assert!(bind_pdfium().is_ok());
    }
}
