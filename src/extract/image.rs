//! Image candidates from two strategies and their reconciliation.
//!
//! Direct candidates decode the embedded image objects. Rendered candidates
//! crop each placement rectangle out of a page render. Both pass the same
//! logo/header heuristic and a strategy-specific quality floor, then each
//! page keeps one strategy's survivors.

use std::path::Path;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};

use crate::error::SkipReason;
use crate::geometry::{crop_region, BoundingBox};
use crate::model::{ExtractionSummary, ImageCandidate, QualityMetrics, SourceStrategy};
use crate::parser::{ColorSpace, EmbeddedImage, ImageData, ImageSettings, PageContent, PageRenderer};

/// Pixels of an embedded image, plus the original bytes when they can be
/// written out unchanged.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub image: DynamicImage,
    pub encoded: Option<Vec<u8>>,
    pub extension: &'static str,
}

/// Decode an embedded image object to pixels.
///
/// JPEG payloads keep their bytes. Raw 8-bit gray, RGB and CMYK samples and
/// 1-bit gray are supported; other encodings are a decode skip.
pub fn decode_embedded(img: &EmbeddedImage) -> Result<DecodedImage, SkipReason> {
    match &img.data {
        ImageData::Jpeg(bytes) => {
            let image = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
                .map_err(|e| SkipReason::Decode(e.to_string()))?;
            Ok(DecodedImage {
                image,
                encoded: Some(bytes.clone()),
                extension: "jpeg",
            })
        }
        ImageData::Raw(samples) => Ok(DecodedImage {
            image: decode_raw(img, samples)?,
            encoded: None,
            extension: "png",
        }),
        ImageData::Unsupported(filter) => Err(SkipReason::Decode(format!(
            "unsupported encoding {}",
            filter
        ))),
    }
}

fn decode_raw(img: &EmbeddedImage, samples: &[u8]) -> Result<DynamicImage, SkipReason> {
    let (w, h) = (img.width, img.height);
    let components = img.color_space.components().ok_or_else(|| {
        SkipReason::Decode(format!("unsupported color space {:?}", img.color_space))
    })?;

    let short = || SkipReason::Decode(format!("sample data too short for {}x{}", w, h));
    let pixels = w as usize * h as usize;

    match (components, img.bits_per_component) {
        (1, 8) => {
            let data = samples.get(..pixels).ok_or_else(short)?;
            GrayImage::from_raw(w, h, data.to_vec())
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(short)
        }
        (1, 1) => {
            let row_bytes = (w as usize).div_ceil(8);
            if samples.len() < row_bytes * h as usize {
                return Err(short());
            }
            let gray = GrayImage::from_fn(w, h, |x, y| {
                let byte = samples[y as usize * row_bytes + x as usize / 8];
                let bit = (byte >> (7 - (x % 8))) & 1;
                image::Luma([if bit == 1 { 255 } else { 0 }])
            });
            Ok(DynamicImage::ImageLuma8(gray))
        }
        (3, 8) => {
            let data = samples.get(..pixels * 3).ok_or_else(short)?;
            RgbImage::from_raw(w, h, data.to_vec())
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(short)
        }
        (4, 8) => {
            let data = samples.get(..pixels * 4).ok_or_else(short)?;
            let rgb: Vec<u8> = data
                .chunks_exact(4)
                .flat_map(|cmyk| {
                    let k = 255 - cmyk[3] as u16;
                    [0, 1, 2].map(|i| ((255 - cmyk[i] as u16) * k / 255) as u8)
                })
                .collect();
            RgbImage::from_raw(w, h, rgb)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(short)
        }
        (n, bits) => Err(SkipReason::Decode(format!(
            "{} components at {} bits per component",
            n, bits
        ))),
    }
}

/// Brighten and stretch a dark grayscale image.
///
/// Brightness scales every value; contrast then pushes values away from
/// the rounded mean. Results are truncated and clamped to 0..=255.
pub fn boost_calgray(image: &DynamicImage, settings: &ImageSettings) -> DynamicImage {
    let mut gray = image.to_luma8();

    let scale = |v: f32| -> u8 {
        if v <= 0.0 {
            0
        } else if v >= 255.0 {
            255
        } else {
            v as u8
        }
    };

    for p in gray.pixels_mut() {
        p.0[0] = scale(p.0[0] as f32 * settings.brightness_factor);
    }

    let count = gray.as_raw().len().max(1) as f64;
    let mean = gray.as_raw().iter().map(|&v| v as f64).sum::<f64>() / count;
    let mean = (mean + 0.5) as i32 as f32;

    for p in gray.pixels_mut() {
        p.0[0] = scale(mean + settings.contrast_factor * (p.0[0] as f32 - mean));
    }

    DynamicImage::ImageLuma8(gray)
}

/// Dimensions typical of logos, icons, banners and header strips.
pub fn is_logo_or_header(width: u32, height: u32, settings: &ImageSettings) -> bool {
    let aspect = if height == 0 {
        0.0
    } else {
        width as f32 / height as f32
    };

    (width < settings.logo_max_side && height < settings.logo_max_side)
        || aspect > settings.max_aspect
        || aspect < settings.min_aspect
        || (width < settings.icon_max_side && height < settings.icon_max_side)
        || (height < settings.header_max_height && aspect > settings.header_min_aspect)
        || (settings.square_aspect.contains(&aspect)
            && width < settings.square_max_side
            && height < settings.square_max_side)
}

fn check_logo(metrics: &QualityMetrics, settings: &ImageSettings) -> Result<(), SkipReason> {
    if is_logo_or_header(metrics.width, metrics.height, settings) {
        return Err(SkipReason::LogoOrHeader {
            width: metrics.width,
            height: metrics.height,
        });
    }
    Ok(())
}

fn check_quality(
    metrics: &QualityMetrics,
    min_brightness: f64,
    min_colors: usize,
) -> Result<(), SkipReason> {
    if metrics.brightness < min_brightness || metrics.unique_colors < min_colors {
        return Err(SkipReason::LowQuality {
            brightness: metrics.brightness,
            unique_colors: metrics.unique_colors,
        });
    }
    Ok(())
}

/// Build a direct candidate from one embedded image object.
pub fn direct_candidate(
    page: u32,
    index: usize,
    img: &EmbeddedImage,
    settings: &ImageSettings,
) -> Result<ImageCandidate, SkipReason> {
    if img.payload_len < settings.min_payload_bytes {
        return Err(SkipReason::PayloadTooSmall(img.payload_len));
    }

    let DecodedImage {
        mut image,
        mut encoded,
        mut extension,
    } = decode_embedded(img)?;
    let mut metrics = QualityMetrics::measure(&image);

    if img.color_space == ColorSpace::CalGray && metrics.brightness < settings.calgray_boost_below {
        log::debug!(
            "Boosting dark CalGray image {} on page {} (brightness {:.1})",
            img.name,
            page,
            metrics.brightness
        );
        image = boost_calgray(&image, settings);
        encoded = None;
        extension = "png";
        metrics = QualityMetrics::measure(&image);
    }

    check_logo(&metrics, settings)?;
    check_quality(
        &metrics,
        settings.direct_min_brightness,
        settings.direct_min_colors,
    )?;

    Ok(ImageCandidate {
        page,
        index,
        strategy: SourceStrategy::Direct,
        image,
        metrics,
        bbox: img.placements.first().copied(),
        encoded,
        extension,
    })
}

/// Build a rendered candidate by cropping one placement from a page render.
pub fn rendered_candidate(
    page: u32,
    index: usize,
    raster: &DynamicImage,
    placement: &BoundingBox,
    settings: &ImageSettings,
) -> Result<ImageCandidate, SkipReason> {
    let image = crop_region(raster, placement, settings.render_scale)
        .ok_or_else(|| SkipReason::Render("placement lies outside the page render".to_string()))?;

    if image.width() < settings.min_crop_px || image.height() < settings.min_crop_px {
        return Err(SkipReason::RasterTooSmall {
            width: image.width(),
            height: image.height(),
        });
    }

    let metrics = QualityMetrics::measure(&image);
    check_logo(&metrics, settings)?;
    check_quality(
        &metrics,
        settings.rendered_min_brightness,
        settings.rendered_min_colors,
    )?;

    Ok(ImageCandidate {
        page,
        index,
        strategy: SourceStrategy::Rendered,
        image,
        metrics,
        bbox: Some(*placement),
        encoded: None,
        extension: "png",
    })
}

/// Direct candidates of a page, indexed by object order.
pub fn direct_candidates(
    page: &PageContent,
    settings: &ImageSettings,
    summary: &mut ExtractionSummary,
) -> Vec<ImageCandidate> {
    let mut candidates = Vec::new();
    for (index, img) in page.images.iter().enumerate() {
        match direct_candidate(page.number, index, img, settings) {
            Ok(candidate) => candidates.push(candidate),
            Err(reason) => {
                log::debug!(
                    "Skipping direct image {} on page {}: {}",
                    img.name,
                    page.number,
                    reason
                );
                summary.record_skip(&reason);
            }
        }
    }
    candidates
}

/// Rendered candidates of a page, indexed by crop order.
///
/// The page is rendered only when it has image placements.
pub fn rendered_candidates<R: PageRenderer + ?Sized>(
    page: &PageContent,
    renderer: &R,
    settings: &ImageSettings,
    summary: &mut ExtractionSummary,
) -> Vec<ImageCandidate> {
    let placements: Vec<BoundingBox> = page
        .images
        .iter()
        .flat_map(|img| img.placements.iter().copied())
        .collect();
    if placements.is_empty() {
        return Vec::new();
    }

    let raster = match renderer.render_page(page.number, settings.render_scale) {
        Ok(raster) => raster,
        Err(e) => {
            let reason = SkipReason::from(e);
            log::warn!("Page {} render failed: {}", page.number, reason);
            for _ in &placements {
                summary.record_skip(&reason);
            }
            return Vec::new();
        }
    };

    let mut candidates = Vec::new();
    for (index, placement) in placements.iter().enumerate() {
        match rendered_candidate(page.number, index, &raster, placement, settings) {
            Ok(candidate) => candidates.push(candidate),
            Err(reason) => {
                log::debug!(
                    "Skipping rendered crop {} on page {}: {}",
                    index,
                    page.number,
                    reason
                );
                summary.record_skip(&reason);
            }
        }
    }
    candidates
}

/// Choose one strategy's images for a page.
///
/// Rendered crops brighter than the preference threshold win. Only when
/// none qualify are direct images above the fallback threshold used.
/// Returns the chosen images and how many candidates were set aside.
pub fn reconcile(
    direct: Vec<ImageCandidate>,
    rendered: Vec<ImageCandidate>,
    settings: &ImageSettings,
) -> (Vec<ImageCandidate>, usize) {
    let total = direct.len() + rendered.len();

    let preferred: Vec<ImageCandidate> = rendered
        .into_iter()
        .filter(|c| c.metrics.brightness > settings.prefer_rendered_brightness)
        .collect();

    let chosen = if preferred.is_empty() {
        direct
            .into_iter()
            .filter(|c| c.metrics.brightness > settings.fallback_direct_brightness)
            .collect()
    } else {
        preferred
    };

    let superseded = total - chosen.len();
    (chosen, superseded)
}

/// Direct and rendered extraction plus reconciliation for one page.
pub fn extract_page_images<R: PageRenderer + ?Sized>(
    page: &PageContent,
    renderer: &R,
    settings: &ImageSettings,
    summary: &mut ExtractionSummary,
) -> Vec<ImageCandidate> {
    let direct = direct_candidates(page, settings, summary);
    let rendered = rendered_candidates(page, renderer, settings, summary);
    log::debug!(
        "Page {}: {} direct and {} rendered image candidates",
        page.number,
        direct.len(),
        rendered.len()
    );

    let (chosen, superseded) = reconcile(direct, rendered, settings);
    summary.superseded_images += superseded;
    chosen
}

/// Write an image candidate into `dir`, returning the asset file name.
pub fn save_image(candidate: &ImageCandidate, dir: &Path) -> Result<String, SkipReason> {
    let name = candidate.file_name();
    let path = dir.join(&name);

    let written = match &candidate.encoded {
        Some(bytes) => std::fs::write(&path, bytes).map_err(|e| e.to_string()),
        None => candidate
            .image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| e.to_string()),
    };

    written.map(|_| name).map_err(SkipReason::AssetWrite)
}
