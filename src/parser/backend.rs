//! PDF backend abstraction layer.
//!
//! The extraction stages read documents through two traits: [`PageSource`]
//! (per-page characters, table grids and image objects) and [`TextSource`]
//! (structured text units and plain per-page text). [`LopdfBackend`]
//! implements both on top of `lopdf` and `pdf-extract`.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId};

use super::layout::{LayoutAnalyzer, PageScan, Placement};
use super::table_detector::TableDetector;
use crate::error::{Error, Result};
use crate::geometry::BoundingBox;
use crate::model::TableGrid;

/// PDF magic bytes: %PDF-
const PDF_MAGIC: &[u8] = b"%PDF-";

/// US Letter, used when a page carries no usable MediaBox.
const DEFAULT_PAGE_SIZE: (f32, f32) = (612.0, 792.0);

/// Rectangle with ordered corners, if it has an area.
fn normalized([a, b, c, d]: [f32; 4]) -> Option<[f32; 4]> {
    let rect = [a.min(c), b.min(d), a.max(c), b.max(d)];
    (rect[2] > rect[0] && rect[3] > rect[1]).then_some(rect)
}

/// Visible page area in PDF user space and its clockwise display rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PageFrame {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    /// 0, 90, 180 or 270
    rotation: u16,
}

impl PageFrame {
    /// Page size as displayed.
    fn size(&self) -> (f32, f32) {
        let (w, h) = (self.x1 - self.x0, self.y1 - self.y0);
        match self.rotation {
            90 | 270 => (h, w),
            _ => (w, h),
        }
    }

    /// PDF user space point to top-left display coordinates.
    fn point(&self, x: f32, y: f32) -> (f32, f32) {
        match self.rotation {
            90 => (y - self.y0, x - self.x0),
            180 => (self.x1 - x, y - self.y0),
            270 => (self.y1 - y, self.x1 - x),
            _ => (x - self.x0, self.y1 - y),
        }
    }

    /// PDF user space rectangle to a top-left display box.
    fn to_page(&self, x0: f32, y0: f32, x1: f32, y1: f32) -> Option<BoundingBox> {
        let (ax, ay) = self.point(x0, y0);
        let (bx, by) = self.point(x1, y1);
        BoundingBox::new(ax.min(bx), ay.min(by), ax.max(bx), ay.max(by))
    }
}

/// Color space of an embedded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorSpace {
    DeviceGray,
    CalGray,
    DeviceRgb,
    CalRgb,
    DeviceCmyk,
    /// ICC profile with its component count
    IccBased(u8),
    Other(String),
}

impl ColorSpace {
    /// Number of color components, when known.
    pub fn components(&self) -> Option<u8> {
        match self {
            ColorSpace::DeviceGray | ColorSpace::CalGray => Some(1),
            ColorSpace::DeviceRgb | ColorSpace::CalRgb => Some(3),
            ColorSpace::DeviceCmyk => Some(4),
            ColorSpace::IccBased(n) => Some(*n),
            ColorSpace::Other(_) => None,
        }
    }
}

/// Pixel payload of an embedded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageData {
    /// Complete JPEG file (DCT-encoded stream)
    Jpeg(Vec<u8>),
    /// Decompressed samples, row-major, `bits_per_component` per sample
    Raw(Vec<u8>),
    /// Encoding that cannot be decoded here, with a description
    Unsupported(String),
}

/// An image XObject referenced by a page.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    /// Resource name on the page
    pub name: String,
    /// Size of the stored (still encoded) stream in bytes
    pub payload_len: usize,
    pub data: ImageData,
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u8,
    pub color_space: ColorSpace,
    /// Where the image is painted, top-left page coordinates
    pub placements: Vec<BoundingBox>,
}

/// A positioned character in top-left page coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct PageChar {
    pub ch: char,
    pub bbox: BoundingBox,
}

/// Tabular and object view of a single page.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    /// 1-indexed page number
    pub number: u32,
    /// Page width in points
    pub width: f32,
    /// Page height in points
    pub height: f32,
    pub chars: Vec<PageChar>,
    /// Raw table grids in occurrence order
    pub tables: Vec<TableGrid>,
    /// Located bounds for `tables`, by the same index
    pub table_regions: Vec<Option<BoundingBox>>,
    pub images: Vec<EmbeddedImage>,
}

/// Kind of a structured text unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// Body text block
    Body,
    /// Document outline entry
    Title,
}

/// A unit of text produced by the structured layout parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnit {
    /// 1-indexed page number
    pub page: u32,
    pub text: String,
    pub kind: UnitKind,
}

impl TextUnit {
    pub fn body(page: u32, text: impl Into<String>) -> Self {
        Self {
            page,
            text: text.into(),
            kind: UnitKind::Body,
        }
    }

    pub fn title(page: u32, text: impl Into<String>) -> Self {
        Self {
            page,
            text: text.into(),
            kind: UnitKind::Title,
        }
    }
}

/// Per-page access to characters, table grids and image objects.
pub trait PageSource {
    /// All page numbers in document order.
    fn page_numbers(&self) -> Vec<u32>;

    /// Load one page.
    fn page(&self, number: u32) -> Result<PageContent>;
}

/// Whole-document text access for the text block stage.
pub trait TextSource {
    /// Text units from the structured layout parser, in reading order.
    ///
    /// Fails as a whole if any page cannot be analyzed.
    fn structured_units(&self) -> Result<Vec<TextUnit>>;

    /// Plain text of every page, in page order.
    fn plain_pages(&self) -> Result<Vec<String>>;
}

/// Verify that a file starts with the PDF header.
pub fn check_pdf_header<P: AsRef<Path>>(path: P) -> Result<()> {
    let mut header = [0u8; 5];
    let mut file = File::open(path)?;
    let read = file.read(&mut header)?;
    if read < PDF_MAGIC.len() || !header.starts_with(PDF_MAGIC) {
        return Err(Error::UnknownFormat);
    }
    Ok(())
}

/// Simple text decoding fallback when no encoding is available.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    // Try UTF-16BE first (BOM marker)
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16(&utf16).unwrap_or_default();
    }

    // Try UTF-8
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    // Fallback: Latin-1
    bytes.iter().map(|&b| b as char).collect()
}

/// Stream bytes with filters applied; unfiltered streams are returned as-is.
pub(crate) fn stream_data(stream: &lopdf::Stream) -> Result<Vec<u8>> {
    if stream.dict.has(b"Filter") {
        stream
            .decompressed_content()
            .map_err(|e| Error::PdfParse(e.to_string()))
    } else {
        Ok(stream.content.clone())
    }
}

/// Concatenated content stream of a page. A page without contents is empty.
pub(crate) fn page_content(doc: &LopdfDocument, page_id: ObjectId) -> Result<Vec<u8>> {
    let page_dict = doc.get_dictionary(page_id)?;

    let contents = match page_dict.get(b"Contents") {
        Ok(contents) => contents,
        Err(_) => return Ok(Vec::new()),
    };

    let refs: Vec<&Object> = match resolve(doc, contents) {
        Some(Object::Array(arr)) => arr.iter().collect(),
        Some(obj @ Object::Stream(_)) => vec![obj],
        _ => return Err(Error::PdfParse("Invalid content stream".to_string())),
    };

    let mut content = Vec::new();
    for obj in refs {
        if let Some(Object::Stream(s)) = resolve(doc, obj) {
            content.extend_from_slice(&stream_data(s)?);
            content.push(b'\n');
        }
    }
    Ok(content)
}

/// Follow a reference, or return the object itself.
fn resolve<'a>(doc: &'a LopdfDocument, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn resolve_dict<'a>(doc: &'a LopdfDocument, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj)? {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

fn as_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Decode a PDF text string (UTF-16BE with BOM, else UTF-8 or Latin-1).
fn text_string(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => Some(decode_text_simple(bytes)),
        Object::Name(bytes) => Some(String::from_utf8_lossy(bytes).to_string()),
        _ => None,
    }
}

/// Concrete [`PageSource`] and [`TextSource`] backed by `lopdf::Document`.
pub struct LopdfBackend {
    doc: LopdfDocument,
    path: PathBuf,
}

impl LopdfBackend {
    /// Open a PDF file after checking its header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        check_pdf_header(path)?;

        let doc = LopdfDocument::load(path)?;

        Ok(Self {
            doc,
            path: path.to_path_buf(),
        })
    }

    /// Path the document was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the number of pages.
    pub fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    fn page_id(&self, number: u32) -> Result<ObjectId> {
        let pages = self.doc.get_pages();
        pages
            .get(&number)
            .copied()
            .ok_or(Error::PageOutOfRange(number, pages.len() as u32))
    }

    /// Look up a page attribute, following the Parent chain.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = self.doc.get_dictionary(page_id).ok();
        let mut seen = HashSet::new();

        while let Some(dict) = current {
            if let Ok(value) = dict.get(key) {
                return resolve(&self.doc, value);
            }
            let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
            if !seen.insert(parent) {
                return None;
            }
            current = self.doc.get_dictionary(parent).ok();
        }
        None
    }

    /// Inherited rectangle entry with ordered corners.
    fn rect(&self, page_id: ObjectId, key: &[u8]) -> Option<[f32; 4]> {
        let corners: Vec<f32> = self
            .inherited(page_id, key)?
            .as_array()
            .ok()?
            .iter()
            .filter_map(as_number)
            .collect();
        match corners.as_slice() {
            [a, b, c, d, ..] => normalized([*a, *b, *c, *d]),
            _ => None,
        }
    }

    /// Visible area and rotation of a page.
    ///
    /// The CropBox (clipped to the MediaBox) wins over the MediaBox. Both
    /// and `/Rotate` are inherited through the page tree.
    fn frame(&self, page_id: ObjectId) -> PageFrame {
        let media = self
            .rect(page_id, b"MediaBox")
            .unwrap_or([0.0, 0.0, DEFAULT_PAGE_SIZE.0, DEFAULT_PAGE_SIZE.1]);
        let [x0, y0, x1, y1] = self
            .rect(page_id, b"CropBox")
            .and_then(|crop| {
                let clipped = [
                    crop[0].max(media[0]),
                    crop[1].max(media[1]),
                    crop[2].min(media[2]),
                    crop[3].min(media[3]),
                ];
                normalized(clipped).filter(|c| *c == clipped)
            })
            .unwrap_or(media);

        let rotation = self
            .inherited(page_id, b"Rotate")
            .and_then(as_number)
            .map(|r| ((r / 90.0).round() as i64 * 90).rem_euclid(360) as u16)
            .unwrap_or(0);

        PageFrame {
            x0,
            y0,
            x1,
            y1,
            rotation,
        }
    }

    /// Image XObjects of a page's resources, with their placements.
    fn page_images(
        &self,
        page_id: ObjectId,
        placements: &[Placement],
        to_page: impl Fn(f32, f32, f32, f32) -> Option<BoundingBox>,
    ) -> Vec<EmbeddedImage> {
        let xobjects = self
            .inherited(page_id, b"Resources")
            .and_then(|r| resolve_dict(&self.doc, r))
            .and_then(|res| res.get(b"XObject").ok())
            .and_then(|x| resolve_dict(&self.doc, x));

        let Some(xobjects) = xobjects else {
            return Vec::new();
        };

        let mut images = Vec::new();
        for (name, obj) in xobjects.iter() {
            let Some(Object::Stream(stream)) = resolve(&self.doc, obj) else {
                continue;
            };
            let is_image = stream
                .dict
                .get(b"Subtype")
                .ok()
                .and_then(|s| s.as_name_str().ok())
                == Some("Image");
            if !is_image {
                continue;
            }

            let boxes = placements
                .iter()
                .filter(|p| p.name == *name)
                .filter_map(|p| to_page(p.x0, p.y0, p.x1, p.y1))
                .collect();

            images.push(self.embedded_image(name, stream, boxes));
        }
        images
    }

    fn embedded_image(
        &self,
        name: &[u8],
        stream: &lopdf::Stream,
        placements: Vec<BoundingBox>,
    ) -> EmbeddedImage {
        let dict = &stream.dict;
        let int = |key: &[u8]| {
            dict.get(key)
                .ok()
                .and_then(|o| resolve(&self.doc, o))
                .and_then(|o| o.as_i64().ok())
        };

        let width = int(b"Width").unwrap_or(0).max(0) as u32;
        let height = int(b"Height").unwrap_or(0).max(0) as u32;
        let is_mask = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));
        let bits_per_component = if is_mask {
            1
        } else {
            int(b"BitsPerComponent").unwrap_or(8).clamp(0, 16) as u8
        };

        let color_space = if is_mask {
            ColorSpace::Other("ImageMask".to_string())
        } else {
            dict.get(b"ColorSpace")
                .ok()
                .map(|cs| self.color_space(cs))
                .unwrap_or_else(|| ColorSpace::Other("None".to_string()))
        };

        let filters: Vec<String> = match dict.get(b"Filter").ok().and_then(|f| resolve(&self.doc, f)) {
            Some(Object::Name(n)) => vec![String::from_utf8_lossy(n).to_string()],
            Some(Object::Array(arr)) => arr
                .iter()
                .filter_map(|o| o.as_name_str().ok())
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        };

        let data = match filters.last().map(String::as_str) {
            Some("DCTDecode") if filters.len() == 1 => ImageData::Jpeg(stream.content.clone()),
            Some(f @ ("JPXDecode" | "JBIG2Decode" | "CCITTFaxDecode" | "DCTDecode")) => {
                ImageData::Unsupported(f.to_string())
            }
            _ => match stream_data(stream) {
                Ok(bytes) => ImageData::Raw(bytes),
                Err(e) => ImageData::Unsupported(e.to_string()),
            },
        };

        EmbeddedImage {
            name: String::from_utf8_lossy(name).to_string(),
            payload_len: stream.content.len(),
            data,
            width,
            height,
            bits_per_component,
            color_space,
            placements,
        }
    }

    fn color_space(&self, obj: &Object) -> ColorSpace {
        let Some(obj) = resolve(&self.doc, obj) else {
            return ColorSpace::Other("Unresolved".to_string());
        };

        let (family, params) = match obj {
            Object::Name(n) => (String::from_utf8_lossy(n).to_string(), None),
            Object::Array(arr) => match arr.first().and_then(|o| o.as_name_str().ok()) {
                Some(family) => (family.to_string(), arr.get(1)),
                None => return ColorSpace::Other("Array".to_string()),
            },
            _ => return ColorSpace::Other("Unknown".to_string()),
        };

        match family.as_str() {
            "DeviceGray" | "G" => ColorSpace::DeviceGray,
            "CalGray" => ColorSpace::CalGray,
            "DeviceRGB" | "RGB" => ColorSpace::DeviceRgb,
            "CalRGB" => ColorSpace::CalRgb,
            "DeviceCMYK" | "CMYK" => ColorSpace::DeviceCmyk,
            "ICCBased" => {
                let n = params
                    .and_then(|p| resolve_dict(&self.doc, p))
                    .and_then(|d| d.get(b"N").ok())
                    .and_then(|n| n.as_i64().ok())
                    .unwrap_or(3);
                ColorSpace::IccBased(n.clamp(1, 4) as u8)
            }
            other => ColorSpace::Other(other.to_string()),
        }
    }

    /// Document outline entries that resolve to a page.
    pub fn outline_titles(&self) -> Vec<TextUnit> {
        let first = self
            .doc
            .catalog()
            .ok()
            .and_then(|c| c.get(b"Outlines").ok())
            .and_then(|o| resolve_dict(&self.doc, o))
            .and_then(|d| d.get(b"First").ok())
            .and_then(|f| f.as_reference().ok());

        let pages: BTreeMap<ObjectId, u32> = self
            .doc
            .get_pages()
            .into_iter()
            .map(|(num, id)| (id, num))
            .collect();

        let mut titles = Vec::new();
        let mut stack: Vec<ObjectId> = first.into_iter().collect();
        let mut seen = HashSet::new();

        while let Some(item_ref) = stack.pop() {
            if !seen.insert(item_ref) {
                continue;
            }
            let Ok(item) = self.doc.get_dictionary(item_ref) else {
                continue;
            };

            // Siblings after children keeps document order
            if let Ok(next) = item.get(b"Next").and_then(Object::as_reference) {
                stack.push(next);
            }
            if let Ok(child) = item.get(b"First").and_then(Object::as_reference) {
                stack.push(child);
            }

            let title = item
                .get(b"Title")
                .ok()
                .and_then(|t| resolve(&self.doc, t))
                .and_then(text_string)
                .map(|t| t.trim().to_string())
                .unwrap_or_default();
            if title.is_empty() {
                continue;
            }

            match self.outline_destination(item, &pages) {
                Some(page) => titles.push(TextUnit::title(page, title)),
                None => log::debug!("Outline entry {:?} has no page destination", title),
            }
        }

        titles
    }

    /// Page of an outline item's `Dest` or GoTo action.
    fn outline_destination(&self, item: &Dictionary, pages: &BTreeMap<ObjectId, u32>) -> Option<u32> {
        let dest = match item.get(b"Dest") {
            Ok(dest) => dest,
            Err(_) => resolve_dict(&self.doc, item.get(b"A").ok()?)?.get(b"D").ok()?,
        };

        let array = resolve(&self.doc, dest)?.as_array().ok()?;
        let page_ref = array.first()?.as_reference().ok()?;
        pages.get(&page_ref).copied()
    }
}

impl PageSource for LopdfBackend {
    fn page_numbers(&self) -> Vec<u32> {
        self.doc.get_pages().keys().copied().collect()
    }

    fn page(&self, number: u32) -> Result<PageContent> {
        let page_id = self.page_id(number)?;
        let frame = self.frame(page_id);
        let (width, height) = frame.size();

        let PageScan { spans, placements } = LayoutAnalyzer::new(&self.doc).scan_page(number)?;
        let to_page = |x0: f32, y0: f32, x1: f32, y1: f32| frame.to_page(x0, y0, x1, y1);

        let mut chars = Vec::new();
        for span in &spans {
            let count = span.text.chars().count();
            if count == 0 {
                continue;
            }
            let advance = span.width / count as f32;
            for (i, ch) in span.text.chars().enumerate() {
                let x0 = span.x + i as f32 * advance;
                if let Some(bbox) = to_page(x0, span.bottom(), x0 + advance, span.top()) {
                    chars.push(PageChar { ch, bbox });
                }
            }
        }

        let detector = TableDetector::new();
        let (detected, _) = detector.detect(spans);
        let tables = detected.iter().map(|t| detector.to_grid(t)).collect();
        let table_regions = detected
            .iter()
            .map(|t| t.bounds().and_then(|b| to_page(b.x0(), b.y0(), b.x1(), b.y1())))
            .collect();

        let images = self.page_images(page_id, &placements, to_page);

        log::debug!(
            "Page {}: {}x{}pt rotated {}, {} chars, {} tables, {} images",
            number,
            width,
            height,
            frame.rotation,
            chars.len(),
            detected.len(),
            images.len()
        );

        Ok(PageContent {
            number,
            width,
            height,
            chars,
            tables,
            table_regions,
            images,
        })
    }
}

impl TextSource for LopdfBackend {
    fn structured_units(&self) -> Result<Vec<TextUnit>> {
        let analyzer = LayoutAnalyzer::new(&self.doc);
        let detector = TableDetector::new();

        let mut units = Vec::new();
        for number in self.page_numbers() {
            for block in analyzer.extract_page_blocks(number, &detector)? {
                if !block.is_empty() {
                    units.push(TextUnit::body(number, block.text()));
                }
            }
        }

        units.extend(self.outline_titles());
        Ok(units)
    }

    fn plain_pages(&self) -> Result<Vec<String>> {
        Ok(pdf_extract::extract_text_by_pages(&self.path)?)
    }
}
