//! Content block types.

use serde::ser::{Serialize, Serializer};

use super::{QualityMetrics, TableGrid};
use crate::geometry::BoundingBox;

/// Kind of a block, serialized as the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Paragraph,
    Heading,
    Section,
    Table,
    Image,
}

/// Backend or strategy that produced a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    /// Structured layout parser text unit
    Structured,
    /// Document outline entry
    Outline,
    /// Plain per-page text fallback
    Fallback,
    /// Detected and rendered table region
    Table,
    /// Embedded image object
    Direct,
    /// Crop of a rendered page
    Rendered,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Structured => "structured",
            ExtractionMethod::Outline => "outline",
            ExtractionMethod::Fallback => "fallback",
            ExtractionMethod::Table => "table",
            ExtractionMethod::Direct => "direct",
            ExtractionMethod::Rendered => "rendered",
        }
    }
}

/// Metadata shared by every block variant.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockMetadata {
    /// 1-indexed page number
    pub page: u32,
    /// File name of the source document
    pub source_file: String,
    pub extraction_method: ExtractionMethod,
}

/// A promoted table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableBlock {
    pub grid: TableGrid,
    pub bbox: Option<BoundingBox>,
    /// Asset file name of the region render
    pub rendered_image_ref: Option<String>,
    /// Rendered raster width in pixels
    pub width: u32,
    /// Rendered raster height in pixels
    pub height: u32,
}

/// A promoted image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBlock {
    /// Asset file name of the pixels
    pub pixel_ref: String,
    pub bbox: Option<BoundingBox>,
    pub metrics: QualityMetrics,
}

/// Variant payload of a [`Block`].
#[derive(Debug, Clone, PartialEq)]
pub enum BlockContent {
    Paragraph { content: String },
    Heading { content: String },
    Section { title: String },
    Table(TableBlock),
    Image(ImageBlock),
}

/// One typed unit of extracted content. Blocks are never mutated after
/// promotion.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub content: BlockContent,
    pub metadata: BlockMetadata,
}

impl Block {
    pub fn new(content: BlockContent, metadata: BlockMetadata) -> Self {
        Self { content, metadata }
    }

    pub fn block_type(&self) -> BlockType {
        match self.content {
            BlockContent::Paragraph { .. } => BlockType::Paragraph,
            BlockContent::Heading { .. } => BlockType::Heading,
            BlockContent::Section { .. } => BlockType::Section,
            BlockContent::Table(_) => BlockType::Table,
            BlockContent::Image(_) => BlockType::Image,
        }
    }

    pub fn page(&self) -> u32 {
        self.metadata.page
    }

    /// Text form of the block: body text, section title, flattened grid or
    /// image asset name.
    pub fn text(&self) -> String {
        match &self.content {
            BlockContent::Paragraph { content } | BlockContent::Heading { content } => {
                content.clone()
            }
            BlockContent::Section { title } => title.clone(),
            BlockContent::Table(table) => table.grid.plain_text(),
            BlockContent::Image(image) => image.pixel_ref.clone(),
        }
    }

    /// Asset file written for this block, if any.
    pub fn asset(&self) -> Option<&str> {
        match &self.content {
            BlockContent::Table(table) => table.rendered_image_ref.as_deref(),
            BlockContent::Image(image) => Some(image.pixel_ref.as_str()),
            _ => None,
        }
    }
}

/// Flat serialization record matching the published block shape.
#[derive(serde::Serialize)]
struct BlockRecord<'a> {
    #[serde(rename = "type")]
    block_type: BlockType,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<&'a str>,
    metadata: MetadataRecord<'a>,
}

#[derive(serde::Serialize)]
struct MetadataRecord<'a> {
    page: u32,
    source_file: &'a str,
    extraction_method: ExtractionMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    bbox: Option<BoundingBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    columns: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    brightness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unique_colors: Option<usize>,
}

impl Serialize for Block {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut metadata = MetadataRecord {
            page: self.metadata.page,
            source_file: &self.metadata.source_file,
            extraction_method: self.metadata.extraction_method,
            bbox: None,
            width: None,
            height: None,
            rows: None,
            columns: None,
            brightness: None,
            unique_colors: None,
        };

        match &self.content {
            BlockContent::Table(table) => {
                metadata.bbox = table.bbox;
                metadata.width = Some(table.width);
                metadata.height = Some(table.height);
                metadata.rows = Some(table.grid.row_count());
                metadata.columns = Some(table.grid.column_count());
            }
            BlockContent::Image(image) => {
                metadata.bbox = image.bbox;
                metadata.width = Some(image.metrics.width);
                metadata.height = Some(image.metrics.height);
                metadata.brightness = Some(image.metrics.brightness);
                metadata.unique_colors = Some(image.metrics.unique_colors);
            }
            _ => {}
        }

        BlockRecord {
            block_type: self.block_type(),
            content: self.text(),
            path: self.asset(),
            metadata,
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(page: u32, method: ExtractionMethod) -> BlockMetadata {
        BlockMetadata {
            page,
            source_file: "guide.pdf".to_string(),
            extraction_method: method,
        }
    }

    #[test]
    fn test_block_type_and_text() {
        let block = Block::new(
            BlockContent::Section {
                title: "부록 A".to_string(),
            },
            meta(2, ExtractionMethod::Outline),
        );
        assert_eq!(block.block_type(), BlockType::Section);
        assert_eq!(block.text(), "부록 A");
        assert_eq!(block.page(), 2);
        assert!(block.asset().is_none());
    }

    #[test]
    fn test_paragraph_json_shape() {
        let block = Block::new(
            BlockContent::Paragraph {
                content: "Body text".to_string(),
            },
            meta(1, ExtractionMethod::Structured),
        );
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "paragraph");
        assert_eq!(value["content"], "Body text");
        assert_eq!(value["metadata"]["page"], 1);
        assert_eq!(value["metadata"]["source_file"], "guide.pdf");
        assert_eq!(value["metadata"]["extraction_method"], "structured");
        assert!(value["metadata"].get("bbox").is_none());
        assert!(value.get("path").is_none());
    }

    #[test]
    fn test_table_json_shape() {
        let block = Block::new(
            BlockContent::Table(TableBlock {
                grid: TableGrid::from_strs(&[&["A", "B"], &["1", "2"], &["3", "4"]]),
                bbox: BoundingBox::new(10.0, 20.0, 310.0, 80.0),
                rendered_image_ref: Some("table_page1_0.png".to_string()),
                width: 625,
                height: 125,
            }),
            meta(1, ExtractionMethod::Table),
        );
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "table");
        assert_eq!(value["content"], "A | B\n1 | 2\n3 | 4");
        assert_eq!(value["path"], "table_page1_0.png");
        assert_eq!(value["metadata"]["rows"], 3);
        assert_eq!(value["metadata"]["columns"], 2);
        assert_eq!(value["metadata"]["width"], 625);
        assert_eq!(
            value["metadata"]["bbox"],
            serde_json::json!([10.0, 20.0, 310.0, 80.0])
        );
        assert!(value["metadata"].get("brightness").is_none());
    }

    #[test]
    fn test_image_json_shape() {
        let block = Block::new(
            BlockContent::Image(ImageBlock {
                pixel_ref: "rendered_page2_0.png".to_string(),
                bbox: None,
                metrics: QualityMetrics {
                    brightness: 150.0,
                    unique_colors: 20,
                    width: 400,
                    height: 300,
                },
            }),
            meta(2, ExtractionMethod::Rendered),
        );
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "image");
        assert_eq!(value["content"], "rendered_page2_0.png");
        assert_eq!(value["metadata"]["brightness"], 150.0);
        assert_eq!(value["metadata"]["unique_colors"], 20);
        assert_eq!(value["metadata"]["extraction_method"], "rendered");
        assert!(value["metadata"].get("rows").is_none());
    }
}
