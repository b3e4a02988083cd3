//! Run statistics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Block, BlockType};
use crate::error::SkipReason;

/// Counts collected during an extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionSummary {
    /// Total number of blocks emitted
    pub total: usize,

    /// Number of paragraph blocks
    pub paragraphs: usize,

    /// Number of heading blocks
    pub headings: usize,

    /// Number of section blocks
    pub sections: usize,

    /// Number of table blocks
    pub tables: usize,

    /// Number of image blocks
    pub images: usize,

    /// Table candidates discarded as overlapping duplicates
    pub duplicates_removed: usize,

    /// Image candidates set aside by page-level strategy reconciliation
    pub superseded_images: usize,

    /// Dropped candidates per skip reason label
    pub skipped: BTreeMap<String, usize>,
}

impl ExtractionSummary {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an emitted block.
    pub fn record(&mut self, block: &Block) {
        self.total += 1;
        match block.block_type() {
            BlockType::Paragraph => self.paragraphs += 1,
            BlockType::Heading => self.headings += 1,
            BlockType::Section => self.sections += 1,
            BlockType::Table => self.tables += 1,
            BlockType::Image => self.images += 1,
        }
    }

    /// Count a dropped candidate.
    pub fn record_skip(&mut self, reason: &SkipReason) {
        *self.skipped.entry(reason.label().to_string()).or_insert(0) += 1;
    }

    /// Total dropped candidates across all reasons.
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    /// Number of text blocks (paragraphs, headings, sections).
    pub fn text_blocks(&self) -> usize {
        self.paragraphs + self.headings + self.sections
    }

    /// Count of a given block type.
    pub fn count(&self, block_type: BlockType) -> usize {
        match block_type {
            BlockType::Paragraph => self.paragraphs,
            BlockType::Heading => self.headings,
            BlockType::Section => self.sections,
            BlockType::Table => self.tables,
            BlockType::Image => self.images,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlockContent, BlockMetadata, ExtractionMethod};

    fn heading(page: u32) -> Block {
        Block::new(
            BlockContent::Heading {
                content: "Overview".to_string(),
            },
            BlockMetadata {
                page,
                source_file: "a.pdf".to_string(),
                extraction_method: ExtractionMethod::Structured,
            },
        )
    }

    #[test]
    fn test_record_blocks() {
        let mut summary = ExtractionSummary::new();
        summary.record(&heading(1));
        summary.record(&heading(2));
        assert_eq!(summary.total, 2);
        assert_eq!(summary.headings, 2);
        assert_eq!(summary.count(BlockType::Heading), 2);
        assert_eq!(summary.text_blocks(), 2);
        assert_eq!(summary.tables, 0);
    }

    #[test]
    fn test_record_skips() {
        let mut summary = ExtractionSummary::new();
        summary.record_skip(&SkipReason::NoBoundingBox);
        summary.record_skip(&SkipReason::PayloadTooSmall(10));
        summary.record_skip(&SkipReason::PayloadTooSmall(20));
        assert_eq!(summary.skipped["payload_too_small"], 2);
        assert_eq!(summary.skipped["no_bounding_box"], 1);
        assert_eq!(summary.skipped_total(), 3);
    }
}
