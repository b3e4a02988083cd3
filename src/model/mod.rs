//! Block model types.
//!
//! Candidates are created per page during extraction, filtered and scored,
//! then either promoted to a [`Block`] or discarded.

mod block;
mod candidate;
mod summary;
mod table;

pub use block::{
    Block, BlockContent, BlockMetadata, BlockType, ExtractionMethod, ImageBlock, TableBlock,
};
pub use candidate::{ImageCandidate, QualityMetrics, SourceStrategy, TableCandidate};
pub use summary::ExtractionSummary;
pub use table::{TableGrid, CELL_SEPARATOR};
