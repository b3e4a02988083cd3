//! JSON rendering for block lists.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{Block, ExtractionSummary};

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

fn serialize<T: Serialize + ?Sized>(value: &T, format: JsonFormat) -> Result<String> {
    let result = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(value),
        JsonFormat::Compact => serde_json::to_string(value),
    };

    result.map_err(|e| Error::Render(format!("JSON serialization error: {}", e)))
}

/// Convert a block list to a JSON array.
pub fn to_json(blocks: &[Block], format: JsonFormat) -> Result<String> {
    serialize(blocks, format)
}

/// Convert run statistics to JSON.
pub fn summary_to_json(summary: &ExtractionSummary, format: JsonFormat) -> Result<String> {
    serialize(summary, format)
}
