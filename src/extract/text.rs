//! Text block extraction and classification.
//!
//! The structured layout parser is tried first. If it fails for any page
//! the whole stage is re-run from plain per-page text, split on blank lines.

use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::error::Result;
use crate::model::{Block, BlockContent, BlockMetadata, BlockType, ExtractionMethod};
use crate::parser::{ExtractOptions, TextSource, UnitKind};

/// Structured units must be longer than this many characters.
pub const MIN_STRUCTURED_LEN: usize = 10;

/// Fallback fragments must be longer than this many characters.
pub const MIN_FALLBACK_LEN: usize = 20;

const HEADING_MAX_LEN: usize = 100;
const SECTION_MAX_LEN: usize = 200;

const HEADING_KEYWORDS: &[&str] = &["챕터", "chapter", "목차", "제", "부"];
const SECTION_KEYWORDS: &[&str] = &["그림", "figure", "표", "table", "부록", "appendix"];

/// Classify a text fragment as heading, section or paragraph.
///
/// Short text that is all caps, carries a chapter keyword or ends with a
/// colon is a heading. Short text naming a figure, table or appendix is a
/// section. Remaining single-line text under the heading limit is a heading;
/// everything else is a paragraph.
pub fn classify(text: &str) -> BlockType {
    let text = text.trim();
    let len = text.chars().count();
    let lower = text.to_lowercase();

    if len < HEADING_MAX_LEN
        && (is_all_uppercase(text)
            || HEADING_KEYWORDS.iter().any(|k| lower.contains(k))
            || text.ends_with(':'))
    {
        return BlockType::Heading;
    }

    if len < SECTION_MAX_LEN && SECTION_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return BlockType::Section;
    }

    if len < HEADING_MAX_LEN && !text.contains('\n') {
        return BlockType::Heading;
    }

    BlockType::Paragraph
}

/// True when the text has cased letters and none of them is lowercase.
fn is_all_uppercase(text: &str) -> bool {
    let mut has_cased = false;
    for c in text.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            has_cased = true;
        }
    }
    has_cased
}

/// Split page text on blank lines into trimmed, non-empty fragments.
pub fn split_fragments(page_text: &str) -> Vec<String> {
    static BLANK_LINE: OnceLock<Regex> = OnceLock::new();
    let blank_line = BLANK_LINE.get_or_init(|| Regex::new(r"\n\s*\n").expect("valid regex"));

    blank_line
        .split(page_text)
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .map(String::from)
        .collect()
}

/// NFC-normalize and trim.
fn normalize(text: &str) -> String {
    text.nfc().collect::<String>().trim().to_string()
}

fn text_block(text: String, page: u32, source_file: &str, method: ExtractionMethod) -> Block {
    let content = match classify(&text) {
        BlockType::Heading => BlockContent::Heading { content: text },
        BlockType::Section => BlockContent::Section { title: text },
        _ => BlockContent::Paragraph { content: text },
    };
    Block::new(
        content,
        BlockMetadata {
            page,
            source_file: source_file.to_string(),
            extraction_method: method,
        },
    )
}

/// Extract paragraph, heading and section blocks for the selected pages.
///
/// A failing structured parser triggers the plain-text fallback; a failing
/// fallback is returned as an error.
pub fn extract_text_blocks<S: TextSource + ?Sized>(
    source: &S,
    source_file: &str,
    options: &ExtractOptions,
) -> Result<Vec<Block>> {
    match source.structured_units() {
        Ok(units) => {
            let mut blocks = Vec::new();
            for unit in units {
                if !options.pages.includes(unit.page) {
                    continue;
                }
                let text = normalize(&unit.text);
                match unit.kind {
                    UnitKind::Body if text.chars().count() > MIN_STRUCTURED_LEN => {
                        blocks.push(text_block(
                            text,
                            unit.page,
                            source_file,
                            ExtractionMethod::Structured,
                        ));
                    }
                    UnitKind::Title if options.include_outline_sections && !text.is_empty() => {
                        blocks.push(Block::new(
                            BlockContent::Section { title: text },
                            BlockMetadata {
                                page: unit.page,
                                source_file: source_file.to_string(),
                                extraction_method: ExtractionMethod::Outline,
                            },
                        ));
                    }
                    _ => {}
                }
            }
            log::info!("Structured parser produced {} text blocks", blocks.len());
            Ok(blocks)
        }
        Err(e) => {
            log::warn!("Structured text extraction failed, using plain text: {}", e);
            fallback_blocks(source, source_file, options)
        }
    }
}

fn fallback_blocks<S: TextSource + ?Sized>(
    source: &S,
    source_file: &str,
    options: &ExtractOptions,
) -> Result<Vec<Block>> {
    let pages = source.plain_pages()?;

    let mut blocks = Vec::new();
    for (idx, page_text) in pages.iter().enumerate() {
        let page = idx as u32 + 1;
        if !options.pages.includes(page) {
            continue;
        }
        for fragment in split_fragments(page_text) {
            let text = normalize(&fragment);
            if text.chars().count() > MIN_FALLBACK_LEN {
                blocks.push(text_block(text, page, source_file, ExtractionMethod::Fallback));
            }
        }
    }

    log::info!("Plain text fallback produced {} text blocks", blocks.len());
    Ok(blocks)
}
