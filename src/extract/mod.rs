//! Extraction stages.
//!
//! Text, table and image candidates are produced per page, filtered and
//! deduplicated, then promoted to blocks by the assembler.

mod assemble;
mod dedup;
mod image;
mod table;
mod text;

pub use assemble::{assemble, clear_assets, run, Extraction};
pub use dedup::deduplicate;
pub use self::image::{
    boost_calgray, decode_embedded, direct_candidate, direct_candidates, extract_page_images,
    is_logo_or_header, reconcile, rendered_candidate, rendered_candidates, save_image,
    DecodedImage,
};
pub use table::{estimate_bbox, extract_page_tables, table_candidate};
pub use text::{classify, extract_text_blocks, split_fragments, MIN_FALLBACK_LEN, MIN_STRUCTURED_LEN};
