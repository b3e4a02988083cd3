//! Rendering of extraction results to output formats.

mod json;

pub use json::{summary_to_json, to_json, JsonFormat};
