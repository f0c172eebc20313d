//! Core library for pdfoutliner
//!
//! This crate implements the **Functional Core** of pdfoutliner: it rebuilds
//! a document's table of contents from nothing but the visual layout of its
//! text (font, size, colour, position and page).
//!
//! # Architecture Overview
//!
//! The workspace follows the Functional Core - Imperative Shell pattern:
//!
//! - **`outliner_core`** (this crate): the heading-detection pipeline and the
//!   plain-text outline format, with zero I/O
//! - **`outliner_pdf`**: text extraction from PDF files and native outline
//!   read/write
//! - **`pdfoutliner`**: the command-line shell tying both together
//!
//! ## Pipeline
//!
//! [`find_outline`] runs these stages once per document, in order:
//!
//! 1. [`style::index_styles`]: merge same-style spans per block, bucket spans
//!    by style signature
//! 2. [`column::detect_columns`]: find the dominant text columns
//! 3. [`filter::pre_filter`]: drop spans outside the main content box
//! 4. [`align::align_groups`]: keep style groups aligned to a column
//! 5. [`filter::filter_groups`]: drop groups that cannot be headings
//! 6. [`restructure::restructure`]: join multi-line headings, split inline
//!    and all-caps variants
//! 7. [`filter::post_filter`]: drop spans that do not open their block
//! 8. [`builder::build_outline`]: reading order and levels
//!
//! Every stage receives the same [`Params`] by reference.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use outliner_core::{find_outline, outline_to_string, Params};
//!
//! // Pages as delivered by an extraction layer (no PDF required)
//! let pages = fixture_pages();
//!
//! let outline = find_outline(pages, &Params::default())?;
//! println!("{}", outline_to_string(&outline));
//! ```

pub mod align;
pub mod builder;
pub mod column;
pub mod filter;
pub mod params;
pub mod restructure;
pub mod style;
pub mod text;
pub mod types;
pub mod util;

use thiserror::Error;

pub use params::{Params, ParamsError};
pub use text::{outline_to_string, parse_outline, ParseError};
pub use types::{
    FontFamily, FontInfo, FontStyle, FontWeight, OutlineItem, RawBlock, RawPage, RawSpan, Rect,
};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum OutlineError {
    #[error("Document has no text")]
    EmptyDocument,

    #[error("No text column found (no block with at least 5 lines)")]
    NoColumns,
}

/// Reconstruct the outline of a document from its extracted pages.
///
/// An outline with no items is a valid result; it means every style group was
/// ruled out as a heading.
pub fn find_outline(
    pages: Vec<RawPage>,
    params: &Params,
) -> Result<Vec<OutlineItem>, OutlineError> {
    let has_text = pages
        .iter()
        .flat_map(|p| &p.blocks)
        .any(|b| !b.spans.is_empty());
    if !has_text {
        return Err(OutlineError::EmptyDocument);
    }

    let (pages, mut groups) = style::index_styles(pages, params);
    let columns = column::detect_columns(&pages, params)?;

    filter::pre_filter(&mut groups, &columns, params);
    let (mut groups, scores) = align::align_groups(groups, &columns, params);
    filter::filter_groups(&mut groups, &scores, params);
    restructure::restructure(&mut groups, &pages, params);
    filter::post_filter(&mut groups, &pages, &scores, params);

    Ok(builder::build_outline(groups, params))
}
