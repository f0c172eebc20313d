use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Axis-aligned box in page space (origin top-left, y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Rect { x, y, w, h }
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    /// Smallest box covering both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect {
            x,
            y,
            w: self.right().max(other.right()) - x,
            h: self.bottom().max(other.bottom()) - y,
        }
    }
}

// ---------------------------------------------------------------------------
// Fonts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FontFamily {
    #[default]
    Serif,
    SansSerif,
    Monospace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

/// Rendering attributes shared by every character of a span.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FontInfo {
    pub name: String,
    pub family: FontFamily,
    pub weight: FontWeight,
    pub style: FontStyle,
    pub size: f32,
    /// 24-bit RGB fill colour.
    pub color: u32,
}

// ---------------------------------------------------------------------------
// Input model (as delivered by the extraction layer)
// ---------------------------------------------------------------------------

/// A run of text with identical rendering attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSpan {
    pub bbox: Rect,
    pub font: FontInfo,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBlock {
    pub bbox: Rect,
    pub spans: Vec<RawSpan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPage {
    pub width: f32,
    pub height: f32,
    pub blocks: Vec<RawBlock>,
}

// ---------------------------------------------------------------------------
// Working model
// ---------------------------------------------------------------------------

/// A span after intra-block merging, annotated with its position in the
/// document and its style signature.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    /// Font size of the span, kept alongside the signature for filtering.
    pub size: f32,
    /// Style signature of the span's font. Never carries a split suffix.
    pub style: String,
    pub page: usize,
    pub block: usize,
    pub index: usize,
    /// Nearest detected column, assigned during alignment.
    pub column: usize,
}

impl Span {
    /// `(page, block, index)` triple identifying the span in the document.
    pub fn key(&self) -> (usize, usize, usize) {
        (self.page, self.block, self.index)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub bbox: Rect,
    pub spans: Vec<Span>,
    /// Style covering the largest rendered area; `None` for empty blocks.
    pub main_style: Option<String>,
    /// Number of distinct baselines among the merged spans.
    pub n_lines: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub width: f32,
    pub height: f32,
    pub blocks: Vec<Block>,
}

impl Page {
    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }
}

/// Look up the block a span belongs to.
pub fn block_of<'a>(pages: &'a [Page], span: &Span) -> Option<&'a Block> {
    pages.get(span.page).and_then(|page| page.block(span.block))
}

/// Style signature (or split-derived key) to the spans sharing it.
pub type StyleGroups = IndexMap<String, Vec<Span>>;

/// Alignment score (best aligned ratio) per style group.
pub type AlignmentScores = IndexMap<String, f32>;

/// A vertical alignment band shared by body-text blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub left_bin: f32,
    pub mid_bin: f32,
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    /// Total area of the blocks that voted for this column.
    pub area: f32,
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(l={},m={})", self.left_bin, self.mid_bin)
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// One entry of the reconstructed table of contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineItem {
    pub level: usize,
    pub text: String,
    /// 1-based page number.
    pub page: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
}

impl OutlineItem {
    pub fn new(level: usize, text: impl Into<String>, page: usize) -> Self {
        OutlineItem {
            level,
            text: text.into(),
            page,
            x: None,
            y: None,
        }
    }

    pub fn at(mut self, x: Option<f32>, y: Option<f32>) -> Self {
        self.x = x;
        self.y = y;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_union() {
        let a = Rect::new(10.0, 10.0, 20.0, 5.0);
        let b = Rect::new(5.0, 12.0, 10.0, 10.0);
        let u = a.union(&b);
        assert_eq!(u, Rect::new(5.0, 10.0, 25.0, 12.0));
    }

    #[test]
    fn test_column_display() {
        let col = Column {
            left_bin: 72.0,
            mid_bin: 306.0,
            x0: 72.0,
            y0: 0.0,
            x1: 540.0,
            y1: 700.0,
            area: 1.0,
        };
        assert_eq!(col.to_string(), "(l=72,m=306)");
    }

    #[test]
    fn test_outline_item_json_skips_missing_coordinates() {
        let item = OutlineItem::new(1, "Intro", 3);
        let json = serde_json::to_string(&item).unwrap();
        assert_eq!(json, r#"{"level":1,"text":"Intro","page":3}"#);
    }

    #[test]
    fn test_font_family_serde_names() {
        let json = serde_json::to_string(&FontFamily::SansSerif).unwrap();
        assert_eq!(json, r#""sans-serif""#);
    }
}
