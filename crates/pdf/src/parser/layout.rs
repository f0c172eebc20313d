//! Text extraction into the raw page model consumed by the outline pipeline.
//!
//! Content-stream operators are interpreted by a small text-state machine
//! that emits one [`PlacedSpan`] per shown string. Spans are then grouped
//! into lines and blocks and converted to top-left page coordinates.
//!
//! # Pipeline
//!
//! ```text
//! content ops  ->  PlacedSpan[]  ->  lines  ->  RawBlock[]  ->  RawPage
//!   (per page)     extract_page_spans         build_page
//! ```

use outliner_core::{FontFamily, FontInfo, FontStyle, FontWeight, RawBlock, RawPage, RawSpan, Rect};
use unicode_normalization::UnicodeNormalization;

use super::backend::{
    decode_text_simple, font_flags, get_number_from_value, BackendFontInfo, PageId, PdfBackend,
    PdfValue,
};
use crate::PdfError;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A shown string positioned in PDF user space (origin bottom-left).
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedSpan {
    pub text: String,
    pub x: f32,
    pub baseline: f32,
    pub width: f32,
    /// Rendered font size, after the text and transformation matrices.
    pub size: f32,
    pub font: FontInfo,
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Spans whose baselines differ by at most this are on the same line.
const Y_TOLERANCE: f32 = 1.0;

/// Glyph advance, as a fraction of the font size, for fonts without a
/// `/Widths` array.
const APPROX_CHAR_WIDTH_RATIO: f32 = 0.5;

/// A `TJ` displacement wider than this fraction of the font size is a word
/// break.
const WORD_GAP_RATIO: f32 = 0.15;

/// Vertical gap, as a multiple of the previous line's font size, that
/// separates two blocks.
const BLOCK_GAP_FACTOR: f32 = 1.4;

/// Share of the font size above the baseline taken as the top of a span.
const ASCENT_RATIO: f32 = 0.8;

/// Name fragments of fixed-width faces.
const MONOSPACE_HINTS: &[&str] = &["courier", "mono", "consol", "typewriter", "cmtt"];

/// Name fragments of serif faces.
const SERIF_HINTS: &[&str] = &[
    "serif", "times", "roman", "georgia", "garamond", "palatino", "minion", "cambria", "baskerville",
    "bookman", "century", "caslon", "cmr", "cmbx", "cmti", "nimbusrom", "libertine", "charter",
];

/// Name fragments of bold weights.
const BOLD_HINTS: &[&str] = &["bold", "black", "heavy", "semibold", "demi", "cmbx"];

/// Name fragments of slanted styles.
const ITALIC_HINTS: &[&str] = &["italic", "oblique", "cmti", "cmsl"];

// ---------------------------------------------------------------------------
// Font classification
// ---------------------------------------------------------------------------

/// Drop a subset tag such as `ABCDEF+` from a base font name.
pub fn strip_subset_prefix(name: &str) -> &str {
    match name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.chars().all(|c| c.is_ascii_uppercase()) => rest,
        _ => name,
    }
}

/// Derive the rendering attributes of a font from its name and descriptor
/// flags. Size and colour are filled in when a span is emitted.
pub fn classify_font(info: Option<&BackendFontInfo>, fallback_name: &str) -> FontInfo {
    let raw_name = info
        .and_then(|f| f.base_font.as_deref())
        .unwrap_or(fallback_name);
    let name = strip_subset_prefix(raw_name).to_string();
    let lower = name.to_lowercase();
    let has_flag = |flag| info.is_some_and(|f| f.has_flag(flag));
    let hinted = |hints: &[&str]| hints.iter().any(|h| lower.contains(h));

    let family = if has_flag(font_flags::FIXED_PITCH) || hinted(MONOSPACE_HINTS) {
        FontFamily::Monospace
    } else if lower.contains("sans") {
        FontFamily::SansSerif
    } else if has_flag(font_flags::SERIF) || hinted(SERIF_HINTS) {
        FontFamily::Serif
    } else {
        FontFamily::SansSerif
    };

    let weight = if has_flag(font_flags::FORCE_BOLD) || hinted(BOLD_HINTS) {
        FontWeight::Bold
    } else {
        FontWeight::Normal
    };

    let style = if has_flag(font_flags::ITALIC) || hinted(ITALIC_HINTS) {
        FontStyle::Italic
    } else {
        FontStyle::Normal
    };

    FontInfo {
        name,
        family,
        weight,
        style,
        size: 0.0,
        color: 0,
    }
}

// ---------------------------------------------------------------------------
// Internal: matrices and colour
// ---------------------------------------------------------------------------

/// A 2x3 affine matrix `[a, b, c, d, e, f]`.
type Matrix = [f32; 6];

const IDENTITY_MATRIX: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `m1 × m2` in PDF's row-vector convention: apply `m1`, then `m2`.
fn multiply(m1: &Matrix, m2: &Matrix) -> Matrix {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

fn matrix_from(operands: &[PdfValue]) -> Option<Matrix> {
    let vals: Vec<f32> = operands
        .iter()
        .take(6)
        .filter_map(get_number_from_value)
        .collect();
    match vals.as_slice() {
        [a, b, c, d, e, f] => Some([*a, *b, *c, *d, *e, *f]),
        _ => None,
    }
}

fn channel(v: f32) -> u32 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u32
}

fn rgb(r: f32, g: f32, b: f32) -> u32 {
    (channel(r) << 16) | (channel(g) << 8) | channel(b)
}

/// Convert colour operands to 24-bit RGB, guessing the space from the number
/// of components (gray, RGB or CMYK).
fn color_from(operands: &[PdfValue]) -> Option<u32> {
    let vals: Vec<f32> = operands.iter().filter_map(get_number_from_value).collect();
    match vals.as_slice() {
        [g] => Some(rgb(*g, *g, *g)),
        [r, g, b] => Some(rgb(*r, *g, *b)),
        [c, m, y, k] => Some(rgb(
            (1.0 - c) * (1.0 - k),
            (1.0 - m) * (1.0 - k),
            (1.0 - y) * (1.0 - k),
        )),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Internal: PDF text-state machine
// ---------------------------------------------------------------------------

/// The part of the graphics state saved by `q` and restored by `Q`.
#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    /// Non-stroking colour as 24-bit RGB.
    fill_color: u32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY_MATRIX,
            fill_color: 0,
        }
    }
}

/// Mutable state tracked while walking a page's content stream.
#[derive(Debug, Clone)]
struct TextState {
    /// Current font resource name (the `/F1`-style key).
    font_key: Vec<u8>,
    /// Resource entry of the current font, if the page declares it.
    font: Option<BackendFontInfo>,
    /// Classified attributes of the current font.
    font_info: FontInfo,
    font_size: f32,
    text_matrix: Matrix,
    line_matrix: Matrix,
    /// Horizontal scaling factor (percent / 100).
    horiz_scale: f32,
    char_spacing: f32,
    word_spacing: f32,
    text_rise: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font_key: Vec::new(),
            font: None,
            font_info: FontInfo::default(),
            font_size: 0.0,
            text_matrix: IDENTITY_MATRIX,
            line_matrix: IDENTITY_MATRIX,
            horiz_scale: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            text_rise: 0.0,
            leading: 0.0,
        }
    }
}

impl TextState {
    /// Advance the text matrix horizontally by `dx` text-space units.
    fn advance_x(&mut self, dx: f32) {
        self.text_matrix[4] += dx * self.text_matrix[0];
        self.text_matrix[5] += dx * self.text_matrix[1];
    }

    /// Multiply the text line matrix by a translation (used by Td / TD / T*).
    fn translate_line(&mut self, tx: f32, ty: f32) {
        let m = self.line_matrix;
        self.line_matrix[4] = m[0] * tx + m[2] * ty + m[4];
        self.line_matrix[5] = m[1] * tx + m[3] * ty + m[5];
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.translate_line(0.0, -self.leading);
    }

    /// Horizontal displacement, in unscaled text space, of showing `bytes`.
    ///
    /// Simple fonts with a `/Widths` array use their glyph widths; everything
    /// else falls back to a fixed fraction of the font size per character.
    fn string_advance(&self, bytes: &[u8], text: &str) -> f32 {
        let simple = self
            .font
            .as_ref()
            .filter(|f| !f.widths.is_empty() && f.subtype.as_deref() != Some("Type0"));

        let mut tx = 0.0;
        match simple {
            Some(font) => {
                for &code in bytes {
                    let w0 = font
                        .glyph_width(code)
                        .map(|w| w / 1000.0)
                        .unwrap_or(APPROX_CHAR_WIDTH_RATIO);
                    tx += w0 * self.font_size + self.char_spacing;
                    if code == b' ' {
                        tx += self.word_spacing;
                    }
                }
            }
            None => {
                for ch in text.chars() {
                    tx += APPROX_CHAR_WIDTH_RATIO * self.font_size + self.char_spacing;
                    if ch == ' ' {
                        tx += self.word_spacing;
                    }
                }
            }
        }
        tx * self.horiz_scale
    }
}

/// Decode a string operand with the backend's font-aware decoder.
fn decode_string(
    bytes: &[u8],
    backend: &dyn PdfBackend,
    page_id: PageId,
    font_key: &[u8],
) -> String {
    let decoded = backend.decode_text(page_id, font_key, bytes);
    if decoded.is_empty() {
        decode_text_simple(bytes)
    } else {
        decoded
    }
}

/// Normalise extracted text: compatibility forms (ligatures, full-width
/// letters) are folded and control characters dropped.
pub fn normalize_text(text: &str) -> String {
    text.nfkc().filter(|c| !c.is_control()).collect()
}

// ---------------------------------------------------------------------------
// Public API: span extraction
// ---------------------------------------------------------------------------

/// Walk a single page's content stream and produce the shown strings in
/// stream order.
///
/// Handled operators:
///
/// | Operator                | Action |
/// |-------------------------|--------|
/// | `q` `Q` `cm`            | Save, restore, transform the graphics state |
/// | `g` `rg` `k` `sc` `scn` | Set the fill colour |
/// | `BT` `ET`               | Begin / end a text object |
/// | `Tf`                    | Set font and size |
/// | `Tm` `Td` `TD` `T*`     | Position text |
/// | `TL` `Tc` `Tw` `Tz` `Ts` | Text state parameters |
/// | `Tj` `TJ` `'` `"`       | Show text |
pub fn extract_page_spans(
    backend: &dyn PdfBackend,
    page_id: PageId,
) -> Result<Vec<PlacedSpan>, PdfError> {
    let raw_content = backend.page_content(page_id)?;
    let ops = backend.decode_content(&raw_content)?;
    let fonts = backend.page_fonts(page_id).unwrap_or_default();

    let mut gs = GraphicsState::default();
    let mut gs_stack: Vec<GraphicsState> = Vec::new();
    let mut state = TextState::default();
    let mut spans: Vec<PlacedSpan> = Vec::new();

    for op in &ops {
        let first_number = || op.operands.first().and_then(get_number_from_value);
        match op.operator.as_str() {
            // -- Graphics state -------------------------------------------
            "q" => gs_stack.push(gs.clone()),
            "Q" => {
                if let Some(saved) = gs_stack.pop() {
                    gs = saved;
                }
            }
            "cm" => {
                if let Some(m) = matrix_from(&op.operands) {
                    gs.ctm = multiply(&m, &gs.ctm);
                }
            }
            "g" | "rg" | "k" | "sc" | "scn" => {
                if let Some(color) = color_from(&op.operands) {
                    gs.fill_color = color;
                }
            }

            // -- Text objects ---------------------------------------------
            "BT" => {
                state.text_matrix = IDENTITY_MATRIX;
                state.line_matrix = IDENTITY_MATRIX;
            }
            "ET" => {}
            "Tf" => handle_tf(&op.operands, &fonts, &mut state),

            // -- Positioning ----------------------------------------------
            "Tm" => {
                if let Some(m) = matrix_from(&op.operands) {
                    state.text_matrix = m;
                    state.line_matrix = m;
                }
            }
            "Td" | "TD" => {
                if op.operands.len() >= 2 {
                    let tx = get_number_from_value(&op.operands[0]).unwrap_or(0.0);
                    let ty = get_number_from_value(&op.operands[1]).unwrap_or(0.0);
                    if op.operator == "TD" {
                        state.leading = -ty;
                    }
                    state.translate_line(tx, ty);
                }
            }
            "T*" => state.next_line(),

            // -- Text state parameters ------------------------------------
            "TL" => state.leading = first_number().unwrap_or(state.leading),
            "Tc" => state.char_spacing = first_number().unwrap_or(state.char_spacing),
            "Tw" => state.word_spacing = first_number().unwrap_or(state.word_spacing),
            "Tz" => {
                if let Some(v) = first_number() {
                    state.horiz_scale = v / 100.0;
                }
            }
            "Ts" => state.text_rise = first_number().unwrap_or(state.text_rise),

            // -- Showing text ---------------------------------------------
            "Tj" => {
                if let Some(first) = op.operands.first() {
                    show_strings(std::slice::from_ref(first), backend, page_id, &mut state, &gs, &mut spans);
                }
            }
            "TJ" => {
                if let Some(PdfValue::Array(arr)) = op.operands.first() {
                    show_strings(arr, backend, page_id, &mut state, &gs, &mut spans);
                }
            }
            "'" => {
                state.next_line();
                if let Some(first) = op.operands.first() {
                    show_strings(std::slice::from_ref(first), backend, page_id, &mut state, &gs, &mut spans);
                }
            }
            "\"" => {
                if op.operands.len() >= 3 {
                    if let Some(aw) = get_number_from_value(&op.operands[0]) {
                        state.word_spacing = aw;
                    }
                    if let Some(ac) = get_number_from_value(&op.operands[1]) {
                        state.char_spacing = ac;
                    }
                    state.next_line();
                    show_strings(&op.operands[2..3], backend, page_id, &mut state, &gs, &mut spans);
                }
            }

            _ => {}
        }
    }

    Ok(spans)
}

/// Handle the `Tf` (set font) operator.
fn handle_tf(operands: &[PdfValue], fonts: &[BackendFontInfo], state: &mut TextState) {
    if operands.len() < 2 {
        return;
    }
    let key = match &operands[0] {
        PdfValue::Name(n) => n.clone(),
        PdfValue::Str(s) => s.clone(),
        _ => return,
    };
    let font = fonts.iter().find(|info| info.name == key).cloned();
    state.font_info = classify_font(font.as_ref(), &String::from_utf8_lossy(&key));
    state.font = font;
    state.font_key = key;
    state.font_size = get_number_from_value(&operands[1]).unwrap_or(0.0);
}

/// Show a sequence of strings and kerning adjustments (a `TJ` array, or a
/// single string for the other show operators) as one span.
///
/// Adjustments are in thousandths of a text-space unit; a displacement wider
/// than [`WORD_GAP_RATIO`] of the font size inserts a space.
fn show_strings(
    elements: &[PdfValue],
    backend: &dyn PdfBackend,
    page_id: PageId,
    state: &mut TextState,
    gs: &GraphicsState,
    spans: &mut Vec<PlacedSpan>,
) {
    let start = state.text_matrix;
    let mut buf = String::new();
    let mut advance = 0.0;

    for elem in elements {
        match elem {
            PdfValue::Str(bytes) => {
                let fragment = decode_string(bytes, backend, page_id, &state.font_key);
                let dx = state.string_advance(bytes, &fragment);
                buf.push_str(&fragment);
                state.advance_x(dx);
                advance += dx;
            }
            val => {
                if let Some(adj) = get_number_from_value(val) {
                    let dx = -adj / 1000.0 * state.font_size * state.horiz_scale;
                    if dx > state.font_size * WORD_GAP_RATIO && !buf.is_empty() && !buf.ends_with(' ') {
                        buf.push(' ');
                    }
                    state.advance_x(dx);
                    advance += dx;
                }
            }
        }
    }

    let text = normalize_text(buf.trim());
    if text.is_empty() {
        return;
    }

    // Text rendering matrix at the start of the run.
    let trm = multiply(&start, &gs.ctm);
    let x = trm[2] * state.text_rise + trm[4];
    let baseline = trm[3] * state.text_rise + trm[5];
    let size = (state.font_size * (trm[2].powi(2) + trm[3].powi(2)).sqrt()).abs();
    let width = advance * (trm[0].powi(2) + trm[1].powi(2)).sqrt();

    spans.push(PlacedSpan {
        text,
        x,
        baseline,
        width,
        size,
        font: FontInfo {
            size: round_size(size),
            color: gs.fill_color,
            ..state.font_info.clone()
        },
    });
}

/// Sizes computed through matrices pick up float noise; two decimals are
/// enough to tell real sizes apart.
fn round_size(size: f32) -> f32 {
    (size * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Public API: lines and blocks
// ---------------------------------------------------------------------------

struct Line {
    baseline: f32,
    size: f32,
    x0: f32,
    x1: f32,
    spans: Vec<RawSpan>,
}

/// Convert a span to top-left page coordinates.
fn to_raw_span(span: PlacedSpan, page_height: f32) -> RawSpan {
    let top = page_height - span.baseline - ASCENT_RATIO * span.size;
    RawSpan {
        bbox: Rect::new(span.x, top, span.width, span.size),
        font: span.font,
        text: span.text,
    }
}

/// Group a page's spans into lines (same baseline, in stream order) and the
/// lines into blocks.
///
/// A new block starts when the gap to the previous line exceeds
/// [`BLOCK_GAP_FACTOR`] times its font size, when the text jumps back up the
/// page by more than a line, or when the new line does not overlap the
/// block horizontally.
pub fn build_page(spans: Vec<PlacedSpan>, width: f32, height: f32) -> RawPage {
    let mut lines: Vec<Line> = Vec::new();
    for span in spans {
        let (baseline, size, x0, x1) = (span.baseline, span.size, span.x, span.x + span.width);
        match lines.last_mut() {
            Some(line) if (line.baseline - baseline).abs() <= Y_TOLERANCE => {
                line.size = line.size.max(size);
                line.x0 = line.x0.min(x0);
                line.x1 = line.x1.max(x1);
                line.spans.push(to_raw_span(span, height));
            }
            _ => lines.push(Line {
                baseline,
                size,
                x0,
                x1,
                spans: vec![to_raw_span(span, height)],
            }),
        }
    }

    let mut blocks: Vec<RawBlock> = Vec::new();
    let mut prev: Option<(f32, f32)> = None;
    for line in lines {
        let starts_block = match (prev, blocks.last()) {
            (Some((prev_baseline, prev_size)), Some(block)) => {
                let gap = prev_baseline - line.baseline;
                gap > BLOCK_GAP_FACTOR * prev_size
                    || -gap > prev_size
                    || line.x1 < block.bbox.x
                    || line.x0 > block.bbox.right()
            }
            _ => true,
        };
        prev = Some((line.baseline, line.size));

        let line_bbox = line
            .spans
            .iter()
            .map(|s| s.bbox)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default();
        match blocks.last_mut() {
            Some(block) if !starts_block => {
                block.bbox = block.bbox.union(&line_bbox);
                block.spans.extend(line.spans);
            }
            _ => blocks.push(RawBlock {
                bbox: line_bbox,
                spans: line.spans,
            }),
        }
    }

    RawPage {
        width,
        height,
        blocks,
    }
}

// ---------------------------------------------------------------------------
// Public API: multi-page extraction
// ---------------------------------------------------------------------------

/// Extract every page of the document, in page order.
pub fn extract_pages(backend: &dyn PdfBackend) -> Result<Vec<RawPage>, PdfError> {
    let page_map = backend.pages();
    let mut pages = Vec::with_capacity(page_map.len());

    for (&page_num, &page_id) in &page_map {
        let (width, height) = backend.page_dimensions(page_id)?;
        let spans = extract_page_spans(backend, page_id)?;
        let page = build_page(spans, width, height);
        log::debug!(
            "page {}: {} spans in {} blocks",
            page_num,
            page.blocks.iter().map(|b| b.spans.len()).sum::<usize>(),
            page.blocks.len()
        );
        pages.push(page);
    }

    Ok(pages)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
