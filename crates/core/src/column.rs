//! Column detection from the bounding boxes of body-like blocks.

use indexmap::IndexMap;

use crate::params::Params;
use crate::types::{Column, Page, Rect};
use crate::util::{round_half_up, round_to_bin};
use crate::OutlineError;

/// Only blocks with at least this many lines vote on the column layout.
const MIN_COLUMN_LINES: usize = 5;

/// Find the dominant text columns, sorted by left bin.
///
/// Blocks are quantised by their left edge and horizontal midpoint. The
/// largest bin pair is always kept; following pairs are kept while their area
/// exceeds `ALIGN_DECAY_RATE` times the previous one.
pub fn detect_columns(pages: &[Page], params: &Params) -> Result<Vec<Column>, OutlineError> {
    let bin = params.tol_bin_size;
    let mut candidates: IndexMap<(u32, u32), Column> = IndexMap::new();

    for block in pages.iter().flat_map(|p| &p.blocks) {
        if block.n_lines < MIN_COLUMN_LINES {
            continue;
        }
        let b = block.bbox;
        let left_bin = round_to_bin(b.x, bin);
        let mid_bin = round_to_bin(round_half_up(b.x + b.w / 2.0), bin);

        candidates
            .entry((left_bin.to_bits(), mid_bin.to_bits()))
            .and_modify(|col| absorb(col, &b))
            .or_insert_with(|| Column {
                left_bin,
                mid_bin,
                x0: b.x,
                y0: b.y,
                x1: b.right(),
                y1: b.bottom(),
                area: b.w * b.h,
            });
    }

    if candidates.is_empty() {
        return Err(OutlineError::NoColumns);
    }

    let mut ranked: Vec<Column> = candidates.into_values().collect();
    ranked.sort_by(|a, b| b.area.total_cmp(&a.area));

    let mut columns = select_columns(ranked, params.align_decay_rate);
    columns.sort_by(|a, b| a.left_bin.total_cmp(&b.left_bin));

    log::info!(
        "{} aligned columns {}",
        columns.len(),
        columns
            .iter()
            .map(Column::to_string)
            .collect::<Vec<_>>()
            .join(",")
    );
    Ok(columns)
}

/// Keep the leading columns of an area-ranked list while each one's area is
/// strictly greater than `decay_rate` times its predecessor's.
pub fn select_columns(ranked: Vec<Column>, decay_rate: f32) -> Vec<Column> {
    let mut selected: Vec<Column> = Vec::new();
    for col in ranked {
        if let Some(prev) = selected.last() {
            if col.area <= decay_rate * prev.area {
                break;
            }
        }
        selected.push(col);
    }
    selected
}

fn absorb(col: &mut Column, b: &Rect) {
    col.x0 = col.x0.min(b.x);
    col.y0 = col.y0.min(b.y);
    col.x1 = col.x1.max(b.right());
    col.y1 = col.y1.max(b.bottom());
    col.area += b.w * b.h;
}
