//! Reshaping of the surviving heading groups: multi-line headings are joined,
//! inline headings and all-caps variants are split into groups of their own.

use std::collections::HashSet;

use crate::params::Params;
use crate::types::{block_of, Page, Span, StyleGroups};

/// Suffix of the group key holding run-in headings split off a style.
pub const INLINE_SUFFIX: &str = "_inline";
/// Suffix of the group key holding the all-caps members of a style.
pub const ALL_CAPS_SUFFIX: &str = "_allCap";

/// Shortest text considered for all-caps splitting; shorter runs are usually
/// abbreviations.
const MIN_ALL_CAPS_CHARS: usize = 5;

/// Run the three restructuring passes in order.
pub fn restructure(groups: &mut StyleGroups, pages: &[Page], params: &Params) {
    for (style, spans) in groups.iter_mut() {
        let taken = std::mem::take(spans);
        *spans = join_lines(style, taken, pages);
    }
    split_inline(groups, pages, params);
    split_all_caps(groups, params);
}

// ---------------------------------------------------------------------------
// Line joining
// ---------------------------------------------------------------------------

/// Fold the spans following each heading in its block into it, for as long as
/// they carry the group's style. Spans absorbed this way are removed from the
/// group.
pub fn join_lines(style: &str, spans: Vec<Span>, pages: &[Page]) -> Vec<Span> {
    let mut consumed: HashSet<(usize, usize, usize)> = HashSet::new();
    let mut joined = Vec::with_capacity(spans.len());

    for mut span in spans {
        if consumed.contains(&span.key()) {
            continue;
        }
        if let Some(block) = block_of(pages, &span) {
            for next in block.spans.iter().skip(span.index + 1) {
                if next.style != style {
                    break;
                }
                span.text.push(' ');
                span.text.push_str(&next.text);
                span.w = span.w.max(next.w);
                span.h = next.y - span.y + next.h;
                consumed.insert(next.key());
            }
        }
        consumed.insert(span.key());
        joined.push(span);
    }
    joined
}

// ---------------------------------------------------------------------------
// Inline splitting
// ---------------------------------------------------------------------------

/// How a heading candidate sits within its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinePlacement {
    /// The block is dominated by the heading's own style.
    Block,
    /// Another style shares the heading's line (run-in heading).
    Inline,
    /// The heading has a line to itself inside a block of another style.
    SeparateLine,
}

pub fn line_placement(span: &Span, style: &str, pages: &[Page], params: &Params) -> LinePlacement {
    let Some(block) = block_of(pages, span) else {
        return LinePlacement::SeparateLine;
    };
    if block.main_style.as_deref() == Some(style) {
        return LinePlacement::Block;
    }
    let shares_line = block.spans.iter().any(|other| {
        other.index != span.index
            && other.style != span.style
            && (other.y - span.y).abs() < params.tol_bin_size
    });
    if shares_line {
        LinePlacement::Inline
    } else {
        LinePlacement::SeparateLine
    }
}

/// Move inline members of a group to `"{style}_inline"` when the group mixes
/// inline and standalone headings.
pub fn split_inline(groups: &mut StyleGroups, pages: &[Page], params: &Params) {
    let mut new_groups = StyleGroups::new();

    for (style, spans) in groups.iter_mut() {
        let placements: Vec<LinePlacement> = spans
            .iter()
            .map(|span| line_placement(span, style, pages, params))
            .collect();
        let n_inline = placements
            .iter()
            .filter(|p| **p == LinePlacement::Inline)
            .count();
        if n_inline == 0 || n_inline == spans.len() {
            continue;
        }

        log::info!(
            "add group {}{}, {} spans out of {}",
            style,
            INLINE_SUFFIX,
            n_inline,
            spans.len()
        );
        let mut block_spans = Vec::new();
        let mut sep_line_spans = Vec::new();
        let mut inline_spans = Vec::new();
        for (span, placement) in std::mem::take(spans).into_iter().zip(placements) {
            match placement {
                LinePlacement::Block => block_spans.push(span),
                LinePlacement::Inline => inline_spans.push(span),
                LinePlacement::SeparateLine => sep_line_spans.push(span),
            }
        }
        block_spans.append(&mut sep_line_spans);
        *spans = block_spans;
        new_groups.insert(format!("{style}{INLINE_SUFFIX}"), inline_spans);
    }

    groups.extend(new_groups);
}

// ---------------------------------------------------------------------------
// All-caps splitting
// ---------------------------------------------------------------------------

fn is_all_caps(text: &str) -> bool {
    text.chars().count() > MIN_ALL_CAPS_CHARS && text == text.to_uppercase()
}

/// Move all-caps members to `"{style}_allCap"` when they make up more than
/// `SPLIT_GROUP_RATIO` of a group, but not all of it.
pub fn split_all_caps(groups: &mut StyleGroups, params: &Params) {
    let mut new_groups = StyleGroups::new();

    for (style, spans) in groups.iter_mut() {
        if spans.is_empty() {
            continue;
        }
        let n_caps = spans.iter().filter(|s| is_all_caps(&s.text)).count();
        if n_caps == spans.len() {
            continue;
        }
        let ratio = n_caps as f32 / spans.len() as f32;
        if ratio > params.split_group_ratio {
            let (caps, normal): (Vec<Span>, Vec<Span>) =
                std::mem::take(spans).into_iter().partition(|s| is_all_caps(&s.text));
            log::info!(
                "add group {}{}, {} spans out of {}",
                style,
                ALL_CAPS_SUFFIX,
                caps.len(),
                caps.len() + normal.len()
            );
            *spans = normal;
            new_groups.insert(format!("{style}{ALL_CAPS_SUFFIX}"), caps);
        }
    }

    groups.extend(new_groups);
}
