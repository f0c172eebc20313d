//! Span and group filters applied before and after restructuring.

use std::collections::HashMap;
use std::fmt;

use crate::params::Params;
use crate::types::{block_of, AlignmentScores, Column, Page, Span, StyleGroups};
use crate::util::max_by_value;

/// Blocks with more lines than this are body text, whatever their style.
const MAX_HEADING_BLOCK_LINES: usize = 3;

// ---------------------------------------------------------------------------
// Pre-filter: main content box
// ---------------------------------------------------------------------------

/// Drop spans reaching outside the union of the column extents by more than
/// `TOL_BIN_SIZE` (running headers, footers, margin notes). Emptied groups
/// are kept.
pub fn pre_filter(groups: &mut StyleGroups, columns: &[Column], params: &Params) {
    let tol = params.tol_bin_size;
    let x_left = columns.iter().map(|c| c.x0).fold(f32::INFINITY, f32::min);
    let x_right = columns.iter().map(|c| c.x1).fold(f32::NEG_INFINITY, f32::max);
    let y_top = columns.iter().map(|c| c.y0).fold(f32::INFINITY, f32::min);
    let y_bottom = columns.iter().map(|c| c.y1).fold(f32::NEG_INFINITY, f32::max);
    log::info!("main box x=[{x_left},{x_right}] y=[{y_top},{y_bottom}]");

    let in_margin = |s: &Span| {
        s.x < x_left - tol
            || s.x + s.w > x_right + tol
            || s.y < y_top - tol
            || s.y + s.h > y_bottom + tol
    };

    for (style, spans) in groups.iter_mut() {
        let before = spans.len();
        spans.retain(|s| !in_margin(s));
        if spans.len() < before {
            log::debug!("Pre-filtered {} from {} to {}", style, before, spans.len());
        }
    }
}

// ---------------------------------------------------------------------------
// Group filter
// ---------------------------------------------------------------------------

/// Reason a style group was ruled out as a heading candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRejection {
    TooFewSpans,
    TooManyPerPage,
    TextTooSmall,
    TextTooShort,
}

impl fmt::Display for GroupRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GroupRejection::TooFewSpans => "too_few_spans",
            GroupRejection::TooManyPerPage => "too_many_per_page",
            GroupRejection::TextTooSmall => "text_too_small",
            GroupRejection::TextTooShort => "text_too_short",
        };
        f.write_str(name)
    }
}

/// First rejection that applies to a group, checked in declaration order of
/// [`GroupRejection`].
pub fn group_rejection(
    spans: &[Span],
    score: Option<f32>,
    main_font_size: f32,
    params: &Params,
) -> Option<GroupRejection> {
    let perfectly_aligned = spans.len() > 1 && score == Some(1.0);
    if !perfectly_aligned && spans.len() < params.filter_min_spans_per_group {
        return Some(GroupRejection::TooFewSpans);
    }

    let mut per_page: HashMap<usize, usize> = HashMap::new();
    for span in spans {
        let count = per_page.entry(span.page).or_insert(0);
        *count += 1;
        if *count > params.filter_max_spans_per_page {
            return Some(GroupRejection::TooManyPerPage);
        }
    }

    let size = spans.first().map(|s| s.size).unwrap_or(0.0);
    if size < main_font_size - params.filter_fontsize_smaller {
        return Some(GroupRejection::TextTooSmall);
    }

    let chars: usize = spans.iter().map(|s| s.text.chars().count()).sum();
    let avg = chars as f32 / spans.len().max(1) as f32;
    if avg < params.filter_text_avg_len {
        return Some(GroupRejection::TextTooShort);
    }

    None
}

/// Remove style groups unlikely to be headings.
///
/// The group with the most spans is taken as body text; its font size is the
/// reference for [`GroupRejection::TextTooSmall`].
pub fn filter_groups(groups: &mut StyleGroups, scores: &AlignmentScores, params: &Params) {
    let main_style = max_by_value(groups.iter().map(|(k, v)| (k, v.len() as f32))).cloned();
    let Some(main_style) = main_style else {
        return;
    };
    let main_font_size = groups[&main_style].first().map(|s| s.size).unwrap_or(0.0);

    let n_before = groups.len();
    groups.retain(|style, spans| {
        match group_rejection(spans, scores.get(style).copied(), main_font_size, params) {
            Some(reason) => {
                log::debug!("Style: {}, Spans: {}, Filter: {}", style, spans.len(), reason);
                false
            }
            None => true,
        }
    });

    log::info!("{} of {} style groups after group filter", groups.len(), n_before);
    for (style, spans) in groups.iter() {
        log::debug!("Style: {}, Spans: {}", style, spans.len());
    }
}

// ---------------------------------------------------------------------------
// Post-filter
// ---------------------------------------------------------------------------

/// Drop spans that do not open their block, and spans carrying the dominant
/// style of a block with more than three lines. Groups left with fewer than
/// `FILTER_MIN_SPANS_PER_GROUP` spans are removed, except perfectly aligned
/// groups of at least two spans.
pub fn post_filter(
    groups: &mut StyleGroups,
    pages: &[Page],
    scores: &AlignmentScores,
    params: &Params,
) {
    let keep_span = |span: &Span| {
        if span.index > 0 {
            return false;
        }
        match block_of(pages, span) {
            Some(block) => {
                !(block.main_style.as_deref() == Some(span.style.as_str())
                    && block.n_lines > MAX_HEADING_BLOCK_LINES)
            }
            None => true,
        }
    };

    let n_before = groups.len();
    groups.retain(|style, spans| {
        spans.retain(|s| keep_span(s));
        let perfectly_aligned = spans.len() > 1 && scores.get(style).copied() == Some(1.0);
        let keep = perfectly_aligned || spans.len() >= params.filter_min_spans_per_group;
        if !keep {
            log::debug!("Style: {}, Spans: {}, Filter: post", style, spans.len());
        }
        keep
    });
    log::info!("{} of {} style groups after span filter", groups.len(), n_before);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Block, Rect};

    const BODY: &str = "10_Times-Roman__000000";
    const HEAD: &str = "14_Times-Bold_Bo_000000";

    fn span(style: &str, size: f32, page: usize, block: usize, index: usize, text: &str) -> Span {
        Span {
            text: text.to_string(),
            x: 72.0,
            y: 100.0,
            w: 200.0,
            h: size,
            size,
            style: style.to_string(),
            page,
            block,
            index,
            column: 0,
        }
    }

    fn col(x0: f32, y0: f32, x1: f32, y1: f32) -> Column {
        Column {
            left_bin: x0,
            mid_bin: (x0 + x1) / 2.0,
            x0,
            y0,
            x1,
            y1,
            area: 1.0,
        }
    }

    #[test]
    fn test_pre_filter_drops_margin_spans() {
        let mut groups = StyleGroups::new();
        let mut header = span(HEAD, 14.0, 0, 0, 0, "Running header");
        header.y = 20.0;
        let mut inside = span(HEAD, 14.0, 0, 1, 0, "Inside");
        inside.y = 300.0;
        let mut edge = span(HEAD, 14.0, 0, 2, 0, "Just inside tolerance");
        edge.x = 66.0;
        groups.insert(HEAD.to_string(), vec![header, inside, edge]);
        groups.insert(BODY.to_string(), vec![]);

        pre_filter(&mut groups, &[col(72.0, 72.0, 540.0, 720.0)], &Params::default());
        let texts: Vec<_> = groups[HEAD].iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Inside", "Just inside tolerance"]);
        assert!(groups.contains_key(BODY));
    }

    #[test]
    fn test_too_few_spans_unless_perfectly_aligned() {
        let params = Params::default();
        let spans = vec![span(HEAD, 14.0, 0, 0, 0, "One"), span(HEAD, 14.0, 1, 0, 0, "Two")];
        assert_eq!(
            group_rejection(&spans, Some(0.9), 10.0, &params),
            Some(GroupRejection::TooFewSpans)
        );
        assert_eq!(group_rejection(&spans, Some(1.0), 10.0, &params), None);
        assert_eq!(
            group_rejection(&spans[..1], Some(1.0), 10.0, &params),
            Some(GroupRejection::TooFewSpans)
        );
    }

    #[test]
    fn test_too_many_per_page() {
        let params = Params::default();
        let spans: Vec<_> = (0..11).map(|i| span(HEAD, 14.0, 0, i, 0, "Item")).collect();
        assert_eq!(
            group_rejection(&spans, Some(1.0), 10.0, &params),
            Some(GroupRejection::TooManyPerPage)
        );
        let spread: Vec<_> = (0..11).map(|i| span(HEAD, 14.0, i, 0, 0, "Item")).collect();
        assert_eq!(group_rejection(&spread, Some(1.0), 10.0, &params), None);
    }

    #[test]
    fn test_text_too_small() {
        let params = Params::default();
        let spans: Vec<_> = (0..3).map(|i| span("7_X__000000", 7.0, i, 0, 0, "Note")).collect();
        assert_eq!(
            group_rejection(&spans, Some(1.0), 10.0, &params),
            Some(GroupRejection::TextTooSmall)
        );
        let spans: Vec<_> = (0..3).map(|i| span("8_X__000000", 8.0, i, 0, 0, "Note")).collect();
        assert_eq!(group_rejection(&spans, Some(1.0), 10.0, &params), None);
    }

    #[test]
    fn test_text_too_short() {
        let params = Params::default();
        let spans: Vec<_> = (0..4).map(|i| span(HEAD, 14.0, i, 0, 0, "a")).collect();
        assert_eq!(
            group_rejection(&spans, Some(1.0), 10.0, &params),
            Some(GroupRejection::TextTooShort)
        );
    }

    #[test]
    fn test_filter_groups_uses_largest_group_font() {
        let params = Params::default();
        let mut groups = StyleGroups::new();
        groups.insert(
            "9_Small__000000".to_string(),
            (0..3).map(|i| span("9_Small__000000", 9.0, i, 1, 0, "caption")).collect(),
        );
        groups.insert(
            BODY.to_string(),
            (0..5).map(|i| span(BODY, 12.0, i, 0, 0, "paragraph")).collect(),
        );
        let scores = AlignmentScores::new();
        filter_groups(&mut groups, &scores, &params);
        assert!(groups.contains_key(BODY));
        assert!(!groups.contains_key("9_Small__000000"));
    }

    #[test]
    fn test_filter_groups_empty_is_noop() {
        let mut groups = StyleGroups::new();
        filter_groups(&mut groups, &AlignmentScores::new(), &Params::default());
        assert!(groups.is_empty());
    }

    fn block(main_style: &str, n_lines: usize) -> Block {
        Block {
            bbox: Rect::new(72.0, 100.0, 400.0, 100.0),
            spans: vec![],
            main_style: Some(main_style.to_string()),
            n_lines,
        }
    }

    #[test]
    fn test_post_filter() {
        let pages = vec![Page {
            width: 612.0,
            height: 792.0,
            blocks: vec![
                block(HEAD, 1),
                block(BODY, 8),
                block(HEAD, 1),
                block(HEAD, 5),
                block(HEAD, 2),
            ],
        }];
        let mut groups = StyleGroups::new();
        groups.insert(
            HEAD.to_string(),
            vec![
                span(HEAD, 14.0, 0, 0, 0, "Kept"),
                span(HEAD, 14.0, 0, 1, 2, "Mid-paragraph"),
                span(HEAD, 14.0, 0, 2, 0, "Kept too"),
                span(HEAD, 14.0, 0, 3, 0, "Large block"),
                span(HEAD, 14.0, 0, 4, 0, "Kept three"),
            ],
        );
        groups.insert(BODY.to_string(), vec![span(BODY, 10.0, 0, 1, 0, "Body")]);

        post_filter(&mut groups, &pages, &AlignmentScores::new(), &Params::default());
        let texts: Vec<_> = groups[HEAD].iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Kept", "Kept too", "Kept three"]);
        assert!(!groups.contains_key(BODY));
    }

    #[test]
    fn test_post_filter_keeps_small_perfectly_aligned_group() {
        let pages = vec![Page {
            width: 612.0,
            height: 792.0,
            blocks: vec![block(HEAD, 1), block(HEAD, 1)],
        }];
        let mut groups = StyleGroups::new();
        groups.insert(
            HEAD.to_string(),
            vec![span(HEAD, 14.0, 0, 0, 0, "One"), span(HEAD, 14.0, 0, 1, 0, "Two")],
        );
        let mut scores = AlignmentScores::new();
        scores.insert(HEAD.to_string(), 1.0);

        post_filter(&mut groups, &pages, &scores, &Params::default());
        assert_eq!(groups[HEAD].len(), 2);

        post_filter(&mut groups, &pages, &AlignmentScores::new(), &Params::default());
        assert!(groups.is_empty());
    }
}
