//! Alignment scoring of style groups against the detected columns.

use crate::params::Params;
use crate::types::{AlignmentScores, Column, StyleGroups};
use crate::util::{abs_min_dist, mode, round_to_bin};

/// Keep the style groups whose spans consistently sit at the same distance
/// from a column's left edge or midpoint.
///
/// Every span gets its nearest column recorded. A group survives when the
/// share of spans at the modal left distance exceeds `ALIGN_LEFT_RATIO`, or
/// the share at the modal mid distance exceeds `ALIGN_MID_RATIO`; surviving
/// groups keep the spans matching either mode. The best of both ratios is
/// returned as the group's alignment score.
pub fn align_groups(
    groups: StyleGroups,
    columns: &[Column],
    params: &Params,
) -> (StyleGroups, AlignmentScores) {
    let bin = params.tol_bin_size;
    let left_bins: Vec<f32> = columns.iter().map(|c| c.left_bin).collect();
    let mid_bins: Vec<f32> = columns.iter().map(|c| c.mid_bin).collect();

    let n_groups = groups.len();
    let mut aligned = StyleGroups::new();
    let mut scores = AlignmentScores::new();

    for (style, mut spans) in groups {
        if spans.is_empty() {
            continue;
        }

        let mut left_dists = Vec::with_capacity(spans.len());
        let mut mid_dists = Vec::with_capacity(spans.len());
        for span in spans.iter_mut() {
            let (d_left, i_left) = abs_min_dist(round_to_bin(span.x, bin), &left_bins)
                .unwrap_or((f32::INFINITY, 0));
            let (d_mid, i_mid) =
                abs_min_dist(round_to_bin(span.x + span.w / 2.0, bin), &mid_bins)
                    .unwrap_or((f32::INFINITY, 0));
            span.column = if d_left < d_mid { i_left } else { i_mid };
            left_dists.push(d_left);
            mid_dists.push(d_mid);
        }

        let (Some(left_mode), Some(mid_mode)) = (mode(&left_dists), mode(&mid_dists)) else {
            continue;
        };
        let total = spans.len() as f32;
        let left_ratio = left_dists.iter().filter(|d| **d == left_mode).count() as f32 / total;
        let mid_ratio = mid_dists.iter().filter(|d| **d == mid_mode).count() as f32 / total;
        scores.insert(style.clone(), left_ratio.max(mid_ratio));

        if left_ratio > params.align_left_ratio || mid_ratio > params.align_mid_ratio {
            let kept: Vec<_> = spans
                .into_iter()
                .zip(left_dists.iter().zip(&mid_dists))
                .filter(|(_, (l, m))| **l == left_mode || **m == mid_mode)
                .map(|(span, _)| span)
                .collect();
            log::debug!(
                "Style {} {} spans, align l={:.2} m={:.2}",
                style,
                kept.len(),
                left_ratio,
                mid_ratio
            );
            aligned.insert(style, kept);
        }
    }

    log::info!("{} of {} style groups aligned", aligned.len(), n_groups);
    (aligned, scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Span;

    fn span(x: f32, w: f32, index: usize) -> Span {
        Span {
            text: "Heading".to_string(),
            x,
            y: 100.0 + index as f32 * 20.0,
            w,
            h: 12.0,
            size: 12.0,
            style: "12_Times-Bold_Bo_000000".to_string(),
            page: 0,
            block: index,
            index: 0,
            column: 0,
        }
    }

    fn columns() -> Vec<Column> {
        vec![
            Column {
                left_bin: 72.0,
                mid_bin: 180.0,
                x0: 72.0,
                y0: 72.0,
                x1: 292.0,
                y1: 720.0,
                area: 1.0,
            },
            Column {
                left_bin: 318.0,
                mid_bin: 432.0,
                x0: 320.0,
                y0: 72.0,
                x1: 540.0,
                y1: 720.0,
                area: 1.0,
            },
        ]
    }

    /// Ten spans with varying widths: `n_left` of them start at the first
    /// column's left edge, the rest are scattered.
    fn group_with_left_aligned(n_left: usize) -> StyleGroups {
        let mut spans = Vec::new();
        for i in 0..10 {
            let w = 40.0 + i as f32 * 17.0;
            let x = if i < n_left { 72.0 } else { 96.0 + i as f32 * 13.0 };
            spans.push(span(x, w, i));
        }
        let mut groups = StyleGroups::new();
        groups.insert("12_Times-Bold_Bo_000000".to_string(), spans);
        groups
    }

    #[test]
    fn test_ratio_above_threshold_survives() {
        let params = Params::default();
        let (aligned, scores) = align_groups(group_with_left_aligned(7), &columns(), &params);
        let style = "12_Times-Bold_Bo_000000";
        assert!(aligned.contains_key(style));
        assert!((scores[style] - 0.7).abs() < 1e-6);
        assert!(aligned[style].len() >= 7);
    }

    #[test]
    fn test_ratio_below_threshold_dropped() {
        let params = Params {
            align_left_ratio: 0.75,
            align_mid_ratio: 0.75,
            ..Params::default()
        };
        let (aligned, scores) = align_groups(group_with_left_aligned(7), &columns(), &params);
        assert!(aligned.is_empty());
        assert_eq!(scores.len(), 1);
    }

    #[test]
    fn test_centered_spans_use_mid_alignment_and_column() {
        let params = Params::default();
        let mut groups = StyleGroups::new();
        groups.insert(
            "24_Helvetica_SaBo_000000".to_string(),
            vec![span(380.0, 104.0, 0), span(400.0, 64.0, 1), span(130.0, 100.0, 2)],
        );
        let (aligned, scores) = align_groups(groups, &columns(), &params);
        let spans = &aligned["24_Helvetica_SaBo_000000"];
        assert_eq!(spans.len(), 3);
        assert_eq!(scores["24_Helvetica_SaBo_000000"], 1.0);
        assert_eq!(spans[0].column, 1);
        assert_eq!(spans[1].column, 1);
        assert_eq!(spans[2].column, 0);
    }

    #[test]
    fn test_empty_group_dropped() {
        let mut groups = StyleGroups::new();
        groups.insert("empty".to_string(), vec![]);
        let (aligned, scores) = align_groups(groups, &columns(), &Params::default());
        assert!(aligned.is_empty());
        assert!(scores.is_empty());
    }
}
