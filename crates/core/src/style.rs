//! Style signatures and per-block span normalisation.
//!
//! This is the first pipeline stage: raw spans are merged within their block,
//! each block learns its dominant style, and every span lands in the global
//! [`StyleGroups`] map keyed by its signature.

use indexmap::IndexMap;

use crate::params::Params;
use crate::types::{
    Block, FontFamily, FontInfo, FontStyle, FontWeight, Page, RawBlock, RawPage, Span,
    StyleGroups,
};
use crate::util::max_by_value;

/// Canonical grouping key for a font: `{size}_{name}_{flags}_{rrggbb}`.
///
/// Flags are `Sa` (sans-serif), `Mo` (monospace), `Bo` (bold) and `It`
/// (italic), in that order.
pub fn style_signature(font: &FontInfo) -> String {
    let mut flags = String::new();
    match font.family {
        FontFamily::SansSerif => flags.push_str("Sa"),
        FontFamily::Monospace => flags.push_str("Mo"),
        FontFamily::Serif => {}
    }
    if font.weight == FontWeight::Bold {
        flags.push_str("Bo");
    }
    if font.style == FontStyle::Italic {
        flags.push_str("It");
    }
    format!("{}_{}_{}_{:06x}", font.size, font.name, flags, font.color)
}

/// Normalise every block and bucket all spans by style.
///
/// Pages without spans simply contribute nothing.
pub fn index_styles(pages: Vec<RawPage>, params: &Params) -> (Vec<Page>, StyleGroups) {
    let mut groups = StyleGroups::new();
    let mut processed = Vec::with_capacity(pages.len());

    for (page_idx, page) in pages.into_iter().enumerate() {
        let blocks: Vec<Block> = page
            .blocks
            .into_iter()
            .enumerate()
            .map(|(block_idx, block)| process_block(block, page_idx, block_idx, params))
            .collect();

        for span in blocks.iter().flat_map(|b| &b.spans) {
            groups
                .entry(span.style.clone())
                .or_default()
                .push(span.clone());
        }

        processed.push(Page {
            width: page.width,
            height: page.height,
            blocks,
        });
    }

    log::info!(
        "{} spans in {} style groups across {} pages",
        groups.values().map(Vec::len).sum::<usize>(),
        groups.len(),
        processed.len()
    );
    (processed, groups)
}

/// Merge adjacent same-style spans of one block and compute its main style
/// and line count.
fn process_block(block: RawBlock, page: usize, block_idx: usize, params: &Params) -> Block {
    let mut spans: Vec<Span> = Vec::with_capacity(block.spans.len());
    let mut areas: IndexMap<String, f32> = IndexMap::new();

    for raw in block.spans {
        let style = style_signature(&raw.font);
        let b = raw.bbox;
        *areas.entry(style.clone()).or_insert(0.0) += b.w * b.h;

        if let Some(prev) = spans.last_mut() {
            if prev.style == style
                && prev.y == b.y
                && prev.h == b.h
                && prev.x + prev.w + params.tol_join_span >= b.x
            {
                prev.text.push(' ');
                prev.text.push_str(&raw.text);
                prev.w = b.x + b.w - prev.x;
                continue;
            }
        }

        spans.push(Span {
            text: raw.text,
            x: b.x,
            y: b.y,
            w: b.w,
            h: b.h,
            size: raw.font.size,
            style,
            page,
            block: block_idx,
            index: spans.len(),
            column: 0,
        });
    }

    let main_style = max_by_value(areas.iter().map(|(k, v)| (k, *v))).cloned();

    let mut ys: Vec<u32> = spans.iter().map(|s| s.y.to_bits()).collect();
    ys.sort_unstable();
    ys.dedup();

    Block {
        bbox: block.bbox,
        spans,
        main_style,
        n_lines: ys.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RawSpan, Rect};

    fn font(size: f32, name: &str, bold: bool) -> FontInfo {
        FontInfo {
            name: name.to_string(),
            family: FontFamily::Serif,
            weight: if bold {
                FontWeight::Bold
            } else {
                FontWeight::Normal
            },
            style: FontStyle::Normal,
            size,
            color: 0,
        }
    }

    fn raw(text: &str, x: f32, y: f32, w: f32, f: &FontInfo) -> RawSpan {
        RawSpan {
            bbox: Rect::new(x, y, w, f.size),
            font: f.clone(),
            text: text.to_string(),
        }
    }

    fn page_of(spans: Vec<RawSpan>) -> RawPage {
        let bbox = spans
            .iter()
            .map(|s| s.bbox)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default();
        RawPage {
            width: 612.0,
            height: 792.0,
            blocks: vec![RawBlock { bbox, spans }],
        }
    }

    #[test]
    fn test_signature_flags_and_color() {
        let f = FontInfo {
            name: "Helvetica-BoldOblique".to_string(),
            family: FontFamily::SansSerif,
            weight: FontWeight::Bold,
            style: FontStyle::Italic,
            size: 10.5,
            color: 0x1a2b3c,
        };
        assert_eq!(style_signature(&f), "10.5_Helvetica-BoldOblique_SaBoIt_1a2b3c");
    }

    #[test]
    fn test_signature_serif_plain() {
        let f = font(10.0, "Times-Roman", false);
        assert_eq!(style_signature(&f), "10_Times-Roman__000000");
    }

    #[test]
    fn test_signature_monospace() {
        let mut f = font(9.0, "Courier", false);
        f.family = FontFamily::Monospace;
        f.color = 0xff;
        assert_eq!(style_signature(&f), "9_Courier_Mo_0000ff");
    }

    #[test]
    fn test_join_gap_equal_to_tolerance_merges() {
        let params = Params::default();
        let f = font(10.0, "Times-Roman", false);
        // First span ends at 100, second starts exactly TOL_JOIN_SPAN later.
        let page = page_of(vec![
            raw("Hello", 0.0, 50.0, 100.0, &f),
            raw("world", 124.0, 50.0, 50.0, &f),
        ]);
        let (pages, groups) = index_styles(vec![page], &params);
        let spans = &pages[0].blocks[0].spans;
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "Hello world");
        assert_eq!(spans[0].w, 174.0);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_join_gap_beyond_tolerance_does_not_merge() {
        let params = Params::default();
        let f = font(10.0, "Times-Roman", false);
        let page = page_of(vec![
            raw("Hello", 0.0, 50.0, 100.0, &f),
            raw("world", 125.0, 50.0, 50.0, &f),
        ]);
        let (pages, _) = index_styles(vec![page], &params);
        let spans = &pages[0].blocks[0].spans;
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[1].index, 1);
    }

    #[test]
    fn test_no_merge_across_styles_or_lines() {
        let params = Params::default();
        let body = font(10.0, "Times-Roman", false);
        let bold = font(10.0, "Times-Bold", true);
        let page = page_of(vec![
            raw("Term", 0.0, 50.0, 30.0, &bold),
            raw("definition", 32.0, 50.0, 60.0, &body),
            raw("next line", 0.0, 62.0, 60.0, &body),
        ]);
        let (pages, groups) = index_styles(vec![page], &params);
        let block = &pages[0].blocks[0];
        assert_eq!(block.spans.len(), 3);
        assert_eq!(block.n_lines, 2);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["10_Times-Roman__000000"].len(), 2);
    }

    #[test]
    fn test_main_style_is_area_weighted() {
        let params = Params::default();
        let body = font(10.0, "Times-Roman", false);
        let big = font(20.0, "Times-Bold", true);
        let page = page_of(vec![
            raw("Title", 0.0, 10.0, 50.0, &big),
            raw("a long line of body text", 0.0, 40.0, 400.0, &body),
        ]);
        let (pages, _) = index_styles(vec![page], &params);
        assert_eq!(
            pages[0].blocks[0].main_style.as_deref(),
            Some("10_Times-Roman__000000")
        );
    }

    #[test]
    fn test_span_indices_recorded() {
        let params = Params::default();
        let f = font(10.0, "Times-Roman", false);
        let pages = vec![
            page_of(vec![raw("a", 0.0, 0.0, 10.0, &f)]),
            page_of(vec![
                raw("b", 0.0, 0.0, 10.0, &f),
                raw("c", 0.0, 20.0, 10.0, &f),
            ]),
        ];
        let (_, groups) = index_styles(pages, &params);
        let keys: Vec<_> = groups["10_Times-Roman__000000"]
            .iter()
            .map(Span::key)
            .collect();
        assert_eq!(keys, vec![(0, 0, 0), (1, 0, 0), (1, 0, 1)]);
    }

    #[test]
    fn test_empty_page_contributes_nothing() {
        let params = Params::default();
        let page = RawPage {
            width: 612.0,
            height: 792.0,
            blocks: vec![RawBlock {
                bbox: Rect::default(),
                spans: vec![],
            }],
        };
        let (pages, groups) = index_styles(vec![page], &params);
        assert!(groups.is_empty());
        assert_eq!(pages[0].blocks[0].main_style, None);
        assert_eq!(pages[0].blocks[0].n_lines, 0);
    }
}
