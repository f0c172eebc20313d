//! Ordering of the final heading spans into a leveled outline.

use std::collections::HashMap;

use crate::params::Params;
use crate::types::{OutlineItem, Span, StyleGroups};

/// Turn the surviving groups into outline items in reading order.
///
/// Levels are handed out to group keys in the order they are first met while
/// reading, so the style appearing first becomes level 1.
pub fn build_outline(groups: StyleGroups, params: &Params) -> Vec<OutlineItem> {
    let mut tagged: Vec<(String, Span)> = groups
        .into_iter()
        .flat_map(|(key, spans)| spans.into_iter().map(move |s| (key.clone(), s)))
        .collect();
    tagged.sort_by(|(_, a), (_, b)| {
        a.page
            .cmp(&b.page)
            .then(a.column.cmp(&b.column))
            .then(a.y.total_cmp(&b.y))
    });

    let mut levels: HashMap<String, usize> = HashMap::new();
    let mut outline = Vec::with_capacity(tagged.len());
    for (key, span) in tagged {
        let next = levels.len() + 1;
        let level = *levels.entry(key).or_insert(next);
        let item = OutlineItem::new(level, span.text, span.page + 1);
        outline.push(item.at(Some(span.x), Some(span.y)));
    }

    repair_levels(&mut outline);
    outline.retain(|item| item.level <= params.max_levels);
    log::info!("{} outline items", outline.len());
    outline
}

/// Clamp levels so that no item is more than one level deeper than its
/// predecessor. A clamped item does not become the new reference depth.
pub fn repair_levels(outline: &mut [OutlineItem]) {
    let mut prev = 0;
    for item in outline.iter_mut() {
        if item.level > prev + 1 {
            item.level = prev + 1;
        } else {
            prev = item.level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, page: usize, column: usize, y: f32) -> Span {
        Span {
            text: text.to_string(),
            x: 72.0,
            y,
            w: 100.0,
            h: 12.0,
            size: 12.0,
            style: String::new(),
            page,
            block: 0,
            index: 0,
            column,
        }
    }

    fn levels(outline: &[OutlineItem]) -> Vec<usize> {
        outline.iter().map(|i| i.level).collect()
    }

    #[test]
    fn test_reading_order_and_levels() {
        let mut groups = StyleGroups::new();
        // The subsection style is seen first in map order but appears later
        // in the document.
        groups.insert(
            "sub".to_string(),
            vec![span("1.1 Scope", 0, 0, 300.0), span("2.1 Data", 1, 1, 100.0)],
        );
        groups.insert(
            "chapter".to_string(),
            vec![span("1 Intro", 0, 0, 100.0), span("2 Method", 1, 0, 500.0)],
        );

        let outline = build_outline(groups, &Params::default());
        let texts: Vec<_> = outline.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["1 Intro", "1.1 Scope", "2 Method", "2.1 Data"]);
        assert_eq!(levels(&outline), vec![1, 2, 1, 2]);
        assert_eq!(outline[2].page, 2);
        assert_eq!(outline[2].y, Some(500.0));
    }

    #[test]
    fn test_repair_clamps_jumps() {
        let mut outline: Vec<_> = [1, 3, 3, 2, 4, 1]
            .iter()
            .map(|&l| OutlineItem::new(l, "x", 1))
            .collect();
        repair_levels(&mut outline);
        assert_eq!(levels(&outline), vec![1, 2, 2, 2, 3, 1]);
    }

    #[test]
    fn test_repair_first_item_becomes_level_one() {
        let mut outline = vec![OutlineItem::new(2, "x", 1), OutlineItem::new(2, "y", 1)];
        repair_levels(&mut outline);
        assert_eq!(levels(&outline), vec![1, 1]);
    }

    #[test]
    fn test_max_levels_truncation() {
        let mut groups = StyleGroups::new();
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            let y = 100.0 + i as f32 * 50.0;
            groups.insert(key.to_string(), vec![span(key, 0, 0, y)]);
        }
        let outline = build_outline(groups, &Params::default());
        assert_eq!(levels(&outline), vec![1, 2, 3]);

        let params = Params {
            max_levels: 1,
            ..Params::default()
        };
        let mut groups = StyleGroups::new();
        groups.insert("a".to_string(), vec![span("a", 0, 0, 100.0)]);
        groups.insert("b".to_string(), vec![span("b", 0, 0, 200.0)]);
        assert_eq!(levels(&build_outline(groups, &params)), vec![1]);
    }

    #[test]
    fn test_depth_is_monotone_after_build() {
        let mut groups = StyleGroups::new();
        groups.insert("deep".to_string(), vec![span("deep", 0, 0, 50.0)]);
        groups.insert("mid".to_string(), vec![span("mid", 0, 0, 10.0)]);
        groups.insert(
            "top".to_string(),
            vec![span("top", 0, 0, 5.0), span("top2", 1, 0, 5.0)],
        );
        let outline = build_outline(groups, &Params::default());
        let mut prev = 0;
        for item in &outline {
            assert!(item.level >= 1 && item.level <= prev + 1);
            prev = item.level;
        }
    }
}
