//! Plain-text outline format.
//!
//! One line per item: `level - 1` leading tabs, then the tab-separated text,
//! 1-based page and an optional `x,y` (or bare `y`) coordinate field.
//!
//! ```text
//! Introduction	1	72,90
//! 	Background	2	120
//! Results	5
//! ```

use thiserror::Error;

use crate::types::OutlineItem;
use crate::util::round_half_up;

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("line {line}: missing page number")]
    MissingPage { line: usize },

    #[error("line {line}: invalid page number '{value}'")]
    InvalidPage { line: usize, value: String },

    #[error("line {line}: invalid coordinate field '{value}'")]
    InvalidCoordinate { line: usize, value: String },
}

/// Render an outline in the plain-text format. No trailing newline.
pub fn outline_to_string(outline: &[OutlineItem]) -> String {
    outline
        .iter()
        .map(item_to_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn item_to_line(item: &OutlineItem) -> String {
    let mut line = "\t".repeat(item.level.saturating_sub(1));
    line.push_str(&item.text);
    line.push('\t');
    line.push_str(&item.page.to_string());
    if let Some(y) = item.y {
        line.push('\t');
        if let Some(x) = item.x {
            line.push_str(&format!("{},", round_half_up(x) as i64));
        }
        line.push_str(&(round_half_up(y) as i64).to_string());
    }
    line
}

/// Parse the plain-text format. Empty lines are skipped; errors carry the
/// 1-based line number.
///
/// Heading text is kept verbatim. A line holding only tabs and a page number
/// is an empty heading: its last tab separates the (empty) text from the page.
pub fn parse_outline(content: &str) -> Result<Vec<OutlineItem>, ParseError> {
    let mut outline = Vec::new();

    for (i, raw) in content.lines().enumerate() {
        let line = i + 1;
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if raw.is_empty() {
            continue;
        }

        let info = raw.trim_start_matches('\t');
        let tabs = raw.len() - info.len();
        let mut fields: Vec<&str> = info.split('\t').collect();
        let level = if fields.len() == 1 && tabs > 0 {
            fields.insert(0, "");
            tabs
        } else {
            tabs + 1
        };

        let text = fields[0].to_string();
        let page_field = fields.get(1).ok_or(ParseError::MissingPage { line })?.trim();
        let page = parse_page(page_field).ok_or_else(|| ParseError::InvalidPage {
            line,
            value: page_field.to_string(),
        })?;

        let (x, y) = match fields.get(2).map(|f| f.trim()) {
            None | Some("") => (None, None),
            Some(coords) => parse_coordinates(coords).ok_or(ParseError::InvalidCoordinate {
                line,
                value: coords.to_string(),
            })?,
        };

        outline.push(OutlineItem::new(level, text, page).at(x, y));
    }

    Ok(outline)
}

/// Pages are 1-based and written as plain digits.
fn parse_page(field: &str) -> Option<usize> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse::<usize>().ok().filter(|&page| page > 0)
}

fn parse_coordinates(field: &str) -> Option<(Option<f32>, Option<f32>)> {
    let parse = |s: &str| s.trim().parse::<f32>().ok().filter(|v| v.is_finite());
    let parts: Vec<&str> = field.split(',').collect();
    match parts.as_slice() {
        [y] => Some((None, Some(parse(*y)?))),
        [x, y] => Some((Some(parse(*x)?), Some(parse(*y)?))),
        _ => None,
    }
}
