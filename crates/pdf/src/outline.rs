//! Reading and writing the document outline (`/Outlines` in the catalog).

use std::collections::{BTreeMap, HashSet};

use lopdf::{Dictionary, Object, ObjectId, StringFormat};
use outliner_core::builder::repair_levels;
use outliner_core::OutlineItem;

use crate::parser::backend::{
    decode_text_simple, encode_text_string, object_number, LopdfBackend, PdfBackend,
};
use crate::PdfError;

/// Name-tree recursion limit; real documents stay far below it.
const MAX_NAME_TREE_DEPTH: usize = 32;

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// A resolved destination: page number and optional top-left coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Destination {
    page: usize,
    x: Option<f32>,
    y: Option<f32>,
}

struct OutlineReader<'a> {
    backend: &'a LopdfBackend,
    catalog: &'a Dictionary,
    /// Page object id to 1-based page number.
    page_numbers: BTreeMap<ObjectId, u32>,
    visited: HashSet<ObjectId>,
}

fn catalog(backend: &LopdfBackend) -> Result<&Dictionary, PdfError> {
    let doc = backend.raw_doc();
    doc.trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .and_then(|id| doc.get_dictionary(id))
        .map_err(|e| PdfError::Parse(format!("cannot get document catalog: {}", e)))
}

/// Read the document's existing outline, flattened in reading order.
///
/// Entries whose destination cannot be resolved to a page are skipped; their
/// children are kept and re-levelled.
pub fn read_outline(backend: &LopdfBackend) -> Result<Vec<OutlineItem>, PdfError> {
    let catalog = catalog(backend)?;
    let Some(root) = backend.resolve_dict(catalog, b"Outlines") else {
        return Ok(Vec::new());
    };

    let mut reader = OutlineReader {
        backend,
        catalog,
        page_numbers: backend.pages().into_iter().map(|(n, id)| (id, n)).collect(),
        visited: HashSet::new(),
    };

    let mut outline = Vec::new();
    if let Some(first) = root.get(b"First").ok().and_then(|o| o.as_reference().ok()) {
        reader.walk(first, 1, &mut outline);
    }
    repair_levels(&mut outline);
    log::debug!("read {} existing outline items", outline.len());
    Ok(outline)
}

impl<'a> OutlineReader<'a> {
    /// Visit `first` and its siblings at `depth`, recursing into children.
    fn walk(&mut self, first: ObjectId, depth: usize, out: &mut Vec<OutlineItem>) {
        let backend = self.backend;
        let mut next = Some(first);
        while let Some(id) = next {
            // Guard against cyclic First/Next chains.
            if !self.visited.insert(id) {
                break;
            }
            let Ok(node) = backend.raw_doc().get_dictionary(id) else {
                break;
            };

            let title = node
                .get(b"Title")
                .ok()
                .and_then(|o| backend.resolve(o))
                .and_then(|o| o.as_str().ok())
                .map(|bytes| decode_text_simple(bytes).trim().to_string())
                .unwrap_or_default();

            match self.item_destination(node) {
                Some(dest) => {
                    out.push(OutlineItem::new(depth, title, dest.page).at(dest.x, dest.y))
                }
                None => log::debug!("skipping outline item without destination: {:?}", title),
            }

            if let Some(child) = node.get(b"First").ok().and_then(|o| o.as_reference().ok()) {
                self.walk(child, depth + 1, out);
            }
            next = node.get(b"Next").ok().and_then(|o| o.as_reference().ok());
        }
    }

    /// `/Dest`, or the `/D` entry of a `/GoTo` action.
    fn item_destination(&self, node: &Dictionary) -> Option<Destination> {
        if let Ok(dest) = node.get(b"Dest") {
            return self.resolve_destination(dest);
        }
        let action = self.backend.resolve_dict(node, b"A")?;
        let kind = action.get(b"S").ok()?.as_name().ok()?;
        if kind != b"GoTo" {
            return None;
        }
        self.resolve_destination(action.get(b"D").ok()?)
    }

    fn resolve_destination(&self, dest: &Object) -> Option<Destination> {
        match self.backend.resolve(dest)? {
            Object::Array(arr) => self.explicit_destination(arr),
            Object::Name(name) => self.named_destination(name),
            Object::String(name, _) => self.named_destination(name),
            // Entries of the /Dests dictionary may wrap the array as /D.
            Object::Dictionary(d) => self.resolve_destination(d.get(b"D").ok()?),
            _ => None,
        }
    }

    /// `[page /XYZ left top zoom]` and the other fit types carrying a top
    /// coordinate.
    fn explicit_destination(&self, arr: &[Object]) -> Option<Destination> {
        let page = match arr.first()? {
            Object::Reference(id) => *self.page_numbers.get(id)? as usize,
            // Remote-style destinations use a 0-based page index.
            Object::Integer(i) => usize::try_from(*i).ok()? + 1,
            _ => return None,
        };

        let number = |i: usize| {
            arr.get(i)
                .and_then(|o| self.backend.resolve(o))
                .and_then(object_number)
        };
        let (left, top) = match arr.get(1).and_then(|o| o.as_name().ok()) {
            Some(b"XYZ") => (number(2), number(3)),
            Some(b"FitH") | Some(b"FitBH") => (None, number(2)),
            Some(b"FitR") => (number(2), number(5)),
            _ => (None, None),
        };

        let page_id = self
            .page_numbers
            .iter()
            .find_map(|(id, n)| (*n as usize == page).then_some(*id))?;
        let height = self
            .backend
            .page_dimensions(page_id)
            .map(|(_, h)| h)
            .unwrap_or(0.0);

        Some(Destination {
            page,
            x: left,
            y: top.map(|t| height - t),
        })
    }

    fn named_destination(&self, name: &[u8]) -> Option<Destination> {
        // PDF 1.1 style: a /Dests dictionary in the catalog.
        if let Some(dests) = self.backend.resolve_dict(self.catalog, b"Dests") {
            if let Ok(dest) = dests.get(name) {
                return self.resolve_destination(dest);
            }
        }

        // PDF 1.2+: the /Dests name tree under /Names.
        let names = self.backend.resolve_dict(self.catalog, b"Names")?;
        let tree = self.backend.resolve_dict(names, b"Dests")?;
        let dest = self.lookup_name_tree(tree, name, 0)?;
        self.resolve_destination(dest)
    }

    fn lookup_name_tree(&self, node: &'a Dictionary, name: &[u8], depth: usize) -> Option<&'a Object> {
        if depth > MAX_NAME_TREE_DEPTH {
            return None;
        }

        if let Some(pairs) = self.backend.resolve_array(node, b"Names") {
            for pair in pairs.chunks_exact(2) {
                let key = self.backend.resolve(&pair[0]).and_then(|k| k.as_str().ok());
                if key == Some(name) {
                    return Some(&pair[1]);
                }
            }
        }

        let kids = self.backend.resolve_array(node, b"Kids")?;
        kids.iter()
            .filter_map(|kid| self.backend.resolve(kid)?.as_dict().ok())
            .find_map(|kid| self.lookup_name_tree(kid, name, depth + 1))
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// An item placed in the outline tree.
struct Node {
    id: ObjectId,
    depth: usize,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Arrange items into a tree with a cursor walking down one level at a time.
///
/// An item deeper than its predecessor becomes that predecessor's child, even
/// when its level jumps by more than one; a shallower item climbs back up to
/// its own level.
fn arrange(levels: &[usize], ids: &[ObjectId]) -> (Vec<Node>, Vec<usize>) {
    let mut nodes: Vec<Node> = Vec::with_capacity(levels.len());
    let mut roots = Vec::new();
    let mut path: Vec<usize> = Vec::new();

    for (idx, (&level, &id)) in levels.iter().zip(ids).enumerate() {
        let depth = level.clamp(1, path.len() + 1);
        path.truncate(depth - 1);
        let parent = path.last().copied();
        match parent {
            Some(p) => nodes[p].children.push(idx),
            None => roots.push(idx),
        }
        nodes.push(Node {
            id,
            depth,
            parent,
            children: Vec::new(),
        });
        path.push(idx);
    }

    (nodes, roots)
}

/// Number of descendants shown when every open item is expanded.
fn visible_descendants(nodes: &[Node], idx: usize, fold_level: usize) -> i64 {
    nodes[idx]
        .children
        .iter()
        .map(|&c| {
            let open = nodes[c].depth < fold_level;
            1 + if open {
                visible_descendants(nodes, c, fold_level)
            } else {
                0
            }
        })
        .sum()
}

/// Destination array `[page /XYZ left top null]` in PDF user space.
fn xyz_destination(page_id: ObjectId, item: &OutlineItem, height: f32) -> Object {
    let coord = |v: Option<f32>| v.map(Object::Real).unwrap_or(Object::Null);
    Object::Array(vec![
        Object::Reference(page_id),
        Object::Name(b"XYZ".to_vec()),
        coord(item.x),
        coord(item.y.map(|y| height - y)),
        Object::Null,
    ])
}

fn title_object(text: &str) -> Object {
    let bytes = encode_text_string(text);
    let format = if bytes.starts_with(&[0xFE, 0xFF]) {
        StringFormat::Hexadecimal
    } else {
        StringFormat::Literal
    };
    Object::String(bytes, format)
}

/// Replace the document outline with `items`.
///
/// Items at a depth below `fold_level` are shown expanded. An empty list
/// removes the outline.
pub fn write_outline(
    backend: &mut LopdfBackend,
    items: &[OutlineItem],
    fold_level: usize,
) -> Result<(), PdfError> {
    let pages = backend.pages();

    // Resolve every page up front so a bad item leaves the document untouched.
    let mut targets = Vec::with_capacity(items.len());
    for item in items {
        let page_id = u32::try_from(item.page)
            .ok()
            .and_then(|n| pages.get(&n).copied())
            .ok_or_else(|| {
                PdfError::Outline(format!(
                    "item {:?} points to page {} but the document has {} pages",
                    item.text,
                    item.page,
                    pages.len()
                ))
            })?;
        let (_, height) = backend.page_dimensions(page_id)?;
        targets.push((page_id, height));
    }

    let catalog_id = backend
        .raw_doc()
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|e| PdfError::Parse(format!("cannot get document catalog: {}", e)))?;

    let doc = backend.raw_doc_mut();
    let catalog = doc
        .get_object_mut(catalog_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| PdfError::Parse(format!("cannot get document catalog: {}", e)))?;
    catalog.remove(b"Outlines");

    if items.is_empty() {
        doc.prune_objects();
        return Ok(());
    }

    let root_id = doc.new_object_id();
    let ids: Vec<ObjectId> = items.iter().map(|_| doc.new_object_id()).collect();
    let levels: Vec<usize> = items.iter().map(|i| i.level).collect();
    let (nodes, roots) = arrange(&levels, &ids);

    for (idx, item) in items.iter().enumerate() {
        let node = &nodes[idx];
        let (page_id, height) = targets[idx];

        let mut dict = Dictionary::new();
        dict.set("Title", title_object(&item.text));
        dict.set(
            "Parent",
            Object::Reference(node.parent.map(|p| nodes[p].id).unwrap_or(root_id)),
        );

        let peers: &[usize] = match node.parent {
            Some(p) => &nodes[p].children,
            None => &roots,
        };
        if let Some(pos) = peers.iter().position(|&s| s == idx) {
            if pos > 0 {
                dict.set("Prev", Object::Reference(nodes[peers[pos - 1]].id));
            }
            if let Some(&next) = peers.get(pos + 1) {
                dict.set("Next", Object::Reference(nodes[next].id));
            }
        }

        if let (Some(&first), Some(&last)) = (node.children.first(), node.children.last()) {
            dict.set("First", Object::Reference(nodes[first].id));
            dict.set("Last", Object::Reference(nodes[last].id));
            let count = visible_descendants(&nodes, idx, fold_level);
            let open = node.depth < fold_level;
            dict.set("Count", Object::Integer(if open { count } else { -count }));
        }

        dict.set("Dest", xyz_destination(page_id, item, height));
        doc.objects.insert(node.id, Object::Dictionary(dict));
    }

    let root_count: i64 = roots
        .iter()
        .map(|&r| {
            1 + if nodes[r].depth < fold_level {
                visible_descendants(&nodes, r, fold_level)
            } else {
                0
            }
        })
        .sum();
    let mut root = Dictionary::new();
    root.set("Type", Object::Name(b"Outlines".to_vec()));
    if let (Some(&first), Some(&last)) = (roots.first(), roots.last()) {
        root.set("First", Object::Reference(nodes[first].id));
        root.set("Last", Object::Reference(nodes[last].id));
    }
    root.set("Count", Object::Integer(root_count));
    doc.objects.insert(root_id, Object::Dictionary(root));

    let catalog = doc
        .get_object_mut(catalog_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| PdfError::Parse(format!("cannot get document catalog: {}", e)))?;
    catalog.set("Outlines", Object::Reference(root_id));
    catalog.set("PageMode", Object::Name(b"UseOutlines".to_vec()));

    doc.prune_objects();
    log::info!("wrote {} outline items", items.len());
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
