//! Line partition over boundary marks.
//!
//! Line `i` spans `[boundary(i), boundary(i + 1))`, so adjacent lines share one mark and the
//! partition can never have gaps or overlaps. Lines include their trailing `'\n'`; a document
//! ending in a newline (and the empty document) has an empty last line at the document end.
//!
//! Line start marks use [`Bias::StayBefore`] and clamp, so text inserted at a line start belongs to
//! that line and a removed newline leaves its boundary at the removal point until
//! [`LineTree::on_remove`] releases it. The document end mark uses [`Bias::StayAfter`].

use crate::error::{BufferError, Result};
use crate::mark::{Bias, MarkId};
use crate::text_store::TextStore;
use std::collections::BTreeMap;

/// Free-form per-line attributes. They follow the line through edits; when lines merge, the
/// surviving line keeps its own values and gains the keys it did not have.
pub type LineAttributes = BTreeMap<String, String>;

/// How an edit changed the line partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineChange {
    /// The line the edit happened on (after the edit).
    pub line: usize,
    /// Lines merged into `line` (removed newlines).
    pub removed: usize,
    /// Lines split off after `line` (inserted newlines).
    pub inserted: usize,
}

/// Ordered partition of the document into lines.
#[derive(Debug, Clone)]
pub struct LineTree {
    /// `boundaries[i]` starts line `i`; the last entry marks the document end.
    boundaries: Vec<MarkId>,
    attributes: Vec<Option<LineAttributes>>,
}

impl LineTree {
    /// Build the partition for the current content of `store`.
    pub fn new(store: &mut TextStore) -> Self {
        let text = store.full_text();
        let mut boundaries = vec![store.create_mark_unchecked(0, Bias::StayBefore, true)];
        for (idx, ch) in text.chars().enumerate() {
            if ch == '\n' {
                boundaries.push(store.create_mark_unchecked(idx + 1, Bias::StayBefore, true));
            }
        }
        boundaries.push(store.create_mark_unchecked(store.len(), Bias::StayAfter, true));

        let attributes = vec![None; boundaries.len() - 1];
        Self {
            boundaries,
            attributes,
        }
    }

    /// Number of lines. Never zero.
    pub fn line_count(&self) -> usize {
        self.boundaries.len() - 1
    }

    /// Index of the line containing `offset`. The document end belongs to the last line.
    pub fn line_at(&self, store: &TextStore, offset: usize) -> Result<usize> {
        if offset > store.len() {
            return Err(BufferError::bad_offset(offset, 0, store.len()));
        }
        Ok(self.containing_line(store, offset))
    }

    /// `(start, end)` offsets of line `index`, end exclusive and including the newline.
    pub fn line_range(&self, store: &TextStore, index: usize) -> Option<(usize, usize)> {
        (index < self.line_count())
            .then(|| (boundary(store, self.boundaries[index]), boundary(store, self.boundaries[index + 1])))
    }

    /// Start offset of line `index`.
    pub fn line_start(&self, store: &TextStore, index: usize) -> Option<usize> {
        self.line_range(store, index).map(|(start, _)| start)
    }

    /// Mark delimiting the start of line `index`.
    pub fn start_mark(&self, index: usize) -> Option<MarkId> {
        (index < self.line_count()).then(|| self.boundaries[index])
    }

    /// Mark delimiting the end of line `index` (the next line's start mark).
    pub fn end_mark(&self, index: usize) -> Option<MarkId> {
        (index < self.line_count()).then(|| self.boundaries[index + 1])
    }

    /// Attributes of line `index`, if any were set.
    pub fn attributes(&self, index: usize) -> Option<&LineAttributes> {
        self.attributes.get(index)?.as_ref()
    }

    /// Set an attribute on line `index`. Returns `false` if the line does not exist.
    pub fn set_attribute(&mut self, index: usize, key: impl Into<String>, value: impl Into<String>) -> bool {
        let Some(slot) = self.attributes.get_mut(index) else {
            return false;
        };
        slot.get_or_insert_with(LineAttributes::new)
            .insert(key.into(), value.into());
        true
    }

    /// Root of the element view.
    pub fn root<'a>(&'a self, store: &'a TextStore) -> Element<'a> {
        Element::Branch(BranchElement { tree: self, store })
    }

    /// Update the partition after `text` was inserted at `pos`. Marks are already adjusted.
    pub(crate) fn on_insert(&mut self, store: &mut TextStore, pos: usize, text: &str) -> LineChange {
        let line = self.containing_line(store, pos);
        let mut created = Vec::new();
        for (idx, ch) in text.chars().enumerate() {
            if ch == '\n' {
                created.push(store.create_mark_unchecked(pos + idx + 1, Bias::StayBefore, true));
            }
        }

        let inserted = created.len();
        if inserted > 0 {
            self.boundaries.splice(line + 1..line + 1, created);
            self.attributes
                .splice(line + 1..line + 1, std::iter::repeat_n(None, inserted));
        }

        tracing::trace!(target: "editor_buffer::lines", pos, line, inserted, "lines.insert");
        LineChange {
            line,
            removed: 0,
            inserted,
        }
    }

    /// Update the partition after `removed` was removed at `pos`. Marks are already adjusted, so
    /// the start marks of the merged lines now sit at `pos`, after any line that already started
    /// there.
    pub(crate) fn on_remove(&mut self, store: &mut TextStore, pos: usize, removed: &str) -> LineChange {
        let newlines = removed.chars().filter(|&c| c == '\n').count();
        let starts = self.line_count();
        let lo = self.boundaries[..starts].partition_point(|&m| boundary(store, m) < pos);
        let hi = lo + self.boundaries[lo..starts].partition_point(|&m| boundary(store, m) <= pos);
        debug_assert!(hi - lo == newlines || hi - lo == newlines + 1);

        let first = hi - newlines.min(hi - lo);
        let line = first.saturating_sub(1);
        for mark in self.boundaries.drain(first..hi) {
            store.release_mark(mark);
        }

        let merged: Vec<LineAttributes> = self.attributes.drain(first..hi).flatten().collect();
        if !merged.is_empty() {
            let target = self.attributes[line].get_or_insert_with(LineAttributes::new);
            for attrs in merged {
                for (key, value) in attrs {
                    target.entry(key).or_insert(value);
                }
            }
        }

        tracing::trace!(target: "editor_buffer::lines", pos, line, removed = hi - first, "lines.remove");
        LineChange {
            line,
            removed: hi - first,
            inserted: 0,
        }
    }

    fn containing_line(&self, store: &TextStore, offset: usize) -> usize {
        self.boundaries[..self.line_count()]
            .partition_point(|&m| boundary(store, m) <= offset)
            .saturating_sub(1)
    }
}

/// Offset of a boundary mark. Boundary marks clamp and are released only by the tree, so they
/// are always valid.
fn boundary(store: &TextStore, mark: MarkId) -> usize {
    let offset = store.offset_of(mark);
    debug_assert!(offset.is_ok(), "line boundary lost: {mark:?}");
    offset.unwrap_or_default()
}

/// Read-only view of the line partition as an element hierarchy.
#[derive(Debug, Clone, Copy)]
pub enum Element<'a> {
    /// The root, whose children are the lines.
    Branch(BranchElement<'a>),
    /// A single line.
    Line(LineElement<'a>),
}

/// The root element.
#[derive(Debug, Clone, Copy)]
pub struct BranchElement<'a> {
    tree: &'a LineTree,
    store: &'a TextStore,
}

/// One line element.
#[derive(Debug, Clone, Copy)]
pub struct LineElement<'a> {
    tree: &'a LineTree,
    store: &'a TextStore,
    index: usize,
}

impl<'a> LineElement<'a> {
    /// Line index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Start mark of the line.
    pub fn start_mark(&self) -> MarkId {
        self.tree.boundaries[self.index]
    }

    /// End mark of the line.
    pub fn end_mark(&self) -> MarkId {
        self.tree.boundaries[self.index + 1]
    }
}

impl<'a> Element<'a> {
    /// Element name: `"root"` or `"line"`.
    pub fn name(&self) -> &'static str {
        match self {
            Element::Branch(_) => "root",
            Element::Line(_) => "line",
        }
    }

    /// Start offset of the element.
    pub fn start_offset(&self) -> usize {
        match self {
            Element::Branch(_) => 0,
            Element::Line(line) => boundary(line.store, line.start_mark()),
        }
    }

    /// End offset of the element (exclusive).
    pub fn end_offset(&self) -> usize {
        match self {
            Element::Branch(branch) => branch.store.len(),
            Element::Line(line) => boundary(line.store, line.end_mark()),
        }
    }

    /// Number of child elements.
    pub fn element_count(&self) -> usize {
        match self {
            Element::Branch(branch) => branch.tree.line_count(),
            Element::Line(_) => 0,
        }
    }

    /// Child element `index`.
    pub fn element(&self, index: usize) -> Option<Element<'a>> {
        match self {
            Element::Branch(branch) if index < branch.tree.line_count() => {
                Some(Element::Line(LineElement {
                    tree: branch.tree,
                    store: branch.store,
                    index,
                }))
            }
            _ => None,
        }
    }

    /// Index of the child containing `offset`.
    pub fn element_index(&self, offset: usize) -> Option<usize> {
        match self {
            Element::Branch(branch) => branch.tree.line_at(branch.store, offset).ok(),
            Element::Line(_) => None,
        }
    }

    /// Attributes of a line element.
    pub fn attributes(&self) -> Option<&'a LineAttributes> {
        match self {
            Element::Branch(_) => None,
            Element::Line(line) => line.tree.attributes(line.index),
        }
    }

    /// Returns `true` for elements without children.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Element::Line(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(tree: &LineTree, store: &TextStore) -> Vec<String> {
        (0..tree.line_count())
            .map(|i| {
                let (start, end) = tree.line_range(store, i).unwrap();
                store.text(start, end - start).unwrap()
            })
            .collect()
    }

    fn insert(tree: &mut LineTree, store: &mut TextStore, pos: usize, text: &str) -> LineChange {
        store.insert(pos, text).unwrap();
        tree.on_insert(store, pos, text)
    }

    fn remove(tree: &mut LineTree, store: &mut TextStore, pos: usize, len: usize) -> LineChange {
        let removed = store.remove(pos, len).unwrap();
        tree.on_remove(store, pos, &removed)
    }

    #[test]
    fn test_build() {
        let mut store = TextStore::new("ab\ncd\n");
        let tree = LineTree::new(&mut store);
        assert_eq!(lines(&tree, &store), ["ab\n", "cd\n", ""]);

        let mut empty = TextStore::new("");
        let tree = LineTree::new(&mut empty);
        assert_eq!(tree.line_count(), 1);
        assert_eq!(tree.line_range(&empty, 0), Some((0, 0)));
    }

    #[test]
    fn test_split_line() {
        let mut store = TextStore::new("ab\ncd\nef");
        let mut tree = LineTree::new(&mut store);

        let change = insert(&mut tree, &mut store, 1, "\n");
        assert_eq!(change, LineChange { line: 0, removed: 0, inserted: 1 });
        assert_eq!(lines(&tree, &store), ["a\n", "b\n", "cd\n", "ef"]);
    }

    #[test]
    fn test_newline_at_boundary_creates_empty_line() {
        let mut store = TextStore::new("ab\ncd");
        let mut tree = LineTree::new(&mut store);

        insert(&mut tree, &mut store, 3, "\n");
        assert_eq!(lines(&tree, &store), ["ab\n", "\n", "cd"]);

        insert(&mut tree, &mut store, 6, "\n");
        assert_eq!(lines(&tree, &store), ["ab\n", "\n", "cd\n", ""]);
    }

    #[test]
    fn test_merge_lines() {
        let mut store = TextStore::new("a\nb\nc\nd");
        let mut tree = LineTree::new(&mut store);

        let change = remove(&mut tree, &mut store, 1, 4);
        assert_eq!(change, LineChange { line: 0, removed: 2, inserted: 0 });
        assert_eq!(lines(&tree, &store), ["a\n", "d"]);
        assert_eq!(store.mark_count(), 3);
    }

    #[test]
    fn test_remove_from_line_start() {
        let mut store = TextStore::new("ab\ncd\nef");
        let mut tree = LineTree::new(&mut store);

        let change = remove(&mut tree, &mut store, 3, 3);
        assert_eq!(change, LineChange { line: 1, removed: 1, inserted: 0 });
        assert_eq!(lines(&tree, &store), ["ab\n", "ef"]);
    }

    #[test]
    fn test_remove_trailing_newline() {
        let mut store = TextStore::new("ab\n");
        let mut tree = LineTree::new(&mut store);

        remove(&mut tree, &mut store, 2, 1);
        assert_eq!(lines(&tree, &store), ["ab"]);
        remove(&mut tree, &mut store, 0, 2);
        assert_eq!(lines(&tree, &store), [""]);
    }

    #[test]
    fn test_line_at() {
        let mut store = TextStore::new("ab\ncd\n");
        let tree = LineTree::new(&mut store);
        assert_eq!(tree.line_at(&store, 0), Ok(0));
        assert_eq!(tree.line_at(&store, 2), Ok(0));
        assert_eq!(tree.line_at(&store, 3), Ok(1));
        assert_eq!(tree.line_at(&store, 6), Ok(2));
        assert!(tree.line_at(&store, 7).is_err());
    }

    #[test]
    fn test_attributes_survive_merge() {
        let mut store = TextStore::new("a\nb\nc");
        let mut tree = LineTree::new(&mut store);
        assert!(tree.set_attribute(0, "fold", "open"));
        assert!(tree.set_attribute(1, "fold", "closed"));
        assert!(tree.set_attribute(1, "breakpoint", "yes"));
        assert!(!tree.set_attribute(5, "x", "y"));

        remove(&mut tree, &mut store, 1, 2);
        let attrs = tree.attributes(0).unwrap();
        assert_eq!(attrs.get("fold").map(String::as_str), Some("open"));
        assert_eq!(attrs.get("breakpoint").map(String::as_str), Some("yes"));
        assert!(tree.attributes(1).is_none());
    }

    #[test]
    fn test_element_view() {
        let mut store = TextStore::new("ab\ncd");
        let tree = LineTree::new(&mut store);
        let root = tree.root(&store);

        assert_eq!(root.name(), "root");
        assert_eq!(root.element_count(), 2);
        assert_eq!((root.start_offset(), root.end_offset()), (0, 5));

        let second = root.element(1).unwrap();
        assert!(second.is_leaf());
        assert_eq!((second.start_offset(), second.end_offset()), (3, 5));
        assert_eq!(root.element_index(4), Some(1));
        assert!(root.element(2).is_none());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "line boundary lost")]
    fn test_lost_boundary_is_caught() {
        let mut store = TextStore::new("a\nb\nc");
        let tree = LineTree::new(&mut store);
        store.release_mark(tree.start_mark(1).unwrap());
        let _ = tree.line_range(&store, 1);
    }
}
