//! Structured text change deltas.
//!
//! Every committed edit group is reported as a [`TextDelta`]: the ordered list of primitive edits
//! that turns the "before" document into the "after" document. Offsets are character offsets.

/// A single primitive edit.
///
/// - `start` is a character offset in the document **at the time this edit is applied**.
/// - The removed range is defined by the length (in `char`s) of `removed_text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    /// Start character offset of the edit.
    pub start: usize,
    /// Exact removed text (may be empty).
    pub removed_text: String,
    /// Exact inserted text (may be empty).
    pub inserted_text: String,
}

impl TextEdit {
    pub(crate) fn insertion(start: usize, text: &str) -> Self {
        Self {
            start,
            removed_text: String::new(),
            inserted_text: text.to_owned(),
        }
    }

    pub(crate) fn removal(start: usize, text: String) -> Self {
        Self {
            start,
            removed_text: text,
            inserted_text: String::new(),
        }
    }

    /// Length of `removed_text` in characters.
    pub fn removed_len(&self) -> usize {
        self.removed_text.chars().count()
    }

    /// Length of `inserted_text` in characters.
    pub fn inserted_len(&self) -> usize {
        self.inserted_text.chars().count()
    }

    /// Exclusive end character offset in the pre-edit document.
    pub fn end(&self) -> usize {
        self.start.saturating_add(self.removed_len())
    }

    /// The edit that undoes this one.
    pub fn inverse(&self) -> Self {
        Self {
            start: self.start,
            removed_text: self.inserted_text.clone(),
            inserted_text: self.removed_text.clone(),
        }
    }
}

/// A structured description of a committed edit group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDelta {
    /// Character count before applying `edits`.
    pub before_char_count: usize,
    /// Character count after applying `edits`.
    pub after_char_count: usize,
    /// Ordered list of edits.
    pub edits: Vec<TextEdit>,
}

impl TextDelta {
    /// Returns `true` if this delta contains no edits.
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Apply the delta to `text`, which must be the "before" document.
    pub fn apply(&self, text: &str) -> String {
        let mut chars: Vec<char> = text.chars().collect();
        for edit in &self.edits {
            let start = edit.start.min(chars.len());
            let end = edit.end().min(chars.len());
            chars.splice(start..end, edit.inserted_text.chars());
        }
        chars.into_iter().collect()
    }
}
