//! The text store: document characters plus the mark registry.
//!
//! [`TextStore`] is the only component that mutates content. Every successful edit adjusts all
//! marks in the same call and advances the [`EditCounter`], so a reader can never observe text
//! and marks that disagree.

use crate::config::DocumentConfig;
use crate::error::{BufferError, Result};
use crate::mark::{Bias, MarkId, MarkRegistry, MarkSnapshot};
use crate::storage::PieceTable;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A read-only source of characters addressed by offset.
pub trait CharSource {
    /// Total number of characters.
    fn len_chars(&self) -> usize;

    /// Append the characters of `[pos, pos + len)` to `out`, clamped to the source length.
    fn read_chars(&self, pos: usize, len: usize, out: &mut Vec<char>);
}

/// Monotonically increasing counter of applied edits.
///
/// Cloning shares the counter; token chains keep a clone to detect that they went stale.
#[derive(Debug, Clone, Default)]
pub struct EditCounter(Arc<AtomicU64>);

impl EditCounter {
    /// Current value.
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// Text removed by [`TextStore::remove_journaled`], with what is needed to undo it.
#[derive(Debug, Clone)]
pub(crate) struct Removal {
    pub(crate) text: String,
    pub(crate) marks: Vec<MarkSnapshot>,
}

/// Offset-addressed character storage with a mark registry.
#[derive(Debug)]
pub struct TextStore {
    content: PieceTable,
    marks: MarkRegistry,
    counter: EditCounter,
    clamp_marks: bool,
}

impl TextStore {
    /// Create a store holding `text`.
    pub fn new(text: &str) -> Self {
        Self::with_config(text, &DocumentConfig::default())
    }

    /// Create a store holding `text` using `config`.
    pub fn with_config(text: &str, config: &DocumentConfig) -> Self {
        let mut content = PieceTable::new(text);
        content.set_gc_threshold(config.gc_threshold);
        Self {
            content,
            marks: MarkRegistry::new(),
            counter: EditCounter::default(),
            clamp_marks: config.clamp_marks,
        }
    }

    /// Document length in characters.
    pub fn len(&self) -> usize {
        self.content.char_count()
    }

    /// Returns `true` for an empty document.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of edits applied so far.
    pub fn edit_count(&self) -> u64 {
        self.counter.current()
    }

    /// A shared handle on the edit counter.
    pub fn edit_counter(&self) -> EditCounter {
        self.counter.clone()
    }

    /// Characters of `[pos, pos + len)`.
    pub fn read(&self, pos: usize, len: usize) -> Result<Vec<char>> {
        let mut out = Vec::with_capacity(len);
        self.read_into(pos, len, &mut out)?;
        Ok(out)
    }

    /// Append the characters of `[pos, pos + len)` to `out`.
    pub fn read_into(&self, pos: usize, len: usize, out: &mut Vec<char>) -> Result<()> {
        self.check_range(pos, len)?;
        self.content.read_into(pos, len, out);
        Ok(())
    }

    /// Text of `[pos, pos + len)`.
    pub fn text(&self, pos: usize, len: usize) -> Result<String> {
        self.check_range(pos, len)?;
        Ok(self.content.get_range(pos, len))
    }

    /// The character at `pos`.
    pub fn char_at(&self, pos: usize) -> Result<char> {
        self.read(pos, 1)?
            .first()
            .copied()
            .ok_or_else(|| BufferError::bad_offset(pos, 1, self.len()))
    }

    /// The whole document.
    pub fn full_text(&self) -> String {
        self.content.get_text()
    }

    /// Insert `text` at `pos`, shifting marks.
    pub fn insert(&mut self, pos: usize, text: &str) -> Result<()> {
        if pos > self.len() {
            return Err(BufferError::bad_offset(pos, 0, self.len()));
        }
        if text.is_empty() {
            return Ok(());
        }
        let len = text.chars().count();
        self.content.insert(pos, text);
        self.marks.insert_update(pos, len);
        self.counter.advance();
        Ok(())
    }

    /// Remove `len` characters at `pos`, shifting or invalidating marks. Returns the removed text.
    pub fn remove(&mut self, pos: usize, len: usize) -> Result<String> {
        self.remove_journaled(pos, len).map(|removal| removal.text)
    }

    pub(crate) fn remove_journaled(&mut self, pos: usize, len: usize) -> Result<Removal> {
        self.check_range(pos, len)?;
        if len == 0 {
            return Ok(Removal {
                text: String::new(),
                marks: Vec::new(),
            });
        }
        let text = self.content.get_range(pos, len);
        self.content.delete(pos, len);
        let marks = self.marks.remove_update(pos, len);
        self.counter.advance();
        Ok(Removal { text, marks })
    }

    pub(crate) fn restore_marks(&mut self, snapshots: &[MarkSnapshot]) {
        self.marks.restore(snapshots);
    }

    /// Register a mark at `pos`. Whether it clamps on removal follows the store configuration.
    pub fn create_mark(&mut self, pos: usize, bias: Bias) -> Result<MarkId> {
        self.create_mark_with(pos, bias, self.clamp_marks)
    }

    /// Register a mark at `pos` with an explicit clamp policy.
    pub fn create_mark_with(&mut self, pos: usize, bias: Bias, clamp: bool) -> Result<MarkId> {
        if pos > self.len() {
            return Err(BufferError::bad_offset(pos, 0, self.len()));
        }
        Ok(self.marks.create(pos, bias, clamp))
    }

    /// Register a mark the caller knows to be in range.
    pub(crate) fn create_mark_unchecked(&mut self, pos: usize, bias: Bias, clamp: bool) -> MarkId {
        debug_assert!(pos <= self.len());
        self.marks.create(pos, bias, clamp)
    }

    /// Current offset of `mark`.
    pub fn offset_of(&self, mark: MarkId) -> Result<usize> {
        self.marks.offset(mark)
    }

    /// Bias of a live mark (valid or invalidated).
    pub fn mark_bias(&self, mark: MarkId) -> Result<Bias> {
        self.marks.bias(mark)
    }

    /// Whether `mark` is live and still refers to text.
    pub fn is_mark_valid(&self, mark: MarkId) -> bool {
        self.marks.is_valid(mark)
    }

    /// Release `mark`. Returns `false` if it had already been released.
    pub fn release_mark(&mut self, mark: MarkId) -> bool {
        self.marks.release(mark)
    }

    /// Number of registered marks, invalidated ones included.
    pub fn mark_count(&self) -> usize {
        self.marks.len()
    }

    fn check_range(&self, pos: usize, len: usize) -> Result<()> {
        match pos.checked_add(len) {
            Some(end) if end <= self.len() => Ok(()),
            _ => Err(BufferError::bad_offset(pos, len, self.len())),
        }
    }
}

impl CharSource for TextStore {
    fn len_chars(&self) -> usize {
        self.len()
    }

    fn read_chars(&self, pos: usize, len: usize, out: &mut Vec<char>) {
        self.content.read_into(pos, len, out);
    }
}
