//! The document facade.
//!
//! [`Document`] owns the text store, the line partition, the scratch segment pool, the syntax
//! state cache and the event registry, and serializes writers:
//!
//! - every edit runs inside an edit group holding the exclusive document lock; a group that fails
//!   is rolled back completely before the lock is released, so readers never observe a partial
//!   group. A guard veto fails the whole group even when the closure swallows the error;
//! - the segment pool and the syntax cache are invalidated inside the same critical section;
//! - events are delivered after the lock is released.
//!
//! Readers (queries, search, token requests) share the lock. Edit groups are not re-entrant: use
//! the [`DocumentEdit`] handle passed to [`Document::atomic`] instead of calling back into the
//! document from inside the closure.

use crate::config::DocumentConfig;
use crate::delta::{TextDelta, TextEdit};
use crate::error::{BufferError, Result};
use crate::events::{DocumentEvent, EditEvent, EventRegistry, Subscription};
use crate::line_tree::{LineAttributes, LineChange, LineTree};
use crate::mark::{Bias, MarkId, MarkSnapshot};
use crate::search::{self, Finder, SearchMatch};
use crate::segment::{SegmentPool, SegmentStats};
use crate::syntax::{CancelToken, RescanReport, Scanner, SyntaxStateCache};
use crate::text_store::TextStore;
use crate::token::TokenChain;
use parking_lot::{Mutex, RwLock, RwLockWriteGuard};
use std::ops::RangeInclusive;
use std::sync::{Arc, Weak};

/// The kind of primitive edit a guard is asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    /// Insertion of `len` characters at `offset`.
    Insert,
    /// Removal of `len` characters at `offset`.
    Remove,
}

/// A predicate that can veto an edit.
pub trait EditGuard: Send + Sync {
    /// Returns `true` to reject the edit.
    fn vetoes(&self, store: &TextStore, kind: EditKind, offset: usize, len: usize) -> bool;
}

impl<F> EditGuard for F
where
    F: Fn(&TextStore, EditKind, usize, usize) -> bool + Send + Sync,
{
    fn vetoes(&self, store: &TextStore, kind: EditKind, offset: usize, len: usize) -> bool {
        self(store, kind, offset, len)
    }
}

/// Identifier of a registered guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GuardId(u64);

enum Guard {
    /// Text between two marks that may not be modified. Inserting at either boundary is allowed.
    Block { start: MarkId, end: MarkId },
    Custom(Box<dyn EditGuard>),
}

impl Guard {
    fn vetoes(&self, store: &TextStore, kind: EditKind, offset: usize, len: usize) -> bool {
        match self {
            Guard::Block { start, end } => {
                let (Ok(start), Ok(end)) = (store.offset_of(*start), store.offset_of(*end)) else {
                    return false;
                };
                match kind {
                    EditKind::Insert => start < offset && offset < end,
                    EditKind::Remove => len > 0 && offset < end && offset + len > start,
                }
            }
            Guard::Custom(guard) => guard.vetoes(store, kind, offset, len),
        }
    }
}

struct Inner {
    store: TextStore,
    lines: LineTree,
    guards: Vec<(GuardId, Guard)>,
    next_guard: u64,
}

struct SyntaxState<S: Scanner> {
    scanner: S,
    cache: SyntaxStateCache<S::State>,
}

/// Tokens of a line range together with the rescan that produced them.
#[derive(Debug, Clone)]
pub struct Tokens<K> {
    /// The token chain. Empty when the rescan was cancelled.
    pub chain: TokenChain<K>,
    /// What the rescan did.
    pub report: RescanReport,
}

/// A primitive edit applied in the current group, with what is needed to undo it.
struct Applied {
    edit: TextEdit,
    marks: Vec<MarkSnapshot>,
}

/// A mark owned by the caller. Dropping the handle releases the mark.
///
/// A handle dropped while the document lock is held (for example inside [`Document::atomic`])
/// is queued and released by the next edit.
#[derive(Debug)]
pub struct MarkHandle {
    id: MarkId,
    owner: MarkOwner,
    armed: bool,
}

impl MarkHandle {
    /// The underlying mark id.
    pub fn id(&self) -> MarkId {
        self.id
    }

    /// Current offset of the mark. Fails once the mark was invalidated or the document dropped.
    ///
    /// Takes the document lock; inside an edit group use [`DocumentEdit::store`] instead.
    pub fn offset(&self) -> Result<usize> {
        let shared = self.owner.inner.upgrade().ok_or(BufferError::InvalidMark(self.id))?;
        shared.read().store.offset_of(self.id)
    }

    fn disarm(mut self) -> MarkId {
        self.armed = false;
        self.id
    }
}

impl Drop for MarkHandle {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Some(shared) = self.owner.inner.upgrade() else {
            return;
        };
        if let Some(mut inner) = shared.try_write() {
            inner.store.release_mark(self.id);
        } else if let Some(orphans) = self.owner.orphans.upgrade() {
            orphans.lock().push(self.id);
        }
    }
}

/// Back references a [`MarkHandle`] releases its mark through.
#[derive(Clone)]
struct MarkOwner {
    inner: Weak<RwLock<Inner>>,
    orphans: Weak<Mutex<Vec<MarkId>>>,
}

impl MarkOwner {
    fn adopt(&self, id: MarkId) -> MarkHandle {
        MarkHandle {
            id,
            owner: self.clone(),
            armed: true,
        }
    }
}

impl std::fmt::Debug for MarkOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkOwner").finish_non_exhaustive()
    }
}

/// A text document with marks, lines and incremental lexing.
pub struct Document<S: Scanner> {
    inner: Arc<RwLock<Inner>>,
    /// Marks whose handles were dropped while the lock was held.
    orphans: Arc<Mutex<Vec<MarkId>>>,
    syntax: Mutex<SyntaxState<S>>,
    segments: SegmentPool,
    events: EventRegistry,
    config: DocumentConfig,
}

impl<S: Scanner> Document<S> {
    /// Create a document holding `text`, lexed by `scanner`.
    pub fn new(text: &str, scanner: S) -> Self {
        Self::with_config(text, scanner, DocumentConfig::default())
    }

    /// Create a document using `config`.
    pub fn with_config(text: &str, scanner: S, config: DocumentConfig) -> Self {
        let mut store = TextStore::with_config(text, &config);
        let lines = LineTree::new(&mut store);
        let cache = SyntaxStateCache::new(scanner.initial_state(), lines.line_count());
        tracing::debug!(
            target: "editor_buffer::document",
            chars = store.len(),
            lines = lines.line_count(),
            "document.open"
        );

        Self {
            inner: Arc::new(RwLock::new(Inner {
                store,
                lines,
                guards: Vec::new(),
                next_guard: 0,
            })),
            orphans: Arc::new(Mutex::new(Vec::new())),
            syntax: Mutex::new(SyntaxState { scanner, cache }),
            segments: SegmentPool::new(config.segment_pool_capacity, config.segment_initial_capacity),
            events: EventRegistry::new(),
            config,
        }
    }

    /// The configuration the document was created with.
    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        let mut inner = self.inner.write();
        let orphans = std::mem::take(&mut *self.orphans.lock());
        if !orphans.is_empty() {
            tracing::trace!(target: "editor_buffer::document", count = orphans.len(), "document.release_orphans");
        }
        for id in orphans {
            inner.store.release_mark(id);
        }
        inner
    }

    fn mark_owner(&self) -> MarkOwner {
        MarkOwner {
            inner: Arc::downgrade(&self.inner),
            orphans: Arc::downgrade(&self.orphans),
        }
    }

    // ---------------------------------------------------------------- reads

    /// Run `f` with shared access to the store and the line partition.
    pub fn with<R>(&self, f: impl FnOnce(&TextStore, &LineTree) -> R) -> R {
        let inner = self.inner.read();
        f(&inner.store, &inner.lines)
    }

    /// Document length in characters.
    pub fn len(&self) -> usize {
        self.inner.read().store.len()
    }

    /// Returns `true` for an empty document.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of edits applied so far.
    pub fn edit_count(&self) -> u64 {
        self.inner.read().store.edit_count()
    }

    /// The whole document.
    pub fn text(&self) -> String {
        self.inner.read().store.full_text()
    }

    /// Text of `[pos, pos + len)`.
    pub fn text_range(&self, pos: usize, len: usize) -> Result<String> {
        self.inner.read().store.text(pos, len)
    }

    /// The character at `pos`.
    pub fn char_at(&self, pos: usize) -> Result<char> {
        self.inner.read().store.char_at(pos)
    }

    /// Number of lines.
    pub fn line_count(&self) -> usize {
        self.inner.read().lines.line_count()
    }

    /// Index of the line containing `offset`.
    pub fn line_at(&self, offset: usize) -> Result<usize> {
        let inner = self.inner.read();
        inner.lines.line_at(&inner.store, offset)
    }

    /// `(start, end)` of line `index`.
    pub fn line_range(&self, index: usize) -> Option<(usize, usize)> {
        let inner = self.inner.read();
        inner.lines.line_range(&inner.store, index)
    }

    /// Text of line `index`, including its newline.
    pub fn line_text(&self, index: usize) -> Option<String> {
        let inner = self.inner.read();
        let (start, end) = inner.lines.line_range(&inner.store, index)?;
        inner.store.text(start, end - start).ok()
    }

    /// Attributes of line `index`.
    pub fn line_attributes(&self, index: usize) -> Option<LineAttributes> {
        self.inner.read().lines.attributes(index).cloned()
    }

    /// Set an attribute on line `index`. Returns `false` if the line does not exist.
    pub fn set_line_attribute(&self, index: usize, key: &str, value: &str) -> bool {
        self.write().lines.set_attribute(index, key, value)
    }

    // ---------------------------------------------------------------- marks

    /// Register a mark at `pos` using the configured clamp policy.
    pub fn create_mark(&self, pos: usize, bias: Bias) -> Result<MarkHandle> {
        let id = self.write().store.create_mark(pos, bias)?;
        Ok(self.mark_owner().adopt(id))
    }

    /// Register a mark at `pos` with an explicit clamp policy.
    pub fn create_mark_with(&self, pos: usize, bias: Bias, clamp: bool) -> Result<MarkHandle> {
        let id = self.write().store.create_mark_with(pos, bias, clamp)?;
        Ok(self.mark_owner().adopt(id))
    }

    /// Current offset of `mark`, e.g. a line boundary.
    pub fn offset_of(&self, mark: MarkId) -> Result<usize> {
        self.inner.read().store.offset_of(mark)
    }

    /// Release `mark` now. Returns `false` if it was not registered with this document.
    pub fn release_mark(&self, mark: MarkHandle) -> bool {
        let id = mark.disarm();
        self.write().store.release_mark(id)
    }

    /// Number of registered marks, line boundaries included.
    pub fn mark_count(&self) -> usize {
        self.inner.read().store.mark_count()
    }

    // ---------------------------------------------------------------- guards

    /// Register a guard that can veto edits.
    pub fn add_guard(&self, guard: impl EditGuard + 'static) -> GuardId {
        let mut inner = self.write();
        inner.push_guard(Guard::Custom(Box::new(guard)))
    }

    /// Forbid modifications inside `[start, end)`. The block follows edits around it.
    pub fn guard_block(&self, start: usize, end: usize) -> Result<GuardId> {
        let mut inner = self.write();
        let doc_len = inner.store.len();
        if start > end || end > doc_len {
            return Err(BufferError::bad_offset(start, end.saturating_sub(start), doc_len));
        }
        let start = inner.store.create_mark_with(start, Bias::StayAfter, true)?;
        let end = inner.store.create_mark_with(end, Bias::StayBefore, true)?;
        Ok(inner.push_guard(Guard::Block { start, end }))
    }

    /// Remove a guard. Returns `false` if it was not registered.
    pub fn remove_guard(&self, id: GuardId) -> bool {
        let mut inner = self.write();
        let Some(idx) = inner.guards.iter().position(|(gid, _)| *gid == id) else {
            return false;
        };
        let (_, guard) = inner.guards.remove(idx);
        if let Guard::Block { start, end } = guard {
            inner.store.release_mark(start);
            inner.store.release_mark(end);
        }
        true
    }

    /// Whether `[pos, pos + len)` may be modified (an insertion point when `len` is zero).
    pub fn is_modifiable(&self, pos: usize, len: usize) -> bool {
        let inner = self.inner.read();
        let kind = if len == 0 {
            EditKind::Insert
        } else {
            EditKind::Remove
        };
        inner.vetoing_guard(kind, pos, len).is_none()
    }

    // ---------------------------------------------------------------- edits

    /// Insert `text` at `pos`.
    pub fn insert(&self, pos: usize, text: &str) -> Result<()> {
        self.run_group(false, |edit| edit.insert(pos, text))
    }

    /// Remove `len` characters at `pos`. Returns the removed text.
    pub fn remove(&self, pos: usize, len: usize) -> Result<String> {
        self.run_group(false, |edit| edit.remove(pos, len))
    }

    /// Replace `len` characters at `pos` with `text` as one all-or-nothing edit.
    pub fn replace(&self, pos: usize, len: usize, text: &str) -> Result<String> {
        self.run_group(false, |edit| edit.replace(pos, len, text))
    }

    /// Run several edits as one group. If `f` fails, or any of its edits was vetoed by a guard,
    /// every edit it made is rolled back and the error is returned. Subscribers see [`DocumentEvent::AtomicLock`] before and
    /// [`DocumentEvent::AtomicUnlock`] after the group.
    pub fn atomic<R>(&self, f: impl FnOnce(&mut DocumentEdit<'_, S>) -> Result<R>) -> Result<R> {
        self.run_group(true, f)
    }

    fn run_group<R>(
        &self,
        announce: bool,
        f: impl FnOnce(&mut DocumentEdit<'_, S>) -> Result<R>,
    ) -> Result<R> {
        if announce {
            self.events.fire(&[DocumentEvent::AtomicLock]);
        }

        let (result, event) = {
            let mut inner = self.write();
            let mut syntax = self.syntax.lock();
            let owner = self.mark_owner();
            let before_char_count = inner.store.len();
            let old_generation = inner.store.edit_count();
            let mut edit = DocumentEdit {
                inner: &mut inner,
                syntax: &mut syntax,
                segments: &self.segments,
                applied: Vec::new(),
                line_changes: Vec::new(),
                depth: 0,
                vetoed: None,
                owner,
            };

            let result = match (f(&mut edit), edit.vetoed.take()) {
                (Ok(_), Some(veto)) => Err(veto),
                (result, _) => result,
            };
            let event = match &result {
                Ok(_) if !edit.applied.is_empty() => {
                    let DocumentEdit {
                        applied,
                        line_changes,
                        ..
                    } = edit;
                    let after_char_count = inner.store.len();
                    let new_generation = inner.store.edit_count();
                    tracing::debug!(
                        target: "editor_buffer::document",
                        edits = applied.len(),
                        old_generation,
                        new_generation,
                        "document.commit"
                    );
                    Some(DocumentEvent::Edited(EditEvent {
                        old_generation,
                        new_generation,
                        delta: Arc::new(TextDelta {
                            before_char_count,
                            after_char_count,
                            edits: applied.into_iter().map(|a| a.edit).collect(),
                        }),
                        line_changes,
                    }))
                }
                Ok(_) => None,
                Err(err) => {
                    tracing::debug!(
                        target: "editor_buffer::document",
                        error = %err,
                        edits = edit.applied.len(),
                        "document.rollback"
                    );
                    if let Err(err) = edit.rollback_to(0) {
                        tracing::error!(target: "editor_buffer::document", %err, "document.rollback_failed");
                    }
                    None
                }
            };
            (result, event)
        };

        let mut events: Vec<DocumentEvent> = event.into_iter().collect();
        if announce {
            events.push(DocumentEvent::AtomicUnlock);
        }
        self.events.fire(&events);
        result
    }

    // ---------------------------------------------------------------- syntax

    /// Tokens of the lines in `lines`, rescanning incrementally.
    pub fn tokens(&self, lines: RangeInclusive<usize>, cancel: &CancelToken) -> Result<Tokens<S::Kind>> {
        let inner = self.inner.read();
        let mut syntax = self.syntax.lock();
        let SyntaxState { scanner, cache } = &mut *syntax;
        let rescan = cache.rescan(scanner, &inner.store, &inner.lines, &self.segments, lines, cancel)?;
        Ok(Tokens {
            chain: TokenChain::new(rescan.tokens, inner.store.edit_counter()),
            report: rescan.report,
        })
    }

    /// Tokens of the whole document.
    pub fn all_tokens(&self) -> Result<TokenChain<S::Kind>> {
        let last = self.line_count() - 1;
        self.tokens(0..=last, &CancelToken::new()).map(|t| t.chain)
    }

    /// Valid cached scanner state before `line`.
    pub fn state_before(&self, line: usize) -> Option<S::State> {
        self.syntax.lock().cache.state_before(line).cloned()
    }

    /// Number of leading lines whose cached state is valid.
    pub fn valid_syntax_lines(&self) -> usize {
        self.syntax.lock().cache.valid_lines()
    }

    /// Mark the cached states of `line` and later lines stale.
    pub fn invalidate_syntax_from(&self, line: usize) {
        self.syntax.lock().cache.invalidate_from_line(line);
    }

    /// Drop every cached scanner state, e.g. after the scanner configuration changed.
    pub fn invalidate_syntax(&self) {
        {
            let mut syntax = self.syntax.lock();
            let initial = syntax.scanner.initial_state();
            syntax.cache.invalidate_all(initial);
        }
        tracing::debug!(target: "editor_buffer::document", "document.syntax_invalidated");
        self.events.fire(&[DocumentEvent::SyntaxInvalidated]);
    }

    /// Reconfigure the scanner and drop every cached state.
    pub fn reconfigure_scanner(&self, f: impl FnOnce(&mut S)) {
        f(&mut self.syntax.lock().scanner);
        self.invalidate_syntax();
    }

    /// Scratch segment pool counters.
    pub fn segment_stats(&self) -> SegmentStats {
        self.segments.stats()
    }

    // ---------------------------------------------------------------- search

    /// Search from `start` towards `limit` (backward when `start > limit`).
    pub fn find(&self, finder: &mut (impl Finder + ?Sized), start: usize, limit: usize) -> Result<Option<SearchMatch>> {
        let inner = self.inner.read();
        search::find_in(&inner.store, finder, start, limit)
    }

    // ---------------------------------------------------------------- events

    /// Register an event callback.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&DocumentEvent) + Send + 'static,
    {
        self.events.subscribe(callback)
    }

    /// Remove an event callback.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        self.events.unsubscribe(subscription);
    }
}

impl Inner {
    fn push_guard(&mut self, guard: Guard) -> GuardId {
        let id = GuardId(self.next_guard);
        self.next_guard += 1;
        self.guards.push((id, guard));
        id
    }

    fn vetoing_guard(&self, kind: EditKind, offset: usize, len: usize) -> Option<GuardId> {
        self.guards
            .iter()
            .find(|(_, guard)| guard.vetoes(&self.store, kind, offset, len))
            .map(|(id, _)| *id)
    }
}

/// Write access to a document inside an edit group.
pub struct DocumentEdit<'a, S: Scanner> {
    inner: &'a mut Inner,
    syntax: &'a mut SyntaxState<S>,
    segments: &'a SegmentPool,
    applied: Vec<Applied>,
    line_changes: Vec<LineChange>,
    depth: usize,
    /// First guard veto of the group; it fails the group however the closure handles it.
    vetoed: Option<BufferError>,
    owner: MarkOwner,
}

impl<S: Scanner> DocumentEdit<'_, S> {
    /// The text store.
    pub fn store(&self) -> &TextStore {
        &self.inner.store
    }

    /// The line partition.
    pub fn lines(&self) -> &LineTree {
        &self.inner.lines
    }

    /// Document length in characters.
    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    /// Returns `true` for an empty document.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nesting depth of [`DocumentEdit::nested`] groups.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Register a mark at `pos`.
    pub fn create_mark(&mut self, pos: usize, bias: Bias) -> Result<MarkHandle> {
        let id = self.inner.store.create_mark(pos, bias)?;
        Ok(self.owner.adopt(id))
    }

    /// Insert `text` at `pos`.
    pub fn insert(&mut self, pos: usize, text: &str) -> Result<()> {
        let len = text.chars().count();
        if pos > self.len() {
            return Err(BufferError::bad_offset(pos, 0, self.len()));
        }
        if len == 0 {
            return Ok(());
        }
        if self.inner.vetoing_guard(EditKind::Insert, pos, len).is_some() {
            return Err(self.veto(pos, len));
        }

        self.apply_insert(pos, text)?;
        self.applied.push(Applied {
            edit: TextEdit::insertion(pos, text),
            marks: Vec::new(),
        });
        Ok(())
    }

    /// Remove `len` characters at `pos`. Returns the removed text.
    pub fn remove(&mut self, pos: usize, len: usize) -> Result<String> {
        if pos.checked_add(len).is_none_or(|end| end > self.len()) {
            return Err(BufferError::bad_offset(pos, len, self.len()));
        }
        if len == 0 {
            return Ok(String::new());
        }
        if self.inner.vetoing_guard(EditKind::Remove, pos, len).is_some() {
            return Err(self.veto(pos, len));
        }

        let (text, marks) = self.apply_remove(pos, len)?;
        self.applied.push(Applied {
            edit: TextEdit::removal(pos, text.clone()),
            marks,
        });
        Ok(text)
    }

    /// Replace `len` characters at `pos` with `text`. Either both halves apply or neither.
    pub fn replace(&mut self, pos: usize, len: usize, text: &str) -> Result<String> {
        self.nested(|edit| {
            let removed = edit.remove(pos, len)?;
            edit.insert(pos, text)?;
            Ok(removed)
        })
    }

    /// Run `f` as a nested group: if it fails, only its own edits are rolled back.
    ///
    /// A guard veto inside `f` still fails the enclosing group once it completes.
    pub fn nested<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let checkpoint = self.applied.len();
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        if result.is_err() {
            self.rollback_to(checkpoint)?;
        }
        result
    }

    fn veto(&mut self, offset: usize, len: usize) -> BufferError {
        let err = BufferError::GuardedRegion { offset, len };
        tracing::debug!(target: "editor_buffer::document", offset, len, "document.vetoed");
        self.vetoed.get_or_insert_with(|| err.clone());
        err
    }

    fn apply_insert(&mut self, pos: usize, text: &str) -> Result<()> {
        let inner = &mut *self.inner;
        inner.store.insert(pos, text)?;
        let change = inner.lines.on_insert(&mut inner.store, pos, text);
        self.after_edit(pos, change);
        Ok(())
    }

    fn apply_remove(&mut self, pos: usize, len: usize) -> Result<(String, Vec<MarkSnapshot>)> {
        let inner = &mut *self.inner;
        let removal = inner.store.remove_journaled(pos, len)?;
        let change = inner.lines.on_remove(&mut inner.store, pos, &removal.text);
        self.after_edit(pos, change);
        Ok((removal.text, removal.marks))
    }

    fn after_edit(&mut self, pos: usize, change: LineChange) {
        self.syntax.cache.apply_line_change(change);
        self.segments.invalidate_from(pos);
        self.line_changes.push(change);
    }

    /// Undo every edit applied after `checkpoint`, newest first.
    fn rollback_to(&mut self, checkpoint: usize) -> Result<()> {
        while self.applied.len() > checkpoint {
            let Some(Applied { edit, marks }) = self.applied.pop() else {
                break;
            };
            if !edit.inserted_text.is_empty() {
                self.apply_remove(edit.start, edit.inserted_len())?;
            }
            if !edit.removed_text.is_empty() {
                self.apply_insert(edit.start, &edit.removed_text)?;
                self.inner.store.restore_marks(&marks);
            }
        }
        self.line_changes.truncate(checkpoint);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::Scanned;

    /// One token per character; the state counts lines modulo two.
    struct CharScanner(bool);

    impl Scanner for CharScanner {
        type State = bool;
        type Kind = char;

        fn initial_state(&self) -> bool {
            false
        }

        fn load_state(&mut self, state: &bool) {
            self.0 = *state;
        }

        fn store_state(&self) -> bool {
            !self.0
        }

        fn next_token(&mut self, buffer: &[char], offset: usize, _last: bool) -> Scanned<char> {
            match buffer.get(offset) {
                Some(&c) => Scanned::Token { kind: c, len: 1 },
                None => Scanned::EndOfBuffer,
            }
        }
    }

    #[test]
    fn test_edit_keeps_lines_and_marks_in_sync() {
        let doc = Document::new("ab\ncd\nef", CharScanner(false));
        let mark = doc.create_mark(4, Bias::StayBefore).unwrap();

        doc.insert(1, "\n").unwrap();
        assert_eq!(doc.line_count(), 4);
        assert_eq!(doc.line_text(1).as_deref(), Some("b\n"));
        assert_eq!(mark.offset(), Ok(5));
        assert_eq!(doc.offset_of(mark.id()), Ok(5));
        assert_eq!(doc.edit_count(), 1);
    }

    #[test]
    fn test_failed_group_rolls_back() {
        let doc = Document::new("hello world", CharScanner(false));
        let mark = doc.create_mark(6, Bias::StayBefore).unwrap();

        let result: Result<()> = doc.atomic(|edit| {
            edit.remove(0, 6)?;
            edit.insert(0, "bye\n")?;
            Err(BufferError::bad_offset(99, 0, edit.len()))
        });
        assert!(result.is_err());
        assert_eq!(doc.text(), "hello world");
        assert_eq!(doc.line_count(), 1);
        assert_eq!(mark.offset(), Ok(6));
    }

    #[test]
    fn test_nested_group_rolls_back_alone() {
        let doc = Document::new("abc", CharScanner(false));
        doc.atomic(|edit| {
            edit.insert(3, "d")?;
            let inner: Result<()> = edit.nested(|edit| {
                edit.insert(0, "X")?;
                Err(BufferError::bad_offset(9, 0, 0))
            });
            assert!(inner.is_err());
            Ok(())
        })
        .unwrap();
        assert_eq!(doc.text(), "abcd");
    }

    #[test]
    fn test_block_guard() {
        let doc = Document::new("0123456789", CharScanner(false));
        let guard = doc.guard_block(3, 6).unwrap();

        assert!(doc.is_modifiable(3, 0));
        assert!(!doc.is_modifiable(4, 0));
        assert!(!doc.is_modifiable(5, 2));
        assert_eq!(
            doc.remove(2, 2),
            Err(BufferError::GuardedRegion { offset: 2, len: 2 })
        );

        doc.insert(0, "xx").unwrap();
        assert!(!doc.is_modifiable(6, 1));
        assert!(doc.is_modifiable(8, 1));

        assert!(doc.remove_guard(guard));
        assert!(doc.is_modifiable(6, 1));
    }

    #[test]
    fn test_replace_is_all_or_nothing() {
        let doc = Document::new("abcdef", CharScanner(false));
        doc.add_guard(|_: &TextStore, kind: EditKind, _: usize, _: usize| kind == EditKind::Insert);
        assert!(doc.replace(1, 2, "XY").is_err());
        assert_eq!(doc.text(), "abcdef");
    }

    #[test]
    fn test_dropped_mark_handles_release_their_marks() {
        let doc = Document::new("0123456789", CharScanner(false));
        let baseline = doc.mark_count();

        let marks: Vec<MarkHandle> = (0..1000)
            .map(|i| doc.create_mark(i % 10, Bias::StayBefore).unwrap())
            .collect();
        assert_eq!(doc.mark_count(), baseline + 1000);
        drop(marks);
        assert_eq!(doc.mark_count(), baseline);

        let kept = doc.create_mark(5, Bias::StayBefore).unwrap();
        let id = kept.id();
        assert!(doc.release_mark(kept));
        assert_eq!(doc.offset_of(id), Err(BufferError::InvalidMark(id)));
        assert_eq!(doc.mark_count(), baseline);
    }

    #[test]
    fn test_handle_dropped_inside_group_is_released_by_next_edit() {
        let doc = Document::new("abc", CharScanner(false));
        let baseline = doc.mark_count();

        doc.atomic(|edit| {
            let scratch = edit.create_mark(1, Bias::StayBefore)?;
            edit.insert(0, "x")?;
            assert_eq!(edit.store().offset_of(scratch.id()), Ok(2));
            Ok(())
        })
        .unwrap();
        assert_eq!(doc.mark_count(), baseline + 1);

        doc.insert(0, "y").unwrap();
        assert_eq!(doc.mark_count(), baseline);
    }

    #[test]
    fn test_handle_outliving_document() {
        let doc = Document::new("abc", CharScanner(false));
        let mark = doc.create_mark(1, Bias::StayBefore).unwrap();
        let id = mark.id();
        drop(doc);
        assert_eq!(mark.offset(), Err(BufferError::InvalidMark(id)));
    }
}
