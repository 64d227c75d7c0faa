//! Piece table holding the document characters.
//!
//! All offsets are character offsets (Unicode scalar values). The text a document was opened with
//! stays in a read-only original buffer; inserted text is appended to an add buffer and
//! referenced by pieces. Removing text only rewrites the piece list.
//!
//! Both buffers keep a sparse char-to-byte index (one checkpoint every [`CHECKPOINT_STRIDE`]
//! characters) and the piece list keeps the document offset of every piece, so reading `len`
//! characters anywhere costs `O(log pieces + CHECKPOINT_STRIDE + len)`.

/// Characters between two char-to-byte checkpoints.
const CHECKPOINT_STRIDE: usize = 128;

/// Which buffer a [`Piece`] points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Original,
    Added,
}

/// Append-only text with a sparse char-to-byte index.
#[derive(Debug, Clone, Default)]
struct Buffer {
    text: String,
    /// Byte offset of every `CHECKPOINT_STRIDE`-th character.
    checkpoints: Vec<usize>,
    char_len: usize,
}

impl Buffer {
    fn push_str(&mut self, text: &str) {
        let base = self.text.len();
        for (byte, _) in text.char_indices() {
            if self.char_len % CHECKPOINT_STRIDE == 0 {
                self.checkpoints.push(base + byte);
            }
            self.char_len += 1;
        }
        self.text.push_str(text);
    }

    /// Byte offset of character `at`; `char_len` maps to the end of the text.
    fn byte_of(&self, at: usize) -> usize {
        let block = at / CHECKPOINT_STRIDE;
        let Some(&base) = self.checkpoints.get(block) else {
            return self.text.len();
        };
        self.text[base..]
            .char_indices()
            .nth(at - block * CHECKPOINT_STRIDE)
            .map_or(self.text.len(), |(b, _)| base + b)
    }

    /// Text of the characters `[start, start + len)`.
    fn slice(&self, start: usize, len: usize) -> &str {
        &self.text[self.byte_of(start)..self.byte_of(start + len)]
    }
}

/// A run of characters in one of the two buffers.
#[derive(Debug, Clone)]
struct Piece {
    source: Source,
    /// Char offset of the run in its buffer.
    start: usize,
    len: usize,
}

impl Piece {
    fn new(source: Source, start: usize, len: usize) -> Self {
        Self { source, start, len }
    }

    fn end(&self) -> usize {
        self.start + self.len
    }

    /// The two halves of the run around char `at`.
    fn split(&self, at: usize) -> (Piece, Piece) {
        (
            Piece::new(self.source, self.start, at),
            Piece::new(self.source, self.start + at, self.len - at),
        )
    }
}

/// Piece table storage.
///
/// Callers are expected to validate offsets; out-of-range requests are clamped.
#[derive(Debug, Clone)]
pub struct PieceTable {
    original: Buffer,
    added: Buffer,
    pieces: Vec<Piece>,
    /// Document offset of each piece, parallel to `pieces`.
    starts: Vec<usize>,
    char_len: usize,
    ops_since_gc: usize,
    gc_threshold: usize,
}

impl PieceTable {
    /// Create a piece table holding `text`.
    pub fn new(text: &str) -> Self {
        let mut original = Buffer::default();
        original.push_str(text);
        let char_len = original.char_len;
        let pieces = if text.is_empty() {
            Vec::new()
        } else {
            vec![Piece::new(Source::Original, 0, char_len)]
        };

        let mut table = Self {
            original,
            added: Buffer::default(),
            pieces,
            starts: Vec::new(),
            char_len,
            ops_since_gc: 0,
            gc_threshold: 1000,
        };
        table.reindex();
        table
    }

    /// Create an empty piece table.
    pub fn empty() -> Self {
        Self::new("")
    }

    /// Total number of characters.
    pub fn char_count(&self) -> usize {
        self.char_len
    }

    /// Total number of UTF-8 bytes.
    pub fn byte_count(&self) -> usize {
        self.pieces.iter().map(|p| self.piece_text(p).len()).sum()
    }

    /// Size of the add buffer in bytes.
    pub fn add_buffer_size(&self) -> usize {
        self.added.text.len()
    }

    /// Set the number of operations between add-buffer compactions.
    pub fn set_gc_threshold(&mut self, threshold: usize) {
        self.gc_threshold = threshold.max(1);
    }

    /// Insert `text` at character `offset`.
    pub fn insert(&mut self, offset: usize, text: &str) {
        if text.is_empty() {
            return;
        }

        let offset = offset.min(self.char_len);
        let start = self.added.char_len;
        self.added.push_str(text);
        let piece = Piece::new(Source::Added, start, self.added.char_len - start);
        self.char_len += piece.len;

        match self.locate(offset) {
            None => self.pieces.push(piece),
            Some((idx, 0)) => self.pieces.insert(idx, piece),
            Some((idx, within)) if within == self.pieces[idx].len => {
                self.pieces.insert(idx + 1, piece)
            }
            Some((idx, within)) => {
                let (left, right) = self.pieces[idx].split(within);
                self.pieces.splice(idx..=idx, [left, piece, right]);
            }
        }

        self.coalesce();
        self.reindex();
        self.count_op();
    }

    /// Remove `len` characters starting at `start`.
    pub fn delete(&mut self, start: usize, len: usize) {
        let end = start.saturating_add(len).min(self.char_len);
        if start >= end {
            return;
        }

        let first = self.piece_index(start);
        let mut replacement = Vec::with_capacity(2);
        let mut last = first;
        for idx in first..self.pieces.len() {
            let (piece_start, piece) = (self.starts[idx], &self.pieces[idx]);
            if piece_start >= end {
                break;
            }
            last = idx;
            if piece_start < start {
                replacement.push(piece.split(start - piece_start).0);
            }
            if piece_start + piece.len > end {
                replacement.push(piece.split(end - piece_start).1);
            }
        }

        self.pieces.splice(first..=last, replacement);
        self.char_len -= end - start;
        self.reindex();
        self.count_op();
    }

    /// Append `len` characters starting at `start` to `out`.
    pub fn read_into(&self, start: usize, len: usize, out: &mut Vec<char>) {
        let end = start.saturating_add(len).min(self.char_len);
        if start >= end {
            return;
        }
        out.reserve(end - start);

        for idx in self.piece_index(start)..self.pieces.len() {
            let (piece_start, piece) = (self.starts[idx], &self.pieces[idx]);
            if piece_start >= end {
                break;
            }
            let skip = start.saturating_sub(piece_start);
            let take = end.min(piece_start + piece.len) - piece_start.max(start);
            out.extend(self.buffer(piece.source).slice(piece.start + skip, take).chars());
        }
    }

    /// Text of the character range `[start, start + len)`.
    pub fn get_range(&self, start: usize, len: usize) -> String {
        let mut chars = Vec::new();
        self.read_into(start, len, &mut chars);
        chars.into_iter().collect()
    }

    /// The whole document.
    pub fn get_text(&self) -> String {
        self.pieces.iter().map(|p| self.piece_text(p)).collect()
    }

    /// Compact the add buffer so it only holds text still referenced by a piece.
    pub fn gc(&mut self) {
        let mut ranges: Vec<(usize, usize)> = self
            .pieces
            .iter()
            .filter(|p| p.source == Source::Added)
            .map(|p| (p.start, p.end()))
            .collect();
        self.ops_since_gc = 0;

        if ranges.is_empty() {
            self.added = Buffer::default();
            return;
        }

        ranges.sort_unstable_by_key(|r| r.0);
        let mut merged: Vec<(usize, usize)> = Vec::with_capacity(ranges.len());
        for (start, end) in ranges {
            match merged.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }

        // (old_start, old_end, new_start)
        let mut compacted = Buffer::default();
        let mut moves = Vec::with_capacity(merged.len());
        for (start, end) in merged {
            moves.push((start, end, compacted.char_len));
            compacted.push_str(self.added.slice(start, end - start));
        }

        for piece in self.pieces.iter_mut().filter(|p| p.source == Source::Added) {
            let idx = match moves.binary_search_by_key(&piece.start, |m| m.0) {
                Ok(idx) => idx,
                Err(idx) => idx.saturating_sub(1),
            };
            if let Some(&(old_start, old_end, new_start)) = moves.get(idx)
                && piece.start < old_end
            {
                piece.start = new_start + (piece.start - old_start);
            }
        }

        self.added = compacted;
    }

    fn buffer(&self, source: Source) -> &Buffer {
        match source {
            Source::Original => &self.original,
            Source::Added => &self.added,
        }
    }

    fn piece_text(&self, piece: &Piece) -> &str {
        self.buffer(piece.source).slice(piece.start, piece.len)
    }

    /// Index of the piece holding the character at `offset`.
    fn piece_index(&self, offset: usize) -> usize {
        self.starts.partition_point(|&s| s <= offset).saturating_sub(1)
    }

    /// Piece containing `offset` and the char offset inside it. A boundary offset resolves to
    /// the end of the earlier piece.
    fn locate(&self, offset: usize) -> Option<(usize, usize)> {
        if self.pieces.is_empty() {
            return None;
        }
        let idx = self.starts.partition_point(|&s| s < offset).saturating_sub(1);
        Some((idx, (offset - self.starts[idx]).min(self.pieces[idx].len)))
    }

    fn reindex(&mut self) {
        self.starts.clear();
        let mut at = 0;
        for piece in &self.pieces {
            self.starts.push(at);
            at += piece.len;
        }
    }

    /// Merge neighbouring add-buffer pieces that are contiguous in the buffer.
    fn coalesce(&mut self) {
        let mut i = 0;
        while i + 1 < self.pieces.len() {
            let (a, b) = (&self.pieces[i], &self.pieces[i + 1]);
            if a.source == Source::Added && b.source == Source::Added && a.end() == b.start {
                let merged = Piece::new(Source::Added, a.start, a.len + b.len);
                self.pieces.splice(i..=i + 1, [merged]);
            } else {
                i += 1;
            }
        }
    }

    fn count_op(&mut self) {
        self.ops_since_gc += 1;
        if self.ops_since_gc >= self.gc_threshold {
            self.gc();
        }
    }
}

impl Default for PieceTable {
    fn default() -> Self {
        Self::empty()
    }
}
