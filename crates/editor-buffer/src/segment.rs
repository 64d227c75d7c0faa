//! Scratch segments feeding the scanner.
//!
//! A [`Segment`] caches a window `[pos, pos + len)` of document characters. Segments live in a
//! bounded [`SegmentPool`] and are handed out as [`SegmentHandle`]s that go back to the pool when
//! dropped. Edits call [`SegmentPool::invalidate_from`], which truncates every idle segment so no
//! stale characters are served later.
//!
//! Handles only exist while a reader holds the document read lock and invalidation runs under the
//! write lock, so every segment is idle whenever an edit invalidates the pool.

use crate::text_store::CharSource;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// A cached window of characters.
#[derive(Debug, Clone, Default)]
pub struct Segment {
    chars: Vec<char>,
    pos: usize,
}

impl Segment {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            chars: Vec::with_capacity(capacity),
            pos: 0,
        }
    }

    /// Start offset of the valid window.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Length of the valid window.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Returns `true` when the window is empty.
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    fn end(&self) -> usize {
        self.pos + self.chars.len()
    }

    /// Shrink the window so it ends at or before `pos`.
    fn truncate_from(&mut self, pos: usize) -> bool {
        if self.end() <= pos {
            return false;
        }
        if pos <= self.pos {
            self.chars.clear();
        } else {
            self.chars.truncate(pos - self.pos);
        }
        true
    }
}

/// Counters describing pool behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentStats {
    /// Characters read from the document.
    pub chars_read: u64,
    /// Loads that reused nothing from the cached window.
    pub full_reloads: u64,
    /// Loads that reused part of the cached window.
    pub partial_reloads: u64,
    /// Loads that had to grow a buffer.
    pub growths: u64,
    /// Acquisitions served by a non-pooled segment.
    pub overflow_acquisitions: u64,
    /// Segments truncated by edits.
    pub invalidations: u64,
}

#[derive(Debug, Default)]
struct Counters {
    chars_read: AtomicU64,
    full_reloads: AtomicU64,
    partial_reloads: AtomicU64,
    growths: AtomicU64,
    overflow_acquisitions: AtomicU64,
    invalidations: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SegmentStats {
        SegmentStats {
            chars_read: self.chars_read.load(Ordering::Relaxed),
            full_reloads: self.full_reloads.load(Ordering::Relaxed),
            partial_reloads: self.partial_reloads.load(Ordering::Relaxed),
            growths: self.growths.load(Ordering::Relaxed),
            overflow_acquisitions: self.overflow_acquisitions.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default)]
struct PoolState {
    idle: Vec<Segment>,
    /// Pooled segments created so far (idle or handed out).
    created: usize,
}

/// Bounded pool of reusable segments.
#[derive(Debug)]
pub struct SegmentPool {
    state: Mutex<PoolState>,
    capacity: usize,
    initial_capacity: usize,
    counters: Counters,
}

impl SegmentPool {
    /// Create a pool keeping at most `capacity` segments, each starting with
    /// `initial_capacity` chars of storage.
    pub fn new(capacity: usize, initial_capacity: usize) -> Self {
        Self {
            state: Mutex::new(PoolState::default()),
            capacity,
            initial_capacity,
            counters: Counters::default(),
        }
    }

    /// Maximum number of pooled segments.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Initial character capacity of a new segment; also the read-ahead used by the rescan.
    pub fn initial_capacity(&self) -> usize {
        self.initial_capacity
    }

    /// Number of segments currently idle in the pool.
    pub fn idle_count(&self) -> usize {
        self.state.lock().idle.len()
    }

    /// Borrow a segment. When every pooled segment is in use a non-pooled one is returned, which
    /// is simply dropped on release.
    pub fn acquire(&self) -> SegmentHandle<'_> {
        let mut state = self.state.lock();
        let (segment, pooled) = match state.idle.pop() {
            Some(segment) => (segment, true),
            None if state.created < self.capacity => {
                state.created += 1;
                (Segment::with_capacity(self.initial_capacity), true)
            }
            None => {
                Counters::bump(&self.counters.overflow_acquisitions, 1);
                tracing::debug!(target: "editor_buffer::segments", capacity = self.capacity, "segments.overflow");
                (Segment::with_capacity(self.initial_capacity), false)
            }
        };
        SegmentHandle {
            pool: self,
            segment,
            pooled,
        }
    }

    /// Drop cached characters at or after `pos` from every idle segment.
    pub fn invalidate_from(&self, pos: usize) {
        let mut state = self.state.lock();
        let mut truncated = 0u64;
        for segment in &mut state.idle {
            if segment.truncate_from(pos) {
                truncated += 1;
            }
        }
        Counters::bump(&self.counters.invalidations, truncated);
        tracing::trace!(target: "editor_buffer::segments", pos, truncated, "segments.invalidate");
    }

    /// Snapshot of the pool counters.
    pub fn stats(&self) -> SegmentStats {
        self.counters.snapshot()
    }

    fn release(&self, segment: Segment) {
        self.state.lock().idle.push(segment);
    }
}

/// A segment on loan from a [`SegmentPool`]. Returned to the pool when dropped.
#[derive(Debug)]
pub struct SegmentHandle<'a> {
    pool: &'a SegmentPool,
    segment: Segment,
    pooled: bool,
}

impl SegmentHandle<'_> {
    /// Make the window cover `[pos, pos + len)`, clamped to the source length, and return the
    /// number of characters now available.
    ///
    /// Characters already cached in the overlapping part of the window are kept; only the
    /// missing prefix and suffix are read from `source`.
    pub fn load(&mut self, source: &impl CharSource, pos: usize, len: usize) -> usize {
        let doc_len = source.len_chars();
        let pos = pos.min(doc_len);
        let end = pos.saturating_add(len).min(doc_len);
        let wanted = end - pos;
        let counters = &self.pool.counters;
        let seg = &mut self.segment;

        let keep_start = pos.max(seg.pos);
        let keep_end = end.min(seg.end());
        let fits = wanted <= seg.chars.capacity();

        if wanted == 0 {
            seg.chars.clear();
            seg.pos = pos;
        } else if keep_start < keep_end && fits {
            seg.chars.drain(..keep_start - seg.pos);
            seg.chars.truncate(keep_end - keep_start);
            let mut read = 0;
            if pos < keep_start {
                let mut prefix = Vec::with_capacity(keep_start - pos);
                source.read_chars(pos, keep_start - pos, &mut prefix);
                read += prefix.len();
                seg.chars.splice(0..0, prefix);
            }
            if keep_end < end {
                source.read_chars(keep_end, end - keep_end, &mut seg.chars);
                read += end - keep_end;
            }
            seg.pos = pos;
            if read > 0 {
                Counters::bump(&counters.partial_reloads, 1);
                Counters::bump(&counters.chars_read, read as u64);
            }
        } else {
            if !fits {
                Counters::bump(&counters.growths, 1);
            }
            seg.chars.clear();
            source.read_chars(pos, wanted, &mut seg.chars);
            seg.pos = pos;
            Counters::bump(&counters.full_reloads, 1);
            Counters::bump(&counters.chars_read, wanted as u64);
        }
        wanted
    }

    /// The cached characters.
    pub fn chars(&self) -> &[char] {
        &self.segment.chars
    }

    /// The cached window.
    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    /// Whether the segment returns to the pool on drop.
    pub fn is_pooled(&self) -> bool {
        self.pooled
    }
}

impl Drop for SegmentHandle<'_> {
    fn drop(&mut self) {
        if self.pooled {
            self.pool.release(std::mem::take(&mut self.segment));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Source(Vec<char>);

    impl CharSource for Source {
        fn len_chars(&self) -> usize {
            self.0.len()
        }

        fn read_chars(&self, pos: usize, len: usize, out: &mut Vec<char>) {
            let end = (pos + len).min(self.0.len());
            out.extend_from_slice(&self.0[pos.min(end)..end]);
        }
    }

    fn source(text: &str) -> Source {
        Source(text.chars().collect())
    }

    #[test]
    fn test_load_reads_only_the_delta() {
        let src = source("0123456789abcdef");
        let pool = SegmentPool::new(2, 32);
        let mut seg = pool.acquire();

        assert_eq!(seg.load(&src, 2, 6), 6);
        assert_eq!(seg.chars().iter().collect::<String>(), "234567");

        assert_eq!(seg.load(&src, 4, 8), 8);
        assert_eq!(seg.chars().iter().collect::<String>(), "456789ab");

        assert_eq!(seg.load(&src, 0, 6), 6);
        assert_eq!(seg.chars().iter().collect::<String>(), "012345");

        let stats = pool.stats();
        assert_eq!(stats.full_reloads, 1);
        assert_eq!(stats.partial_reloads, 2);
        assert_eq!(stats.chars_read, 6 + 4 + 4);
    }

    #[test]
    fn test_load_clamps_to_source() {
        let src = source("abc");
        let pool = SegmentPool::new(1, 8);
        let mut seg = pool.acquire();
        assert_eq!(seg.load(&src, 1, 10), 2);
        assert_eq!(seg.load(&src, 5, 1), 0);
        assert!(seg.segment().is_empty());
    }

    #[test]
    fn test_growth_forces_full_reload() {
        let src = source(&"x".repeat(100));
        let pool = SegmentPool::new(1, 4);
        let mut seg = pool.acquire();
        seg.load(&src, 0, 4);
        seg.load(&src, 0, 50);
        let stats = pool.stats();
        assert_eq!(stats.growths, 1);
        assert_eq!(stats.full_reloads, 2);
        assert_eq!(seg.chars().len(), 50);
    }

    #[test]
    fn test_invalidate_truncates_idle_segments() {
        let src = source("0123456789");
        let pool = SegmentPool::new(2, 16);
        {
            let mut a = pool.acquire();
            let mut b = pool.acquire();
            a.load(&src, 0, 10);
            b.load(&src, 6, 4);
        }
        assert_eq!(pool.idle_count(), 2);

        pool.invalidate_from(5);
        assert_eq!(pool.stats().invalidations, 2);

        let mut seg = pool.acquire();
        let window = (seg.segment().pos(), seg.segment().len());
        assert!(window == (0, 5) || window.1 == 0);

        let changed = source("01234XXXXX");
        seg.load(&changed, 0, 10);
        assert_eq!(seg.chars().iter().collect::<String>(), "01234XXXXX");
    }

    #[test]
    fn test_overflow_is_not_pooled() {
        let pool = SegmentPool::new(1, 4);
        let first = pool.acquire();
        let second = pool.acquire();
        assert!(first.is_pooled());
        assert!(!second.is_pooled());
        drop(second);
        drop(first);
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.stats().overflow_acquisitions, 1);
    }
}
