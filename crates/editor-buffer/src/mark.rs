//! Marks: logical positions that follow edits.
//!
//! A mark is registered against the [`TextStore`](crate::TextStore) and moves with the text
//! around it:
//!
//! - `insert(pos, len)`: marks after `pos` shift by `len`; a mark exactly at `pos` shifts only if
//!   its bias is [`Bias::StayAfter`].
//! - `remove(pos, len)`: marks strictly inside `(pos, pos + len)` become invalid, or move to `pos`
//!   when they clamp; marks at or after `pos + len` shift back by `len`; marks at or before `pos`
//!   do not move.
//!
//! # Mark gap
//!
//! Live marks are kept in one vector sorted by offset. The vector is split at a virtual gap
//! placed at the last edit offset: marks below the gap store their offset as is, marks above it
//! store `offset + gap_len`. An insertion or removal at the gap only changes `gap_start` and
//! `gap_len`, so the marks after the edit move without being touched. Moving the gap to a new
//! edit point rewrites only the marks between the old and the new point.

use crate::error::{BufferError, Result};

/// Initial (and refill) size of the virtual gap.
const GAP_REFILL: u64 = 1 << 40;

/// Stable identifier of a mark.
///
/// Ids are generational: a released id never aliases a mark created later in the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkId {
    slot: u32,
    generation: u32,
}

/// Where a mark goes when text is inserted exactly at its offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Bias {
    /// Stay before the inserted text (the offset does not change).
    #[default]
    StayBefore,
    /// Move after the inserted text.
    StayAfter,
}

/// Offset of a mark captured before a removal, used to undo the removal exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MarkSnapshot {
    pub(crate) id: MarkId,
    pub(crate) offset: usize,
}

#[derive(Debug, Clone, Copy)]
struct MarkData {
    raw: u64,
    bias: Bias,
    clamp: bool,
    valid: bool,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    live: bool,
    data: MarkData,
}

/// Registry of every mark of a document.
#[derive(Debug, Clone)]
pub(crate) struct MarkRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    /// Valid marks sorted by offset; `order[..gap_index]` are below the gap.
    order: Vec<u32>,
    gap_index: usize,
    gap_start: u64,
    gap_len: u64,
}

impl MarkRegistry {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            order: Vec::new(),
            gap_index: 0,
            gap_start: 0,
            gap_len: GAP_REFILL,
        }
    }

    /// Number of live (valid or invalidated, not yet released) marks.
    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Register a mark. The caller guarantees `offset` is within the document.
    pub(crate) fn create(&mut self, offset: usize, bias: Bias, clamp: bool) -> MarkId {
        let data = MarkData {
            raw: 0,
            bias,
            clamp,
            valid: true,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                let entry = &mut self.slots[slot as usize];
                entry.live = true;
                entry.data = data;
                slot
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    live: true,
                    data,
                });
                (self.slots.len() - 1) as u32
            }
        };
        self.place(slot, offset);

        MarkId {
            slot,
            generation: self.slots[slot as usize].generation,
        }
    }

    /// Current offset of `id`.
    pub(crate) fn offset(&self, id: MarkId) -> Result<usize> {
        match self.live_slot(id) {
            Some(slot) if self.slots[slot as usize].data.valid => Ok(self.offset_at(slot)),
            _ => Err(BufferError::InvalidMark(id)),
        }
    }

    pub(crate) fn bias(&self, id: MarkId) -> Result<Bias> {
        self.live_slot(id)
            .map(|slot| self.slots[slot as usize].data.bias)
            .ok_or(BufferError::InvalidMark(id))
    }

    pub(crate) fn is_valid(&self, id: MarkId) -> bool {
        self.offset(id).is_ok()
    }

    /// Unregister `id`. Returns `false` if it was already released.
    pub(crate) fn release(&mut self, id: MarkId) -> bool {
        let Some(slot) = self.live_slot(id) else {
            return false;
        };
        if self.slots[slot as usize].data.valid {
            self.unlink(slot);
        }
        let entry = &mut self.slots[slot as usize];
        entry.live = false;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(slot);
        true
    }

    /// Adjust marks for `len` chars inserted at `pos`.
    pub(crate) fn insert_update(&mut self, pos: usize, len: usize) {
        if len == 0 {
            return;
        }
        let moved = self.move_gap(pos, |m| m.bias == Bias::StayBefore);

        let len = len as u64;
        if self.gap_len <= len {
            for &slot in &self.order[self.gap_index..] {
                self.slots[slot as usize].data.raw += GAP_REFILL;
            }
            self.gap_len += GAP_REFILL;
        }
        self.gap_start += len;
        self.gap_len -= len;

        tracing::trace!(target: "editor_buffer::marks", pos, len, moved, "marks.insert");
    }

    /// Adjust marks for `len` chars removed at `pos`.
    ///
    /// Returns the marks that ended up at `pos` (or were invalidated) together with their
    /// offsets before the removal.
    pub(crate) fn remove_update(&mut self, pos: usize, len: usize) -> Vec<MarkSnapshot> {
        if len == 0 {
            return Vec::new();
        }
        let end = pos + len;
        let moved = self.move_gap(pos, |_| true);

        let mut journal = Vec::new();
        for &slot in self.order[..self.gap_index].iter().rev() {
            if self.offset_at(slot) != pos {
                break;
            }
            journal.push(self.snapshot(slot, pos));
        }

        let above = &self.order[self.gap_index..];
        let interior_end = self.gap_index + above.partition_point(|&s| self.offset_at(s) < end);
        let touched_end = self.gap_index + above.partition_point(|&s| self.offset_at(s) <= end);
        for &slot in &self.order[self.gap_index..touched_end] {
            journal.push(self.snapshot(slot, self.offset_at(slot)));
        }

        let interior: Vec<u32> = self.order.drain(self.gap_index..interior_end).collect();
        let mut clamped = Vec::with_capacity(interior.len());
        let mut invalidated = 0usize;
        for slot in interior {
            let data = &mut self.slots[slot as usize].data;
            if data.clamp {
                data.raw = pos as u64;
                clamped.push(slot);
            } else {
                data.valid = false;
                invalidated += 1;
            }
        }
        let clamped_count = clamped.len();
        self.order.splice(self.gap_index..self.gap_index, clamped);
        self.gap_index += clamped_count;
        self.gap_len += len as u64;

        tracing::trace!(
            target: "editor_buffer::marks",
            pos,
            len,
            moved,
            clamped = clamped_count,
            invalidated,
            "marks.remove"
        );
        journal
    }

    /// Put journaled marks back at their recorded offsets, revalidating them if needed.
    /// Marks released since the snapshot are skipped.
    pub(crate) fn restore(&mut self, snapshots: &[MarkSnapshot]) {
        for snap in snapshots {
            let Some(slot) = self.live_slot(snap.id) else {
                continue;
            };
            if self.slots[slot as usize].data.valid {
                self.unlink(slot);
            }
            self.slots[slot as usize].data.valid = true;
            self.place(slot, snap.offset);
        }
    }

    fn snapshot(&self, slot: u32, offset: usize) -> MarkSnapshot {
        MarkSnapshot {
            id: MarkId {
                slot,
                generation: self.slots[slot as usize].generation,
            },
            offset,
        }
    }

    fn live_slot(&self, id: MarkId) -> Option<u32> {
        let entry = self.slots.get(id.slot as usize)?;
        (entry.live && entry.generation == id.generation).then_some(id.slot)
    }

    fn offset_at(&self, slot: u32) -> usize {
        let raw = self.slots[slot as usize].data.raw;
        let offset = if raw <= self.gap_start {
            raw
        } else {
            raw - self.gap_len
        };
        offset as usize
    }

    /// Insert `slot` into the sorted order at `offset`.
    fn place(&mut self, slot: u32, offset: usize) {
        let offset64 = offset as u64;
        if offset64 <= self.gap_start {
            let idx = self.order[..self.gap_index].partition_point(|&s| self.offset_at(s) <= offset);
            self.slots[slot as usize].data.raw = offset64;
            self.order.insert(idx, slot);
            self.gap_index += 1;
        } else {
            let idx = self.gap_index
                + self.order[self.gap_index..].partition_point(|&s| self.offset_at(s) <= offset);
            self.slots[slot as usize].data.raw = offset64 + self.gap_len;
            self.order.insert(idx, slot);
        }
    }

    /// Remove `slot` from the sorted order.
    fn unlink(&mut self, slot: u32) {
        let offset = self.offset_at(slot);
        let start = self.order.partition_point(|&s| self.offset_at(s) < offset);
        let found = self.order[start..]
            .iter()
            .take_while(|&&s| self.offset_at(s) == offset)
            .position(|&s| s == slot);
        if let Some(found) = found {
            let idx = start + found;
            self.order.remove(idx);
            if idx < self.gap_index {
                self.gap_index -= 1;
            }
        }
    }

    /// Move the gap to `to`. Marks before `to` end up below, marks after it above; marks exactly
    /// at `to` go below when `stays_below` holds for them. Returns how many marks were rewritten.
    fn move_gap(&mut self, to: usize, stays_below: impl Fn(&MarkData) -> bool) -> usize {
        let ties_start = self.order.partition_point(|&s| self.offset_at(s) < to);
        let ties_end =
            ties_start + self.order[ties_start..].partition_point(|&s| self.offset_at(s) <= to);
        let lo = self.gap_index.min(ties_start);
        let hi = self.gap_index.max(ties_end);

        let offsets: Vec<usize> = self.order[lo..hi]
            .iter()
            .map(|&s| self.offset_at(s))
            .collect();

        let (mut below, above): (Vec<u32>, Vec<u32>) = self.order[ties_start..ties_end]
            .iter()
            .copied()
            .partition(|&s| stays_below(&self.slots[s as usize].data));
        self.gap_index = ties_start + below.len();
        below.extend(above);
        self.order[ties_start..ties_end].copy_from_slice(&below);
        self.gap_start = to as u64;

        for idx in lo..hi {
            let offset = if (ties_start..ties_end).contains(&idx) {
                to
            } else {
                offsets[idx - lo]
            };
            let offset = offset as u64;
            let raw = if idx < self.gap_index {
                offset
            } else {
                offset + self.gap_len
            };
            let slot = self.order[idx];
            self.slots[slot as usize].data.raw = raw;
        }
        hi - lo
    }

    #[cfg(test)]
    fn assert_invariants(&self) {
        let offsets: Vec<usize> = self.order.iter().map(|&s| self.offset_at(s)).collect();
        assert!(offsets.windows(2).all(|w| w[0] <= w[1]), "order not sorted: {offsets:?}");
        for (idx, &slot) in self.order.iter().enumerate() {
            let raw = self.slots[slot as usize].data.raw;
            if idx < self.gap_index {
                assert!(raw <= self.gap_start);
            } else {
                assert!(raw >= self.gap_start + self.gap_len);
            }
        }
    }
}

impl Default for MarkRegistry {
    fn default() -> Self {
        Self::new()
    }
}
