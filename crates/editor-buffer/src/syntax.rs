//! Per-line scanner state cache and the incremental rescan driver.
//!
//! The cache keeps one [`Scanner::State`] per line: the state the scanner is in just before the
//! line's first character. Entry 0 is the initial state.
//!
//! # Validity
//!
//! Validity is tracked lazily with a watermark: entries below `stale_from` are valid, entries at
//! or above it are stale but kept, because the rescan compares freshly computed states against
//! them. An edit on line `L` lowers the watermark to `L + 1` and records `L` as a pending edit.
//!
//! # Rescan
//!
//! [`SyntaxStateCache::rescan`] resumes at the nearest valid state at or before the requested
//! first line and scans forward line by line. Past the requested last line it stops at the first
//! line whose recomputed state equals the cached one (the stabilization point): scanning is a
//! pure function of state and input, so every state after that line is still what a full re-lex
//! would produce, up to the next pending edit. Without such a line the scan runs to the end of
//! the document.
//!
//! Recomputed states are committed only when the rescan completes. A cancelled rescan or a
//! scanner contract violation leaves the cache exactly as it was.

use crate::error::{BufferError, Result, ScannerFault};
use crate::line_tree::{LineChange, LineTree};
use crate::segment::SegmentPool;
use crate::text_store::TextStore;
use crate::token::TokenItem;
use std::fmt::Debug;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// What a scanner returns for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scanned<K> {
    /// A token of `len` characters starting at the requested offset.
    Token {
        /// Token kind.
        kind: K,
        /// Length in characters. Must be at least 1 and stay inside the buffer.
        len: usize,
    },
    /// The buffer is consumed. Must be returned exactly when the offset reaches the buffer end.
    EndOfBuffer,
}

/// A pluggable lexer driven one line at a time.
///
/// # Contract
///
/// The rescan stopping rule relies on the scanner being a pure function of its loaded state and
/// the characters it is given: two runs started from equal states over equal input must emit the
/// same tokens and end in equal states. Implementations must not consult anything else (clocks,
/// global settings, other documents). If the scanner configuration changes, call
/// [`Document::invalidate_syntax`](crate::Document::invalidate_syntax).
pub trait Scanner {
    /// Snapshot of the scanner's internal state at a line boundary.
    type State: Clone + PartialEq + Debug;
    /// Token kind.
    type Kind: Copy + PartialEq + Debug;

    /// State at the start of the document.
    fn initial_state(&self) -> Self::State;

    /// Restore a previously stored state.
    fn load_state(&mut self, state: &Self::State);

    /// Capture the current state.
    fn store_state(&self) -> Self::State;

    /// Scan the token starting at `offset` in `buffer`. `last_buffer` is `true` for the last line
    /// of the document.
    fn next_token(&mut self, buffer: &[char], offset: usize, last_buffer: bool) -> Scanned<Self::Kind>;
}

/// Cooperative cancellation flag for a rescan, checked at line boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// What a rescan did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RescanReport {
    /// Line whose cached state the scan resumed from.
    pub resumed_from: usize,
    /// Last line scanned, `None` if nothing was scanned.
    pub last_line_scanned: Option<usize>,
    /// Number of lines run through the scanner.
    pub lines_scanned: usize,
    /// Line whose recomputed state matched the cache, ending the scan early.
    pub stabilized_at: Option<usize>,
    /// Whether the scan ran through the last line.
    pub reached_end: bool,
    /// Whether the scan was abandoned through its [`CancelToken`].
    pub cancelled: bool,
}

/// Tokens of a rescan plus its report.
#[derive(Debug, Clone)]
pub struct Rescan<K> {
    /// Tokens of the requested lines, in order. Empty when cancelled.
    pub tokens: Vec<TokenItem<K>>,
    /// What the rescan did.
    pub report: RescanReport,
}

/// Scanner state per line.
#[derive(Debug, Clone)]
pub struct SyntaxStateCache<St> {
    states: Vec<Option<St>>,
    /// Entries below this index are valid. Always at least 1.
    stale_from: usize,
    /// Entries below this index were computed at some point, except lines split off by a
    /// pending edit.
    computed_end: usize,
    /// Lines edited since their following states were last verified, sorted.
    pending: Vec<usize>,
}

impl<St: Clone + PartialEq + Debug> SyntaxStateCache<St> {
    /// A cache for `line_count` lines that only knows the initial state.
    pub fn new(initial: St, line_count: usize) -> Self {
        let mut states = vec![None; line_count.max(1)];
        states[0] = Some(initial);
        Self {
            states,
            stale_from: 1,
            computed_end: 1,
            pending: Vec::new(),
        }
    }

    /// Number of lines tracked.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Always `false`; the cache tracks at least one line.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Valid state before `line`, or `None` when the entry is stale or was never computed.
    pub fn state_before(&self, line: usize) -> Option<&St> {
        if line < self.stale_from {
            self.states.get(line)?.as_ref()
        } else {
            None
        }
    }

    /// Number of leading lines whose state is valid.
    pub fn valid_lines(&self) -> usize {
        self.stale_from.min(self.states.len())
    }

    /// Mark the states of `line` and every later line stale. The initial state never goes stale.
    pub fn invalidate_from_line(&mut self, line: usize) {
        let edited = line.max(1) - 1;
        self.stale_from = self.stale_from.min(edited + 1);
        self.record_pending(edited);
        tracing::trace!(target: "editor_buffer::rescan", line, stale_from = self.stale_from, "rescan.invalidate");
    }

    /// Forget every state and restart from `initial`.
    pub fn invalidate_all(&mut self, initial: St) {
        let line_count = self.states.len();
        *self = Self::new(initial, line_count);
    }

    /// Keep the cache aligned with the line partition after an edit.
    pub(crate) fn apply_line_change(&mut self, change: LineChange) {
        let LineChange {
            line,
            removed,
            inserted,
        } = change;
        let at = (line + 1).min(self.states.len());
        let merged_end = (at + removed).min(self.states.len());
        self.states
            .splice(at..merged_end, std::iter::repeat_n(None, inserted));

        if self.computed_end > at {
            self.computed_end = self.computed_end.saturating_sub(removed).max(at) + inserted;
        }
        for p in &mut self.pending {
            if *p > line {
                *p = if *p <= line + removed {
                    line
                } else {
                    *p - removed + inserted
                };
            }
        }
        self.stale_from = self.stale_from.min(line + 1);
        self.record_pending(line);
    }

    fn record_pending(&mut self, line: usize) {
        self.pending.push(line);
        self.pending.sort_unstable();
        self.pending.dedup();
    }

    /// Scan at least the lines in `range`, returning their tokens, and refresh the cached states.
    pub fn rescan<S>(
        &mut self,
        scanner: &mut S,
        store: &TextStore,
        lines: &LineTree,
        pool: &SegmentPool,
        range: RangeInclusive<usize>,
        cancel: &CancelToken,
    ) -> Result<Rescan<S::Kind>>
    where
        S: Scanner<State = St>,
    {
        let line_count = lines.line_count();
        debug_assert_eq!(line_count, self.states.len());
        let last = line_count - 1;
        let (from, to) = (*range.start(), (*range.end()).min(last));

        let resume = (0..=from.min(last).min(self.stale_from - 1))
            .rev()
            .find(|&i| self.states[i].is_some())
            .unwrap_or(0);
        let mut report = RescanReport {
            resumed_from: resume,
            ..RescanReport::default()
        };
        if from > to {
            return Ok(Rescan {
                tokens: Vec::new(),
                report,
            });
        }

        let mut state = self.states[resume]
            .clone()
            .unwrap_or_else(|| scanner.initial_state());
        let mut fresh: Vec<St> = Vec::new();
        let mut tokens: Vec<TokenItem<S::Kind>> = Vec::new();
        let mut segment = pool.acquire();
        let read_ahead = pool.initial_capacity();
        let mut line = resume;

        loop {
            if cancel.is_cancelled() {
                report.cancelled = true;
                tracing::debug!(target: "editor_buffer::rescan", resume, line, "rescan.cancelled");
                return Ok(Rescan {
                    tokens: Vec::new(),
                    report,
                });
            }

            let Some((start, end)) = lines.line_range(store, line) else {
                break;
            };
            let line_len = end - start;
            segment.load(store, start, line_len.max(read_ahead));
            let chars = &segment.chars()[..line_len];
            let emit = (from..=to).contains(&line);
            let next = scan_line(scanner, &state, chars, line, start, line == last, |kind, offset, len| {
                if emit {
                    let image = chars[offset..offset + len].iter().collect();
                    let index = tokens.len();
                    tokens.push(TokenItem::new(kind, start + offset, image, index));
                }
            })?;

            report.lines_scanned += 1;
            report.last_line_scanned = Some(line);
            let following = line + 1;
            if following == line_count {
                report.reached_end = true;
                break;
            }

            let settled = line >= to
                && (following < self.stale_from
                    || following >= self.computed_end
                    || self.states[following].as_ref() == Some(&next));
            fresh.push(next.clone());
            state = next;
            if settled {
                report.stabilized_at = Some(following);
                break;
            }
            line = following;
        }

        let committed = fresh.len();
        for (k, st) in fresh.into_iter().enumerate() {
            self.states[resume + 1 + k] = Some(st);
        }
        let verified = if report.reached_end {
            line_count
        } else {
            resume + committed
        };
        self.computed_end = self.computed_end.max(verified + 1).min(line_count);
        self.pending.retain(|&p| p >= verified);
        self.stale_from = self
            .pending
            .first()
            .map_or(self.computed_end, |&p| (p + 1).min(self.computed_end));

        tracing::debug!(
            target: "editor_buffer::rescan",
            from,
            to,
            resume,
            lines_scanned = report.lines_scanned,
            stabilized_at = ?report.stabilized_at,
            reached_end = report.reached_end,
            stale_from = self.stale_from,
            "rescan.done"
        );
        Ok(Rescan { tokens, report })
    }
}

/// Run the scanner over one line, enforcing the progress contract. Returns the state after the
/// line.
fn scan_line<S: Scanner>(
    scanner: &mut S,
    state: &S::State,
    chars: &[char],
    line: usize,
    line_start: usize,
    last_buffer: bool,
    mut emit: impl FnMut(S::Kind, usize, usize),
) -> Result<S::State> {
    scanner.load_state(state);
    let mut offset = 0;
    loop {
        let fault = match scanner.next_token(chars, offset, last_buffer) {
            Scanned::Token { len: 0, .. } => ScannerFault::ZeroLengthToken,
            Scanned::Token { len, .. } if offset + len > chars.len() => ScannerFault::TokenPastBuffer,
            Scanned::Token { kind, len } => {
                emit(kind, offset, len);
                offset += len;
                continue;
            }
            Scanned::EndOfBuffer if offset == chars.len() => return Ok(scanner.store_state()),
            Scanned::EndOfBuffer => ScannerFault::PrematureEndOfBuffer,
        };
        tracing::debug!(target: "editor_buffer::rescan", line, offset = line_start + offset, ?fault, "rescan.contract_violation");
        return Err(BufferError::ScannerContract {
            line,
            offset: line_start + offset,
            fault,
        });
    }
}
