//! Error types shared by every layer of the buffer.

use crate::mark::MarkId;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = BufferError> = std::result::Result<T, E>;

/// Errors produced by the text store, marks, token chains and the rescan driver.
///
/// Segment reloads and syntax-cache misses are never reported here; they are recomputed
/// transparently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("invalid mark {0:?}")]
    /// The mark was released, or the text it referred to was deleted.
    InvalidMark(MarkId),

    #[error("bad offset {offset} (length {len}) in a document of {doc_len} chars")]
    /// A position or range lies outside the document.
    BadOffset {
        /// Requested start offset.
        offset: usize,
        /// Requested length.
        len: usize,
        /// Document length at the time of the request.
        doc_len: usize,
    },

    #[error("modification at {offset} (length {len}) prohibited by a guarded region")]
    /// An edit guard vetoed the modification. The atomic group was rolled back.
    GuardedRegion {
        /// Start of the vetoed edit.
        offset: usize,
        /// Length of the vetoed edit (inserted or removed chars).
        len: usize,
    },

    #[error("token chain from generation {chain_generation} is stale (document is at {current_generation})")]
    /// A token chain was traversed after the document changed.
    StaleChain {
        /// Edit counter value stamped on the chain.
        chain_generation: u64,
        /// Current edit counter value.
        current_generation: u64,
    },

    #[error("scanner contract violated on line {line} at offset {offset}: {fault}")]
    /// The pluggable scanner misbehaved; the rescan was aborted.
    ScannerContract {
        /// Line being scanned.
        line: usize,
        /// Absolute offset where the scanner failed to make progress.
        offset: usize,
        /// What the scanner did wrong.
        fault: ScannerFault,
    },
}

/// Kinds of scanner misbehavior detected by the rescan driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScannerFault {
    #[error("zero-length token")]
    /// A token of length zero was emitted.
    ZeroLengthToken,
    #[error("token extends past the end of the buffer")]
    /// A token ran past the supplied buffer.
    TokenPastBuffer,
    #[error("end of buffer reported before the buffer was consumed")]
    /// `EndOfBuffer` was returned while input remained.
    PrematureEndOfBuffer,
}

impl BufferError {
    pub(crate) fn bad_offset(offset: usize, len: usize, doc_len: usize) -> Self {
        Self::BadOffset {
            offset,
            len,
            doc_len,
        }
    }
}
