#![warn(missing_docs)]
//! Editor Buffer - Mark-Tracking Text Buffer with Incremental Lexing
//!
//! # Overview
//!
//! `editor-buffer` is the document layer of a code editor. It stores text, keeps logical
//! positions (marks) attached to that text across edits, partitions the text into lines, and
//! lexes it incrementally through a pluggable [`Scanner`], re-scanning after an edit only until
//! the scanner state stabilizes again.
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Document (edit groups, guards, events)     │  ← Public API
//! ├─────────────────────────────────────────────┤
//! │  SyntaxStateCache + TokenChain              │  ← Incremental lexing
//! ├─────────────────────────────────────────────┤
//! │  SegmentPool (scratch read windows)         │  ← Scanner input
//! ├─────────────────────────────────────────────┤
//! │  LineTree (mark-delimited lines)            │  ← Line access
//! ├─────────────────────────────────────────────┤
//! │  TextStore (piece table + mark gap)         │  ← Text and marks
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use editor_buffer::{Bias, CancelToken, Document, Scanned, Scanner};
//!
//! /// Splits text into words and single separator characters.
//! struct Words;
//!
//! impl Scanner for Words {
//!     type State = ();
//!     type Kind = bool;
//!
//!     fn initial_state(&self) {}
//!     fn load_state(&mut self, _: &()) {}
//!     fn store_state(&self) {}
//!
//!     fn next_token(&mut self, buffer: &[char], offset: usize, _last: bool) -> Scanned<bool> {
//!         let rest = &buffer[offset..];
//!         let Some(first) = rest.first() else {
//!             return Scanned::EndOfBuffer;
//!         };
//!         if first.is_alphanumeric() {
//!             let len = rest.iter().take_while(|c| c.is_alphanumeric()).count();
//!             Scanned::Token { kind: true, len }
//!         } else {
//!             Scanned::Token { kind: false, len: 1 }
//!         }
//!     }
//! }
//!
//! let doc = Document::new("hello world\nsecond line", Words);
//! let mark = doc.create_mark(6, Bias::StayBefore).unwrap();
//!
//! doc.insert(0, ">> ").unwrap();
//! assert_eq!(mark.offset().unwrap(), 9);
//!
//! let tokens = doc.tokens(0..=0, &CancelToken::new()).unwrap();
//! let words: Vec<&str> = tokens
//!     .chain
//!     .items()
//!     .unwrap()
//!     .iter()
//!     .filter(|t| t.kind())
//!     .map(|t| t.image())
//!     .collect();
//! assert_eq!(words, ["hello", "world"]);
//! ```
//!
//! # Module Description
//!
//! - [`storage`] - Piece Table character storage
//! - [`mark`] - mark ids, bias and the gap-based registry
//! - [`text_store`] - text plus marks, the only mutator of content
//! - [`line_tree`] - lines delimited by marks, with a two-level element view
//! - [`segment`] - pooled scratch windows fed to the scanner
//! - [`syntax`] - scanner contract, per-line state cache and the rescan driver
//! - [`token`] - token chains with staleness detection
//! - [`document`] - the facade: edit groups, guards, search and events
//!
//! # Concurrency
//!
//! A [`Document`] is shared by reference across threads. Edits take the document lock
//! exclusively; queries, searches and token requests share it. Token chains outlive the lock and
//! report [`BufferError::StaleChain`] once the document changed.

pub mod config;
pub mod delta;
pub mod document;
pub mod error;
pub mod events;
pub mod line_tree;
pub mod mark;
pub mod search;
pub mod segment;
pub mod storage;
pub mod syntax;
pub mod text_store;
pub mod token;

pub use config::DocumentConfig;
pub use delta::{TextDelta, TextEdit};
pub use document::{Document, DocumentEdit, EditGuard, EditKind, GuardId, MarkHandle, Tokens};
pub use error::{BufferError, Result, ScannerFault};
pub use events::{DocumentEvent, EditEvent, EventCallback, EventRegistry, Subscription};
pub use line_tree::{BranchElement, Element, LineAttributes, LineChange, LineElement, LineTree};
pub use mark::{Bias, MarkId};
pub use search::{Finder, RegexFinder, SearchMatch, TextFinder};
pub use segment::{Segment, SegmentHandle, SegmentPool, SegmentStats};
pub use storage::PieceTable;
pub use syntax::{CancelToken, Rescan, RescanReport, Scanned, Scanner, SyntaxStateCache};
pub use text_store::{CharSource, EditCounter, TextStore};
pub use token::{TokenChain, TokenCursor, TokenItem};
