//! `editor-buffer-scan-simple` - A simple C-like [`Scanner`] for `editor-buffer`.
//!
//! The scanner recognizes whitespace, identifiers, keywords, numbers, double-quoted strings, line
//! comments, block comments, operators and punctuation. Block comments may span lines; that is the
//! only state carried from one line to the next, which makes it a good fit for incremental
//! rescanning: an edit that opens or closes a comment re-lexes forward until the comment state
//! settles again.
//!
//! It is *not* a full lexer for any language.

use editor_buffer::{Scanned, Scanner};
use std::collections::BTreeSet;

/// Scanner state at a line boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum CLikeState {
    /// Outside any multi-line construct.
    #[default]
    Normal,
    /// Inside an unterminated `/* ... */` comment.
    BlockComment,
}

/// Token kinds produced by [`CLikeScanner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Whitespace,
    Identifier,
    Keyword,
    Number,
    String,
    LineComment,
    BlockComment,
    Operator,
    Punctuation,
}

impl TokenKind {
    /// Default style id for this kind. `None` for kinds that are usually not styled.
    pub fn style_id(self) -> Option<u32> {
        match self {
            TokenKind::Whitespace | TokenKind::Identifier | TokenKind::Punctuation => None,
            TokenKind::Keyword => Some(SIMPLE_STYLE_KEYWORD),
            TokenKind::Number => Some(SIMPLE_STYLE_NUMBER),
            TokenKind::String => Some(SIMPLE_STYLE_STRING),
            TokenKind::LineComment | TokenKind::BlockComment => Some(SIMPLE_STYLE_COMMENT),
            TokenKind::Operator => Some(SIMPLE_STYLE_OPERATOR),
        }
    }

    /// Whether the token is a comment of either form.
    pub fn is_comment(self) -> bool {
        matches!(self, TokenKind::LineComment | TokenKind::BlockComment)
    }
}

/// Default style ids for [`TokenKind::style_id`].
///
/// These are only identifiers. UI/theme layer is expected to map them to actual colors.
pub const SIMPLE_STYLE_KEYWORD: u32 = 0x0300_0001;
pub const SIMPLE_STYLE_NUMBER: u32 = 0x0300_0002;
pub const SIMPLE_STYLE_STRING: u32 = 0x0300_0003;
pub const SIMPLE_STYLE_COMMENT: u32 = 0x0300_0004;
pub const SIMPLE_STYLE_OPERATOR: u32 = 0x0300_0005;

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub",
    "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true", "type", "unsafe",
    "use", "where", "while",
];

const C_KEYWORDS: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else", "enum",
    "extern", "float", "for", "goto", "if", "int", "long", "register", "return", "short", "signed",
    "sizeof", "static", "struct", "switch", "typedef", "union", "unsigned", "void", "volatile",
    "while",
];

const OPERATOR_CHARS: &str = "+-*/%=<>!&|^~?:";

/// A C-like lexer with multi-line block comments.
///
/// The keyword set is configuration: after changing it on a live document, go through
/// [`Document::reconfigure_scanner`](editor_buffer::Document::reconfigure_scanner) so cached
/// states are dropped.
#[derive(Debug, Clone)]
pub struct CLikeScanner {
    keywords: BTreeSet<String>,
    state: CLikeState,
}

impl CLikeScanner {
    /// Scanner recognizing `keywords`.
    pub fn new<I, K>(keywords: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            state: CLikeState::Normal,
        }
    }

    /// Scanner with the Rust keyword set.
    pub fn rust_default() -> Self {
        Self::new(RUST_KEYWORDS.iter().copied())
    }

    /// Scanner with the C keyword set.
    pub fn c_default() -> Self {
        Self::new(C_KEYWORDS.iter().copied())
    }

    /// The keyword set.
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(String::as_str)
    }

    /// Replace the keyword set.
    pub fn set_keywords<I, K>(&mut self, keywords: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
    }

    /// Add one keyword.
    pub fn add_keyword(&mut self, keyword: impl Into<String>) {
        self.keywords.insert(keyword.into());
    }

    /// Length of the block comment body starting at `rest[0]`, closing delimiter included.
    /// Leaves the state in `BlockComment` when the buffer ends first.
    fn block_comment(&mut self, rest: &[char]) -> usize {
        match rest.windows(2).position(|w| w == ['*', '/']) {
            Some(at) => {
                self.state = CLikeState::Normal;
                at + 2
            }
            None => {
                self.state = CLikeState::BlockComment;
                rest.len()
            }
        }
    }
}

impl Default for CLikeScanner {
    fn default() -> Self {
        Self::rust_default()
    }
}

fn is_ident_start(ch: char) -> bool {
    ch == '_' || ch.is_alphabetic()
}

fn is_ident_char(ch: char) -> bool {
    ch == '_' || ch.is_alphanumeric()
}

fn is_operator(ch: char) -> bool {
    OPERATOR_CHARS.contains(ch)
}

fn starts_comment(rest: &[char]) -> bool {
    matches!(rest, ['/', '/' | '*', ..])
}

impl Scanner for CLikeScanner {
    type State = CLikeState;
    type Kind = TokenKind;

    fn initial_state(&self) -> CLikeState {
        CLikeState::Normal
    }

    fn load_state(&mut self, state: &CLikeState) {
        self.state = *state;
    }

    fn store_state(&self) -> CLikeState {
        self.state
    }

    fn next_token(&mut self, buffer: &[char], offset: usize, _last_buffer: bool) -> Scanned<TokenKind> {
        let rest = &buffer[offset.min(buffer.len())..];
        let Some(&first) = rest.first() else {
            return Scanned::EndOfBuffer;
        };

        if self.state == CLikeState::BlockComment {
            let len = self.block_comment(rest);
            return Scanned::Token {
                kind: TokenKind::BlockComment,
                len,
            };
        }

        let (kind, len) = match rest {
            ['/', '/', ..] => {
                let len = rest.iter().position(|&c| c == '\n').unwrap_or(rest.len());
                (TokenKind::LineComment, len)
            }
            ['/', '*', ..] => (TokenKind::BlockComment, 2 + self.block_comment(&rest[2..])),
            _ if first.is_whitespace() => {
                let len = rest.iter().take_while(|c| c.is_whitespace()).count();
                (TokenKind::Whitespace, len)
            }
            _ if first.is_ascii_digit() => {
                let len = rest
                    .iter()
                    .take_while(|&&c| is_ident_char(c) || c == '.')
                    .count();
                (TokenKind::Number, len)
            }
            _ if is_ident_start(first) => {
                let len = rest.iter().take_while(|&&c| is_ident_char(c)).count();
                let word: String = rest[..len].iter().collect();
                let kind = if self.keywords.contains(&word) {
                    TokenKind::Keyword
                } else {
                    TokenKind::Identifier
                };
                (kind, len)
            }
            ['"', ..] => {
                let mut len = 1;
                let mut escaped = false;
                while let Some(&c) = rest.get(len) {
                    if c == '\n' {
                        break;
                    }
                    len += 1;
                    match c {
                        '\\' if !escaped => escaped = true,
                        '"' if !escaped => break,
                        _ => escaped = false,
                    }
                }
                (TokenKind::String, len)
            }
            _ if is_operator(first) => {
                let mut len = 1;
                while len < rest.len() && is_operator(rest[len]) && !starts_comment(&rest[len..]) {
                    len += 1;
                }
                (TokenKind::Operator, len)
            }
            _ => (TokenKind::Punctuation, 1),
        };
        Scanned::Token { kind, len }
    }
}
