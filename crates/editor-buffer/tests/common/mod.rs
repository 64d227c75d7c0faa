//! Scanners shared by the integration tests.

#![allow(dead_code)]

use editor_buffer::{Scanned, Scanner};

/// Token kinds of [`ParityScanner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Word,
    Space,
    Newline,
}

/// Emits words, runs of spaces and newlines. The state flips at every newline, so the state
/// before line `n` is `n % 2 == 1`.
#[derive(Debug, Default)]
pub struct ParityScanner {
    odd: bool,
}

impl Scanner for ParityScanner {
    type State = bool;
    type Kind = Kind;

    fn initial_state(&self) -> bool {
        false
    }

    fn load_state(&mut self, state: &bool) {
        self.odd = *state;
    }

    fn store_state(&self) -> bool {
        self.odd
    }

    fn next_token(&mut self, buffer: &[char], offset: usize, _last: bool) -> Scanned<Kind> {
        let rest = &buffer[offset..];
        let Some(&first) = rest.first() else {
            return Scanned::EndOfBuffer;
        };
        if first == '\n' {
            self.odd = !self.odd;
            return Scanned::Token {
                kind: Kind::Newline,
                len: 1,
            };
        }
        let space = first == ' ';
        let len = rest
            .iter()
            .take_while(|&&c| c != '\n' && (c == ' ') == space)
            .count();
        let kind = if space { Kind::Space } else { Kind::Word };
        Scanned::Token { kind, len }
    }
}

/// What [`FaultyScanner`] does when it meets a `!`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    ZeroLength,
    Overrun,
    EarlyEnd,
}

/// Behaves like one-token-per-char until it meets `!`, then breaks the scanner contract.
#[derive(Debug)]
pub struct FaultyScanner(pub Fault);

impl Scanner for FaultyScanner {
    type State = ();
    type Kind = char;

    fn initial_state(&self) {}

    fn load_state(&mut self, _: &()) {}

    fn store_state(&self) {}

    fn next_token(&mut self, buffer: &[char], offset: usize, _last: bool) -> Scanned<char> {
        match buffer.get(offset) {
            None => Scanned::EndOfBuffer,
            Some('!') => match self.0 {
                Fault::ZeroLength => Scanned::Token { kind: '!', len: 0 },
                Fault::Overrun => Scanned::Token {
                    kind: '!',
                    len: buffer.len() - offset + 1,
                },
                Fault::EarlyEnd => Scanned::EndOfBuffer,
            },
            Some(&c) => Scanned::Token { kind: c, len: 1 },
        }
    }
}

/// Text of `count` lines, `line 0` through `line {count - 1}`, without a trailing newline.
pub fn numbered_lines(count: usize) -> String {
    (0..count)
        .map(|i| format!("line {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}
