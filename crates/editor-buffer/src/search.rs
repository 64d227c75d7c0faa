//! Finder-based search over a character source.
//!
//! A search runs from `start` towards `limit`: forward when `start < limit`, backward when
//! `start > limit`. Before reading the document a [`Finder`] may widen the window it looks at
//! through [`Finder::adjust_start`] and [`Finder::adjust_limit`] (for example to see the
//! characters around a whole-word match). Adjustments may only widen: for a forward search the
//! adjusted start must not be after `start` and the adjusted limit must not be before `limit`,
//! mirrored for a backward search. A finder breaking that relation voids the search.
//!
//! Matches are always reported inside the requested range, as half-open character ranges.

use crate::error::{BufferError, Result};
use crate::text_store::CharSource;
use regex::{Regex, RegexBuilder};
use std::ops::Range;

/// A match expressed as a half-open character range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchMatch {
    /// Inclusive start character offset.
    pub start: usize,
    /// Exclusive end character offset.
    pub end: usize,
}

impl SearchMatch {
    /// Returns the length of the match in characters.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Returns `true` if the match is empty.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// A pluggable search.
pub trait Finder {
    /// Clear per-search state. Called before every search.
    fn reset(&mut self) {}

    /// Widen the start of the window. Must return `<= start` for a forward search and
    /// `>= start` for a backward one.
    fn adjust_start(&self, start: usize, _forward: bool) -> usize {
        start
    }

    /// Widen the limit of the window. Must return `>= limit` for a forward search and
    /// `<= limit` for a backward one.
    fn adjust_limit(&self, limit: usize, _forward: bool) -> usize {
        limit
    }

    /// Find a match inside `range` (absolute offsets) given the characters of the adjusted window,
    /// which starts at `window_start`. A forward search returns the first match, a backward search
    /// the last one.
    fn find(&mut self, window: &[char], window_start: usize, range: Range<usize>, forward: bool) -> Option<SearchMatch>;
}

/// Run `finder` from `start` towards `limit` over `source`.
pub(crate) fn find_in(
    source: &impl CharSource,
    finder: &mut (impl Finder + ?Sized),
    start: usize,
    limit: usize,
) -> Result<Option<SearchMatch>> {
    let len = source.len_chars();
    for offset in [start, limit] {
        if offset > len {
            return Err(BufferError::bad_offset(offset, 0, len));
        }
    }
    if start == limit {
        return Ok(None);
    }

    let forward = start < limit;
    let adjusted_start = finder.adjust_start(start, forward);
    let adjusted_limit = finder.adjust_limit(limit, forward);
    let widened = if forward {
        adjusted_start <= start && adjusted_limit >= limit
    } else {
        adjusted_start >= start && adjusted_limit <= limit
    };
    if !widened {
        tracing::debug!(
            target: "editor_buffer::document",
            start,
            limit,
            adjusted_start,
            adjusted_limit,
            "search.void"
        );
        return Ok(None);
    }

    let (lo, hi) = if forward {
        (adjusted_start, adjusted_limit.min(len))
    } else {
        (adjusted_limit, adjusted_start.min(len))
    };
    let mut window = Vec::with_capacity(hi - lo);
    source.read_chars(lo, hi - lo, &mut window);

    finder.reset();
    let range = start.min(limit)..start.max(limit);
    Ok(finder
        .find(&window, lo, range.clone(), forward)
        .filter(|m| !m.is_empty() && m.start >= range.start && m.end <= range.end))
}

/// Literal text finder with optional case folding and whole-word matching.
#[derive(Debug, Clone)]
pub struct TextFinder {
    pattern: Vec<char>,
    case_sensitive: bool,
    whole_word: bool,
}

impl TextFinder {
    /// Case-sensitive finder for `pattern`.
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.chars().collect(),
            case_sensitive: true,
            whole_word: false,
        }
    }

    /// Set case sensitivity.
    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }

    /// Only match whole words (alphanumeric and `_`).
    pub fn whole_word(mut self, yes: bool) -> Self {
        self.whole_word = yes;
        self
    }

    fn fold(&self, ch: char) -> char {
        if self.case_sensitive {
            ch
        } else {
            ch.to_lowercase().next().unwrap_or(ch)
        }
    }

    fn matches_at(&self, window: &[char], at: usize) -> bool {
        window[at..]
            .iter()
            .zip(&self.pattern)
            .all(|(&a, &b)| self.fold(a) == self.fold(b))
    }
}

fn is_word_char(ch: char) -> bool {
    ch == '_' || ch.is_alphanumeric()
}

impl Finder for TextFinder {
    fn adjust_start(&self, start: usize, forward: bool) -> usize {
        match (self.whole_word, forward) {
            (false, _) => start,
            (true, true) => start.saturating_sub(1),
            (true, false) => start + 1,
        }
    }

    fn adjust_limit(&self, limit: usize, forward: bool) -> usize {
        match (self.whole_word, forward) {
            (false, _) => limit,
            (true, true) => limit + 1,
            (true, false) => limit.saturating_sub(1),
        }
    }

    fn find(&mut self, window: &[char], window_start: usize, range: Range<usize>, forward: bool) -> Option<SearchMatch> {
        let len = self.pattern.len();
        if len == 0 || range.len() < len {
            return None;
        }
        let first = range.start - window_start;
        let last = range.end - window_start - len;

        let accept = |at: usize| {
            if !self.matches_at(window, at) {
                return false;
            }
            if !self.whole_word {
                return true;
            }
            let before = at.checked_sub(1).map(|i| window[i]);
            let after = window.get(at + len).copied();
            !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
        };

        let at = if forward {
            (first..=last).find(|&at| accept(at))
        } else {
            (first..=last).rev().find(|&at| accept(at))
        }?;
        Some(SearchMatch {
            start: window_start + at,
            end: window_start + at + len,
        })
    }
}

/// Maps between char offsets and byte offsets of a string.
#[derive(Debug)]
struct CharIndex {
    char_to_byte: Vec<usize>,
}

impl CharIndex {
    fn new(text: &str) -> Self {
        let mut char_to_byte: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        char_to_byte.push(text.len());
        Self { char_to_byte }
    }

    fn char_to_byte(&self, char_offset: usize) -> usize {
        let last = self.char_to_byte.len() - 1;
        self.char_to_byte[char_offset.min(last)]
    }

    fn byte_to_char(&self, byte_offset: usize) -> usize {
        match self.char_to_byte.binary_search(&byte_offset) {
            Ok(idx) | Err(idx) => idx,
        }
    }
}

/// Regular expression finder.
#[derive(Debug, Clone)]
pub struct RegexFinder {
    regex: Regex,
}

impl RegexFinder {
    /// Compile `pattern`. Returns the regex error for an invalid pattern.
    pub fn new(pattern: &str, case_sensitive: bool) -> std::result::Result<Self, regex::Error> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(!case_sensitive)
            .multi_line(true)
            .build()?;
        Ok(Self { regex })
    }
}

impl Finder for RegexFinder {
    fn find(&mut self, window: &[char], window_start: usize, range: Range<usize>, forward: bool) -> Option<SearchMatch> {
        let text: String = window.iter().collect();
        let index = CharIndex::new(&text);
        let from_byte = index.char_to_byte(range.start - window_start);
        let to_byte = index.char_to_byte(range.end - window_start);

        let haystack = &text[..to_byte];
        let mut at = from_byte;
        let mut found = None;
        while let Some(m) = self.regex.find_at(haystack, at) {
            if m.start() == m.end() {
                let Some(ch) = haystack[m.end()..].chars().next() else {
                    break;
                };
                at = m.end() + ch.len_utf8();
                continue;
            }
            found = Some(SearchMatch {
                start: window_start + index.byte_to_char(m.start()),
                end: window_start + index.byte_to_char(m.end()),
            });
            if forward {
                break;
            }
            at = m.end();
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text_store::TextStore;

    #[test]
    fn test_forward_and_backward() {
        let store = TextStore::new("foo bar foo baz");
        let mut finder = TextFinder::new("foo");
        assert_eq!(
            find_in(&store, &mut finder, 0, 15).unwrap(),
            Some(SearchMatch { start: 0, end: 3 })
        );
        assert_eq!(
            find_in(&store, &mut finder, 1, 15).unwrap(),
            Some(SearchMatch { start: 8, end: 11 })
        );
        assert_eq!(
            find_in(&store, &mut finder, 15, 0).unwrap(),
            Some(SearchMatch { start: 8, end: 11 })
        );
        assert_eq!(find_in(&store, &mut finder, 10, 0).unwrap(), Some(SearchMatch { start: 0, end: 3 }));
        assert_eq!(find_in(&store, &mut finder, 4, 4).unwrap(), None);
        assert!(find_in(&store, &mut finder, 0, 16).is_err());
    }

    #[test]
    fn test_case_insensitive() {
        let store = TextStore::new("Hello HELLO");
        let mut finder = TextFinder::new("hello").case_sensitive(false);
        assert_eq!(
            find_in(&store, &mut finder, 1, 11).unwrap(),
            Some(SearchMatch { start: 6, end: 11 })
        );
    }

    #[test]
    fn test_whole_word_sees_outside_the_range() {
        let store = TextStore::new("xfoo foo");
        let mut finder = TextFinder::new("foo").whole_word(true);
        // The range starts inside "xfoo"; the widened window reveals the 'x'.
        assert_eq!(
            find_in(&store, &mut finder, 1, 8).unwrap(),
            Some(SearchMatch { start: 5, end: 8 })
        );
        assert_eq!(find_in(&store, &mut finder, 5, 7).unwrap(), None);
    }

    struct Narrowing;

    impl Finder for Narrowing {
        fn adjust_start(&self, start: usize, _forward: bool) -> usize {
            start + 1
        }

        fn find(&mut self, _: &[char], window_start: usize, _: Range<usize>, _: bool) -> Option<SearchMatch> {
            Some(SearchMatch {
                start: window_start,
                end: window_start + 1,
            })
        }
    }

    #[test]
    fn test_narrowing_adjustment_voids_search() {
        let store = TextStore::new("abc");
        assert_eq!(find_in(&store, &mut Narrowing, 0, 3).unwrap(), None);
    }

    #[test]
    fn test_regex_finder() {
        let store = TextStore::new("你好 id42 x7");
        let mut finder = RegexFinder::new(r"[a-z]+\d+", true).unwrap();
        assert_eq!(
            find_in(&store, &mut finder, 0, 10).unwrap(),
            Some(SearchMatch { start: 3, end: 7 })
        );
        assert_eq!(
            find_in(&store, &mut finder, 10, 0).unwrap(),
            Some(SearchMatch { start: 8, end: 10 })
        );
        assert!(RegexFinder::new("(", true).is_err());
    }
}
