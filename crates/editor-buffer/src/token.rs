//! Token chains produced by a rescan.
//!
//! A [`TokenChain`] is an immutable, offset-ordered run of [`TokenItem`]s. It is stamped with the
//! document edit counter at materialization time; every traversal compares the stamp against the
//! live counter and fails with [`BufferError::StaleChain`] once the document changed. Items carry
//! the same stamp, so an item kept from an older chain is rejected by a newer one.

use crate::error::{BufferError, Result};
use crate::text_store::EditCounter;

/// One token of a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenItem<K> {
    kind: K,
    offset: usize,
    len: usize,
    image: String,
    index: usize,
    generation: u64,
}

impl<K: Copy> TokenItem<K> {
    pub(crate) fn new(kind: K, offset: usize, image: String, index: usize) -> Self {
        Self {
            kind,
            offset,
            len: image.chars().count(),
            image,
            index,
            generation: 0,
        }
    }

    /// Token kind reported by the scanner.
    pub fn kind(&self) -> K {
        self.kind
    }

    /// Absolute start offset.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` for an empty token. Scanned tokens are never empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// End offset (exclusive).
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    /// Token text.
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Position in the chain.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Edit counter value of the chain the item belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Generation-stamped sequence of tokens.
#[derive(Debug, Clone)]
pub struct TokenChain<K> {
    items: Vec<TokenItem<K>>,
    generation: u64,
    counter: EditCounter,
}

impl<K: Copy> TokenChain<K> {
    pub(crate) fn new(mut items: Vec<TokenItem<K>>, counter: EditCounter) -> Self {
        let generation = counter.current();
        for item in &mut items {
            item.generation = generation;
        }
        Self {
            items,
            generation,
            counter,
        }
    }

    /// Edit counter value the chain was built at.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the document changed since the chain was built.
    pub fn is_stale(&self) -> bool {
        self.counter.current() != self.generation
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` when the chain holds no tokens.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All tokens.
    pub fn items(&self) -> Result<&[TokenItem<K>]> {
        self.check()?;
        Ok(&self.items)
    }

    /// First token.
    pub fn first(&self) -> Result<Option<&TokenItem<K>>> {
        self.check()?;
        Ok(self.items.first())
    }

    /// Last token.
    pub fn last(&self) -> Result<Option<&TokenItem<K>>> {
        self.check()?;
        Ok(self.items.last())
    }

    /// Token following `item`.
    ///
    /// `item` may come from another chain of the same generation; it is then resolved by offset.
    pub fn next(&self, item: &TokenItem<K>) -> Result<Option<&TokenItem<K>>> {
        self.check_item(item)?;
        let idx = if self.owns(item) {
            item.index + 1
        } else {
            self.items.partition_point(|t| t.offset < item.end())
        };
        Ok(self.items.get(idx))
    }

    /// Token preceding `item`.
    pub fn previous(&self, item: &TokenItem<K>) -> Result<Option<&TokenItem<K>>> {
        self.check_item(item)?;
        let idx = if self.owns(item) {
            item.index.checked_sub(1)
        } else {
            self.items.partition_point(|t| t.end() <= item.offset).checked_sub(1)
        };
        Ok(idx.and_then(|i| self.items.get(i)))
    }

    /// Token covering `offset`.
    pub fn token_at(&self, offset: usize) -> Result<Option<&TokenItem<K>>> {
        self.check()?;
        let idx = self.items.partition_point(|t| t.end() <= offset);
        Ok(self.items.get(idx).filter(|t| t.offset <= offset))
    }

    /// A cursor positioned before the first token.
    pub fn cursor(&self) -> TokenCursor<'_, K> {
        TokenCursor {
            chain: self,
            position: None,
        }
    }

    fn owns(&self, item: &TokenItem<K>) -> bool {
        self.items
            .get(item.index)
            .is_some_and(|t| t.offset == item.offset && t.len == item.len)
    }

    fn check_item(&self, item: &TokenItem<K>) -> Result<()> {
        self.check()?;
        if item.generation == self.generation {
            Ok(())
        } else {
            Err(BufferError::StaleChain {
                chain_generation: item.generation,
                current_generation: self.generation,
            })
        }
    }

    fn check(&self) -> Result<()> {
        let current = self.counter.current();
        if current == self.generation {
            Ok(())
        } else {
            Err(BufferError::StaleChain {
                chain_generation: self.generation,
                current_generation: current,
            })
        }
    }
}

/// Bidirectional walk over a chain.
#[derive(Debug, Clone)]
pub struct TokenCursor<'a, K> {
    chain: &'a TokenChain<K>,
    position: Option<usize>,
}

impl<'a, K: Copy> TokenCursor<'a, K> {
    /// Advance and return the next token. From the initial position this is the first token.
    pub fn next(&mut self) -> Result<Option<&'a TokenItem<K>>> {
        self.chain.check()?;
        let idx = self.position.map_or(0, |p| p + 1);
        let item = self.chain.items.get(idx);
        if item.is_some() {
            self.position = Some(idx);
        }
        Ok(item)
    }

    /// Step back and return the previous token.
    pub fn previous(&mut self) -> Result<Option<&'a TokenItem<K>>> {
        self.chain.check()?;
        let Some(idx) = self.position.and_then(|p| p.checked_sub(1)) else {
            return Ok(None);
        };
        self.position = Some(idx);
        Ok(self.chain.items.get(idx))
    }

    /// The token the cursor is on.
    pub fn current(&self) -> Result<Option<&'a TokenItem<K>>> {
        self.chain.check()?;
        Ok(self.position.and_then(|p| self.chain.items.get(p)))
    }
}
