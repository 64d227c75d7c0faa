//! Document configuration.
//!
//! A [`DocumentConfig`] is passed explicitly to [`Document::with_config`](crate::Document::with_config);
//! there is no global settings store.

/// Tunables for a [`Document`](crate::Document).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentConfig {
    /// Number of scratch segments kept in the pool. Acquisitions beyond this get a non-pooled
    /// buffer.
    pub segment_pool_capacity: usize,
    /// Initial character capacity of a freshly allocated scratch segment.
    pub segment_initial_capacity: usize,
    /// Whether marks created through [`Document::create_mark`](crate::Document::create_mark)
    /// clamp to the removal point instead of becoming invalid.
    pub clamp_marks: bool,
    /// Piece table compaction threshold (operations between add-buffer compactions).
    pub gc_threshold: usize,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            segment_pool_capacity: 4,
            segment_initial_capacity: 256,
            clamp_marks: false,
            gc_threshold: 1000,
        }
    }
}
