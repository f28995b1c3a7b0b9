//! Stage 1 blocks: verbatim spans of a chunk

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Half-open byte range `[start, end)` into a string
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Inclusive start offset
    pub start: usize,
    /// Exclusive end offset
    pub end: usize,
}

impl Span {
    /// Create a new span
    ///
    /// # Panics
    /// Panics if `start > end`
    pub fn new(start: usize, end: usize) -> Self {
        assert!(start <= end, "Span start must be <= end");
        Self { start, end }
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the span is empty
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// As a `Range` for slicing
    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Slice `text` by this span, if the span is in bounds and on char boundaries
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.as_range())
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

/// Reference to one block within a document's Stage 1 output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockRef {
    /// Index of the owning chunk
    pub chunk_index: usize,
    /// Index of the block within that chunk's accepted blocks
    pub block_index: usize,
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}.b{}", self.chunk_index, self.block_index)
    }
}

/// A verbatim block isolated by Stage 1
///
/// `text` is always the exact slice of the owning chunk's text at `span`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Position of this block
    pub block_ref: BlockRef,

    /// Schema block identifier the model assigned (e.g. "Consolidated EBITDA")
    pub block_id: String,

    /// Kind of value the block represents (e.g. "term", "covenant")
    pub value_type: String,

    /// Verbatim text copied from the chunk
    pub text: String,

    /// Byte range of `text` within the owning chunk's text
    pub span: Span,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_slice() {
        let span = Span::new(4, 9);
        assert_eq!(span.slice("the quick fox"), Some("quick"));
        assert_eq!(span.len(), 5);
    }

    #[test]
    fn test_span_slice_out_of_bounds() {
        assert_eq!(Span::new(2, 50).slice("short"), None);
    }

    #[test]
    #[should_panic]
    fn test_span_rejects_inverted_range() {
        Span::new(5, 1);
    }

    #[test]
    fn test_block_ref_display() {
        let r = BlockRef {
            chunk_index: 2,
            block_index: 7,
        };
        assert_eq!(r.to_string(), "c2.b7");
    }
}
